//! Plain-text list files
//!
//! Item lists and misc-info key lists can be kept in text files with one
//! entry per line. Blank lines and `#` comments are ignored.

use std::fs;
use std::path::Path;

use super::ConfigError;

/// Parse list file contents
pub fn parse_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load a list file from disk
pub fn load_list_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_list(&contents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_list_skips_comments_and_blanks() {
        let items = parse_list("# framework items\nSYSTEM/*\n\n  PRODUCT/*  \n#ROOT/*\n");
        assert_eq!(items, vec!["SYSTEM/*", "PRODUCT/*"]);
    }

    #[test]
    fn test_load_list_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "META/apkcerts.txt").unwrap();
        writeln!(file, "SYSTEM/*").unwrap();

        let items = load_list_file(file.path()).unwrap();
        assert_eq!(items, vec!["META/apkcerts.txt", "SYSTEM/*"]);
    }

    #[test]
    fn test_load_missing_list_file() {
        let err = load_list_file(Path::new("/nonexistent/item_list.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
