//! Selective copying of target-files trees
//!
//! Walks a source tree once and copies every non-directory entry whose
//! root-relative path matches one of the item patterns. Symlinks are
//! recreated with their target string untouched; regular files are copied
//! byte for byte.

mod patterns;

pub use patterns::{ItemPatterns, PatternError};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Errors for copy operations
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Path is not within source root: {0}")]
    PathNotInRoot(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CopyError + '_ {
    move |source| CopyError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What a copy pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub files: usize,
    pub symlinks: usize,
}

impl CopySummary {
    pub fn total(&self) -> usize {
        self.files + self.symlinks
    }
}

/// Copies pattern-selected entries from one tree into another
pub struct ItemCopier {
    /// Root directory to copy from
    from_dir: PathBuf,
    /// Compiled item patterns
    patterns: ItemPatterns,
}

impl ItemCopier {
    /// Create a copier for the given source root and patterns
    pub fn new<S: AsRef<str>>(from_dir: &Path, patterns: &[S]) -> Result<Self, CopyError> {
        Ok(Self {
            from_dir: from_dir.to_path_buf(),
            patterns: ItemPatterns::new(patterns)?,
        })
    }

    /// Collect matching root-relative paths, in walk order
    pub fn collect_matches(&self) -> Result<Vec<PathBuf>, CopyError> {
        let mut matches = Vec::new();

        for entry in WalkDir::new(&self.from_dir)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(&self.from_dir)
                .map_err(|_| CopyError::PathNotInRoot(entry.path().to_path_buf()))?;

            if self.patterns.is_match(rel_path) {
                matches.push(rel_path.to_path_buf());
            }
        }

        Ok(matches)
    }

    /// Copy every matching entry into `to_dir`
    pub fn copy_into(&self, to_dir: &Path) -> Result<CopySummary, CopyError> {
        let mut summary = CopySummary::default();

        for rel_path in self.collect_matches()? {
            let source = self.from_dir.join(&rel_path);
            let dest = to_dir.join(&rel_path);

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }

            let file_type = fs::symlink_metadata(&source)
                .map_err(io_err(&source))?
                .file_type();

            if file_type.is_symlink() {
                let target = fs::read_link(&source).map_err(io_err(&source))?;
                std::os::unix::fs::symlink(&target, &dest).map_err(io_err(&dest))?;
                summary.symlinks += 1;
            } else {
                fs::copy(&source, &dest).map_err(io_err(&dest))?;
                summary.files += 1;
            }
            debug!(path = %rel_path.display(), "copied item");
        }

        Ok(summary)
    }
}

/// Copy items matching `patterns` from `from_dir` to `to_dir`.
pub fn copy_items<S: AsRef<str>>(
    from_dir: &Path,
    to_dir: &Path,
    patterns: &[S],
) -> Result<CopySummary, CopyError> {
    ItemCopier::new(from_dir, patterns)?.copy_into(to_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn create_empty_file(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn rel_entries(root: &Path) -> BTreeSet<String> {
        WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| !e.file_type().is_dir())
            .map(|e| {
                e.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_copy_items_copies_items_matching_patterns() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let root = input.path();

        for rel in [
            "a.cpp",
            "b.cpp",
            "subdir/c.txt",
            "subdir/d.txt",
            "subdir/subsubdir/e.txt",
            "a.h",
            "b.h",
            "subdir/subsubdir/f.gif",
        ] {
            create_empty_file(root, rel);
        }
        symlink("a.cpp", root.join("a_link.cpp")).unwrap();
        symlink("a.h", root.join("a_link.h")).unwrap();

        let summary = copy_items(root, output.path(), &["*.cpp", "subdir/*.txt"]).unwrap();

        let expected: BTreeSet<String> = [
            "a.cpp",
            "a_link.cpp",
            "b.cpp",
            "subdir/c.txt",
            "subdir/d.txt",
            "subdir/subsubdir/e.txt",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(rel_entries(output.path()), expected);
        assert_eq!(summary, CopySummary { files: 5, symlinks: 1 });
        assert_eq!(
            fs::read_link(output.path().join("a_link.cpp")).unwrap(),
            PathBuf::from("a.cpp")
        );
    }

    #[test]
    fn test_copy_preserves_content() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let data: Vec<u8> = (0..=255).collect();
        fs::create_dir_all(input.path().join("SYSTEM/lib")).unwrap();
        fs::write(input.path().join("SYSTEM/lib/libfoo.so"), &data).unwrap();

        copy_items(input.path(), output.path(), &["SYSTEM/*"]).unwrap();

        assert_eq!(fs::read(output.path().join("SYSTEM/lib/libfoo.so")).unwrap(), data);
    }

    #[test]
    fn test_dangling_symlink_copied_as_link() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::create_dir_all(input.path().join("SYSTEM/bin")).unwrap();
        symlink("/system/bin/toybox", input.path().join("SYSTEM/bin/ls")).unwrap();

        let summary = copy_items(input.path(), output.path(), &["SYSTEM/*"]).unwrap();

        assert_eq!(summary.symlinks, 1);
        assert_eq!(
            fs::read_link(output.path().join("SYSTEM/bin/ls")).unwrap(),
            PathBuf::from("/system/bin/toybox")
        );
    }

    #[test]
    fn test_symlinked_directory_not_followed() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_empty_file(input.path(), "real/inner.txt");
        symlink("real", input.path().join("alias")).unwrap();

        copy_items(input.path(), output.path(), &["alias*"]).unwrap();

        let copied = output.path().join("alias");
        assert!(fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&copied).unwrap(), PathBuf::from("real"));
        assert!(!output.path().join("real").exists());
    }

    #[test]
    fn test_no_match_copies_nothing() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_empty_file(input.path(), "VENDOR/build.prop");

        let summary = copy_items(input.path(), output.path(), &["SYSTEM/*"]).unwrap();

        assert_eq!(summary.total(), 0);
        assert!(rel_entries(output.path()).is_empty());
    }

    #[test]
    fn test_missing_source_root_is_error() {
        let output = TempDir::new().unwrap();
        let missing = output.path().join("does-not-exist");
        assert!(matches!(
            copy_items(&missing, output.path(), &["*"]),
            Err(CopyError::Walk(_))
        ));
    }
}
