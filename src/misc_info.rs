//! Merging of META/misc_info.txt
//!
//! The vendor copy is the base. Keys listed as framework-owned take the
//! framework value when the framework file defines them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

pub const MISC_INFO_TXT: &str = "misc_info.txt";

/// Errors for misc_info merging
#[derive(Debug, thiserror::Error)]
pub enum MiscInfoError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line_number}: expected key=value, got '{line}'")]
    Malformed {
        path: PathBuf,
        line_number: usize,
        line: String,
    },
}

/// Parse `key=value` lines. Blank lines and `#` comments are skipped.
pub fn parse_misc_info(
    contents: &str,
    path: &Path,
) -> Result<BTreeMap<String, String>, MiscInfoError> {
    let mut map = BTreeMap::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| MiscInfoError::Malformed {
            path: path.to_path_buf(),
            line_number: index + 1,
            line: line.to_string(),
        })?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

fn load(meta_dir: &Path) -> Result<BTreeMap<String, String>, MiscInfoError> {
    let path = meta_dir.join(MISC_INFO_TXT);
    let contents = fs::read_to_string(&path).map_err(|source| MiscInfoError::Io {
        path: path.clone(),
        source,
    })?;
    parse_misc_info(&contents, &path)
}

/// Write the merged misc_info.txt into `output_meta_dir` and return it.
pub fn merge_misc_info_txt<S: AsRef<str>>(
    framework_meta_dir: &Path,
    vendor_meta_dir: &Path,
    output_meta_dir: &Path,
    framework_keys: &[S],
) -> Result<BTreeMap<String, String>, MiscInfoError> {
    let framework = load(framework_meta_dir)?;
    let mut merged = load(vendor_meta_dir)?;

    for key in framework_keys {
        if let Some(value) = framework.get(key.as_ref()) {
            merged.insert(key.as_ref().to_string(), value.clone());
        }
    }

    let mut out = String::new();
    for (key, value) in &merged {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }

    fs::create_dir_all(output_meta_dir).map_err(|source| MiscInfoError::Io {
        path: output_meta_dir.to_path_buf(),
        source,
    })?;
    let output = output_meta_dir.join(MISC_INFO_TXT);
    // A copied item may have left a symlink into an input tree here.
    if fs::symlink_metadata(&output).is_ok() {
        fs::remove_file(&output).map_err(|source| MiscInfoError::Io {
            path: output.clone(),
            source,
        })?;
    }
    fs::write(&output, out).map_err(|source| MiscInfoError::Io {
        path: output,
        source,
    })?;

    info!(keys = merged.len(), "merged misc_info.txt");
    Ok(merged)
}
