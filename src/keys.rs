//! Merging of META signing manifests
//!
//! Reads the same manifest (e.g. `apexkeys.txt`) from the framework and
//! vendor META directories, merges them and writes the sorted result into
//! the output META directory. Nothing is written if the merge fails.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use package_keys::{ConflictPolicy, KeyManifest, KeysError};
use tracing::{info, warn};

/// Errors for manifest merging
#[derive(Debug, thiserror::Error)]
pub enum KeyMergeError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: KeysError,
    },

    #[error("{file_name}: {source}")]
    Merge {
        file_name: String,
        #[source]
        source: KeysError,
    },
}

impl KeyMergeError {
    /// The conflicting package identifier, if this is a conflict
    pub fn conflicting_name(&self) -> Option<&str> {
        match self {
            KeyMergeError::Merge {
                source: KeysError::Conflict { name, .. },
                ..
            } => Some(name),
            _ => None,
        }
    }
}

/// Optional behaviors on top of the plain union
#[derive(Debug, Clone, Default)]
pub struct KeyMergeOptions {
    /// Keep the framework record on conflict instead of failing
    pub allow_duplicate_keys: bool,

    /// When set, drop records whose `partition` tag the side does not own
    pub partition_filter: Option<PartitionFilter>,
}

/// Partition sets used to filter each side's records
#[derive(Debug, Clone, Default)]
pub struct PartitionFilter {
    pub framework: BTreeSet<String>,
    pub vendor: BTreeSet<String>,
}

fn read_manifest(meta_dir: &Path, file_name: &str) -> Result<KeyManifest, KeyMergeError> {
    let path = meta_dir.join(file_name);
    let text = fs::read_to_string(&path).map_err(|source| KeyMergeError::Io {
        path: path.clone(),
        source,
    })?;
    KeyManifest::parse(&text).map_err(|source| KeyMergeError::Manifest { path, source })
}

fn filter_side(
    manifest: &mut KeyManifest,
    partitions: &BTreeSet<String>,
    meta_dir: &Path,
    file_name: &str,
) -> Result<(), KeyMergeError> {
    manifest
        .retain_partitions(|p| partitions.contains(p))
        .map_err(|source| KeyMergeError::Manifest {
            path: meta_dir.join(file_name),
            source,
        })
}

/// Merge `file_name` from both META dirs into `output_meta_dir`.
pub fn merge_package_keys_txt(
    framework_meta_dir: &Path,
    vendor_meta_dir: &Path,
    output_meta_dir: &Path,
    file_name: &str,
) -> Result<KeyManifest, KeyMergeError> {
    merge_package_keys_txt_with(
        framework_meta_dir,
        vendor_meta_dir,
        output_meta_dir,
        file_name,
        &KeyMergeOptions::default(),
    )
}

/// [`merge_package_keys_txt`] with explicit options.
pub fn merge_package_keys_txt_with(
    framework_meta_dir: &Path,
    vendor_meta_dir: &Path,
    output_meta_dir: &Path,
    file_name: &str,
    options: &KeyMergeOptions,
) -> Result<KeyManifest, KeyMergeError> {
    let mut framework = read_manifest(framework_meta_dir, file_name)?;
    let mut vendor = read_manifest(vendor_meta_dir, file_name)?;

    if let Some(filter) = &options.partition_filter {
        filter_side(&mut framework, &filter.framework, framework_meta_dir, file_name)?;
        filter_side(&mut vendor, &filter.vendor, vendor_meta_dir, file_name)?;
    }

    let policy = if options.allow_duplicate_keys {
        ConflictPolicy::KeepFirst
    } else {
        ConflictPolicy::Fail
    };
    let outcome = framework
        .merge_with(&vendor, policy)
        .map_err(|source| KeyMergeError::Merge {
            file_name: file_name.to_string(),
            source,
        })?;
    for name in &outcome.overridden {
        warn!(file = file_name, package = %name, "duplicate key, keeping framework record");
    }

    fs::create_dir_all(output_meta_dir).map_err(|source| KeyMergeError::Io {
        path: output_meta_dir.to_path_buf(),
        source,
    })?;
    let output = output_meta_dir.join(file_name);
    // A copied item may have left a symlink here; never write through it.
    if fs::symlink_metadata(&output).is_ok() {
        fs::remove_file(&output).map_err(|source| KeyMergeError::Io {
            path: output.clone(),
            source,
        })?;
    }
    fs::write(&output, outcome.manifest.render()).map_err(|source| KeyMergeError::Io {
        path: output.clone(),
        source,
    })?;

    info!(
        file = file_name,
        records = outcome.manifest.len(),
        "merged key manifest"
    );
    Ok(outcome.manifest)
}
