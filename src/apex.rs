//! Post-merge APEX integrity check
//!
//! Every APEX package must be installed in exactly one partition of the
//! merged tree. The check only reads the tree.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use apex_manifest::{read_apex_info, ApexError};
use tracing::{debug, info};

/// Directory holding installed containers, inside a partition directory
pub const APEX_DIR: &str = "apex";

/// One package found in several partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateApex {
    pub package: String,
    pub partitions: Vec<String>,
}

impl fmt::Display for DuplicateApex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.package, self.partitions.join(", "))
    }
}

fn join_duplicates(duplicates: &[DuplicateApex]) -> String {
    duplicates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// APEX validation errors
#[derive(Debug, thiserror::Error)]
pub enum ApexValidationError {
    #[error("Duplicate APEX packages found in multiple partitions: {}", join_duplicates(.duplicates))]
    Duplicate { duplicates: Vec<DuplicateApex> },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read APEX container {path}: {source}")]
    Container {
        path: PathBuf,
        #[source]
        source: ApexError,
    },
}

/// Package names installed in one partition of the merged tree
pub fn partition_apex_packages(
    output_dir: &Path,
    partition: &str,
) -> Result<Vec<String>, ApexValidationError> {
    let apex_dir = output_dir.join(partition.to_uppercase()).join(APEX_DIR);
    if !apex_dir.is_dir() {
        debug!(partition, "no apex directory");
        return Ok(Vec::new());
    }

    let io_err = |source| ApexValidationError::Io {
        path: apex_dir.clone(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(&apex_dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    paths.sort();

    let mut packages = Vec::new();
    for path in paths {
        if !path.is_file() {
            continue;
        }
        let info = read_apex_info(&path).map_err(|source| ApexValidationError::Container {
            path: path.clone(),
            source,
        })?;
        if let Some(info) = info {
            packages.push(info.package_name);
        }
    }
    packages.sort();
    packages.dedup();
    Ok(packages)
}

/// Check that no APEX package is installed in more than one of `partitions`.
///
/// Returns the package → partition map on success.
pub fn validate_merged_apex_info<S: AsRef<str>>(
    output_dir: &Path,
    partitions: &[S],
) -> Result<BTreeMap<String, String>, ApexValidationError> {
    let mut owners: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for partition in partitions {
        let partition = partition.as_ref();
        for package in partition_apex_packages(output_dir, partition)? {
            owners.entry(package).or_default().push(partition.to_string());
        }
    }

    let duplicates: Vec<DuplicateApex> = owners
        .iter()
        .filter(|(_, parts)| parts.len() > 1)
        .map(|(package, parts)| DuplicateApex {
            package: package.clone(),
            partitions: parts.clone(),
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(ApexValidationError::Duplicate { duplicates });
    }

    info!(packages = owners.len(), "apex packages are unique across partitions");
    Ok(owners
        .into_iter()
        .filter_map(|(package, mut parts)| parts.pop().map(|p| (package, p)))
        .collect())
}
