//! Error types for reading APEX containers.

use std::io;

/// Errors raised while reading a container manifest
#[derive(Debug, thiserror::Error)]
pub enum ApexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("container has no apex_manifest.pb or apex_manifest.json")]
    NoManifest,

    #[error("invalid apex_manifest.pb: {0}")]
    InvalidProtobuf(String),

    #[error("invalid apex_manifest.json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("manifest does not declare a package name")]
    MissingName,
}
