//! Package identity of APEX containers.
//!
//! An `.apex` is a zip archive carrying `apex_manifest.pb` (or, for older
//! builds, `apex_manifest.json`). A compressed `.capex` carries the same
//! manifest next to an `original_apex` entry holding the uncompressed
//! container; when the outer manifest is absent it is read from there.

mod error;
mod protobuf;

pub use error::ApexError;
pub use protobuf::decode_manifest;

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use zip::result::ZipError;
use zip::ZipArchive;

const MANIFEST_PB: &str = "apex_manifest.pb";
const MANIFEST_JSON: &str = "apex_manifest.json";
const ORIGINAL_APEX: &str = "original_apex";

/// Container flavor, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Apex,
    Capex,
}

impl ContainerKind {
    /// Classify a path by extension; anything else is not a container.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("apex") => Some(ContainerKind::Apex),
            Some("capex") => Some(ContainerKind::Capex),
            _ => None,
        }
    }
}

/// The identifying part of an APEX manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApexManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<i64>,
}

impl ApexManifest {
    /// Parse the legacy JSON manifest
    pub fn from_json(bytes: &[u8]) -> Result<Self, ApexError> {
        let manifest: ApexManifest = serde_json::from_slice(bytes)?;
        if manifest.name.is_empty() {
            return Err(ApexError::MissingName);
        }
        Ok(manifest)
    }
}

/// A container found on disk together with its declared identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApexInfo {
    pub package_name: String,
    pub version: Option<i64>,
    pub kind: ContainerKind,
    pub path: PathBuf,
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, ApexError> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read the manifest of an already opened container archive.
pub fn read_manifest<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    kind: ContainerKind,
) -> Result<ApexManifest, ApexError> {
    if let Some(bytes) = read_entry(archive, MANIFEST_PB)? {
        return decode_manifest(&bytes);
    }
    if let Some(bytes) = read_entry(archive, MANIFEST_JSON)? {
        return ApexManifest::from_json(&bytes);
    }
    if kind == ContainerKind::Capex {
        if let Some(inner) = read_entry(archive, ORIGINAL_APEX)? {
            let mut inner = ZipArchive::new(Cursor::new(inner))?;
            return read_manifest(&mut inner, ContainerKind::Apex);
        }
    }
    Err(ApexError::NoManifest)
}

/// Open a container file and read its package identity.
///
/// Returns `Ok(None)` for files that are not `.apex` / `.capex`.
pub fn read_apex_info(path: &Path) -> Result<Option<ApexInfo>, ApexError> {
    let Some(kind) = ContainerKind::from_path(path) else {
        return Ok(None);
    };

    let mut archive = ZipArchive::new(File::open(path)?)?;
    let manifest = read_manifest(&mut archive, kind)?;

    Ok(Some(ApexInfo {
        package_name: manifest.name,
        version: manifest.version,
        kind,
        path: path.to_path_buf(),
    }))
}
