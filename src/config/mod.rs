//! Merge configuration
//!
//! Configuration is layered:
//! 1. Built-in defaults
//! 2. An optional TOML file (any field may be omitted)
//! 3. CLI overrides, applied by the binary
//!
//! The resulting [`MergeConfig`] is passed explicitly to each component.

mod defaults;
mod lists;

pub use defaults::{
    default_partition_map, default_required_items, DEFAULT_APEX_PARTITIONS,
    DEFAULT_FRAMEWORK_ITEM_LIST, DEFAULT_FRAMEWORK_MISC_INFO_KEYS, DEFAULT_KEY_MANIFESTS,
    DEFAULT_PARTITION_MAP, DEFAULT_SEPOLICY_COMPILER, DEFAULT_VENDOR_ITEM_LIST,
    RESTRICTED_MISC_INFO_KEYS,
};
pub use lists::{load_list_file, parse_list};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::validate::{ConfigLists, ValidationRules};
use defaults::owned;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Policy compiler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SepolicyConfig {
    /// Plan and run the split-policy compile step
    pub enabled: bool,

    /// Compiler binary name or path
    pub compiler: String,
}

impl Default for SepolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compiler: DEFAULT_SEPOLICY_COMPILER.to_string(),
        }
    }
}

/// Everything the merge components need, passed by reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Glob patterns copied from the framework tree
    pub framework_item_list: Vec<String>,

    /// Glob patterns copied from the vendor tree
    pub vendor_item_list: Vec<String>,

    /// misc_info.txt keys taken from the framework tree
    pub framework_misc_info_keys: Vec<String>,

    /// Items that must appear in one of the two item lists
    pub required_items: Vec<String>,

    /// misc_info.txt keys the framework side may not supply
    pub restricted_misc_info_keys: Vec<String>,

    /// Manifest file names merged under META/
    pub key_manifests: Vec<String>,

    /// Keep the framework record instead of failing on a manifest conflict
    pub allow_duplicate_apkapex_keys: bool,

    /// Drop manifest records whose partition tag the side does not own
    pub filter_key_manifests_by_partition: bool,

    /// Partitions checked for duplicate APEX packages
    pub apex_partitions: Vec<String>,

    /// Partition role → directory name in the merged tree
    pub partition_map: BTreeMap<String, String>,

    pub sepolicy: SepolicyConfig,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            framework_item_list: owned(DEFAULT_FRAMEWORK_ITEM_LIST),
            vendor_item_list: owned(DEFAULT_VENDOR_ITEM_LIST),
            framework_misc_info_keys: owned(DEFAULT_FRAMEWORK_MISC_INFO_KEYS),
            required_items: default_required_items(),
            restricted_misc_info_keys: owned(RESTRICTED_MISC_INFO_KEYS),
            key_manifests: owned(DEFAULT_KEY_MANIFESTS),
            allow_duplicate_apkapex_keys: false,
            filter_key_manifests_by_partition: false,
            apex_partitions: owned(DEFAULT_APEX_PARTITIONS),
            partition_map: default_partition_map(),
            sepolicy: SepolicyConfig::default(),
        }
    }
}

impl MergeConfig {
    /// Parse TOML text on top of the built-in defaults
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Borrow the lists the config validator inspects
    pub fn config_lists(&self) -> ConfigLists<'_> {
        ConfigLists {
            framework_item_list: &self.framework_item_list,
            vendor_item_list: &self.vendor_item_list,
            framework_misc_info_keys: &self.framework_misc_info_keys,
        }
    }

    /// Fixed rules the config validator checks against
    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            required_items: self.required_items.clone(),
            restricted_misc_info_keys: self.restricted_misc_info_keys.clone(),
        }
    }
}
