//! Built-in merge defaults
//!
//! Hardcoded defaults for the item lists and key sets used when no config
//! file overrides them.

use std::collections::BTreeMap;

/// Items the framework build owns by default
pub const DEFAULT_FRAMEWORK_ITEM_LIST: &[&str] = &[
    "META/apkcerts.txt",
    "META/filesystem_config.txt",
    "META/root_filesystem_config.txt",
    "META/update_engine_config.txt",
    "PRODUCT/*",
    "ROOT/*",
    "SYSTEM/*",
];

/// Items the vendor build owns by default
pub const DEFAULT_VENDOR_ITEM_LIST: &[&str] = &[
    "META/boot_filesystem_config.txt",
    "META/otakeys.txt",
    "META/releasetools.py",
    "META/vendor_filesystem_config.txt",
    "BOOT/*",
    "DATA/*",
    "ODM/*",
    "OTA/android-info.txt",
    "PREBUILT_IMAGES/*",
    "RADIO/*",
    "VENDOR/*",
];

/// misc_info.txt keys whose framework value overrides the vendor one
pub const DEFAULT_FRAMEWORK_MISC_INFO_KEYS: &[&str] = &[
    "avb_system_hashtree_enable",
    "avb_system_add_hashtree_footer_args",
    "avb_system_key_path",
    "avb_system_algorithm",
    "avb_system_rollback_index_location",
    "avb_product_hashtree_enable",
    "avb_product_add_hashtree_footer_args",
    "avb_system_ext_hashtree_enable",
    "avb_system_ext_add_hashtree_footer_args",
    "system_root_image",
    "root_dir",
    "ab_update",
    "default_system_dev_certificate",
    "building_system_image",
    "building_product_image",
];

/// misc_info.txt keys that must come from the vendor build only
pub const RESTRICTED_MISC_INFO_KEYS: &[&str] = &["dynamic_partition_list", "super_partition_groups"];

/// Signing manifests merged under META/
pub const DEFAULT_KEY_MANIFESTS: &[&str] = &["apexkeys.txt", "apkcerts.txt"];

/// Partitions that may host installed APEX packages
pub const DEFAULT_APEX_PARTITIONS: &[&str] = &["system", "system_ext", "product", "vendor"];

/// Default policy compiler binary
pub const DEFAULT_SEPOLICY_COMPILER: &str = "secilc";

/// Partition role → directory name inside a target-files tree
pub const DEFAULT_PARTITION_MAP: &[(&str, &str)] = &[
    ("system", "SYSTEM"),
    ("system_ext", "SYSTEM_EXT"),
    ("product", "PRODUCT"),
    ("vendor", "VENDOR"),
    ("odm", "ODM"),
];

pub(crate) fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Union of both default item lists; every entry must be claimed by one side.
pub fn default_required_items() -> Vec<String> {
    let mut items = owned(DEFAULT_FRAMEWORK_ITEM_LIST);
    items.extend(owned(DEFAULT_VENDOR_ITEM_LIST));
    items
}

pub fn default_partition_map() -> BTreeMap<String, String> {
    DEFAULT_PARTITION_MAP
        .iter()
        .map(|(role, dir)| (role.to_string(), dir.to_string()))
        .collect()
}
