//! Cross-validation of the framework and vendor item lists
//!
//! Runs before anything is copied. Each side must own a disjoint set of
//! partitions, every required item must be claimed by some side, and the
//! framework may not supply the misc-info keys that describe dynamic
//! partitions.

use std::collections::BTreeSet;
use std::fmt;

use tracing::error;

/// Top-level segments that hold metadata rather than partition contents
const NON_PARTITION_SEGMENTS: &[&str] = &["meta", "root", "images"];

/// The lists under validation, borrowed from the driver's config
#[derive(Debug, Clone, Copy)]
pub struct ConfigLists<'a> {
    pub framework_item_list: &'a [String],
    pub vendor_item_list: &'a [String],
    pub framework_misc_info_keys: &'a [String],
}

/// Fixed rules the lists are checked against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationRules {
    pub required_items: Vec<String>,
    pub restricted_misc_info_keys: Vec<String>,
}

/// A single reason the lists are not mergeable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// A required item is in neither list.
    MissingItem(String),
    /// Both sides claim the same partition.
    SharedPartition(String),
    /// The framework misc-info key list names a vendor-only key.
    RestrictedMiscInfoKey(String),
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::MissingItem(item) => write!(
                f,
                "missing merge config item {}; add it to the framework or vendor item list",
                item
            ),
            ConfigIssue::SharedPartition(partition) => write!(
                f,
                "cannot extract items from {} for both the framework and vendor builds",
                partition
            ),
            ConfigIssue::RestrictedMiscInfoKey(key) => write!(
                f,
                "misc info key {} must come from the vendor instance of META/misc_info.txt",
                key
            ),
        }
    }
}

fn top_segment(item: &str) -> Option<&str> {
    item.split('/').next().filter(|s| !s.is_empty())
}

/// Partition names an item list extracts from, lower-cased.
///
/// `['META/apkcerts.txt', 'PRODUCT/*', 'SYSTEM/*']` → `{product, system}`.
pub fn item_list_to_partition_set<S: AsRef<str>>(item_list: &[S]) -> BTreeSet<String> {
    item_list
        .iter()
        .filter_map(|item| top_segment(item.as_ref()))
        .map(str::to_lowercase)
        .filter(|segment| !NON_PARTITION_SEGMENTS.contains(&segment.as_str()))
        .collect()
}

/// Partitions a list claims: its extracted partitions plus every
/// `IMAGES/<partition>.img` it takes whole.
fn claimed_partitions(item_list: &[String]) -> BTreeSet<String> {
    let mut claimed = item_list_to_partition_set(item_list);
    for item in item_list {
        if let Some(image) = item
            .strip_prefix("IMAGES/")
            .and_then(|name| name.strip_suffix(".img"))
        {
            if !image.is_empty() && !image.contains('/') && !image.contains('*') {
                claimed.insert(image.to_lowercase());
            }
        }
    }
    claimed
}

/// Collect every issue with the lists; empty means valid.
pub fn check_config_lists(lists: &ConfigLists<'_>, rules: &ValidationRules) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    let combined: BTreeSet<&str> = lists
        .framework_item_list
        .iter()
        .chain(lists.vendor_item_list)
        .map(String::as_str)
        .collect();
    let missing: BTreeSet<&str> = rules
        .required_items
        .iter()
        .map(String::as_str)
        .filter(|item| !combined.contains(item))
        .collect();
    issues.extend(missing.into_iter().map(|i| ConfigIssue::MissingItem(i.to_string())));

    let framework = claimed_partitions(lists.framework_item_list);
    let vendor = claimed_partitions(lists.vendor_item_list);
    issues.extend(
        framework
            .intersection(&vendor)
            .map(|p| ConfigIssue::SharedPartition(p.clone())),
    );

    for key in &rules.restricted_misc_info_keys {
        if lists.framework_misc_info_keys.contains(key) {
            issues.push(ConfigIssue::RestrictedMiscInfoKey(key.clone()));
        }
    }

    issues
}

/// Validate the lists, logging each issue. Never fails; the caller decides
/// whether `false` aborts the merge.
pub fn validate_config_lists(lists: &ConfigLists<'_>, rules: &ValidationRules) -> bool {
    let issues = check_config_lists(lists, rules);
    for issue in &issues {
        error!("{}", issue);
    }
    issues.is_empty()
}
