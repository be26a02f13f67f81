//! Merge target-files trees
//!
//! Combines a framework-side and a vendor-side target-files tree into one
//! tree: selective item copying, signing manifest merging, misc_info merging,
//! split sepolicy compilation, and a post-merge APEX uniqueness check.

pub mod apex;
pub mod config;
pub mod copy;
pub mod keys;
pub mod misc_info;
pub mod pipeline;
pub mod process;
pub mod sepolicy;
pub mod telemetry;
pub mod validate;

pub use apex::{validate_merged_apex_info, ApexValidationError, DuplicateApex};
pub use config::{ConfigError, MergeConfig, SepolicyConfig};
pub use copy::{copy_items, CopyError, CopySummary, ItemCopier};
pub use keys::{merge_package_keys_txt, merge_package_keys_txt_with, KeyMergeError, KeyMergeOptions};
pub use misc_info::{merge_misc_info_txt, MiscInfoError};
pub use pipeline::{MergeInputs, MergePipeline, MergeReport, PipelineError, PipelineResult};
pub use process::{CommandOutput, CommandRunner, ProcessError, RecordingRunner, SystemRunner};
pub use sepolicy::{compile_split_sepolicy, SepolicyError, SepolicyPlan, SepolicyPlanner};
pub use validate::{item_list_to_partition_set, validate_config_lists, ConfigIssue};
