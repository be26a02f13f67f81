//! Merge orchestration
//!
//! Sequences the merge components over a framework tree and a vendor tree:
//! - Validate the item lists (nothing is copied if this fails)
//! - Copy framework items, then vendor items
//! - Merge the META signing manifests and misc_info.txt
//! - Plan and run the split sepolicy compile
//! - Check the merged tree for duplicate APEX packages
//!
//! Every step is fail-fast. A failure part-way leaves a partially populated
//! output directory that the caller is expected to discard.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn};

use crate::apex::{validate_merged_apex_info, ApexValidationError};
use crate::config::{ConfigError, MergeConfig};
use crate::copy::{copy_items, CopyError, CopySummary};
use crate::keys::{merge_package_keys_txt_with, KeyMergeError, KeyMergeOptions, PartitionFilter};
use crate::misc_info::{merge_misc_info_txt, MiscInfoError, MISC_INFO_TXT};
use crate::process::{run_checked, CommandRunner, ProcessError};
use crate::sepolicy::{SepolicyError, SepolicyPlanner};
use crate::validate::{check_config_lists, item_list_to_partition_set, ConfigIssue};

/// Metadata directory inside a target-files tree
pub const META_DIR: &str = "META";

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid merge config: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidConfig(Vec<ConfigIssue>),

    #[error("copy error: {0}")]
    Copy(#[from] CopyError),

    #[error("key manifest error: {0}")]
    Keys(#[from] KeyMergeError),

    #[error("misc info error: {0}")]
    MiscInfo(#[from] MiscInfoError),

    #[error("sepolicy error: {0}")]
    Sepolicy(#[from] SepolicyError),

    #[error("sepolicy compile failed: {0}")]
    Compile(#[from] ProcessError),

    #[error("apex validation error: {0}")]
    Apex(#[from] ApexValidationError),

    #[error("cannot serialize merge report: {0}")]
    Report(#[from] serde_json::Error),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) | PipelineError::InvalidConfig(_) => 2,
            PipelineError::Copy(_) => 3,
            PipelineError::Keys(e) if e.conflicting_name().is_some() => 10,
            PipelineError::Keys(_) => 3,
            PipelineError::MiscInfo(_) => 3,
            PipelineError::Sepolicy(SepolicyError::VersionMismatch { .. }) => 11,
            PipelineError::Sepolicy(_) => 3,
            PipelineError::Compile(_) => 20,
            PipelineError::Apex(ApexValidationError::Duplicate { .. }) => 12,
            PipelineError::Apex(_) => 3,
            PipelineError::Report(_) => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// The three trees a merge works on
#[derive(Debug, Clone)]
pub struct MergeInputs {
    pub framework_dir: PathBuf,
    pub vendor_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// What a completed merge did
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub framework_partitions: BTreeSet<String>,
    pub vendor_partitions: BTreeSet<String>,
    pub framework_files: usize,
    pub framework_symlinks: usize,
    pub vendor_files: usize,
    pub vendor_symlinks: usize,
    /// Manifest file name → merged record count
    pub key_manifests: BTreeMap<String, usize>,
    pub misc_info_merged: bool,
    /// Compiler command that was run, if sepolicy was compiled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sepolicy_command: Option<Vec<String>>,
    /// APEX package → owning partition
    pub apex_packages: BTreeMap<String, String>,
}

impl MergeReport {
    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs a merge with an explicit config and command runner
pub struct MergePipeline<'a, R: CommandRunner> {
    config: &'a MergeConfig,
    runner: &'a R,
}

impl<'a, R: CommandRunner> MergePipeline<'a, R> {
    pub fn new(config: &'a MergeConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    /// Check the config lists without touching any tree
    pub fn validate(&self) -> PipelineResult<()> {
        let issues = check_config_lists(&self.config.config_lists(), &self.config.validation_rules());
        if issues.is_empty() {
            return Ok(());
        }
        for issue in &issues {
            tracing::error!("{}", issue);
        }
        Err(PipelineError::InvalidConfig(issues))
    }

    /// Run every merge step in order
    pub fn run(&self, inputs: &MergeInputs) -> PipelineResult<MergeReport> {
        let _span = info_span!("merge", output = %inputs.output_dir.display()).entered();
        let mut report = MergeReport::default();

        self.validate()?;
        report.framework_partitions = item_list_to_partition_set(&self.config.framework_item_list);
        report.vendor_partitions = item_list_to_partition_set(&self.config.vendor_item_list);

        let framework = self.copy_side("framework", &inputs.framework_dir, &inputs.output_dir, &self.config.framework_item_list)?;
        report.framework_files = framework.files;
        report.framework_symlinks = framework.symlinks;

        let vendor = self.copy_side("vendor", &inputs.vendor_dir, &inputs.output_dir, &self.config.vendor_item_list)?;
        report.vendor_files = vendor.files;
        report.vendor_symlinks = vendor.symlinks;

        let framework_meta = inputs.framework_dir.join(META_DIR);
        let vendor_meta = inputs.vendor_dir.join(META_DIR);
        let output_meta = inputs.output_dir.join(META_DIR);

        report.key_manifests = self.merge_key_manifests(&framework_meta, &vendor_meta, &output_meta, &report)?;

        if framework_meta.join(MISC_INFO_TXT).exists() && vendor_meta.join(MISC_INFO_TXT).exists() {
            merge_misc_info_txt(
                &framework_meta,
                &vendor_meta,
                &output_meta,
                &self.config.framework_misc_info_keys,
            )?;
            report.misc_info_merged = true;
        }

        if self.config.sepolicy.enabled {
            let plan = SepolicyPlanner::new(&self.config.sepolicy.compiler)
                .plan(&inputs.output_dir, &self.config.partition_map)?;
            info!(version = plan.version.kernel, fragments = plan.fragments.len(), "compiling split sepolicy");
            run_checked(self.runner, &plan.command)?;
            report.sepolicy_command = Some(plan.command);
        }

        let apex_partitions: Vec<&String> = report
            .framework_partitions
            .union(&report.vendor_partitions)
            .filter(|p| self.config.apex_partitions.contains(*p))
            .collect();
        report.apex_packages = validate_merged_apex_info(&inputs.output_dir, &apex_partitions)?;

        info!("merge complete");
        Ok(report)
    }

    fn copy_side(
        &self,
        side: &str,
        from_dir: &Path,
        to_dir: &Path,
        items: &[String],
    ) -> PipelineResult<CopySummary> {
        let summary = copy_items(from_dir, to_dir, items)?;
        info!(side, files = summary.files, symlinks = summary.symlinks, "copied items");
        Ok(summary)
    }

    fn merge_key_manifests(
        &self,
        framework_meta: &Path,
        vendor_meta: &Path,
        output_meta: &Path,
        report: &MergeReport,
    ) -> PipelineResult<BTreeMap<String, usize>> {
        let options = KeyMergeOptions {
            allow_duplicate_keys: self.config.allow_duplicate_apkapex_keys,
            partition_filter: self
                .config
                .filter_key_manifests_by_partition
                .then(|| PartitionFilter {
                    framework: report.framework_partitions.clone(),
                    vendor: report.vendor_partitions.clone(),
                }),
        };

        let mut merged = BTreeMap::new();
        for file_name in &self.config.key_manifests {
            let in_framework = framework_meta.join(file_name).exists();
            let in_vendor = vendor_meta.join(file_name).exists();
            if !in_framework && !in_vendor {
                warn!(file = %file_name, "key manifest absent from both trees, skipping");
                continue;
            }
            let manifest = merge_package_keys_txt_with(
                framework_meta,
                vendor_meta,
                output_meta,
                file_name,
                &options,
            )?;
            merged.insert(file_name.clone(), manifest.len());
        }
        Ok(merged)
    }
}
