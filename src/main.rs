//! merge-target-files CLI
//!
//! Entry point for the `merge-target-files` command-line tool.

use clap::{Args, Parser, Subcommand};
use merge_target_files::config::load_list_file;
use merge_target_files::{
    telemetry, ConfigError, MergeConfig, MergeInputs, MergePipeline, PipelineError, SystemRunner,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "merge-target-files")]
#[command(about = "Merge framework and vendor target-files trees", version)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the two trees into the output directory
    Merge {
        /// Extracted framework target-files directory
        #[arg(long)]
        framework_dir: PathBuf,

        /// Extracted vendor target-files directory
        #[arg(long)]
        vendor_dir: PathBuf,

        /// Output directory for the merged tree
        #[arg(long)]
        output_dir: PathBuf,

        #[command(flatten)]
        overrides: ConfigArgs,

        /// Print the merge report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Check the merge config without touching any tree
    Validate {
        #[command(flatten)]
        overrides: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML config file (defaults are built in)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// File listing framework item patterns, one per line
    #[arg(long)]
    framework_item_list: Option<PathBuf>,

    /// File listing vendor item patterns, one per line
    #[arg(long)]
    vendor_item_list: Option<PathBuf>,

    /// File listing framework-owned misc_info.txt keys, one per line
    #[arg(long)]
    framework_misc_info_keys: Option<PathBuf>,

    /// Keep the framework record when both sides sign a package differently
    #[arg(long)]
    allow_duplicate_apkapex_keys: bool,

    /// Skip the split sepolicy compile
    #[arg(long)]
    skip_sepolicy: bool,

    /// Policy compiler binary
    #[arg(long)]
    sepolicy_compiler: Option<String>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<MergeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => MergeConfig::load(path)?,
            None => MergeConfig::default(),
        };

        let list = |path: &Option<PathBuf>| path.as_deref().map(load_list_file).transpose();
        if let Some(items) = list(&self.framework_item_list)? {
            config.framework_item_list = items;
        }
        if let Some(items) = list(&self.vendor_item_list)? {
            config.vendor_item_list = items;
        }
        if let Some(keys) = list(&self.framework_misc_info_keys)? {
            config.framework_misc_info_keys = keys;
        }
        if self.allow_duplicate_apkapex_keys {
            config.allow_duplicate_apkapex_keys = true;
        }
        if self.skip_sepolicy {
            config.sepolicy.enabled = false;
        }
        if let Some(compiler) = &self.sepolicy_compiler {
            config.sepolicy.compiler = compiler.clone();
        }
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let result = match cli.command {
        Commands::Merge {
            framework_dir,
            vendor_dir,
            output_dir,
            overrides,
            json,
        } => run_merge(
            &overrides,
            MergeInputs {
                framework_dir,
                vendor_dir,
                output_dir,
            },
            json,
        ),
        Commands::Validate { overrides } => run_validate(&overrides),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run_merge(overrides: &ConfigArgs, inputs: MergeInputs, json: bool) -> Result<(), PipelineError> {
    check_dir(&inputs.framework_dir)?;
    check_dir(&inputs.vendor_dir)?;

    let config = overrides.resolve()?;
    let runner = SystemRunner;
    let report = MergePipeline::new(&config, &runner).run(&inputs)?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!(
            "Merged into {}: {} framework files, {} vendor files, {} APEX packages",
            inputs.output_dir.display(),
            report.framework_files + report.framework_symlinks,
            report.vendor_files + report.vendor_symlinks,
            report.apex_packages.len()
        );
    }
    Ok(())
}

fn run_validate(overrides: &ConfigArgs) -> Result<(), PipelineError> {
    let config = overrides.resolve()?;
    let runner = SystemRunner;
    MergePipeline::new(&config, &runner).validate()?;
    println!("Config is valid");
    Ok(())
}

fn check_dir(path: &Path) -> Result<(), PipelineError> {
    if path.is_dir() {
        return Ok(());
    }
    Err(ConfigError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
    }
    .into())
}
