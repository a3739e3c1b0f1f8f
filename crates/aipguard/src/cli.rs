use crate::tracing::{LogLevel, TracingFormat};
use aipguard_core::Settings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aipguard")]
#[command(about = "Provision Google's api-linter and lint .proto files against the AIP rules")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = "AIPGUARD_DATA_DIR",
        help = "Directory for the managed api-linter and proto corpora"
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "AIPGUARD_EXECUTABLE",
        help = "Use this api-linter instead of downloading one"
    )]
    pub executable: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "AIPGUARD_SETTINGS",
        help = "JSON settings file; command-line flags take precedence"
    )]
    pub settings: Option<PathBuf>,

    #[arg(
        short = 'l',
        long,
        global = true,
        env = "AIPGUARD_LOG_LEVEL",
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub log_level: LogLevel,

    #[arg(
        long,
        global = true,
        env = "AIPGUARD_LOG_FORMAT",
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Download api-linter and the proto corpora if missing or stale")]
    Ensure,
    #[command(about = "Check for a newer api-linter release and install it")]
    Update {
        #[arg(short = 'y', long, help = "Install without asking")]
        yes: bool,
    },
    #[command(about = "Lint .proto files")]
    Lint(LintArgs),
    #[command(about = "Show the documentation for a rule")]
    Explain {
        #[arg(help = "Rule documentation URI, e.g. https://linter.aip.dev/131/http-method")]
        uri: String,
    },
}

#[derive(Args, Debug)]
pub struct LintArgs {
    #[arg(required = true, help = "Files to lint")]
    pub files: Vec<PathBuf>,

    #[arg(
        long,
        env = "AIPGUARD_WORKSPACE_ROOT",
        help = "Workspace root for ${workspaceFolder} and workspace-local corpora"
    )]
    pub workspace_root: Option<PathBuf>,

    #[arg(short = 'I', long = "proto-path", help = "Additional import path")]
    pub import_paths: Vec<String>,

    #[arg(long = "disable-rule", help = "Disable a rule")]
    pub disabled_rules: Vec<String>,

    #[arg(long = "enable-rule", help = "Enable a rule")]
    pub enabled_rules: Vec<String>,

    #[arg(long = "descriptor-set-in", help = "Descriptor set file")]
    pub descriptor_sets: Vec<String>,

    #[arg(long = "config", help = "api-linter configuration file")]
    pub config_file: Option<String>,

    #[arg(long, help = "Ignore (-- api-linter: ... --) comments")]
    pub ignore_comment_disables: bool,

    #[arg(long, help = "Exit with status 1 when problems are found")]
    pub set_exit_status: bool,

    #[arg(long, help = "Print diagnostics as JSON")]
    pub json: bool,

    #[arg(long, help = "Include rule documentation with each diagnostic")]
    pub explain: bool,
}

impl Cli {
    /// Merge the flags over `base` settings.
    pub fn apply_to(&self, mut settings: Settings) -> Settings {
        if let Some(dir) = &self.data_dir {
            settings.data_dir = Some(dir.clone());
        }
        if let Some(executable) = &self.executable {
            settings.executable_path = Some(executable.clone());
        }

        if let Commands::Lint(args) = &self.command {
            settings.import_paths.extend(args.import_paths.iter().cloned());
            settings
                .disabled_rules
                .extend(args.disabled_rules.iter().cloned());
            settings
                .enabled_rules
                .extend(args.enabled_rules.iter().cloned());
            settings
                .descriptor_sets
                .extend(args.descriptor_sets.iter().cloned());
            if args.config_file.is_some() {
                settings.config_file.clone_from(&args.config_file);
            }
            settings.ignore_comment_disables |= args.ignore_comment_disables;
            settings.set_exit_status |= args.set_exit_status;
        }

        settings
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
