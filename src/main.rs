use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use eyre::{Context, Result, eyre};
use issue_md_export::sequential;
use issue_md_export::utils::ExportConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Convert exported issue-tracker JSON records into Markdown files.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding one JSON file per issue (and optionally `attachments/`).
    #[arg(value_name = "SOURCE_DIR")]
    source_dir: Option<PathBuf>,

    /// Directory to write markdown files to. Created if missing.
    #[arg(value_name = "TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// JSON file listing extra `simple_fields` and `sections` to render.
    #[arg(long, value_name = "PATH")]
    custom_data: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/issue-md-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print each file written.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress standard output (progress bar and summary).
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default, Debug)]
struct FileConfig {
    source_dir: Option<PathBuf>,
    target_dir: Option<PathBuf>,
    custom_data: Option<PathBuf>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("issue-md-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

/// Merge CLI and config file (CLI wins). Source and target have no default, and the
/// source must be an existing directory; anything else is a usage error.
fn resolve_config(cli: Cli, file_cfg: FileConfig) -> Result<ExportConfig, clap::Error> {
    let missing = |name: &str| {
        Cli::command().error(
            ErrorKind::MissingRequiredArgument,
            format!("the following required argument was not provided: <{name}>"),
        )
    };

    let source_dir = cli
        .source_dir
        .or(file_cfg.source_dir)
        .ok_or_else(|| missing("SOURCE_DIR"))?;
    let target_dir = cli
        .target_dir
        .or(file_cfg.target_dir)
        .ok_or_else(|| missing("TARGET_DIR"))?;

    if !source_dir.is_dir() {
        return Err(Cli::command().error(
            ErrorKind::ValueValidation,
            format!("source directory not found: {}", source_dir.display()),
        ));
    }

    Ok(ExportConfig {
        source_dir,
        target_dir,
        custom_data: cli.custom_data.or(file_cfg.custom_data),
        verbose: cli.verbose,
        quiet: cli.quiet,
    })
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("ISSUE_MD_EXPORT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| eyre!("failed to initialize tracing subscriber: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let file_cfg = load_file_config(cli.config.as_deref())?;
    let config = resolve_config(cli, file_cfg).unwrap_or_else(|e| e.exit());

    sequential::execute(&config)?;
    Ok(())
}
