mod commands;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use foldlog_core::LineType;
use foldlog_logging::{init_tracing, LogFormat};

use crate::config::{CliOverrides, ProjectConfig, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "foldlog",
    about = "Summarize client, slot and work unit runs from folding client logs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Working directory used to find foldlog.toml (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Diagnostic log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Diagnostic log format
    #[arg(long, value_enum, global = true)]
    log_format: Option<FormatChoice>,

    /// Also write diagnostics to this file as JSON lines
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Report output format
    #[arg(short, long, value_enum, global = true)]
    output: Option<FormatChoice>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize the client, slot and unit runs in a log
    Summary {
        /// Log file to read
        path: PathBuf,

        /// Print the whole run tree as JSON
        #[arg(long)]
        json: bool,

        /// List every frame under its unit
        #[arg(long)]
        frames: bool,

        /// Read the file with the async reader
        #[arg(long = "async")]
        async_read: bool,
    },
    /// Print each line with its type and parsed data
    Lines {
        /// Log file to read
        path: PathBuf,

        /// Only lines of this type (e.g. WorkUnitFrame)
        #[arg(long = "type")]
        line_type: Option<LineType>,

        /// Only lines whose data failed to parse
        #[arg(long)]
        errors: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<FormatChoice> for LogFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Pretty => LogFormat::Pretty,
            FormatChoice::Json => LogFormat::Json,
            FormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = ProjectConfig::discover(&working_dir)?;

    let (show_frames, async_read) = match &cli.command {
        Command::Summary {
            frames, async_read, ..
        } => (*frames, *async_read),
        Command::Lines { .. } => (false, false),
    };
    let overrides = CliOverrides {
        log_level: cli.log_level.clone(),
        log_format: cli.log_format.map(Into::into),
        log_file: cli.log_file.clone(),
        output: cli.output.map(Into::into),
        show_frames,
        async_read,
    };
    let settings = Settings::resolve(overrides, config.as_ref());

    init_tracing(
        &settings.log_level,
        settings.log_format,
        settings.log_file.as_deref(),
    )
    .context("Failed to initialize logging")?;

    match cli.command {
        Command::Summary { path, json, .. } => commands::summary(&path, &settings, json).await,
        Command::Lines {
            path,
            line_type,
            errors,
        } => commands::lines(&path, &settings, line_type, errors),
    }
}
