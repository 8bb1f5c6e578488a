//! patdex: patent XML dump ingester
//!
//! Loads weekly grant and application dumps into a searchable index.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use patdex::config::{Config, LogFormat};
use patdex::PatentType;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "patdex")]
#[command(about = "Ingest patent-office XML dumps into a searchable index")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "patdex.toml")]
    config: PathBuf,

    /// Data directory (overrides store.data_dir)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a grant or application dump
    Ingest {
        /// Kind of documents in the dump
        #[arg(short = 'd', long, value_enum, default_value = "application")]
        patent_type: CliPatentType,

        /// Path to dump file (defaults to ingest.{type}_data_path)
        path: Option<PathBuf>,

        /// Maximum fragments to process
        #[arg(long)]
        max_docs: Option<usize>,

        /// Resume from checkpoint
        #[arg(long)]
        resume: bool,

        /// Checkpoint file path
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Quiet mode (no progress output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the stored record for an application number
    Show {
        app_doc_id: String,
    },

    /// Show ingest checkpoint status
    IngestStatus {
        /// Path to checkpoint file
        checkpoint: PathBuf,
    },

    /// Initialize a new patdex configuration
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// CLI patent type enum (mirrors PatentType but with clap support)
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliPatentType {
    Application,
    Grant,
}

impl From<CliPatentType> for PatentType {
    fn from(value: CliPatentType) -> Self {
        match value {
            CliPatentType::Application => PatentType::Application,
            CliPatentType::Grant => PatentType::Grant,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // `init` must work before any configuration exists
    if let Commands::Init { ref path } = cli.command {
        init_logging(&Config::default(), cli.verbose)?;
        return commands::init_config(path.clone());
    }

    let mut config = Config::load_or_default(&cli.config)?;
    init_logging(&config, cli.verbose)?;

    // Override data dir if specified
    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = data_dir;
    }

    match cli.command {
        Commands::Ingest {
            patent_type,
            path,
            max_docs,
            resume,
            checkpoint,
            quiet,
        } => commands::ingest_dump(
            &config,
            patent_type.into(),
            path,
            max_docs,
            resume,
            checkpoint,
            quiet,
        ),
        Commands::Show { app_doc_id } => commands::show_patent(&config, &app_doc_id),
        Commands::IngestStatus { checkpoint } => commands::show_ingest_status(checkpoint),
        Commands::Init { .. } => Ok(()),
    }
}

/// `RUST_LOG` takes precedence over the configured level
fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let level = config.logging.level.raised_by(verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    match config.logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
