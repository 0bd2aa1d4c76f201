//! litedb command line.
//!
//! - `litedb run <db> [FILES...]` runs scripts (stdin when no files given)
//! - `litedb backup <db> <dest>` copies a live database
//! - `litedb pragmas <db>` lists pragma values
//! - `litedb compile-options <db>` lists library compile options
//! - `litedb tables <db>` lists tables
//! - `litedb version` prints version information

mod commands;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::warn;

use litedb::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "litedb")]
#[command(author, version, about = "SQLite scripts, pragmas and online backups", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file [default: ./litedb.toml when present]
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run SQL scripts against a database
    Run {
        /// Database file
        db: String,

        /// Script files, run in order [default: read stdin]
        files: Vec<PathBuf>,

        /// Write each statement before running it
        #[arg(long)]
        echo: bool,

        /// Write rows as JSON objects instead of tab separated values
        #[arg(long)]
        json: bool,
    },

    /// Copy a live database with the online backup API
    Backup {
        /// Source database file
        db: String,

        /// Destination file, replaced if it exists
        dest: PathBuf,

        /// Pages per step [default: backup_step setting]
        #[arg(long)]
        step: Option<i32>,
    },

    /// List pragma values
    Pragmas {
        /// Database file
        db: String,
    },

    /// List the options SQLite was compiled with
    CompileOptions {
        /// Database file
        db: String,
    },

    /// List tables in the main schema
    Tables {
        /// Database file
        db: String,
    },

    /// Print litedb and SQLite versions
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            db,
            files,
            echo,
            json,
        } => commands::run::execute(&settings, &db, &files, echo, json),
        Commands::Backup { db, dest, step } => {
            commands::backup::execute(&settings, &db, &dest, step)
        }
        Commands::Pragmas { db } => commands::info::pragmas(&settings, &db),
        Commands::CompileOptions { db } => commands::info::compile_options(&settings, &db),
        Commands::Tables { db } => commands::info::tables(&settings, &db),
        Commands::Version => {
            commands::info::version();
            Ok(())
        }
    }
}

/// Load and validate settings, logging any warnings.
fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    for warning in settings.validate()?.warnings {
        warn!("{warning}");
    }
    Ok(settings)
}

/// Install the stderr subscriber. `-v` forces debug, otherwise `RUST_LOG`
/// applies with `warn` as the fallback.
fn init_logging(verbose: bool, format: LogFormat) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(layer).init(),
        LogFormat::Json => registry.with(layer.json()).init(),
    }
}
