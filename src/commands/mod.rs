//! CLI command implementations for litedb.
//!
//! - [`run`] - Script execution from files or stdin
//! - [`backup`] - Online backup with progress output
//! - [`info`] - Pragma, compile option, table and version listings

pub mod backup;
pub mod info;
pub mod run;

use anyhow::{Context, Result};

use litedb::config::Settings;
use litedb::db::Database;

/// Open `db` through the driver described by `settings`.
pub fn open(settings: &Settings, db: &str) -> Result<Database> {
    settings
        .options()
        .open(db)
        .with_context(|| format!("Failed to open database: {db}"))
}
