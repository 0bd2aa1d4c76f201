//! Online backup command.
//!
//! Prints `pagecount: <N> remaining: <M>` after every step and a summary on
//! stderr when the copy completes.

use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use std::time::Instant;

use litedb::config::Settings;
use litedb::db::backup;

use crate::utils::{file_size, format_bytes};

/// Back `db` up to `dest`, `step` pages at a time.
pub fn execute(settings: &Settings, db: &str, dest: &Path, step: Option<i32>) -> Result<()> {
    let step = step.unwrap_or(settings.backup_step);
    if step <= 0 {
        anyhow::bail!("--step must be positive (got: {step})");
    }

    let database = super::open(settings, db)?;
    let started = Instant::now();
    let result = backup::backup(&database, dest, step, &mut io::stdout().lock())
        .with_context(|| format!("Backup of {db} to {} failed", dest.display()));
    database.close();
    result?;

    eprintln!(
        "Backed up {db} to {} ({}) in {:.2?}",
        dest.display(),
        format_bytes(file_size(dest)),
        started.elapsed()
    );
    Ok(())
}
