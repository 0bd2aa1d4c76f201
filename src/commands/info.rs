//! Read-only listings: pragmas, compile options, tables and versions.

use anyhow::{Context, Result};
use std::io::{self, Write};

use litedb::config::Settings;
use litedb::db::{self, pragma};

/// Print `pragma <name> = <value>` for every listed pragma.
pub fn pragmas(settings: &Settings, db: &str) -> Result<()> {
    let database = super::open(settings, db)?;
    let result = pragma::pragmas(&database, &mut io::stdout().lock());
    database.close();
    result.context("Failed to list pragmas")
}

/// Print one compile option per line.
pub fn compile_options(settings: &Settings, db: &str) -> Result<()> {
    let database = super::open(settings, db)?;
    let result = pragma::compile_options(&database);
    database.close();

    let mut out = io::stdout().lock();
    for option in result.context("Failed to list compile options")? {
        writeln!(out, "{option}")?;
    }
    Ok(())
}

/// Print one table name per line.
pub fn tables(settings: &Settings, db: &str) -> Result<()> {
    let database = super::open(settings, db)?;
    let result = database.tables();
    database.close();

    let mut out = io::stdout().lock();
    for name in result.context("Failed to list tables")? {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Print the litedb and SQLite versions.
pub fn version() {
    let (sqlite, number) = db::version();
    println!("litedb {}", env!("CARGO_PKG_VERSION"));
    println!("sqlite {sqlite} ({number})");
}
