//! Run SQL scripts against a database.
//!
//! - `litedb run app.db schema.sql seed.sql` runs files in order
//! - `litedb run app.db < script.sql` reads the script from stdin
//! - `--echo` writes each statement before it runs
//! - `--json` writes rows as JSON objects

use anyhow::{Context, Result};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use litedb::config::Settings;
use litedb::script::{Interpreter, JsonRows, RowHandler};

/// Run `files` (or stdin) against `db`, writing output to stdout.
pub fn execute(
    settings: &Settings,
    db: &str,
    files: &[PathBuf],
    echo: bool,
    json: bool,
) -> Result<()> {
    let database = super::open(settings, db)?;
    let out = BufWriter::new(io::stdout().lock());

    let shell = Interpreter::new(&database, out).echo(echo);
    let result = if json {
        run_all(shell.with_rows(JsonRows::default()), files)
    } else {
        run_all(shell, files)
    };

    database.close();
    result
}

fn run_all<W: Write, H: RowHandler>(
    mut shell: Interpreter<'_, W, H>,
    files: &[PathBuf],
) -> Result<()> {
    if files.is_empty() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read script from stdin")?;
        shell.run(&buffer).context("Script failed: <stdin>")?;
    } else {
        for file in files {
            shell
                .run_file(file)
                .with_context(|| format!("Script failed: {}", file.display()))?;
        }
    }

    shell.into_inner().flush().context("Failed to write output")
}
