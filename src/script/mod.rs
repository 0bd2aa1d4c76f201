//! Script interpreter for SQL buffers with shell style directives.
//!
//! A script is plain SQL with optional directive lines:
//!
//! - `.echo <bool>` writes each statement before it runs
//! - `.read <path>` runs another script file with the same database and sink
//! - `.print <text>` writes a line of text
//! - `.tables` lists the tables of the main schema
//!
//! A unit may hold several statements on one line. Each statement starting
//! with `SELECT` goes through the row path and every row is handed to a
//! [`RowHandler`]. Everything else is executed with its rows, if any,
//! discarded. The first failing statement aborts the buffer.
//!
//! # Example
//!
//! ```ignore
//! use litedb::db::Database;
//! use litedb::script::Interpreter;
//!
//! let db = Database::open("data/app.db")?;
//! let mut shell = Interpreter::new(&db, std::io::stdout()).echo(true);
//! shell.run("CREATE TABLE t (a);\nINSERT INTO t VALUES (1);\nSELECT a FROM t;\n")?;
//! ```

pub mod lexer;
mod rows;

#[cfg(test)]
mod property_tests;

pub use lexer::{Directive, Step};
pub use rows::{JsonRows, RowHandler, TabRows};

use rusqlite::Batch;
use rusqlite::fallible_iterator::FallibleIterator;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::db::{Database, Value};
use crate::error::{Error, Result, StatementKind};

/// Deepest `.read` nesting before a file is assumed to read itself.
pub const MAX_READ_DEPTH: usize = 64;

/// Runs script buffers against one database, writing output to `W`.
pub struct Interpreter<'db, W: Write, H: RowHandler = TabRows> {
    db: &'db Database,
    out: W,
    rows: H,
    echo: bool,
    depth: usize,
}

impl<'db, W: Write> Interpreter<'db, W> {
    /// Interpreter with tab separated row output and echo off.
    pub fn new(db: &'db Database, out: W) -> Self {
        Self {
            db,
            out,
            rows: TabRows,
            echo: false,
            depth: 0,
        }
    }
}

impl<'db, W: Write, H: RowHandler> Interpreter<'db, W, H> {
    /// Replaces the row handler.
    pub fn with_rows<R: RowHandler>(self, rows: R) -> Interpreter<'db, W, R> {
        Interpreter {
            db: self.db,
            out: self.out,
            rows,
            echo: self.echo,
            depth: self.depth,
        }
    }

    /// Sets the initial echo mode.
    #[must_use]
    pub fn echo(mut self, on: bool) -> Self {
        self.echo = on;
        self
    }

    pub fn echo_enabled(&self) -> bool {
        self.echo
    }

    /// Consumes the interpreter and returns the output sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Runs every directive and statement in `buffer`.
    ///
    /// # Errors
    ///
    /// Stops at the first failing statement or directive and returns its
    /// error. Statements before it stay applied.
    pub fn run(&mut self, buffer: &str) -> Result<()> {
        let text = lexer::strip_comments(buffer);
        for step in lexer::steps(&text) {
            match step? {
                Step::Directive(directive) => self.directive(directive)?,
                Step::Statement(unit) => self.dispatch(&unit)?,
            }
        }
        Ok(())
    }

    /// Reads `path` and runs it as a buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`run`](Self::run).
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        self.run(&text)
    }

    fn directive(&mut self, directive: Directive) -> Result<()> {
        match directive {
            Directive::Echo(on) => self.echo = on,
            Directive::Print(text) => writeln!(self.out, "{text}")?,
            Directive::Tables => {
                for name in self.db.tables().map_err(Error::Tables)? {
                    writeln!(self.out, "{name}")?;
                }
            }
            Directive::Read(path) => self.read(path)?,
        }
        Ok(())
    }

    fn read(&mut self, path: PathBuf) -> Result<()> {
        if self.depth >= MAX_READ_DEPTH {
            return Err(Error::ReadDepth {
                path,
                depth: MAX_READ_DEPTH,
            });
        }
        debug!(path = %path.display(), depth = self.depth + 1, "reading script");

        let echo = self.echo;
        self.depth += 1;
        let result = self.run_file(&path);
        self.depth -= 1;
        self.echo = echo;

        result.map_err(|source| Error::ReadFile {
            path,
            source: Box::new(source),
        })
    }

    /// Runs every statement of `unit`, routing each one on its own leading
    /// keyword: `SELECT` rows go to the row handler, anything else is stepped
    /// to completion with its rows discarded.
    fn dispatch(&mut self, unit: &str) -> Result<()> {
        if self.echo {
            writeln!(self.out, "{unit}")?;
        }
        debug!(statement = unit, "dispatch");

        let Self { db, out, rows, .. } = self;
        let mut kind = kind_of(unit);
        let result = db.with_connection(|conn| -> Result<()> {
            let mut batch = Batch::new(conn, unit);
            while let Some(mut stmt) = batch.next()? {
                kind = stmt.expanded_sql().map_or(kind, |sql| kind_of(&sql));
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();
                let mut cursor = stmt.raw_query();
                let mut first = true;
                while let Some(row) = cursor.next()? {
                    if kind == StatementKind::Exec {
                        continue;
                    }
                    let values = (0..columns.len())
                        .map(|i| row.get_ref(i).map(Value::from))
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows.row(&mut *out, first.then_some(columns.as_slice()), &values)?;
                    first = false;
                }
            }
            Ok(())
        });

        result.map_err(|err| match err {
            Error::Sqlite(source) => Error::statement(kind, unit, db.filename(), source),
            other => other,
        })
    }
}

impl<W: Write, H: RowHandler> std::fmt::Debug for Interpreter<'_, W, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("db", self.db)
            .field("echo", &self.echo)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// Path a statement takes, from its leading keyword.
fn kind_of(sql: &str) -> StatementKind {
    let query = sql
        .trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("SELECT"));
    if query {
        StatementKind::Query
    } else {
        StatementKind::Exec
    }
}

/// Runs `buffer` against `db` with tab separated row output.
///
/// # Errors
///
/// See [`Interpreter::run`].
pub fn commands(db: &Database, buffer: &str, echo: bool, out: &mut dyn Write) -> Result<()> {
    Interpreter::new(db, out).echo(echo).run(buffer)
}

/// Runs the script file at `path` against `db` with tab separated row output.
///
/// # Errors
///
/// See [`Interpreter::run_file`].
pub fn file(db: &Database, path: impl AsRef<Path>, echo: bool, out: &mut dyn Write) -> Result<()> {
    Interpreter::new(db, out).echo(echo).run_file(path)
}
