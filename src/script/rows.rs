//! Row output for `SELECT` units.

use std::io::{self, Write};

use crate::db::{Row, Value};

/// Receives every row produced by a `SELECT` unit.
///
/// `columns` is `Some` on the first row of each statement and `None` on the
/// rows that follow. Closures with the same signature implement the trait.
pub trait RowHandler {
    fn row(
        &mut self,
        out: &mut dyn Write,
        columns: Option<&[String]>,
        values: &[Value],
    ) -> io::Result<()>;
}

impl<F> RowHandler for F
where
    F: FnMut(&mut dyn Write, Option<&[String]>, &[Value]) -> io::Result<()>,
{
    fn row(
        &mut self,
        out: &mut dyn Write,
        columns: Option<&[String]>,
        values: &[Value],
    ) -> io::Result<()> {
        self(out, columns, values)
    }
}

/// Tab separated values with a header line before the first row.
#[derive(Debug, Default, Clone, Copy)]
pub struct TabRows;

impl RowHandler for TabRows {
    fn row(
        &mut self,
        out: &mut dyn Write,
        columns: Option<&[String]>,
        values: &[Value],
    ) -> io::Result<()> {
        if let Some(columns) = columns {
            writeln!(out, "{}", columns.join("\t"))?;
        }
        let line: Vec<String> = values.iter().map(ToString::to_string).collect();
        writeln!(out, "{}", line.join("\t"))
    }
}

/// One JSON object per row, keyed by column name.
#[derive(Debug, Default, Clone)]
pub struct JsonRows {
    columns: Vec<String>,
}

impl RowHandler for JsonRows {
    fn row(
        &mut self,
        out: &mut dyn Write,
        columns: Option<&[String]>,
        values: &[Value],
    ) -> io::Result<()> {
        if let Some(columns) = columns {
            self.columns = columns.to_vec();
        }
        let row = Row::new(self.columns.clone(), values.to_vec());
        serde_json::to_writer(&mut *out, &row.to_json())?;
        writeln!(out)
    }
}
