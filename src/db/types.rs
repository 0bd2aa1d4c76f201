//! Value types shared by the query helpers and the script interpreter.

use rusqlite::types::ValueRef;
use std::fmt;

/// SQL value as returned from a result row.
///
/// Mirrors SQLite's storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Real(f64),
    /// UTF-8 text string
    Text(String),
    /// Binary blob data
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for Value {
    fn from(value_ref: ValueRef<'_>) -> Self {
        match value_ref {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(t) => Self::Text(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(b) => Self::Blob(b.to_vec()),
        }
    }
}

impl Value {
    /// Plain JSON form: blobs become upper case hex strings and non-finite
    /// reals become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Integer(i) => (*i).into(),
            Self::Real(r) => serde_json::Number::from_f64(*r)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(s) => s.as_str().into(),
            Self::Blob(b) => hex::encode_upper(b).into(),
        }
    }
}

/// Shell style rendering: NULL is empty, blobs are hex literals.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => write!(f, "X'{}'", hex::encode_upper(b)),
        }
    }
}

/// A single row returned from a query.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column names in order
    pub columns: Vec<String>,
    /// Values in same order as columns
    pub values: Vec<Value>,
}

impl Row {
    /// Creates a new row with the given columns and values.
    ///
    /// # Panics
    ///
    /// Panics if `columns.len()` != `values.len()`.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Column count ({}) must match value count ({})",
            columns.len(),
            values.len()
        );
        Self { columns, values }
    }

    /// JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_shell_output() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Real(1.5).to_string(), "1.5");
        assert_eq!(Value::Text("abc".into()).to_string(), "abc");
        assert_eq!(Value::Blob(vec![0xde, 0xad]).to_string(), "X'DEAD'");
    }

    #[test]
    fn test_row_to_json_is_keyed_by_column() {
        let row = Row::new(
            vec!["id".into(), "data".into(), "missing".into()],
            vec![Value::Integer(1), Value::Blob(vec![0x0a]), Value::Null],
        );
        assert_eq!(
            row.to_json(),
            serde_json::json!({"id": 1, "data": "0A", "missing": null})
        );
    }

    #[test]
    #[should_panic(expected = "must match")]
    fn test_row_new_rejects_mismatch() {
        let _ = Row::new(vec!["a".into()], vec![]);
    }
}
