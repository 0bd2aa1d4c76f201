//! Pragma and compile option listings.
//!
//! Only single-value pragmas that describe the main database are listed.
//! Pragmas that affect other databases or return several columns
//! (`collation_list`, `database_list`, `foreign_key_check`,
//! `foreign_key_list`, `quick_check`, `wal_checkpoint`) are left out.

use std::io::Write;

use super::{Database, Value};
use crate::error::Result;

/// Pragmas reported by [`pragmas`].
pub const PRAGMAS: &[&str] = &[
    "application_id",
    "auto_vacuum",
    "automatic_index",
    "busy_timeout",
    "cache_size",
    "cache_spill",
    "cell_size_check",
    "checkpoint_fullfsync",
    "compile_options",
    "data_version",
    "defer_foreign_keys",
    "encoding",
    "foreign_keys",
    "freelist_count",
    "fullfsync",
    "journal_mode",
    "journal_size_limit",
    "legacy_file_format",
    "locking_mode",
    "max_page_count",
    "mmap_size",
    "page_count",
    "page_size",
    "query_only",
    "read_uncommitted",
    "recursive_triggers",
    "reverse_unordered_selects",
    "schema_version",
    "secure_delete",
    "soft_heap_limit",
    "synchronous",
    "temp_store",
    "threads",
    "user_version",
    "wal_autocheckpoint",
];

/// Current value of a single pragma; empty when it returns nothing.
pub fn pragma_value(db: &Database, name: &str) -> Value {
    db.with_connection(|conn| {
        conn.query_row(&format!("PRAGMA {name}"), [], |row| {
            row.get_ref(0).map(Value::from)
        })
    })
    .unwrap_or(Value::Null)
}

/// Writes `pragma <name> = <value>` for every entry in [`PRAGMAS`].
pub fn pragmas(db: &Database, out: &mut dyn Write) -> Result<()> {
    for name in PRAGMAS {
        writeln!(out, "pragma {name} = {}", pragma_value(db, name))?;
    }
    Ok(())
}

/// Options the SQLite library was compiled with.
pub fn compile_options(db: &Database) -> Result<Vec<String>> {
    let options = db.with_connection(|conn| {
        let mut stmt = conn.prepare("PRAGMA compile_options")?;
        stmt.query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
    })?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Drivers, Options, Registry};
    use std::sync::Arc;

    fn memory_db() -> Database {
        Options::new()
            .with_drivers(Arc::new(Drivers::new(Arc::new(Registry::new()))))
            .open(":memory:")
            .unwrap()
    }

    #[test]
    fn test_pragma_list_is_complete() {
        assert_eq!(PRAGMAS.len(), 35);
        assert!(!PRAGMAS.contains(&"database_list"));
    }

    #[test]
    fn test_pragmas_writes_one_line_each() {
        let db = memory_db();
        let mut out = Vec::new();
        pragmas(&db, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), PRAGMAS.len());
        assert!(text.contains("pragma encoding = UTF-8"));
        assert!(text.contains("pragma user_version = 0"));
    }

    #[test]
    fn test_unknown_pragma_is_empty() {
        let db = memory_db();
        assert_eq!(pragma_value(&db, "not_a_pragma"), Value::Null);
    }

    #[test]
    fn test_compile_options_not_empty() {
        let db = memory_db();
        let options = compile_options(&db).unwrap();
        assert!(!options.is_empty());
    }
}
