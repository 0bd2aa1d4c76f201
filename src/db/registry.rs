//! Registry of native connections keyed by canonical database file.
//!
//! The logical [`Database`](super::Database) handle does not expose its
//! native connection, yet an online backup has to drive the SQLite backup
//! API against it. Every connection established through a
//! [`Driver`](super::Driver) is therefore recorded here under the canonical
//! path of its backing file, and the backup engine resolves connections by
//! path.
//!
//! Entries are never evicted: backups may be requested at any time against
//! a still-open handle, and the number of distinct files per process is
//! small. A path re-registered by a newer connection replaces the previous
//! entry. The only removal is the rollback of a connection whose connect
//! hook failed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::NativeConnection;

/// Key and replaced entry of a registration.
pub(crate) type Registration = (PathBuf, Option<NativeConnection>);

static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

/// Thread-safe map from canonical file path to native connection.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<PathBuf, NativeConnection>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by the default driver table.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Records `conn` as the native connection backing `path`.
    ///
    /// Empty and in-memory paths are ignored.
    pub fn register(&self, path: impl AsRef<Path>, conn: NativeConnection) {
        let _ = self.swap(path, conn);
    }

    /// Registers like [`register`](Self::register) and returns what it replaced,
    /// so the caller can [`restore`](Self::restore) it if the connection is
    /// later rejected.
    pub(crate) fn swap(
        &self,
        path: impl AsRef<Path>,
        conn: NativeConnection,
    ) -> Option<Registration> {
        let key = canonical(path.as_ref())?;
        debug!(path = %key.display(), "registering native connection");
        let previous = self.entries.lock().insert(key.clone(), conn);
        Some((key, previous))
    }

    /// Undoes a [`swap`](Self::swap) if `failed` is still the registered entry.
    pub(crate) fn restore(
        &self,
        key: PathBuf,
        previous: Option<NativeConnection>,
        failed: &NativeConnection,
    ) {
        let mut entries = self.entries.lock();
        if !entries.get(&key).is_some_and(|current| Arc::ptr_eq(current, failed)) {
            return;
        }
        match previous {
            Some(conn) => entries.insert(key, conn),
            None => entries.remove(&key),
        };
    }

    /// Returns the native connection registered for `path`, if any.
    pub fn lookup(&self, path: impl AsRef<Path>) -> Option<NativeConnection> {
        let key = canonical(path.as_ref())?;
        self.entries.lock().get(&key).cloned()
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("Registry")
            .field("paths", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Canonical registry key for a database path.
///
/// Resolves symlinks when the file exists, otherwise falls back to the
/// absolute form so registration and lookup agree before the file is
/// created. Returns `None` for paths that never identify a file.
pub fn canonical(path: &Path) -> Option<PathBuf> {
    let text = path.as_os_str();
    if text.is_empty() || text == ":memory:" {
        return None;
    }
    match std::fs::canonicalize(path) {
        Ok(resolved) => Some(resolved),
        Err(_) => std::path::absolute(path).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::thread;
    use tempfile::TempDir;

    fn memory_conn() -> NativeConnection {
        Arc::new(Mutex::new(Connection::open_in_memory().unwrap()))
    }

    #[test]
    fn test_lookup_returns_registered_connection() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.db");
        std::fs::write(&path, b"").unwrap();

        let registry = Registry::new();
        let conn = memory_conn();
        registry.register(&path, Arc::clone(&conn));

        let found = registry.lookup(&path).unwrap();
        assert!(Arc::ptr_eq(&found, &conn));
    }

    #[test]
    fn test_lookup_unknown_path_is_absent() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::new();
        assert!(registry.lookup(tmp.path().join("never.db")).is_none());
    }

    #[test]
    fn test_memory_and_empty_paths_are_never_registered() {
        let registry = Registry::new();
        registry.register("", memory_conn());
        registry.register(":memory:", memory_conn());

        assert!(registry.is_empty());
        assert!(registry.lookup("").is_none());
        assert!(registry.lookup(":memory:").is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.db");
        std::fs::write(&path, b"").unwrap();

        let registry = Registry::new();
        let first = memory_conn();
        let second = memory_conn();
        registry.register(&path, Arc::clone(&first));
        registry.register(&path, Arc::clone(&second));

        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.lookup(&path).unwrap(), &second));
    }

    #[test]
    fn test_relative_and_absolute_forms_share_an_entry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.db");
        std::fs::write(&path, b"").unwrap();
        let dotted = tmp.path().join(".").join("a.db");

        let registry = Registry::new();
        registry.register(&dotted, memory_conn());
        assert!(registry.lookup(&path).is_some());
    }

    #[test]
    fn test_concurrent_register_and_lookup() {
        let tmp = TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let path = tmp.path().join(format!("db{i}.db"));
                thread::spawn(move || {
                    registry.register(&path, memory_conn());
                    assert!(registry.lookup(&path).is_some());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }
}
