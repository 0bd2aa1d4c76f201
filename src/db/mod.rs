//! Database handles over SQLite.
//!
//! [`Database`] is the logical handle applications use. It is opened through
//! a [`Driver`], which runs the connect hook on the new native connection and
//! records it in the connection [`Registry`] so the backup engine can find it
//! again by file path.
//!
//! # Example
//!
//! ```ignore
//! use litedb::db::{Database, Options};
//!
//! // Default driver with the built-in functions
//! let db = Database::open("data/app.db")?;
//!
//! // Custom driver with an init query run on every connection
//! let db = Options::new()
//!     .with_driver("fk")
//!     .with_query("PRAGMA foreign_keys = ON")
//!     .open("data/app.db")?;
//!
//! db.backup("data/app.bak")?;
//! db.close();
//! ```

pub mod backup;
mod driver;
pub mod functions;
pub mod pragma;
pub mod registry;
mod types;

pub use driver::{DEFAULT_DRIVER, Driver, DriverConfig, Drivers, Hook, connection_filename};
pub use functions::ScalarFunction;
pub use registry::Registry;
pub use types::{Row, Value};

use parking_lot::Mutex;
use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{Batch, Connection};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{BoxError, Error, Result};

/// Native connection shared between a [`Database`] and the [`Registry`].
pub type NativeConnection = Arc<Mutex<Connection>>;

/// Logical database handle.
pub struct Database {
    dsn: String,
    driver: Arc<Driver>,
    conn: NativeConnection,
}

impl Database {
    /// Opens `file` with the default driver and built-in functions.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be prepared or the connection
    /// cannot be established.
    pub fn open(file: &str) -> Result<Self> {
        Options::new().open(file)
    }

    /// Opens `file` through an already installed driver.
    ///
    /// Unless `file` is an in-memory database, the parent directory is
    /// created if missing and the file is created unless the driver requires
    /// it to exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the driver requires an existing file
    /// and there is none, or any connect hook error.
    pub fn open_with(file: &str, driver: Arc<Driver>) -> Result<Self> {
        let require_exists = driver.config().require_exists;
        Self::connect(file, driver, require_exists)
    }

    /// Opens `file` through `driver`, creating it even when the driver
    /// requires existing files. Used for backup destinations.
    pub(crate) fn create_with(file: &str, driver: Arc<Driver>) -> Result<Self> {
        Self::connect(file, driver, false)
    }

    fn connect(file: &str, driver: Arc<Driver>, require_exists: bool) -> Result<Self> {
        prepare_file(file, require_exists)?;
        let conn = driver.connect(file)?;
        debug!(file, driver = driver.name(), "opened database");
        Ok(Self {
            dsn: file.to_string(),
            driver,
            conn,
        })
    }

    /// The name this database was opened with.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn driver(&self) -> &Arc<Driver> {
        &self.driver
    }

    /// Backing file of the `main` schema as reported by SQLite.
    ///
    /// Empty for in-memory databases or when it cannot be determined.
    pub fn filename(&self) -> String {
        connection_filename(&self.conn.lock()).unwrap_or_default()
    }

    /// Runs `f` with the native connection locked.
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&*self.conn.lock())
    }

    /// Executes every statement in `sql`, discarding any result rows.
    ///
    /// # Errors
    ///
    /// Returns the engine error of the first failing statement.
    pub fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        exec_all(&self.conn.lock(), sql)
    }

    /// Runs a single query and calls `handler` for every row.
    ///
    /// `handler` receives the column names on the first row only and `None`
    /// on every following row.
    ///
    /// # Errors
    ///
    /// Engine failures are returned as [`Error::Sqlite`]; handler errors are
    /// passed through unchanged.
    pub fn query<F>(&self, sql: &str, mut handler: F) -> Result<()>
    where
        F: FnMut(Option<&[String]>, &[Value]) -> Result<()>,
    {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut first = true;
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            handler(first.then_some(columns.as_slice()), &values)?;
            first = false;
        }
        Ok(())
    }

    /// Names of all tables in the main schema, ordered by name.
    pub fn tables(&self) -> rusqlite::Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        stmt.query_map([], |row| row.get(0))?.collect()
    }

    /// The `data_version` pragma, which changes when another connection commits.
    pub fn data_version(&self) -> Result<i64> {
        let version = self
            .conn
            .lock()
            .query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Backs this database up to `dest` without progress output.
    pub fn backup(&self, dest: impl AsRef<Path>) -> Result<()> {
        backup::backup(self, dest, backup::DEFAULT_STEP, &mut std::io::sink())
    }

    /// Checkpoints the WAL and releases this handle.
    ///
    /// Failures are logged, not returned. The native connection stays open
    /// while the registry still holds it.
    pub fn close(self) {
        if let Err(err) = self.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)") {
            warn!(file = %self.dsn, error = %err, "error executing WAL checkpoint");
        }
        debug!(file = %self.dsn, "closed database");
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dsn", &self.dsn)
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

/// Options used to install a driver and open databases through it.
#[derive(Clone)]
pub struct Options {
    driver: String,
    config: DriverConfig,
    drivers: Arc<Drivers>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            config: DriverConfig {
                functions: functions::builtins(),
                ..Default::default()
            },
            drivers: Drivers::global(),
        }
    }
}

impl Options {
    /// Default driver name with the built-in functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail to open when the database file does not already exist.
    pub fn with_exists(mut self, require: bool) -> Self {
        self.config.require_exists = require;
        self
    }

    /// SQL to run on every new connection.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.config.init_query = Some(query.into());
        self
    }

    /// Hook to call with every new connection.
    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Connection) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.config.hook = Some(Arc::new(hook));
        self
    }

    /// Driver name to install the configuration under.
    pub fn with_driver(mut self, name: impl Into<String>) -> Self {
        self.driver = name.into();
        self
    }

    /// Additional scalar functions.
    pub fn with_functions(mut self, funcs: impl IntoIterator<Item = ScalarFunction>) -> Self {
        self.config.functions.extend(funcs);
        self
    }

    /// Drop the built-in functions from the configuration.
    pub fn without_builtins(mut self) -> Self {
        let builtin: Vec<String> = functions::builtins()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        self.config
            .functions
            .retain(|f| !builtin.iter().any(|name| name == f.name()));
        self
    }

    /// Driver table to install into instead of the process-wide one.
    pub fn with_drivers(mut self, drivers: Arc<Drivers>) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn driver_name(&self) -> &str {
        &self.driver
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Installs the driver (once per name) and opens `file` through it.
    pub fn open(&self, file: &str) -> Result<Database> {
        let driver = self.drivers.install(&self.driver, self.config.clone());
        Database::open_with(file, driver)
    }

    /// Returns a reusable opener bound to these options.
    pub fn opener(self) -> impl Fn(&str) -> Result<Database> {
        move |file: &str| self.open(file)
    }
}

/// Library version string and number, e.g. `("3.46.0", 3046000)`.
pub fn version() -> (&'static str, i32) {
    (rusqlite::version(), rusqlite::version_number())
}

/// Executes every statement in `sql`, stepping through and discarding rows.
pub(crate) fn exec_all(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next()? {
        let mut rows = stmt.raw_query();
        while rows.next()?.is_some() {}
    }
    Ok(())
}

/// Filesystem path named by a DSN, or `None` for in-memory databases.
///
/// Strips a `file:` scheme, a leading `//` and any `?` query string.
pub fn dsn_path(dsn: &str) -> Option<PathBuf> {
    if dsn.contains(":memory:") {
        return None;
    }
    let name = dsn.strip_prefix("file:").unwrap_or(dsn);
    let name = name.strip_prefix("//").unwrap_or(name);
    let name = match name.find('?') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    };
    (!name.is_empty()).then(|| PathBuf::from(name))
}

fn prepare_file(file: &str, require_exists: bool) -> Result<()> {
    let Some(path) = dsn_path(file) else {
        return Ok(());
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::io(format!("creating directory {}", parent.display()), e)
        })?;
    }

    if require_exists {
        if !path.exists() {
            return Err(Error::NotFound { path });
        }
    } else {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(format!("os file: {file}"), e))?;
    }
    Ok(())
}
