//! Drivers and the per-connection connect hook.
//!
//! A [`Driver`] owns a [`DriverConfig`] and establishes native connections.
//! Every new connection runs the connect hook, an ordered fail-fast sequence:
//!
//! 1. register the configured scalar functions
//! 2. resolve the backing file with `PRAGMA database_list`
//! 3. record the connection in the [`Registry`]
//! 4. run the init query, if any
//! 5. call the user hook, if any
//!
//! A failure in step 4 or 5 withdraws the registration made in step 3, so a
//! failed open never leaves a registry entry behind.
//!
//! Drivers are installed by name in a [`Drivers`] table. Installation is
//! idempotent: the first configuration for a name wins and later requests
//! for the same name get the original driver back.

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::NativeConnection;
use super::functions::ScalarFunction;
use super::registry::Registry;
use crate::error::{BoxError, Error, Result};

/// Name of the driver used when none is configured.
pub const DEFAULT_DRIVER: &str = "sqlite";

/// User hook called with every new native connection.
pub type Hook = Arc<dyn Fn(&Connection) -> std::result::Result<(), BoxError> + Send + Sync>;

static GLOBAL: LazyLock<Arc<Drivers>> =
    LazyLock::new(|| Arc::new(Drivers::new(Registry::global())));

/// Per-driver connection settings.
#[derive(Clone, Default)]
pub struct DriverConfig {
    /// SQL run on every new connection.
    pub init_query: Option<String>,
    /// Called last on every new connection.
    pub hook: Option<Hook>,
    /// Scalar functions registered on every new connection.
    pub functions: Vec<ScalarFunction>,
    /// Fail to open when the database file does not already exist.
    pub require_exists: bool,
}

impl DriverConfig {
    /// Returns true when both configurations would set up connections the same way.
    ///
    /// Hooks compare by identity and functions by name.
    pub fn same_as(&self, other: &DriverConfig) -> bool {
        let hooks_match = match (&self.hook, &other.hook) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        hooks_match
            && self.init_query == other.init_query
            && self.require_exists == other.require_exists
            && self
                .functions
                .iter()
                .map(ScalarFunction::name)
                .eq(other.functions.iter().map(ScalarFunction::name))
    }

    fn init_query(&self) -> Option<&str> {
        self.init_query.as_deref().filter(|q| !q.trim().is_empty())
    }
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("init_query", &self.init_query)
            .field("hook", &self.hook.is_some())
            .field("functions", &self.functions)
            .field("require_exists", &self.require_exists)
            .finish()
    }
}

/// Establishes native connections and runs the connect hook on each.
#[derive(Debug)]
pub struct Driver {
    name: String,
    config: DriverConfig,
    registry: Arc<Registry>,
}

impl Driver {
    pub fn new(name: impl Into<String>, config: DriverConfig, registry: Arc<Registry>) -> Self {
        Self {
            name: name.into(),
            config,
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Registry that connections from this driver are recorded in.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Opens a native connection for `dsn` and runs the connect hook on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot open `dsn` or any hook step fails.
    pub fn connect(&self, dsn: &str) -> Result<NativeConnection> {
        let mut flags = OpenFlags::default();
        if self.config.require_exists {
            flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
        }
        let conn = Connection::open_with_flags(dsn, flags)?;
        debug!(driver = %self.name, dsn, "opened native connection");

        self.register_functions(&conn)?;
        let file = connection_filename(&conn).map_err(|source| Error::ConnectionFilename {
            connection: dsn.to_string(),
            source,
        })?;

        let native = Arc::new(Mutex::new(conn));
        let registration = (!file.is_empty())
            .then(|| self.registry.swap(&file, Arc::clone(&native)))
            .flatten();

        let finished = {
            let conn = native.lock();
            self.run_init_query(&conn)
                .and_then(|()| self.run_hook(&conn))
        };
        if let Err(err) = finished {
            if let Some((key, previous)) = registration {
                self.registry.restore(key, previous, &native);
            }
            return Err(err);
        }
        Ok(native)
    }

    fn register_functions(&self, conn: &Connection) -> Result<()> {
        for func in &self.config.functions {
            func.register(conn)
                .map_err(|source| Error::FunctionRegistration {
                    name: func.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    fn run_init_query(&self, conn: &Connection) -> Result<()> {
        let Some(query) = self.config.init_query() else {
            return Ok(());
        };
        super::exec_all(conn, query).map_err(|source| Error::InitQuery {
            query: query.to_string(),
            source,
        })
    }

    fn run_hook(&self, conn: &Connection) -> Result<()> {
        match &self.config.hook {
            Some(hook) => hook(conn).map_err(|source| Error::Hook { source }),
            None => Ok(()),
        }
    }
}

/// Name-keyed table of installed drivers.
pub struct Drivers {
    registry: Arc<Registry>,
    installed: Mutex<HashMap<String, Arc<Driver>>>,
}

impl Drivers {
    /// Creates an empty table whose drivers record connections in `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            installed: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide driver table backed by [`Registry::global`].
    pub fn global() -> Arc<Drivers> {
        Arc::clone(&GLOBAL)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Installs a driver under `name`, or returns the one already installed.
    ///
    /// Only the first configuration for a name takes effect. A later request
    /// carrying a different configuration is ignored with a warning; callers
    /// that need distinct configurations must use distinct names.
    pub fn install(&self, name: &str, config: DriverConfig) -> Arc<Driver> {
        let mut installed = self.installed.lock();
        if let Some(existing) = installed.get(name) {
            if !existing.config.same_as(&config) {
                warn!(
                    driver = name,
                    "driver already installed with a different configuration; keeping the first"
                );
            }
            return Arc::clone(existing);
        }

        debug!(driver = name, "registering driver");
        let driver = Arc::new(Driver::new(name, config, Arc::clone(&self.registry)));
        installed.insert(name.to_string(), Arc::clone(&driver));
        driver
    }

    /// Returns the driver installed under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Driver>> {
        self.installed.lock().get(name).cloned()
    }

    /// Names of all installed drivers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.installed.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Backing file of the `main` schema, empty for in-memory databases.
pub fn connection_filename(conn: &Connection) -> rusqlite::Result<String> {
    conn.query_row("PRAGMA database_list", [], |row| row.get::<_, String>(2))
}
