//! Error types for typed error handling.
//!
//! Every fallible library operation returns [`Result`]. The variants are
//! grouped by where they originate: opening a database, establishing a
//! native connection, resolving the connection registry, interpreting a
//! script, and running an online backup.

use std::path::PathBuf;

/// Boxed error returned by user supplied connect hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for litedb operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which execution path a failing script statement went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Row producing path (`SELECT`).
    Query,
    /// Side effecting path (everything else).
    Exec,
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Exec => write!(f, "exec"),
        }
    }
}

/// litedb errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Database file does not exist and the driver requires it to.
    #[error("database file not found: {path:?}")]
    NotFound { path: PathBuf },

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A scalar function could not be registered on a new connection.
    #[error("failed to register function {name:?}: {source}")]
    FunctionRegistration {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The backing file of a new connection could not be determined.
    #[error("couldn't get filename for connection {connection:?}: {source}")]
    ConnectionFilename {
        connection: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The per-connection initialization query failed.
    #[error("connection query failed: {query} -- {source}")]
    InitQuery {
        query: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The user supplied connect hook rejected the connection.
    #[error("connect hook failed: {source}")]
    Hook {
        #[source]
        source: BoxError,
    },

    /// No native connection is registered for the given file.
    #[error("no native connection registered for {path:?}")]
    NotRegistered { path: PathBuf },

    /// A script statement failed to execute.
    #[error("{kind} statement failed in {file}: {statement}: {source}")]
    Statement {
        kind: StatementKind,
        statement: String,
        file: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A `.read` directive failed.
    #[error("read file: {path:?}, error: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// `.read` directives nested too deeply, usually a file reading itself.
    #[error("read file: {path:?} nested deeper than {depth} files")]
    ReadDepth { path: PathBuf, depth: usize },

    /// A `.tables` directive failed.
    #[error("table listing failed: {0}")]
    Tables(#[source] rusqlite::Error),

    /// A line starting with `.` that names no known directive.
    #[error("unknown directive: {line}")]
    UnknownDirective { line: String },

    /// The online backup protocol reported an error.
    #[error("backup failed (code {code}): {message}")]
    Backup { code: i32, message: String },

    /// Backup destination resolves to the source database file.
    #[error("backup destination {path:?} is the source database")]
    BackupSelf { path: PathBuf },

    /// Writing to an output sink failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    /// Any other engine error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a statement error for a failing script unit.
    pub fn statement(
        kind: StatementKind,
        statement: impl Into<String>,
        file: impl Into<String>,
        source: rusqlite::Error,
    ) -> Self {
        Self::Statement {
            kind,
            statement: statement.into(),
            file: file.into(),
            source,
        }
    }

    /// Create a not registered error.
    pub fn not_registered(path: impl Into<PathBuf>) -> Self {
        Self::NotRegistered { path: path.into() }
    }

    /// Returns true if this error was raised while establishing a connection.
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            Self::FunctionRegistration { .. }
                | Self::ConnectionFilename { .. }
                | Self::InitQuery { .. }
                | Self::Hook { .. }
        )
    }
}
