//! litedb: a convenience layer over SQLite.
//!
//! - [`db`] opens databases through named drivers whose connect hook
//!   registers scalar functions, runs an init query and a user hook, and
//!   records every native connection in a registry keyed by file path
//! - [`db::backup`] copies a live database with the online backup API
//! - [`script`] runs SQL buffers with `.echo`, `.read`, `.print` and
//!   `.tables` directives
//! - [`config`] loads command line settings from TOML

pub mod config;
pub mod db;
pub mod error;
pub mod script;

pub use db::{Database, Options};
pub use error::{Error, Result};
