//! Custom scalar functions installed on new connections.
//!
//! A [`ScalarFunction`] pairs a name, an arity and a determinism flag with
//! the function body. The driver registers every configured function on each
//! native connection before anything else runs against it.
//!
//! The built-in set converts IPv4 addresses to and from integers and formats
//! coordinate pairs as a polygon literal.

use rusqlite::Connection;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Value as SqlValue, ValueRef};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

/// Body of a scalar function.
pub type ScalarFn = dyn Fn(&Context<'_>) -> rusqlite::Result<SqlValue>
    + Send
    + Sync
    + std::panic::RefUnwindSafe
    + 'static;

/// A named scalar function registration.
#[derive(Clone)]
pub struct ScalarFunction {
    name: String,
    n_args: i32,
    deterministic: bool,
    func: Arc<ScalarFn>,
}

impl ScalarFunction {
    /// Creates a registration. `n_args` of `-1` accepts any number of arguments.
    pub fn new<F>(name: impl Into<String>, n_args: i32, deterministic: bool, func: F) -> Self
    where
        F: Fn(&Context<'_>) -> rusqlite::Result<SqlValue>
            + Send
            + Sync
            + std::panic::RefUnwindSafe
            + 'static,
    {
        Self {
            name: name.into(),
            n_args,
            deterministic,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_args(&self) -> i32 {
        self.n_args
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Installs the function on `conn`.
    pub fn register(&self, conn: &Connection) -> rusqlite::Result<()> {
        let mut flags = FunctionFlags::SQLITE_UTF8;
        if self.deterministic {
            flags |= FunctionFlags::SQLITE_DETERMINISTIC;
        }
        let func = Arc::clone(&self.func);
        conn.create_scalar_function(self.name.as_str(), self.n_args, flags, move |ctx| {
            func(ctx)
        })?;
        debug!(function = %self.name, "registered function");
        Ok(())
    }
}

impl std::fmt::Debug for ScalarFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarFunction")
            .field("name", &self.name)
            .field("n_args", &self.n_args)
            .field("deterministic", &self.deterministic)
            .finish_non_exhaustive()
    }
}

/// The functions installed on the default driver: `iptoa`, `atoip`, `polygon`.
pub fn builtins() -> Vec<ScalarFunction> {
    vec![
        ScalarFunction::new("iptoa", 1, true, |ctx| {
            Ok(SqlValue::Text(ip_to_string(ctx.get::<i64>(0)?)))
        }),
        ScalarFunction::new("atoip", 1, true, |ctx| {
            Ok(SqlValue::Integer(ip_from_string(&ctx.get::<String>(0)?)))
        }),
        ScalarFunction::new("polygon", -1, true, |ctx| {
            let points: Vec<ValueRef<'_>> = (0..ctx.len()).map(|i| ctx.get_raw(i)).collect();
            Ok(SqlValue::Text(polygon(&points)))
        }),
    ]
}

/// Formats the low 32 bits of `ip` as a dotted quad.
pub fn ip_to_string(ip: i64) -> String {
    format!(
        "{}.{}.{}.{}",
        (ip >> 24) & 0xFF,
        (ip >> 16) & 0xFF,
        (ip >> 8) & 0xFF,
        ip & 0xFF
    )
}

/// Parses a dotted quad into an integer.
///
/// Returns -1 when the text does not have four octets; an octet that is not
/// a number counts as 0.
pub fn ip_from_string(ip: &str) -> i64 {
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return -1;
    }
    octets
        .iter()
        .map(|o| o.trim().parse::<i64>().unwrap_or(0))
        .fold(0i64, |acc, octet| acc.wrapping_shl(8).wrapping_add(octet))
}

/// Builds a quoted JSON-style polygon literal from alternating lat/lon values.
///
/// Integer pairs print as integers, real pairs with six decimals. Input stops
/// at the first argument that is neither.
pub fn polygon(points: &[ValueRef<'_>]) -> String {
    let mut out = String::from("'[");
    let mut real_lat = 0.0_f64;
    let mut int_lat = 0_i64;
    for (i, point) in points.iter().enumerate() {
        let odd = i % 2 != 0;
        if odd && i > 2 {
            out.push(',');
        }
        match *point {
            ValueRef::Real(v) if odd => {
                let _ = write!(out, "[{real_lat:.6},{v:.6}]");
            }
            ValueRef::Real(v) => real_lat = v,
            ValueRef::Integer(v) if odd => {
                let _ = write!(out, "[{int_lat},{v}]");
            }
            ValueRef::Integer(v) => int_lat = v,
            _ => {
                if odd && i > 2 {
                    out.pop();
                }
                break;
            }
        }
    }
    out.push_str("]'");
    out
}
