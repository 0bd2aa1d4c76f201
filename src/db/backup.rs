//! Online backup of an open database.
//!
//! The backup runs against the native connections recorded in the
//! [`Registry`](super::Registry): the source is resolved by its backing
//! file and the destination is opened through the source's driver, which
//! registers it as a side effect. Pages are then copied in steps of a fixed
//! size with the SQLite online backup API, so the source stays usable while
//! the copy is in progress.
//!
//! A failed backup leaves the destination file as it is. Every completed
//! step is internally consistent; nothing is rolled back or retried.

use rusqlite::{Connection, ffi};
use std::ffi::CStr;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Database, registry};
use crate::error::{Error, Result};

/// Pages copied per step by [`Database::backup`].
pub const DEFAULT_STEP: i32 = 1024;

/// Progress of a running backup after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Total pages in the source database.
    pub page_count: i32,
    /// Pages still to be copied.
    pub remaining: i32,
}

/// Copies `source` to `dest`, `step` pages at a time.
///
/// Writes `pagecount: <N> remaining: <M>` to `progress` after every step.
/// Any existing file at `dest` is replaced.
///
/// # Errors
///
/// Returns an error if the destination is the source file, if either
/// native connection is not registered, or if any step or the final
/// release of the backup fails.
pub fn backup(
    source: &Database,
    dest: impl AsRef<Path>,
    step: i32,
    progress: &mut dyn Write,
) -> Result<()> {
    let dest = dest.as_ref();
    let source_file = source.filename();

    if let Some(source_key) = registry::canonical(Path::new(&source_file))
        && registry::canonical(dest).as_ref() == Some(&source_key)
    {
        return Err(Error::BackupSelf {
            path: dest.to_path_buf(),
        });
    }

    if let Err(err) = std::fs::remove_file(dest)
        && err.kind() != ErrorKind::NotFound
    {
        warn!(dest = %dest.display(), error = %err, "could not remove existing backup file");
    }

    let dest_db = Database::create_with(&dest.to_string_lossy(), Arc::clone(source.driver()))?;
    let result = copy(source, &source_file, &dest_db, step, progress);
    dest_db.close();

    if result.is_ok() {
        info!(source = %source_file, dest = %dest.display(), "backup complete");
    }
    result
}

fn copy(
    source: &Database,
    source_file: &str,
    dest_db: &Database,
    step: i32,
    progress: &mut dyn Write,
) -> Result<()> {
    let registry = source.driver().registry();
    let from = registry
        .lookup(source_file)
        .ok_or_else(|| Error::not_registered(source_file))?;
    let dest_file = dest_db.filename();
    let to = registry
        .lookup(&dest_file)
        .ok_or_else(|| Error::not_registered(&dest_file))?;
    if Arc::ptr_eq(&from, &to) {
        return Err(Error::BackupSelf {
            path: dest_file.into(),
        });
    }

    let src = from.lock();
    let dst = to.lock();
    let mut session = Session::start(&src, &dst, step)?;

    let outcome = loop {
        let done = match session.step() {
            Ok(done) => done,
            Err(err) => break Err(err),
        };
        let Progress {
            page_count,
            remaining,
        } = session.progress();
        if let Err(err) = writeln!(progress, "pagecount: {page_count} remaining: {remaining}") {
            break Err(err.into());
        }
        if done {
            break Ok(());
        }
    };

    settle(outcome, session.finish())
}

/// Result of a backup given the copy loop outcome and the release of the
/// session. A loop error wins; otherwise a failed release is returned.
fn settle(outcome: Result<()>, finished: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => finished,
        Err(err) => {
            if let Err(release) = finished {
                debug!(error = %release, "backup release failed after step error");
            }
            Err(err)
        }
    }
}

/// A running `sqlite3_backup` between two locked connections.
///
/// Finishing is explicit so the result of `sqlite3_backup_finish` reaches
/// the caller; dropping an unfinished session releases it silently.
struct Session<'a> {
    handle: NonNull<ffi::sqlite3_backup>,
    dest: &'a Connection,
    step: i32,
    finished: bool,
}

impl<'a> Session<'a> {
    fn start(src: &'a Connection, dest: &'a Connection, step: i32) -> Result<Self> {
        let main = c"main";
        // SAFETY: both handles stay valid for 'a and are held under their
        // connection locks for the lifetime of the session.
        let raw = unsafe {
            ffi::sqlite3_backup_init(dest.handle(), main.as_ptr(), src.handle(), main.as_ptr())
        };
        let handle = NonNull::new(raw).ok_or_else(|| connection_error(dest))?;
        debug!(step, "backup started");
        Ok(Self {
            handle,
            dest,
            step,
            finished: false,
        })
    }

    /// Copies up to `step` pages. Returns true once every page is copied.
    ///
    /// A busy or locked source is not an error; the next step retries it.
    fn step(&mut self) -> Result<bool> {
        // SAFETY: handle is live until finish.
        let rc = unsafe { ffi::sqlite3_backup_step(self.handle.as_ptr(), self.step) };
        match rc {
            ffi::SQLITE_DONE => Ok(true),
            ffi::SQLITE_OK | ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => Ok(false),
            code => Err(code_error(code)),
        }
    }

    fn progress(&self) -> Progress {
        // SAFETY: handle is live until finish.
        unsafe {
            Progress {
                page_count: ffi::sqlite3_backup_pagecount(self.handle.as_ptr()),
                remaining: ffi::sqlite3_backup_remaining(self.handle.as_ptr()),
            }
        }
    }

    /// Releases the backup, reporting any error it recorded.
    fn finish(mut self) -> Result<()> {
        self.finished = true;
        // SAFETY: handle is live and released exactly once here.
        let rc = unsafe { ffi::sqlite3_backup_finish(self.handle.as_ptr()) };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(connection_error(self.dest))
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // SAFETY: handle was not released by finish.
            unsafe {
                ffi::sqlite3_backup_finish(self.handle.as_ptr());
            }
        }
    }
}

fn code_error(code: i32) -> Error {
    // SAFETY: sqlite3_errstr returns a static string for every code.
    let message = unsafe { CStr::from_ptr(ffi::sqlite3_errstr(code)) };
    Error::Backup {
        code,
        message: message.to_string_lossy().into_owned(),
    }
}

fn connection_error(conn: &Connection) -> Error {
    // SAFETY: the connection handle is valid while borrowed; errmsg returns a
    // string owned by the connection that is copied before returning.
    unsafe {
        let db = conn.handle();
        let code = ffi::sqlite3_extended_errcode(db);
        let message = CStr::from_ptr(ffi::sqlite3_errmsg(db));
        Error::Backup {
            code,
            message: message.to_string_lossy().into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Drivers, Options, Registry};
    use tempfile::TempDir;

    fn options() -> Options {
        Options::new().with_drivers(Arc::new(Drivers::new(Arc::new(Registry::new()))))
    }

    fn path_str(tmp: &TempDir, name: &str) -> String {
        tmp.path().join(name).to_string_lossy().into_owned()
    }

    fn seeded(tmp: &TempDir, options: &Options) -> Database {
        let db = options.open(&path_str(tmp, "src.db")).unwrap();
        db.execute_batch(
            "PRAGMA page_size = 1024;
             CREATE TABLE items (id INTEGER PRIMARY KEY, body TEXT);
             WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 400)
             INSERT INTO items (body) SELECT hex(zeroblob(100)) FROM n;",
        )
        .unwrap();
        db
    }

    fn remaining_values(text: &str) -> Vec<i32> {
        text.lines()
            .map(|line| {
                let (_, rest) = line.split_once("remaining: ").unwrap();
                rest.trim().parse().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_backup_reports_strictly_decreasing_progress() {
        let tmp = TempDir::new().unwrap();
        let options = options();
        let source = seeded(&tmp, &options);

        let mut out = Vec::new();
        backup(&source, tmp.path().join("dest.db"), 10, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().all(|l| l.starts_with("pagecount: ")));
        let remaining = remaining_values(&text);
        assert!(remaining.len() > 1);
        assert!(remaining.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(remaining.iter().filter(|&&r| r == 0).count(), 1);
        assert_eq!(remaining.last(), Some(&0));
    }

    #[test]
    fn test_backup_copies_schema_and_rows() {
        let tmp = TempDir::new().unwrap();
        let options = options();
        let source = seeded(&tmp, &options);
        let dest = path_str(&tmp, "dest.db");

        backup(&source, &dest, DEFAULT_STEP, &mut std::io::sink()).unwrap();

        let copy = rusqlite::Connection::open(&dest).unwrap();
        let count: i64 = copy
            .query_row("SELECT count(*) FROM items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 400);
    }

    #[test]
    fn test_backup_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let options = options();
        let source = seeded(&tmp, &options);
        let dest = tmp.path().join("dest.db");
        std::fs::write(&dest, b"not a database").unwrap();

        source.backup(&dest).unwrap();

        let copy = rusqlite::Connection::open(&dest).unwrap();
        let count: i64 = copy
            .query_row("SELECT count(*) FROM items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 400);
    }

    #[test]
    fn test_backup_to_source_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let options = options();
        let source = seeded(&tmp, &options);

        let err = source.backup(tmp.path().join("src.db")).unwrap_err();
        assert!(matches!(err, Error::BackupSelf { .. }));

        let count: i64 = source
            .with_connection(|c| c.query_row("SELECT count(*) FROM items", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 400);
    }

    #[test]
    fn test_backup_of_memory_database_is_not_registered() {
        let tmp = TempDir::new().unwrap();
        let source = options().open(":memory:").unwrap();

        let err = source.backup(tmp.path().join("dest.db")).unwrap_err();
        assert!(matches!(err, Error::NotRegistered { .. }));
    }

    #[test]
    fn test_backup_from_strict_driver_creates_destination() {
        let tmp = TempDir::new().unwrap();
        seeded(&tmp, &options());
        let source = options()
            .with_driver("strict")
            .with_exists(true)
            .open(&path_str(&tmp, "src.db"))
            .unwrap();
        assert!(source.driver().config().require_exists);
        let dest = tmp.path().join("fresh/dest.db");

        backup(&source, &dest, 10, &mut std::io::sink()).unwrap();

        let copy = rusqlite::Connection::open(&dest).unwrap();
        let count: i64 = copy
            .query_row("SELECT count(*) FROM items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 400);
    }

    #[test]
    fn test_settle_surfaces_release_error() {
        let busy = || code_error(ffi::SQLITE_BUSY);
        let io = || code_error(ffi::SQLITE_IOERR);

        assert!(settle(Ok(()), Ok(())).is_ok());
        assert!(matches!(
            settle(Ok(()), Err(io())),
            Err(Error::Backup { code, .. }) if code == ffi::SQLITE_IOERR
        ));
        assert!(matches!(
            settle(Err(busy()), Err(io())),
            Err(Error::Backup { code, .. }) if code == ffi::SQLITE_BUSY
        ));
        assert!(matches!(
            settle(Err(busy()), Ok(())),
            Err(Error::Backup { code, .. }) if code == ffi::SQLITE_BUSY
        ));
    }

    #[test]
    fn test_code_error_has_message() {
        let err = code_error(ffi::SQLITE_NOMEM);
        assert!(matches!(err, Error::Backup { code, .. } if code == ffi::SQLITE_NOMEM));
        assert!(!err.to_string().is_empty());
    }
}
