//! Connection handling shared by the SQLite-backed stores.

use std::{
    sync::{Mutex, MutexGuard, TryLockError},
    thread,
    time::{Duration, Instant},
};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use rusqlite::{Connection, ErrorCode};

use crate::{GeoError, StorageError};

/// Timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// Location and per-call timeout for a SQLite-backed store.
///
/// The timeout bounds both the wait for the handle's connection and the
/// SQLite busy timeout: a call that waits on either lock for longer fails
/// with [`GeoError::Timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file. Parent directories are created on open.
    pub path: Utf8PathBuf,
    /// Maximum time a single store call may wait for a lock.
    pub timeout: Duration,
}

impl StoreConfig {
    /// Configure a store at `path` with [`DEFAULT_TIMEOUT`].
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Open a read-write connection with the configured busy timeout.
pub(super) fn open(config: &StoreConfig) -> Result<Connection, GeoError> {
    ensure_parent_dir(&config.path)?;
    let open_error = |source: rusqlite::Error| StorageError::OpenDatabase {
        path: config.path.clone().into_std_path_buf(),
        source,
    };
    let connection = Connection::open(config.path.as_std_path()).map_err(open_error)?;
    connection.busy_timeout(config.timeout).map_err(open_error)?;
    Ok(connection)
}

/// Map a driver error to the store taxonomy.
///
/// Busy and locked databases surface as [`GeoError::Timeout`] because the
/// busy timeout has already elapsed by the time SQLite reports them.
pub(super) fn query_error(
    operation: &'static str,
    timeout: Duration,
) -> impl Fn(rusqlite::Error) -> GeoError {
    move |source| match source.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => GeoError::Timeout {
            operation,
            timeout,
        },
        _ => GeoError::Storage(StorageError::Query { operation, source }),
    }
}

/// Whether `error` is a uniqueness or other constraint violation.
pub(super) fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    error.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

/// Acquire the connection guarded by `mutex`, waiting at most `timeout`.
pub(super) fn lock<'a>(
    mutex: &'a Mutex<Connection>,
    store: &'static str,
    timeout: Duration,
) -> Result<MutexGuard<'a, Connection>, GeoError> {
    let deadline = Instant::now() + timeout;
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(_)) => {
                return Err(GeoError::Storage(StorageError::Poisoned { store }));
            }
            Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                return Err(GeoError::Timeout {
                    operation: "acquire store connection",
                    timeout,
                });
            }
            Err(TryLockError::WouldBlock) => thread::sleep(LOCK_RETRY_INTERVAL),
        }
    }
}

fn ensure_parent_dir(path: &Utf8Path) -> Result<(), StorageError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let (base, relative) = if parent.is_absolute() {
        ("/", parent.strip_prefix("/").unwrap_or(parent))
    } else {
        (".", parent)
    };
    if relative.as_str().is_empty() {
        return Ok(());
    }

    let create_error = |source: std::io::Error| StorageError::CreateDirectory {
        path: parent.to_path_buf().into_std_path_buf(),
        source,
    };
    let dir = fs_utf8::Dir::open_ambient_dir(base, ambient_authority()).map_err(create_error)?;
    dir.create_dir_all(relative).map_err(create_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    fn open_creates_missing_parent_directories() {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let config = StoreConfig::new(root.join("nested/data/cities.db"));

        let connection = open(&config).expect("open store");
        drop(connection);
        assert!(root.join("nested/data/cities.db").is_file());
    }

    #[rstest]
    fn held_connection_times_out() {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let config = StoreConfig::new(root.join("held.db"));
        let timeout = Duration::from_millis(20);
        let mutex = Mutex::new(open(&config).expect("open store"));

        let _held = lock(&mutex, "cities", timeout).expect("first lock");
        let started = Instant::now();
        let err = lock(&mutex, "cities", timeout).expect_err("second lock waits");
        assert!(started.elapsed() >= timeout);
        assert!(matches!(
            err,
            GeoError::Timeout { operation: "acquire store connection", timeout: t } if t == timeout
        ));
    }

    #[rstest]
    fn busy_database_maps_to_timeout() {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let config =
            StoreConfig::new(root.join("busy.db")).with_timeout(Duration::from_millis(10));

        let holder = open(&config).expect("open holder");
        holder
            .execute_batch("CREATE TABLE t (x INTEGER); BEGIN EXCLUSIVE;")
            .expect("hold exclusive lock");

        let waiter = open(&config).expect("open waiter");
        let err = waiter
            .execute("INSERT INTO t (x) VALUES (1)", [])
            .map_err(query_error("insert row", config.timeout))
            .expect_err("lock should time out");
        assert!(matches!(
            err,
            GeoError::Timeout { operation: "insert row", timeout } if timeout == config.timeout
        ));
    }
}
