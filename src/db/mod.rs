//! SQLite database handle shared by the fact and anticipation stores.
//!
//! One [`Database`] wraps a single connection behind `Arc<Mutex<_>>`; clones are
//! cheap and every store holds one. [`Database::with_conn`] is the only way in:
//! it checks the request context before and after taking the lock, and while the
//! closure runs inside a Tokio runtime it arms the connection's interrupt handle
//! against the context's cancellation token.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::{Connection, InterruptHandle};
use tokio::task::JoinHandle;

use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Knobs for [`Database::open_with`].
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Try to create the FTS5 index. When `false` (or when the engine lacks
    /// FTS5) keyword search falls back to `LIKE`.
    pub enable_fts: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self { enable_fts: true }
    }
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    fts_enabled: bool,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("fts_enabled", &self.fts_enabled)
            .finish()
    }
}

impl Database {
    /// Open (or create) the database at `path` with schema and migrations applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::initialize(conn, options, Some(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), fts = db.fts_enabled, "database initialized");
        Ok(db)
    }

    /// Open a private in-memory database; used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(OpenOptions::default())
    }

    pub fn open_in_memory_with(options: OpenOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, options, None)
    }

    fn initialize(conn: Connection, options: OpenOptions, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        schema::init_schema(&conn)?;
        migrations::run_migrations(&conn)?;

        let fts_enabled = options.enable_fts && schema::init_fts(&conn);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            fts_enabled,
            path,
        })
    }

    pub fn fts_enabled(&self) -> bool {
        self.fts_enabled
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `op` against the connection on behalf of `ctx`.
    ///
    /// Returns [`Error::Cancelled`] if the context is cancelled before the lock
    /// is acquired, or if SQLite was interrupted because of it.
    pub fn with_conn<T>(
        &self,
        ctx: &RequestContext,
        op: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        ctx.check()?;
        // A panic while holding the lock leaves the connection itself usable.
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        ctx.check()?;

        let guard = InterruptGuard::arm(ctx, conn.get_interrupt_handle());
        let out = op(&mut conn);
        drop(guard);

        match out {
            Err(e) if e.is_interrupt() || (ctx.is_cancelled() && !e.is_not_found()) => {
                Err(Error::Cancelled)
            }
            other => other,
        }
    }
}

/// Run a synchronous store call on the blocking pool.
///
/// Panics inside `f` are resumed on the caller; a task cancelled by runtime
/// shutdown reports [`Error::Cancelled`].
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(out) => out,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(Error::Cancelled),
    }
}

/// Interrupts the connection when the request token fires; disarmed on drop.
///
/// The interrupt is issued while holding `armed`, and drop clears `armed`
/// before returning, so no interrupt can land once the guard is gone and the
/// connection has moved on to another caller.
struct InterruptGuard {
    armed: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
}

impl InterruptGuard {
    fn arm(ctx: &RequestContext, handle: InterruptHandle) -> Self {
        let armed = Arc::new(Mutex::new(true));
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Self { armed, task: None };
        };
        let token = ctx.token().clone();
        let flag = Arc::clone(&armed);
        let task = runtime.spawn(async move {
            token.cancelled().await;
            let armed = flag.lock().unwrap_or_else(PoisonError::into_inner);
            if *armed {
                handle.interrupt();
            }
        });
        Self { armed, task: Some(task) }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        *self.armed.lock().unwrap_or_else(PoisonError::into_inner) = false;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
