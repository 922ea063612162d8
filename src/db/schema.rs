use crate::error::{AppError, Result};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pooled, read-only access to a Calibre `metadata.db`.
///
/// Cloning is cheap; all clones share the same connections.
#[derive(Clone)]
pub struct Database {
    pool: Arc<[Mutex<Connection>]>,
    next: Arc<AtomicUsize>,
}

impl Database {
    /// Open `pool_size` read-only connections to the database at `path`.
    pub fn open(path: &Path, pool_size: usize) -> Result<Self> {
        if !path.is_file() {
            return Err(AppError::Config(format!(
                "Calibre database not found: {}",
                path.display()
            )));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let pool = (0..pool_size.max(1))
            .map(|_| {
                let conn = Connection::open_with_flags(path, flags).map_err(|e| {
                    AppError::Internal(format!("Failed to open database: {}", e))
                })?;
                // Calibre may hold a write lock while it updates metadata.
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                register_functions(&conn)?;
                Ok(Mutex::new(conn))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_connections(pool))
    }

    /// Open in-memory database with the Calibre tables (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(CALIBRE_SCHEMA)
            .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;
        register_functions(&conn)?;

        Ok(Self::from_connections(vec![Mutex::new(conn)]))
    }

    fn from_connections(pool: Vec<Mutex<Connection>>) -> Self {
        Self {
            pool: pool.into(),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Borrow a connection, blocking until one is free.
    ///
    /// The guard returns the connection to the pool when dropped.
    pub fn acquire(&self) -> MutexGuard<'_, Connection> {
        if let Some(guard) = self.pool.iter().find_map(|slot| slot.try_lock()) {
            return guard;
        }
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        self.pool[slot].lock()
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.acquire();
            f(&*conn)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Database task failed: {}", e)))?
    }
}

/// Install SQL helpers used by the catalog queries.
///
/// `unicode_lower` folds case with Rust's Unicode rules; SQLite's builtin
/// `lower()` only handles ASCII.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )?;
    Ok(())
}

/// Subset of the Calibre schema this server reads.
const CALIBRE_SCHEMA: &str = r#"
    CREATE TABLE books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL DEFAULT 'Unknown',
        sort TEXT,
        timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        pubdate TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        series_index REAL NOT NULL DEFAULT 1.0,
        author_sort TEXT,
        isbn TEXT DEFAULT '',
        lccn TEXT DEFAULT '',
        path TEXT NOT NULL DEFAULT '',
        flags INTEGER NOT NULL DEFAULT 1,
        uuid TEXT,
        has_cover BOOL DEFAULT 0,
        last_modified TIMESTAMP NOT NULL DEFAULT '2000-01-01 00:00:00+00:00'
    );

    CREATE TABLE authors (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL COLLATE NOCASE,
        sort TEXT COLLATE NOCASE,
        link TEXT NOT NULL DEFAULT '',
        UNIQUE(name)
    );

    CREATE TABLE books_authors_link (
        id INTEGER PRIMARY KEY,
        book INTEGER NOT NULL,
        author INTEGER NOT NULL,
        UNIQUE(book, author)
    );

    CREATE TABLE tags (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL COLLATE NOCASE,
        link TEXT NOT NULL DEFAULT '',
        UNIQUE (name)
    );

    CREATE TABLE books_tags_link (
        id INTEGER PRIMARY KEY,
        book INTEGER NOT NULL,
        tag INTEGER NOT NULL,
        UNIQUE(book, tag)
    );

    CREATE TABLE series (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL COLLATE NOCASE,
        sort TEXT COLLATE NOCASE,
        link TEXT NOT NULL DEFAULT '',
        UNIQUE (name)
    );

    CREATE TABLE books_series_link (
        id INTEGER PRIMARY KEY,
        book INTEGER NOT NULL,
        series INTEGER NOT NULL,
        UNIQUE(book)
    );

    CREATE TABLE comments (
        id INTEGER PRIMARY KEY,
        book INTEGER NOT NULL,
        text TEXT NOT NULL COLLATE NOCASE,
        UNIQUE(book)
    );

    CREATE TABLE data (
        id INTEGER PRIMARY KEY,
        book INTEGER NOT NULL,
        format TEXT NOT NULL COLLATE NOCASE,
        uncompressed_size INTEGER NOT NULL,
        name TEXT NOT NULL,
        UNIQUE(book, format)
    );
"#;
