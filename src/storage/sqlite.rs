//! SQLite Connections
//!
//! Connection handles shared by database-backed configuration storage,
//! and the registry that maps specifier connection names onto them.

use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock error: {0}")]
    Lock(String),
}

/// Database result type
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Connection name used when a `db:` specifier omits one.
pub const DEFAULT_CONNECTION: &str = "default";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path
    pub path: PathBuf,
    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,
    /// Cache size (pages, negative = KB)
    pub cache_size: Option<i32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config.db"),
            wal_mode: true,
            cache_size: Some(-64000), // 64MB
        }
    }
}

impl DatabaseConfig {
    /// Create config for in-memory database
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            wal_mode: false, // WAL not supported for in-memory
            cache_size: Some(-64000),
        }
    }

    /// Create config with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Thread-safe database wrapper
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    config: DatabaseConfig,
}

impl Database {
    /// Open or create database
    pub fn open(config: DatabaseConfig) -> DatabaseResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&config.path, flags)?;

        Self::configure_connection(&conn, &config)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Open in-memory database
    pub fn open_in_memory() -> DatabaseResult<Self> {
        Self::open(DatabaseConfig::in_memory())
    }

    /// Configure connection pragmas
    fn configure_connection(conn: &Connection, config: &DatabaseConfig) -> DatabaseResult<()> {
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }

        if let Some(size) = config.cache_size {
            conn.execute_batch(&format!("PRAGMA cache_size = {};", size))?;
        }

        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        Ok(())
    }

    /// Get database path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Execute with connection
    pub fn with_connection<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&Connection) -> DatabaseResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DatabaseError::Lock(e.to_string()))?;
        f(&conn)
    }

    /// Execute a transaction
    pub fn transaction<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> DatabaseResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DatabaseError::Lock(e.to_string()))?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Check if the connection is usable
    pub fn is_valid(&self) -> bool {
        self.with_connection(|conn| {
            conn.execute_batch("SELECT 1;")
                .map_err(DatabaseError::from)
        })
        .is_ok()
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            config: self.config.clone(),
        }
    }
}

/// Named database connections available to `db:` specifiers.
///
/// Backends receive their connection handle from here instead of
/// reaching into process-wide state; registering under
/// [`DEFAULT_CONNECTION`] covers specifiers that omit a connection name.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Database>,
}

impl ConnectionRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `db` installed as the default connection
    #[must_use]
    pub fn with_default(db: Database) -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_CONNECTION, db);
        registry
    }

    /// Register a connection under `name`, replacing any previous one
    pub fn register(&mut self, name: impl Into<String>, db: Database) {
        self.connections.insert(name.into(), db);
    }

    /// Look up a connection by name
    pub fn get(&self, name: &str) -> Option<&Database> {
        self.connections.get(name)
    }
}
