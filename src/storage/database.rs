//! Database Backend
//!
//! One row per record in a single SQLite table: `name` is the primary
//! key, `data` holds the encoded document, `ctime` is stamped once at
//! first insert. Archive export stages rows as files before bundling.

use std::fs;
use std::path::Path;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, error};

use super::sqlite::{ConnectionRegistry, Database};
use super::{archive, parse_db_specifier, with_name, without_name, ConfigStorage, DB_URL_PREFIX};
use crate::codec::{self, ConfigRecord};
use crate::error::{ReadError, ReadResult, StorageError, StorageResult};

/// SQLite-backed configuration storage.
///
/// The connection handle is injected at construction; the backend owns
/// only the table. Table and connection names come from the specifier
/// grammar, whose `\w` character class doubles as the identifier guard
/// for the SQL below.
pub struct DatabaseStorage {
    db: Database,
    table: String,
}

impl DatabaseStorage {
    /// Backend over `table` on an explicit connection handle.
    pub fn new(db: Database, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }

    /// Resolve a `db:` specifier against the registry.
    ///
    /// Accepted forms: `db:/<connection>/<table>`, `db:/<table>`,
    /// `db:<table>`. A missing or empty connection segment selects the
    /// default connection.
    pub fn from_specifier(
        specifier: &str,
        connections: &ConnectionRegistry,
    ) -> StorageResult<Self> {
        let spec = parse_db_specifier(specifier)?;
        let db = connections
            .get(&spec.connection)
            .ok_or(StorageError::UnknownConnection {
                connection: spec.connection,
            })?
            .clone();
        Ok(Self::new(db, spec.table))
    }

    /// Table holding the records.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn raw_row(&self, name: &str) -> ReadResult<Option<String>> {
        self.db
            .with_connection(|conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT data FROM {} WHERE name = ?", self.table),
                        [name],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .map_err(|source| ReadError::Database {
                name: name.to_string(),
                source,
            })
    }
}

impl ConfigStorage for DatabaseStorage {
    fn url_prefix(&self) -> &'static str {
        DB_URL_PREFIX
    }

    fn initialize_storage(&self) -> StorageResult<()> {
        self.db
            .with_connection(|conn| {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        name TEXT PRIMARY KEY NOT NULL CHECK (length(name) <= 255),
                        data TEXT NOT NULL,
                        ctime INTEGER NOT NULL DEFAULT 0
                    );",
                    self.table
                ))?;
                Ok(())
            })
            .map_err(|e| StorageError::ProvisionFailed {
                resource: self.table.clone(),
                reason: e.to_string(),
            })?;

        debug!(table = %self.table, "database storage ready");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.db
            .with_connection(|conn| {
                let found: Option<String> = conn
                    .query_row(
                        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                        [self.table.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .unwrap_or(false)
    }

    fn exists(&self, name: &str) -> bool {
        self.db
            .with_connection(|conn| {
                let found: Option<i64> = conn
                    .query_row(
                        &format!("SELECT 1 FROM {} WHERE name = ?", self.table),
                        [name],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .unwrap_or(false)
    }

    fn read(&self, name: &str) -> ReadResult<Option<ConfigRecord>> {
        match self.raw_row(name)? {
            None => Ok(None),
            Some(contents) => match codec::decode(&contents) {
                Ok(record) => Ok(Some(without_name(record))),
                Err(source) => Err(ReadError::Decode {
                    name: name.to_string(),
                    contents,
                    source,
                }),
            },
        }
    }

    fn write(&self, name: &str, record: &ConfigRecord) -> StorageResult<()> {
        let data = codec::encode(&with_name(name, record))?;
        let now = Utc::now().timestamp();

        // The insert arm stamps ctime; the conflict arm leaves it alone,
        // so the row keeps its first-insert timestamp across overwrites.
        self.db
            .with_connection(|conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO {} (name, data, ctime) VALUES (?1, ?2, ?3)
                         ON CONFLICT(name) DO UPDATE SET data = excluded.data",
                        self.table
                    ),
                    params![name, data, now],
                )?;
                Ok(())
            })
            .map_err(|e| StorageError::WriteFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn delete(&self, name: &str) -> StorageResult<bool> {
        let deleted = self
            .db
            .with_connection(|conn| {
                Ok(conn.execute(
                    &format!("DELETE FROM {} WHERE name = ?", self.table),
                    [name],
                )?)
            })
            .map_err(|e| StorageError::DeleteFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(deleted > 0)
    }

    fn rename(&self, name: &str, new_name: &str) -> StorageResult<()> {
        // Clearing the destination and moving the source are two
        // statements; the transaction keeps a mid-sequence failure from
        // losing both names.
        self.db
            .transaction(|tx| {
                tx.execute(
                    &format!("DELETE FROM {} WHERE name = ?", self.table),
                    [new_name],
                )?;
                tx.execute(
                    &format!("UPDATE {} SET name = ?1 WHERE name = ?2", self.table),
                    params![new_name, name],
                )?;
                Ok(())
            })
            .map_err(|e| StorageError::RenameFailed {
                from: name.to_string(),
                to: new_name.to_string(),
                reason: e.to_string(),
            })
    }

    fn modified_time(&self, name: &str) -> Option<i64> {
        self.db
            .with_connection(|conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT ctime FROM {} WHERE name = ?", self.table),
                        [name],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .unwrap_or(None)
    }

    fn list_all(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // '%' and '_' in the prefix reach LIKE unescaped and match as
        // wildcards.
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT name FROM {} WHERE name LIKE ?",
                    self.table
                ))?;
                let names = stmt
                    .query_map([format!("{prefix}%")], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .map_err(|e| StorageError::ListFailed {
                resource: self.table.clone(),
                reason: e.to_string(),
            })
    }

    fn export_archive(&self, destination: &Path) -> StorageResult<()> {
        let names = self.list_all("")?;

        // Rows are materialized as documents in a staging directory that
        // is removed on every exit path, success or failure.
        let staging = tempfile::tempdir().map_err(|e| StorageError::Archive {
            path: destination.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut files = Vec::with_capacity(names.len());
        for name in &names {
            let data = self
                .raw_row(name)
                .map_err(|e| StorageError::Archive {
                    path: destination.to_path_buf(),
                    reason: e.to_string(),
                })?
                .unwrap_or_default();
            let entry_name = format!("{name}.json");
            let staged = staging.path().join(&entry_name);
            fs::write(&staged, data).map_err(|e| StorageError::Archive {
                path: destination.to_path_buf(),
                reason: e.to_string(),
            })?;
            files.push((entry_name, staged));
        }

        archive::create(destination, &files)
    }

    fn import_archive(&self, source: &Path) -> StorageResult<()> {
        let staging = tempfile::tempdir().map_err(|e| StorageError::Archive {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

        archive::extract(source, staging.path()).map_err(|e| {
            error!(
                source = %source.display(),
                error = %e,
                "archive import failed"
            );
            e
        })?;

        let entries = fs::read_dir(staging.path()).map_err(|e| StorageError::Archive {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| StorageError::Archive {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;
            let file_name = entry.file_name();
            let name = match file_name.to_str().and_then(|f| f.strip_suffix(".json")) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let contents = fs::read_to_string(entry.path()).map_err(|e| StorageError::Archive {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;
            let record = codec::decode(&contents)
                .map(without_name)
                .map_err(|e| {
                    error!(
                        source = %source.display(),
                        record = %name,
                        error = %e,
                        "archive import failed"
                    );
                    StorageError::Archive {
                        path: source.to_path_buf(),
                        reason: format!("record '{name}': {e}"),
                    }
                })?;

            self.write(&name, &record)?;
        }
        Ok(())
    }
}
