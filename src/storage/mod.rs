//! Storage Backends
//!
//! The `ConfigStorage` contract, its file and SQLite implementations,
//! and the specifier-based factory that selects between them.

pub mod archive;
pub mod database;
pub mod file;
pub mod sqlite;

pub use database::DatabaseStorage;
pub use file::FileStorage;
pub use sqlite::{ConnectionRegistry, Database, DatabaseConfig, DEFAULT_CONNECTION};

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::codec::ConfigRecord;
use crate::error::{ReadResult, StorageError, StorageResult};

/// Metadata key injected into every persisted record.
///
/// The stored form is self-describing: it carries its own name under
/// this key. The in-memory form handed back by `read` does not.
pub const CONFIG_NAME_KEY: &str = "_config_name";

/// Specifier prefix for [`FileStorage`].
pub const FILE_URL_PREFIX: &str = "file";

/// Specifier prefix for [`DatabaseStorage`].
pub const DB_URL_PREFIX: &str = "db";

/// Accepted `db:` forms: `db:/<connection>/<table>`, `db:/<table>`,
/// `db:<table>`. An empty connection segment means the default.
static DB_SPECIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^db:(?:/(\w*)/)?/?(\w+)$").unwrap());

/// Uniform contract over heterogeneous configuration storage media.
///
/// Both backends expose identical operation semantics; only the medium
/// differs. Records are addressed by name, and names are mapped onto
/// paths and rows by direct concatenation — validate names with
/// [`is_valid_name`] before handing them to a backend.
pub trait ConfigStorage {
    /// Specifier prefix identifying this backend kind.
    fn url_prefix(&self) -> &'static str;

    /// Provision the medium. Idempotent: a no-op when already provisioned.
    fn initialize_storage(&self) -> StorageResult<()>;

    /// Whether the medium is ready for use. Never errors.
    fn is_initialized(&self) -> bool;

    /// Whether a record exists. Medium failures read as `false`.
    fn exists(&self, name: &str) -> bool;

    /// Read a record. `Ok(None)` when the name is absent; a record that
    /// is present but does not decode is an error.
    fn read(&self, name: &str) -> ReadResult<Option<ConfigRecord>>;

    /// Read several records at once. Absent names are omitted from the
    /// result rather than failing the batch.
    fn read_multiple(&self, names: &[&str]) -> ReadResult<HashMap<String, ConfigRecord>> {
        let mut records = HashMap::new();
        for name in names {
            if let Some(record) = self.read(name)? {
                records.insert((*name).to_string(), record);
            }
        }
        Ok(records)
    }

    /// Write a record, replacing any previous value under `name`.
    fn write(&self, name: &str, record: &ConfigRecord) -> StorageResult<()>;

    /// Delete a record. `Ok(false)` when `name` was not present; an
    /// unprovisioned medium is an error, a missing name is not.
    fn delete(&self, name: &str) -> StorageResult<bool>;

    /// Move a record to a new name.
    fn rename(&self, name: &str, new_name: &str) -> StorageResult<()>;

    /// Timestamp for a record in epoch seconds, `None` when absent.
    ///
    /// The file backend reports the document's filesystem modification
    /// time; the database backend reports the row's creation time, set
    /// once at first insert and never updated. The two meanings diverge
    /// deliberately; callers depend on each.
    fn modified_time(&self, name: &str) -> Option<i64>;

    /// All record names starting with `prefix`. Order is unspecified.
    fn list_all(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Delete every record whose name starts with `prefix`.
    ///
    /// Best-effort: keeps going past individual failures and returns
    /// `Ok(false)` if any single deletion failed.
    fn delete_all(&self, prefix: &str) -> StorageResult<bool> {
        let mut all_deleted = true;
        for name in self.list_all(prefix)? {
            all_deleted &= self.delete(&name).unwrap_or(false);
        }
        Ok(all_deleted)
    }

    /// Bundle every record in the namespace into a tar archive at
    /// `destination`, one flat `<name>.json` entry per record.
    fn export_archive(&self, destination: &Path) -> StorageResult<()>;

    /// Load the records of a tar archive produced by `export_archive`,
    /// overwriting records of the same name.
    fn import_archive(&self, source: &Path) -> StorageResult<()>;
}

/// Resolve a specifier string to a concrete backend.
///
/// `file:<directory>` selects [`FileStorage`]; `db:` forms select
/// [`DatabaseStorage`] with a connection from `connections`.
pub fn open_storage(
    specifier: &str,
    connections: &ConnectionRegistry,
) -> StorageResult<Box<dyn ConfigStorage>> {
    if let Some(directory) = specifier.strip_prefix("file:") {
        if directory.is_empty() {
            return Err(StorageError::InvalidSpecifier(specifier.to_string()));
        }
        return Ok(Box::new(FileStorage::new(directory)));
    }
    if specifier.starts_with("db:") {
        return Ok(Box::new(DatabaseStorage::from_specifier(
            specifier,
            connections,
        )?));
    }
    Err(StorageError::InvalidSpecifier(specifier.to_string()))
}

/// Validate a record name before handing it to a backend.
///
/// Backends concatenate names into paths and rows without sanitizing,
/// so callers must reject separators and traversal segments up front.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.contains('/')
        && !name.contains('\\')
        && name != "."
        && name != ".."
}

/// Parsed form of a `db:` specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DbSpecifier {
    pub connection: String,
    pub table: String,
}

pub(crate) fn parse_db_specifier(specifier: &str) -> StorageResult<DbSpecifier> {
    let caps = DB_SPECIFIER_PATTERN
        .captures(specifier)
        .ok_or_else(|| StorageError::InvalidSpecifier(specifier.to_string()))?;
    let connection = caps
        .get(1)
        .map(|m| m.as_str())
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CONNECTION)
        .to_string();
    Ok(DbSpecifier {
        connection,
        table: caps[2].to_string(),
    })
}

/// Copy of `record` with the metadata name key injected.
pub(crate) fn with_name(name: &str, record: &ConfigRecord) -> ConfigRecord {
    let mut stored = record.clone();
    stored.insert(
        CONFIG_NAME_KEY.to_string(),
        Value::String(name.to_string()),
    );
    stored
}

/// Strip the metadata name key from a freshly decoded record.
pub(crate) fn without_name(mut record: ConfigRecord) -> ConfigRecord {
    record.remove(CONFIG_NAME_KEY);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_db_specifier_forms() {
        let spec = parse_db_specifier("db:/reporting/config").unwrap();
        assert_eq!(spec.connection, "reporting");
        assert_eq!(spec.table, "config");

        let spec = parse_db_specifier("db:/config").unwrap();
        assert_eq!(spec.connection, DEFAULT_CONNECTION);
        assert_eq!(spec.table, "config");

        let spec = parse_db_specifier("db:config").unwrap();
        assert_eq!(spec.connection, DEFAULT_CONNECTION);
        assert_eq!(spec.table, "config");

        // Empty connection segment also means default
        let spec = parse_db_specifier("db://config").unwrap();
        assert_eq!(spec.connection, DEFAULT_CONNECTION);
        assert_eq!(spec.table, "config");
    }

    #[test]
    fn test_parse_db_specifier_rejects_malformed() {
        for bad in [
            "db:",
            "db:/",
            "db://",
            "db:/conn/",
            "db:con-fig",
            "db:/a/b/c",
            "table_only",
        ] {
            assert!(
                matches!(
                    parse_db_specifier(bad),
                    Err(StorageError::InvalidSpecifier(_))
                ),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_open_storage_dispatch() {
        let registry = ConnectionRegistry::with_default(Database::open_in_memory().unwrap());

        let storage = open_storage("file:/tmp/config", &registry).unwrap();
        assert_eq!(storage.url_prefix(), "file");

        let storage = open_storage("db:config", &registry).unwrap();
        assert_eq!(storage.url_prefix(), "db");
    }

    #[test]
    fn test_open_storage_rejects_unknown_prefix() {
        let registry = ConnectionRegistry::new();
        assert!(matches!(
            open_storage("s3:bucket/config", &registry),
            Err(StorageError::InvalidSpecifier(_))
        ));
        assert!(matches!(
            open_storage("file:", &registry),
            Err(StorageError::InvalidSpecifier(_))
        ));
    }

    #[test]
    fn test_open_storage_unknown_connection() {
        let registry = ConnectionRegistry::new();
        assert!(matches!(
            open_storage("db:/reporting/config", &registry),
            Err(StorageError::UnknownConnection { .. })
        ));
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("site.settings"));
        assert!(is_valid_name("system.module_list"));

        assert!(!is_valid_name(""));
        assert!(!is_valid_name("../escape"));
        assert!(!is_valid_name("nested/record"));
        assert!(!is_valid_name("nested\\record"));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name(&"x".repeat(256)));
    }

    #[test]
    fn test_name_injection_round_trip() {
        let mut record = ConfigRecord::new();
        record.insert("name".to_string(), Value::String("Test Site".to_string()));

        let stored = with_name("site.settings", &record);
        assert_eq!(
            stored.get(CONFIG_NAME_KEY),
            Some(&Value::String("site.settings".to_string()))
        );

        assert_eq!(without_name(stored), record);
    }
}
