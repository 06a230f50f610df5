//! confstore
//!
//! Pluggable persistence for named configuration records:
//! - A uniform storage contract ([`ConfigStorage`])
//! - A file backend (one JSON document per record in a directory)
//! - A SQLite backend (one row per record in a table)
//! - Tar export/import of a whole namespace
//!
//! Backends are selected by specifier strings such as `file:/etc/site`
//! or `db:/default/config`:
//!
//! ```
//! use confstore::{open_storage, ConfigRecord, ConfigStorage, ConnectionRegistry};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let specifier = format!("file:{}", dir.path().display());
//! let storage = open_storage(&specifier, &ConnectionRegistry::new()).unwrap();
//! storage.initialize_storage().unwrap();
//!
//! let mut record = ConfigRecord::new();
//! record.insert("name".to_string(), "Test Site".into());
//! storage.write("site.settings", &record).unwrap();
//!
//! assert_eq!(storage.read("site.settings").unwrap(), Some(record));
//! ```

pub mod codec;
pub mod error;
pub mod storage;

pub use codec::{decode, encode, ConfigRecord};
pub use error::{DecodeError, EncodeError, ReadError, StorageError};
pub use storage::{
    is_valid_name, open_storage, ConfigStorage, ConnectionRegistry, Database, DatabaseConfig,
    DatabaseStorage, FileStorage, CONFIG_NAME_KEY,
};
