//! File Backend
//!
//! One JSON document per record inside a flat directory. The document
//! name is the record name plus a `.json` extension; no mapping table,
//! no index.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, error};

use super::{archive, with_name, without_name, ConfigStorage, FILE_URL_PREFIX};
use crate::codec::{self, ConfigRecord};
use crate::error::{ReadError, ReadResult, StorageError, StorageResult};

/// Extension carried by every stored document.
const RECORD_EXTENSION: &str = ".json";

/// Filesystem-backed configuration storage.
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Backend over `directory`. Nothing is touched until
    /// `initialize_storage` or the first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory holding the record documents.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the document backing `name`.
    fn record_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}{RECORD_EXTENSION}"))
    }
}

impl ConfigStorage for FileStorage {
    fn url_prefix(&self) -> &'static str {
        FILE_URL_PREFIX
    }

    fn initialize_storage(&self) -> StorageResult<()> {
        let resource = self.directory.display().to_string();
        fs::create_dir_all(&self.directory).map_err(|e| StorageError::ProvisionFailed {
            resource: resource.clone(),
            reason: e.to_string(),
        })?;

        let metadata = fs::metadata(&self.directory).map_err(|e| StorageError::ProvisionFailed {
            resource: resource.clone(),
            reason: e.to_string(),
        })?;
        if metadata.permissions().readonly() {
            return Err(StorageError::ProvisionFailed {
                resource,
                reason: "directory is not writable".to_string(),
            });
        }

        debug!(directory = %self.directory.display(), "file storage ready");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.directory.is_dir()
    }

    fn exists(&self, name: &str) -> bool {
        self.record_path(name).is_file()
    }

    fn read(&self, name: &str) -> ReadResult<Option<ConfigRecord>> {
        let contents = match fs::read_to_string(self.record_path(name)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ReadError::Io {
                    name: name.to_string(),
                    source: e,
                })
            }
        };

        match codec::decode(&contents) {
            Ok(record) => Ok(Some(without_name(record))),
            Err(source) => Err(ReadError::Decode {
                name: name.to_string(),
                contents,
                source,
            }),
        }
    }

    fn write(&self, name: &str, record: &ConfigRecord) -> StorageResult<()> {
        let text = codec::encode(&with_name(name, record))?;
        fs::write(self.record_path(name), text).map_err(|e| StorageError::WriteFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn delete(&self, name: &str) -> StorageResult<bool> {
        let path = self.record_path(name);
        if !path.is_file() {
            // A missing directory is a provisioning failure; a missing
            // name inside a live directory is a normal miss.
            if !self.directory.is_dir() {
                return Err(StorageError::NotInitialized {
                    resource: self.directory.display().to_string(),
                });
            }
            return Ok(false);
        }

        fs::remove_file(&path).map_err(|e| StorageError::DeleteFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(true)
    }

    fn rename(&self, name: &str, new_name: &str) -> StorageResult<()> {
        fs::rename(self.record_path(name), self.record_path(new_name)).map_err(|e| {
            StorageError::RenameFailed {
                from: name.to_string(),
                to: new_name.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn modified_time(&self, name: &str) -> Option<i64> {
        let metadata = fs::metadata(self.record_path(name)).ok()?;
        let modified = metadata.modified().ok()?;
        let elapsed = modified.duration_since(UNIX_EPOCH).ok()?;
        Some(elapsed.as_secs() as i64)
    }

    fn list_all(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let resource = self.directory.display().to_string();
        let entries = fs::read_dir(&self.directory).map_err(|e| StorageError::ListFailed {
            resource: resource.clone(),
            reason: e.to_string(),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::ListFailed {
                resource: resource.clone(),
                reason: e.to_string(),
            })?;
            let file_name = entry.file_name();
            if let Some(file_name) = file_name.to_str() {
                if let Some(name) = file_name.strip_suffix(RECORD_EXTENSION) {
                    if name.starts_with(prefix) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        Ok(names)
    }

    fn export_archive(&self, destination: &Path) -> StorageResult<()> {
        let files = self
            .list_all("")?
            .into_iter()
            .map(|name| {
                let path = self.record_path(&name);
                (format!("{name}{RECORD_EXTENSION}"), path)
            })
            .collect::<Vec<_>>();
        archive::create(destination, &files)
    }

    fn import_archive(&self, source: &Path) -> StorageResult<()> {
        archive::extract(source, &self.directory).map_err(|e| {
            error!(
                source = %source.display(),
                error = %e,
                "archive import failed"
            );
            e
        })
    }
}
