//! Error Types
//!
//! Centralized error handling using thiserror for type-safe errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::storage::sqlite::DatabaseError;

/// Failure while serializing a record to its stored text form.
#[derive(Debug, Error)]
#[error("failed to encode record: {source}")]
pub struct EncodeError {
    #[from]
    source: serde_json::Error,
}

/// Failure while parsing stored text back into a record.
///
/// A parse result of `null` is rejected even though it is valid JSON: an
/// absent configuration is never a legitimate record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("input is empty")]
    Empty,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decoded to null")]
    Null,

    #[error("decoded to a JSON {kind}, expected an object")]
    NotAnObject { kind: &'static str },
}

/// Failure while reading a record that is present on the medium.
///
/// Absence is not an error; `read` reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("cannot decode record '{name}': {source} (raw contents: {contents:?})")]
    Decode {
        name: String,
        contents: String,
        #[source]
        source: DecodeError,
    },

    #[error("failed to read record '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("query failed for record '{name}': {source}")]
    Database {
        name: String,
        #[source]
        source: DatabaseError,
    },
}

/// Storage medium errors: provisioning, write/delete/rename failures,
/// enumeration over a missing medium, archive failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage specifier '{0}'")]
    InvalidSpecifier(String),

    #[error("no database connection registered under '{connection}'")]
    UnknownConnection { connection: String },

    #[error("storage '{resource}' is not initialized")]
    NotInitialized { resource: String },

    #[error("failed to provision storage '{resource}': {reason}")]
    ProvisionFailed { resource: String, reason: String },

    #[error("failed to write record '{name}': {reason}")]
    WriteFailed { name: String, reason: String },

    #[error("failed to delete record '{name}': {reason}")]
    DeleteFailed { name: String, reason: String },

    #[error("failed to rename record '{from}' to '{to}': {reason}")]
    RenameFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("failed to list records in '{resource}': {reason}")]
    ListFailed { resource: String, reason: String },

    #[error("archive operation on '{path}' failed: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for record reads.
pub type ReadResult<T> = std::result::Result<T, ReadError>;
