//! Error types for ewc-export
//!
//! This module defines the error hierarchy for the export pipeline:
//! - SQLite storage errors (open, row insert, transaction state)
//! - Geometry codec errors (malformed or unsupported blobs)
//! - Configuration errors
//! - Output file lifecycle errors
//!
//! Row-insert errors carry the table and row id so a failed bulk load can be
//! traced back to the node that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for an export run
#[derive(Error, Debug)]
pub enum ExportError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Geometry codec errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stale output file could not be removed or moved aside
    #[error("Cannot clear existing output '{path}': {reason}")]
    Collision { path: PathBuf, reason: String },

    /// The run produced no rows; the file has been removed
    #[error("Export produced no content, removed '{path}'")]
    EmptyOutput { path: PathBuf },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to create database file
    #[error("Failed to create database at '{path}': {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// A single row insert or update failed
    #[error("Failed to write {table} row {id}: {source}")]
    RowInsert {
        table: &'static str,
        id: i64,
        #[source]
        source: rusqlite::Error,
    },

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Operation not allowed in the engine's current state
    #[error("Invalid engine state: {0}")]
    InvalidState(&'static str),

    /// Writer channel closed unexpectedly
    #[error("Database writer channel closed unexpectedly")]
    ChannelClosed,

    /// Writer thread panicked
    #[error("Database writer thread panicked")]
    WriterPanicked,
}

/// Geometry blob encode/decode errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer shorter than the 4-byte kind tag
    #[error("Buffer of {len} bytes is too short for a kind tag")]
    MissingTag { len: usize },

    /// Tag outside the known kind range
    #[error("Unknown geometry tag {0}")]
    InvalidTag(u32),

    /// Kind exists but has no blob representation
    #[error("Geometry kind {0} has no blob representation")]
    Unsupported(&'static str),

    /// Fixed-layout blob with the wrong length
    #[error("{kind} blob must be {expected} bytes, got {actual}")]
    SizeMismatch {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Ran out of bytes while reading
    #[error("Truncated blob: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Bytes left over after a complete record
    #[error("{0} trailing bytes after geometry record")]
    TrailingBytes(usize),

    /// A nested count cannot possibly fit in the buffer
    #[error("Element count {count} overflows the blob size")]
    CountOverflow { count: u32 },

    /// Contour whose position and normal arrays are not matching xyz triples
    #[error("Malformed contour: {vertices} position floats, {normals} normal floats")]
    MalformedContour { vertices: usize, normals: usize },

    /// Mesh blob with an unknown format version
    #[error("Unsupported mesh format version {0}")]
    MeshVersion(i32),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid page size
    #[error("Invalid page size {size}: must be a power of two between {min} and {max}")]
    InvalidPageSize { size: u32, min: u32, max: u32 },

    /// Invalid channel size
    #[error("Invalid channel size {size}: must be at least {min}")]
    InvalidChannelSize { size: usize, min: usize },

    /// Invalid progress interval
    #[error("Invalid progress interval: must be greater than zero")]
    InvalidProgressInterval,

    /// Invalid output extension
    #[error("Invalid output extension '{0}'")]
    InvalidExtension(String),

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Unrecognized pragma value
    #[error("Unknown {setting} value '{value}'")]
    UnknownValue { setting: &'static str, value: String },
}

/// Result type alias for ExportError
pub type Result<T> = std::result::Result<T, ExportError>;

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Result type alias for CodecError
pub type CodecResult<T> = std::result::Result<T, CodecError>;
