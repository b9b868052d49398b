//! Error types for binpress.

use thiserror::Error;

use crate::codec::CodecError;

/// The error type for packaging and unpackaging operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from file open/read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source file base name does not fit the entry name field.
    #[error("file name too long ({len} bytes): {name}")]
    NameTooLong { name: String, len: usize },

    /// Source file extension does not fit the entry extension field.
    #[error("file extension too long ({len} bytes): {ext}")]
    ExtTooLong { ext: String, len: usize },

    /// Package was written by an unsupported format version.
    #[error("incompatible package version {found} (expected {expected})")]
    IncompatibleVersion { found: String, expected: String },

    /// Aggregate payload exceeds what this build can address.
    #[error("total size {total} bytes exceeds the limit of {limit} bytes")]
    OversizedTotal { total: u64, limit: u64 },

    /// An entry payload failed to compress.
    #[error("failed to compress {entry}: {source}")]
    CompressFailure {
        entry: String,
        #[source]
        source: CodecError,
    },

    /// An entry payload failed to decompress.
    #[error("failed to decompress {entry}: {source}")]
    DecompressFailure {
        entry: String,
        #[source]
        source: CodecError,
    },

    /// A fixed-width numeric field holds something other than a number.
    #[error("malformed {field} field: {value:?}")]
    MalformedField { field: &'static str, value: String },

    /// A value does not fit its fixed-width field.
    #[error("{field} value {value:?} does not fit a {width}-byte field")]
    FieldOverflow {
        field: &'static str,
        value: String,
        width: usize,
    },

    /// Package ended in the middle of an entry payload.
    #[error("truncated payload for {entry}: expected {expected} bytes, found {found}")]
    Truncated {
        entry: String,
        expected: u64,
        found: u64,
    },

    /// Recovered entry name would escape the output directory.
    #[error("refusing to write unsafe file name: {0:?}")]
    UnsafeName(String),

    /// Chunked transfer was asked to move zero bytes per step.
    #[error("chunk step must be greater than zero")]
    InvalidStep,
}

pub type Result<T> = std::result::Result<T, Error>;
