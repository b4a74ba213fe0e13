//! # Error Taxonomy
//!
//! Every fallible operation in the library returns [`TideError`]. The variants map
//! one-to-one onto the failure classes of the prediction engine:
//!
//! - **Fatal for the file**: [`TideError::InvalidFormat`], [`TideError::IncompatibleType`]
//! - **Recoverable by the caller**: [`TideError::NotFound`]
//! - **Fatal for a build step**: [`TideError::AlreadyExists`], [`TideError::DimensionMismatch`]
//! - **Programming or data errors**: [`TideError::IndexOutOfRange`], [`TideError::InvalidGeometry`],
//!   [`TideError::InvalidArgument`]
//! - **I/O**: [`TideError::Io`], never retried since tidal atlases are local files
//!
//! Nothing inside the core logs an error and carries on; errors always reach the caller.

use crate::constituent::TideConstituent;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TideError {
    /// Bad magic signature, unsupported version or a corrupt record header
    #[error("invalid database format: {0}")]
    InvalidFormat(String),

    /// Database declares a different payload kind than the one requested
    #[error("incompatible payload kind: expected {expected}, found {found}")]
    IncompatibleType { expected: String, found: String },

    /// Constituent is not stored in the database
    #[error("constituent {0} not found")]
    NotFound(TideConstituent),

    /// Constituent already has a record; records are never overwritten
    #[error("constituent {0} already exists in database")]
    AlreadyExists(TideConstituent),

    /// Grid coordinate outside the declared grid
    #[error("grid index ({x}, {y}) out of range for {width}x{height} grid")]
    IndexOutOfRange {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    /// Amplitude and phase grids of one constituent disagree on geometry
    #[error("dimension mismatch for {constituent}: {detail}")]
    DimensionMismatch {
        constituent: TideConstituent,
        detail: String,
    },

    /// Grid bounds or sizes that cannot describe a valid sampling
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Scan window, step or year outside what can be represented
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown constituent name: {0}")]
    UnknownConstituent(String),

    #[error("unknown solver: {0}")]
    UnknownSolver(String),

    /// Text grid input could not be parsed
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Long-running scan aborted through its cancel token
    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TideError>;
