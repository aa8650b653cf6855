//! Ring-structured record stores backed by a single file
//!
//! This module provides the controllers that own the backing file and the
//! live list of record boundaries:
//!
//! - `RingFileBuffer`: the list-based variant. The file grows until the
//!   entity limit is reached, after which new records overwrite the physical
//!   bytes of the oldest slot (a logical ring over the boundary list).
//! - `FixedRingBuffer`: the fixed-capacity variant. The file is sized once
//!   at creation and never resized; records are evicted to reclaim space and
//!   writes wrap around the physical end of the file.
//! - `reader`: read-back of live records, reconstructing wrapped frames
//!   from their two byte ranges.
//!
//! Neither controller is internally synchronized: they assume a single
//! logical writer per file handle. Callers with concurrent producers must
//! serialize access externally.

pub mod buffer;
pub mod fixed;
pub mod reader;

use std::fmt;
use std::io;

use crate::boundary::EntityBoundary;

/// Error types for the ring stores
#[derive(Debug)]
pub enum RingError {
    /// An IO error occurred
    Io(io::Error),
    /// The configuration was rejected at construction time
    InvalidConfig(String),
    /// The store has already been closed
    Closed,
}

impl From<io::Error> for RingError {
    fn from(error: io::Error) -> Self {
        RingError::Io(error)
    }
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingError::Io(e) => write!(f, "io error: {}", e),
            RingError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            RingError::Closed => write!(f, "store is closed"),
        }
    }
}

impl std::error::Error for RingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RingError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for ring store operations
pub type Result<T> = std::result::Result<T, RingError>;

/// The writer contract exposed to collaborators
///
/// No error type crosses this boundary: failed records are reflected in the
/// boolean or in a shortened boundary list, and callers must treat a result
/// shorter than the input as partial failure, not an exception.
pub trait FileWriter {
    /// Write one record; true iff it was durably written
    fn add_entity(&mut self, payload: &[u8]) -> bool;

    /// Write records in input order, each one independently
    ///
    /// The returned boundaries match the subsequence of inputs that
    /// succeeded, so the result can be shorter than the input.
    fn add_entities(&mut self, payloads: &[&[u8]]) -> Vec<EntityBoundary>;

    /// Release the file handle; never fails, double-close is a no-op
    fn close(&mut self);
}
