//! Record boundary model and the boundary-detection strategies
//!
//! This module provides the data structures and algorithms used to locate
//! variable-length records inside the backing file. Key components include:
//!
//! - EntityBoundary describing where one record lives, including records
//!   split across the physical end of the file
//! - RingBufferConfig with the capacity limit and detection mode
//! - The BoundaryDetector trait implemented by the three strategies
//! - A chunked delimiter scanner shared by the newline-framed strategies
//!
//! The three strategies trade storage overhead against recovery speed:
//!
//! - Header-based: 4-byte length prefix, recovery never inspects payloads
//! - Index-based: newline framing plus an in-memory offset-sorted index
//! - Scanning: newline framing only, every lookup rescans the file

pub mod header;
pub mod index;
pub mod scan;

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;

/// Frame terminator byte shared by all three strategies
pub const DELIMITER: u8 = b'\n';

/// Descriptor of one record's location inside the backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityBoundary {
    /// Offset of the first framed byte
    pub start_offset: u64,
    /// Exclusive end offset; meaningful only when `is_wrapped` is false
    pub end_offset: u64,
    /// Total framed byte length (payload plus header and delimiter)
    pub size: u32,
    /// Whether the record's bytes are split across the end of the file
    pub is_wrapped: bool,
    /// Exclusive end of the second fragment, counted from offset 0
    pub wrap_position: Option<u64>,
}

impl EntityBoundary {
    /// Create a boundary for a record stored in one contiguous range
    pub fn contiguous(start_offset: u64, size: u32) -> Self {
        Self {
            start_offset,
            end_offset: start_offset + size as u64,
            size,
            is_wrapped: false,
            wrap_position: None,
        }
    }

    /// Create a boundary for a record split across the end of the file
    ///
    /// `wrap_position` is the offset where the second fragment ends, so the
    /// record occupies `[start_offset, file_size)` followed by
    /// `[0, wrap_position)`.
    pub fn wrapped(start_offset: u64, size: u32, wrap_position: u64) -> Self {
        Self {
            start_offset,
            end_offset: wrap_position,
            size,
            is_wrapped: true,
            wrap_position: Some(wrap_position),
        }
    }

    /// Check the basic shape invariants of the descriptor
    pub fn is_valid(&self) -> bool {
        self.size > 0 && (!self.is_wrapped || self.wrap_position.is_some())
    }

    /// Byte range(s) to read this record back, given the current file size
    ///
    /// Returns two ranges only for wrapped records; concatenating the reads
    /// reconstructs the frame.
    pub fn data_positions(&self, file_size: u64) -> (Range<u64>, Option<Range<u64>>) {
        match (self.is_wrapped, self.wrap_position) {
            (true, Some(wrap)) => (self.start_offset..file_size, Some(0..wrap)),
            _ => (self.start_offset..self.end_offset, None),
        }
    }
}

/// Strategy used to frame records and recover their boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryDetectionMode {
    /// Newline framing with an in-memory offset-sorted index
    IndexBased,
    /// Newline framing, boundaries found by rescanning the file
    Scanning,
    /// Length-prefixed framing, boundaries read from record headers
    HeaderBased,
}

/// Immutable configuration for a ring store instance
#[derive(Debug, Clone, Copy)]
pub struct RingBufferConfig {
    /// Maximum number of live records; must be positive
    pub max_entities: u32,
    /// Boundary-detection strategy, fixed for the store's lifetime
    pub boundary_detection_mode: BoundaryDetectionMode,
    /// Sizing hint for scratch buffers used while scanning
    pub temp_slot_initial_size: u32,
}

impl RingBufferConfig {
    /// Create a configuration with the default scratch-buffer hint
    pub fn new(max_entities: u32, boundary_detection_mode: BoundaryDetectionMode) -> Self {
        Self {
            max_entities,
            boundary_detection_mode,
            temp_slot_initial_size: 1024,
        }
    }
}

/// One boundary-detection strategy
///
/// A detector knows how a record is framed on disk: how many bytes it will
/// occupy, how to write it at an offset, and how to find the records already
/// present in a file. `write_entity` always fully overwrites whatever was
/// previously stored at the given offset, and the controller consults
/// `calculate_entity_size` before writing so eviction can be decided up front.
pub trait BoundaryDetector: Send {
    /// Total framed size of the payload once written
    fn calculate_entity_size(&self, payload: &[u8]) -> u32;

    /// Produce the framed bytes for a payload
    fn encode_entity(&self, payload: &[u8]) -> Vec<u8>;

    /// Strip the framing from a read-back frame, returning the payload
    fn payload_of<'a>(&self, frame: &'a [u8]) -> &'a [u8];

    /// Recover the boundaries of all records already present in the file
    ///
    /// Recovery stops silently at the first invalid frame; everything before
    /// it is treated as valid.
    fn find_entity_boundaries(&mut self, file: &mut File) -> io::Result<Vec<EntityBoundary>>;

    /// Locate the first position after `current_pos` where a record may start
    fn find_next_valid_position(&mut self, file: &mut File, current_pos: u64) -> io::Result<u64>;

    /// Report records whose bytes continue past the end of the file
    fn handle_wrapped_entities(&mut self, file: &mut File) -> io::Result<Vec<EntityBoundary>>;

    /// Write one framed record at the given offset
    fn write_entity(
        &mut self,
        file: &mut File,
        payload: &[u8],
        position: u64,
    ) -> io::Result<EntityBoundary> {
        let frame = self.encode_entity(payload);
        file.seek(SeekFrom::Start(position))?;
        io::Write::write_all(file, &frame)?;
        let boundary = EntityBoundary::contiguous(position, frame.len() as u32);
        self.note_boundary(&boundary);
        Ok(boundary)
    }

    /// Record a boundary written by the controller itself (split writes)
    fn note_boundary(&mut self, _boundary: &EntityBoundary) {}

    /// Forget a boundary that has been evicted from the store
    fn on_evict(&mut self, _boundary: &EntityBoundary) {}
}

/// Build the detector selected by the configuration
pub fn create_detector(config: &RingBufferConfig) -> Box<dyn BoundaryDetector> {
    let hint = config.temp_slot_initial_size as usize;
    match config.boundary_detection_mode {
        BoundaryDetectionMode::IndexBased => Box::new(index::IndexBasedDetector::new(hint)),
        BoundaryDetectionMode::Scanning => Box::new(scan::ScanningDetector::new(hint)),
        BoundaryDetectionMode::HeaderBased => Box::new(header::HeaderBasedDetector),
    }
}

/// Find the position just past the next delimiter at or after `start`
///
/// Reads the file in chunks of `chunk_size` bytes and returns `None` when no
/// delimiter exists before `file_len`.
pub(crate) fn scan_delimiter(
    file: &mut File,
    start: u64,
    file_len: u64,
    chunk_size: usize,
) -> io::Result<Option<u64>> {
    let chunk_size = chunk_size.max(1);
    let mut buf = vec![0u8; chunk_size];
    let mut pos = start;

    file.seek(SeekFrom::Start(start))?;
    while pos < file_len {
        let want = ((file_len - pos) as usize).min(chunk_size);
        file.read_exact(&mut buf[..want])?;
        if let Some(i) = buf[..want].iter().position(|&b| b == DELIMITER) {
            return Ok(Some(pos + i as u64 + 1));
        }
        pos += want as u64;
    }

    Ok(None)
}
