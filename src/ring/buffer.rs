//! List-based ring store over a growing file
//!
//! This is the simpler of the two controllers: the backing file grows to fit
//! exactly the accepted records until the entity limit is reached, after
//! which each new record overwrites the physical bytes of the slot at the
//! current write index. The ring is logical, over the boundary list, not
//! over raw file offsets.
//!
//! This mode assumes records are roughly homogeneous in size: overwriting a
//! slot with a shorter record leaves the old record's trailing bytes stale
//! in the file. The boundary list stays correct, so read-back is unaffected,
//! but a raw scan of the file would see the leftovers.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::boundary::{create_detector, BoundaryDetector, EntityBoundary, RingBufferConfig};
use crate::ring::{reader, FileWriter, Result, RingError};

/// Capacity-bounded record store with slot-overwrite eviction
pub struct RingFileBuffer {
    /// Path to the backing file
    path: PathBuf,
    /// Backing file handle; None once closed
    file: Option<File>,
    /// Store configuration, fixed at construction
    config: RingBufferConfig,
    /// Active boundary-detection strategy
    detector: Box<dyn BoundaryDetector>,
    /// Live record boundaries; the slot at `current_write_index` is the
    /// oldest once the list is full
    entities: Vec<EntityBoundary>,
    /// Next slot to overwrite, advanced modulo `max_entities`
    current_write_index: usize,
    /// Monotonic count of accepted records, for diagnostics
    total_writes_count: u64,
}

impl RingFileBuffer {
    /// Create a store over a fresh (truncated) backing file
    pub fn create<P: AsRef<Path>>(path: P, config: RingBufferConfig) -> Result<Self> {
        Self::build(path, config, true)
    }

    /// Open a store over an existing file, recovering its boundary list
    ///
    /// Recovery asks the active detector for the boundaries already present
    /// and keeps the newest `max_entities` of them. Anything after the first
    /// invalid frame is silently dropped.
    pub fn open<P: AsRef<Path>>(path: P, config: RingBufferConfig) -> Result<Self> {
        let mut store = Self::build(path, config, false)?;

        if let Some(file) = store.file.as_mut() {
            let mut boundaries = store.detector.find_entity_boundaries(file)?;
            let max = config.max_entities as usize;
            if boundaries.len() > max {
                boundaries.drain(..boundaries.len() - max);
            }

            store.total_writes_count = boundaries.len() as u64;
            store.current_write_index = boundaries.len() % max;
            store.entities = boundaries;
        }

        Ok(store)
    }

    fn build<P: AsRef<Path>>(path: P, config: RingBufferConfig, truncate: bool) -> Result<Self> {
        if config.max_entities == 0 {
            return Err(RingError::InvalidConfig(
                "max_entities must be positive".to_string(),
            ));
        }

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(&path)?;

        Ok(Self {
            path,
            file: Some(file),
            config,
            detector: create_detector(&config),
            entities: Vec::with_capacity(config.max_entities as usize),
            current_write_index: 0,
            total_writes_count: 0,
        })
    }

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live records
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Total number of records ever accepted
    pub fn total_writes_count(&self) -> u64 {
        self.total_writes_count
    }

    /// Whether the store has been closed
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Live record boundaries, oldest first
    pub fn boundaries(&self) -> Vec<EntityBoundary> {
        if self.entities.len() < self.config.max_entities as usize {
            self.entities.clone()
        } else {
            let split = self.current_write_index;
            self.entities[split..]
                .iter()
                .chain(self.entities[..split].iter())
                .copied()
                .collect()
        }
    }

    /// Read back the payloads of all live records, oldest first
    pub fn read_entities(&mut self) -> Result<Vec<Vec<u8>>> {
        let ordered = self.boundaries();
        let file = self.file.as_mut().ok_or(RingError::Closed)?;
        let file_size = file.metadata()?.len();

        let mut payloads = Vec::with_capacity(ordered.len());
        for boundary in &ordered {
            let frame = reader::read_frame(file, boundary, file_size)?;
            payloads.push(self.detector.payload_of(&frame).to_vec());
        }

        Ok(payloads)
    }

    /// Force file contents to stable storage
    pub fn flush(&mut self) -> Result<()> {
        let file = self.file.as_ref().ok_or(RingError::Closed)?;
        file.sync_all()?;
        Ok(())
    }

    fn find_write_position(&self) -> io::Result<u64> {
        if self.entities.len() < self.config.max_entities as usize {
            // Still room: append at the end of the log
            let file = self
                .file
                .as_ref()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "store is closed"))?;
            file.metadata().map(|m| m.len())
        } else {
            // Full: overwrite the oldest slot in place
            Ok(self.entities[self.current_write_index].start_offset)
        }
    }
}

impl FileWriter for RingFileBuffer {
    fn add_entity(&mut self, payload: &[u8]) -> bool {
        !self.add_entities(&[payload]).is_empty()
    }

    fn add_entities(&mut self, payloads: &[&[u8]]) -> Vec<EntityBoundary> {
        let mut added = Vec::new();
        let max = self.config.max_entities as usize;

        for payload in payloads {
            if self.file.is_none() {
                log::warn!("dropping {} record(s): store is closed", payloads.len() - added.len());
                break;
            }

            let write_position = match self.find_write_position() {
                Ok(pos) => pos,
                Err(e) => {
                    log::warn!("could not determine write position: {}", e);
                    continue;
                }
            };

            let file = match self.file.as_mut() {
                Some(f) => f,
                None => break,
            };

            match self.detector.write_entity(file, payload, write_position) {
                Ok(boundary) => {
                    if self.entities.len() < max {
                        self.entities.push(boundary);
                    } else {
                        // The detector's note_boundary already replaced the
                        // stale index entry at this offset
                        self.entities[self.current_write_index] = boundary;
                    }

                    added.push(boundary);
                    self.total_writes_count += 1;
                    self.current_write_index = (self.current_write_index + 1) % max;
                }
                Err(e) => {
                    log::warn!("record write failed at offset {}: {}", write_position, e);
                }
            }
        }

        added
    }

    fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all() {
                log::warn!("sync on close failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryDetectionMode;
    use tempfile::tempdir;

    fn config(mode: BoundaryDetectionMode) -> RingBufferConfig {
        RingBufferConfig::new(3, mode)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = tempdir().unwrap();
        let result = RingFileBuffer::create(
            dir.path().join("bad.dat"),
            RingBufferConfig::new(0, BoundaryDetectionMode::HeaderBased),
        );
        assert!(matches!(result, Err(RingError::InvalidConfig(_))));
    }

    #[test]
    fn test_oldest_evicted_past_capacity() {
        let dir = tempdir().unwrap();
        let mut buffer = RingFileBuffer::create(
            dir.path().join("ring.dat"),
            config(BoundaryDetectionMode::HeaderBased),
        )
        .unwrap();

        for payload in [b"AAAAA", b"BBBBB", b"CCCCC", b"DDDDD"] {
            assert!(buffer.add_entity(payload));
        }

        assert_eq!(buffer.entity_count(), 3);
        assert_eq!(buffer.total_writes_count(), 4);

        let live = buffer.read_entities().unwrap();
        assert_eq!(live, vec![b"BBBBB".to_vec(), b"CCCCC".to_vec(), b"DDDDD".to_vec()]);
    }

    #[test]
    fn test_overwrite_reuses_oldest_slot_offset() {
        let dir = tempdir().unwrap();
        let mut buffer = RingFileBuffer::create(
            dir.path().join("slots.dat"),
            config(BoundaryDetectionMode::HeaderBased),
        )
        .unwrap();

        let first = buffer.add_entities(&[b"AAAAA".as_slice()])[0];
        buffer.add_entities(&[b"BBBBB".as_slice(), b"CCCCC".as_slice()]);

        let fourth = buffer.add_entities(&[b"DDDDD".as_slice()])[0];
        assert_eq!(fourth.start_offset, first.start_offset);
    }

    #[test]
    fn test_write_fault_mid_batch_skips_that_record() {
        let dir = tempdir().unwrap();
        let mut buffer = RingFileBuffer::create(
            dir.path().join("fault.dat"),
            RingBufferConfig::new(8, BoundaryDetectionMode::Scanning),
        )
        .unwrap();
        buffer.detector = Box::new(crate::ring::test_support::FaultyDetector::failing_on(3));

        let added = buffer.add_entities(&[
            b"b1".as_slice(),
            b"b2".as_slice(),
            b"b3".as_slice(),
            b"b4".as_slice(),
            b"b5".as_slice(),
        ]);
        assert_eq!(added.len(), 4, "the faulted record is skipped, not fatal");

        let live = buffer.read_entities().unwrap();
        assert_eq!(
            live,
            vec![b"b1".to_vec(), b"b2".to_vec(), b"b4".to_vec(), b"b5".to_vec()]
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut buffer = RingFileBuffer::create(
            dir.path().join("close.dat"),
            config(BoundaryDetectionMode::Scanning),
        )
        .unwrap();

        buffer.add_entity(b"one");
        buffer.close();
        assert!(buffer.is_closed());
        buffer.close();
        assert!(buffer.is_closed());

        // Writes after close fail without panicking
        assert!(!buffer.add_entity(b"two"));
    }

    #[test]
    fn test_reopen_recovers_boundaries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.dat");
        let cfg = config(BoundaryDetectionMode::HeaderBased);

        {
            let mut buffer = RingFileBuffer::create(&path, cfg).unwrap();
            buffer.add_entities(&[b"first".as_slice(), b"second".as_slice()]);
            buffer.close();
        }

        let mut buffer = RingFileBuffer::open(&path, cfg).unwrap();
        assert_eq!(buffer.entity_count(), 2);
        let live = buffer.read_entities().unwrap();
        assert_eq!(live, vec![b"first".to_vec(), b"second".to_vec()]);
    }
}
