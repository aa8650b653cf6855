//! Fixed-capacity ring store with head/tail pointers and wraparound writes
//!
//! The backing file is sized once at creation (`max_entities *
//! avg_entity_size * 2`) and never resized. `head_position` is the offset
//! immediately after the most recently written record; `tail_position` is
//! the start of the oldest live record; when the store is empty the two are
//! equal. Before any byte is written, the oldest records are evicted until
//! the framed size of the incoming record fits, so live byte ranges never
//! overlap.
//!
//! A record that does not fit between the head and the physical end of the
//! file is split: the first fragment fills `[head, file_size)` and the rest,
//! including the terminator, continues at offset 0.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::boundary::{create_detector, BoundaryDetector, EntityBoundary, RingBufferConfig};
use crate::ring::{reader, FileWriter, Result, RingError};

/// Fixed-size circular record store
pub struct FixedRingBuffer {
    /// Path to the backing file
    path: PathBuf,
    /// Backing file handle; None once closed
    file: Option<File>,
    /// Physical size of the backing region, fixed at creation
    file_size: u64,
    /// Store configuration
    config: RingBufferConfig,
    /// Active boundary-detection strategy
    detector: Box<dyn BoundaryDetector>,
    /// Live record boundaries, oldest at the front
    entities: VecDeque<EntityBoundary>,
    /// Offset immediately after the most recent record
    head_position: u64,
    /// Start offset of the oldest live record
    tail_position: u64,
    /// Monotonic count of accepted records, for diagnostics
    total_writes_count: u64,
}

impl FixedRingBuffer {
    /// Create a store over a fresh file of `max_entities * avg_entity_size * 2` bytes
    pub fn create<P: AsRef<Path>>(
        path: P,
        config: RingBufferConfig,
        avg_entity_size: u32,
    ) -> Result<Self> {
        if config.max_entities == 0 {
            return Err(RingError::InvalidConfig(
                "max_entities must be positive".to_string(),
            ));
        }
        if avg_entity_size == 0 {
            return Err(RingError::InvalidConfig(
                "avg_entity_size must be positive".to_string(),
            ));
        }

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        // 2x headroom over the expected footprint
        let file_size = config.max_entities as u64 * avg_entity_size as u64 * 2;
        file.set_len(file_size)?;

        Ok(Self {
            path,
            file: Some(file),
            file_size,
            config,
            detector: create_detector(&config),
            entities: VecDeque::with_capacity(config.max_entities as usize),
            head_position: 0,
            tail_position: 0,
            total_writes_count: 0,
        })
    }

    /// Open a store over an existing fixed-size file, recovering boundaries
    ///
    /// Best-effort: recovered records are ordered by offset, with a record
    /// detected across the wrap point placed last. The head resumes after
    /// the newest recovered record and the tail at the oldest.
    pub fn open<P: AsRef<Path>>(path: P, config: RingBufferConfig) -> Result<Self> {
        if config.max_entities == 0 {
            return Err(RingError::InvalidConfig(
                "max_entities must be positive".to_string(),
            ));
        }

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_size = file.metadata()?.len();
        if file_size == 0 {
            return Err(RingError::InvalidConfig(
                "cannot recover from an empty file".to_string(),
            ));
        }

        let mut store = Self {
            path,
            file: Some(file),
            file_size,
            config,
            detector: create_detector(&config),
            entities: VecDeque::new(),
            head_position: 0,
            tail_position: 0,
            total_writes_count: 0,
        };

        if let Some(file) = store.file.as_mut() {
            let mut recovered = store.detector.find_entity_boundaries(file)?;
            // A frame split across the wrap point is invisible to the
            // forward scan; only the wrap-aware probe reports it
            let wrapped: Vec<EntityBoundary> = store
                .detector
                .handle_wrapped_entities(file)?
                .into_iter()
                .filter(|w| !recovered.iter().any(|b| b.start_offset == w.start_offset))
                .collect();
            recovered.extend(wrapped);

            let max = config.max_entities as usize;
            if recovered.len() > max {
                recovered.drain(..recovered.len() - max);
            }

            if let (Some(first), Some(last)) = (recovered.first(), recovered.last()) {
                store.tail_position = first.start_offset;
                store.head_position = match last.wrap_position {
                    Some(wrap) => wrap % store.file_size,
                    None => last.end_offset % store.file_size,
                };
            }

            store.total_writes_count = recovered.len() as u64;
            store.entities = recovered.into();
        }

        Ok(store)
    }

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Physical size of the backing region
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Offset where the next write begins
    pub fn head_position(&self) -> u64 {
        self.head_position
    }

    /// Start offset of the oldest live record
    pub fn tail_position(&self) -> u64 {
        self.tail_position
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
        self.entities.iter().copied().collect()
    }

    /// Bytes currently available for writing without eviction
    pub fn available_free_space(&self) -> u64 {
        if self.entities.is_empty() {
            self.file_size
        } else if self.head_position == self.tail_position {
            // Non-empty with head meeting tail: the region is exactly full
            0
        } else if self.head_position > self.tail_position {
            self.file_size - (self.head_position - self.tail_position)
        } else {
            self.tail_position - self.head_position
        }
    }

    /// Read back the payloads of all live records, oldest first
    pub fn read_entities(&mut self) -> Result<Vec<Vec<u8>>> {
        let ordered = self.boundaries();
        let file = self.file.as_mut().ok_or(RingError::Closed)?;

        let mut payloads = Vec::with_capacity(ordered.len());
        for boundary in &ordered {
            let frame = reader::read_frame(file, boundary, self.file_size)?;
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

    /// Remove the oldest record and advance the tail
    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.entities.pop_front() {
            self.detector.on_evict(&oldest);
            self.tail_position = match self.entities.front() {
                Some(next) => next.start_offset,
                None => self.head_position,
            };
        }
    }

    /// Write one record, evicting as needed; None if it can never fit
    fn write_record(&mut self, payload: &[u8]) -> io::Result<Option<EntityBoundary>> {
        let required = self.detector.calculate_entity_size(payload) as u64;

        // Reserve space before any byte is written; the entity limit is
        // enforced here as well so the list never exceeds max_entities
        while !self.entities.is_empty()
            && (self.available_free_space() < required
                || self.entities.len() >= self.config.max_entities as usize)
        {
            self.evict_oldest();
        }
        if self.available_free_space() < required {
            // Larger than the whole region; unreachable for sane configs
            return Ok(None);
        }

        let head = self.head_position;
        let room_to_end = self.file_size - head;

        let file = match self.file.as_mut() {
            Some(f) => f,
            None => return Ok(None),
        };

        let boundary = if required <= room_to_end {
            self.detector.write_entity(file, payload, head)?
        } else {
            // Split across the wrap point; the terminator lands in the
            // second fragment
            let frame = self.detector.encode_entity(payload);
            let size_to_end = room_to_end as usize;

            file.seek(SeekFrom::Start(head))?;
            file.write_all(&frame[..size_to_end])?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&frame[size_to_end..])?;

            let boundary = EntityBoundary::wrapped(
                head,
                frame.len() as u32,
                (frame.len() - size_to_end) as u64,
            );
            self.detector.note_boundary(&boundary);
            boundary
        };

        if self.total_writes_count == 0 {
            self.tail_position = boundary.start_offset;
        }

        self.entities.push_back(boundary);
        self.head_position = (head + required) % self.file_size;
        self.total_writes_count += 1;

        Ok(Some(boundary))
    }
}

impl FileWriter for FixedRingBuffer {
    fn add_entity(&mut self, payload: &[u8]) -> bool {
        !self.add_entities(&[payload]).is_empty()
    }

    fn add_entities(&mut self, payloads: &[&[u8]]) -> Vec<EntityBoundary> {
        let mut added = Vec::new();

        for payload in payloads {
            if self.file.is_none() {
                log::warn!("dropping {} record(s): store is closed", payloads.len() - added.len());
                break;
            }

            match self.write_record(payload) {
                Ok(Some(boundary)) => added.push(boundary),
                Ok(None) => {
                    log::warn!(
                        "record of {} byte(s) cannot fit a {} byte region, skipped",
                        payload.len(),
                        self.file_size
                    );
                }
                Err(e) => {
                    log::warn!("record write failed at offset {}: {}", self.head_position, e);
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
