//! Index-based framing: newline-delimited records plus an in-memory index
//!
//! Records are stored as `payload + '\n'` with no other metadata. The
//! detector keeps an offset-sorted index of every boundary it has written or
//! discovered, so position lookups are served from memory instead of
//! rescanning the file. The index is a cache, not source of truth: it is
//! rebuilt by one full linear scan the first time boundaries are requested
//! and an empty index is found, and it is never persisted across restarts.

use std::fs::File;
use std::io;

use crate::boundary::{scan_delimiter, BoundaryDetector, EntityBoundary, DELIMITER};

/// Newline framing with an offset-sorted boundary index
#[derive(Debug)]
pub struct IndexBasedDetector {
    index: Vec<EntityBoundary>,
    scan_chunk: usize,
}

impl IndexBasedDetector {
    /// Create a detector with the given scratch-buffer sizing hint
    pub fn new(scan_chunk: usize) -> Self {
        Self {
            index: Vec::new(),
            scan_chunk,
        }
    }

    /// Number of boundaries currently held in the index
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    fn rebuild_index(&mut self, file: &mut File) -> io::Result<()> {
        self.index.clear();
        let file_len = file.metadata()?.len();

        let mut current_pos = 0u64;
        while current_pos < file_len {
            match scan_delimiter(file, current_pos, file_len, self.scan_chunk)? {
                Some(end) => {
                    let size = (end - current_pos) as u32;
                    self.index.push(EntityBoundary::contiguous(current_pos, size));
                    current_pos = end;
                }
                // Trailing bytes with no delimiter: incomplete record, stop
                None => break,
            }
        }

        Ok(())
    }
}

impl BoundaryDetector for IndexBasedDetector {
    fn calculate_entity_size(&self, payload: &[u8]) -> u32 {
        payload.len() as u32 + 1
    }

    fn encode_entity(&self, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload);
        frame.push(DELIMITER);
        frame
    }

    fn payload_of<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        match frame.split_last() {
            Some((_, payload)) => payload,
            None => &[],
        }
    }

    fn find_entity_boundaries(&mut self, file: &mut File) -> io::Result<Vec<EntityBoundary>> {
        if self.index.is_empty() {
            self.rebuild_index(file)?;
        }
        Ok(self.index.clone())
    }

    fn find_next_valid_position(&mut self, file: &mut File, current_pos: u64) -> io::Result<u64> {
        if self.index.is_empty() {
            self.rebuild_index(file)?;
        }
        match self.index.iter().find(|b| b.start_offset > current_pos) {
            Some(boundary) => Ok(boundary.start_offset),
            None => Ok(file.metadata()?.len()),
        }
    }

    fn handle_wrapped_entities(&mut self, _file: &mut File) -> io::Result<Vec<EntityBoundary>> {
        Ok(self.index.iter().filter(|b| b.is_wrapped).copied().collect())
    }

    fn note_boundary(&mut self, boundary: &EntityBoundary) {
        // Overwrites at an existing start offset replace the stale entry
        match self
            .index
            .binary_search_by_key(&boundary.start_offset, |b| b.start_offset)
        {
            Ok(i) => self.index[i] = *boundary,
            Err(i) => self.index.insert(i, *boundary),
        }
    }

    fn on_evict(&mut self, boundary: &EntityBoundary) {
        if let Ok(i) = self
            .index
            .binary_search_by_key(&boundary.start_offset, |b| b.start_offset)
        {
            self.index.remove(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn open_scratch(name: &str) -> (tempfile::TempDir, File) {
        let dir = tempdir().unwrap();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(dir.path().join(name))
            .unwrap();
        (dir, file)
    }

    #[test]
    fn test_index_rebuilt_lazily_from_file() {
        let (_dir, mut file) = open_scratch("rebuild.dat");
        file.write_all(b"first\nsecond\nthird\n").unwrap();

        let mut detector = IndexBasedDetector::new(8);
        assert_eq!(detector.index_len(), 0);

        let boundaries = detector.find_entity_boundaries(&mut file).unwrap();
        assert_eq!(boundaries.len(), 3);
        assert_eq!(boundaries[0], EntityBoundary::contiguous(0, 6));
        assert_eq!(boundaries[1], EntityBoundary::contiguous(6, 7));
        assert_eq!(boundaries[2], EntityBoundary::contiguous(13, 6));
        assert_eq!(detector.index_len(), 3);
    }

    #[test]
    fn test_cold_next_position_rebuilds_index() {
        let (_dir, mut file) = open_scratch("cold.dat");
        file.write_all(b"first\nsecond\n").unwrap();

        // A lookup on a cold detector must rebuild, not report end-of-file
        let mut detector = IndexBasedDetector::new(8);
        assert_eq!(detector.index_len(), 0);
        assert_eq!(detector.find_next_valid_position(&mut file, 0).unwrap(), 6);
        assert_eq!(detector.index_len(), 2);
    }

    #[test]
    fn test_writes_keep_index_sorted() {
        let (_dir, mut file) = open_scratch("sorted.dat");
        let mut detector = IndexBasedDetector::new(64);

        // Written out of offset order on purpose
        detector.write_entity(&mut file, b"bb", 10).unwrap();
        detector.write_entity(&mut file, b"aaaa", 0).unwrap();

        let boundaries = detector.find_entity_boundaries(&mut file).unwrap();
        assert_eq!(boundaries[0].start_offset, 0);
        assert_eq!(boundaries[1].start_offset, 10);
    }

    #[test]
    fn test_next_position_served_from_index() {
        let (_dir, mut file) = open_scratch("next.dat");
        let mut detector = IndexBasedDetector::new(64);

        let first = detector.write_entity(&mut file, b"one", 0).unwrap();
        let second = detector
            .write_entity(&mut file, b"two", first.end_offset)
            .unwrap();

        assert_eq!(
            detector.find_next_valid_position(&mut file, 0).unwrap(),
            second.start_offset
        );
        // Nothing after the last boundary: falls back to the file length
        assert_eq!(
            detector
                .find_next_valid_position(&mut file, second.start_offset)
                .unwrap(),
            8
        );
    }

    #[test]
    fn test_eviction_removes_from_index() {
        let (_dir, mut file) = open_scratch("evict.dat");
        let mut detector = IndexBasedDetector::new(64);

        let first = detector.write_entity(&mut file, b"one", 0).unwrap();
        detector.write_entity(&mut file, b"two", first.end_offset).unwrap();
        assert_eq!(detector.index_len(), 2);

        detector.on_evict(&first);
        assert_eq!(detector.index_len(), 1);

        let boundaries = detector.find_entity_boundaries(&mut file).unwrap();
        assert_eq!(boundaries[0].start_offset, first.end_offset);
    }

    #[test]
    fn test_overwrite_replaces_index_entry() {
        let (_dir, mut file) = open_scratch("overwrite.dat");
        let mut detector = IndexBasedDetector::new(64);

        detector.write_entity(&mut file, b"long-payload", 0).unwrap();
        detector.write_entity(&mut file, b"tiny", 0).unwrap();

        assert_eq!(detector.index_len(), 1);
        let boundaries = detector.find_entity_boundaries(&mut file).unwrap();
        assert_eq!(boundaries[0].size, 5);
    }
}
