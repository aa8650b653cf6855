//! Scanning framing: newline-delimited records, no metadata, no index
//!
//! Records are stored as `payload + '\n'` and every boundary lookup scans
//! the file for the delimiter from the requested position. This has the
//! smallest storage overhead of the three strategies and the weakest
//! decode-time performance, since lookups are linear rescans.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use crate::boundary::{scan_delimiter, BoundaryDetector, EntityBoundary, DELIMITER};

/// Newline framing resolved by rescanning the file
#[derive(Debug)]
pub struct ScanningDetector {
    scan_chunk: usize,
}

impl ScanningDetector {
    /// Create a detector with the given scratch-buffer sizing hint
    pub fn new(scan_chunk: usize) -> Self {
        Self { scan_chunk }
    }

    /// Walk backwards from `from_pos` to the start of the enclosing record
    fn find_record_start(&self, file: &mut File, from_pos: u64) -> io::Result<u64> {
        let mut pos = from_pos;
        let mut byte = [0u8; 1];

        while pos > 0 {
            file.seek(SeekFrom::Start(pos - 1))?;
            file.read_exact(&mut byte)?;
            if byte[0] == DELIMITER {
                return Ok(pos);
            }
            pos -= 1;
        }

        Ok(0)
    }
}

impl BoundaryDetector for ScanningDetector {
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
        let file_len = file.metadata()?.len();
        let mut boundaries = Vec::new();

        let mut current_pos = 0u64;
        while current_pos < file_len {
            match scan_delimiter(file, current_pos, file_len, self.scan_chunk)? {
                Some(end) => {
                    let size = (end - current_pos) as u32;
                    boundaries.push(EntityBoundary::contiguous(current_pos, size));
                    current_pos = end;
                }
                None => break,
            }
        }

        Ok(boundaries)
    }

    fn find_next_valid_position(&mut self, file: &mut File, current_pos: u64) -> io::Result<u64> {
        let file_len = file.metadata()?.len();
        match scan_delimiter(file, current_pos, file_len, self.scan_chunk)? {
            Some(end) => Ok(end),
            None => Ok(file_len),
        }
    }

    fn handle_wrapped_entities(&mut self, file: &mut File) -> io::Result<Vec<EntityBoundary>> {
        let file_len = file.metadata()?.len();
        if file_len == 0 {
            return Ok(Vec::new());
        }

        // A file ending mid-record (last byte is not a delimiter) means the
        // record continues from offset 0.
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(file_len - 1))?;
        file.read_exact(&mut last)?;
        if last[0] == DELIMITER {
            return Ok(Vec::new());
        }

        let wrapped_end = match scan_delimiter(file, 0, file_len, self.scan_chunk)? {
            Some(end) => end,
            None => return Ok(Vec::new()),
        };

        let record_start = self.find_record_start(file, file_len)?;
        let size = (file_len - record_start) + wrapped_end;

        Ok(vec![EntityBoundary::wrapped(
            record_start,
            size as u32,
            wrapped_end,
        )])
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
    fn test_entity_size_is_payload_plus_delimiter() {
        let detector = ScanningDetector::new(64);
        assert_eq!(detector.calculate_entity_size(b""), 1);
        assert_eq!(detector.calculate_entity_size(b"hello"), 6);
    }

    #[test]
    fn test_boundaries_found_by_rescanning() {
        let (_dir, mut file) = open_scratch("scan.dat");
        file.write_all(b"aa\nbbbb\nc\n").unwrap();

        let mut detector = ScanningDetector::new(4);
        let boundaries = detector.find_entity_boundaries(&mut file).unwrap();
        assert_eq!(boundaries.len(), 3);
        assert_eq!(boundaries[0], EntityBoundary::contiguous(0, 3));
        assert_eq!(boundaries[1], EntityBoundary::contiguous(3, 5));
        assert_eq!(boundaries[2], EntityBoundary::contiguous(8, 2));
    }

    #[test]
    fn test_incomplete_tail_ignored() {
        let (_dir, mut file) = open_scratch("tail.dat");
        file.write_all(b"done\npartial").unwrap();

        let mut detector = ScanningDetector::new(64);
        let boundaries = detector.find_entity_boundaries(&mut file).unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].size, 5);
    }

    #[test]
    fn test_find_next_valid_position_scans_forward() {
        let (_dir, mut file) = open_scratch("next.dat");
        file.write_all(b"one\ntwo\n").unwrap();

        let mut detector = ScanningDetector::new(2);
        assert_eq!(detector.find_next_valid_position(&mut file, 0).unwrap(), 4);
        assert_eq!(detector.find_next_valid_position(&mut file, 4).unwrap(), 8);
        assert_eq!(detector.find_next_valid_position(&mut file, 8).unwrap(), 8);
    }

    #[test]
    fn test_wrapped_tail_detected() {
        // Simulates a frame split across the wrap point: "xx\n" completes at
        // the front of the file, "WRAPPED-" hangs off the end.
        let (_dir, mut file) = open_scratch("wrapped.dat");
        file.write_all(b"xx\nmiddle\nWRAPPED-").unwrap();

        let mut detector = ScanningDetector::new(8);
        let wrapped = detector.handle_wrapped_entities(&mut file).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert!(wrapped[0].is_wrapped);
        assert_eq!(wrapped[0].start_offset, 10);
        assert_eq!(wrapped[0].wrap_position, Some(3));
        assert_eq!(wrapped[0].size, 8 + 3);
    }

    #[test]
    fn test_no_wrapped_tail_when_file_ends_on_delimiter() {
        let (_dir, mut file) = open_scratch("clean.dat");
        file.write_all(b"complete\n").unwrap();

        let mut detector = ScanningDetector::new(64);
        assert!(detector.handle_wrapped_entities(&mut file).unwrap().is_empty());
    }
}
