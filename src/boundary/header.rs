//! Header-based framing: `[u32 length][payload][delimiter]`
//!
//! Each record carries a 4-byte big-endian length prefix, so boundary
//! recovery jumps from header to header and never inspects payload bytes.
//! This is the fastest strategy to recover and the only one that tolerates
//! raw delimiter bytes inside payloads.
//!
//! Recovery stops at the first header that is zero, negative-length or
//! declares a record extending past the end of the file; everything before
//! that point is kept. The wrapped-record probe reads a possible trailing
//! length header at face value, without validating it against the tail
//! record's actual end, so garbage bytes there can be misidentified as a
//! wrapped record on a corrupt file.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::fs::File;
use std::io::{self, Seek, SeekFrom};

use crate::boundary::{BoundaryDetector, EntityBoundary, DELIMITER};

/// Size of the length prefix in bytes
const HEADER_SIZE: u64 = 4;

/// Length-prefixed framing strategy
#[derive(Debug, Default)]
pub struct HeaderBasedDetector;

impl BoundaryDetector for HeaderBasedDetector {
    fn calculate_entity_size(&self, payload: &[u8]) -> u32 {
        HEADER_SIZE as u32 + payload.len() as u32 + 1
    }

    fn encode_entity(&self, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(payload.len() + HEADER_SIZE as usize + 1);
        let mut prefix = [0u8; HEADER_SIZE as usize];
        BigEndian::write_u32(&mut prefix, payload.len() as u32);
        frame.extend_from_slice(&prefix);
        frame.extend_from_slice(payload);
        frame.push(DELIMITER);
        frame
    }

    fn payload_of<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        if frame.len() > HEADER_SIZE as usize {
            &frame[HEADER_SIZE as usize..frame.len() - 1]
        } else {
            &[]
        }
    }

    fn find_entity_boundaries(&mut self, file: &mut File) -> io::Result<Vec<EntityBoundary>> {
        let file_len = file.metadata()?.len();
        let mut boundaries = Vec::new();
        let mut current_pos = 0u64;

        while current_pos + HEADER_SIZE <= file_len {
            file.seek(SeekFrom::Start(current_pos))?;
            let payload_len = match file.read_u32::<BigEndian>() {
                Ok(n) => n as u64,
                Err(_) => break,
            };

            let total = HEADER_SIZE + payload_len + 1;
            if payload_len == 0 || current_pos + total > file_len {
                // Corruption boundary: keep everything parsed so far
                break;
            }

            boundaries.push(EntityBoundary::contiguous(current_pos, total as u32));
            current_pos += total;
        }

        Ok(boundaries)
    }

    fn find_next_valid_position(&mut self, file: &mut File, current_pos: u64) -> io::Result<u64> {
        let file_len = file.metadata()?.len();
        if current_pos + HEADER_SIZE > file_len {
            return Ok(file_len);
        }

        file.seek(SeekFrom::Start(current_pos))?;
        match file.read_u32::<BigEndian>() {
            Ok(n) => Ok(current_pos + HEADER_SIZE + n as u64 + 1),
            Err(_) => Ok(file_len),
        }
    }

    fn handle_wrapped_entities(&mut self, file: &mut File) -> io::Result<Vec<EntityBoundary>> {
        let file_len = file.metadata()?.len();
        let mut boundaries = Vec::new();

        if file_len >= HEADER_SIZE {
            // A header right at the end of the file means the payload and
            // delimiter continue at offset 0. The length is taken at face
            // value; see the module docs.
            file.seek(SeekFrom::Start(file_len - HEADER_SIZE))?;
            if let Ok(payload_len) = file.read_u32::<BigEndian>() {
                if payload_len > 0 {
                    let total = HEADER_SIZE as u32 + payload_len + 1;
                    boundaries.push(EntityBoundary::wrapped(
                        file_len - HEADER_SIZE,
                        total,
                        payload_len as u64 + 1,
                    ));
                }
            }
        }

        Ok(boundaries)
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
    fn test_entity_size_is_header_plus_payload_plus_delimiter() {
        let detector = HeaderBasedDetector;
        assert_eq!(detector.calculate_entity_size(b""), 5);
        assert_eq!(detector.calculate_entity_size(b"abc"), 8);
        assert_eq!(detector.calculate_entity_size(&vec![0u8; 1000]), 1005);
    }

    #[test]
    fn test_write_then_recover_boundaries() {
        let (_dir, mut file) = open_scratch("header.dat");
        let mut detector = HeaderBasedDetector;

        let first = detector.write_entity(&mut file, b"alpha", 0).unwrap();
        let second = detector
            .write_entity(&mut file, b"beta", first.end_offset)
            .unwrap();

        assert_eq!(first.size, 10);
        assert_eq!(second.start_offset, 10);

        let boundaries = detector.find_entity_boundaries(&mut file).unwrap();
        assert_eq!(boundaries, vec![first, second]);
    }

    #[test]
    fn test_recovery_stops_at_corrupt_header() {
        let (_dir, mut file) = open_scratch("corrupt.dat");
        let mut detector = HeaderBasedDetector;

        let first = detector.write_entity(&mut file, b"good", 0).unwrap();
        // Garbage declaring a record far larger than the file
        file.seek(SeekFrom::Start(first.end_offset)).unwrap();
        file.write_all(&[0xFF, 0xFF, 0xFF, 0xFF, b'x']).unwrap();

        let boundaries = detector.find_entity_boundaries(&mut file).unwrap();
        assert_eq!(boundaries, vec![first]);
    }

    #[test]
    fn test_find_next_valid_position_skips_one_frame() {
        let (_dir, mut file) = open_scratch("next.dat");
        let mut detector = HeaderBasedDetector;

        detector.write_entity(&mut file, b"one", 0).unwrap();
        detector.write_entity(&mut file, b"twotwo", 8).unwrap();

        assert_eq!(detector.find_next_valid_position(&mut file, 0).unwrap(), 8);
        assert_eq!(detector.find_next_valid_position(&mut file, 8).unwrap(), 19);
        // Past the last full header: clamped to file length
        assert_eq!(
            detector.find_next_valid_position(&mut file, 17).unwrap(),
            19
        );
    }

    #[test]
    fn test_trailing_header_reported_as_wrapped() {
        let (_dir, mut file) = open_scratch("wrapped.dat");
        let mut detector = HeaderBasedDetector;

        // A length header as the last four bytes of the file
        let mut prefix = [0u8; 4];
        BigEndian::write_u32(&mut prefix, 7);
        file.write_all(b"somedata").unwrap();
        file.write_all(&prefix).unwrap();

        let wrapped = detector.handle_wrapped_entities(&mut file).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert!(wrapped[0].is_wrapped);
        assert_eq!(wrapped[0].start_offset, 8);
        assert_eq!(wrapped[0].size, 12);
        assert_eq!(wrapped[0].wrap_position, Some(8));
    }
}
