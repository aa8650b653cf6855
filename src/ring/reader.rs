//! Read-back of framed records from the backing file
//!
//! Given a boundary and the current file size, a frame is read back as one
//! contiguous range, or as two ranges concatenated in order for records that
//! wrap around the physical end of the file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;

use crate::boundary::EntityBoundary;

/// Read the full framed bytes of one record
pub fn read_frame(
    file: &mut File,
    boundary: &EntityBoundary,
    file_size: u64,
) -> io::Result<Vec<u8>> {
    let (first, second) = boundary.data_positions(file_size);
    let mut frame = Vec::with_capacity(boundary.size as usize);

    read_range(file, first, &mut frame)?;
    if let Some(second) = second {
        read_range(file, second, &mut frame)?;
    }

    Ok(frame)
}

fn read_range(file: &mut File, range: Range<u64>, out: &mut Vec<u8>) -> io::Result<()> {
    if range.end <= range.start {
        return Ok(());
    }

    let len = (range.end - range.start) as usize;
    let start = out.len();
    out.resize(start + len, 0);

    file.seek(SeekFrom::Start(range.start))?;
    file.read_exact(&mut out[start..])
}
