use crate::archive::cursor::ByteCursor;
use crate::archive::format::{le_u16, le_u32, MAX_ARCHIVE_SIZE, MAX_COMMENT_LENGTH};
use crate::error::{Result, ZipDirError};
use std::io::{Read, Seek};
use tracing::debug;

/// Trailer signature "PK\x05\x06"
pub const END_RECORD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// Trailer size in bytes (fixed, excluding the comment)
pub const END_RECORD_SIZE: usize = 22;

/// Size of each backward read while searching for the trailer
pub const SEARCH_WINDOW: u64 = 0x100;

/// End of central directory record (trailer)
///
/// Located near the end of the archive, followed only by its comment.
///
/// Structure (22 bytes fixed):
/// - Signature: "PK\x05\x06" (4 bytes)
/// - Disk Number: uint16 (2 bytes, top two bits may hold a legacy encryption technique)
/// - Directory Start Disk: uint16 (2 bytes)
/// - Entries On This Disk: uint16 (2 bytes)
/// - Entries Total: uint16 (2 bytes)
/// - Directory Size: uint32 (4 bytes)
/// - Directory Offset: uint32 (4 bytes)
/// - Comment Length: uint16 (2 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndRecord {
    pub disk: u16,
    pub directory_start_disk: u16,
    pub entries_on_disk: u16,
    pub entries_total: u16,
    pub directory_size: u32,
    pub directory_offset: u32,
    pub comment_length: u16,
}

impl EndRecord {
    /// Create a single-volume end record
    pub fn new(entries: u16, directory_offset: u32, directory_size: u32, comment_length: u16) -> Self {
        Self {
            disk: 0,
            directory_start_disk: 0,
            entries_on_disk: entries,
            entries_total: entries,
            directory_size,
            directory_offset,
            comment_length,
        }
    }

    /// Decode from at least [`END_RECORD_SIZE`] bytes, checking the signature
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < END_RECORD_SIZE || data[0..4] != END_RECORD_SIGNATURE {
            return Err(ZipDirError::NoTrailerFound);
        }

        Ok(Self {
            disk: le_u16(&data[4..6]),
            directory_start_disk: le_u16(&data[6..8]),
            entries_on_disk: le_u16(&data[8..10]),
            entries_total: le_u16(&data[10..12]),
            directory_size: le_u32(&data[12..16]),
            directory_offset: le_u32(&data[16..20]),
            comment_length: le_u16(&data[20..22]),
        })
    }

    pub fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&END_RECORD_SIGNATURE);
        out.extend_from_slice(&self.disk.to_le_bytes());
        out.extend_from_slice(&self.directory_start_disk.to_le_bytes());
        out.extend_from_slice(&self.entries_on_disk.to_le_bytes());
        out.extend_from_slice(&self.entries_total.to_le_bytes());
        out.extend_from_slice(&self.directory_size.to_le_bytes());
        out.extend_from_slice(&self.directory_offset.to_le_bytes());
        out.extend_from_slice(&self.comment_length.to_le_bytes());
    }

    /// End of the directory region as declared by this record
    pub fn directory_end(&self) -> u64 {
        self.directory_offset as u64 + self.directory_size as u64
    }
}

/// A trailer together with where it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedEndRecord {
    pub record: EndRecord,
    /// Absolute offset of the trailer's signature
    pub offset: u64,
    pub file_size: u64,
}

/// Find the trailer by scanning backwards from the end of the file.
///
/// The file is read in [`SEARCH_WINDOW`]-sized slices, each extended by
/// `END_RECORD_SIZE - 1` bytes of the slice after it so a record straddling
/// two slices is still seen whole. The scan never goes further back than the
/// largest comment allows. The first signature met is authoritative: its
/// comment must cover exactly the rest of the file.
pub fn locate<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<LocatedEndRecord> {
    let file_size = cursor.len()?;
    if file_size > MAX_ARCHIVE_SIZE {
        return Err(ZipDirError::FileTooLarge { size: file_size });
    }
    let record_size = END_RECORD_SIZE as u64;
    if file_size < record_size {
        return Err(ZipDirError::FileTooSmall { size: file_size });
    }

    let floor = file_size.saturating_sub(record_size + MAX_COMMENT_LENGTH);
    let mut buffer = Vec::with_capacity(SEARCH_WINDOW as usize + END_RECORD_SIZE - 1);
    let mut window_end = file_size;
    // Highest position a whole record could start at
    let mut scan_pos = file_size - record_size;

    loop {
        let window_start = window_end.saturating_sub(SEARCH_WINDOW).max(floor);
        if window_start >= window_end {
            return Err(ZipDirError::NoTrailerFound);
        }

        let read_end = (window_end + record_size - 1).min(file_size);
        buffer.resize((read_end - window_start) as usize, 0);
        cursor.seek(window_start)?;
        cursor.read_exact(&mut buffer)?;

        let mut pos = scan_pos;
        while pos >= window_start {
            let at = (pos - window_start) as usize;
            if buffer[at..at + 4] == END_RECORD_SIGNATURE {
                let record = EndRecord::parse(&buffer[at..at + END_RECORD_SIZE])?;
                let expected = file_size - pos - record_size;
                if record.comment_length as u64 != expected {
                    return Err(ZipDirError::CommentLengthMismatch {
                        declared: record.comment_length,
                        expected,
                    });
                }

                debug!(offset = pos, file_size, ?record, "Located directory trailer");
                return Ok(LocatedEndRecord {
                    record,
                    offset: pos,
                    file_size,
                });
            }
            if pos == 0 {
                break;
            }
            pos -= 1;
        }

        if window_start == 0 {
            return Err(ZipDirError::NoTrailerFound);
        }
        scan_pos = window_start - 1;
        window_end = window_start;
    }
}
