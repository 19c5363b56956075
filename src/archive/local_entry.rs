use crate::archive::cursor::ByteCursor;
use crate::archive::directory::{DirectoryRecord, ParsedRecord};
use crate::archive::format::{le_u16, le_u32, CompressionMethod, DataDescriptor, EncryptionKind};
use crate::error::{Result, ZipDirError};
use crate::tree::{names_match, NameSpan};
use std::io::{Read, Seek};
use tracing::debug;

/// Local header signature "PK\x03\x04"
pub const LOCAL_ENTRY_SIGNATURE: u32 = 0x04034b50;

/// Fixed part of a local header, in bytes
pub const LOCAL_ENTRY_SIZE: usize = 30;

/// Local File Header
///
/// Precedes each file's data and duplicates the core fields of its
/// directory record.
///
/// Structure (30 bytes fixed, then name and extra field):
/// - Signature: "PK\x03\x04" (4 bytes)
/// - Version Needed: uint16
/// - Flags: uint16
/// - Compression Method: uint16
/// - Last Modification Time / Date: uint16 each
/// - CRC32, Compressed Size, Uncompressed Size: uint32 each
/// - Name Length: uint16
/// - Extra Length: uint16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEntryHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub descriptor: DataDescriptor,
    pub name_length: u16,
    pub extra_length: u16,
}

impl LocalEntryHeader {
    /// Decode the fixed part, or `None` if the signature is wrong
    pub fn parse(data: &[u8]) -> Option<Self> {
        if le_u32(&data[0..4]) != LOCAL_ENTRY_SIGNATURE {
            return None;
        }
        Some(Self {
            version_needed: le_u16(&data[4..6]),
            flags: le_u16(&data[6..8]),
            method: CompressionMethod::from_u16(le_u16(&data[8..10])),
            last_mod_time: le_u16(&data[10..12]),
            last_mod_date: le_u16(&data[12..14]),
            descriptor: DataDescriptor::parse(&data[14..26]),
            name_length: le_u16(&data[26..28]),
            extra_length: le_u16(&data[28..30]),
        })
    }

    /// Encode this header followed by `name` and `extra`
    pub fn write_into(&self, name: &[u8], extra: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(&LOCAL_ENTRY_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&self.version_needed.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.method.as_u16().to_le_bytes());
        out.extend_from_slice(&self.last_mod_time.to_le_bytes());
        out.extend_from_slice(&self.last_mod_date.to_le_bytes());
        self.descriptor.write_into(out);
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(extra);
    }
}

/// A file in the index: directory metadata plus the resolved data location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Normalized full path in the tree's name arena
    pub name: NameSpan,
    pub method: CompressionMethod,
    pub descriptor: DataDescriptor,
    /// Offset of the local header
    pub header_offset: u32,
    /// Offset of the first data byte, once resolved
    pub data_offset: Option<u32>,
    /// Offset of whatever follows this entry's slot in the file
    pub slot_end: u32,
    pub version_needed: u16,
    pub flags: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub external_attributes: u32,
    pub ntfs_mtime: Option<u64>,
}

impl FileEntry {
    pub fn from_parsed(parsed: &ParsedRecord) -> Self {
        let record = &parsed.record;
        Self {
            name: parsed.name,
            method: record.method,
            descriptor: record.descriptor,
            header_offset: record.local_header_offset,
            data_offset: None,
            slot_end: 0,
            version_needed: record.version_needed,
            flags: record.flags,
            last_mod_time: record.last_mod_time,
            last_mod_date: record.last_mod_date,
            external_attributes: record.external_attributes,
            ntfs_mtime: parsed.ntfs_mtime,
        }
    }

    /// Directory record describing this entry, used when the directory is rewritten
    pub fn to_record(&self) -> DirectoryRecord {
        DirectoryRecord {
            version_made_by: 20,
            version_needed: self.version_needed,
            flags: self.flags,
            method: self.method,
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            descriptor: self.descriptor,
            name_length: self.name.len() as u16,
            extra_length: 0,
            comment_length: 0,
            disk_number_start: 0,
            internal_attributes: 0,
            external_attributes: self.external_attributes,
            local_header_offset: self.header_offset,
        }
    }

    pub fn crc32(&self) -> u32 {
        self.descriptor.crc32
    }

    pub fn compressed_size(&self) -> u32 {
        self.descriptor.compressed_size
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.descriptor.uncompressed_size
    }

    pub fn is_resolved(&self) -> bool {
        self.data_offset.is_some()
    }

    /// One past the last data byte, once resolved
    pub fn end_offset(&self) -> Option<u64> {
        self.data_offset
            .map(|start| start as u64 + self.descriptor.compressed_size as u64)
    }
}

/// Computes where each entry's data starts, checking it against the layout
#[derive(Debug, Clone, Copy)]
pub struct EntryResolver {
    encryption: EncryptionKind,
    directory_offset: u32,
}

impl EntryResolver {
    pub fn new(encryption: EncryptionKind, directory_offset: u32) -> Self {
        Self {
            encryption,
            directory_offset,
        }
    }

    /// Checks every entry must pass, whether or not its data offset is resolved
    pub fn check(&self, entry: &FileEntry, name: &[u8]) -> Result<()> {
        if entry.header_offset > self.directory_offset {
            return Err(ZipDirError::OffsetOutOfRange {
                name: lossy(name),
                offset: entry.header_offset as u64,
                limit: self.directory_offset,
            });
        }

        if entry.method.is_stored()
            && entry.descriptor.compressed_size != entry.descriptor.uncompressed_size
        {
            return Err(ZipDirError::StoreSizeMismatch {
                name: lossy(name),
                compressed: entry.descriptor.compressed_size,
                uncompressed: entry.descriptor.uncompressed_size,
            });
        }
        Ok(())
    }

    /// Compute the absolute data offset of `entry`, whose normalized name is `name`.
    ///
    /// Encrypted archives trust the directory: their local headers cannot be
    /// read back. Otherwise the local header must repeat the directory's
    /// descriptor, method and name.
    pub fn resolve<R: Read + Seek>(
        &self,
        cursor: &mut ByteCursor<R>,
        entry: &FileEntry,
        name: &[u8],
    ) -> Result<u32> {
        let header_offset = entry.header_offset as u64;
        let data_offset = if self.encryption.is_encrypted() {
            header_offset + LOCAL_ENTRY_SIZE as u64 + name.len() as u64
        } else {
            let buf = cursor.read_at(header_offset, LOCAL_ENTRY_SIZE + name.len())?;
            let local = LocalEntryHeader::parse(&buf)
                .ok_or_else(|| mismatch(name, "local header signature is missing"))?;

            if local.descriptor != entry.descriptor {
                return Err(mismatch(name, "sizes or CRC differ from the directory"));
            }
            if local.method != entry.method {
                return Err(mismatch(name, "compression method differs from the directory"));
            }
            if local.name_length as usize != name.len() {
                return Err(mismatch(name, "name length differs from the directory"));
            }
            if !names_match(&buf[LOCAL_ENTRY_SIZE..], name) {
                return Err(mismatch(name, "name differs from the directory"));
            }

            header_offset
                + LOCAL_ENTRY_SIZE as u64
                + local.name_length as u64
                + local.extra_length as u64
        };

        // An empty entry may end exactly where the directory starts
        let limit = self.directory_offset as u64;
        let size = entry.descriptor.compressed_size as u64;
        let out_of_range = if size == 0 {
            data_offset > limit
        } else {
            data_offset >= limit || data_offset + size > limit
        };
        if out_of_range {
            return Err(ZipDirError::OffsetOutOfRange {
                name: lossy(name),
                offset: data_offset,
                limit: self.directory_offset,
            });
        }

        debug!(name = %lossy(name), header_offset, data_offset, "Resolved entry");
        Ok(data_offset as u32)
    }
}

fn lossy(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn mismatch(name: &[u8], reason: &str) -> ZipDirError {
    ZipDirError::ValidationFailed {
        name: lossy(name),
        reason: reason.to_string(),
    }
}
