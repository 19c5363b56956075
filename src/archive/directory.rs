use crate::archive::format::{
    le_u16, le_u32, le_u64, CompressionMethod, DataDescriptor, ALT_SEPARATOR, EXTRA_NTFS,
    MAX_VERSION_NEEDED, SEPARATOR,
};
use crate::error::{Result, ZipDirError};
use crate::tree::{NameArena, NameSpan};
use tracing::{debug, trace};

/// Directory record signature "PK\x01\x02"
pub const DIRECTORY_RECORD_SIGNATURE: u32 = 0x02014b50;

/// Fixed part of a directory record, in bytes
pub const DIRECTORY_RECORD_SIZE: usize = 46;

/// Fixed part of one directory record.
///
/// Structure (46 bytes fixed, then name, extra field and comment):
/// - Signature: "PK\x01\x02" (4 bytes)
/// - Version Made By: uint16
/// - Version Needed: uint16
/// - Flags: uint16
/// - Compression Method: uint16
/// - Last Modification Time / Date: uint16 each
/// - CRC32, Compressed Size, Uncompressed Size: uint32 each
/// - Name Length, Extra Length, Comment Length: uint16 each
/// - Disk Number Start, Internal Attributes: uint16 each
/// - External Attributes: uint32
/// - Local Header Offset: uint32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub descriptor: DataDescriptor,
    pub name_length: u16,
    pub extra_length: u16,
    pub comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub local_header_offset: u32,
}

impl DirectoryRecord {
    /// Decode the fixed part from at least [`DIRECTORY_RECORD_SIZE`] bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let signature = le_u32(&data[0..4]);
        if signature != DIRECTORY_RECORD_SIGNATURE {
            return Err(ZipDirError::DirectoryCorrupt(format!(
                "bad record signature {:08x}",
                signature
            )));
        }

        Ok(Self {
            version_made_by: le_u16(&data[4..6]),
            version_needed: le_u16(&data[6..8]),
            flags: le_u16(&data[8..10]),
            method: CompressionMethod::from_u16(le_u16(&data[10..12])),
            last_mod_time: le_u16(&data[12..14]),
            last_mod_date: le_u16(&data[14..16]),
            descriptor: DataDescriptor::parse(&data[16..28]),
            name_length: le_u16(&data[28..30]),
            extra_length: le_u16(&data[30..32]),
            comment_length: le_u16(&data[32..34]),
            disk_number_start: le_u16(&data[34..36]),
            internal_attributes: le_u16(&data[36..38]),
            external_attributes: le_u32(&data[38..42]),
            local_header_offset: le_u32(&data[42..46]),
        })
    }

    /// Encode this record followed by `name`; extra field and comment are left empty
    pub fn write_into(&self, name: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(&DIRECTORY_RECORD_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&self.version_made_by.to_le_bytes());
        out.extend_from_slice(&self.version_needed.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.method.as_u16().to_le_bytes());
        out.extend_from_slice(&self.last_mod_time.to_le_bytes());
        out.extend_from_slice(&self.last_mod_date.to_le_bytes());
        self.descriptor.write_into(out);
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&self.disk_number_start.to_le_bytes());
        out.extend_from_slice(&self.internal_attributes.to_le_bytes());
        out.extend_from_slice(&self.external_attributes.to_le_bytes());
        out.extend_from_slice(&self.local_header_offset.to_le_bytes());
        out.extend_from_slice(name);
    }

    /// Length of the whole record including its variable parts
    pub fn total_size(&self) -> usize {
        DIRECTORY_RECORD_SIZE
            + self.name_length as usize
            + self.extra_length as usize
            + self.comment_length as usize
    }
}

/// One file record produced by the directory walk
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub record: DirectoryRecord,
    /// Normalized name, stored in the walk's [`NameArena`]
    pub name: NameSpan,
    /// Last modification time from the NTFS extra block, if present
    pub ntfs_mtime: Option<u64>,
}

/// Result of walking a directory buffer
#[derive(Debug, Default)]
pub struct DirectoryListing {
    pub records: Vec<ParsedRecord>,
    /// Directory marker records that were skipped
    pub markers: usize,
}

/// Walk every record in `buffer`, which holds exactly the directory bytes.
///
/// File names are normalized into `names`. Records whose name ends in a
/// separator are directory markers and are counted but not returned.
pub fn parse(buffer: &[u8], names: &mut NameArena) -> Result<DirectoryListing> {
    let mut listing = DirectoryListing::default();
    let mut pos = 0usize;

    while pos < buffer.len() {
        if buffer.len() - pos < DIRECTORY_RECORD_SIZE {
            return Err(ZipDirError::DirectoryCorrupt(format!(
                "truncated record header at directory offset {}",
                pos
            )));
        }

        let record = DirectoryRecord::parse(&buffer[pos..])?;
        if record.version_needed & 0xFF > MAX_VERSION_NEEDED {
            return Err(ZipDirError::UnsupportedVersion(record.version_needed));
        }

        let end = pos + record.total_size();
        if end > buffer.len() {
            return Err(ZipDirError::DirectoryCorrupt(format!(
                "record at directory offset {} ends at {}, past the directory end {}",
                pos,
                end,
                buffer.len()
            )));
        }

        let name_start = pos + DIRECTORY_RECORD_SIZE;
        let extra_start = name_start + record.name_length as usize;
        let raw_name = &buffer[name_start..extra_start];
        let extra = &buffer[extra_start..extra_start + record.extra_length as usize];

        match raw_name.last() {
            None => {
                return Err(ZipDirError::DirectoryCorrupt(format!(
                    "record at directory offset {} has an empty name",
                    pos
                )));
            }
            Some(&last) if last == SEPARATOR || last == ALT_SEPARATOR => {
                trace!(name = %String::from_utf8_lossy(raw_name), "Skipping directory marker");
                listing.markers += 1;
            }
            Some(_) => {
                let ntfs_mtime = parse_extra(extra)?;
                listing.records.push(ParsedRecord {
                    record,
                    name: names.push_normalized(raw_name),
                    ntfs_mtime,
                });
            }
        }

        pos = end;
    }

    debug!(
        files = listing.records.len(),
        markers = listing.markers,
        bytes = buffer.len(),
        "Walked directory"
    );
    Ok(listing)
}

/// Walk the extra-field blocks of one record, returning the NTFS
/// modification time if a block carries one.
fn parse_extra(extra: &[u8]) -> Result<Option<u64>> {
    let mut mtime = None;
    let mut pos = 0usize;
    while pos < extra.len() {
        if extra.len() - pos < 4 {
            return Err(ZipDirError::DirectoryCorrupt(
                "truncated extra field block header".to_string(),
            ));
        }
        let id = le_u16(&extra[pos..]);
        let size = le_u16(&extra[pos + 2..]) as usize;
        let data_start = pos + 4;
        if data_start + size > extra.len() {
            return Err(ZipDirError::DirectoryCorrupt(format!(
                "extra field block {:04x} runs past the extra field",
                id
            )));
        }

        // NTFS: reserved u32, attribute tag u16, attribute size u16, then mtime
        if id == EXTRA_NTFS && size >= 16 {
            mtime = Some(le_u64(&extra[data_start + 8..]));
        }
        pos = data_start + size;
    }
    Ok(mtime)
}
