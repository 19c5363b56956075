//! Hand-rolled pak fixtures for integration tests.
//!
//! Bytes are encoded here directly rather than through the library so the
//! parser is checked against an independent writer.

#![allow(dead_code)]

use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;
use tempfile::NamedTempFile;

pub const METHOD_STORE: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

struct FixtureFile {
    name: String,
    method: u16,
    content: Vec<u8>,
    stored: Vec<u8>,
    directory_only: bool,
}

/// Byte offsets of an encoded fixture
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub bytes: Vec<u8>,
    /// (local header offset, data offset) per file, in insertion order
    pub files: Vec<(usize, usize)>,
    /// Offset of each directory record, markers included, in insertion order
    pub records: Vec<usize>,
    pub directory_offset: usize,
    pub directory_size: usize,
    pub trailer_offset: usize,
}

impl Layout {
    pub fn write(&self) -> NamedTempFile {
        write_temp(&self.bytes)
    }

    pub fn put_u16(&mut self, at: usize, value: u16) {
        self.bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, at: usize, value: u32) {
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Builder for a single-volume archive
#[derive(Default)]
pub struct ZipFixture {
    files: Vec<FixtureFile>,
    comment: Vec<u8>,
    disk: u16,
    local_extra: Vec<u8>,
}

impl ZipFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, name: &str, content: &[u8]) -> Self {
        self.files.push(FixtureFile {
            name: name.to_string(),
            method: METHOD_STORE,
            content: content.to_vec(),
            stored: content.to_vec(),
            directory_only: false,
        });
        self
    }

    pub fn deflate(mut self, name: &str, content: &[u8]) -> Self {
        self.files.push(FixtureFile {
            name: name.to_string(),
            method: METHOD_DEFLATE,
            content: content.to_vec(),
            stored: deflate(content),
            directory_only: false,
        });
        self
    }

    /// A directory marker record (name should end in a separator)
    pub fn dir(mut self, name: &str) -> Self {
        self.files.push(FixtureFile {
            name: name.to_string(),
            method: METHOD_STORE,
            content: Vec::new(),
            stored: Vec::new(),
            directory_only: true,
        });
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Raw disk field of the trailer (legacy encryption lives in its top bits)
    pub fn disk(mut self, disk: u16) -> Self {
        self.disk = disk;
        self
    }

    /// Extra field written into every local header
    pub fn local_extra(mut self, extra: &[u8]) -> Self {
        self.local_extra = extra.to_vec();
        self
    }

    pub fn build(&self) -> Layout {
        let mut out = Vec::new();
        let mut layout = Layout::default();
        let mut header_offsets = Vec::new();

        for file in &self.files {
            let header_offset = out.len();
            header_offsets.push(header_offset);
            if file.directory_only {
                continue;
            }
            out.extend_from_slice(&0x04034b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
            out.extend_from_slice(&file.method.to_le_bytes());
            out.extend_from_slice(&0x6000u16.to_le_bytes()); // time
            out.extend_from_slice(&0x5821u16.to_le_bytes()); // date
            out.extend_from_slice(&crc32fast::hash(&file.content).to_le_bytes());
            out.extend_from_slice(&(file.stored.len() as u32).to_le_bytes());
            out.extend_from_slice(&(file.content.len() as u32).to_le_bytes());
            out.extend_from_slice(&(file.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(self.local_extra.len() as u16).to_le_bytes());
            out.extend_from_slice(file.name.as_bytes());
            out.extend_from_slice(&self.local_extra);
            let data_offset = out.len();
            out.extend_from_slice(&file.stored);
            layout.files.push((header_offset, data_offset));
        }

        layout.directory_offset = out.len();
        for (file, header_offset) in self.files.iter().zip(header_offsets) {
            layout.records.push(out.len());
            out.extend_from_slice(&0x02014b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes()); // made by
            out.extend_from_slice(&20u16.to_le_bytes()); // needed
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&file.method.to_le_bytes());
            out.extend_from_slice(&0x6000u16.to_le_bytes());
            out.extend_from_slice(&0x5821u16.to_le_bytes());
            out.extend_from_slice(&crc32fast::hash(&file.content).to_le_bytes());
            out.extend_from_slice(&(file.stored.len() as u32).to_le_bytes());
            out.extend_from_slice(&(file.content.len() as u32).to_le_bytes());
            out.extend_from_slice(&(file.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra
            out.extend_from_slice(&0u16.to_le_bytes()); // comment
            out.extend_from_slice(&0u16.to_le_bytes()); // disk start
            out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            out.extend_from_slice(&(header_offset as u32).to_le_bytes());
            out.extend_from_slice(file.name.as_bytes());
        }
        layout.directory_size = out.len() - layout.directory_offset;

        layout.trailer_offset = out.len();
        let count = self.files.len() as u16;
        out.extend_from_slice(&0x06054b50u32.to_le_bytes());
        out.extend_from_slice(&self.disk.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(layout.directory_size as u32).to_le_bytes());
        out.extend_from_slice(&(layout.directory_offset as u32).to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);

        layout.bytes = out;
        layout
    }

    pub fn write(&self) -> NamedTempFile {
        self.build().write()
    }
}

/// Comment region holding an extended header and whatever follows it
pub fn extended_comment(encryption: u16, signing: u16, rest: &[u8]) -> Vec<u8> {
    let mut out = 8u32.to_le_bytes().to_vec();
    out.extend_from_slice(&encryption.to_le_bytes());
    out.extend_from_slice(&signing.to_le_bytes());
    out.extend_from_slice(rest);
    out
}

/// A well-formed signature header
pub fn signature_header() -> Vec<u8> {
    let mut out = 260u32.to_le_bytes().to_vec();
    out.extend_from_slice(&[0xA5u8; 256]);
    out
}

/// A well-formed key-table encryption header
pub fn encryption_header() -> Vec<u8> {
    let mut out = 276u32.to_le_bytes().to_vec();
    out.extend_from_slice(&[0u8; 272]);
    out
}

/// Offsets of fields inside the fixed part of a directory record
pub mod record_field {
    pub const VERSION_NEEDED: usize = 6;
    pub const METHOD: usize = 10;
    pub const CRC32: usize = 16;
    pub const COMPRESSED_SIZE: usize = 20;
    pub const UNCOMPRESSED_SIZE: usize = 24;
    pub const NAME_LENGTH: usize = 28;
    pub const COMMENT_LENGTH: usize = 32;
    pub const LOCAL_HEADER_OFFSET: usize = 42;
}

/// Offsets of fields inside the trailer
pub mod trailer_field {
    pub const DISK: usize = 4;
    pub const ENTRIES_ON_DISK: usize = 8;
    pub const DIRECTORY_SIZE: usize = 12;
    pub const DIRECTORY_OFFSET: usize = 16;
}
