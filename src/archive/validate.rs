use crate::archive::cursor::ByteCursor;
use crate::archive::format::CompressionMethod;
use crate::archive::local_entry::FileEntry;
use crate::error::{Result, ZipDirError};
use flate2::read::DeflateDecoder;
use std::io::{self, Read, Seek};

/// Failure reported by a [`Codec`]
#[derive(Debug)]
pub enum CodecError {
    OutOfMemory,
    CorruptStream(String),
    Unknown(String),
    UnsupportedMethod(u16),
}

impl From<CodecError> for ZipDirError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::OutOfMemory => ZipDirError::CodecOutOfMemory,
            CodecError::CorruptStream(msg) => ZipDirError::CodecCorruptStream(msg),
            CodecError::Unknown(msg) => ZipDirError::CodecUnknownError(msg),
            CodecError::UnsupportedMethod(method) => ZipDirError::UnsupportedMethod(method),
        }
    }
}

/// Stream decoder for compressed entry payloads
pub trait Codec {
    /// Decode `compressed`, producing at most `expected_len + 1` bytes so an
    /// overlong stream is detectable without decoding all of it.
    fn decode(
        &self,
        method: CompressionMethod,
        compressed: &[u8],
        expected_len: usize,
    ) -> std::result::Result<Vec<u8>, CodecError>;
}

/// Raw deflate and zstd decoding
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

impl Codec for StandardCodec {
    fn decode(
        &self,
        method: CompressionMethod,
        compressed: &[u8],
        expected_len: usize,
    ) -> std::result::Result<Vec<u8>, CodecError> {
        let limit = expected_len as u64 + 1;
        // The declared size is untrusted; grow past this as needed
        let mut output = Vec::with_capacity(expected_len.min(compressed.len().saturating_mul(8)));
        let read = match method {
            CompressionMethod::Deflate => DeflateDecoder::new(compressed)
                .take(limit)
                .read_to_end(&mut output),
            CompressionMethod::Zstd => zstd::stream::read::Decoder::new(compressed)
                .and_then(|decoder| decoder.take(limit).read_to_end(&mut output)),
            other => return Err(CodecError::UnsupportedMethod(other.as_u16())),
        };
        read.map_err(map_io_error)?;
        Ok(output)
    }
}

fn map_io_error(err: io::Error) -> CodecError {
    match err.kind() {
        io::ErrorKind::OutOfMemory => CodecError::OutOfMemory,
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            CodecError::CorruptStream(err.to_string())
        }
        _ => CodecError::Unknown(err.to_string()),
    }
}

/// Turn an entry's stored bytes into its content, checking size and CRC32
pub fn decode_payload(codec: &dyn Codec, entry: &FileEntry, stored: Vec<u8>) -> Result<Vec<u8>> {
    let expected = entry.uncompressed_size() as usize;
    let content = if entry.method == CompressionMethod::Store {
        stored
    } else {
        codec.decode(entry.method, &stored, expected)?
    };

    if content.len() != expected {
        return Err(ZipDirError::SizeMismatch {
            expected: expected as u64,
            actual: content.len() as u64,
        });
    }

    let actual = crc32fast::hash(&content);
    if actual != entry.crc32() {
        return Err(ZipDirError::ChecksumMismatch {
            expected: entry.crc32(),
            actual,
        });
    }
    Ok(content)
}

/// Read a resolved entry's data, decode it and verify it
pub fn validate<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    entry: &FileEntry,
    codec: &dyn Codec,
) -> Result<()> {
    let data_offset = entry.data_offset.ok_or(ZipDirError::Unresolved {
        header_offset: entry.header_offset,
    })?;
    let stored = cursor.read_at(data_offset as u64, entry.compressed_size() as usize)?;
    decode_payload(codec, entry, stored)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::format::DataDescriptor;
    use crate::error::ErrorClass;
    use crate::tree::NameSpan;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    const CONTENT: &[u8] = b"the quick brown fox jumps over the lazy dog, again and again and again";

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn entry(method: CompressionMethod, stored: &[u8], content: &[u8]) -> FileEntry {
        FileEntry {
            name: NameSpan::default(),
            method,
            descriptor: DataDescriptor {
                crc32: crc32fast::hash(content),
                compressed_size: stored.len() as u32,
                uncompressed_size: content.len() as u32,
            },
            header_offset: 0,
            data_offset: Some(0),
            slot_end: 0,
            version_needed: 20,
            flags: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            external_attributes: 0,
            ntfs_mtime: None,
        }
    }

    #[test]
    fn test_deflate_validates() {
        let stored = deflate(CONTENT);
        let entry = entry(CompressionMethod::Deflate, &stored, CONTENT);
        let mut cursor = ByteCursor::new(Cursor::new(stored));
        validate(&mut cursor, &entry, &StandardCodec).unwrap();
    }

    #[test]
    fn test_zstd_validates() {
        let stored = zstd::encode_all(CONTENT, 3).unwrap();
        let entry = entry(CompressionMethod::Zstd, &stored, CONTENT);
        let content = decode_payload(&StandardCodec, &entry, stored).unwrap();
        assert_eq!(content, CONTENT);
    }

    #[test]
    fn test_flipped_byte_never_passes() {
        let stored = deflate(CONTENT);
        let entry = entry(CompressionMethod::Deflate, &stored, CONTENT);
        for i in 0..stored.len() {
            let mut corrupt = stored.clone();
            corrupt[i] ^= 0x01;
            let err = decode_payload(&StandardCodec, &entry, corrupt)
                .expect_err(&format!("byte {} flipped but validation passed", i));
            assert_eq!(err.class(), ErrorClass::Diagnostic, "{:?}", err);
        }
    }

    #[test]
    fn test_stored_checksum_mismatch() {
        let entry = entry(CompressionMethod::Store, CONTENT, CONTENT);
        let mut corrupt = CONTENT.to_vec();
        corrupt[3] = b'X';
        let result = decode_payload(&StandardCodec, &entry, corrupt);
        assert!(matches!(result, Err(ZipDirError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_declared_size_too_small() {
        let stored = deflate(CONTENT);
        let mut entry = entry(CompressionMethod::Deflate, &stored, CONTENT);
        entry.descriptor.uncompressed_size -= 5;
        let result = decode_payload(&StandardCodec, &entry, stored);
        assert!(matches!(
            result,
            Err(ZipDirError::SizeMismatch { expected, actual }) if actual == expected + 1
        ));
    }

    #[test]
    fn test_unresolved_entry_is_a_usage_error() {
        let stored = deflate(CONTENT);
        let mut entry = entry(CompressionMethod::Deflate, &stored, CONTENT);
        entry.data_offset = None;
        entry.header_offset = 64;
        let mut cursor = ByteCursor::new(Cursor::new(stored));
        let err = validate(&mut cursor, &entry, &StandardCodec).unwrap_err();
        assert!(matches!(err, ZipDirError::Unresolved { header_offset: 64 }));
        assert_eq!(err.class(), ErrorClass::Usage);
    }

    #[test]
    fn test_unknown_method() {
        let entry = entry(CompressionMethod::Unknown(12), CONTENT, CONTENT);
        let result = decode_payload(&StandardCodec, &entry, CONTENT.to_vec());
        assert!(matches!(result, Err(ZipDirError::UnsupportedMethod(12))));
    }
}
