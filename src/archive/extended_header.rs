use crate::archive::cursor::ByteCursor;
use crate::archive::end_record::{LocatedEndRecord, END_RECORD_SIZE};
use crate::archive::format::{le_u16, le_u32, EncryptionKind, SigningKind};
use crate::error::{Result, ZipDirError};
use std::io::{Read, Seek};
use tracing::debug;

/// Extended header size in bytes (fixed)
pub const EXTENDED_HEADER_SIZE: usize = 8;

/// Signature header size in bytes (fixed)
pub const SIGNATURE_HEADER_SIZE: usize = 4 + 256;

/// Encryption header size in bytes (fixed)
pub const ENCRYPTION_HEADER_SIZE: usize = 4 + 16 + 16 * 16;

/// Extended header stored at the start of the trailer comment.
///
/// Structure (8 bytes fixed):
/// - Header Size: uint32 (must be 8)
/// - Encryption: uint16
/// - Signing: uint16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub encryption: u16,
    pub signing: u16,
}

impl ExtendedHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let declared = le_u32(&data[0..4]);
        if declared as usize != EXTENDED_HEADER_SIZE {
            return Err(ZipDirError::CorruptExtendedHeader(format!(
                "extended header declares {} bytes, expected {}",
                declared, EXTENDED_HEADER_SIZE
            )));
        }
        Ok(Self {
            encryption: le_u16(&data[4..6]),
            signing: le_u16(&data[6..8]),
        })
    }

    pub fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(EXTENDED_HEADER_SIZE as u32).to_le_bytes());
        out.extend_from_slice(&self.encryption.to_le_bytes());
        out.extend_from_slice(&self.signing.to_le_bytes());
    }
}

/// Directory signature header, follows the extended header when signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub signature: [u8; 256],
}

impl SignatureHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let declared = le_u32(&data[0..4]);
        if declared as usize != SIGNATURE_HEADER_SIZE {
            return Err(ZipDirError::CorruptExtendedHeader(format!(
                "signature header declares {} bytes, expected {}",
                declared, SIGNATURE_HEADER_SIZE
            )));
        }
        let mut signature = [0u8; 256];
        signature.copy_from_slice(&data[4..SIGNATURE_HEADER_SIZE]);
        Ok(Self { signature })
    }
}

/// Key-table encryption header, follows the signature header (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    pub iv: [u8; 16],
    pub key_table: [[u8; 16]; 16],
}

impl EncryptionHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let declared = le_u32(&data[0..4]);
        if declared as usize != ENCRYPTION_HEADER_SIZE {
            return Err(ZipDirError::CorruptExtendedHeader(format!(
                "encryption header declares {} bytes, expected {}",
                declared, ENCRYPTION_HEADER_SIZE
            )));
        }
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&data[4..20]);
        let mut key_table = [[0u8; 16]; 16];
        for (i, key) in key_table.iter_mut().enumerate() {
            let start = 20 + i * 16;
            key.copy_from_slice(&data[start..start + 16]);
        }
        Ok(Self { iv, key_table })
    }
}

/// Decoded archive-level metadata that lives in and around the trailer
#[derive(Debug, Clone, Default)]
pub struct ArchiveHeaders {
    pub encryption: EncryptionKind,
    pub signing: SigningKind,
    pub extended: Option<ExtendedHeader>,
    pub signature: Option<SignatureHeader>,
    pub encryption_header: Option<EncryptionHeader>,
    /// Raw comment bytes, carried over verbatim when the trailer is rewritten
    pub comment: Vec<u8>,
}

impl ArchiveHeaders {
    /// Forget the directory signature, keeping the extended header and any
    /// encryption header in the comment. A rewritten directory no longer
    /// matches the signature it was read with.
    pub fn drop_signature(&mut self) {
        if self.signing != SigningKind::DirectorySigned {
            return;
        }
        let Some(extended) = self.extended.as_mut() else {
            return;
        };
        extended.signing = SigningKind::None.as_u16();

        let rest = self
            .comment
            .get(EXTENDED_HEADER_SIZE + SIGNATURE_HEADER_SIZE..)
            .unwrap_or_default();
        let mut comment = Vec::with_capacity(EXTENDED_HEADER_SIZE + rest.len());
        extended.write_into(&mut comment);
        comment.extend_from_slice(rest);

        self.comment = comment;
        self.signing = SigningKind::None;
        self.signature = None;
    }
}

/// Decode the encryption and signing techniques of a located trailer and
/// check the trailer's own consistency.
///
/// Order matters: the legacy encryption bits are stripped from the disk field
/// before the single-volume check, and the directory range is checked last.
pub fn decode<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    located: &mut LocatedEndRecord,
) -> Result<ArchiveHeaders> {
    let record = &mut located.record;
    let mut headers = ArchiveHeaders {
        encryption: EncryptionKind::from_legacy_disk(record.disk),
        ..Default::default()
    };
    record.disk &= !crate::archive::format::LEGACY_ENCRYPTION_MASK;

    let comment_start = located.offset + END_RECORD_SIZE as u64;
    headers.comment = cursor.read_at(comment_start, record.comment_length as usize)?;

    if headers.comment.len() >= EXTENDED_HEADER_SIZE {
        let extended = ExtendedHeader::parse(&headers.comment)?;

        if extended.encryption != 0 && headers.encryption.is_encrypted() {
            return Err(ZipDirError::AmbiguousEncryptionEncoding);
        }
        // A present extended header decides the technique, "none" included
        headers.encryption = EncryptionKind::from_extended(extended.encryption)?;

        let mut expected = EXTENDED_HEADER_SIZE;
        if headers.encryption.is_encrypted() {
            expected += ENCRYPTION_HEADER_SIZE;
        }

        headers.signing = SigningKind::from_u16(extended.signing)?;
        if headers.signing == SigningKind::DirectorySigned {
            expected += SIGNATURE_HEADER_SIZE;
        }

        if headers.comment.len() != expected {
            return Err(ZipDirError::CommentLengthMismatch {
                declared: record.comment_length,
                expected: expected as u64,
            });
        }

        let mut pos = EXTENDED_HEADER_SIZE;
        if headers.signing == SigningKind::DirectorySigned {
            headers.signature = Some(SignatureHeader::parse(&headers.comment[pos..])?);
            pos += SIGNATURE_HEADER_SIZE;
        }
        if headers.encryption == EncryptionKind::StreamCipherKeyTable {
            headers.encryption_header = Some(EncryptionHeader::parse(&headers.comment[pos..])?);
        }
        headers.extended = Some(extended);
    }

    if record.disk != 0
        || record.directory_start_disk != 0
        || record.entries_on_disk != record.entries_total
    {
        return Err(ZipDirError::UnsupportedMultivolume);
    }

    if record.directory_end() > located.offset {
        return Err(ZipDirError::DirectoryOutOfRange {
            offset: record.directory_offset,
            size: record.directory_size,
            trailer_offset: located.offset,
        });
    }

    debug!(
        encryption = ?headers.encryption,
        signing = ?headers.signing,
        extended = headers.extended.is_some(),
        "Decoded archive headers"
    );
    Ok(headers)
}
