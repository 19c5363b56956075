use crate::error::{Result, ZipDirError};

/// Largest archive that can be indexed (2 GiB)
pub const MAX_ARCHIVE_SIZE: u64 = 1 << 31;

/// Largest possible trailer comment
pub const MAX_COMMENT_LENGTH: u64 = 0xFFFF;

/// Highest "version needed to extract" (low byte) this reader understands
pub const MAX_VERSION_NEEDED: u16 = 20;

/// Bits of the trailer's disk field that carry the legacy encryption technique
pub const LEGACY_ENCRYPTION_MASK: u16 = 0xC000;
pub const LEGACY_ENCRYPTION_SHIFT: u16 = 14;

/// Path separator used in normalized names
pub const SEPARATOR: u8 = b'/';

/// Separator accepted in stored names and rewritten to [`SEPARATOR`]
pub const ALT_SEPARATOR: u8 = b'\\';

/// Extra-field block id carrying NTFS timestamps
pub const EXTRA_NTFS: u16 = 0x000a;

/// Compression methods found in pak archives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    Store,
    Deflate,
    StoreAndStreamCipherKeyTable,
    DeflateAndStreamCipherKeyTable,
    Zstd,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Store,
            8 => Self::Deflate,
            13 => Self::StoreAndStreamCipherKeyTable,
            14 => Self::DeflateAndStreamCipherKeyTable,
            93 => Self::Zstd,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::Store => 0,
            Self::Deflate => 8,
            Self::StoreAndStreamCipherKeyTable => 13,
            Self::DeflateAndStreamCipherKeyTable => 14,
            Self::Zstd => 93,
            Self::Unknown(other) => other,
        }
    }

    /// Whether the payload is stored without compression, so both sizes must agree
    pub fn is_stored(self) -> bool {
        matches!(self, Self::Store | Self::StoreAndStreamCipherKeyTable)
    }

    /// Whether the payload is additionally enciphered with the archive key table
    pub fn is_enciphered(self) -> bool {
        matches!(
            self,
            Self::StoreAndStreamCipherKeyTable | Self::DeflateAndStreamCipherKeyTable
        )
    }
}

/// Technique used to encrypt the archive headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionKind {
    #[default]
    None,
    /// Legacy stream cipher, declared only in the trailer's disk field
    StreamCipher,
    /// Legacy TEA, declared only in the trailer's disk field
    Tea,
    /// Stream cipher with a key table, declared in the extended header
    StreamCipherKeyTable,
}

impl EncryptionKind {
    /// Decode the legacy encoding stored in the top two bits of the disk field.
    /// Only the two legacy techniques are recognised there.
    pub fn from_legacy_disk(disk: u16) -> Self {
        match (disk & LEGACY_ENCRYPTION_MASK) >> LEGACY_ENCRYPTION_SHIFT {
            1 => Self::StreamCipher,
            2 => Self::Tea,
            _ => Self::None,
        }
    }

    /// Decode the value carried by the extended header
    pub fn from_extended(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            3 => Ok(Self::StreamCipherKeyTable),
            other => Err(ZipDirError::UnsupportedEncryption(other)),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::None => 0,
            Self::StreamCipher => 1,
            Self::Tea => 2,
            Self::StreamCipherKeyTable => 3,
        }
    }

    pub fn is_encrypted(self) -> bool {
        self != Self::None
    }
}

/// Technique used to sign the archive directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningKind {
    #[default]
    None,
    DirectorySigned,
}

impl SigningKind {
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::DirectorySigned),
            other => Err(ZipDirError::UnsupportedSigning(other)),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::None => 0,
            Self::DirectorySigned => 1,
        }
    }
}

/// Size and checksum triple shared by directory records and local headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub const SIZE: usize = 12;

    pub(crate) fn parse(data: &[u8]) -> Self {
        Self {
            crc32: le_u32(&data[0..4]),
            compressed_size: le_u32(&data[4..8]),
            uncompressed_size: le_u32(&data[8..12]),
        }
    }

    pub(crate) fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.crc32.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
    }
}

// Fixed-width little-endian field decoders
#[inline(always)]
pub(crate) fn le_u64(d: &[u8]) -> u64 {
    u64::from_le_bytes([d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]])
}

#[inline(always)]
pub(crate) fn le_u32(d: &[u8]) -> u32 {
    u32::from_le_bytes([d[0], d[1], d[2], d[3]])
}

#[inline(always)]
pub(crate) fn le_u16(d: &[u8]) -> u16 {
    u16::from_le_bytes([d[0], d[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_codes() {
        for code in [0u16, 8, 13, 14, 93, 12, 99] {
            assert_eq!(CompressionMethod::from_u16(code).as_u16(), code);
        }
        assert!(CompressionMethod::Store.is_stored());
        assert!(CompressionMethod::StoreAndStreamCipherKeyTable.is_stored());
        assert!(!CompressionMethod::Deflate.is_stored());
        assert_eq!(CompressionMethod::from_u16(12), CompressionMethod::Unknown(12));
    }

    #[test]
    fn test_legacy_encryption_bits() {
        assert_eq!(EncryptionKind::from_legacy_disk(0), EncryptionKind::None);
        assert_eq!(
            EncryptionKind::from_legacy_disk(0x4000),
            EncryptionKind::StreamCipher
        );
        assert_eq!(EncryptionKind::from_legacy_disk(0x8000), EncryptionKind::Tea);
        // The key-table technique cannot be declared through the legacy bits
        assert_eq!(EncryptionKind::from_legacy_disk(0xC000), EncryptionKind::None);
    }

    #[test]
    fn test_extended_encryption_values() {
        assert_eq!(
            EncryptionKind::from_extended(3).unwrap(),
            EncryptionKind::StreamCipherKeyTable
        );
        assert!(matches!(
            EncryptionKind::from_extended(1),
            Err(ZipDirError::UnsupportedEncryption(1))
        ));
        assert!(matches!(
            SigningKind::from_u16(7),
            Err(ZipDirError::UnsupportedSigning(7))
        ));
    }

    #[test]
    fn test_little_endian_decoding() {
        let bytes = [0x50, 0x4b, 0x05, 0x06, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(le_u32(&bytes), 0x06054b50);
        assert_eq!(le_u16(&bytes[4..]), 0x0201);
        assert_eq!(le_u64(&bytes), 0x0403_0201_0605_4b50);
    }
}
