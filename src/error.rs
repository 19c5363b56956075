use std::io;
use thiserror::Error;

/// Result type for zip directory operations
pub type Result<T> = std::result::Result<T, ZipDirError>;

/// Broad category of a failure, used by callers that only need to decide
/// whether an archive is damaged, unreadable, or merely failed a diagnostic pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The trailer, extension headers or directory are malformed
    Structural,
    /// A directory record disagrees with its local header or with the layout
    CrossValidation,
    /// The file could not be read, or is outside the supported size range
    Resource,
    /// Decompression or checksum verification failed
    Diagnostic,
    /// The caller asked for something the index cannot do
    Usage,
}

/// Unified error type for all zip directory operations
#[derive(Debug, Error)]
pub enum ZipDirError {
    // Trailer search
    #[error("File is too small to hold a directory trailer ({size} bytes)")]
    FileTooSmall { size: u64 },

    #[error("File is too large to be opened as an archive ({size} bytes, limit is 2 GiB)")]
    FileTooLarge { size: u64 },

    #[error("No directory trailer found; this is not an archive or its directory is missing")]
    NoTrailerFound,

    #[error("Comment length mismatch: declared {declared}, expected {expected}")]
    CommentLengthMismatch { declared: u16, expected: u64 },

    // Extension headers
    #[error("Corrupt extended header: {0}")]
    CorruptExtendedHeader(String),

    #[error("Unsupported header encryption technique: {0}")]
    UnsupportedEncryption(u16),

    #[error("Unsupported header signing technique: {0}")]
    UnsupportedSigning(u16),

    #[error("Encryption technique declared in both the trailer and the extended header")]
    AmbiguousEncryptionEncoding,

    #[error("Directory range {offset}+{size} exceeds the trailer position {trailer_offset}")]
    DirectoryOutOfRange {
        offset: u32,
        size: u32,
        trailer_offset: u64,
    },

    #[error("Multivolume archives are not supported")]
    UnsupportedMultivolume,

    // Directory walk
    #[error("Directory is corrupt: {0}")]
    DirectoryCorrupt(String),

    #[error("Unsupported version needed to extract: {0}")]
    UnsupportedVersion(u16),

    // Entry resolution
    #[error("Entry {name} lies outside the archive data region ({offset} >= {limit})")]
    OffsetOutOfRange { name: String, offset: u64, limit: u32 },

    #[error("Local header validation failed for {name}: {reason}")]
    ValidationFailed { name: String, reason: String },

    #[error("Stored entry {name} declares compressed size {compressed} but uncompressed size {uncompressed}")]
    StoreSizeMismatch {
        name: String,
        compressed: u32,
        uncompressed: u32,
    },

    // Content validation
    #[error("Codec ran out of memory")]
    CodecOutOfMemory,

    #[error("Codec reported a corrupt stream: {0}")]
    CodecCorruptStream(String),

    #[error("Codec reported an unexpected error: {0}")]
    CodecUnknownError(String),

    #[error("Unsupported compression method: {0}")]
    UnsupportedMethod(u16),

    #[error("Decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("CRC mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    // Index usage
    #[error("File not found in archive: {0}")]
    FileNotFound(String),

    #[error("Archive was opened read-only")]
    ReadOnly,

    #[error("Data offset of the entry at header offset {header_offset} has not been resolved")]
    Unresolved { header_offset: u32 },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ZipDirError {
    /// Category of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            ZipDirError::NoTrailerFound
            | ZipDirError::CommentLengthMismatch { .. }
            | ZipDirError::CorruptExtendedHeader(_)
            | ZipDirError::UnsupportedEncryption(_)
            | ZipDirError::UnsupportedSigning(_)
            | ZipDirError::AmbiguousEncryptionEncoding
            | ZipDirError::DirectoryOutOfRange { .. }
            | ZipDirError::UnsupportedMultivolume
            | ZipDirError::DirectoryCorrupt(_)
            | ZipDirError::UnsupportedVersion(_) => ErrorClass::Structural,

            ZipDirError::OffsetOutOfRange { .. }
            | ZipDirError::ValidationFailed { .. }
            | ZipDirError::StoreSizeMismatch { .. } => ErrorClass::CrossValidation,

            ZipDirError::FileTooSmall { .. }
            | ZipDirError::FileTooLarge { .. }
            | ZipDirError::Io(_) => ErrorClass::Resource,

            ZipDirError::CodecOutOfMemory
            | ZipDirError::CodecCorruptStream(_)
            | ZipDirError::CodecUnknownError(_)
            | ZipDirError::UnsupportedMethod(_)
            | ZipDirError::SizeMismatch { .. }
            | ZipDirError::ChecksumMismatch { .. } => ErrorClass::Diagnostic,

            ZipDirError::FileNotFound(_)
            | ZipDirError::ReadOnly
            | ZipDirError::Unresolved { .. }
            | ZipDirError::Config(_) => ErrorClass::Usage,
        }
    }
}

impl From<toml::de::Error> for ZipDirError {
    fn from(err: toml::de::Error) -> Self {
        ZipDirError::Config(err.to_string())
    }
}
