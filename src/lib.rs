//! zipdir-rs: directory indexing and validation for pak-style zip archives
//!
//! This library turns the trailing directory of a zip archive into an
//! in-memory, case-insensitive index suitable for a read-only (or
//! append-capable) virtual filesystem layer:
//! - Backward search for the directory trailer
//! - Decoding of the extended encryption/signing headers kept in the trailer comment
//! - Directory walk with truncation and overlap checks
//! - Cross-validation of every record against its local header
//! - Optional decompression and CRC32 verification of every entry
//!
//! # Example
//!
//! ```no_run
//! use zipdir::{IndexBuilder, IndexOptions, InitMethod};
//!
//! let options = IndexOptions::new().init_method(InitMethod::Full);
//! let mut index = IndexBuilder::new(options).open("level.pak")?;
//!
//! if let Some(entry) = index.find("Textures\\Stone.dds") {
//!     println!("{} bytes", entry.uncompressed_size());
//! }
//! let data = index.read_file("scripts/main.lua")?;
//! # Ok::<(), zipdir::error::ZipDirError>(())
//! ```

// Core modules
pub mod archive;
pub mod config;
pub mod error;
pub mod index;
pub mod tree;

// Re-export commonly used types
pub use archive::{
    ArchiveHeaders, ByteCursor, Codec, CodecError, CompressionMethod, DataDescriptor,
    EncryptionKind, FileEntry, SigningKind, StandardCodec,
};
pub use config::{IndexOptions, InitMethod};
pub use error::{ErrorClass, Result, ZipDirError};
pub use index::{open, Index, IndexBuilder, IndexFlags};
pub use tree::{normalize_path, DirView, DirectoryTree};
