pub mod cursor;
pub mod directory;
pub mod end_record;
pub mod extended_header;
pub mod format;
pub mod local_entry;
pub mod validate;

pub use cursor::ByteCursor;
pub use directory::{DirectoryRecord, DIRECTORY_RECORD_SIGNATURE, DIRECTORY_RECORD_SIZE};
pub use end_record::{EndRecord, LocatedEndRecord, END_RECORD_SIGNATURE, END_RECORD_SIZE};
pub use extended_header::{
    ArchiveHeaders, EncryptionHeader, ExtendedHeader, SignatureHeader, ENCRYPTION_HEADER_SIZE,
    EXTENDED_HEADER_SIZE, SIGNATURE_HEADER_SIZE,
};
pub use format::{
    CompressionMethod, DataDescriptor, EncryptionKind, SigningKind, MAX_ARCHIVE_SIZE,
    MAX_COMMENT_LENGTH,
};
pub use local_entry::{
    EntryResolver, FileEntry, LocalEntryHeader, LOCAL_ENTRY_SIGNATURE, LOCAL_ENTRY_SIZE,
};
pub use validate::{Codec, CodecError, StandardCodec};
