use crate::archive::cursor::ByteCursor;
use crate::archive::directory;
use crate::archive::end_record::{self, EndRecord};
use crate::archive::extended_header::{self, ArchiveHeaders};
use crate::archive::format::{EncryptionKind, SigningKind, LEGACY_ENCRYPTION_SHIFT};
use crate::archive::local_entry::{EntryResolver, FileEntry};
use crate::archive::validate::{self, Codec, StandardCodec};
use crate::config::{IndexOptions, InitMethod};
use crate::error::{Result, ZipDirError};
use crate::tree::{DirView, DirectoryTree, NameArena};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// State flags of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexFlags {
    /// The file was opened for reading only
    pub read_only: bool,
    /// The on-disk directory no longer matches the index
    pub dirty: bool,
    /// Appends must reuse the existing layout rather than compact it
    pub dont_compact: bool,
}

/// Queryable index over one archive, owning its file handle
pub struct Index<R = File> {
    cursor: ByteCursor<R>,
    tree: DirectoryTree,
    headers: ArchiveHeaders,
    directory_offset: u32,
    directory_size: u32,
    flags: IndexFlags,
    path: Option<PathBuf>,
    codec: Box<dyn Codec + Send + Sync>,
}

impl<R> fmt::Debug for Index<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("entries", &self.tree.len())
            .field("directory_offset", &self.directory_offset)
            .field("directory_size", &self.directory_size)
            .field("encryption", &self.headers.encryption)
            .field("signing", &self.headers.signing)
            .field("flags", &self.flags)
            .field("path", &self.path)
            .finish()
    }
}

impl<R: Read + Seek> Index<R> {
    /// Number of file entries
    pub fn entry_count(&self) -> usize {
        self.tree.len()
    }

    /// Check if a file exists in the archive
    pub fn contains(&self, path: &str) -> bool {
        self.tree.find(path).is_some()
    }

    /// Get entry information without reading data
    pub fn find(&self, path: &str) -> Option<&FileEntry> {
        self.tree.find(path)
    }

    /// List a directory; the empty path is the archive root
    pub fn find_dir(&self, path: &str) -> Option<DirView<'_>> {
        self.tree.find_dir(path)
    }

    /// All entries with their normalized paths
    pub fn entries(&self) -> Vec<(String, &FileEntry)> {
        self.tree
            .entries()
            .into_iter()
            .map(|e| (self.tree.path_of(e), e))
            .collect()
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    pub fn headers(&self) -> &ArchiveHeaders {
        &self.headers
    }

    pub fn encryption(&self) -> EncryptionKind {
        self.headers.encryption
    }

    pub fn signing(&self) -> SigningKind {
        self.headers.signing
    }

    pub fn directory_offset(&self) -> u32 {
        self.directory_offset
    }

    pub fn directory_size(&self) -> u32 {
        self.directory_size
    }

    pub fn flags(&self) -> IndexFlags {
        self.flags
    }

    /// Path the archive was opened from, when memorized
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Request that the directory be rewritten on the next flush
    pub fn mark_dirty(&mut self) -> Result<()> {
        if self.flags.read_only {
            return Err(ZipDirError::ReadOnly);
        }
        self.flags.dirty = true;
        Ok(())
    }

    fn resolver(&self) -> EntryResolver {
        EntryResolver::new(self.headers.encryption, self.directory_offset)
    }

    /// Look up an entry, resolving its data offset on first use
    pub fn resolve(&mut self, path: &str) -> Result<&FileEntry> {
        let resolver = self.resolver();
        let (name, entry) = self
            .tree
            .find_named_mut(path)
            .ok_or_else(|| ZipDirError::FileNotFound(path.to_string()))?;
        if entry.data_offset.is_none() {
            entry.data_offset = Some(resolver.resolve(&mut self.cursor, entry, name)?);
        }
        Ok(entry)
    }

    /// Read an entry's stored (possibly compressed) bytes
    pub fn read_compressed(&mut self, path: &str) -> Result<Vec<u8>> {
        let entry = self.resolve(path)?.clone();
        let data_offset = entry.data_offset.unwrap_or_default() as u64;
        self.cursor
            .read_at(data_offset, entry.compressed_size() as usize)
    }

    /// Read and decompress an entry, verifying its size and CRC32
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let entry = self.resolve(path)?.clone();
        let stored = self.read_compressed(path)?;
        validate::decode_payload(self.codec.as_ref(), &entry, stored)
    }

    /// Resolve and validate every entry
    pub fn validate_all(&mut self) -> Result<()> {
        let resolver = self.resolver();
        let (names, entries) = self.tree.entries_named_mut();
        for entry in entries {
            let name = names.get(entry.name);
            if entry.data_offset.is_none() {
                entry.data_offset = Some(resolver.resolve(&mut self.cursor, entry, name)?);
            }
            validate::validate(&mut self.cursor, entry, self.codec.as_ref())?;
        }
        Ok(())
    }
}

impl Index<File> {
    /// Write the directory and trailer if the index is dirty.
    ///
    /// The directory is written at the current directory offset, followed by
    /// a trailer carrying the original extension headers, and the file is
    /// truncated after it. A directory signature is dropped, since it cannot
    /// cover the rewritten directory.
    pub fn flush(&mut self) -> Result<()> {
        if self.flags.read_only {
            return Err(ZipDirError::ReadOnly);
        }
        if !self.flags.dirty {
            return Ok(());
        }
        if self.headers.signing == SigningKind::DirectorySigned {
            warn!(path = ?self.path, "Dropping directory signature from rewritten directory");
            self.headers.drop_signature();
        }

        let mut entries = self.tree.entries();
        entries.sort_by_key(|e| e.header_offset);

        let mut out = Vec::new();
        for entry in &entries {
            entry.to_record().write_into(self.tree.name_of(entry), &mut out);
        }
        let directory_size = out.len() as u32;

        let count = u16::try_from(entries.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "too many entries for one trailer")
        })?;
        let comment_length = u16::try_from(self.headers.comment.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "trailer comment is too long")
        })?;
        let mut record = EndRecord::new(count, self.directory_offset, directory_size, comment_length);
        if self.headers.extended.is_none() {
            match self.headers.encryption {
                EncryptionKind::StreamCipher | EncryptionKind::Tea => {
                    record.disk = self.headers.encryption.as_u16() << LEGACY_ENCRYPTION_SHIFT;
                }
                _ => {}
            }
        }
        record.write_into(&mut out);
        out.extend_from_slice(&self.headers.comment);

        let end = self.directory_offset as u64 + out.len() as u64;
        self.cursor.write_at(self.directory_offset as u64, &out)?;
        self.cursor.get_ref().set_len(end)?;

        debug!(
            entries = entries.len(),
            directory_offset = self.directory_offset,
            directory_size,
            "Flushed directory"
        );
        self.directory_size = directory_size;
        self.flags.dirty = false;
        Ok(())
    }
}

impl<R> Drop for Index<R> {
    fn drop(&mut self) {
        if self.flags.dirty && !self.flags.read_only {
            warn!(path = ?self.path, "Archive index dropped with an unwritten directory");
        }
    }
}

/// Builds an [`Index`] from an archive in one pass
pub struct IndexBuilder {
    options: IndexOptions,
    codec: Box<dyn Codec + Send + Sync>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(IndexOptions::default())
    }
}

impl IndexBuilder {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            codec: Box::new(StandardCodec),
        }
    }

    /// Use a different codec for validation and reads
    pub fn with_codec<C: Codec + Send + Sync + 'static>(mut self, codec: C) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Open the archive at `path` according to the options.
    ///
    /// Read-write opens of a missing or empty file, and any `create_new`
    /// open, start an empty archive that is dirty until flushed.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Index<File>> {
        let path = path.as_ref();
        let memorize = self.options.memorize_path;

        let existing = if self.options.read_only {
            Some(File::open(path)?)
        } else if self.options.create_new {
            None
        } else {
            match fs::OpenOptions::new().read(true).write(true).open(path) {
                Ok(file) if file.metadata()?.len() > 0 => Some(file),
                Ok(_) => None,
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            }
        };

        let mut index = match existing {
            Some(file) => self.build(file)?,
            None => {
                let file = fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?;
                debug!(path = %path.display(), "Starting a new archive");
                self.create(file)
            }
        };

        if memorize {
            index.path = Some(path.to_path_buf());
        }
        Ok(index)
    }

    /// An empty archive whose directory will start at offset 0
    fn create<R: Read + Seek>(self, reader: R) -> Index<R> {
        Index {
            cursor: ByteCursor::new(reader),
            tree: DirectoryTree::default(),
            headers: ArchiveHeaders::default(),
            directory_offset: 0,
            directory_size: 0,
            flags: IndexFlags {
                read_only: false,
                dirty: true,
                dont_compact: self.options.dont_compact,
            },
            path: None,
            codec: self.codec,
        }
    }

    /// Build the index of an existing archive.
    ///
    /// Either every step succeeds and the handle moves into the returned
    /// index, or the handle is dropped with the error.
    pub fn build<R: Read + Seek>(self, reader: R) -> Result<Index<R>> {
        let mut cursor = ByteCursor::new(reader);

        let mut located = end_record::locate(&mut cursor)?;
        let headers = extended_header::decode(&mut cursor, &mut located)?;
        let record = located.record;

        let buffer = cursor.read_at(record.directory_offset as u64, record.directory_size as usize)?;
        let mut names = NameArena::with_capacity(buffer.len());
        let listing = directory::parse(&buffer, &mut names)?;
        drop(buffer);

        let seen = listing.records.len() + listing.markers;
        if seen != record.entries_total as usize {
            warn!(
                declared = record.entries_total,
                found = seen,
                "Trailer entry count disagrees with the directory"
            );
        }

        let init_method = self.options.init_method;
        let eager = headers.encryption.is_encrypted() || init_method >= InitMethod::Full;
        let resolver = EntryResolver::new(headers.encryption, record.directory_offset);
        let mut tree = DirectoryTree::new(names);

        for parsed in &listing.records {
            let mut entry = FileEntry::from_parsed(parsed);
            let name = tree.names().get(entry.name);
            resolver.check(&entry, name)?;

            if eager && entry.compressed_size() != 0 {
                entry.data_offset = Some(resolver.resolve(&mut cursor, &entry, name)?);
                if init_method == InitMethod::Validate {
                    validate::validate(&mut cursor, &entry, self.codec.as_ref())?;
                }
            }
            tree.insert(entry);
        }
        tree.refresh_slot_ends(record.directory_offset);

        debug!(
            entries = tree.len(),
            directory_offset = record.directory_offset,
            ?init_method,
            "Built archive index"
        );

        Ok(Index {
            cursor,
            tree,
            headers,
            directory_offset: record.directory_offset,
            directory_size: record.directory_size,
            flags: IndexFlags {
                read_only: self.options.read_only,
                dirty: false,
                dont_compact: self.options.dont_compact,
            },
            path: None,
            codec: self.codec,
        })
    }
}

/// Open an archive read-only with default options
pub fn open<P: AsRef<Path>>(path: P) -> Result<Index<File>> {
    IndexBuilder::default().open(path)
}
