//! Case-insensitive directory tree over resolved entries.
//!
//! Normalized names live in one [`NameArena`] owned by the tree; nodes and
//! entries refer to them through [`NameSpan`]s instead of owning strings.

use crate::archive::format::{ALT_SEPARATOR, SEPARATOR};
use crate::archive::FileEntry;

/// Normalize one name byte: ASCII lower case, and `\` becomes `/`.
///
/// Only the ASCII range is folded, so the result never depends on locale.
#[inline]
pub fn normalize_byte(b: u8) -> u8 {
    if b == ALT_SEPARATOR {
        SEPARATOR
    } else {
        b.to_ascii_lowercase()
    }
}

/// Normalize a path for lookup
pub fn normalize_path(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '\\' => '/',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Compare two stored names under normalization
pub fn names_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| normalize_byte(*x) == normalize_byte(*y))
}

fn is_separator(b: u8) -> bool {
    b == SEPARATOR || b == ALT_SEPARATOR
}

/// Location of a name inside a [`NameArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NameSpan {
    start: u32,
    len: u32,
}

impl NameSpan {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Growable byte arena holding normalized names back to back
#[derive(Debug, Clone, Default)]
pub struct NameArena {
    bytes: Vec<u8>,
}

impl NameArena {
    /// Arena sized for the directory it will be filled from, so the walk
    /// normally needs a single allocation.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Append the normalized form of `raw`
    pub fn push_normalized(&mut self, raw: &[u8]) -> NameSpan {
        let start = self.bytes.len() as u32;
        self.bytes.extend(raw.iter().map(|b| normalize_byte(*b)));
        NameSpan {
            start,
            len: raw.len() as u32,
        }
    }

    pub fn get(&self, span: NameSpan) -> &[u8] {
        let start = span.start as usize;
        &self.bytes[start..start + span.len as usize]
    }

    /// Non-empty path segments of `span`, as sub-spans
    fn segments(&self, span: NameSpan) -> Vec<NameSpan> {
        let mut out = Vec::new();
        let mut seg_start = 0u32;
        for (i, b) in self.get(span).iter().enumerate() {
            let i = i as u32;
            if is_separator(*b) {
                if i > seg_start {
                    out.push(NameSpan {
                        start: span.start + seg_start,
                        len: i - seg_start,
                    });
                }
                seg_start = i + 1;
            }
        }
        if span.len > seg_start {
            out.push(NameSpan {
                start: span.start + seg_start,
                len: span.len - seg_start,
            });
        }
        out
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lookup key segments for a caller-supplied path
fn query_segments(path: &str) -> Vec<Vec<u8>> {
    path.as_bytes()
        .split(|b| is_separator(*b))
        .filter(|seg| !seg.is_empty())
        .map(|seg| seg.iter().map(|b| normalize_byte(*b)).collect())
        .collect()
}

#[derive(Debug, Clone, Default)]
struct DirNode {
    /// Sorted by name bytes
    dirs: Vec<(NameSpan, DirNode)>,
    /// Sorted by name bytes
    files: Vec<(NameSpan, FileEntry)>,
}

/// Hierarchical path index over [`FileEntry`] values
#[derive(Debug, Clone, Default)]
pub struct DirectoryTree {
    names: NameArena,
    root: DirNode,
    len: usize,
}

impl DirectoryTree {
    pub fn new(names: NameArena) -> Self {
        Self {
            names,
            root: DirNode::default(),
            len: 0,
        }
    }

    pub fn names(&self) -> &NameArena {
        &self.names
    }

    /// Normalized full path of an entry
    pub fn name_of(&self, entry: &FileEntry) -> &[u8] {
        self.names.get(entry.name)
    }

    /// Normalized full path of an entry, lossily decoded
    pub fn path_of(&self, entry: &FileEntry) -> String {
        String::from_utf8_lossy(self.name_of(entry)).into_owned()
    }

    /// Number of file entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `entry` at its path, creating intermediate directories.
    /// A file already stored under the same path is replaced and returned.
    pub fn insert(&mut self, entry: FileEntry) -> Option<FileEntry> {
        let Self { names, root, len } = self;
        let segments = names.segments(entry.name);
        let (leaf, parents) = segments.split_last()?;

        let mut node = root;
        for seg in parents {
            let key = names.get(*seg);
            let idx = match node.dirs.binary_search_by(|(s, _)| names.get(*s).cmp(key)) {
                Ok(idx) => idx,
                Err(idx) => {
                    node.dirs.insert(idx, (*seg, DirNode::default()));
                    idx
                }
            };
            node = &mut node.dirs[idx].1;
        }

        let key = names.get(*leaf);
        match node.files.binary_search_by(|(s, _)| names.get(*s).cmp(key)) {
            Ok(idx) => Some(std::mem::replace(&mut node.files[idx], (*leaf, entry)).1),
            Err(idx) => {
                node.files.insert(idx, (*leaf, entry));
                *len += 1;
                None
            }
        }
    }

    fn walk(&self, segments: &[Vec<u8>]) -> Option<&DirNode> {
        let mut node = &self.root;
        for seg in segments {
            let idx = node
                .dirs
                .binary_search_by(|(s, _)| self.names.get(*s).cmp(seg.as_slice()))
                .ok()?;
            node = &node.dirs[idx].1;
        }
        Some(node)
    }

    /// Find a file entry; case and separator style are ignored
    pub fn find(&self, path: &str) -> Option<&FileEntry> {
        let segments = query_segments(path);
        let (leaf, parents) = segments.split_last()?;
        let node = self.walk(parents)?;
        let idx = node
            .files
            .binary_search_by(|(s, _)| self.names.get(*s).cmp(leaf.as_slice()))
            .ok()?;
        Some(&node.files[idx].1)
    }

    /// Find a file entry for update, together with its normalized full path
    pub fn find_named_mut(&mut self, path: &str) -> Option<(&[u8], &mut FileEntry)> {
        let segments = query_segments(path);
        let (leaf, parents) = segments.split_last()?;
        let Self { names, root, .. } = self;

        let mut node = root;
        for seg in parents {
            let idx = node
                .dirs
                .binary_search_by(|(s, _)| names.get(*s).cmp(seg.as_slice()))
                .ok()?;
            node = &mut node.dirs[idx].1;
        }
        let idx = node
            .files
            .binary_search_by(|(s, _)| names.get(*s).cmp(leaf.as_slice()))
            .ok()?;
        let entry = &mut node.files[idx].1;
        Some((names.get(entry.name), entry))
    }

    /// Find a directory; the empty path is the root
    pub fn find_dir(&self, path: &str) -> Option<DirView<'_>> {
        let node = self.walk(&query_segments(path))?;
        Some(DirView { tree: self, node })
    }

    /// All entries, depth first: a directory's files before its subdirectories
    pub fn entries(&self) -> Vec<&FileEntry> {
        fn collect<'a>(node: &'a DirNode, out: &mut Vec<&'a FileEntry>) {
            out.extend(node.files.iter().map(|(_, e)| e));
            for (_, dir) in &node.dirs {
                collect(dir, out);
            }
        }
        let mut out = Vec::with_capacity(self.len);
        collect(&self.root, &mut out);
        out
    }

    /// Every entry for update, alongside the arena holding their names
    pub fn entries_named_mut(&mut self) -> (&NameArena, Vec<&mut FileEntry>) {
        fn collect<'a>(node: &'a mut DirNode, out: &mut Vec<&'a mut FileEntry>) {
            out.extend(node.files.iter_mut().map(|(_, e)| e));
            for (_, dir) in node.dirs.iter_mut() {
                collect(dir, out);
            }
        }
        let mut out = Vec::with_capacity(self.len);
        collect(&mut self.root, &mut out);
        (&self.names, out)
    }

    /// Set each entry's `slot_end` to the next local header in file order,
    /// or `directory_offset` for the last one.
    pub fn refresh_slot_ends(&mut self, directory_offset: u32) {
        let (_, mut entries) = self.entries_named_mut();
        entries.sort_by_key(|e| e.header_offset);
        let next_offsets: Vec<u32> = entries
            .iter()
            .skip(1)
            .map(|e| e.header_offset)
            .chain(std::iter::once(directory_offset))
            .collect();
        for (entry, next) in entries.into_iter().zip(next_offsets) {
            entry.slot_end = next;
        }
    }
}

/// Read-only view of one directory node
#[derive(Debug, Clone, Copy)]
pub struct DirView<'a> {
    tree: &'a DirectoryTree,
    node: &'a DirNode,
}

impl<'a> DirView<'a> {
    /// Files directly in this directory, with their segment names
    pub fn files(&self) -> impl Iterator<Item = (&'a [u8], &'a FileEntry)> + 'a {
        let (tree, node): (&'a DirectoryTree, &'a DirNode) = (self.tree, self.node);
        node.files.iter().map(move |(s, e)| (tree.names.get(*s), e))
    }

    /// Names of the subdirectories of this directory
    pub fn dirs(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let (tree, node): (&'a DirectoryTree, &'a DirNode) = (self.tree, self.node);
        node.dirs.iter().map(move |(s, _)| tree.names.get(*s))
    }

    pub fn is_empty(&self) -> bool {
        self.node.files.is_empty() && self.node.dirs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::format::{CompressionMethod, DataDescriptor};

    fn entry(names: &mut NameArena, raw: &str, header_offset: u32) -> FileEntry {
        FileEntry {
            name: names.push_normalized(raw.as_bytes()),
            method: CompressionMethod::Store,
            descriptor: DataDescriptor::default(),
            header_offset,
            data_offset: None,
            slot_end: 0,
            version_needed: 20,
            flags: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            external_attributes: 0,
            ntfs_mtime: None,
        }
    }

    fn tree_of(paths: &[&str]) -> DirectoryTree {
        let mut names = NameArena::default();
        let entries: Vec<_> = paths
            .iter()
            .enumerate()
            .map(|(i, p)| entry(&mut names, p, i as u32 * 100))
            .collect();
        let mut tree = DirectoryTree::new(names);
        for e in entries {
            tree.insert(e);
        }
        tree
    }

    #[test]
    fn test_normalize_byte() {
        assert_eq!(normalize_byte(b'A'), b'a');
        assert_eq!(normalize_byte(b'\\'), b'/');
        assert_eq!(normalize_byte(b'_'), b'_');
        // Non-ASCII bytes are left alone
        assert_eq!(normalize_byte(0xC4), 0xC4);
    }

    #[test]
    fn test_case_and_separator_insensitive_lookup() {
        let tree = tree_of(&["Textures\\Stone.DDS", "readme.txt"]);
        let a = tree.find("textures/stone.dds").unwrap();
        let b = tree.find("TEXTURES\\STONE.dds").unwrap();
        assert_eq!(a, b);
        assert_eq!(tree.path_of(a), "textures/stone.dds");
        assert!(tree.find("textures").is_none());
        assert!(tree.find("stone.dds").is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let tree = tree_of(&["dup.txt", "DUP.TXT"]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.find("dup.txt").unwrap().header_offset, 100);
    }

    #[test]
    fn test_directories_are_created() {
        let tree = tree_of(&["a/b/c.txt", "a/d.txt"]);
        let a = tree.find_dir("A").unwrap();
        let files: Vec<_> = a.files().map(|(n, _)| n.to_vec()).collect();
        let dirs: Vec<_> = a.dirs().map(|n| n.to_vec()).collect();
        assert_eq!(files, vec![b"d.txt".to_vec()]);
        assert_eq!(dirs, vec![b"b".to_vec()]);

        let root = tree.find_dir("").unwrap();
        assert_eq!(root.files().count(), 0);
        assert_eq!(root.dirs().count(), 1);
    }

    #[test]
    fn test_refresh_slot_ends() {
        let mut tree = tree_of(&["z.txt", "a.txt", "m/n.txt"]);
        tree.refresh_slot_ends(1000);
        assert_eq!(tree.find("z.txt").unwrap().slot_end, 100);
        assert_eq!(tree.find("a.txt").unwrap().slot_end, 200);
        assert_eq!(tree.find("m/n.txt").unwrap().slot_end, 1000);
    }

    #[test]
    fn test_names_match() {
        assert!(names_match(b"Dir\\File.TXT", b"dir/file.txt"));
        assert!(!names_match(b"file.txt", b"file.tx"));
        assert!(!names_match(b"file.txt", b"fille.tx"));
    }
}
