//! Startup scan of the uploads tree.
//!
//! The uploads root is laid out as `root/<user_id>/<file_name>`. Every regular
//! file one level below a user directory becomes a [`FileEntry`] keyed by an
//! identifier derived from the user id and file name. The resulting
//! [`FileIndex`] is never mutated; a rescan produces a new one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::IndexError;

/// Separator placed between user id and file name before hashing.
const IDENTIFIER_SEPARATOR: char = '_';

/// Compute the identifier for a `(user_id, file_name)` pair.
///
/// This is an MD5 digest of `"{user_id}_{file_name}"` rendered as 32 lowercase
/// hex characters. It does not look at file contents.
pub fn identifier_for(user_id: &str, file_name: &str) -> String {
    let key = format!("{user_id}{IDENTIFIER_SEPARATOR}{file_name}");
    format!("{:x}", md5::compute(key.as_bytes()))
}

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub identifier: String,
    pub user_id: String,
    pub file_name: String,
    pub absolute_path: PathBuf,
}

impl FileEntry {
    pub fn new(
        user_id: impl Into<String>,
        file_name: impl Into<String>,
        absolute_path: impl Into<PathBuf>,
    ) -> Self {
        let user_id = user_id.into();
        let file_name = file_name.into();
        Self {
            identifier: identifier_for(&user_id, &file_name),
            user_id,
            file_name,
            absolute_path: absolute_path.into(),
        }
    }

    fn label(&self) -> String {
        format!("{}/{}", self.user_id, self.file_name)
    }
}

/// Immutable identifier → entry mapping. Iterates in insertion order.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    entries: Vec<FileEntry>,
    positions: HashMap<String, usize>,
}

impl FileIndex {
    /// Scan `root_dir` and index every `root_dir/<user_id>/<file_name>`.
    ///
    /// Top-level files, nested directories and anything that is not a regular
    /// file are skipped. Entries are visited in file-name order, so the
    /// listing order is stable for a given tree.
    pub fn build(root_dir: &Path) -> Result<Self, IndexError> {
        let root = root_dir.canonicalize().map_err(|source| IndexError::Io {
            path: root_dir.to_path_buf(),
            source,
        })?;

        if !root.is_dir() {
            return Err(IndexError::NotADirectory(root));
        }

        let mut index = FileIndex::default();

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .max_depth(2)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if is_dangling_link(&err) => {
                    debug!("Skipping dangling link: {:?}", err.path());
                    continue;
                }
                Err(err) if err.loop_ancestor().is_some() => {
                    debug!("Skipping link to ancestor: {:?}", err.path());
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            // Depth 1 entries are user directories (or stray files); only
            // their children are indexed.
            if entry.depth() == 1 {
                if !entry.file_type().is_dir() {
                    debug!("Skipping top-level entry: {}", entry.path().display());
                }
                continue;
            }

            if !entry.file_type().is_file() {
                debug!("Skipping non-file entry: {}", entry.path().display());
                continue;
            }

            let path = entry.path();
            let Some(user_id) = path
                .parent()
                .and_then(Path::file_name)
                .and_then(|name| name.to_str())
            else {
                warn!("Skipping file with non UTF-8 user directory: {}", path.display());
                continue;
            };
            let Some(file_name) = entry.file_name().to_str() else {
                warn!("Skipping file with non UTF-8 name: {}", path.display());
                continue;
            };

            let absolute_path = path.canonicalize().map_err(|source| IndexError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            index.insert(FileEntry::new(user_id, file_name, absolute_path));
        }

        info!(
            "Indexed {} files under {}",
            index.len(),
            root.display()
        );

        Ok(index)
    }

    /// Build an index from prepared entries without touching the filesystem.
    pub fn from_entries(entries: impl IntoIterator<Item = FileEntry>) -> Self {
        let mut index = FileIndex::default();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    /// Add an entry. The first entry for an identifier wins.
    ///
    /// Distinct pairs can share an identifier (`a_b/c` and `a/b_c` hash the
    /// same key), so a clash skips the later file instead of failing the scan.
    fn insert(&mut self, entry: FileEntry) {
        if let Some(&pos) = self.positions.get(&entry.identifier) {
            let existing = &self.entries[pos];
            if existing.user_id != entry.user_id || existing.file_name != entry.file_name {
                warn!(
                    "Identifier collision on {}: keeping {}, skipping {}",
                    entry.identifier,
                    existing.label(),
                    entry.label()
                );
                return;
            }
            self.entries[pos] = entry;
            return;
        }

        self.positions
            .insert(entry.identifier.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn get(&self, identifier: &str) -> Option<&FileEntry> {
        self.positions.get(identifier).map(|&pos| &self.entries[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Create the uploads root if it does not exist yet.
pub fn ensure_root(root_dir: &Path) -> Result<(), IndexError> {
    if root_dir.exists() {
        if !root_dir.is_dir() {
            return Err(IndexError::NotADirectory(root_dir.to_path_buf()));
        }
        return Ok(());
    }

    info!("Creating uploads directory: {}", root_dir.display());
    std::fs::create_dir_all(root_dir).map_err(|source| IndexError::Io {
        path: root_dir.to_path_buf(),
        source,
    })
}

fn is_dangling_link(err: &walkdir::Error) -> bool {
    err.path().is_some_and(|path| {
        path.symlink_metadata()
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false)
            && !path.exists()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_identifier_is_md5_hex_of_pair() {
        // md5("alice_report.pdf")
        let id = identifier_for("alice", "report.pdf");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(id, format!("{:x}", md5::compute(b"alice_report.pdf")));
    }

    #[test]
    fn test_identifier_is_deterministic() {
        assert_eq!(identifier_for("bob", "a.txt"), identifier_for("bob", "a.txt"));
        assert_ne!(identifier_for("bob", "a.txt"), identifier_for("bob", "b.txt"));
        assert_ne!(identifier_for("bob", "a.txt"), identifier_for("eve", "a.txt"));
    }

    #[test]
    fn test_build_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let index = FileIndex::build(temp_dir.path()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_build_indexes_user_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "alice/report.pdf", "a");
        write(root, "bob/report.pdf", "b");
        write(root, "bob/notes.txt", "n");

        let index = FileIndex::build(root).unwrap();
        assert_eq!(index.len(), 3);

        let alice = index.get(&identifier_for("alice", "report.pdf")).unwrap();
        let bob = index.get(&identifier_for("bob", "report.pdf")).unwrap();
        assert_ne!(alice.identifier, bob.identifier);
        assert_eq!(alice.user_id, "alice");
        assert_eq!(bob.file_name, "report.pdf");
        assert!(alice.absolute_path.is_absolute());
        assert_eq!(std::fs::read_to_string(&alice.absolute_path).unwrap(), "a");
    }

    #[test]
    fn test_build_orders_by_name() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "bob/z.txt", "");
        write(root, "alice/b.txt", "");
        write(root, "alice/a.txt", "");

        let index = FileIndex::build(root).unwrap();
        let labels: Vec<String> = index.iter().map(FileEntry::label).collect();
        assert_eq!(labels, vec!["alice/a.txt", "alice/b.txt", "bob/z.txt"]);
    }

    #[test]
    fn test_build_skips_top_level_files_and_nested_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "stray.txt", "");
        write(root, "alice/keep.txt", "");
        write(root, "alice/nested/deep.txt", "");

        let index = FileIndex::build(root).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get(&identifier_for("alice", "keep.txt")).is_some());
        assert!(index.get(&identifier_for("alice", "deep.txt")).is_none());
        assert!(index.get(&identifier_for("nested", "deep.txt")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_build_skips_dangling_links() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "alice/keep.txt", "");
        std::os::unix::fs::symlink(root.join("missing"), root.join("alice/broken")).unwrap();

        let index = FileIndex::build(root).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_build_skips_links_to_ancestors() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "alice/keep.txt", "");
        std::os::unix::fs::symlink(root, root.join("alice/up")).unwrap();

        let index = FileIndex::build(root).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get(&identifier_for("alice", "keep.txt")).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_build_resolves_file_links() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "shared/target.txt", "shared");
        std::fs::create_dir_all(root.join("alice")).unwrap();
        std::os::unix::fs::symlink(root.join("shared/target.txt"), root.join("alice/link.txt"))
            .unwrap();

        let index = FileIndex::build(root).unwrap();
        let entry = index.get(&identifier_for("alice", "link.txt")).unwrap();
        assert_eq!(entry.file_name, "link.txt");
        assert_eq!(
            entry.absolute_path,
            root.join("shared/target.txt").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_build_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileIndex::build(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(IndexError::Io { .. })));
    }

    #[test]
    fn test_build_keeps_first_on_ambiguous_names() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/b_c", "first");
        write(root, "a_b/c", "second");
        write(root, "z/other.txt", "");
        assert_eq!(identifier_for("a", "b_c"), identifier_for("a_b", "c"));

        let index = FileIndex::build(root).unwrap();
        assert_eq!(index.len(), 2);

        let kept = index.get(&identifier_for("a", "b_c")).unwrap();
        assert_eq!(kept.user_id, "a");
        assert_eq!(kept.file_name, "b_c");
        assert_eq!(std::fs::read_to_string(&kept.absolute_path).unwrap(), "first");
        assert!(index.get(&identifier_for("z", "other.txt")).is_some());
    }

    #[test]
    fn test_from_entries_keeps_first_on_collision() {
        let index = FileIndex::from_entries([
            FileEntry::new("a", "b_c", "/tmp/first"),
            FileEntry::new("a_b", "c", "/tmp/second"),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.iter().next().unwrap().absolute_path,
            PathBuf::from("/tmp/first")
        );
    }

    #[test]
    fn test_from_entries_preserves_order() {
        let index = FileIndex::from_entries([
            FileEntry::new("zed", "1", "/tmp/1"),
            FileEntry::new("amy", "2", "/tmp/2"),
        ]);
        let users: Vec<&str> = index.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["zed", "amy"]);
    }

    #[test]
    fn test_ensure_root_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("uploads/nested");
        ensure_root(&root).unwrap();
        assert!(root.is_dir());
        ensure_root(&root).unwrap();
    }

    #[test]
    fn test_ensure_root_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(ensure_root(&file), Err(IndexError::NotADirectory(_))));
    }
}
