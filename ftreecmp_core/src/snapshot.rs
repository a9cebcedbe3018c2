use crate::entry::DirectoryEntry;
use ftreecmp_common::{EntryKind, FTreeCmpError};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Sorted listing of the immediate children of one directory, with a cursor
/// for merge-walks.
#[derive(Debug)]
pub struct DirectorySnapshot {
    path: Rc<Path>,
    entries: Vec<DirectoryEntry>,
    cursor: usize,
}

impl DirectorySnapshot {
    /// Record the directory path; nothing is read until `populate`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        Self {
            path: Rc::from(path),
            entries: Vec::new(),
            cursor: 0,
        }
    }

    /// Open and populate in one step
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, FTreeCmpError> {
        let mut snapshot = Self::open(path);
        snapshot.populate()?;
        Ok(snapshot)
    }

    /// List the directory and sort its entries byte-wise by name.
    ///
    /// On failure the snapshot stays empty.
    pub fn populate(&mut self) -> Result<(), FTreeCmpError> {
        self.entries.clear();
        self.cursor = 0;

        let unreadable = |source| FTreeCmpError::DirectoryUnreadable {
            path: self.path.to_path_buf(),
            source,
        };

        let mut entries = Vec::new();
        for dirent in fs::read_dir(&self.path).map_err(unreadable)? {
            let dirent = dirent.map_err(unreadable)?;
            // read_dir never yields "." or ".."
            let kind = EntryKind::from_file_type(dirent.file_type().map_err(unreadable)?);
            entries.push(DirectoryEntry::new(
                Rc::clone(&self.path),
                dirent.file_name(),
                kind,
            ));
        }

        entries.sort_unstable_by(|a, b| a.name_bytes().cmp(b.name_bytes()));
        debug!("Read {} entries from {}", entries.len(), self.path.display());

        self.entries = entries;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry under the cursor, `None` once past the last one
    pub fn current(&self) -> Option<&DirectoryEntry> {
        self.entries.get(self.cursor)
    }

    pub fn advance(&mut self) {
        if self.cursor < self.entries.len() {
            self.cursor += 1;
        }
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn names(snapshot: &DirectorySnapshot) -> Vec<String> {
        snapshot
            .entries()
            .iter()
            .map(|e| e.name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_open_does_not_touch_filesystem() {
        let snapshot = DirectorySnapshot::open("/definitely/not/here");
        assert!(snapshot.is_empty());
        assert!(snapshot.current().is_none());
    }

    #[test]
    fn test_populate_sorts_bytewise() {
        let temp = TempDir::new().unwrap();
        for name in ["b", "a", "Z", "_x", "a.b", "a-b"] {
            fs::write(temp.path().join(name), b"").unwrap();
        }

        let snapshot = DirectorySnapshot::read(temp.path()).unwrap();
        // Uppercase sorts before '_' before lowercase; '-' (0x2d) before '.' (0x2e)
        assert_eq!(names(&snapshot), vec!["Z", "_x", "a", "a-b", "a.b", "b"]);
    }

    #[test]
    fn test_populate_detects_kinds() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file"), b"data").unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();
        symlink("file", temp.path().join("link")).unwrap();

        let snapshot = DirectorySnapshot::read(temp.path()).unwrap();
        let kinds: Vec<EntryKind> = snapshot.entries().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![EntryKind::Directory, EntryKind::Regular, EntryKind::Symlink]
        );
        assert_eq!(snapshot.entries()[0].parent_path(), temp.path());
    }

    #[test]
    fn test_cursor_walk() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("one"), b"").unwrap();
        fs::write(temp.path().join("two"), b"").unwrap();

        let mut snapshot = DirectorySnapshot::read(temp.path()).unwrap();
        assert_eq!(snapshot.current().unwrap().name(), "one");
        snapshot.advance();
        assert_eq!(snapshot.current().unwrap().name(), "two");
        snapshot.advance();
        assert!(snapshot.current().is_none());
        snapshot.advance();
        assert!(snapshot.current().is_none());
        snapshot.rewind();
        assert_eq!(snapshot.current().unwrap().name(), "one");
    }

    #[test]
    fn test_populate_missing_directory() {
        let temp = TempDir::new().unwrap();
        let mut snapshot = DirectorySnapshot::open(temp.path().join("missing"));
        let err = snapshot.populate().unwrap_err();
        assert!(matches!(err, FTreeCmpError::DirectoryUnreadable { .. }));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_populate_not_a_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file"), b"").unwrap();
        let err = DirectorySnapshot::read(temp.path().join("file")).unwrap_err();
        assert_eq!(err.path(), Some(temp.path().join("file").as_path()));
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        let snapshot = DirectorySnapshot::read(temp.path()).unwrap();
        assert_eq!(snapshot.len(), 0);
        assert!(snapshot.current().is_none());
    }
}
