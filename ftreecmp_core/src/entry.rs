use ftreecmp_common::{EntryKind, FTreeCmpError, StatInfo};
use once_cell::unsync::OnceCell;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One object found inside a directory.
///
/// The parent is held as its path only; the owning `DirectorySnapshot` can be
/// dropped independently. Path, lstat result and symlink target are computed
/// on first use and cached, so each underlying system call happens at most
/// once per entry no matter how often comparison and reporting ask for it.
#[derive(Debug)]
pub struct DirectoryEntry {
    parent: Rc<Path>,
    name: OsString,
    kind: EntryKind,
    path: OnceCell<PathBuf>,
    stat: OnceCell<StatInfo>,
    link_target: OnceCell<PathBuf>,
}

impl DirectoryEntry {
    pub fn new(parent: Rc<Path>, name: OsString, kind: EntryKind) -> Self {
        Self {
            parent,
            name,
            kind,
            path: OnceCell::new(),
            stat: OnceCell::new(),
            link_target: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &OsStr {
        &self.name
    }

    pub fn name_bytes(&self) -> &[u8] {
        self.name.as_bytes()
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn parent_path(&self) -> &Path {
        &self.parent
    }

    /// Fully qualified path, parent path joined with the entry name
    pub fn path(&self) -> &Path {
        self.path.get_or_init(|| self.parent.join(&self.name))
    }

    /// lstat the entry; symbolic links are inspected themselves, not their targets
    pub fn stat(&self) -> Result<&StatInfo, FTreeCmpError> {
        self.stat.get_or_try_init(|| {
            let path = self.path();
            fs::symlink_metadata(path)
                .map(|meta| StatInfo::from_metadata(&meta))
                .map_err(|source| FTreeCmpError::StatUnavailable {
                    path: path.to_path_buf(),
                    source,
                })
        })
    }

    /// Cached stat result, if `stat()` already succeeded
    pub fn cached_stat(&self) -> Option<&StatInfo> {
        self.stat.get()
    }

    /// Target of a symbolic link
    pub fn readlink(&self) -> Result<&Path, FTreeCmpError> {
        self.link_target
            .get_or_try_init(|| {
                let path = self.path();
                fs::read_link(path).map_err(|source| FTreeCmpError::LinkUnreadable {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .map(PathBuf::as_path)
    }

    /// Cached link target, if `readlink()` already succeeded
    pub fn cached_link_target(&self) -> Option<&Path> {
        self.link_target.get().map(PathBuf::as_path)
    }

    /// Open the entry read-only for content comparison
    pub fn open(&self) -> Result<File, FTreeCmpError> {
        let path = self.path();
        File::open(path).map_err(|source| FTreeCmpError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}
