use crate::entry::DirectoryEntry;
use ftreecmp_common::{ChangeFlags, Disposition, EntryKind, FTreeCmpError, StatInfo};
use serde::Serialize;
use std::path::PathBuf;

/// A single finding handed to a `Reporter`.
///
/// A modified object produces two records with the same flags: `Removed`
/// for the old entry, then `Added` for the new one.
#[derive(Debug, Clone, Copy)]
pub struct ChangeRecord<'a> {
    pub disposition: Disposition,
    pub flags: ChangeFlags,
    pub entry: &'a DirectoryEntry,
}

/// Receives change records in traversal order and renders them.
///
/// The entry's `stat()` result is already cached when a record is delivered.
/// An error returned here is treated as a hard failure for that entry.
pub trait Reporter {
    fn report(&mut self, record: &ChangeRecord<'_>) -> Result<(), FTreeCmpError>;
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, record: &ChangeRecord<'_>) -> Result<(), FTreeCmpError> {
        (**self).report(record)
    }
}

/// Owned copy of a change record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedChange {
    pub disposition: Disposition,
    pub flags: ChangeFlags,
    pub path: PathBuf,
    pub kind: EntryKind,
    pub stat: Option<StatInfo>,
    pub link_target: Option<PathBuf>,
}

impl RecordedChange {
    pub fn from_record(record: &ChangeRecord<'_>) -> Self {
        let entry = record.entry;
        let link_target = if entry.kind() == EntryKind::Symlink {
            entry.readlink().ok().map(|p| p.to_path_buf())
        } else {
            None
        };
        Self {
            disposition: record.disposition,
            flags: record.flags,
            path: entry.path().to_path_buf(),
            kind: entry.kind(),
            stat: entry.cached_stat().copied(),
            link_target,
        }
    }
}

/// Reporter that keeps every record in memory
#[derive(Debug, Default, Clone)]
pub struct ChangeLog {
    changes: Vec<RecordedChange>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> &[RecordedChange] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<RecordedChange> {
        self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Records whose path ends with `suffix`
    pub fn find(&self, suffix: &str) -> Vec<&RecordedChange> {
        self.changes
            .iter()
            .filter(|c| c.path.ends_with(suffix))
            .collect()
    }

    pub fn count(&self, disposition: Disposition) -> usize {
        self.changes
            .iter()
            .filter(|c| c.disposition == disposition)
            .count()
    }
}

impl Reporter for ChangeLog {
    fn report(&mut self, record: &ChangeRecord<'_>) -> Result<(), FTreeCmpError> {
        self.changes.push(RecordedChange::from_record(record));
        Ok(())
    }
}
