use crate::build_id::BuildIdLocator;
use crate::content::{ContentComparator, MaskPair, Side};
use crate::entry::DirectoryEntry;
use crate::report::{ChangeRecord, Reporter};
use crate::snapshot::DirectorySnapshot;
use ftreecmp_common::{
    AppConfig, ChangeFlags, Disposition, EntryKind, FTreeCmpError, IgnoreRule, StatInfo,
    DEFAULT_CHUNK_SIZE,
};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, error};

/// Per-run settings for a tree comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    /// Mask matching `.gnu_debuglink` identifiers in ELF files
    pub ignore_build_id: bool,
    pub chunk_size: usize,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            ignore_build_id: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CompareOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ignore_build_id: config.ignores(IgnoreRule::ElfBuildId),
            chunk_size: config.chunk_size,
        }
    }

    pub fn with_build_id_ignored(mut self, enabled: bool) -> Self {
        self.ignore_build_id = enabled;
        self
    }
}

/// Result of a whole run
#[derive(Debug, Default)]
pub struct CompareOutcome {
    /// Number of change records delivered to the reporter
    pub records: usize,
    /// Hard I/O failures; each aborted only its own entry or subtree
    pub errors: Vec<FTreeCmpError>,
}

impl CompareOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Flags implied by ownership and mode bits alone
pub fn metadata_flags(old: &StatInfo, new: &StatInfo) -> ChangeFlags {
    let mut flags = ChangeFlags::empty();

    if old.privileged_bits() != new.privileged_bits() || old.uid != new.uid || old.gid != new.gid {
        flags |= ChangeFlags::CRITICAL;
    }
    if old.permission_bits() != new.permission_bits() {
        flags |= ChangeFlags::MODE;
    }

    flags
}

enum Step {
    Old,
    New,
    Both,
}

/// Sorted merge-walk over two directory trees.
///
/// Names present on one side only are reported as added or removed together
/// with their whole subtree. Names present on both sides are compared and,
/// for directories, descended into. Only the two snapshots of the current
/// level and those of its ancestors are alive at any time.
pub struct TreeComparator<R: Reporter> {
    options: CompareOptions,
    content: ContentComparator,
    reporter: R,
    records: usize,
    errors: Vec<FTreeCmpError>,
}

impl<R: Reporter> TreeComparator<R> {
    pub fn new(options: CompareOptions, reporter: R) -> Self {
        Self {
            options,
            content: ContentComparator::new(options.chunk_size),
            reporter,
            records: 0,
            errors: Vec::new(),
        }
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Read both roots and compare them. If either root cannot be listed the
    /// comparison does not start.
    pub fn compare_trees(&mut self, old_root: &Path, new_root: &Path) -> CompareOutcome {
        let old = DirectorySnapshot::read(old_root);
        let new = DirectorySnapshot::read(new_root);

        match (old, new) {
            (Ok(mut old), Ok(mut new)) => {
                self.compare_directories(&mut old, &mut new);
            }
            (old, new) => {
                for err in [old.err(), new.err()].into_iter().flatten() {
                    self.fail(err);
                }
            }
        }

        self.take_outcome()
    }

    /// Merge-walk two populated snapshots. Returns false if any error was
    /// recorded at this level or below.
    pub fn compare_directories(
        &mut self,
        old: &mut DirectorySnapshot,
        new: &mut DirectorySnapshot,
    ) -> bool {
        debug!("Comparing {} vs {}", old.path().display(), new.path().display());

        let errors_before = self.errors.len();
        old.rewind();
        new.rewind();

        loop {
            let step = match (old.current(), new.current()) {
                (None, None) => break,
                (None, Some(added)) => {
                    self.report_recursively(Disposition::Added, added);
                    Step::New
                }
                (Some(removed), None) => {
                    self.report_recursively(Disposition::Removed, removed);
                    Step::Old
                }
                (Some(o), Some(n)) => match o.name_bytes().cmp(n.name_bytes()) {
                    Ordering::Less => {
                        self.report_recursively(Disposition::Removed, o);
                        Step::Old
                    }
                    Ordering::Greater => {
                        self.report_recursively(Disposition::Added, n);
                        Step::New
                    }
                    Ordering::Equal => {
                        if let Err(e) = self.compare_entries(o, n) {
                            self.fail(e);
                        }
                        Step::Both
                    }
                },
            };

            match step {
                Step::Old => old.advance(),
                Step::New => new.advance(),
                Step::Both => {
                    old.advance();
                    new.advance();
                }
            }
        }

        self.errors.len() == errors_before
    }

    /// Drain the counters gathered so far
    pub fn take_outcome(&mut self) -> CompareOutcome {
        CompareOutcome {
            records: std::mem::take(&mut self.records),
            errors: std::mem::take(&mut self.errors),
        }
    }

    fn fail(&mut self, err: FTreeCmpError) {
        error!("Error: {}", err);
        self.errors.push(err);
    }

    fn emit(
        &mut self,
        disposition: Disposition,
        flags: ChangeFlags,
        entry: &DirectoryEntry,
    ) -> Result<(), FTreeCmpError> {
        entry.stat()?;
        if entry.kind() == EntryKind::Symlink {
            entry.readlink()?;
        }

        self.reporter.report(&ChangeRecord {
            disposition,
            flags,
            entry,
        })?;
        self.records += 1;
        Ok(())
    }

    /// Emit a record; a failure is logged and collected, never propagated
    fn emit_or_fail(
        &mut self,
        disposition: Disposition,
        flags: ChangeFlags,
        entry: &DirectoryEntry,
    ) -> bool {
        match self.emit(disposition, flags, entry) {
            Ok(()) => true,
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Report `entry`, then everything below it if it is a directory
    fn report_recursively(&mut self, disposition: Disposition, entry: &DirectoryEntry) {
        if !self.emit_or_fail(disposition, ChangeFlags::empty(), entry) {
            return;
        }
        if !entry.kind().is_dir() {
            return;
        }

        match DirectorySnapshot::read(entry.path()) {
            Ok(subdir) => {
                for child in subdir.entries() {
                    self.report_recursively(disposition, child);
                }
            }
            Err(e) => self.fail(e),
        }
    }

    /// Compare a matched pair and descend if both are directories
    fn compare_entries(
        &mut self,
        old: &DirectoryEntry,
        new: &DirectoryEntry,
    ) -> Result<(), FTreeCmpError> {
        if old.kind() != new.kind() {
            self.emit_or_fail(Disposition::Removed, ChangeFlags::empty(), old);
            self.emit_or_fail(Disposition::Added, ChangeFlags::empty(), new);
            return Ok(());
        }

        let old_stat = *old.stat()?;
        let new_stat = *new.stat()?;
        let mut flags = metadata_flags(&old_stat, &new_stat);

        let data_changed = match old.kind() {
            EntryKind::Regular => !self.same_file_content(old, new, &old_stat, &new_stat)?,
            EntryKind::Symlink => old.readlink()?.as_os_str() != new.readlink()?.as_os_str(),
            EntryKind::CharDevice | EntryKind::BlockDevice => old_stat.rdev != new_stat.rdev,
            EntryKind::Directory | EntryKind::Other => false,
        };
        if data_changed {
            flags |= ChangeFlags::DATA;
        }

        if !flags.is_empty() {
            self.emit_or_fail(Disposition::Removed, flags, old);
            self.emit_or_fail(Disposition::Added, flags, new);
        }

        // Descend even if reporting the directories themselves failed
        if old.kind().is_dir() {
            let mut old_subdir = DirectorySnapshot::read(old.path())?;
            let mut new_subdir = DirectorySnapshot::read(new.path())?;
            self.compare_directories(&mut old_subdir, &mut new_subdir);
        }

        Ok(())
    }

    fn same_file_content(
        &self,
        old: &DirectoryEntry,
        new: &DirectoryEntry,
        old_stat: &StatInfo,
        new_stat: &StatInfo,
    ) -> Result<bool, FTreeCmpError> {
        if old_stat.size != new_stat.size {
            return Ok(false);
        }

        let mut old_file = old.open()?;
        let mut new_file = new.open()?;

        debug!(
            "comparing regular files {} vs {}",
            old.path().display(),
            new.path().display()
        );

        let read_failed = |entry: &DirectoryEntry, source| FTreeCmpError::ReadFailed {
            path: entry.path().to_path_buf(),
            source,
        };

        let mask = if self.options.ignore_build_id {
            let old_range =
                BuildIdLocator::locate(&mut old_file).map_err(|e| read_failed(old, e))?;
            let new_range =
                BuildIdLocator::locate(&mut new_file).map_err(|e| read_failed(new, e))?;
            BuildIdLocator::matching_ranges(old_range, new_range)
                .map(|(old, new)| MaskPair { old, new })
        } else {
            None
        };

        if let Some(mask) = &mask {
            debug!(
                "ignoring build id bytes {}..{} of {}",
                mask.old.offset,
                mask.old.end(),
                old.path().display()
            );
        }

        self.content
            .same_content(&mut old_file, &mut new_file, mask)
            .map_err(|e| match e.side {
                Side::Old => read_failed(old, e.source),
                Side::New => read_failed(new, e.source),
            })
    }
}
