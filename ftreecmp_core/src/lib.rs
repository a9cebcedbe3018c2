pub mod build_id;
pub mod content;
pub mod entry;
pub mod report;
pub mod snapshot;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use build_id::BuildIdLocator;
pub use content::{ContentComparator, MaskPair, ReadError, Side};
pub use entry::DirectoryEntry;
pub use report::{ChangeLog, ChangeRecord, RecordedChange, Reporter};
pub use snapshot::DirectorySnapshot;
pub use tree::{metadata_flags, CompareOptions, CompareOutcome, TreeComparator};
