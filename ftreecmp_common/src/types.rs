use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{FileType, Metadata};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::str::FromStr;

/// Set-user-id, set-group-id and sticky bits
pub const PRIVILEGED_BITS: u32 = 0o7000;

/// Read/write/execute bits for user, group and other
pub const PERMISSION_BITS: u32 = 0o0777;

/// Default chunk size for streamed content comparison
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Kind of a filesystem object, as reported by the directory listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    /// FIFOs, sockets and anything else
    Other,
}

impl EntryKind {
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_file() {
            EntryKind::Regular
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_char_device() {
            EntryKind::CharDevice
        } else if file_type.is_block_device() {
            EntryKind::BlockDevice
        } else {
            EntryKind::Other
        }
    }

    pub fn is_dir(self) -> bool {
        self == EntryKind::Directory
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Regular => "regular",
            EntryKind::Directory => "directory",
            EntryKind::Symlink => "symlink",
            EntryKind::CharDevice => "char-device",
            EntryKind::BlockDevice => "block-device",
            EntryKind::Other => "other",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// What changed between the old and new version of a matched entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ChangeFlags: u8 {
        /// File type, owner, group, set*id or sticky bits
        const CRITICAL = 0x01;
        /// Ordinary permission bits
        const MODE = 0x02;
        /// File content, symlink target, device number
        const DATA = 0x04;
    }
}

impl ChangeFlags {
    /// Renders the flags as a fixed three column `CMD` string, `.` for unset bits
    pub fn symbols(&self) -> String {
        [
            (ChangeFlags::CRITICAL, 'C'),
            (ChangeFlags::MODE, 'M'),
            (ChangeFlags::DATA, 'D'),
        ]
        .iter()
        .map(|(flag, c)| if self.contains(*flag) { *c } else { '.' })
        .collect()
    }
}

/// Whether a change record describes the old side or the new side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Added,
    Removed,
}

impl Disposition {
    pub fn sign(self) -> char {
        match self {
            Disposition::Added => '+',
            Disposition::Removed => '-',
        }
    }
}

/// The parts of an lstat result the comparison cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatInfo {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub rdev: u64,
}

impl StatInfo {
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            mode: meta.mode(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size(),
            rdev: meta.rdev(),
        }
    }

    pub fn privileged_bits(&self) -> u32 {
        self.mode & PRIVILEGED_BITS
    }

    pub fn permission_bits(&self) -> u32 {
        self.mode & PERMISSION_BITS
    }
}

/// Byte range `[offset, offset + size)` excluded from content comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IgnoreRange {
    pub offset: u64,
    pub size: u64,
}

impl IgnoreRange {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

/// Content ignore policies that can be enabled per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IgnoreRule {
    /// Mask the identifier in the ELF `.gnu_debuglink` section
    #[serde(rename = "elf-buildid")]
    ElfBuildId,
}

impl IgnoreRule {
    pub fn as_str(self) -> &'static str {
        match self {
            IgnoreRule::ElfBuildId => "elf-buildid",
        }
    }
}

impl fmt::Display for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IgnoreRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "elf-buildid" => Ok(IgnoreRule::ElfBuildId),
            other => Err(format!("unsupported ignore rule '{}' (expected: elf-buildid)", other)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ignore policies applied to every run
    #[serde(default)]
    pub ignore: Vec<IgnoreRule>,

    /// Label printed in the report header
    #[serde(default)]
    pub package_name: Option<String>,

    /// Read size used when comparing file contents
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            package_name: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl AppConfig {
    pub fn ignores(&self, rule: IgnoreRule) -> bool {
        self.ignore.contains(&rule)
    }
}
