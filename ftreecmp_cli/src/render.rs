use ftreecmp_common::{Disposition, EntryKind, FTreeCmpError, StatInfo};
use ftreecmp_core::{ChangeRecord, RecordedChange, Reporter};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

pub const DEFAULT_LABEL: &str = "<unknown package>";

const LEGEND: &str = "\nDescription of change bits:
 +   added
 -   removed
 C   critical change (file type, owner, set*id bits etc)
 M   mode change (file permissions)
 D   data change (file content, symlink target, device major/minor)

";

/// Blank column used in place of the size or device number
const EMPTY_COLUMN: &str = "             ";

fn file_type_char(mode: u32) -> char {
    match mode & libc::S_IFMT as u32 {
        m if m == libc::S_IFDIR as u32 => 'd',
        m if m == libc::S_IFREG as u32 => '-',
        m if m == libc::S_IFCHR as u32 => 'c',
        m if m == libc::S_IFBLK as u32 => 'b',
        m if m == libc::S_IFLNK as u32 => 'l',
        m if m == libc::S_IFSOCK as u32 => 's',
        m if m == libc::S_IFIFO as u32 => 'f',
        _ => '?',
    }
}

fn bit(mode: u32, mask: u32, c: char) -> char {
    if mode & mask != 0 {
        c
    } else {
        '-'
    }
}

/// Execute slot: `x`, the special letter when both bits are set, its
/// uppercase form when only the special bit is set.
fn exec_bit(mode: u32, exec: u32, special: u32, c: char) -> char {
    match (mode & exec != 0, mode & special != 0) {
        (true, true) => c,
        (true, false) => 'x',
        (false, true) => c.to_ascii_uppercase(),
        (false, false) => '-',
    }
}

/// `ls -l` style rendering of a mode, e.g. `-rwsr-xr-x`
pub fn symbolic_permissions(mode: u32) -> String {
    [
        file_type_char(mode),
        bit(mode, 0o400, 'r'),
        bit(mode, 0o200, 'w'),
        exec_bit(mode, 0o100, 0o4000, 's'),
        bit(mode, 0o040, 'r'),
        bit(mode, 0o020, 'w'),
        exec_bit(mode, 0o010, 0o2000, 's'),
        bit(mode, 0o004, 'r'),
        bit(mode, 0o002, 'w'),
        exec_bit(mode, 0o001, 0o1000, 't'),
    ]
    .iter()
    .collect()
}

fn attributes(stat: &StatInfo) -> String {
    format!(
        "{} uid {:03} gid {:03}",
        symbolic_permissions(stat.mode),
        stat.uid,
        stat.gid
    )
}

/// One report line, without the trailing newline
pub fn format_line(
    prefix: &str,
    kind: EntryKind,
    stat: &StatInfo,
    path: &Path,
    link_target: Option<&Path>,
) -> String {
    let attrs = attributes(stat);
    match kind {
        EntryKind::Regular => {
            format!("{:<12} {} {:>13} {}", prefix, attrs, stat.size, path.display())
        }
        EntryKind::CharDevice | EntryKind::BlockDevice => format!(
            "{:<12} {} dev {:04x}:{:04x} {}",
            prefix,
            attrs,
            libc::major(stat.rdev as libc::dev_t),
            libc::minor(stat.rdev as libc::dev_t),
            path.display()
        ),
        EntryKind::Symlink => format!(
            "{:<12} {} {} {} -> {}",
            prefix,
            attrs,
            EMPTY_COLUMN,
            path.display(),
            link_target.unwrap_or_else(|| Path::new("")).display()
        ),
        EntryKind::Directory | EntryKind::Other => {
            format!("{:<12} {} {} {}", prefix, attrs, EMPTY_COLUMN, path.display())
        }
    }
}

/// Change column: indent, `+`/`-`, then the `CMD` bits
pub fn change_prefix(record: &ChangeRecord<'_>) -> String {
    format!(
        "   {} {} ",
        record.disposition.sign(),
        record.flags.symbols()
    )
}

/// Plain text reporter
pub struct TextReporter<W: Write> {
    out: W,
    label: String,
    lines_written: usize,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W, label: Option<String>) -> Self {
        Self {
            out,
            label: label.unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            lines_written: 0,
        }
    }

    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    fn write_record(&mut self, record: &ChangeRecord<'_>) -> Result<(), FTreeCmpError> {
        let entry = record.entry;
        let stat = *entry.stat()?;
        let link_target = match entry.kind() {
            EntryKind::Symlink => Some(entry.readlink()?),
            _ => None,
        };

        let line = format_line(
            &change_prefix(record),
            entry.kind(),
            &stat,
            entry.path(),
            link_target,
        );

        if self.lines_written == 0 {
            writeln!(self.out, "{}: file changes", self.label)?;
        }
        writeln!(self.out, "{}", line)?;
        self.lines_written += 1;
        Ok(())
    }

    /// Print the legend if anything was reported and flush the output
    pub fn finish(mut self) -> io::Result<W> {
        if self.lines_written > 0 {
            self.out.write_all(LEGEND.as_bytes())?;
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn report(&mut self, record: &ChangeRecord<'_>) -> Result<(), FTreeCmpError> {
        self.write_record(record).map_err(|e| match e {
            FTreeCmpError::Io(err) => {
                FTreeCmpError::Report(format!("failed to write report: {}", err))
            }
            other => other,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub label: String,
    pub old: String,
    pub new: String,
    pub changes: Vec<JsonChange>,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct JsonChange {
    pub disposition: Disposition,
    pub flags: String,
    pub path: String,
    pub kind: EntryKind,
    pub mode: Option<String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub link_target: Option<String>,
}

impl From<&RecordedChange> for JsonChange {
    fn from(change: &RecordedChange) -> Self {
        Self {
            disposition: change.disposition,
            flags: change.flags.symbols(),
            path: change.path.to_string_lossy().to_string(),
            kind: change.kind,
            mode: change.stat.map(|s| symbolic_permissions(s.mode)),
            uid: change.stat.map(|s| s.uid),
            gid: change.stat.map(|s| s.gid),
            size: change
                .stat
                .filter(|_| change.kind == EntryKind::Regular)
                .map(|s| s.size),
            link_target: change
                .link_target
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        }
    }
}

pub fn build_json_report(
    label: Option<&str>,
    old: &Path,
    new: &Path,
    changes: &[RecordedChange],
    errors: &[FTreeCmpError],
) -> JsonReport {
    JsonReport {
        label: label.unwrap_or(DEFAULT_LABEL).to_string(),
        old: old.to_string_lossy().to_string(),
        new: new.to_string_lossy().to_string(),
        changes: changes.iter().map(JsonChange::from).collect(),
        errors: errors.iter().map(|e| e.to_string()).collect(),
    }
}
