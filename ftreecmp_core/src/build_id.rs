//! Locates the identifier stored in an ELF object's `.gnu_debuglink` section.
//!
//! The section payload is a NUL-terminated file name, zero padding up to the
//! section alignment, then a 4 or 8 byte identifier that changes between
//! otherwise identical builds. The byte range of that identifier is what the
//! content comparison may mask out.
//!
//! Any problem understanding the file means "nothing to ignore"; only the
//! final rewind of the reader can fail the call.

use ftreecmp_common::IgnoreRange;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::debug;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const EI_NIDENT: usize = 16;
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;
const SHT_NOBITS: u32 = 8;

const DEBUGLINK_SECTION: &[u8] = b".gnu_debuglink";

/// Larger debug-link sections are not trusted
pub const MAX_DEBUGLINK_SIZE: u64 = 2048;

const MAX_SECTION_TABLE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Elf32,
    Elf64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    class: Class,
    endian: Endian,
}

impl Layout {
    fn header_size(&self) -> usize {
        match self.class {
            Class::Elf32 => 52,
            Class::Elf64 => 64,
        }
    }

    fn section_header_size(&self) -> usize {
        match self.class {
            Class::Elf32 => 40,
            Class::Elf64 => 64,
        }
    }

    /// Width of address and offset fields
    fn word(&self) -> usize {
        match self.class {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        }
    }

    fn uint(&self, bytes: &[u8]) -> u64 {
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        match self.endian {
            Endian::Big => bytes.iter().fold(0, fold),
            Endian::Little => bytes.iter().rev().fold(0, fold),
        }
    }
}

/// Sequential field reader over a header buffer
struct Fields<'a> {
    layout: Layout,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(layout: Layout, bytes: &'a [u8]) -> Self {
        Self {
            layout,
            bytes,
            pos: 0,
        }
    }

    fn skip(&mut self, n: usize) -> &mut Self {
        self.pos += n;
        self
    }

    fn take(&mut self, n: usize) -> u64 {
        let value = self.layout.uint(&self.bytes[self.pos..self.pos + n]);
        self.pos += n;
        value
    }

    fn half(&mut self) -> u64 {
        self.take(2)
    }

    fn word32(&mut self) -> u64 {
        self.take(4)
    }

    fn word(&mut self) -> u64 {
        self.take(self.layout.word())
    }
}

#[derive(Debug, Clone, Copy)]
struct SectionHeader {
    name: u64,
    kind: u32,
    offset: u64,
    size: u64,
    align: u64,
}

impl SectionHeader {
    fn parse(layout: Layout, bytes: &[u8]) -> Self {
        let mut f = Fields::new(layout, bytes);
        let name = f.word32();
        let kind = f.word32() as u32;
        f.skip(2 * layout.word()); // sh_flags, sh_addr
        let offset = f.word();
        let size = f.word();
        f.skip(8); // sh_link, sh_info
        let align = f.word();
        Self {
            name,
            kind,
            offset,
            size,
            align,
        }
    }
}

/// Finds the build identifier range inside ELF objects
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildIdLocator;

impl BuildIdLocator {
    /// Inspect `reader` and return the identifier range, if the file carries a
    /// well-formed debug-link section. The read position is reset to the start
    /// of the file before returning.
    pub fn locate<R: Read + Seek>(reader: &mut R) -> io::Result<Option<IgnoreRange>> {
        let found = match inspect(reader) {
            Ok(found) => found,
            Err(e) => {
                debug!("object file inspection stopped: {}", e);
                None
            }
        };
        reader.seek(SeekFrom::Start(0))?;
        Ok(found)
    }

    /// Ranges are only worth masking when both files agree on where the
    /// identifier lives.
    pub fn matching_ranges(
        old: Option<IgnoreRange>,
        new: Option<IgnoreRange>,
    ) -> Option<(IgnoreRange, IgnoreRange)> {
        match (old, new) {
            (Some(old), Some(new)) if old == new => Some((old, new)),
            (Some(old), Some(new)) => {
                debug!(
                    "identifier ranges disagree ({}+{} vs {}+{}), not masking",
                    old.offset, old.size, new.offset, new.size
                );
                None
            }
            _ => None,
        }
    }
}

fn inspect<R: Read + Seek>(reader: &mut R) -> io::Result<Option<IgnoreRange>> {
    reader.seek(SeekFrom::Start(0))?;

    let mut ident = [0u8; EI_NIDENT];
    reader.read_exact(&mut ident)?;
    if ident[..4] != ELF_MAGIC {
        return Ok(None);
    }

    let class = match ident[4] {
        ELFCLASS32 => Class::Elf32,
        ELFCLASS64 => Class::Elf64,
        other => {
            debug!("unknown ELF class {}", other);
            return Ok(None);
        }
    };
    let endian = match ident[5] {
        ELFDATA2LSB => Endian::Little,
        ELFDATA2MSB => Endian::Big,
        other => {
            debug!("unknown ELF data encoding {}", other);
            return Ok(None);
        }
    };
    let layout = Layout { class, endian };

    let mut header = vec![0u8; layout.header_size() - EI_NIDENT];
    reader.read_exact(&mut header)?;

    // e_type, e_machine, e_version, e_entry, e_phoff
    let mut f = Fields::new(layout, &header);
    f.skip(2 + 2 + 4 + 2 * layout.word());
    let shoff = f.word();
    f.skip(4 + 2 + 2 + 2); // e_flags, e_ehsize, e_phentsize, e_phnum
    let shentsize = f.half() as usize;
    let shnum = f.half() as usize;
    let shstrndx = f.half() as usize;

    if shoff == 0 || shnum == 0 {
        debug!("no section header table");
        return Ok(None);
    }
    if shentsize < layout.section_header_size() {
        debug!("section header entry size {} too small", shentsize);
        return Ok(None);
    }
    if shstrndx >= shnum {
        debug!("section name table index {} out of range", shstrndx);
        return Ok(None);
    }
    if shnum * shentsize > MAX_SECTION_TABLE_SIZE {
        debug!("section header table of {} bytes not trusted", shnum * shentsize);
        return Ok(None);
    }

    let mut table = vec![0u8; shnum * shentsize];
    reader.seek(SeekFrom::Start(shoff))?;
    reader.read_exact(&mut table)?;

    let sections: Vec<SectionHeader> = table
        .chunks_exact(shentsize)
        .map(|raw| SectionHeader::parse(layout, raw))
        .collect();
    let strtab = sections[shstrndx];

    let mut wanted = DEBUGLINK_SECTION.to_vec();
    wanted.push(0);
    let mut name_buf = vec![0u8; wanted.len()];

    for section in &sections {
        if section.name.saturating_add(wanted.len() as u64) > strtab.size {
            continue;
        }
        reader.seek(SeekFrom::Start(strtab.offset.saturating_add(section.name)))?;
        reader.read_exact(&mut name_buf)?;
        if name_buf == wanted {
            return read_debuglink(reader, section);
        }
    }

    Ok(None)
}

fn read_debuglink<R: Read + Seek>(
    reader: &mut R,
    section: &SectionHeader,
) -> io::Result<Option<IgnoreRange>> {
    if section.kind == SHT_NOBITS {
        debug!("debug-link section has no file data");
        return Ok(None);
    }
    if section.size > MAX_DEBUGLINK_SIZE {
        debug!("debug-link section too large ({} bytes)", section.size);
        return Ok(None);
    }
    if !section.align.is_power_of_two() {
        debug!("debug-link alignment {} is not a power of two", section.align);
        return Ok(None);
    }

    let mut data = vec![0u8; section.size as usize];
    reader.seek(SeekFrom::Start(section.offset))?;
    reader.read_exact(&mut data)?;

    let Some(nul) = data.iter().position(|&b| b == 0) else {
        debug!("debug-link file name is not terminated");
        return Ok(None);
    };

    let align = section.align;
    let padded = (nul as u64 + 1 + align - 1) & !(align - 1);
    if padded >= section.size {
        debug!("debug-link identifier offset {} outside section", padded);
        return Ok(None);
    }

    let id_size = section.size - padded;
    if id_size != 4 && id_size != 8 {
        debug!("debug-link identifier has unexpected size {}", id_size);
        return Ok(None);
    }

    Ok(Some(IgnoreRange::new(section.offset + padded, id_size)))
}
