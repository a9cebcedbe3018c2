//! Builders for on-disk trees and synthetic ELF images used by the unit tests.

use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

#[derive(Debug, Clone, Copy)]
pub enum ElfEndian {
    Little,
    Big,
}

#[derive(Debug, Clone)]
pub struct ElfSection {
    pub name: String,
    pub kind: u32,
    pub data: Vec<u8>,
    pub align: u64,
}

impl ElfSection {
    pub fn progbits(name: &str, data: Vec<u8>, align: u64) -> Self {
        Self {
            name: name.to_string(),
            kind: SHT_PROGBITS,
            data,
            align,
        }
    }
}

/// Debug-link payload: name, NUL, zero padding to `align`, identifier
pub fn debuglink_payload(name: &str, id: &[u8], align: usize) -> Vec<u8> {
    let mut data = name.as_bytes().to_vec();
    data.push(0);
    while data.len() % align.max(1) != 0 {
        data.push(0);
    }
    data.extend_from_slice(id);
    data
}

pub struct ElfImage {
    pub bytes: Vec<u8>,
    offsets: Vec<(String, u64)>,
}

impl ElfImage {
    pub fn section_offset(&self, name: &str) -> Option<u64> {
        self.offsets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, offset)| *offset)
    }
}

/// Minimal ELF writer: header, section contents, `.shstrtab`, section header
/// table last.
pub struct ElfBuilder {
    class: ElfClass,
    endian: ElfEndian,
    sections: Vec<ElfSection>,
}

impl ElfBuilder {
    pub fn new(class: ElfClass, endian: ElfEndian) -> Self {
        Self {
            class,
            endian,
            sections: Vec::new(),
        }
    }

    pub fn section(mut self, section: ElfSection) -> Self {
        self.sections.push(section);
        self
    }

    fn word(&self) -> usize {
        match self.class {
            ElfClass::Elf32 => 4,
            ElfClass::Elf64 => 8,
        }
    }

    fn put(&self, out: &mut Vec<u8>, value: u64, width: usize) {
        let le = value.to_le_bytes();
        match self.endian {
            ElfEndian::Little => out.extend_from_slice(&le[..width]),
            ElfEndian::Big => out.extend(le[..width].iter().rev()),
        }
    }

    fn put_section_header(
        &self,
        out: &mut Vec<u8>,
        name: u64,
        kind: u32,
        offset: u64,
        size: u64,
        align: u64,
    ) {
        let word = self.word();
        self.put(out, name, 4);
        self.put(out, u64::from(kind), 4);
        self.put(out, 0, word); // sh_flags
        self.put(out, 0, word); // sh_addr
        self.put(out, offset, word);
        self.put(out, size, word);
        self.put(out, 0, 4); // sh_link
        self.put(out, 0, 4); // sh_info
        self.put(out, align, word);
        self.put(out, 0, word); // sh_entsize
    }

    pub fn build(self) -> ElfImage {
        let (header_size, shdr_size) = match self.class {
            ElfClass::Elf32 => (52usize, 40usize),
            ElfClass::Elf64 => (64, 64),
        };

        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for section in &self.sections {
            name_offsets.push(shstrtab.len() as u64);
            shstrtab.extend_from_slice(section.name.as_bytes());
            shstrtab.push(0);
        }
        let shstrtab_name = shstrtab.len() as u64;
        shstrtab.extend_from_slice(b".shstrtab\0");

        let mut bytes = vec![0u8; header_size];
        let mut offsets = Vec::new();
        for section in &self.sections {
            let align = section.align.max(1) as usize;
            while bytes.len() % align != 0 {
                bytes.push(0);
            }
            offsets.push((section.name.clone(), bytes.len() as u64));
            bytes.extend_from_slice(&section.data);
        }
        let shstrtab_offset = bytes.len() as u64;
        bytes.extend_from_slice(&shstrtab);

        while bytes.len() % 8 != 0 {
            bytes.push(0);
        }
        let shoff = bytes.len() as u64;

        let mut table = vec![0u8; shdr_size];
        for (i, section) in self.sections.iter().enumerate() {
            self.put_section_header(
                &mut table,
                name_offsets[i],
                section.kind,
                offsets[i].1,
                section.data.len() as u64,
                section.align,
            );
        }
        self.put_section_header(
            &mut table,
            shstrtab_name,
            SHT_STRTAB,
            shstrtab_offset,
            shstrtab.len() as u64,
            1,
        );
        bytes.extend_from_slice(&table);

        let shnum = self.sections.len() as u64 + 2;
        let word = self.word();
        let mut header = vec![0x7f, b'E', b'L', b'F'];
        header.push(match self.class {
            ElfClass::Elf32 => 1,
            ElfClass::Elf64 => 2,
        });
        header.push(match self.endian {
            ElfEndian::Little => 1,
            ElfEndian::Big => 2,
        });
        header.push(1);
        header.resize(16, 0);
        self.put(&mut header, 2, 2); // e_type: executable
        self.put(&mut header, 62, 2); // e_machine
        self.put(&mut header, 1, 4); // e_version
        self.put(&mut header, 0, word); // e_entry
        self.put(&mut header, 0, word); // e_phoff
        self.put(&mut header, shoff, word);
        self.put(&mut header, 0, 4); // e_flags
        self.put(&mut header, header_size as u64, 2);
        self.put(&mut header, 0, 2); // e_phentsize
        self.put(&mut header, 0, 2); // e_phnum
        self.put(&mut header, shdr_size as u64, 2);
        self.put(&mut header, shnum, 2);
        self.put(&mut header, shnum - 1, 2);
        assert_eq!(header.len(), header_size);
        bytes[..header_size].copy_from_slice(&header);

        ElfImage { bytes, offsets }
    }
}

/// An ELF64 executable whose debug-link identifier is `id`
pub fn elf_with_debuglink(id: [u8; 4]) -> Vec<u8> {
    ElfBuilder::new(ElfClass::Elf64, ElfEndian::Little)
        .section(ElfSection::progbits(".text", vec![0x90; 40], 16))
        .section(ElfSection::progbits(
            ".gnu_debuglink",
            debuglink_payload("tool.debug", &id, 4),
            4,
        ))
        .build()
        .bytes
}

/// Which of the two trees a fixture call applies to
#[derive(Debug, Clone, Copy)]
pub enum Tree {
    Old,
    New,
}

/// Two sibling directories, `old` and `new`, inside one temp dir
pub struct TreePair {
    _temp: TempDir,
    old: PathBuf,
    new: PathBuf,
}

impl TreePair {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let old = temp.path().join("old");
        let new = temp.path().join("new");
        fs::create_dir(&old).expect("Failed to create old tree");
        fs::create_dir(&new).expect("Failed to create new tree");
        Self {
            _temp: temp,
            old,
            new,
        }
    }

    pub fn old(&self) -> &Path {
        &self.old
    }

    pub fn new_root(&self) -> &Path {
        &self.new
    }

    pub fn root(&self, tree: Tree) -> &Path {
        match tree {
            Tree::Old => &self.old,
            Tree::New => &self.new,
        }
    }

    pub fn file(&self, tree: Tree, path: &str, content: &[u8]) -> PathBuf {
        let full = self.root(tree).join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&full, content).expect("Failed to write file");
        full
    }

    /// Same file in both trees
    pub fn both(&self, path: &str, content: &[u8]) {
        self.file(Tree::Old, path, content);
        self.file(Tree::New, path, content);
    }

    pub fn dir(&self, tree: Tree, path: &str) -> PathBuf {
        let full = self.root(tree).join(path);
        fs::create_dir_all(&full).expect("Failed to create directory");
        full
    }

    pub fn link(&self, tree: Tree, path: &str, target: &str) -> PathBuf {
        let full = self.root(tree).join(path);
        symlink(target, &full).expect("Failed to create symlink");
        full
    }

    pub fn chmod(&self, tree: Tree, path: &str, mode: u32) {
        let full = self.root(tree).join(path);
        fs::set_permissions(&full, fs::Permissions::from_mode(mode))
            .expect("Failed to set permissions");
    }
}
