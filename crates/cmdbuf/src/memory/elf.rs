//! Minimal ELF reader: symbol tables and program-header LOAD segments.
//!
//! Handles ELF32 and ELF64 in either byte order, which covers both the
//! firmware images and the cores produced by the dump tooling.

use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

/// Program header type: loadable segment
const PT_LOAD: u32 = 1;
/// Section header type: static symbol table
const SHT_SYMTAB: u32 = 2;
/// Section header type: dynamic symbol table
const SHT_DYNSYM: u32 = 11;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElfError {
    #[error("Not an ELF image (magic {0:02x?})")]
    BadMagic([u8; 4]),
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("Unsupported ELF data encoding: {0}")]
    UnsupportedEncoding(u8),
    #[error("Truncated ELF image at offset 0x{0:x}")]
    Truncated(u64),
    #[error("Malformed ELF image: {0}")]
    Malformed(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

/// `(virtual address range, file offset, file size)` of one PT_LOAD entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSegment {
    pub vaddr: u64,
    pub file_size: u64,
    pub mem_size: u64,
    pub file_offset: u64,
}

impl LoadSegment {
    /// True when `address` falls in the file-backed part of the segment.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.vaddr && address - self.vaddr < self.file_size
    }

    /// File offset of `len` bytes at `address`, if they stay inside the
    /// file-backed part of the segment.
    pub fn translate(&self, address: u64, len: usize) -> Option<u64> {
        if !self.contains(address) {
            return None;
        }
        let delta = address - self.vaddr;
        if delta.checked_add(len as u64)? > self.file_size {
            return None;
        }
        self.file_offset.checked_add(delta)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy)]
struct SectionHeader {
    kind: u32,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

/// Endian- and class-aware field reader over the image bytes.
struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
    class: ElfClass,
    endian: Endian,
}

impl<'a> FieldReader<'a> {
    fn at(data: &'a [u8], offset: u64, class: ElfClass, endian: Endian) -> Self {
        let mut cursor = Cursor::new(data);
        cursor.set_position(offset);
        Self { cursor, class, endian }
    }

    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], ElfError> {
        let pos = self.cursor.position();
        let mut buf = [0u8; N];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| ElfError::Truncated(pos))?;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, ElfError> {
        Ok(self.bytes::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ElfError> {
        let raw = self.bytes::<2>()?;
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(raw),
            Endian::Big => u16::from_be_bytes(raw),
        })
    }

    fn u32(&mut self) -> Result<u32, ElfError> {
        let raw = self.bytes::<4>()?;
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        })
    }

    fn u64(&mut self) -> Result<u64, ElfError> {
        let raw = self.bytes::<8>()?;
        Ok(match self.endian {
            Endian::Little => u64::from_le_bytes(raw),
            Endian::Big => u64::from_be_bytes(raw),
        })
    }

    /// Address/offset/size field: 4 bytes on ELF32, 8 on ELF64.
    fn word(&mut self) -> Result<u64, ElfError> {
        match self.class {
            ElfClass::Elf32 => self.u32().map(u64::from),
            ElfClass::Elf64 => self.u64(),
        }
    }
}

/// A parsed view of an ELF file. Borrows the file bytes.
pub struct ElfImage<'a> {
    data: &'a [u8],
    class: ElfClass,
    endian: Endian,
    segments: Vec<LoadSegment>,
    sections: Vec<SectionHeader>,
}

impl<'a> ElfImage<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ElfError> {
        let ident: [u8; 16] = data
            .get(..16)
            .and_then(|b| b.try_into().ok())
            .ok_or(ElfError::Truncated(0))?;

        let magic = [ident[0], ident[1], ident[2], ident[3]];
        if magic != ELF_MAGIC {
            return Err(ElfError::BadMagic(magic));
        }
        let class = match ident[4] {
            ELFCLASS32 => ElfClass::Elf32,
            ELFCLASS64 => ElfClass::Elf64,
            other => return Err(ElfError::UnsupportedClass(other)),
        };
        let endian = match ident[5] {
            ELFDATA2LSB => Endian::Little,
            ELFDATA2MSB => Endian::Big,
            other => return Err(ElfError::UnsupportedEncoding(other)),
        };

        // e_type, e_machine, e_version, e_entry
        let mut r = FieldReader::at(data, 16, class, endian);
        r.u16()?;
        r.u16()?;
        r.u32()?;
        r.word()?;
        let phoff = r.word()?;
        let shoff = r.word()?;
        r.u32()?; // e_flags
        r.u16()?; // e_ehsize
        let phentsize = r.u16()? as u64;
        let phnum = r.u16()? as u64;
        let shentsize = r.u16()? as u64;
        let shnum = r.u16()? as u64;

        let mut image = Self {
            data,
            class,
            endian,
            segments: Vec::new(),
            sections: Vec::new(),
        };

        if phoff != 0 && phnum != 0 {
            if phentsize == 0 {
                return Err(ElfError::Malformed("zero program header entry size"));
            }
            for i in 0..phnum {
                if let Some(segment) = image.program_header(phoff + i * phentsize)? {
                    image.segments.push(segment);
                }
            }
        }

        if shoff != 0 && shnum != 0 {
            if shentsize == 0 {
                return Err(ElfError::Malformed("zero section header entry size"));
            }
            for i in 0..shnum {
                let section = image.section_header(shoff + i * shentsize)?;
                image.sections.push(section);
            }
        }

        Ok(image)
    }

    pub fn class(&self) -> ElfClass {
        self.class
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn load_segments(&self) -> &[LoadSegment] {
        &self.segments
    }

    fn program_header(&self, offset: u64) -> Result<Option<LoadSegment>, ElfError> {
        let mut r = FieldReader::at(self.data, offset, self.class, self.endian);
        let kind = r.u32()?;
        let segment = match self.class {
            ElfClass::Elf32 => {
                let file_offset = r.word()?;
                let vaddr = r.word()?;
                r.word()?; // p_paddr
                let file_size = r.word()?;
                let mem_size = r.word()?;
                LoadSegment { vaddr, file_size, mem_size, file_offset }
            }
            ElfClass::Elf64 => {
                r.u32()?; // p_flags
                let file_offset = r.word()?;
                let vaddr = r.word()?;
                r.word()?; // p_paddr
                let file_size = r.word()?;
                let mem_size = r.word()?;
                LoadSegment { vaddr, file_size, mem_size, file_offset }
            }
        };
        Ok((kind == PT_LOAD).then_some(segment))
    }

    fn section_header(&self, offset: u64) -> Result<SectionHeader, ElfError> {
        let mut r = FieldReader::at(self.data, offset, self.class, self.endian);
        r.u32()?; // sh_name
        let kind = r.u32()?;
        r.word()?; // sh_flags
        r.word()?; // sh_addr
        let sh_offset = r.word()?;
        let size = r.word()?;
        let link = r.u32()?;
        r.u32()?; // sh_info
        r.word()?; // sh_addralign
        let entsize = r.word()?;
        Ok(SectionHeader { kind, offset: sh_offset, size, link, entsize })
    }

    /// Visit every named symbol in SHT_SYMTAB / SHT_DYNSYM sections.
    ///
    /// Symbols with an unreadable name are skipped.
    pub fn for_each_symbol<F>(&self, mut visit: F) -> Result<(), ElfError>
    where
        F: FnMut(&str, u64, u64),
    {
        let default_entsize = match self.class {
            ElfClass::Elf32 => 16,
            ElfClass::Elf64 => 24,
        };

        for section in &self.sections {
            if section.kind != SHT_SYMTAB && section.kind != SHT_DYNSYM {
                continue;
            }
            let strtab = self
                .sections
                .get(section.link as usize)
                .ok_or(ElfError::Malformed("symbol table links to a missing string table"))?;
            let entsize = if section.entsize == 0 { default_entsize } else { section.entsize };
            let count = section.size / entsize;

            for i in 0..count {
                let mut r = FieldReader::at(self.data, section.offset + i * entsize, self.class, self.endian);
                let (name_off, value, size) = match self.class {
                    ElfClass::Elf32 => {
                        let name = r.u32()?;
                        let value = r.word()?;
                        let size = r.word()?;
                        (name, value, size)
                    }
                    ElfClass::Elf64 => {
                        let name = r.u32()?;
                        r.u8()?; // st_info
                        r.u8()?; // st_other
                        r.u16()?; // st_shndx
                        let value = r.word()?;
                        let size = r.word()?;
                        (name, value, size)
                    }
                };
                if name_off == 0 {
                    continue;
                }
                if let Some(name) = self.string_at(strtab, name_off as u64) {
                    visit(name, value, size);
                }
            }
        }
        Ok(())
    }

    /// Collect the symbols whose names appear in `wanted`.
    pub fn find_symbols(&self, wanted: &[&str]) -> Result<Vec<Symbol>, ElfError> {
        let mut found = Vec::new();
        self.for_each_symbol(|name, address, size| {
            if wanted.contains(&name) && !found.iter().any(|s: &Symbol| s.name == name) {
                found.push(Symbol { name: name.to_string(), address, size });
            }
        })?;
        Ok(found)
    }

    fn string_at(&self, strtab: &SectionHeader, offset: u64) -> Option<&'a str> {
        if offset >= strtab.size {
            return None;
        }
        let start = usize::try_from(strtab.offset.checked_add(offset)?).ok()?;
        let end = usize::try_from(strtab.offset.checked_add(strtab.size)?).ok()?;
        let table = self.data.get(start..end.min(self.data.len()))?;
        let len = table.iter().position(|b| *b == 0)?;
        std::str::from_utf8(&table[..len]).ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a little-endian ELF32 image with one LOAD segment and a symbol
    /// table holding `symbols`. Segment contents follow the headers.
    pub(crate) fn build_elf32(symbols: &[(&str, u32, u32)], segment: Option<(u32, &[u8])>) -> Vec<u8> {
        let mut strtab = vec![0u8];
        let mut symtab = vec![0u8; 16];
        for (name, value, size) in symbols {
            let name_off = strtab.len() as u32;
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
            symtab.extend_from_slice(&name_off.to_le_bytes());
            symtab.extend_from_slice(&value.to_le_bytes());
            symtab.extend_from_slice(&size.to_le_bytes());
            symtab.extend_from_slice(&[0, 0, 1, 0]);
        }

        let phnum: u16 = if segment.is_some() { 1 } else { 0 };
        let phoff = 52u32;
        let mut offset = phoff + 32 * phnum as u32;
        let seg_data_off = offset;
        let seg_bytes = segment.map(|(_, b)| b.to_vec()).unwrap_or_default();
        offset += seg_bytes.len() as u32;
        let symtab_off = offset;
        offset += symtab.len() as u32;
        let strtab_off = offset;
        offset += strtab.len() as u32;
        let shoff = offset;

        let mut out = Vec::new();
        out.extend_from_slice(&ELF_MAGIC);
        out.extend_from_slice(&[ELFCLASS32, ELFDATA2LSB, 1, 0]);
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&4u16.to_le_bytes()); // ET_CORE
        out.extend_from_slice(&40u16.to_le_bytes()); // EM_ARM
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // entry
        out.extend_from_slice(&(if phnum > 0 { phoff } else { 0 }).to_le_bytes());
        out.extend_from_slice(&shoff.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // flags
        out.extend_from_slice(&52u16.to_le_bytes());
        out.extend_from_slice(&32u16.to_le_bytes());
        out.extend_from_slice(&phnum.to_le_bytes());
        out.extend_from_slice(&40u16.to_le_bytes());
        out.extend_from_slice(&3u16.to_le_bytes()); // null, symtab, strtab
        out.extend_from_slice(&0u16.to_le_bytes());

        if let Some((vaddr, bytes)) = segment {
            for v in [PT_LOAD, seg_data_off, vaddr, vaddr, bytes.len() as u32, bytes.len() as u32, 6, 4] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out.extend_from_slice(&seg_bytes);
        out.extend_from_slice(&symtab);
        out.extend_from_slice(&strtab);

        let sections: [[u32; 10]; 3] = [
            [0; 10],
            [0, SHT_SYMTAB, 0, 0, symtab_off, symtab.len() as u32, 2, 1, 4, 16],
            [0, 3, 0, 0, strtab_off, strtab.len() as u32, 0, 0, 1, 0],
        ];
        for sh in sections {
            for v in sh {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }

    #[test]
    fn test_parse_symbols_and_segments() {
        let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let image = build_elf32(
            &[("s_context", 0x2000_0000, 0x800), ("unrelated", 0x10, 4)],
            Some((0x2000_0000, &payload)),
        );
        let elf = ElfImage::parse(&image).expect("parse");
        assert_eq!(elf.class(), ElfClass::Elf32);
        assert_eq!(elf.endian(), Endian::Little);
        assert_eq!(elf.load_segments().len(), 1);
        assert_eq!(elf.load_segments()[0].vaddr, 0x2000_0000);
        assert_eq!(elf.load_segments()[0].file_size, 8);

        let found = elf.find_symbols(&["s_context", "init_cmd_buffer"]).expect("symbols");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "s_context");
        assert_eq!(found[0].address, 0x2000_0000);
        assert_eq!(found[0].size, 0x800);
    }

    #[test]
    fn test_bad_magic() {
        let err = ElfImage::parse(b"\x7fELG................").err();
        assert!(matches!(err, Some(ElfError::BadMagic(_))));
    }

    #[test]
    fn test_truncated_header() {
        let image = build_elf32(&[], None);
        assert!(matches!(ElfImage::parse(&image[..30]), Err(ElfError::Truncated(_))));
        assert!(matches!(ElfImage::parse(&image[..8]), Err(ElfError::Truncated(0))));
    }

    #[test]
    fn test_segment_translate_bounds() {
        let seg = LoadSegment { vaddr: 0x1000, file_size: 0x10, mem_size: 0x20, file_offset: 0x200 };
        assert_eq!(seg.translate(0x1004, 4), Some(0x204));
        assert_eq!(seg.translate(0x100C, 4), Some(0x20C));
        assert_eq!(seg.translate(0x100C, 8), None);
        assert_eq!(seg.translate(0x1010, 1), None);
        assert!(!seg.contains(0x0FFF));
    }
}
