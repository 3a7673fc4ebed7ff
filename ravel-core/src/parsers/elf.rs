//! ELF64 loader, grounded on `original_source/core/parsers/elf_parser.cpp`.

use std::path::{Path, PathBuf};

use crate::process_info::{MemoryRegion, Perms};

use super::{owned_path, read_u16, read_u32, read_u64, BinaryParser};

const EI_NIDENT: usize = 16;
const EHDR_SIZE: usize = EI_NIDENT + 2 + 2 + 4 + 8 + 8 + 8 + 4 + 2 + 2 + 2 + 2 + 2 + 2;
const PT_LOAD: u32 = 1;
const PF_X: u32 = 1 << 0;
const PF_W: u32 = 1 << 1;
const PF_R: u32 = 1 << 2;

#[derive(Clone, Copy)]
#[allow(dead_code)]
struct Elf64Ehdr {
    e_type: u16,
    e_machine: u16,
    e_entry: u64,
    e_phoff: u64,
    e_phentsize: u16,
    e_phnum: u16,
}

#[derive(Clone, Copy)]
struct Elf64Phdr {
    p_type: u32,
    p_flags: u32,
    p_offset: u64,
    p_vaddr: u64,
    p_filesz: u64,
    p_memsz: u64,
}

const PHDR_SIZE: usize = 4 + 4 + 8 + 8 + 8 + 8 + 8 + 8;

fn read_ehdr(data: &[u8]) -> Elf64Ehdr {
    Elf64Ehdr {
        e_type: read_u16(data, 16),
        e_machine: read_u16(data, 18),
        e_entry: read_u64(data, 24),
        e_phoff: read_u64(data, 32),
        e_phentsize: read_u16(data, 54),
        e_phnum: read_u16(data, 56),
    }
}

fn read_phdr(data: &[u8], offset: usize) -> Elf64Phdr {
    Elf64Phdr {
        p_type: read_u32(data, offset),
        p_flags: read_u32(data, offset + 4),
        p_offset: read_u64(data, offset + 8),
        p_vaddr: read_u64(data, offset + 16),
        p_filesz: read_u64(data, offset + 32),
        p_memsz: read_u64(data, offset + 40),
    }
}

fn perms_to_string(flags: u32) -> Perms {
    Perms { r: flags & PF_R != 0, w: flags & PF_W != 0, x: flags & PF_X != 0 }
}

pub struct ElfParser {
    path: PathBuf,
    header: Elf64Ehdr,
    segments: Vec<Elf64Phdr>,
}

impl ElfParser {
    pub fn parse(path: impl AsRef<Path>, data: &[u8]) -> Result<Self, super::ParseError> {
        if data.len() < EHDR_SIZE {
            return Err(super::ParseError);
        }
        if &data[0..4] != b"\x7fELF" {
            return Err(super::ParseError);
        }

        let header = read_ehdr(data);
        let mut segments = Vec::with_capacity(header.e_phnum as usize);
        for i in 0..header.e_phnum {
            let offset = header.e_phoff as usize + (i as usize) * (header.e_phentsize.max(PHDR_SIZE as u16) as usize);
            if offset + PHDR_SIZE > data.len() {
                break;
            }
            segments.push(read_phdr(data, offset));
        }

        Ok(Self { path: owned_path(path.as_ref()), header, segments })
    }
}

impl BinaryParser for ElfParser {
    fn sections(&self) -> Vec<MemoryRegion> {
        let mut regions = Vec::new();
        for segment in &self.segments {
            if segment.p_type == PT_LOAD && segment.p_memsz > 0 {
                regions.push(MemoryRegion {
                    base: segment.p_vaddr,
                    size: segment.p_memsz,
                    perms: perms_to_string(segment.p_flags),
                    name: format!("segment_{}", regions.len()),
                });
            }
        }
        regions
    }

    fn entry_point(&self) -> Option<u64> {
        Some(self.header.e_entry)
    }

    fn virtual_to_file_offset(&self, virt_addr: u64) -> Option<u64> {
        for segment in &self.segments {
            if segment.p_type != PT_LOAD {
                continue;
            }
            if virt_addr >= segment.p_vaddr && virt_addr < segment.p_vaddr + segment.p_memsz {
                let offset_in_segment = virt_addr - segment.p_vaddr;
                if offset_in_segment < segment.p_filesz {
                    return Some(segment.p_offset + offset_in_segment);
                }
            }
        }
        None
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn arch_name(&self) -> &'static str {
        match self.header.e_machine {
            0x3E => "x86-64",
            0xB7 => "AArch64",
            _ => "Unknown",
        }
    }

    fn type_name(&self) -> &'static str {
        "ELF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_elf(vaddr: u64, filesz: u64, memsz: u64, flags: u32) -> Vec<u8> {
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(b"\x7fELF");
        data[4] = 2; // ELFCLASS64
        data[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        data[18..20].copy_from_slice(&0x3Eu16.to_le_bytes()); // EM_X86_64
        data[24..32].copy_from_slice(&0x401000u64.to_le_bytes()); // e_entry
        data[32..40].copy_from_slice(&64u64.to_le_bytes()); // e_phoff
        data[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes()); // e_phentsize
        data[56..58].copy_from_slice(&1u16.to_le_bytes()); // e_phnum

        let mut phdr = vec![0u8; PHDR_SIZE];
        phdr[0..4].copy_from_slice(&PT_LOAD.to_le_bytes());
        phdr[4..8].copy_from_slice(&flags.to_le_bytes());
        phdr[8..16].copy_from_slice(&0u64.to_le_bytes()); // p_offset
        phdr[16..24].copy_from_slice(&vaddr.to_le_bytes());
        phdr[32..40].copy_from_slice(&filesz.to_le_bytes());
        phdr[40..48].copy_from_slice(&memsz.to_le_bytes());

        data.extend_from_slice(&phdr);
        data
    }

    #[test]
    fn loads_one_segment_and_translates_offsets() {
        let data = build_minimal_elf(0x400000, 0x1000, 0x2000, PF_R | PF_X);
        let parser = ElfParser::parse("/tmp/a.out", &data).unwrap();

        let sections = parser.sections();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].base, 0x400000);
        assert_eq!(sections[0].size, 0x2000);
        assert_eq!(sections[0].perms.as_str(), "r-x");
        assert_eq!(sections[0].name, "segment_0");

        assert_eq!(parser.virtual_to_file_offset(0x400000), Some(0));
        assert_eq!(parser.virtual_to_file_offset(0x400004), Some(4));
        // inside the BSS tail (beyond p_filesz) does not translate
        assert_eq!(parser.virtual_to_file_offset(0x401800), None);
    }

    #[test]
    fn rejects_non_elf_data() {
        assert!(ElfParser::parse("/tmp/x", &[0u8; 64]).is_err());
    }
}
