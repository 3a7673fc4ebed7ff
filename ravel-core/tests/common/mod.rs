//! Shared ELF-building helper for integration tests. Builds the same
//! minimal 64-bit ELF layout the `elf` parser's own unit tests use, but
//! supports multiple `PT_LOAD` segments so a test can lay out code and data
//! regions side by side.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

const PHDR_SIZE: usize = 4 + 4 + 8 + 8 + 8 + 8 + 8 + 8;
const EHDR_SIZE: usize = 64;

// each test binary only uses a subset of these helpers
#[allow(dead_code)]
pub const PF_X: u32 = 1 << 0;
#[allow(dead_code)]
pub const PF_W: u32 = 1 << 1;
#[allow(dead_code)]
pub const PF_R: u32 = 1 << 2;

pub struct Segment {
    pub vaddr: u64,
    pub flags: u32,
    pub bytes: Vec<u8>,
}

/// Lays out one PT_LOAD segment per entry, back to back in the file, each
/// segment's `p_filesz` and `p_memsz` equal to its byte length.
pub fn build_elf(entry_point: u64, segments: &[Segment]) -> Vec<u8> {
    let phoff = EHDR_SIZE as u64;
    let phnum = segments.len() as u16;
    let data_start = phoff as usize + segments.len() * PHDR_SIZE;

    let mut file = vec![0u8; data_start];
    file[0..4].copy_from_slice(b"\x7fELF");
    file[4] = 2;
    file[16..18].copy_from_slice(&2u16.to_le_bytes());
    file[18..20].copy_from_slice(&0x3Eu16.to_le_bytes());
    file[24..32].copy_from_slice(&entry_point.to_le_bytes());
    file[32..40].copy_from_slice(&phoff.to_le_bytes());
    file[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    file[56..58].copy_from_slice(&phnum.to_le_bytes());

    let mut offset = data_start as u64;
    for (i, seg) in segments.iter().enumerate() {
        let phdr_at = phoff as usize + i * PHDR_SIZE;
        file[phdr_at..phdr_at + 4].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        file[phdr_at + 4..phdr_at + 8].copy_from_slice(&seg.flags.to_le_bytes());
        file[phdr_at + 8..phdr_at + 16].copy_from_slice(&offset.to_le_bytes());
        file[phdr_at + 16..phdr_at + 24].copy_from_slice(&seg.vaddr.to_le_bytes());
        file[phdr_at + 32..phdr_at + 40].copy_from_slice(&(seg.bytes.len() as u64).to_le_bytes());
        file[phdr_at + 40..phdr_at + 48].copy_from_slice(&(seg.bytes.len() as u64).to_le_bytes());

        file.extend_from_slice(&seg.bytes);
        offset += seg.bytes.len() as u64;
    }

    file
}

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Writes `data` to a uniquely-named file under the OS temp directory and
/// returns its path; the caller is responsible for removing it.
pub fn write_temp_file(data: &[u8]) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("ravel-test-{}-{}.bin", std::process::id(), n));
    fs::write(&path, data).expect("write temp fixture file");
    path
}
