//! End-to-end coverage of `FileTarget::open` against real files on disk,
//! exercising both supported formats and parser auto-detection together
//! (spec.md §8 S1/S2).

mod common;

use ravel_core::target::FileTarget;

use common::{build_elf, write_temp_file, Segment, PF_R, PF_X};

#[test]
fn opens_a_crafted_elf_and_reads_through_it() {
    let data = build_elf(
        0x401000,
        &[Segment { vaddr: 0x400000, flags: PF_R | PF_X, bytes: vec![0x90, 0x90, 0xC3, 0x00] }],
    );
    let path = write_temp_file(&data);

    let target = FileTarget::open(&path).expect("parses as ELF");
    assert_eq!(target.entry_point(), Some(0x401000));

    let mut buf = [0u8; 3];
    target.read(0x400000, &mut buf).unwrap();
    assert_eq!(buf, [0x90, 0x90, 0xC3]);

    let regions = target.regions().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].perms.as_str(), "r-x");

    std::fs::remove_file(&path).ok();
}

#[test]
fn rejects_a_file_that_is_neither_pe_nor_elf() {
    let path = write_temp_file(b"not a binary at all");
    assert!(FileTarget::open(&path).is_err());
    std::fs::remove_file(&path).ok();
}
