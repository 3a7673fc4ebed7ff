//! Exercises the cross-reference engine over a crafted code region (one
//! real `lea rax, [rip+disp]` encoding) paired with a data region the
//! computed absolute target falls inside of (spec.md §8 S6).

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use ravel_core::target::FileTarget;
use ravel_core::xref::{XrefEngine, XrefKind};
use ravel_core::Target;

use common::{build_elf, write_temp_file, Segment, PF_R, PF_X};

fn wait_for_scan(xref: &XrefEngine) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while xref.is_scanning() {
        assert!(Instant::now() < deadline, "scan did not finish in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn finds_lea_rip_relative_reference_into_a_data_region() {
    // lea rax, [rip+0xff5] at 0x401000 resolves to 0x401000 + 7 + 0xff5 == 0x401ffc
    let code = vec![0x48, 0x8D, 0x05, 0xF5, 0x0F, 0x00, 0x00];
    let target_addr = 0x401000u64 + 7 + 0x0FF5;

    let data = build_elf(
        0,
        &[
            Segment { vaddr: 0x401000, flags: PF_R | PF_X, bytes: code },
            Segment { vaddr: target_addr, flags: PF_R, bytes: vec![0u8; 16] },
        ],
    );
    let path = write_temp_file(&data);
    let target = Arc::new(Target::File(FileTarget::open(&path).unwrap()));

    let mut xref = XrefEngine::new();
    xref.start_scan(target);
    wait_for_scan(&xref);

    let items = xref.items();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.address, target_addr);
    // `lea rax, ...` destination is a 64-bit register, so the item should be
    // classified as a qword even though LEA never reports a memory size.
    assert_eq!(item.name, format!("qword_{:X}", target_addr));
    assert_eq!(item.default_value_def, "dq ?");
    assert_eq!(item.refs.len(), 1);
    assert_eq!(item.refs[0].kind, XrefKind::AddressOf);
    assert_eq!(item.refs[0].site_ip, 0x401000);
    assert!(item.refs[0].instruction_text.to_lowercase().contains("lea"));

    std::fs::remove_file(&path).ok();
}
