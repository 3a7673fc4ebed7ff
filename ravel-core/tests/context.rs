//! Confirms a scan driven through `RavelContext` (rather than a bare
//! `Scanner` with `set_target` called directly) actually runs, guarding
//! against the scanner silently going unwired to the active target.

mod common;

use std::time::{Duration, Instant};

use ravel_core::scanner::{CompareType, ScanConfig, ScanDataType};
use ravel_core::RavelContext;

use common::{build_elf, write_temp_file, Segment, PF_R, PF_W};

fn wait_for_scan(ctx: &RavelContext) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while ctx.scanner.is_scanning() {
        assert!(Instant::now() < deadline, "scan did not finish in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn opening_a_file_through_the_context_wires_the_scanner() {
    let bytes = 7i32.to_le_bytes().to_vec();
    let data = build_elf(0, &[Segment { vaddr: 0x800000, flags: PF_R | PF_W, bytes }]);
    let path = write_temp_file(&data);

    let mut ctx = RavelContext::new();
    ctx.open_file(&path).unwrap();

    ctx.scanner.begin_first_scan(ScanConfig {
        data_type: ScanDataType::I32,
        compare: CompareType::Exact,
        value_literal: "7".to_string(),
        fast_scan: true,
    });
    wait_for_scan(&ctx);

    assert_eq!(ctx.scanner.result_count(), 1);
    assert_eq!(ctx.scanner.lock_results()[0].address, 0x800000);

    std::fs::remove_file(&path).ok();
}
