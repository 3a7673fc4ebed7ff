//! Exercises a real first-scan/refine-scan cycle against a writable region
//! backed by a crafted file target (spec.md §8 S3/S4).

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use ravel_core::scanner::{CompareType, ScanConfig, ScanDataType, Scanner};
use ravel_core::target::FileTarget;
use ravel_core::Target;

use common::{build_elf, write_temp_file, Segment, PF_R, PF_W};

fn wait_for_scan(scanner: &Scanner) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while scanner.is_scanning() {
        assert!(Instant::now() < deadline, "scan did not finish in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn i32_region(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn first_scan_finds_exact_matches_and_refine_narrows_them() {
    let bytes = i32_region(&[42, 7, 42, 100, 42]);
    let data = build_elf(0, &[Segment { vaddr: 0x500000, flags: PF_R | PF_W, bytes }]);
    let path = write_temp_file(&data);

    let target = Arc::new(Target::File(FileTarget::open(&path).unwrap()));

    let mut scanner = Scanner::new();
    scanner.set_target(Some(target));

    let config = ScanConfig {
        data_type: ScanDataType::I32,
        compare: CompareType::Exact,
        value_literal: "42".to_string(),
        fast_scan: true,
    };
    scanner.begin_first_scan(config.clone());
    wait_for_scan(&scanner);

    let addresses: Vec<u64> = scanner.lock_results().iter().map(|r| r.address).collect();
    assert_eq!(addresses, vec![0x500000, 0x500008, 0x500010]);

    scanner.begin_refine_scan(config);
    wait_for_scan(&scanner);
    assert_eq!(scanner.result_count(), 3);

    std::fs::remove_file(&path).ok();
}

#[test]
fn greater_than_scan_over_unaligned_bytes() {
    let bytes = i32_region(&[1, 200, 5]);
    let data = build_elf(0, &[Segment { vaddr: 0x600000, flags: PF_R | PF_W, bytes }]);
    let path = write_temp_file(&data);

    let target = Arc::new(Target::File(FileTarget::open(&path).unwrap()));
    let mut scanner = Scanner::new();
    scanner.set_target(Some(target));

    scanner.begin_first_scan(ScanConfig {
        data_type: ScanDataType::I32,
        compare: CompareType::Greater,
        value_literal: "50".to_string(),
        fast_scan: true,
    });
    wait_for_scan(&scanner);

    let addresses: Vec<u64> = scanner.lock_results().iter().map(|r| r.address).collect();
    assert_eq!(addresses, vec![0x600004]);

    std::fs::remove_file(&path).ok();
}
