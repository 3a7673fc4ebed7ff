//! Exercises the strings analyzer over crafted read-only regions: basic
//! printable-run discovery plus re-reading found strings, and a string that
//! straddles the analyzer's internal 64 KiB chunk boundary (spec.md §8 S5) —
//! the scenario behind the deliberate deviation from the C++ reference noted
//! in DESIGN.md's C7 entry.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use ravel_core::strings::{StringScanConfig, StringsAnalyzer};
use ravel_core::target::FileTarget;
use ravel_core::Target;

use common::{build_elf, write_temp_file, Segment, PF_R};

fn wait_for_scan(analyzer: &StringsAnalyzer) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while analyzer.is_scanning() {
        assert!(Instant::now() < deadline, "scan did not finish in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn finds_printable_runs_and_rereads_them() {
    let mut bytes = vec![0u8; 16];
    bytes.extend_from_slice(b"hello world");
    bytes.push(0);
    bytes.extend_from_slice(b"ab"); // below the 4-byte minimum, should be skipped
    bytes.push(0);
    bytes.extend_from_slice(b"longer string");

    let data = build_elf(0, &[Segment { vaddr: 0x700000, flags: PF_R, bytes }]);
    let path = write_temp_file(&data);
    let target = Arc::new(Target::File(FileTarget::open(&path).unwrap()));

    let mut analyzer = StringsAnalyzer::new();
    analyzer.scan(target.clone(), StringScanConfig::default());
    wait_for_scan(&analyzer);

    assert_eq!(analyzer.count(), 2);

    let mut batch = [ravel_core::strings::StringRef { address: 0, length: 0 }; 2];
    let n = analyzer.get_batch(0, &mut batch);
    assert_eq!(n, 2);
    assert_eq!(batch[0].address, 0x700000 + 16);
    assert_eq!(analyzer.read_string(&target, &batch[0]), "hello world");
    assert_eq!(analyzer.read_string(&target, &batch[1]), "longer string");

    std::fs::remove_file(&path).ok();
}

#[test]
fn finds_string_straddling_chunk_boundary() {
    // The analyzer reads in 64 KiB chunks; place a printable run that starts
    // 10 bytes before that boundary and ends 10 bytes past it, and check it
    // comes back as one entry rather than split in two (or dropped).
    const CHUNK_SIZE: usize = 64 * 1024;
    let straddler = b"crosses_chunk_bound!"; // 20 bytes
    let straddle_start = CHUNK_SIZE - 10;

    let mut bytes = vec![0u8; CHUNK_SIZE + 1024];
    bytes[straddle_start..straddle_start + straddler.len()].copy_from_slice(straddler);

    let data = build_elf(0, &[Segment { vaddr: 0x710000, flags: PF_R, bytes }]);
    let path = write_temp_file(&data);
    let target = Arc::new(Target::File(FileTarget::open(&path).unwrap()));

    let mut analyzer = StringsAnalyzer::new();
    analyzer.scan(target.clone(), StringScanConfig::default());
    wait_for_scan(&analyzer);

    assert_eq!(analyzer.count(), 1);

    let mut batch = [ravel_core::strings::StringRef { address: 0, length: 0 }; 1];
    assert_eq!(analyzer.get_batch(0, &mut batch), 1);
    assert_eq!(batch[0].address, 0x710000 + straddle_start as u64);
    assert_eq!(batch[0].length, straddler.len() as u32);
    assert_eq!(analyzer.read_string(&target, &batch[0]), "crosses_chunk_bound!");

    std::fs::remove_file(&path).ok();
}
