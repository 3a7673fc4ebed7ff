//! Strings analyzer (spec §4.5, component C7): scans readable memory for
//! runs of printable bytes, keeps them sorted, and allows exact-address
//! lookup. Grounded on `original_source/core/analysis/strings.cpp`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::RwLock;

use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRef {
    pub address: u64,
    pub length: u32,
}

#[derive(Debug, Clone)]
pub struct StringScanConfig {
    pub min_length: usize,
    pub scan_executable: bool,
}

impl Default for StringScanConfig {
    fn default() -> Self {
        Self { min_length: 4, scan_executable: false }
    }
}

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte) || byte == 0x09
}

struct SharedState {
    results: RwLock<Vec<StringRef>>,
    scanning: AtomicBool,
    cancel_requested: AtomicBool,
    progress_bits: AtomicU32,
}

impl SharedState {
    fn new() -> Self {
        Self {
            results: RwLock::new(Vec::new()),
            scanning: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            progress_bits: AtomicU32::new(0),
        }
    }

    fn set_progress(&self, value: f32) {
        self.progress_bits.store(value.to_bits(), Ordering::Relaxed);
    }

    fn progress(&self) -> f32 {
        f32::from_bits(self.progress_bits.load(Ordering::Relaxed))
    }
}

pub struct StringsAnalyzer {
    state: Arc<SharedState>,
    worker: Option<JoinHandle<()>>,
}

const CHUNK_SIZE: usize = 64 * 1024;

impl StringsAnalyzer {
    pub fn new() -> Self {
        Self { state: Arc::new(SharedState::new()), worker: None }
    }

    pub fn scan(&mut self, target: Arc<Target>, config: StringScanConfig) {
        self.cancel();
        self.clear();

        self.state.cancel_requested.store(false, Ordering::Release);
        self.state.set_progress(0.0);
        self.state.scanning.store(true, Ordering::Release);

        let state = self.state.clone();
        self.worker = Some(std::thread::spawn(move || worker(target, config, state)));
    }

    pub fn cancel(&mut self) {
        if self.state.scanning.load(Ordering::Acquire) {
            self.state.cancel_requested.store(true, Ordering::Release);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.state.scanning.store(false, Ordering::Release);
    }

    pub fn clear(&mut self) {
        self.state.results.write().clear();
    }

    pub fn is_scanning(&self) -> bool {
        self.state.scanning.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> f32 {
        self.state.progress()
    }

    pub fn count(&self) -> usize {
        self.state.results.read().len()
    }

    /// Copies up to `out.len()` entries starting at `start_index`, returning
    /// how many were copied.
    pub fn get_batch(&self, start_index: usize, out: &mut [StringRef]) -> usize {
        let results = self.state.results.read();
        if start_index >= results.len() {
            return 0;
        }
        let n = out.len().min(results.len() - start_index);
        out[..n].copy_from_slice(&results[start_index..start_index + n]);
        n
    }

    pub fn find_exact(&self, address: u64) -> Option<StringRef> {
        let results = self.state.results.read();
        let idx = results.partition_point(|r| r.address < address);
        results.get(idx).filter(|r| r.address == address).copied()
    }

    /// Rereads `ref_.length` (capped at 256) bytes from `target`, since
    /// memory may have changed since the scan. Control characters below
    /// 0x20 other than tab are replaced with `.` for display.
    pub fn read_string(&self, target: &Target, string_ref: &StringRef) -> String {
        let len = (string_ref.length as usize).min(256);
        let mut buffer = vec![0u8; len];
        if target.read(string_ref.address, &mut buffer).is_err() {
            return "??".to_string();
        }
        buffer
            .iter()
            .map(|&b| if b < 0x20 && b != 0x09 { '.' } else { b as char })
            .collect()
    }
}

impl Default for StringsAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StringsAnalyzer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn worker(target: Arc<Target>, config: StringScanConfig, state: Arc<SharedState>) {
    let regions = match target.regions() {
        Ok(r) => r,
        Err(_) => {
            state.scanning.store(false, Ordering::Release);
            return;
        }
    };

    let regions: Vec<_> = regions
        .into_iter()
        .filter(|r| r.perms.r && (config.scan_executable || !r.perms.x))
        .collect();

    let total_bytes: u64 = regions.iter().map(|r| r.size).sum();
    let mut bytes_processed: u64 = 0;
    let mut local_results = Vec::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    'regions: for region in &regions {
        if state.cancel_requested.load(Ordering::Acquire) {
            break;
        }

        let mut current = region.base;
        let mut remaining = region.size;

        // run state persists across chunk reads within this region, so a
        // string straddling a chunk boundary is not split in two.
        let mut in_run = false;
        let mut run_start_addr = 0u64;

        while remaining > 0 {
            if state.cancel_requested.load(Ordering::Acquire) {
                break 'regions;
            }
            let read_size = remaining.min(CHUNK_SIZE as u64) as usize;
            let view = &mut buffer[..read_size];

            if target.read(current, view).is_ok() {
                for (i, &byte) in view.iter().enumerate() {
                    let addr = current + i as u64;
                    let printable = is_printable(byte);

                    if in_run {
                        if !printable {
                            let len = addr - run_start_addr;
                            if len as usize >= config.min_length {
                                local_results.push(StringRef { address: run_start_addr, length: len as u32 });
                            }
                            in_run = false;
                        }
                    } else if printable {
                        in_run = true;
                        run_start_addr = addr;
                    }
                }
            } else {
                log::warn!("strings scan read failed at 0x{current:x}, skipping chunk");
                in_run = false;
            }

            current += read_size as u64;
            remaining -= read_size as u64;
            bytes_processed += read_size as u64;

            if total_bytes > 0 {
                state.set_progress(bytes_processed as f32 / total_bytes as f32);
            }
        }

        if in_run {
            let len = current - run_start_addr;
            if len as usize >= config.min_length {
                local_results.push(StringRef { address: run_start_addr, length: len as u32 });
            }
        }
    }

    if state.cancel_requested.load(Ordering::Acquire) {
        log::debug!("strings scan cancelled, discarding partial results");
        state.scanning.store(false, Ordering::Release);
        return;
    }

    local_results.sort_by_key(|r| r.address);
    *state.results.write() = local_results;
    state.scanning.store(false, Ordering::Release);
    state.set_progress(1.0);
}
