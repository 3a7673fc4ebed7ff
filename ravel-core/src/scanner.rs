//! Value scanner (spec §4.4, component C6): first-scan and refinement scan
//! over writable regions, typed, cancellable, progress-reporting.
//! Grounded on `original_source/core/scanner/scanner.cpp`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanDataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ScanDataType {
    pub fn size(&self) -> usize {
        match self {
            ScanDataType::U8 | ScanDataType::I8 => 1,
            ScanDataType::U16 | ScanDataType::I16 => 2,
            ScanDataType::U32 | ScanDataType::I32 | ScanDataType::F32 => 4,
            ScanDataType::U64 | ScanDataType::I64 | ScanDataType::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareType {
    Exact,
    Greater,
    Less,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub data_type: ScanDataType,
    pub compare: CompareType,
    pub value_literal: String,
    pub fast_scan: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            data_type: ScanDataType::I32,
            compare: CompareType::Exact,
            value_literal: String::new(),
            fast_scan: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub address: u64,
    pub snapshot: Vec<u8>,
}

/// UI-level validation failure for the scanner's write helper. Not part of
/// the closed core error taxonomy: this is a literal-parsing failure, not a
/// target operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidValue;

/// Parses `text` into `sizeof(data_type)` little-endian bytes, the same way
/// a first-scan literal or a write-helper literal is parsed. `0x`/`0X`
/// prefixes select hex for integers; floats use the standard literal
/// reader. `u8`/`i8` are parsed through the full integer range and
/// truncated, per spec.md §9's Open Questions.
pub fn parse_input(text: &str, data_type: ScanDataType) -> Option<Vec<u8>> {
    let text = text.trim();

    match data_type {
        ScanDataType::F32 => text.parse::<f32>().ok().map(|v| v.to_le_bytes().to_vec()),
        ScanDataType::F64 => text.parse::<f64>().ok().map(|v| v.to_le_bytes().to_vec()),
        ScanDataType::U8 | ScanDataType::I8 => {
            let v = parse_int_literal(text)?;
            Some(vec![v as u8])
        }
        _ => {
            let v = parse_int_literal(text)?;
            let bytes = v.to_le_bytes();
            Some(bytes[..data_type.size()].to_vec())
        }
    }
}

fn parse_int_literal(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok().or_else(|| u64::from_str_radix(hex, 16).ok().map(|v| v as i64))
    } else {
        text.parse::<i64>().ok().or_else(|| text.parse::<u64>().ok().map(|v| v as i64))
    }
}

pub fn format_value(data: &[u8], data_type: ScanDataType) -> String {
    if data.len() < data_type.size() {
        return "?".to_string();
    }
    match data_type {
        ScanDataType::I8 => format!("{}", data[0] as i8),
        ScanDataType::U8 => format!("{}", data[0]),
        ScanDataType::I16 => format!("{}", i16::from_le_bytes([data[0], data[1]])),
        ScanDataType::U16 => format!("{}", u16::from_le_bytes([data[0], data[1]])),
        ScanDataType::I32 => format!("{}", i32::from_le_bytes(data[0..4].try_into().unwrap())),
        ScanDataType::U32 => format!("{}", u32::from_le_bytes(data[0..4].try_into().unwrap())),
        ScanDataType::I64 => format!("{}", i64::from_le_bytes(data[0..8].try_into().unwrap())),
        ScanDataType::U64 => format!("{}", u64::from_le_bytes(data[0..8].try_into().unwrap())),
        ScanDataType::F32 => format!("{:.3}", f32::from_le_bytes(data[0..4].try_into().unwrap())),
        ScanDataType::F64 => format!("{:.6}", f64::from_le_bytes(data[0..8].try_into().unwrap())),
    }
}

fn compare<T: PartialOrd>(lhs: T, rhs: T, compare: CompareType) -> bool {
    match compare {
        CompareType::Exact => lhs == rhs,
        CompareType::Greater => lhs > rhs,
        CompareType::Less => lhs < rhs,
    }
}

/// Dispatches on a runtime `ScanDataType`, decoding both `$lhs`/`$rhs` byte
/// slices as the *same* concrete type in every arm, then evaluates `$body`
/// with that single type bound twice (as `$l` and `$r`).
macro_rules! dispatch_scan_type {
    ($data_type:expr, $lhs:expr, $rhs:expr, |$l:ident, $r:ident: $ty:ty| $body:block) => {
        match $data_type {
            ScanDataType::U8 => {
                let $l: u8 = $lhs[0];
                let $r: u8 = $rhs[0];
                $body
            }
            ScanDataType::I8 => {
                let $l: i8 = $lhs[0] as i8;
                let $r: i8 = $rhs[0] as i8;
                $body
            }
            ScanDataType::U16 => {
                let $l: u16 = u16::from_le_bytes([$lhs[0], $lhs[1]]);
                let $r: u16 = u16::from_le_bytes([$rhs[0], $rhs[1]]);
                $body
            }
            ScanDataType::I16 => {
                let $l: i16 = i16::from_le_bytes([$lhs[0], $lhs[1]]);
                let $r: i16 = i16::from_le_bytes([$rhs[0], $rhs[1]]);
                $body
            }
            ScanDataType::U32 => {
                let $l: u32 = u32::from_le_bytes($lhs[0..4].try_into().unwrap());
                let $r: u32 = u32::from_le_bytes($rhs[0..4].try_into().unwrap());
                $body
            }
            ScanDataType::I32 => {
                let $l: i32 = i32::from_le_bytes($lhs[0..4].try_into().unwrap());
                let $r: i32 = i32::from_le_bytes($rhs[0..4].try_into().unwrap());
                $body
            }
            ScanDataType::U64 => {
                let $l: u64 = u64::from_le_bytes($lhs[0..8].try_into().unwrap());
                let $r: u64 = u64::from_le_bytes($rhs[0..8].try_into().unwrap());
                $body
            }
            ScanDataType::I64 => {
                let $l: i64 = i64::from_le_bytes($lhs[0..8].try_into().unwrap());
                let $r: i64 = i64::from_le_bytes($rhs[0..8].try_into().unwrap());
                $body
            }
            ScanDataType::F32 => {
                let $l: f32 = f32::from_le_bytes($lhs[0..4].try_into().unwrap());
                let $r: f32 = f32::from_le_bytes($rhs[0..4].try_into().unwrap());
                $body
            }
            ScanDataType::F64 => {
                let $l: f64 = f64::from_le_bytes($lhs[0..8].try_into().unwrap());
                let $r: f64 = f64::from_le_bytes($rhs[0..8].try_into().unwrap());
                $body
            }
        }
    };
}

fn scan_region_into(
    base: u64,
    buffer: &[u8],
    data_type: ScanDataType,
    target_bytes: &[u8],
    compare_ty: CompareType,
    align: usize,
    out: &mut Vec<ScanResult>,
) {
    let elem_size = data_type.size();
    if buffer.len() < elem_size {
        return;
    }

    let mut offset = 0usize;
    while offset + elem_size <= buffer.len() {
        let window = &buffer[offset..offset + elem_size];
        let is_match = dispatch_scan_type!(data_type, window, target_bytes, |val, target: T| {
            compare(val, target, compare_ty)
        });
        if is_match {
            out.push(ScanResult { address: base + offset as u64, snapshot: window.to_vec() });
        }
        offset += align;
    }
}

struct SharedState {
    results: RwLock<Vec<ScanResult>>,
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

/// Scans a single target, one scan at a time. Starting a new scan cancels
/// and joins the prior one (spec.md §4.4/§5).
pub struct Scanner {
    target: Arc<RwLock<Option<Arc<Target>>>>,
    state: Arc<SharedState>,
    worker: Option<JoinHandle<()>>,
}

impl Scanner {
    pub fn new() -> Self {
        Self { target: Arc::new(RwLock::new(None)), state: Arc::new(SharedState::new()), worker: None }
    }

    pub fn set_target(&mut self, target: Option<Arc<Target>>) {
        self.reset();
        *self.target.write() = target;
    }

    pub fn lock_results(&self) -> RwLockReadGuard<'_, Vec<ScanResult>> {
        self.state.results.read()
    }

    pub fn progress(&self) -> f32 {
        self.state.progress()
    }

    pub fn is_scanning(&self) -> bool {
        self.state.scanning.load(Ordering::Acquire)
    }

    pub fn result_count(&self) -> usize {
        self.state.results.read().len()
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

    pub fn reset(&mut self) {
        self.cancel();
        self.state.results.write().clear();
    }

    pub fn begin_first_scan(&mut self, config: ScanConfig) {
        self.cancel();
        let Some(target) = self.target.read().clone() else { return };

        self.state.cancel_requested.store(false, Ordering::Release);
        self.state.set_progress(0.0);
        self.state.scanning.store(true, Ordering::Release);

        let state = self.state.clone();
        self.worker = Some(std::thread::spawn(move || {
            worker_scan_first(target, config, state);
        }));
    }

    pub fn begin_refine_scan(&mut self, config: ScanConfig) {
        if self.state.results.read().is_empty() {
            return;
        }
        self.cancel();
        let Some(target) = self.target.read().clone() else { return };

        self.state.cancel_requested.store(false, Ordering::Release);
        self.state.set_progress(0.0);
        self.state.scanning.store(true, Ordering::Release);

        let state = self.state.clone();
        self.worker = Some(std::thread::spawn(move || {
            worker_scan_refine(target, config, state);
        }));
    }

    /// Writes `value_literal` (parsed exactly as a first-scan input) to
    /// `address` on the active target.
    pub fn write_value(&self, address: u64, data_type: ScanDataType, value_literal: &str) -> Result<(), InvalidValue> {
        let bytes = parse_input(value_literal, data_type).ok_or(InvalidValue)?;
        let target = self.target.read().clone();
        match target {
            Some(target) => target.write(address, &bytes).map_err(|_| InvalidValue),
            None => Err(InvalidValue),
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.cancel();
    }
}

const CHUNK_SIZE: usize = 1024 * 1024;

fn worker_scan_first(target: Arc<Target>, config: ScanConfig, state: Arc<SharedState>) {
    let regions = match target.regions() {
        Ok(r) => r,
        Err(_) => {
            state.scanning.store(false, Ordering::Release);
            return;
        }
    };
    let writable: Vec<_> = regions.into_iter().filter(|r| r.perms.w).collect();
    let total_bytes: u64 = writable.iter().map(|r| r.size).sum();

    let Some(target_bytes) = parse_input(&config.value_literal, config.data_type) else {
        log::debug!("scan literal {:?} failed to parse; yielding zero results", config.value_literal);
        state.scanning.store(false, Ordering::Release);
        state.set_progress(1.0);
        return;
    };

    let align = if config.fast_scan { config.data_type.size() } else { 1 };
    let mut local_results = Vec::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut bytes_scanned: u64 = 0;

    'regions: for region in &writable {
        if state.cancel_requested.load(Ordering::Acquire) {
            break;
        }

        let mut current = region.base;
        let mut remaining = region.size;

        while remaining > 0 {
            if state.cancel_requested.load(Ordering::Acquire) {
                break 'regions;
            }
            let read_size = remaining.min(CHUNK_SIZE as u64) as usize;
            let view = &mut buffer[..read_size];

            if target.read(current, view).is_ok() {
                scan_region_into(current, view, config.data_type, &target_bytes, config.compare, align, &mut local_results);
            } else {
                log::warn!("scan read failed at 0x{current:x}, skipping region chunk");
            }

            current += read_size as u64;
            remaining -= read_size as u64;
            bytes_scanned += read_size as u64;

            if total_bytes > 0 {
                state.set_progress(bytes_scanned as f32 / total_bytes as f32);
            }
        }
    }

    if state.cancel_requested.load(Ordering::Acquire) {
        log::debug!("first scan cancelled, discarding partial results");
        state.scanning.store(false, Ordering::Release);
        return;
    }

    local_results.sort_by_key(|r| r.address);
    *state.results.write() = local_results;
    state.scanning.store(false, Ordering::Release);
    state.set_progress(1.0);
}

fn worker_scan_refine(target: Arc<Target>, config: ScanConfig, state: Arc<SharedState>) {
    let Some(target_bytes) = parse_input(&config.value_literal, config.data_type) else {
        state.scanning.store(false, Ordering::Release);
        return;
    };

    let prior = state.results.read().clone();
    let total = prior.len();
    let elem_size = config.data_type.size();
    let mut next_results = Vec::with_capacity(prior.len());
    let mut buf = vec![0u8; elem_size];

    for (processed, entry) in prior.iter().enumerate() {
        if state.cancel_requested.load(Ordering::Acquire) {
            log::debug!("refine scan cancelled, discarding partial results");
            state.scanning.store(false, Ordering::Release);
            return;
        }

        if processed % 1000 == 0 && total > 0 {
            state.set_progress(processed as f32 / total as f32);
        }

        if target.read(entry.address, &mut buf).is_ok() {
            let is_match = dispatch_scan_type!(config.data_type, buf, target_bytes, |val, t: T| {
                compare(val, t, config.compare)
            });
            if is_match {
                next_results.push(ScanResult { address: entry.address, snapshot: buf.clone() });
            }
        }
    }

    next_results.sort_by_key(|r| r.address);
    *state.results.write() = next_results;
    state.scanning.store(false, Ordering::Release);
    state.set_progress(1.0);
}
