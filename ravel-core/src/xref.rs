//! Cross-reference engine (spec §4.6, component C8): decodes every
//! executable region, extracts data-referencing memory operands, and
//! groups them into addressable items with back-references. Grounded on
//! `original_source/ui/views/xref_view.cpp`'s `scan_task`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use iced_x86::Mnemonic;
use parking_lot::RwLock;

use crate::disasm::{Disassembler, OperandWidth};
use crate::process_info::MemoryRegion;
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    Read,
    Write,
    AddressOf,
}

impl XrefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            XrefKind::Read => "r",
            XrefKind::Write => "w",
            XrefKind::AddressOf => "o",
        }
    }
}

#[derive(Debug, Clone)]
pub struct XrefRef {
    pub site_ip: u64,
    pub instruction_text: String,
    pub kind: XrefKind,
}

#[derive(Debug, Clone)]
pub struct XrefItem {
    pub address: u64,
    pub name: String,
    pub default_value_def: String,
    pub refs: Vec<XrefRef>,
}

fn make_name(addr: u64, width: OperandWidth) -> String {
    format!("{}_{:X}", width.name_prefix(), addr)
}

struct SharedState {
    items: RwLock<Vec<XrefItem>>,
    scanning: AtomicBool,
    cancel_requested: AtomicBool,
    progress_bits: AtomicU32,
}

impl SharedState {
    fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
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

pub struct XrefEngine {
    state: Arc<SharedState>,
    worker: Option<JoinHandle<()>>,
}

const CHUNK_SIZE: usize = 1024 * 1024;

impl XrefEngine {
    pub fn new() -> Self {
        Self { state: Arc::new(SharedState::new()), worker: None }
    }

    pub fn start_scan(&mut self, target: Arc<Target>) {
        self.cancel();

        {
            let mut items = self.state.items.write();
            items.clear();
        }
        self.state.cancel_requested.store(false, Ordering::Release);
        self.state.set_progress(0.0);
        self.state.scanning.store(true, Ordering::Release);

        let state = self.state.clone();
        self.worker = Some(std::thread::spawn(move || worker(target, state)));
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

    pub fn is_scanning(&self) -> bool {
        self.state.scanning.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> f32 {
        self.state.progress()
    }

    pub fn items(&self) -> parking_lot::RwLockReadGuard<'_, Vec<XrefItem>> {
        self.state.items.read()
    }
}

impl Default for XrefEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for XrefEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn worker(target: Arc<Target>, state: Arc<SharedState>) {
    let regions = match target.regions() {
        Ok(r) => r,
        Err(_) => {
            state.scanning.store(false, Ordering::Release);
            return;
        }
    };

    let code_regions: Vec<MemoryRegion> = regions.iter().filter(|r| r.perms.x).cloned().collect();
    let data_regions: Vec<MemoryRegion> = regions.iter().filter(|r| r.perms.r && !r.perms.x).cloned().collect();
    let total_code_size: u64 = code_regions.iter().map(|r| r.size).sum();

    let mut result_map: BTreeMap<u64, XrefItem> = BTreeMap::new();
    let mut dis = Disassembler::new();
    let mut buffer: Vec<u8> = Vec::new();
    let mut processed: u64 = 0;

    'regions: for region in &code_regions {
        if state.cancel_requested.load(Ordering::Acquire) {
            break;
        }

        buffer.resize(CHUNK_SIZE.min(region.size as usize).max(16), 0);
        let mut offset: u64 = 0;

        while offset < region.size {
            if state.cancel_requested.load(Ordering::Acquire) {
                break 'regions;
            }

            let chunk = (region.size - offset).min(buffer.len() as u64) as usize;
            if target.read(region.base + offset, &mut buffer[..chunk]).is_err() {
                offset += chunk as u64;
                continue;
            }

            let mut chunk_offset: usize = 0;
            while chunk_offset < chunk {
                if chunk_offset.is_multiple_of(2048) && total_code_size > 0 {
                    state.set_progress((processed + offset + chunk_offset as u64) as f32 / total_code_size as f32);
                }

                let ip = region.base + offset + chunk_offset as u64;
                let Some((decoded, text)) = dis.format(&buffer[chunk_offset..chunk], ip) else {
                    chunk_offset += 1;
                    continue;
                };

                for op_index in 0..decoded.operand_count_visible() {
                    let Some(target_addr) = decoded.absolute_target(op_index) else { continue };

                    if !data_regions.iter().any(|d| d.contains(target_addr)) {
                        continue;
                    }

                    // LEA never accesses memory, so iced-x86 always reports its
                    // memory operand as MemorySize::Unknown; fall back to the
                    // destination register's width in that case.
                    let width = if decoded.mnemonic() == Mnemonic::Lea {
                        OperandWidth::from_bits(decoded.destination_register_size_bits())
                    } else {
                        OperandWidth::from_bits(decoded.memory_size_bits())
                    };
                    let item = result_map.entry(target_addr).or_insert_with(|| XrefItem {
                        address: target_addr,
                        name: make_name(target_addr, width),
                        default_value_def: width.default_value_def().to_string(),
                        refs: Vec::new(),
                    });

                    let kind = if decoded.mnemonic() == Mnemonic::Mov && op_index == 0 {
                        XrefKind::Write
                    } else if decoded.mnemonic() == Mnemonic::Lea {
                        XrefKind::AddressOf
                    } else {
                        XrefKind::Read
                    };

                    item.refs.push(XrefRef { site_ip: ip, instruction_text: text.clone(), kind });
                }

                chunk_offset += decoded.length() as usize;
            }

            offset += chunk as u64;
        }

        processed += region.size;
    }

    if state.cancel_requested.load(Ordering::Acquire) {
        log::debug!("xref scan cancelled, discarding partial results");
        state.scanning.store(false, Ordering::Release);
        return;
    }

    let items: Vec<XrefItem> = result_map.into_values().collect();
    *state.items.write() = items;
    state.scanning.store(false, Ordering::Release);
    state.set_progress(1.0);
}
