//! Platform controllers: OS-specific process enumeration, attach/detach,
//! memory region listing, and memory read/write (spec §4.1, component C2).

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(windows)]
pub mod windows;

use crate::error::RavelResult;
use crate::process_info::{MemoryRegion, ProcessInfo};

/// At most one pid is attached per controller instance; `attach` on a new
/// pid implicitly detaches the previous one.
pub trait ProcessController: Send + Sync {
    fn enumerate_processes(&self) -> RavelResult<Vec<ProcessInfo>>;
    fn attach(&mut self, pid: u32) -> RavelResult<()>;
    fn detach(&mut self, pid: u32);
    fn regions(&self, pid: u32) -> RavelResult<Vec<MemoryRegion>>;
    fn read(&self, pid: u32, addr: u64, buf: &mut [u8]) -> RavelResult<()>;
    fn write(&self, pid: u32, addr: u64, buf: &[u8]) -> RavelResult<()>;
}

/// The platform controller compiled in for the current target OS.
#[cfg(target_os = "linux")]
pub fn current() -> impl ProcessController {
    linux::LinuxController::new()
}

#[cfg(windows)]
pub fn current() -> impl ProcessController {
    windows::WindowsController::new()
}
