//! Target abstraction (spec §4, component C4): unifies a live process and
//! an on-disk file image behind one capability set.

mod file;
mod live;

pub use file::FileTarget;
pub use live::LiveTarget;

use crate::error::RavelResult;
use crate::process_info::MemoryRegion;

/// Either a loaded file image or a live (possibly unattached) process.
/// Modeled as a tagged enum rather than a trait object, per spec.md §9's
/// "capability set (a tagged variant with methods)" guidance.
pub enum Target {
    File(FileTarget),
    Live(LiveTarget),
}

impl Target {
    pub fn read(&self, addr: u64, buf: &mut [u8]) -> RavelResult<()> {
        match self {
            Target::File(t) => t.read(addr, buf),
            Target::Live(t) => t.read(addr, buf),
        }
    }

    /// Writes are rejected on file targets; live targets may fail with
    /// `permission-denied`.
    pub fn write(&self, addr: u64, buf: &[u8]) -> RavelResult<()> {
        match self {
            Target::File(t) => t.write(addr, buf),
            Target::Live(t) => t.write(addr, buf),
        }
    }

    pub fn regions(&self) -> RavelResult<Vec<MemoryRegion>> {
        match self {
            Target::File(t) => t.regions(),
            Target::Live(t) => t.regions(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Target::Live(_))
    }

    pub fn name(&self) -> String {
        match self {
            Target::File(t) => t.name(),
            Target::Live(t) => t.name(),
        }
    }

    pub fn entry_point(&self) -> Option<u64> {
        match self {
            Target::File(t) => t.entry_point(),
            Target::Live(t) => t.entry_point(),
        }
    }
}
