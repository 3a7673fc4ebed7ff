//! Process descriptor and memory region, the data model §3 of the spec.

use std::fmt;

/// A process the platform controller can see, whether or not it's attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub short_name: String,
    /// The resolved executable path, or a placeholder such as
    /// `[system process]`, `[access denied]`, or `[<short_name>]` when the
    /// OS denies us the real path.
    pub executable_path: String,
}

/// Three ASCII permission bits: read, write, execute. Each slot is either
/// the permission letter or `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Perms {
    pub r: bool,
    pub w: bool,
    pub x: bool,
}

impl Perms {
    pub const NONE: Perms = Perms { r: false, w: false, x: false };

    pub fn as_str(&self) -> String {
        let bit = |val: bool, c: char| if val { c } else { '-' };
        format!("{}{}{}", bit(self.r, 'r'), bit(self.w, 'w'), bit(self.x, 'x'))
    }
}

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A maximal contiguous range of virtual addresses with uniform permissions.
/// Regions returned from a target do not overlap and are ordered ascending
/// by `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: u64,
    pub size: u64,
    pub perms: Perms,
    pub name: String,
}

impl MemoryRegion {
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.base + self.size
    }

    pub fn end(&self) -> u64 {
        self.base + self.size
    }
}
