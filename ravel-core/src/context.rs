//! Process-wide context (spec §4, component C9): holds the current target
//! and the scanners consumed by the UI/CLI, and guarantees that replacing
//! the target cancels and joins every background scan that referenced it
//! first (spec.md §3 Lifecycle, §5 Shared Resources).

use std::sync::Arc;

use crate::error::RavelResult;
use crate::platform;
use crate::process_info::ProcessInfo;
use crate::scanner::Scanner;
use crate::strings::StringsAnalyzer;
use crate::target::{FileTarget, LiveTarget, Target};
use crate::xref::XrefEngine;

pub struct RavelContext {
    target: Option<Arc<Target>>,
    pub scanner: Scanner,
    pub strings: StringsAnalyzer,
    pub xref: XrefEngine,
}

impl RavelContext {
    pub fn new() -> Self {
        Self { target: None, scanner: Scanner::new(), strings: StringsAnalyzer::new(), xref: XrefEngine::new() }
    }

    /// Replaces the active target, cancelling and joining every background
    /// scan belonging to the prior target first, then re-wiring the scanner
    /// onto the new one (strings/xref take their target per-scan, so they
    /// need no re-wiring beyond the cancel).
    pub fn set_target(&mut self, target: Target) {
        let target = Arc::new(target);
        self.scanner.set_target(Some(target.clone()));
        self.strings.cancel();
        self.xref.cancel();
        self.target = Some(target);
    }

    pub fn open_file(&mut self, path: impl AsRef<std::path::Path>) -> RavelResult<()> {
        let target = Target::File(FileTarget::open(path)?);
        self.set_target(target);
        Ok(())
    }

    pub fn open_live(&mut self) {
        let controller = Box::new(platform::current());
        let target = Target::Live(LiveTarget::new(controller));
        self.set_target(target);
    }

    pub fn active_target(&self) -> Option<&Arc<Target>> {
        self.target.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.is_live())
    }

    pub fn name(&self) -> String {
        self.target.as_ref().map(|t| t.name()).unwrap_or_else(|| "<no target>".to_string())
    }

    pub fn entry_point(&self) -> Option<u64> {
        self.target.as_ref().and_then(|t| t.entry_point())
    }

    pub fn read(&self, addr: u64, out: &mut [u8]) -> RavelResult<()> {
        let target = self.target.as_ref().ok_or(crate::error::RavelError::ProcessNotFound)?;
        target.read(addr, out)
    }

    pub fn write(&self, addr: u64, data: &[u8]) -> RavelResult<()> {
        let target = self.target.as_ref().ok_or(crate::error::RavelError::ProcessNotFound)?;
        target.write(addr, data)
    }

    pub fn regions(&self) -> RavelResult<Vec<crate::process_info::MemoryRegion>> {
        let target = self.target.as_ref().ok_or(crate::error::RavelError::ProcessNotFound)?;
        target.regions()
    }

    /// Live-process-only: only meaningful once `open_live` was called.
    pub fn enumerate_processes(&self) -> RavelResult<Vec<ProcessInfo>> {
        match self.target.as_deref() {
            Some(Target::Live(live)) => live.enumerate_processes(),
            _ => Err(crate::error::RavelError::ProcFsUnavailable),
        }
    }

    pub fn attach(&mut self, pid: u32) -> RavelResult<()> {
        // Drop the scanner's clone of the target Arc first: attach mutates
        // the target in place via Arc::get_mut, which needs a unique Arc.
        self.scanner.set_target(None);
        self.strings.cancel();
        self.xref.cancel();

        let target_slot = self.target.as_mut().ok_or(crate::error::RavelError::ProcessNotFound)?;
        let result = match Arc::get_mut(target_slot)
            .expect("no background scan should still hold a target reference after cancel-and-join")
        {
            Target::Live(live) => live.attach(pid),
            Target::File(_) => Err(crate::error::RavelError::ProcessNotFound),
        };
        self.scanner.set_target(self.target.clone());
        result
    }

    pub fn detach(&mut self) {
        self.scanner.set_target(None);
        self.strings.cancel();
        self.xref.cancel();

        if let Some(Target::Live(live)) = self.target.as_mut().and_then(Arc::get_mut) {
            live.detach();
        }
        self.scanner.set_target(self.target.clone());
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.target.as_deref(), Some(Target::Live(live)) if live.is_attached())
    }

    pub fn attached_pid(&self) -> Option<u32> {
        match self.target.as_deref() {
            Some(Target::Live(live)) => live.attached_pid(),
            _ => None,
        }
    }
}

impl Default for RavelContext {
    fn default() -> Self {
        Self::new()
    }
}
