//! Live-process target: owns a platform controller and at most one
//! attached pid.

use crate::error::{RavelError, RavelResult};
use crate::platform::ProcessController;
use crate::process_info::{MemoryRegion, ProcessInfo};

pub struct LiveTarget {
    controller: Box<dyn ProcessController>,
    attached_pid: Option<u32>,
}

impl LiveTarget {
    pub fn new(controller: Box<dyn ProcessController>) -> Self {
        Self { controller, attached_pid: None }
    }

    pub fn enumerate_processes(&self) -> RavelResult<Vec<ProcessInfo>> {
        self.controller.enumerate_processes()
    }

    pub fn attach(&mut self, pid: u32) -> RavelResult<()> {
        self.controller.attach(pid)?;
        self.attached_pid = Some(pid);
        Ok(())
    }

    pub fn detach(&mut self) {
        if let Some(pid) = self.attached_pid.take() {
            self.controller.detach(pid);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached_pid.is_some()
    }

    pub fn attached_pid(&self) -> Option<u32> {
        self.attached_pid
    }

    pub fn read(&self, addr: u64, buf: &mut [u8]) -> RavelResult<()> {
        let pid = self.attached_pid.ok_or(RavelError::ProcessNotFound)?;
        self.controller.read(pid, addr, buf)
    }

    pub fn write(&self, addr: u64, buf: &[u8]) -> RavelResult<()> {
        let pid = self.attached_pid.ok_or(RavelError::ProcessNotFound)?;
        self.controller.write(pid, addr, buf)
    }

    pub fn regions(&self) -> RavelResult<Vec<MemoryRegion>> {
        let pid = self.attached_pid.ok_or(RavelError::ProcessNotFound)?;
        self.controller.regions(pid)
    }

    pub fn name(&self) -> String {
        match self.attached_pid {
            Some(pid) => format!("pid {pid}"),
            None => "<unattached>".to_string(),
        }
    }

    pub fn entry_point(&self) -> Option<u64> {
        None
    }
}
