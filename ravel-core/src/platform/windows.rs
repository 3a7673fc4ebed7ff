//! Windows backend for the platform controller: toolhelp snapshot
//! enumeration, `VirtualQueryEx` region walking, and `ReadProcessMemory`/
//! `WriteProcessMemory`. Grounded on
//! `original_source/platform/windows_controller.cpp`.

use std::ffi::c_void;
use std::mem::size_of;

use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, MAX_PATH};
use windows_sys::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};
use windows_sys::Win32::System::Memory::{
    VirtualQueryEx, MEMORY_BASIC_INFORMATION, MEM_FREE, MEM_IMAGE, MEM_MAPPED, MEM_PRIVATE, PAGE_EXECUTE,
    PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_GUARD, PAGE_NOACCESS, PAGE_READONLY,
    PAGE_READWRITE, PAGE_WRITECOPY,
};
use windows_sys::Win32::System::ProcessStatus::{GetMappedFileNameW, GetModuleFileNameExW};
use windows_sys::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_OPERATION,
    PROCESS_VM_READ,
};

use crate::error::{RavelError, RavelResult};
use crate::process_info::{MemoryRegion, Perms, ProcessInfo};

use super::ProcessController;

fn last_error_to_read_error(win_err: u32) -> RavelError {
    const ERROR_ACCESS_DENIED: u32 = 5;
    const ERROR_INVALID_PARAMETER: u32 = 87;
    const ERROR_INVALID_HANDLE: u32 = 6;
    const ERROR_PARTIAL_COPY: u32 = 299;
    const ERROR_NOACCESS: u32 = 998;
    const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;

    match win_err {
        ERROR_ACCESS_DENIED => RavelError::PermissionDenied,
        ERROR_INVALID_PARAMETER | ERROR_INVALID_HANDLE => RavelError::ProcessNotFound,
        ERROR_PARTIAL_COPY => RavelError::PartialRead,
        ERROR_NOACCESS => RavelError::InvalidAddress,
        ERROR_NOT_ENOUGH_MEMORY => RavelError::OutOfMemory,
        _ => RavelError::ReadFailed,
    }
}

fn protect_to_perms(protect: u32) -> Perms {
    if protect & PAGE_NOACCESS != 0 {
        return Perms::NONE;
    }
    if protect & PAGE_GUARD != 0 {
        return Perms { r: true, w: false, x: false };
    }

    let readable = PAGE_READONLY | PAGE_READWRITE | PAGE_EXECUTE_READ | PAGE_EXECUTE_READWRITE | PAGE_WRITECOPY
        | PAGE_EXECUTE_WRITECOPY;
    let writable = PAGE_READWRITE | PAGE_WRITECOPY | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY;
    let executable = PAGE_EXECUTE | PAGE_EXECUTE_READ | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY;

    Perms { r: protect & readable != 0, w: protect & writable != 0, x: protect & executable != 0 }
}

fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                CloseHandle(self.0);
            }
        }
    }
}

pub struct WindowsController {
    process_handle: Option<OwnedHandle>,
}

impl WindowsController {
    pub fn new() -> Self {
        Self { process_handle: None }
    }
}

impl Default for WindowsController {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessController for WindowsController {
    fn enumerate_processes(&self) -> RavelResult<Vec<ProcessInfo>> {
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
        if snapshot.is_null() {
            return Err(RavelError::ProcFsUnavailable);
        }
        let snapshot = OwnedHandle(snapshot);

        let mut entry: PROCESSENTRY32W = unsafe { std::mem::zeroed() };
        entry.dwSize = size_of::<PROCESSENTRY32W>() as u32;

        let mut processes = Vec::new();
        if unsafe { Process32FirstW(snapshot.0, &mut entry) } == 0 {
            return Ok(processes);
        }

        loop {
            let pid = entry.th32ProcessID;
            let short_name = wide_to_string(&entry.szExeFile);

            let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
            let executable_path = if !handle.is_null() {
                let owned = OwnedHandle(handle);
                let mut path_buf = [0u16; MAX_PATH as usize];
                let len = unsafe {
                    GetModuleFileNameExW(owned.0, std::ptr::null_mut(), path_buf.as_mut_ptr(), path_buf.len() as u32)
                };
                if len > 0 {
                    wide_to_string(&path_buf[..len as usize])
                } else {
                    "[access denied]".to_string()
                }
            } else if pid == 0 || pid == 4 {
                "[system process]".to_string()
            } else {
                "[access denied]".to_string()
            };

            processes.push(ProcessInfo { pid, short_name, executable_path });

            if unsafe { Process32NextW(snapshot.0, &mut entry) } == 0 {
                break;
            }
        }

        processes.sort_by_key(|p| p.pid);
        Ok(processes)
    }

    fn attach(&mut self, pid: u32) -> RavelResult<()> {
        self.process_handle = None;
        let handle =
            unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ | PROCESS_VM_OPERATION, 0, pid) };
        if handle.is_null() {
            return Err(last_error_to_read_error(unsafe { windows_sys::Win32::Foundation::GetLastError() }));
        }
        self.process_handle = Some(OwnedHandle(handle));
        Ok(())
    }

    fn detach(&mut self, _pid: u32) {
        self.process_handle = None;
    }

    fn regions(&self, _pid: u32) -> RavelResult<Vec<MemoryRegion>> {
        let Some(handle) = self.process_handle.as_ref() else {
            return Err(RavelError::ProcessNotFound);
        };

        let mut regions = Vec::new();
        let mut current_address: usize = 0;

        loop {
            let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
            let written = unsafe {
                VirtualQueryEx(handle.0, current_address as *const c_void, &mut mbi, size_of::<MEMORY_BASIC_INFORMATION>())
            };
            if written != size_of::<MEMORY_BASIC_INFORMATION>() {
                break;
            }

            if mbi.State != MEM_FREE {
                let mut name_buf = [0u16; MAX_PATH as usize];
                let name_len =
                    unsafe { GetMappedFileNameW(handle.0, mbi.BaseAddress, name_buf.as_mut_ptr(), name_buf.len() as u32) };
                let name = if name_len > 0 {
                    wide_to_string(&name_buf[..name_len as usize])
                } else {
                    match mbi.Type {
                        MEM_IMAGE => "[image]".to_string(),
                        MEM_MAPPED => "[mapped]".to_string(),
                        MEM_PRIVATE => "[private]".to_string(),
                        _ => "<anonymous>".to_string(),
                    }
                };

                regions.push(MemoryRegion {
                    base: mbi.BaseAddress as u64,
                    size: mbi.RegionSize as u64,
                    perms: protect_to_perms(mbi.Protect),
                    name,
                });
            }

            let next = mbi.BaseAddress as usize + mbi.RegionSize;
            if next <= current_address {
                break;
            }
            current_address = next;
        }

        Ok(regions)
    }

    fn read(&self, _pid: u32, addr: u64, buf: &mut [u8]) -> RavelResult<()> {
        let Some(handle) = self.process_handle.as_ref() else {
            return Err(RavelError::ProcessNotFound);
        };

        let mut bytes_read: usize = 0;
        let ok = unsafe {
            ReadProcessMemory(handle.0, addr as *const c_void, buf.as_mut_ptr() as *mut c_void, buf.len(), &mut bytes_read)
        };
        if ok == 0 {
            return Err(last_error_to_read_error(unsafe { windows_sys::Win32::Foundation::GetLastError() }));
        }
        if bytes_read != buf.len() {
            return Err(RavelError::PartialRead);
        }
        Ok(())
    }

    fn write(&self, _pid: u32, addr: u64, buf: &[u8]) -> RavelResult<()> {
        let Some(handle) = self.process_handle.as_ref() else {
            return Err(RavelError::ProcessNotFound);
        };

        let mut bytes_written: usize = 0;
        let ok = unsafe {
            WriteProcessMemory(handle.0, addr as *mut c_void, buf.as_ptr() as *const c_void, buf.len(), &mut bytes_written)
        };
        if ok == 0 {
            return Err(last_error_to_read_error(unsafe { windows_sys::Win32::Foundation::GetLastError() }));
        }
        if bytes_written != buf.len() {
            return Err(RavelError::PartialRead);
        }
        Ok(())
    }
}

