//! Linux backend for the platform controller: `/proc` enumeration,
//! `/proc/[pid]/maps` parsing, and `process_vm_readv`/`process_vm_writev`
//! for remote memory access.
//!
//! The maps parser below is a direct generalization of `elk`'s
//! `procfs::mappings` nom combinators (originally written against
//! `delf::Addr`) to plain `u64` addresses and ravel's own `MemoryRegion`.

use std::ffi::c_void;
use std::fs;
use std::io;

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    combinator::{map, opt},
    multi::many0,
    sequence::{preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::error::{RavelError, RavelResult};
use crate::process_info::{MemoryRegion, Perms, ProcessInfo};

use super::ProcessController;

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn whitespace(i: &str) -> IResult<&str, &str> {
    take_while(|c: char| c == ' ' || c == '\t')(i)
}

fn spaced<'a, O>(
    mut f: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    move |i: &'a str| {
        let (i, _) = whitespace(i)?;
        let (i, o) = f(i)?;
        let (i, _) = whitespace(i)?;
        Ok((i, o))
    }
}

fn hex_addr(i: &str) -> IResult<&str, u64> {
    let (i, num) = take_while1(is_hex_digit)(i)?;
    let v = u64::from_str_radix(num, 16).unwrap_or(0);
    Ok((i, v))
}

fn hex_addr_range(i: &str) -> IResult<&str, (u64, u64)> {
    separated_pair(hex_addr, tag("-"), hex_addr)(i)
}

fn perms(i: &str) -> IResult<&str, Perms> {
    fn bit(c: char) -> impl Fn(&str) -> IResult<&str, bool> {
        move |i: &str| {
            if let Some(rest) = i.strip_prefix(c) {
                Ok((rest, true))
            } else if let Some(rest) = i.strip_prefix('-') {
                Ok((rest, false))
            } else {
                Err(nom::Err::Error(nom::error::Error::new(i, nom::error::ErrorKind::Tag)))
            }
        }
    }
    // the fourth bit is shared/private (`s`/`p`); we don't surface it.
    fn any_char(i: &str) -> IResult<&str, char> {
        let mut chars = i.chars();
        match chars.next() {
            Some(c) => Ok((&i[c.len_utf8()..], c)),
            None => Err(nom::Err::Error(nom::error::Error::new(i, nom::error::ErrorKind::Eof))),
        }
    }
    let (i, (r, w, x, _shared)) = tuple((bit('r'), bit('w'), bit('x'), any_char))(i)?;
    Ok((i, Perms { r, w, x }))
}

fn dec_number(i: &str) -> IResult<&str, u64> {
    let (i, s) = take_while1(|c: char| c.is_ascii_digit())(i)?;
    Ok((i, s.parse().unwrap_or(0)))
}

fn hex_number(i: &str) -> IResult<&str, u64> {
    let (i, s) = take_while1(|c: char| c.is_ascii_hexdigit())(i)?;
    Ok((i, u64::from_str_radix(s, 16).unwrap_or(0)))
}

fn dev(i: &str) -> IResult<&str, (u64, u64)> {
    separated_pair(hex_number, tag(":"), hex_number)(i)
}

fn path_like(i: &str) -> IResult<&str, &str> {
    take_while(|c: char| c != '\n')(i)
}

struct ParsedMapping<'a> {
    start: u64,
    end: u64,
    perms: Perms,
    name: Option<&'a str>,
}

fn mapping(i: &str) -> IResult<&str, ParsedMapping<'_>> {
    let (i, ((start, end), perms, _offset, _dev, _len, name)) = tuple((
        spaced(hex_addr_range),
        spaced(perms),
        spaced(hex_addr),
        spaced(dev),
        spaced(dec_number),
        map(opt(preceded(whitespace, path_like)), |s: Option<&str>| {
            s.filter(|s| !s.is_empty())
        }),
    ))(i)?;
    Ok((i, ParsedMapping { start, end, perms, name }))
}

fn mappings(i: &str) -> IResult<&str, Vec<ParsedMapping<'_>>> {
    many0(terminated(mapping, opt(tag("\n"))))(i)
}

fn parse_maps(contents: &str) -> Vec<MemoryRegion> {
    let (_, parsed) = mappings(contents).unwrap_or(("", Vec::new()));
    parsed
        .into_iter()
        .map(|m| MemoryRegion {
            base: m.start,
            size: m.end - m.start,
            perms: m.perms,
            name: m.name.map(str::to_string).unwrap_or_else(|| "<anonymous>".to_string()),
        })
        .collect()
}

pub struct LinuxController {
    mem_fd: Option<std::fs::File>,
}

impl LinuxController {
    pub fn new() -> Self {
        Self { mem_fd: None }
    }
}

impl Default for LinuxController {
    fn default() -> Self {
        Self::new()
    }
}

fn errno_to_attach_error(err: &io::Error) -> RavelError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => RavelError::PermissionDenied,
        io::ErrorKind::NotFound => RavelError::ProcessNotFound,
        _ => RavelError::ProcFsUnavailable,
    }
}

fn errno_to_rw_error(errno: i32, on_write: bool) -> RavelError {
    match errno {
        libc::EPERM | libc::EACCES => RavelError::PermissionDenied,
        libc::ESRCH => RavelError::ProcessNotFound,
        libc::EFAULT => RavelError::InvalidAddress,
        libc::ENOMEM => RavelError::OutOfMemory,
        _ => {
            if on_write {
                RavelError::WriteFailed
            } else {
                RavelError::ReadFailed
            }
        }
    }
}

impl ProcessController for LinuxController {
    fn enumerate_processes(&self) -> RavelResult<Vec<ProcessInfo>> {
        let entries = fs::read_dir("/proc").map_err(|_| RavelError::ProcFsUnavailable)?;
        let mut processes = Vec::new();

        for entry in entries.flatten() {
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };

            let short_name = fs::read_to_string(format!("/proc/{pid}/comm"))
                .map(|s| s.trim_end().to_string())
                .unwrap_or_else(|_| "<unknown>".to_string());

            let executable_path = match fs::read_link(format!("/proc/{pid}/exe")) {
                Ok(target) => target.to_string_lossy().into_owned(),
                Err(_) => match fs::read(format!("/proc/{pid}/cmdline")) {
                    Ok(bytes) if !bytes.is_empty() => bytes
                        .split(|&b| b == 0)
                        .next()
                        .map(|s| String::from_utf8_lossy(s).into_owned())
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| format!("[{short_name}]")),
                    _ => format!("[{short_name}]"),
                },
            };

            processes.push(ProcessInfo { pid, short_name, executable_path });
        }

        processes.sort_by_key(|p| p.pid);
        Ok(processes)
    }

    fn attach(&mut self, pid: u32) -> RavelResult<()> {
        self.mem_fd = None;
        let file = fs::OpenOptions::new()
            .read(true)
            .open(format!("/proc/{pid}/mem"))
            .map_err(|e| errno_to_attach_error(&e))?;
        self.mem_fd = Some(file);
        Ok(())
    }

    fn detach(&mut self, _pid: u32) {
        self.mem_fd = None;
    }

    fn regions(&self, pid: u32) -> RavelResult<Vec<MemoryRegion>> {
        let contents =
            fs::read_to_string(format!("/proc/{pid}/maps")).map_err(|_| RavelError::PermissionDenied)?;
        Ok(parse_maps(&contents))
    }

    fn read(&self, pid: u32, addr: u64, buf: &mut [u8]) -> RavelResult<()> {
        if pid == 0 {
            return Err(RavelError::ProcessNotFound);
        }

        let local_iov = libc::iovec { iov_base: buf.as_mut_ptr() as *mut c_void, iov_len: buf.len() };
        let remote_iov = libc::iovec { iov_base: addr as *mut c_void, iov_len: buf.len() };

        let bytes_read = unsafe { libc::process_vm_readv(pid as libc::pid_t, &local_iov, 1, &remote_iov, 1, 0) };

        if bytes_read == -1 {
            return Err(errno_to_rw_error(io::Error::last_os_error().raw_os_error().unwrap_or(0), false));
        }
        if bytes_read as usize != buf.len() {
            return Err(RavelError::PartialRead);
        }
        Ok(())
    }

    fn write(&self, pid: u32, addr: u64, buf: &[u8]) -> RavelResult<()> {
        if pid == 0 {
            return Err(RavelError::ProcessNotFound);
        }

        let local_iov = libc::iovec { iov_base: buf.as_ptr() as *mut c_void, iov_len: buf.len() };
        let remote_iov = libc::iovec { iov_base: addr as *mut c_void, iov_len: buf.len() };

        let bytes_written = unsafe { libc::process_vm_writev(pid as libc::pid_t, &local_iov, 1, &remote_iov, 1, 0) };

        if bytes_written == -1 {
            return Err(errno_to_rw_error(io::Error::last_os_error().raw_os_error().unwrap_or(0), true));
        }
        if bytes_written as usize != buf.len() {
            return Err(RavelError::PartialRead);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_maps_line() {
        let sample = "555555554000-555555556000 r-xp 00000000 08:01 1234  /usr/bin/cat\n\
                       7ffff7fc0000-7ffff7fe2000 rw-p 00000000 00:00 0 \n";
        let regions = parse_maps(sample);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].base, 0x555555554000);
        assert_eq!(regions[0].size, 0x2000);
        assert_eq!(regions[0].perms.as_str(), "r-x");
        assert_eq!(regions[0].name, "/usr/bin/cat");
        assert_eq!(regions[1].name, "<anonymous>");
    }
}
