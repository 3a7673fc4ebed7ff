//! File-backed target: owns the file's bytes in memory and a parser that
//! translates virtual addresses to file offsets. Grounded on
//! `original_source/core/file_target.cpp`.

use std::fs;
use std::path::Path;

use crate::error::{RavelError, RavelResult};
use crate::parsers::{elf::ElfParser, pe::PeParser, BinaryParser};
use crate::process_info::MemoryRegion;

pub struct FileTarget {
    data: Vec<u8>,
    parser: Box<dyn BinaryParser>,
}

impl FileTarget {
    pub fn open(path: impl AsRef<Path>) -> RavelResult<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|_| RavelError::ReadFailed)?;

        let parser: Box<dyn BinaryParser> = if let Ok(pe) = PeParser::parse(path, &data) {
            Box::new(pe)
        } else if let Ok(elf) = ElfParser::parse(path, &data) {
            Box::new(elf)
        } else {
            return Err(RavelError::ReadFailed);
        };

        Ok(Self { data, parser })
    }

    pub fn read(&self, addr: u64, buf: &mut [u8]) -> RavelResult<()> {
        let file_offset = self.parser.virtual_to_file_offset(addr).ok_or(RavelError::InvalidAddress)?;
        let file_offset = file_offset as usize;

        if file_offset >= self.data.len() {
            return Err(RavelError::InvalidAddress);
        }

        let available = self.data.len() - file_offset;
        let to_copy = buf.len().min(available);
        buf[..to_copy].copy_from_slice(&self.data[file_offset..file_offset + to_copy]);

        if to_copy < buf.len() {
            return Err(RavelError::PartialRead);
        }
        Ok(())
    }

    pub fn write(&self, _addr: u64, _buf: &[u8]) -> RavelResult<()> {
        Err(RavelError::WriteFailed)
    }

    pub fn regions(&self) -> RavelResult<Vec<MemoryRegion>> {
        Ok(self.parser.sections())
    }

    pub fn name(&self) -> String {
        self.parser
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.parser.path().to_string_lossy().into_owned())
    }

    pub fn entry_point(&self) -> Option<u64> {
        self.parser.entry_point()
    }

    pub fn parser(&self) -> &dyn BinaryParser {
        self.parser.as_ref()
    }
}
