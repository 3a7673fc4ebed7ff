//! Disassembler facade (spec §4.3, component C5): decode one instruction at
//! a pointer, format it to text, and compute the absolute target of
//! RIP-relative or absolute-displacement memory operands.
//!
//! Backed by `iced-x86`, the pack's closest analog to the reference
//! implementation's Zydis dependency (spec.md §9 Design Notes: "any decoder
//! that can produce `{length, mnemonic-category, visible operand list...}`
//! and format one instruction to text suffices").

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, IntelFormatter, Mnemonic, OpKind, Register};

/// Coarse operand-width classification used by the cross-reference engine
/// for name/def generation (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandWidth {
    Byte,
    Word,
    Dword,
    Qword,
    Xmm,
    Unknown,
}

impl OperandWidth {
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            8 => OperandWidth::Byte,
            16 => OperandWidth::Word,
            32 => OperandWidth::Dword,
            64 => OperandWidth::Qword,
            128 => OperandWidth::Xmm,
            _ => OperandWidth::Unknown,
        }
    }

    pub fn name_prefix(&self) -> &'static str {
        match self {
            OperandWidth::Byte => "byte",
            OperandWidth::Word => "word",
            OperandWidth::Dword => "dword",
            OperandWidth::Qword => "qword",
            OperandWidth::Xmm => "xmm",
            OperandWidth::Unknown => "unk",
        }
    }

    pub fn default_value_def(&self) -> &'static str {
        match self {
            OperandWidth::Byte => "db ?",
            OperandWidth::Word => "dw ?",
            OperandWidth::Dword => "dd ?",
            OperandWidth::Qword => "dq ?",
            OperandWidth::Xmm | OperandWidth::Unknown => "db ?",
        }
    }
}

/// A decoded instruction plus the small amount of metadata the rest of the
/// core needs (mnemonic for xref classification, visible memory operands).
#[derive(Clone)]
pub struct Decoded {
    pub instruction: Instruction,
}

impl Decoded {
    pub fn length(&self) -> u32 {
        self.instruction.len() as u32
    }

    pub fn mnemonic(&self) -> Mnemonic {
        self.instruction.mnemonic()
    }

    pub fn operand_count_visible(&self) -> u32 {
        self.instruction.op_count()
    }

    /// For a memory operand at `op_index`, the absolute target address per
    /// §4.3: RIP-relative bases resolve to their already-computed absolute
    /// displacement; a zero-base/zero-index operand with a nonzero
    /// displacement resolves to the displacement directly; anything else
    /// yields `None`.
    pub fn absolute_target(&self, op_index: u32) -> Option<u64> {
        if self.instruction.op_kind(op_index) != OpKind::Memory {
            return None;
        }

        let base = self.instruction.memory_base();
        let index = self.instruction.memory_index();

        if base == Register::RIP || base == Register::EIP {
            return Some(self.instruction.memory_displacement64());
        }

        if base == Register::None && index == Register::None {
            let disp = self.instruction.memory_displacement64();
            if disp != 0 {
                return Some(disp);
            }
        }

        None
    }

    /// Operand width in bits for a memory operand, used by the xref
    /// engine's name/def generation. Not meaningful for `LEA`: it never
    /// accesses memory, so `iced-x86` maps every `Lea_r*_m` code to
    /// `MemorySize::Unknown` regardless of the addressed width — callers
    /// classifying a `LEA` xref should use `destination_register_size_bits`
    /// instead.
    pub fn memory_size_bits(&self) -> u32 {
        self.instruction.memory_size().size() as u32 * 8
    }

    /// Width in bits of the instruction's first (destination) register
    /// operand, e.g. 64 for `lea rax, [...]`. Used as the width source for
    /// `LEA` xrefs, where `memory_size_bits` is always zero.
    pub fn destination_register_size_bits(&self) -> u32 {
        self.instruction.op0_register().size() as u32 * 8
    }
}

/// Facade configured once for 64-bit Intel-syntax output.
pub struct Disassembler {
    formatter: IntelFormatter,
}

impl Disassembler {
    pub fn new() -> Self {
        Self { formatter: IntelFormatter::new() }
    }

    /// Decodes one instruction at the start of `bytes`, anchored at virtual
    /// address `ip`. Invalid bytes surface as `None` rather than a spurious
    /// single-byte opcode.
    pub fn decode(&self, bytes: &[u8], ip: u64) -> Option<Decoded> {
        let mut decoder = Decoder::with_ip(64, bytes, ip, DecoderOptions::NONE);
        if !decoder.can_decode() {
            return None;
        }
        let instruction = decoder.decode();
        if instruction.is_invalid() {
            return None;
        }
        Some(Decoded { instruction })
    }

    /// Decodes and formats in one step.
    pub fn format(&mut self, bytes: &[u8], ip: u64) -> Option<(Decoded, String)> {
        let decoded = self.decode(bytes, ip)?;
        let mut text = String::new();
        self.formatter.format(&decoded.instruction, &mut text);
        Some((decoded, text))
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_lea_rip_relative() {
        // lea rax, [rip+0xff5]
        let bytes = [0x48, 0x8D, 0x05, 0xF5, 0x0F, 0x00, 0x00];
        let mut dis = Disassembler::new();
        let (decoded, text) = dis.format(&bytes, 0x401000).unwrap();
        assert_eq!(decoded.length(), 7);
        assert_eq!(decoded.mnemonic(), Mnemonic::Lea);
        assert!(text.to_lowercase().contains("lea"));
        assert_eq!(decoded.absolute_target(1), Some(0x401000 + 7 + 0x0FF5));
    }

    #[test]
    fn invalid_bytes_decode_to_none() {
        let dis = Disassembler::new();
        let bytes = [0x0F, 0xFF]; // undefined opcode
        assert!(dis.decode(&bytes, 0x1000).is_none());
    }
}
