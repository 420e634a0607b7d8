//! pPIM instruction set
//!
//! Binary layout of one 19-bit instruction word:
//!
//! ```text
//! 18-17    16-11            10    9     8-0
//! Opcode   Read/Core Ptr.   Rd    Wr    Row Address
//! ```
//!
//! PROG instructions additionally carry a core operation and a LUT
//! configuration payload. Those live only in the in-memory and textual
//! forms; the binary word holds the core pointer alone.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{CompileError, CompileResult};

/// Largest value of the 6-bit pointer field
pub const PTR_MAX: u8 = 63;
/// Largest value of the 9-bit row address field
pub const ROW_ADDRESS_MAX: u16 = 511;
/// Width of an encoded instruction word
pub const WORD_BITS: u32 = 19;

const OPCODE_SHIFT: u32 = 17;
const PTR_SHIFT: u32 = 11;
const READ_BIT: u32 = 1 << 10;
const WRITE_BIT: u32 = 1 << 9;
const PTR_MASK: u32 = 0x3F;
const ROW_MASK: u32 = 0x1FF;

/// Validated 6-bit core/read pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CorePtr(u8);

impl CorePtr {
    pub fn new(value: u8) -> CompileResult<Self> {
        if value > PTR_MAX {
            return Err(CompileError::overflow("ptr", value, u64::from(PTR_MAX)));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CorePtr {
    type Error = CompileError;

    fn try_from(value: u8) -> CompileResult<Self> {
        Self::new(value)
    }
}

impl From<CorePtr> for u8 {
    fn from(ptr: CorePtr) -> u8 {
        ptr.0
    }
}

/// Validated 9-bit row address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct RowAddress(u16);

impl RowAddress {
    pub fn new(value: u16) -> CompileResult<Self> {
        if value > ROW_ADDRESS_MAX {
            return Err(CompileError::overflow(
                "row_address",
                value,
                u64::from(ROW_ADDRESS_MAX),
            ));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for RowAddress {
    type Error = CompileError;

    fn try_from(value: u16) -> CompileResult<Self> {
        Self::new(value)
    }
}

impl From<RowAddress> for u16 {
    fn from(addr: RowAddress) -> u16 {
        addr.0
    }
}

/// Two-bit opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Prog = 0,
    Exe = 1,
    End = 2,
}

impl Opcode {
    fn from_bits(bits: u32) -> CompileResult<Self> {
        match bits {
            0 => Ok(Opcode::Prog),
            1 => Ok(Opcode::Exe),
            2 => Ok(Opcode::End),
            other => Err(CompileError::encoding(format!("unknown opcode {}", other))),
        }
    }
}

/// Functions a LUT core can be programmed to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreOp {
    Multiplier,
    Adder,
    Mac,
    Shifter,
    LogicAnd,
    LogicOr,
    LogicXor,
    Comparator,
    Custom,
}

impl CoreOp {
    pub const ALL: [CoreOp; 9] = [
        CoreOp::Multiplier,
        CoreOp::Adder,
        CoreOp::Mac,
        CoreOp::Shifter,
        CoreOp::LogicAnd,
        CoreOp::LogicOr,
        CoreOp::LogicXor,
        CoreOp::Comparator,
        CoreOp::Custom,
    ];

    /// Name used in the assembly listing
    pub fn name(&self) -> &'static str {
        match self {
            CoreOp::Multiplier => "MULTIPLIER",
            CoreOp::Adder => "ADDER",
            CoreOp::Mac => "MAC",
            CoreOp::Shifter => "SHIFTER",
            CoreOp::LogicAnd => "LOGIC_AND",
            CoreOp::LogicOr => "LOGIC_OR",
            CoreOp::LogicXor => "LOGIC_XOR",
            CoreOp::Comparator => "COMPARATOR",
            CoreOp::Custom => "CUSTOM",
        }
    }
}

impl FromStr for CoreOp {
    type Err = CompileError;

    fn from_str(s: &str) -> CompileResult<Self> {
        CoreOp::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| CompileError::encoding(format!("unknown core operation '{}'", s)))
    }
}

/// What an EXE instruction does, derived from its read/write flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExeKind {
    Read,
    Write,
    ReadWrite,
    Compute,
}

/// One pPIM instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opcode", rename_all = "lowercase")]
pub enum Instruction {
    /// Program a LUT core with a new function
    Prog {
        core_ptr: CorePtr,
        core_op: CoreOp,
        lut_config: Vec<u8>,
    },
    /// Memory access (read/write set) or computation (neither set).
    /// `ptr` is the read-source pointer for memory access and the core
    /// pointer for computation.
    Exe {
        ptr: CorePtr,
        read: bool,
        write: bool,
        row_address: RowAddress,
    },
    /// Terminate execution
    End,
}

impl Instruction {
    /// PROG instruction programming `core_ptr` as `core_op`
    pub fn prog(core_ptr: u8, core_op: CoreOp, lut_config: Vec<u8>) -> CompileResult<Self> {
        Ok(Instruction::Prog {
            core_ptr: CorePtr::new(core_ptr)?,
            core_op,
            lut_config,
        })
    }

    /// EXE instruction for a memory access
    pub fn memory(ptr: u8, read: bool, write: bool, row_address: u16) -> CompileResult<Self> {
        Ok(Instruction::Exe {
            ptr: CorePtr::new(ptr)?,
            read,
            write,
            row_address: RowAddress::new(row_address)?,
        })
    }

    /// EXE instruction running `core_ptr` on the row currently staged
    pub fn compute(core_ptr: u8, row_address: u16) -> CompileResult<Self> {
        Self::memory(core_ptr, false, false, row_address)
    }

    pub fn end() -> Self {
        Instruction::End
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Prog { .. } => Opcode::Prog,
            Instruction::Exe { .. } => Opcode::Exe,
            Instruction::End => Opcode::End,
        }
    }

    /// Kind of EXE instruction, `None` for PROG and END
    pub fn exe_kind(&self) -> Option<ExeKind> {
        match self {
            Instruction::Exe { read, write, .. } => Some(match (*read, *write) {
                (true, false) => ExeKind::Read,
                (false, true) => ExeKind::Write,
                (true, true) => ExeKind::ReadWrite,
                (false, false) => ExeKind::Compute,
            }),
            _ => None,
        }
    }

    /// Field values as they appear in the binary word
    pub fn fields(&self) -> EncodedFields {
        match self {
            Instruction::Prog { core_ptr, .. } => EncodedFields {
                opcode: Opcode::Prog,
                ptr: core_ptr.get(),
                read: false,
                write: false,
                row_address: 0,
            },
            Instruction::Exe {
                ptr,
                read,
                write,
                row_address,
            } => EncodedFields {
                opcode: Opcode::Exe,
                ptr: ptr.get(),
                read: *read,
                write: *write,
                row_address: row_address.get(),
            },
            Instruction::End => EncodedFields {
                opcode: Opcode::End,
                ptr: 0,
                read: false,
                write: false,
                row_address: 0,
            },
        }
    }

    /// Pack into a 19-bit word
    pub fn encode(&self) -> u32 {
        self.fields().pack()
    }

    /// Canonical assembly text for this instruction
    pub fn render(&self) -> String {
        self.to_string()
    }
}

/// Unpacked contents of one instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedFields {
    pub opcode: Opcode,
    pub ptr: u8,
    pub read: bool,
    pub write: bool,
    pub row_address: u16,
}

impl EncodedFields {
    fn pack(&self) -> u32 {
        let mut word = (self.opcode as u32) << OPCODE_SHIFT;
        word |= (u32::from(self.ptr) & PTR_MASK) << PTR_SHIFT;
        if self.read {
            word |= READ_BIT;
        }
        if self.write {
            word |= WRITE_BIT;
        }
        word | (u32::from(self.row_address) & ROW_MASK)
    }
}

/// Unpack a 19-bit instruction word
pub fn decode(word: u32) -> CompileResult<EncodedFields> {
    if word >> WORD_BITS != 0 {
        return Err(CompileError::encoding(format!(
            "word {:#x} is wider than {} bits",
            word, WORD_BITS
        )));
    }

    Ok(EncodedFields {
        opcode: Opcode::from_bits(word >> OPCODE_SHIFT)?,
        ptr: ((word >> PTR_SHIFT) & PTR_MASK) as u8,
        read: word & READ_BIT != 0,
        write: word & WRITE_BIT != 0,
        row_address: (word & ROW_MASK) as u16,
    })
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Prog {
                core_ptr,
                core_op,
                lut_config,
            } => {
                write!(f, "PROG Core{} {}", core_ptr.get(), core_op.name())?;
                if !lut_config.is_empty() {
                    let bytes: Vec<String> =
                        lut_config.iter().map(|b| format!("0x{:02x}", b)).collect();
                    write!(f, " [{}]", bytes.join(", "))?;
                }
                Ok(())
            }
            Instruction::Exe {
                ptr, row_address, ..
            } => {
                match self.exe_kind() {
                    Some(ExeKind::Read) => write!(f, "EXE Read")?,
                    Some(ExeKind::Write) => write!(f, "EXE Write")?,
                    Some(ExeKind::ReadWrite) => write!(f, "EXE ReadWrite")?,
                    _ => write!(f, "EXE CorePtr{}", ptr.get())?,
                }
                write!(f, " RowAddress{}", row_address.get())
            }
            Instruction::End => write!(f, "END"),
        }
    }
}

impl FromStr for Instruction {
    type Err = CompileError;

    /// Inverse of [`Instruction::render`]. Memory instructions do not show
    /// their read pointer in text, so it parses back as 0.
    fn from_str(line: &str) -> CompileResult<Self> {
        let line = line.trim();

        if line == "END" {
            return Ok(Instruction::End);
        }

        if let Some(rest) = line.strip_prefix("PROG Core") {
            let (ptr, rest) = rest
                .split_once(' ')
                .ok_or_else(|| CompileError::encoding(format!("missing core operation in '{}'", line)))?;
            let (name, lut) = match rest.split_once(' ') {
                Some((name, lut)) => (name, parse_lut(lut)?),
                None => (rest, Vec::new()),
            };
            return Instruction::prog(parse_number(ptr)?, name.parse()?, lut);
        }

        if let Some(rest) = line.strip_prefix("EXE ") {
            let (action, addr) = rest
                .split_once(" RowAddress")
                .ok_or_else(|| CompileError::encoding(format!("missing row address in '{}'", line)))?;
            let addr = parse_number(addr)?;
            return match action {
                "Read" => Instruction::memory(0, true, false, addr),
                "Write" => Instruction::memory(0, false, true, addr),
                "ReadWrite" => Instruction::memory(0, true, true, addr),
                other => match other.strip_prefix("CorePtr") {
                    Some(ptr) => Instruction::compute(parse_number(ptr)?, addr),
                    None => Err(CompileError::encoding(format!("unknown EXE action '{}'", other))),
                },
            };
        }

        Err(CompileError::encoding(format!("unrecognized instruction '{}'", line)))
    }
}

fn parse_number<T: FromStr>(s: &str) -> CompileResult<T> {
    s.parse::<T>()
        .map_err(|_| CompileError::encoding(format!("invalid number '{}'", s)))
}

fn parse_lut(s: &str) -> CompileResult<Vec<u8>> {
    let inner = s
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| CompileError::encoding(format!("malformed LUT list '{}'", s)))?;

    inner
        .split(", ")
        .map(|byte| {
            byte.strip_prefix("0x")
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| CompileError::encoding(format!("invalid LUT byte '{}'", byte)))
        })
        .collect()
}

/// Parse a full assembly listing. Blank lines and lines starting with `/`
/// are comments.
pub fn parse_listing(text: &str) -> CompileResult<Vec<Instruction>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('/')
        })
        .map(|(n, line)| {
            line.parse().map_err(|e| match e {
                CompileError::InvalidEncoding { message } => {
                    CompileError::encoding(format!("line {}: {}", n + 1, message))
                }
                other => other,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_field_bounds() {
        assert!(Instruction::memory(63, true, false, 511).is_ok());
        assert!(Instruction::prog(63, CoreOp::Mac, vec![]).is_ok());

        assert!(matches!(
            Instruction::memory(64, true, false, 0),
            Err(CompileError::FieldOverflow { field: "ptr", value: 64, .. })
        ));
        assert!(matches!(
            Instruction::memory(0, true, false, 512),
            Err(CompileError::FieldOverflow { field: "row_address", value: 512, .. })
        ));
        assert!(matches!(
            Instruction::compute(64, 0),
            Err(CompileError::FieldOverflow { .. })
        ));
        assert!(matches!(
            Instruction::prog(64, CoreOp::Adder, vec![]),
            Err(CompileError::FieldOverflow { .. })
        ));
    }

    #[test]
    fn test_encode_layout() {
        let word = Instruction::memory(5, true, false, 300).unwrap().encode();
        assert_eq!(word, (1 << 17) | (5 << 11) | (1 << 10) | 300);

        let word = Instruction::compute(2, 7).unwrap().encode();
        assert_eq!(word, (1 << 17) | (2 << 11) | 7);

        assert_eq!(Instruction::end().encode(), 2 << 17);
        assert_eq!(
            Instruction::prog(3, CoreOp::Mac, vec![0xff]).unwrap().encode(),
            3 << 11
        );
    }

    #[test]
    fn test_max_word_fits_19_bits() {
        let word = Instruction::memory(63, true, true, 511).unwrap().encode();
        assert!(word < (1 << WORD_BITS));
    }

    #[test]
    fn test_decode_rejects_bad_words() {
        assert!(decode(1 << 19).is_err());
        assert!(decode(3 << 17).is_err());
    }

    #[test]
    fn test_render() {
        let prog = Instruction::prog(0, CoreOp::Multiplier, vec![0x00, 0x1f, 0xa0]).unwrap();
        assert_eq!(prog.render(), "PROG Core0 MULTIPLIER [0x00, 0x1f, 0xa0]");

        let bare = Instruction::prog(8, CoreOp::LogicXor, vec![]).unwrap();
        assert_eq!(bare.render(), "PROG Core8 LOGIC_XOR");

        assert_eq!(Instruction::memory(1, true, false, 4).unwrap().render(), "EXE Read RowAddress4");
        assert_eq!(Instruction::memory(1, false, true, 4).unwrap().render(), "EXE Write RowAddress4");
        assert_eq!(Instruction::memory(1, true, true, 4).unwrap().render(), "EXE ReadWrite RowAddress4");
        assert_eq!(Instruction::compute(2, 9).unwrap().render(), "EXE CorePtr2 RowAddress9");
        assert_eq!(Instruction::end().render(), "END");
    }

    #[test]
    fn test_parse_rendered_text() {
        let program = vec![
            Instruction::prog(2, CoreOp::Mac, vec![0x10, 0x21]).unwrap(),
            Instruction::prog(4, CoreOp::Comparator, vec![]).unwrap(),
            Instruction::memory(0, true, false, 17).unwrap(),
            Instruction::compute(2, 17).unwrap(),
            Instruction::memory(0, false, true, 18).unwrap(),
            Instruction::end(),
        ];
        let text: String = program.iter().map(|i| format!("{}\n", i)).collect();

        assert_eq!(parse_listing(&text).unwrap(), program);
    }

    #[test]
    fn test_parse_listing_skips_comments() {
        let text = "// header\n\nEXE Read RowAddress3\n/ note\nEND\n";
        let parsed = parse_listing(text).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_parse_listing_reports_line() {
        let err = parse_listing("END\nNOP\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_serde_rejects_out_of_range_pointer() {
        let json = r#"{"opcode":"exe","ptr":64,"read":true,"write":false,"row_address":0}"#;
        assert!(serde_json::from_str::<Instruction>(json).is_err());
    }

    proptest! {
        #[test]
        fn prop_encode_decode_preserves_fields(
            ptr in 0u8..=PTR_MAX,
            row in 0u16..=ROW_ADDRESS_MAX,
            read in any::<bool>(),
            write in any::<bool>(),
        ) {
            let instr = Instruction::memory(ptr, read, write, row).unwrap();
            prop_assert_eq!(decode(instr.encode()).unwrap(), instr.fields());
        }
    }
}
