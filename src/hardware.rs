//! Hardware profile and compiled program output
//!
//! [`ArchConfig`] describes one pPIM target: its memory geometry and the
//! cycle cost of each instruction class. It is passed to whichever
//! component needs it, so different profiles can be compiled for and
//! compared side by side.

use serde::{Deserialize, Serialize};

use crate::ast::MatrixDescriptor;
use crate::error::{CompileError, CompileResult};
use crate::isa::{ExeKind, Instruction, ROW_ADDRESS_MAX};
use crate::memory::MemoryBinding;

/// Configuration for the pPIM hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchConfig {
    /// Number of addressable memory rows
    pub address_rows: u32,
    /// Matrix elements stored per memory row
    pub elements_per_row: u32,
    /// Parallel banks available for element access
    pub banks: u32,
    pub prog_cycles: u64,
    pub read_cycles: u64,
    pub write_cycles: u64,
    pub compute_cycles: u64,
    pub end_cycles: u64,
    pub clock_mhz: u64,
}

impl ArchConfig {
    /// The reference pPIM cluster: 512 rows of 256 elements, 4 banks
    pub fn ppim() -> Self {
        Self {
            address_rows: u32::from(ROW_ADDRESS_MAX) + 1,
            elements_per_row: 256,
            banks: 4,
            prog_cycles: 10,
            read_cycles: 2,
            write_cycles: 2,
            compute_cycles: 1,
            end_cycles: 1,
            clock_mhz: 500,
        }
    }

    /// Check that the geometry is representable in the instruction format
    pub fn validate(&self) -> CompileResult<()> {
        let limit = u64::from(ROW_ADDRESS_MAX) + 1;
        if self.address_rows == 0 || u64::from(self.address_rows) > limit {
            return Err(CompileError::overflow("address_rows", self.address_rows, limit));
        }
        if self.elements_per_row == 0 {
            return Err(CompileError::overflow("elements_per_row", 0u32, u64::from(u32::MAX)));
        }
        if self.banks == 0 || self.banks > 64 {
            return Err(CompileError::overflow("banks", self.banks, 64));
        }
        Ok(())
    }

    /// Cycle cost of a single instruction
    pub fn cycles_for(&self, instruction: &Instruction) -> u64 {
        match instruction {
            Instruction::Prog { .. } => self.prog_cycles,
            Instruction::End => self.end_cycles,
            Instruction::Exe { .. } => match instruction.exe_kind() {
                Some(ExeKind::Read) => self.read_cycles,
                Some(ExeKind::Write) => self.write_cycles,
                Some(ExeKind::ReadWrite) => self.read_cycles + self.write_cycles,
                _ => self.compute_cycles,
            },
        }
    }
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self::ppim()
    }
}

/// Instruction mix and estimated runtime of a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub prog: usize,
    pub read: usize,
    pub write: usize,
    pub read_write: usize,
    pub compute: usize,
    pub end: usize,
    pub total_cycles: u64,
    /// Estimated execution time in microseconds
    pub execution_us: f64,
}

impl StreamStats {
    pub fn collect(instructions: &[Instruction], arch: &ArchConfig) -> Self {
        let mut stats = StreamStats::default();

        for instr in instructions {
            match instr {
                Instruction::Prog { .. } => stats.prog += 1,
                Instruction::End => stats.end += 1,
                Instruction::Exe { .. } => match instr.exe_kind() {
                    Some(ExeKind::Read) => stats.read += 1,
                    Some(ExeKind::Write) => stats.write += 1,
                    Some(ExeKind::ReadWrite) => stats.read_write += 1,
                    _ => stats.compute += 1,
                },
            }
            stats.total_cycles += arch.cycles_for(instr);
        }

        if arch.clock_mhz > 0 {
            stats.execution_us = stats.total_cycles as f64 / arch.clock_mhz as f64;
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.prog + self.read + self.write + self.read_write + self.compute + self.end
    }
}

/// A complete compiled program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledProgram {
    /// Matrices seen by the code generator, including synthesized outputs
    pub matrices: Vec<MatrixDescriptor>,
    /// Memory placement in allocation order
    pub bindings: Vec<MemoryBinding>,
    pub instructions: Vec<Instruction>,
    pub stats: StreamStats,
}

impl CompiledProgram {
    pub fn new(
        matrices: Vec<MatrixDescriptor>,
        bindings: Vec<MemoryBinding>,
        instructions: Vec<Instruction>,
        arch: &ArchConfig,
    ) -> Self {
        let stats = StreamStats::collect(&instructions, arch);
        Self {
            matrices,
            bindings,
            instructions,
            stats,
        }
    }

    /// Assembly listing, one instruction per line
    pub fn to_assembly(&self) -> String {
        let mut output = String::new();
        for instr in &self.instructions {
            output.push_str(&instr.render());
            output.push('\n');
        }
        output
    }

    /// Encoded instruction words, one 5-digit hex word per line
    pub fn to_hex(&self) -> String {
        let mut output = String::new();
        for instr in &self.instructions {
            output.push_str(&format!("{:05x}\n", instr.encode()));
        }
        output
    }

    /// Export to JSON format
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "pPIM Program")?;
        writeln!(f, "============")?;
        writeln!(f, "Matrices:")?;
        for binding in &self.bindings {
            writeln!(
                f,
                "  {} ({}) -> rows {}..={}",
                binding.name,
                binding.dimensions,
                binding.start_address,
                binding.range().end
            )?;
        }
        writeln!(f, "Instructions: {}", self.stats.total())?;
        writeln!(f, "  PROG:    {}", self.stats.prog)?;
        writeln!(f, "  Read:    {}", self.stats.read + self.stats.read_write)?;
        writeln!(f, "  Write:   {}", self.stats.write + self.stats.read_write)?;
        writeln!(f, "  Compute: {}", self.stats.compute)?;
        writeln!(f, "Total cycles: {}", self.stats.total_cycles)?;
        writeln!(f, "Estimated time: {:.3} us", self.stats.execution_us)
    }
}
