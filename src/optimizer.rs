//! Optimization pipeline
//!
//! Optimizations are independent named passes over either the operation
//! list or the instruction stream. The identity pass is a legitimate pass:
//! several stages of the pipeline are reserved for transforms that do not
//! change the program yet, and they run as named identity passes so their
//! position in the pipeline is explicit.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::ast::Operation;
use crate::error::{CompileError, CompileResult};
use crate::isa::Instruction;

/// Highest supported optimization level
pub const MAX_OPT_LEVEL: u8 = 3;

/// A transform over the operation list
pub trait OperationPass {
    fn name(&self) -> &'static str;
    fn run(&self, operations: Vec<Operation>) -> CompileResult<Vec<Operation>>;
}

/// A transform over the instruction stream
pub trait InstructionPass {
    fn name(&self) -> &'static str;
    fn run(&self, instructions: Vec<Instruction>) -> CompileResult<Vec<Instruction>>;
}

/// Pass that returns its input unchanged
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub &'static str);

impl OperationPass for Identity {
    fn name(&self) -> &'static str {
        self.0
    }

    fn run(&self, operations: Vec<Operation>) -> CompileResult<Vec<Operation>> {
        Ok(operations)
    }
}

impl InstructionPass for Identity {
    fn name(&self) -> &'static str {
        self.0
    }

    fn run(&self, instructions: Vec<Instruction>) -> CompileResult<Vec<Instruction>> {
        Ok(instructions)
    }
}

/// Drops an operation that repeats an earlier one when nothing it reads or
/// writes has been produced in between; recomputing it would store the
/// same values again.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateOperationElimination;

impl OperationPass for DuplicateOperationElimination {
    fn name(&self) -> &'static str {
        "duplicate-operation-elimination"
    }

    fn run(&self, operations: Vec<Operation>) -> CompileResult<Vec<Operation>> {
        let mut kept: Vec<Operation> = Vec::with_capacity(operations.len());
        // Operations whose result is still valid
        let mut live: HashSet<Operation> = HashSet::new();

        for op in operations {
            if live.contains(&op) {
                debug!(operation = %op, "removing duplicate operation");
                continue;
            }
            // Writing `op.output` invalidates everything that read or wrote it
            live.retain(|prev| prev.output != op.output && !prev.inputs.contains(&op.output));
            if !op.inputs.contains(&op.output) {
                live.insert(op.clone());
            }
            kept.push(op);
        }

        Ok(kept)
    }
}

/// Optimizer configured for one optimization level
pub struct Optimizer {
    level: u8,
    verbose: bool,
    operation_passes: Vec<Box<dyn OperationPass>>,
    instruction_passes: Vec<Box<dyn InstructionPass>>,
}

impl Optimizer {
    /// Build the pass pipeline for `level` (clamped to `MAX_OPT_LEVEL`)
    pub fn for_level(level: u8, verbose: bool) -> Self {
        let level = level.min(MAX_OPT_LEVEL);
        let mut operation_passes: Vec<Box<dyn OperationPass>> = Vec::new();
        let mut instruction_passes: Vec<Box<dyn InstructionPass>> = Vec::new();

        if level >= 1 {
            operation_passes.push(Box::new(DuplicateOperationElimination));
            instruction_passes.push(Box::new(Identity("instruction-reordering")));
        }
        if level >= 2 {
            operation_passes.push(Box::new(Identity("multiply-chain-ordering")));
            instruction_passes.push(Box::new(Identity("memory-access")));
            instruction_passes.push(Box::new(Identity("instruction-scheduling")));
        }
        if level >= 3 {
            operation_passes.push(Box::new(Identity("blocking")));
            instruction_passes.push(Box::new(Identity("loop-unrolling")));
        }

        Self {
            level,
            verbose,
            operation_passes,
            instruction_passes,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.operation_passes
            .iter()
            .map(|p| p.name())
            .chain(self.instruction_passes.iter().map(|p| p.name()))
            .collect()
    }

    fn announce(&self, pass: &str, before: usize, after: usize) {
        if self.verbose {
            info!(pass, before, after, "optimization pass");
        } else {
            debug!(pass, before, after, "optimization pass");
        }
    }

    pub fn optimize_operations(&self, mut operations: Vec<Operation>) -> CompileResult<Vec<Operation>> {
        for pass in &self.operation_passes {
            let before = operations.len();
            operations = pass.run(operations)?;
            self.announce(pass.name(), before, operations.len());
        }
        Ok(operations)
    }

    pub fn optimize_instructions(
        &self,
        mut instructions: Vec<Instruction>,
    ) -> CompileResult<Vec<Instruction>> {
        for pass in &self.instruction_passes {
            let before = instructions.len();
            instructions = pass.run(instructions)?;
            self.announce(pass.name(), before, instructions.len());
        }
        verify_stream(&instructions)?;
        Ok(instructions)
    }
}

/// Structural check of a finished stream: PROGs come before any EXE and the
/// stream ends with its only END.
pub fn verify_stream(instructions: &[Instruction]) -> CompileResult<()> {
    let mut seen_exe = false;

    for (n, instr) in instructions.iter().enumerate() {
        match instr {
            Instruction::Prog { .. } if seen_exe => {
                return Err(CompileError::encoding(format!(
                    "PROG at position {} follows an EXE instruction",
                    n
                )));
            }
            Instruction::Exe { .. } => seen_exe = true,
            Instruction::End if n + 1 != instructions.len() => {
                return Err(CompileError::encoding(format!(
                    "END at position {} is not the last instruction",
                    n
                )));
            }
            _ => {}
        }
    }

    if instructions.last() != Some(&Instruction::End) {
        return Err(CompileError::encoding("stream does not end with END"));
    }
    Ok(())
}
