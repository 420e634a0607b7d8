//! Code generator for pPIM instruction streams
//!
//! Lowers matrix multiplications to the per-element read/compute/write
//! sequence executed by the MAC core. For `C = A * B` with `A: n x m` and
//! `B: m x p` the stream is:
//!
//! ```text
//! PROG Core0 MULTIPLIER [...]      once per compilation
//! PROG Core1 ADDER [...]
//! PROG Core2 MAC [...]
//! for i in 0..n, j in 0..p:
//!     for k in 0..m:
//!         EXE Read  A[i][k]
//!         EXE Read  B[k][j]
//!         EXE CorePtr2 C[i][j]     accumulate
//!     EXE Write C[i][j]
//! END
//! ```

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::ast::{Dimensions, MatrixDescriptor, Operation, OperationKind};
use crate::error::{CompileError, CompileResult};
use crate::isa::{CoreOp, Instruction};
use crate::memory::MemoryMapper;

/// Core programmed as a multiplier
pub const MULTIPLIER_CORE: u8 = 0;
/// Core programmed as an adder
pub const ADDER_CORE: u8 = 1;
/// Core programmed as a multiply-accumulate unit
pub const MAC_CORE: u8 = 2;

/// What to do with operations the backend cannot lower
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnsupportedOpPolicy {
    /// Emit nothing for the operation and log a warning
    #[default]
    Skip,
    /// Fail the compilation with `UnsupportedOperation`
    Reject,
}

/// Code generator settings
#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    pub unsupported_ops: UnsupportedOpPolicy,
    pub verbose: bool,
}

/// Code generator for pPIM hardware
///
/// Borrows the memory mapper of the compilation it belongs to; bindings it
/// creates stay in the mapper after generation.
pub struct CodeGenerator<'m> {
    mapper: &'m mut MemoryMapper,
    options: CodegenOptions,
    /// Known matrices, including synthesized outputs, in first-seen order
    matrices: Vec<MatrixDescriptor>,
    index: HashMap<String, usize>,
}

impl<'m> CodeGenerator<'m> {
    pub fn new(mapper: &'m mut MemoryMapper, options: CodegenOptions) -> Self {
        Self {
            mapper,
            options,
            matrices: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Generate the instruction stream for a program
    pub fn generate(
        &mut self,
        matrices: &[MatrixDescriptor],
        operations: &[Operation],
    ) -> CompileResult<Vec<Instruction>> {
        self.matrices.clear();
        self.index.clear();
        for matrix in matrices {
            self.remember(matrix.clone());
        }

        let mut instructions = core_programs()?;

        for op in operations {
            match op.kind {
                OperationKind::Multiply => self.lower_multiply(op, &mut instructions)?,
                _ => self.unsupported(op)?,
            }
        }

        instructions.push(Instruction::end());

        if self.options.verbose {
            info!(instructions = instructions.len(), "code generation finished");
        }
        Ok(instructions)
    }

    /// Matrices known to the generator, including synthesized outputs
    pub fn matrices(&self) -> &[MatrixDescriptor] {
        &self.matrices
    }

    pub fn into_matrices(self) -> Vec<MatrixDescriptor> {
        self.matrices
    }

    fn remember(&mut self, matrix: MatrixDescriptor) {
        if !self.index.contains_key(&matrix.name) {
            self.index.insert(matrix.name.clone(), self.matrices.len());
            self.matrices.push(matrix);
        }
    }

    fn lookup(&self, name: &str) -> CompileResult<Dimensions> {
        self.index
            .get(name)
            .map(|&i| self.matrices[i].dimensions())
            .ok_or_else(|| CompileError::missing(name))
    }

    fn unsupported(&self, op: &Operation) -> CompileResult<()> {
        match self.options.unsupported_ops {
            UnsupportedOpPolicy::Skip => {
                warn!(operation = %op, "operation has no pPIM lowering, skipping");
                Ok(())
            }
            UnsupportedOpPolicy::Reject => Err(CompileError::UnsupportedOperation {
                kind: op.kind.to_string(),
                output: op.output.clone(),
            }),
        }
    }

    fn ensure_mapped(&mut self, name: &str) -> CompileResult<()> {
        if !self.mapper.is_mapped(name) {
            let dims = self.lookup(name)?;
            self.mapper.map_matrix(name, dims)?;
        }
        Ok(())
    }

    /// Resolve operand shapes and the output shape of `left * right`,
    /// synthesizing the output descriptor when it was not declared
    fn resolve_multiply(&mut self, op: &Operation) -> CompileResult<(Dimensions, Dimensions)> {
        let [left, right] = op.inputs.as_slice() else {
            return Err(CompileError::mismatch(format!(
                "{} expects 2 operands, got {}",
                op.kind,
                op.inputs.len()
            )));
        };

        if op.inputs.contains(&op.output) {
            return Err(CompileError::AliasedOutput {
                name: op.output.clone(),
                kind: op.kind.to_string(),
            });
        }

        let a = self.lookup(left)?;
        let b = self.lookup(right)?;
        if a.cols != b.rows {
            return Err(CompileError::mismatch(format!(
                "{}({}) * {}({})",
                left, a, right, b
            )));
        }

        let expected = Dimensions::new(a.rows, b.cols);
        match self.index.get(&op.output) {
            Some(&i) => {
                let declared = self.matrices[i].dimensions();
                if declared != expected {
                    return Err(CompileError::mismatch(format!(
                        "'{}' is {} but {} * {} produces {}",
                        op.output, declared, left, right, expected
                    )));
                }
            }
            None => {
                debug!(matrix = %op.output, shape = %expected, "synthesizing output matrix");
                self.remember(MatrixDescriptor::output(&op.output, expected.rows, expected.cols));
            }
        }

        Ok((a, b))
    }

    fn lower_multiply(&mut self, op: &Operation, out: &mut Vec<Instruction>) -> CompileResult<()> {
        let (a, b) = self.resolve_multiply(op)?;
        let (left, right) = (&op.inputs[0], &op.inputs[1]);
        let result = &op.output;

        for name in [left, right, result] {
            self.ensure_mapped(name)?;
        }

        let start = out.len();
        let (n, m, p) = (a.rows, a.cols, b.cols);

        for i in 0..n {
            for j in 0..p {
                let c_addr = self.mapper.element_address(result, i, j)?;
                let c_bank = self.mapper.bank_index(result, i, j)?;

                for k in 0..m {
                    let a_addr = self.mapper.element_address(left, i, k)?;
                    let a_bank = self.mapper.bank_index(left, i, k)?;
                    let b_addr = self.mapper.element_address(right, k, j)?;
                    let b_bank = self.mapper.bank_index(right, k, j)?;

                    out.push(Instruction::memory(a_bank, true, false, a_addr)?);
                    out.push(Instruction::memory(b_bank, true, false, b_addr)?);
                    out.push(Instruction::compute(MAC_CORE, c_addr)?);
                }

                out.push(Instruction::memory(c_bank, false, true, c_addr)?);
            }
        }

        let emitted = out.len() - start;
        if self.options.verbose {
            info!(operation = %op, emitted, "lowered multiply");
        } else {
            debug!(operation = %op, emitted, "lowered multiply");
        }
        Ok(())
    }
}

/// LUT over every pair of 2-bit operands, entry `a * 4 + b`
fn lut_table(f: impl Fn(u8, u8) -> u8) -> Vec<u8> {
    (0u8..16).map(|i| f(i / 4, i % 4)).collect()
}

/// Multiplier LUT: `a * b`
pub fn multiplier_lut() -> Vec<u8> {
    lut_table(|a, b| a * b)
}

/// Adder LUT: `a + b`
pub fn adder_lut() -> Vec<u8> {
    lut_table(|a, b| a + b)
}

/// MAC LUT: product in the high nibble, sum in the low nibble
pub fn mac_lut() -> Vec<u8> {
    lut_table(|a, b| ((a * b) << 4) | (a + b))
}

/// The PROG instructions configuring the multiplier, adder and MAC cores
pub fn core_programs() -> CompileResult<Vec<Instruction>> {
    Ok(vec![
        Instruction::prog(MULTIPLIER_CORE, CoreOp::Multiplier, multiplier_lut())?,
        Instruction::prog(ADDER_CORE, CoreOp::Adder, adder_lut())?,
        Instruction::prog(MAC_CORE, CoreOp::Mac, mac_lut())?,
    ])
}
