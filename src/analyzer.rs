//! Front-end analyzer
//!
//! Resolves parsed declarations and statements into a [`SourceProgram`]:
//! checks operand shapes, synthesizes undeclared output matrices and
//! assigns input/output roles.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::ast::*;
use crate::error::{CompileError, CompileResult};

/// Analyzer for shape checking and role inference
pub struct Analyzer {
    /// Matrices in declaration/synthesis order
    matrices: Vec<MatrixDescriptor>,
    /// name -> index into `matrices`
    index: HashMap<String, usize>,
    /// Names produced by an operation so far
    produced: HashSet<String>,
    /// Names read by an operation so far
    consumed: HashSet<String>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            matrices: Vec::new(),
            index: HashMap::new(),
            produced: HashSet::new(),
            consumed: HashSet::new(),
        }
    }

    /// Declare a matrix with known shape. A repeated declaration keeps the
    /// first shape.
    pub fn declare(&mut self, name: &str, rows: u32, cols: u32) {
        if let Some(&i) = self.index.get(name) {
            let existing = &self.matrices[i];
            warn!(
                matrix = name,
                "redeclaration ignored, keeping {}x{}", existing.rows, existing.cols
            );
            return;
        }
        self.index.insert(name.to_string(), self.matrices.len());
        self.matrices.push(MatrixDescriptor::input(name, rows, cols));
    }

    /// Analyze a parsed unit and produce the backend program
    pub fn analyze(&mut self, unit: SourceUnit) -> CompileResult<SourceProgram> {
        for decl in &unit.declarations {
            self.declare(&decl.name, decl.rows, decl.cols);
        }

        let operations = unit
            .statements
            .into_iter()
            .map(|stmt| self.analyze_statement(stmt))
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(SourceProgram::new(std::mem::take(&mut self.matrices), operations))
    }

    fn lookup(&self, name: &str) -> Option<&MatrixDescriptor> {
        self.index.get(name).map(|&i| &self.matrices[i])
    }

    /// Resolve one statement. Every operand must name a known matrix.
    fn analyze_statement(&mut self, stmt: Statement) -> CompileResult<Operation> {
        if let Some(missing) = stmt.operands.iter().find(|name| self.lookup(name).is_none()) {
            return Err(CompileError::missing(missing.clone()));
        }
        // Multiply writes result elements while its operands are still being read
        if stmt.kind == OperationKind::Multiply && stmt.operands.contains(&stmt.target) {
            return Err(CompileError::AliasedOutput {
                name: stmt.target,
                kind: stmt.kind.to_string(),
            });
        }

        let shape = self.result_shape(&stmt)?;

        for operand in &stmt.operands {
            // A produced matrix that feeds a later operation is both
            if self.produced.contains(operand) {
                if let Some(&i) = self.index.get(operand.as_str()) {
                    self.matrices[i].is_input = true;
                }
            }
            self.consumed.insert(operand.clone());
        }

        match self.index.get(&stmt.target) {
            Some(&i) => {
                let existing = &mut self.matrices[i];
                if existing.dimensions() != shape {
                    return Err(CompileError::mismatch(format!(
                        "'{}' is declared {} but {} produces {}",
                        stmt.target,
                        existing.dimensions(),
                        stmt.kind,
                        shape
                    )));
                }
                existing.is_output = true;
                if !self.produced.contains(&stmt.target) && !self.consumed.contains(&stmt.target) {
                    existing.is_input = false;
                }
            }
            None => {
                debug!(matrix = %stmt.target, shape = %shape, "synthesizing output matrix");
                self.index.insert(stmt.target.clone(), self.matrices.len());
                self.matrices
                    .push(MatrixDescriptor::output(&stmt.target, shape.rows, shape.cols));
            }
        }
        self.produced.insert(stmt.target.clone());

        Ok(Operation::new(stmt.kind, stmt.operands, stmt.target))
    }

    fn result_shape(&self, stmt: &Statement) -> CompileResult<Dimensions> {
        let shapes: Vec<Dimensions> = stmt
            .operands
            .iter()
            .filter_map(|name| self.lookup(name).map(MatrixDescriptor::dimensions))
            .collect();

        match (stmt.kind, shapes.as_slice()) {
            (OperationKind::Multiply, [left, right]) => {
                if left.cols != right.rows {
                    return Err(CompileError::mismatch(format!(
                        "{}({}) * {}({})",
                        stmt.operands[0], left, stmt.operands[1], right
                    )));
                }
                Ok(Dimensions::new(left.rows, right.cols))
            }
            (OperationKind::Add | OperationKind::Subtract, [left, right]) => {
                if left != right {
                    return Err(CompileError::mismatch(format!(
                        "{} needs equal shapes, got {} and {}",
                        stmt.kind, left, right
                    )));
                }
                Ok(*left)
            }
            (OperationKind::Transpose, [inner]) => Ok(Dimensions::new(inner.cols, inner.rows)),
            _ => Err(CompileError::parse_error(format!(
                "{} expects {} operand(s), got {}",
                stmt.kind,
                stmt.kind.arity(),
                shapes.len()
            ))),
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
