//! Source-level and resolved program definitions
//!
//! The parser produces [`SourceUnit`] (raw declarations and statements as
//! they appear in the input). The analyzer resolves these into a
//! [`SourceProgram`], the list of matrices and operations handed to the
//! code generator.

use serde::{Deserialize, Serialize};

/// Matrix declaration: `Matrix A(3, 4)` or `Matrix<int> A(3, 4)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub rows: u32,
    pub cols: u32,
}

/// Matrix statement: `C = A * B;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: OperationKind,
    pub target: String,
    pub operands: Vec<String>,
}

/// Everything the parser recognized in one source file, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceUnit {
    pub declarations: Vec<Declaration>,
    pub statements: Vec<Statement>,
}

/// Operation kinds understood by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Multiply,
    Add,
    Subtract,
    Transpose,
}

impl OperationKind {
    /// Number of input matrices the operation consumes
    pub fn arity(&self) -> usize {
        match self {
            OperationKind::Transpose => 1,
            _ => 2,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Multiply => write!(f, "MULTIPLY"),
            OperationKind::Add => write!(f, "ADD"),
            OperationKind::Subtract => write!(f, "SUBTRACT"),
            OperationKind::Transpose => write!(f, "TRANSPOSE"),
        }
    }
}

/// Shape and role of one matrix in the program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixDescriptor {
    pub name: String,
    pub rows: u32,
    pub cols: u32,
    pub is_input: bool,
    pub is_output: bool,
}

impl MatrixDescriptor {
    pub fn new(name: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            name: name.into(),
            rows,
            cols,
            is_input: false,
            is_output: false,
        }
    }

    pub fn input(name: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            is_input: true,
            ..Self::new(name, rows, cols)
        }
    }

    pub fn output(name: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            is_output: true,
            ..Self::new(name, rows, cols)
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.rows, self.cols)
    }
}

/// Matrix dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub rows: u32,
    pub cols: u32,
}

impl Dimensions {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn elements(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.cols)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// A single matrix operation: `output = kind(inputs...)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub inputs: Vec<String>,
    pub output: String,
}

impl Operation {
    pub fn new(kind: OperationKind, inputs: Vec<String>, output: impl Into<String>) -> Self {
        Self {
            kind,
            inputs,
            output: output.into(),
        }
    }

    pub fn multiply(left: impl Into<String>, right: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(
            OperationKind::Multiply,
            vec![left.into(), right.into()],
            output,
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}({})", self.output, self.kind, self.inputs.join(", "))
    }
}

/// Resolved input to the backend: declared matrices and operations in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProgram {
    pub matrices: Vec<MatrixDescriptor>,
    pub operations: Vec<Operation>,
}

impl SourceProgram {
    pub fn new(matrices: Vec<MatrixDescriptor>, operations: Vec<Operation>) -> Self {
        Self {
            matrices,
            operations,
        }
    }

    pub fn matrix(&self, name: &str) -> Option<&MatrixDescriptor> {
        self.matrices.iter().find(|m| m.name == name)
    }
}
