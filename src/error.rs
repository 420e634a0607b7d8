//! Error types for the pPIM compiler

use std::path::PathBuf;
use thiserror::Error;

/// Result type for compilation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Field overflow: {field} = {value} exceeds maximum {max}")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("Matrix '{name}' is already mapped")]
    AlreadyMapped { name: String },

    #[error("Not enough memory space to map matrix '{name}': needs {requested} rows, {available} available")]
    OutOfSpace {
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("Matrix '{name}' is not mapped")]
    NotMapped { name: String },

    #[error("Index ({row}, {col}) out of range for matrix '{name}' of shape ({rows}, {cols})")]
    IndexOutOfRange {
        name: String,
        row: u32,
        col: u32,
        rows: u32,
        cols: u32,
    },

    #[error("Dimension mismatch: {message}")]
    DimensionMismatch { message: String },

    #[error("Matrix '{name}' used in operation but not declared")]
    MissingMatrix { name: String },

    #[error("Matrix '{name}' is both an operand and the result of {kind}")]
    AliasedOutput { name: String, kind: String },

    #[error("Unsupported operation {kind} producing '{output}'")]
    UnsupportedOperation { kind: String, output: String },

    #[error("Invalid optimization level {level}, using level 0")]
    InvalidOptimizationLevel { level: i64 },

    #[error("Invalid encoding: {message}")]
    InvalidEncoding { message: String },

    #[error("Parser error: {message}")]
    ParseError { message: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    pub fn overflow(field: &'static str, value: impl Into<u64>, max: u64) -> Self {
        CompileError::FieldOverflow {
            field,
            value: value.into(),
            max,
        }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        CompileError::ParseError { message: msg.into() }
    }

    pub fn missing(name: impl Into<String>) -> Self {
        CompileError::MissingMatrix { name: name.into() }
    }

    pub fn not_mapped(name: impl Into<String>) -> Self {
        CompileError::NotMapped { name: name.into() }
    }

    pub fn mismatch(msg: impl Into<String>) -> Self {
        CompileError::DimensionMismatch { message: msg.into() }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        CompileError::InvalidEncoding { message: msg.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::Io {
            path: path.into(),
            source,
        }
    }
}
