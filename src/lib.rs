//! pPIM Matrix Compiler
//!
//! This library compiles matrix declarations and multiplications written in
//! a small C++-like source form into instruction streams for a pPIM
//! (processing-in-memory) accelerator cluster. Matrices are placed in the
//! accelerator's row-addressed memory, every multiplication is lowered to a
//! per-element read/MAC/write sequence, and the result is serialized as an
//! assembly listing, encoded 19-bit words, or JSON.
//!
//! # Example
//!
//! ```rust
//! use ppim_compiler::{compile_source, CompilerOptions};
//!
//! let source = "Matrix A(3, 2); Matrix B(2, 4); C = A * B;";
//! let program = compile_source(source, CompilerOptions::default()).unwrap();
//! assert_eq!(program.stats.compute, 3 * 4 * 2);
//! println!("{}", program.to_assembly());
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod analyzer;
pub mod isa;
pub mod memory;
pub mod codegen;
pub mod optimizer;
pub mod hardware;
pub mod compiler;
pub mod error;

pub use ast::*;
pub use parser::Parser;
pub use analyzer::Analyzer;
pub use isa::{CoreOp, CorePtr, EncodedFields, ExeKind, Instruction, Opcode, RowAddress};
pub use memory::{AddressRange, MemoryBinding, MemoryMapper};
pub use codegen::{CodeGenerator, CodegenOptions, UnsupportedOpPolicy};
pub use optimizer::Optimizer;
pub use hardware::{ArchConfig, CompiledProgram, StreamStats};
pub use compiler::{CompileStage, Compiler, CompilerOptions, Frontend, SourceFrontend};
pub use error::{CompileError, CompileResult};

/// Compile source text to a pPIM program
pub fn compile_source(source: &str, options: CompilerOptions) -> CompileResult<CompiledProgram> {
    let mut compiler = Compiler::new(options)?;
    compiler.compile_source(source)
}

/// Compile an already analyzed program, bypassing the front end
pub fn compile_program(
    program: SourceProgram,
    options: CompilerOptions,
) -> CompileResult<CompiledProgram> {
    let mut compiler = Compiler::new(options)?;
    compiler.compile_program(program)
}
