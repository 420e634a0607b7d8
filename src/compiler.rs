//! Compiler driver
//!
//! Runs one compilation through the stages
//! `Idle -> Parsed -> Optimized -> Generated -> Written`:
//! front end, operation passes, code generation, instruction passes and
//! serialization. The driver owns the memory mapper and lends it to the
//! code generator for the duration of a compile.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::analyzer::Analyzer;
use crate::ast::SourceProgram;
use crate::codegen::{CodeGenerator, CodegenOptions, UnsupportedOpPolicy};
use crate::error::{CompileError, CompileResult};
use crate::hardware::{ArchConfig, CompiledProgram};
use crate::isa::Instruction;
use crate::memory::MemoryMapper;
use crate::optimizer::{Optimizer, MAX_OPT_LEVEL};
use crate::parser::Parser;

/// Source of matrices and operations for a compile
pub trait Frontend {
    fn parse(&self, source: &str) -> CompileResult<SourceProgram>;
}

/// Default front end: permissive matrix parser plus analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFrontend;

impl Frontend for SourceFrontend {
    fn parse(&self, source: &str) -> CompileResult<SourceProgram> {
        let unit = Parser::new(source).parse_unit()?;
        Analyzer::new().analyze(unit)
    }
}

/// Compiler settings
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub optimization_level: u8,
    pub verbose: bool,
    pub unsupported_ops: UnsupportedOpPolicy,
    pub arch: ArchConfig,
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the optimization level. Values outside `0..=3` fall back to 0
    /// with a warning.
    pub fn with_optimization_level(mut self, level: i64) -> Self {
        self.optimization_level = clamp_level(level);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_unsupported_ops(mut self, policy: UnsupportedOpPolicy) -> Self {
        self.unsupported_ops = policy;
        self
    }

    pub fn with_arch(mut self, arch: ArchConfig) -> Self {
        self.arch = arch;
        self
    }
}

fn clamp_level(level: i64) -> u8 {
    match u8::try_from(level) {
        Ok(level) if level <= MAX_OPT_LEVEL => level,
        _ => {
            warn!("{}", CompileError::InvalidOptimizationLevel { level });
            0
        }
    }
}

/// Progress of the current compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompileStage {
    Idle,
    Parsed,
    Optimized,
    Generated,
    Written,
}

/// pPIM compiler
pub struct Compiler<F: Frontend = SourceFrontend> {
    frontend: F,
    options: CompilerOptions,
    mapper: MemoryMapper,
    stage: CompileStage,
    instructions: Vec<Instruction>,
}

impl Compiler<SourceFrontend> {
    pub fn new(options: CompilerOptions) -> CompileResult<Self> {
        Self::with_frontend(SourceFrontend, options)
    }
}

impl<F: Frontend> Compiler<F> {
    pub fn with_frontend(frontend: F, options: CompilerOptions) -> CompileResult<Self> {
        let mapper = MemoryMapper::with_arch(&options.arch)?;
        Ok(Self {
            frontend,
            options,
            mapper,
            stage: CompileStage::Idle,
            instructions: Vec::new(),
        })
    }

    pub fn set_optimization_level(&mut self, level: i64) {
        self.options.optimization_level = clamp_level(level);
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.options.verbose = verbose;
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn stage(&self) -> CompileStage {
        self.stage
    }

    /// Memory placement of the last compilation
    pub fn memory_map(&self) -> &MemoryMapper {
        &self.mapper
    }

    /// Instruction stream of the last compilation
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn advance(&mut self, next: CompileStage) {
        debug_assert!(next > self.stage, "stage {:?} -> {:?}", self.stage, next);
        debug!(from = ?self.stage, to = ?next, "stage transition");
        self.stage = next;
    }

    /// Compile an already parsed program
    pub fn compile_program(&mut self, program: SourceProgram) -> CompileResult<CompiledProgram> {
        self.stage = CompileStage::Idle;
        self.instructions.clear();
        self.mapper.reset();
        self.advance(CompileStage::Parsed);
        self.lower(program)
    }

    /// Run the front end over `source` and compile the result
    pub fn compile_source(&mut self, source: &str) -> CompileResult<CompiledProgram> {
        self.stage = CompileStage::Idle;
        self.instructions.clear();
        self.mapper.reset();

        let program = self.frontend.parse(source)?;
        self.advance(CompileStage::Parsed);
        if self.options.verbose {
            info!(
                matrices = program.matrices.len(),
                operations = program.operations.len(),
                "parsed source"
            );
        }
        self.lower(program)
    }

    /// Compile `input` and write the assembly listing to `output`. Nothing
    /// is written unless the whole compile succeeds.
    pub fn compile(&mut self, input: &Path, output: &Path) -> CompileResult<CompiledProgram> {
        info!(input = %input.display(), output = %output.display(), level = self.options.optimization_level, "compiling");

        let source = fs::read_to_string(input).map_err(|e| CompileError::io(input, e))?;
        let program = self.compile_source(&source)?;

        fs::write(output, program.to_assembly()).map_err(|e| CompileError::io(output, e))?;
        self.advance(CompileStage::Written);

        info!(instructions = program.instructions.len(), "wrote {}", output.display());
        Ok(program)
    }

    fn lower(&mut self, program: SourceProgram) -> CompileResult<CompiledProgram> {
        let optimizer = Optimizer::for_level(self.options.optimization_level, self.options.verbose);

        let operations = optimizer.optimize_operations(program.operations)?;
        self.advance(CompileStage::Optimized);

        let codegen_options = CodegenOptions {
            unsupported_ops: self.options.unsupported_ops,
            verbose: self.options.verbose,
        };
        let mut codegen = CodeGenerator::new(&mut self.mapper, codegen_options);
        let instructions = codegen.generate(&program.matrices, &operations)?;
        let matrices = codegen.into_matrices();

        let instructions = optimizer.optimize_instructions(instructions)?;
        self.advance(CompileStage::Generated);

        self.instructions = instructions.clone();
        Ok(CompiledProgram::new(
            matrices,
            self.mapper.bindings().to_vec(),
            instructions,
            &self.options.arch,
        ))
    }
}
