//! pPIM Matrix Compiler CLI
//!
//! Usage:
//!   ppimc matmul.cpp matmul.asm
//!   ppimc -O2 -v matmul.cpp matmul.asm
//!   ppimc --format hex --stats matmul.cpp matmul.hex

use clap::error::ErrorKind;
use clap::{Parser as ClapParser, ValueEnum};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::Level;

use ppim_compiler::{
    CompileError, CompileResult, CompiledProgram, Compiler, CompilerOptions, UnsupportedOpPolicy,
};

#[derive(ClapParser, Debug)]
#[command(name = "ppimc")]
#[command(author = "pPIM Team")]
#[command(version = "0.1.0")]
#[command(about = "Compiles matrix multiplications to pPIM instruction streams")]
struct Args {
    /// Source file with matrix declarations and operations
    #[arg(value_name = "INPUT")]
    input_file: PathBuf,

    /// File to write the compiled program to
    #[arg(value_name = "OUTPUT")]
    output_file: PathBuf,

    /// Optimization level (0-3)
    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 0, allow_negative_numbers = true)]
    opt_level: i64,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Fail on operations that have no pPIM lowering instead of skipping them
    #[arg(long = "strict")]
    strict: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Asm)]
    format: OutputFormat,

    /// Print instruction statistics after compiling
    #[arg(long = "stats")]
    stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Assembly listing
    Asm,
    /// One encoded 19-bit word per line
    Hex,
    /// Full program as JSON
    Json,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            // Help goes to stdout, usage errors to stderr
            let _ = e.print();
            process::exit(code);
        }
    };

    init_logging(args.verbose);

    if args.verbose {
        println!("{}", "pPIM Matrix Compiler".bold().blue());
        println!("{}", "=".repeat(20));
        println!();
        println!("{}: {}", "Input".green(), args.input_file.display());
        println!("{}: {}", "Output".green(), args.output_file.display());
        println!("{}: {:?}", "Format".green(), args.format);
        println!();
    }

    let program = match run(&args) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}: {}", "Compilation failed".red().bold(), e);
            process::exit(1);
        }
    };

    println!(
        "{} {} ({} instructions)",
        "Compiled".green().bold(),
        args.output_file.display(),
        program.instructions.len()
    );

    if args.stats || args.verbose {
        print_stats(&program);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> CompileResult<CompiledProgram> {
    let policy = if args.strict {
        UnsupportedOpPolicy::Reject
    } else {
        UnsupportedOpPolicy::Skip
    };
    let options = CompilerOptions::new()
        .with_verbose(args.verbose)
        .with_unsupported_ops(policy);

    let mut compiler = Compiler::new(options)?;
    compiler.set_optimization_level(args.opt_level);

    match args.format {
        OutputFormat::Asm => compiler.compile(&args.input_file, &args.output_file),
        OutputFormat::Hex | OutputFormat::Json => {
            let source = fs::read_to_string(&args.input_file)
                .map_err(|e| CompileError::io(&args.input_file, e))?;
            let program = compiler.compile_source(&source)?;
            let text = match args.format {
                OutputFormat::Hex => program.to_hex(),
                _ => program
                    .to_json()
                    .map_err(|e| CompileError::encoding(format!("failed to serialize to JSON: {}", e)))?,
            };
            write_output(&args.output_file, &text)?;
            Ok(program)
        }
    }
}

fn write_output(path: &Path, text: &str) -> CompileResult<()> {
    fs::write(path, text).map_err(|e| CompileError::io(path, e))
}

fn print_stats(program: &CompiledProgram) {
    println!();
    println!("{}", "Program Statistics".bold().yellow());
    println!("{}", "-".repeat(40));

    for binding in &program.bindings {
        let range = binding.range();
        println!(
            "  {} {} ({}) -> rows {}..={}",
            "Matrix".cyan(),
            binding.name,
            binding.dimensions,
            range.start,
            range.end
        );
    }

    let stats = &program.stats;
    println!("  {}: {}", "PROG".cyan(), stats.prog);
    println!("  {}: {}", "Read".cyan(), stats.read + stats.read_write);
    println!("  {}: {}", "Write".cyan(), stats.write + stats.read_write);
    println!("  {}: {}", "Compute".cyan(), stats.compute);
    println!("  {}: {}", "Total".cyan(), stats.total());
    println!("  {}: {} cycles", "Estimated".cyan(), stats.total_cycles);
    println!("  {}: {:.3} us", "Runtime".cyan(), stats.execution_us);
}
