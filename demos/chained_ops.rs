//! Example: Chained Matrix Operations
//!
//! Demonstrates compiling programs with several statements, including
//! operations the pPIM backend does not lower and the effect of the
//! optimization level.
//!
//! Run with: cargo run --example chained_ops

use ppim_compiler::{
    compile_source, CompilerOptions, Optimizer, Parser, Analyzer, UnsupportedOpPolicy,
};

fn main() {
    println!("=== Chained Matrix Operations Example ===\n");

    // Example 1: D = (A * B) * C
    println!("Example 1: T = A * B; D = T * C");
    println!("Where A is 2x3, B is 3x4, C is 4x2\n");

    let source = "
        Matrix A(2, 3);
        Matrix B(3, 4);
        Matrix C(4, 2);
        T = A * B;
        D = T * C;
    ";

    let unit = Parser::new(source).parse_unit().unwrap();
    let program = Analyzer::new().analyze(unit).unwrap();
    for matrix in &program.matrices {
        println!(
            "  {} {}x{} input={} output={}",
            matrix.name, matrix.rows, matrix.cols, matrix.is_input, matrix.is_output
        );
    }

    let compiled = compile_source(source, CompilerOptions::default()).unwrap();
    println!("  Instructions: {}", compiled.stats.total());
    println!("  Compute steps: {}", compiled.stats.compute);
    println!();

    // Example 2: element-wise addition has no lowering
    println!("Example 2: E = A * B; F = E + E");
    let source = "Matrix A(2, 2); Matrix B(2, 2); E = A * B; F = E + E;";

    let skipped = compile_source(source, CompilerOptions::default()).unwrap();
    println!("  Default policy: {} instructions (addition skipped)", skipped.stats.total());

    let strict = CompilerOptions::new().with_unsupported_ops(UnsupportedOpPolicy::Reject);
    match compile_source(source, strict) {
        Ok(_) => println!("  Strict policy: compiled"),
        Err(e) => println!("  Strict policy: {}", e),
    }
    println!();

    // Example 3: repeated statements and optimization levels
    println!("Example 3: C = A * B written twice");
    let source = "Matrix A(2, 2); Matrix B(2, 2); C = A * B; C = A * B;";

    for level in 0..=3 {
        let options = CompilerOptions::new().with_optimization_level(level);
        let compiled = compile_source(source, options).unwrap();
        let passes = Optimizer::for_level(level as u8, false).pass_names();
        println!(
            "  -O{}: {:>3} instructions, passes {:?}",
            level,
            compiled.stats.total(),
            passes
        );
    }
}
