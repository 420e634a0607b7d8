//! Example: Matrices Spanning Several Memory Rows
//!
//! Demonstrates how the memory mapper spreads larger matrices over
//! multiple rows and how the hardware profile changes the placement.
//!
//! Run with: cargo run --example matmul_large

use ppim_compiler::{compile_source, ArchConfig, CompileError, CompilerOptions, MemoryMapper};

fn main() {
    println!("=== Large Matrix Multiplication ===\n");

    // Example 1: 20x30 * 30x40 on the reference profile
    println!("Example 1: 20x30 * 30x40 (256 elements per row)");
    let source = "Matrix A(20, 30); Matrix B(30, 40); C = A * B;";
    let program = compile_source(source, CompilerOptions::default()).unwrap();

    for binding in &program.bindings {
        let range = binding.range();
        println!(
            "  {} ({}, {} elements) -> {} row(s) at {}..={}",
            binding.name,
            binding.dimensions,
            binding.dimensions.elements(),
            binding.size,
            range.start,
            range.end
        );
    }
    println!("  Instructions: {}", program.stats.total());
    println!("  Total cycles: {}", program.stats.total_cycles);
    println!();

    // Example 2: same program on a profile with narrower rows
    println!("Example 2: same program with 64 elements per row");
    let narrow = ArchConfig {
        elements_per_row: 64,
        ..ArchConfig::default()
    };
    let options = CompilerOptions::new().with_arch(narrow);
    let program = compile_source(source, options).unwrap();

    for binding in &program.bindings {
        println!("  {} -> {} row(s)", binding.name, binding.size);
    }
    println!();

    // Example 3: a program that does not fit in memory
    println!("Example 3: 256x256 * 256x256");
    let source = "Matrix A(256, 256); Matrix B(256, 256); C = A * B;";
    match compile_source(source, CompilerOptions::default()) {
        Err(CompileError::OutOfSpace {
            name,
            requested,
            available,
        }) => println!(
            "  '{}' needs {} rows but only {} are free",
            name, requested, available
        ),
        other => println!("  unexpected result: {:?}", other.map(|p| p.stats.total())),
    }
    println!();

    // Rows needed per matrix on the reference profile
    let mapper = MemoryMapper::new();
    println!("Rows per square matrix:");
    for n in [16u32, 64, 128, 256] {
        let rows = mapper.calculate_matrix_size(ppim_compiler::Dimensions::new(n, n));
        println!("  {}x{} -> {}", n, n, rows);
    }
}
