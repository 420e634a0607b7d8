//! Example: 3x2 by 2x4 Matrix Multiplication
//!
//! Compiles the reference program and prints the memory map, the first
//! instructions of the stream and its encoded form.
//!
//! Run with: cargo run --example matmul_3x2x4

use ppim_compiler::{compile_source, isa, CompilerOptions, Instruction};

const SOURCE: &str = r#"
#include "matrix.h"

int main() {
    Matrix<int> A(3, 2);
    Matrix<int> B(2, 4);
    Matrix<int> C(3, 4);

    C = A * B;
    return 0;
}
"#;

fn main() {
    println!("=== 3x2 * 2x4 Matrix Multiplication Example ===\n");

    let program = compile_source(SOURCE, CompilerOptions::default()).unwrap();

    println!("Memory map:");
    for binding in &program.bindings {
        let range = binding.range();
        println!(
            "  {} ({}) -> rows {}..={}",
            binding.name, binding.dimensions, range.start, range.end
        );
    }
    println!();

    // 3 PROG + 12 output elements * (2 * (read, read, compute) + write) + END
    println!("Instructions: {}", program.instructions.len());
    println!("First output element:");
    for instr in program.instructions.iter().skip(3).take(7) {
        println!("  {:05x}  {}", instr.encode(), instr);
    }
    println!();

    // The listing parses back to the same stream, apart from read pointers
    let listing = program.to_assembly();
    let parsed = isa::parse_listing(&listing).unwrap();
    let exe = parsed
        .iter()
        .filter(|i| matches!(i, Instruction::Exe { .. }))
        .count();
    println!("Parsed {} lines back, {} EXE instructions", parsed.len(), exe);
    println!();

    println!("{}", program);
}
