//! End-to-end tests: source text in, instruction stream and files out

use std::fs;
use std::process::Command;

use pretty_assertions::assert_eq;
use ppim_compiler::{
    compile_program, compile_source, isa, CompileError, CompilerOptions, ExeKind, Instruction,
    MatrixDescriptor, Operation, Optimizer, SourceProgram,
};

const MATMUL: &str = r#"
#include "matrix.h"

// C = A * B on the accelerator
int main() {
    Matrix<int> A(3, 2);
    Matrix<int> B(2, 4);
    C = A * B;
    return 0;
}
"#;

fn count(stream: &[Instruction], kind: ExeKind) -> usize {
    stream.iter().filter(|i| i.exe_kind() == Some(kind)).count()
}

#[test]
fn test_matmul_instruction_counts() {
    let program = compile_source(MATMUL, CompilerOptions::default()).unwrap();
    let stream = &program.instructions;
    let (n, m, p) = (3, 2, 4);

    let progs = stream
        .iter()
        .filter(|i| matches!(i, Instruction::Prog { .. }))
        .count();
    assert_eq!(progs, 3);
    assert_eq!(count(stream, ExeKind::Read), n * p * 2 * m);
    assert_eq!(count(stream, ExeKind::Compute), n * p * m);
    assert_eq!(count(stream, ExeKind::Write), n * p);
    assert_eq!(stream.last(), Some(&Instruction::End));
    assert_eq!(stream.len(), 3 + n * p * (3 * m + 1) + 1);

    assert_eq!(program.stats.read, n * p * 2 * m);
    assert_eq!(program.stats.total(), stream.len());
}

#[test]
fn test_reads_precede_compute_and_write_follows() {
    let program = compile_source(MATMUL, CompilerOptions::default()).unwrap();
    let body = &program.instructions[3..program.instructions.len() - 1];

    let mut pending_reads = 0;
    let mut computes_since_write = 0;
    for instr in body {
        match instr.exe_kind() {
            Some(ExeKind::Read) => pending_reads += 1,
            Some(ExeKind::Compute) => {
                assert_eq!(pending_reads, 2, "compute must follow its two reads");
                pending_reads = 0;
                computes_since_write += 1;
            }
            Some(ExeKind::Write) => {
                assert_eq!(pending_reads, 0);
                assert_eq!(computes_since_write, 2, "write must follow the full accumulation");
                computes_since_write = 0;
            }
            other => panic!("unexpected instruction kind {:?}", other),
        }
    }
}

#[test]
fn test_role_inference() {
    let unit = ppim_compiler::Parser::new(MATMUL).parse_unit().unwrap();
    let program = ppim_compiler::Analyzer::new().analyze(unit).unwrap();

    assert_eq!(
        program.matrices,
        vec![
            MatrixDescriptor::input("A", 3, 2),
            MatrixDescriptor::input("B", 2, 4),
            MatrixDescriptor::output("C", 3, 4),
        ]
    );
    assert_eq!(program.operations, vec![Operation::multiply("A", "B", "C")]);
}

#[test]
fn test_dimension_mismatch_fails() {
    let source = "Matrix A(3, 2); Matrix B(3, 4); C = A * B;";
    let result = compile_source(source, CompilerOptions::default());
    assert!(matches!(result, Err(CompileError::DimensionMismatch { .. })));
}

#[test]
fn test_undeclared_operands_fail() {
    let source = "Matrix A(3, 2); Matrix B(2, 4); C = Ax * Bx;";
    let result = compile_source(source, CompilerOptions::default());
    assert!(matches!(result, Err(CompileError::MissingMatrix { name }) if name == "Ax"));
}

#[test]
fn test_in_place_multiply_fails() {
    let source = "Matrix A(2, 2); Matrix B(2, 2); A = A * B;";
    let result = compile_source(source, CompilerOptions::default());
    assert!(matches!(result, Err(CompileError::AliasedOutput { name, .. }) if name == "A"));

    // Same program handed straight to the backend
    let program = SourceProgram::new(
        vec![
            MatrixDescriptor::input("A", 2, 2),
            MatrixDescriptor::input("B", 2, 2),
        ],
        vec![Operation::multiply("A", "B", "A")],
    );
    let result = compile_program(program, CompilerOptions::default());
    assert!(matches!(result, Err(CompileError::AliasedOutput { .. })));
}

#[test]
fn test_backend_rejects_mismatch_without_front_end() {
    let program = SourceProgram::new(
        vec![
            MatrixDescriptor::input("A", 3, 2),
            MatrixDescriptor::input("B", 3, 4),
        ],
        vec![Operation::multiply("A", "B", "C")],
    );
    let result = compile_program(program, CompilerOptions::default());
    assert!(matches!(result, Err(CompileError::DimensionMismatch { .. })));
}

#[test]
fn test_missing_matrix_fails() {
    let program = SourceProgram::new(
        vec![MatrixDescriptor::input("A", 3, 2)],
        vec![Operation::multiply("A", "Ghost", "C")],
    );
    let result = compile_program(program, CompilerOptions::default());
    assert!(matches!(result, Err(CompileError::MissingMatrix { name }) if name == "Ghost"));
}

#[test]
fn test_level_zero_is_identity() {
    let ops = vec![
        Operation::multiply("A", "B", "C"),
        Operation::multiply("A", "B", "C"),
    ];
    let optimizer = Optimizer::for_level(0, false);
    assert_eq!(optimizer.optimize_operations(ops.clone()).unwrap(), ops);

    let stream = compile_source(MATMUL, CompilerOptions::default())
        .unwrap()
        .instructions;
    assert_eq!(optimizer.optimize_instructions(stream.clone()).unwrap(), stream);
}

#[test]
fn test_repeated_statement_removed_at_level_one() {
    let source = "Matrix A(2, 2); Matrix B(2, 2); C = A * B; C = A * B;";

    let plain = compile_source(source, CompilerOptions::default()).unwrap();
    let optimized =
        compile_source(source, CompilerOptions::new().with_optimization_level(1)).unwrap();

    assert_eq!(plain.stats.write, 2 * 4);
    assert_eq!(optimized.stats.write, 4);
}

#[test]
fn test_listing_round_trip() {
    let program = compile_source(MATMUL, CompilerOptions::default()).unwrap();
    let parsed = isa::parse_listing(&program.to_assembly()).unwrap();

    assert_eq!(parsed.len(), program.instructions.len());
    for (original, reparsed) in program.instructions.iter().zip(&parsed) {
        assert_eq!(original.render(), reparsed.render());
        assert_eq!(original.opcode(), reparsed.opcode());
    }
}

#[test]
fn test_hex_words_decode() {
    let program = compile_source(MATMUL, CompilerOptions::default()).unwrap();
    let hex = program.to_hex();

    for (line, instr) in hex.lines().zip(&program.instructions) {
        let word = u32::from_str_radix(line, 16).unwrap();
        assert!(word < 1 << 19);
        assert_eq!(isa::decode(word).unwrap(), instr.fields());
    }
}

#[test]
fn test_json_export() {
    let program = compile_source(MATMUL, CompilerOptions::default()).unwrap();
    let json = program.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["bindings"].as_array().map(Vec::len), Some(3));
    assert_eq!(value["instructions"][0]["opcode"], "prog");
}

#[test]
fn test_compile_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("matmul.cpp");
    let output = dir.path().join("matmul.asm");
    fs::write(&input, MATMUL).unwrap();

    let mut compiler = ppim_compiler::Compiler::new(CompilerOptions::default()).unwrap();
    compiler.compile(&input, &output).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3 + 12 * 7 + 1);
    assert!(lines[0].starts_with("PROG Core0 MULTIPLIER"));
    assert!(lines[1].starts_with("PROG Core1 ADDER"));
    assert!(lines[2].starts_with("PROG Core2 MAC"));
    assert_eq!(lines[3], "EXE Read RowAddress0");
    assert_eq!(lines[4], "EXE Read RowAddress1");
    assert_eq!(lines[5], "EXE CorePtr2 RowAddress2");
    assert_eq!(lines.last(), Some(&"END"));
}

#[test]
fn test_cli_compiles_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("matmul.cpp");
    let output = dir.path().join("matmul.asm");
    fs::write(&input, MATMUL).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_ppimc"))
        .arg("-O2")
        .arg(&input)
        .arg(&output)
        .status()
        .unwrap();

    assert!(status.success());
    assert!(fs::read_to_string(&output).unwrap().ends_with("END\n"));
}

#[test]
fn test_cli_exit_codes() {
    let help = Command::new(env!("CARGO_BIN_EXE_ppimc"))
        .arg("--help")
        .output()
        .unwrap();
    assert_eq!(help.status.code(), Some(0));

    let missing_args = Command::new(env!("CARGO_BIN_EXE_ppimc")).output().unwrap();
    assert_eq!(missing_args.status.code(), Some(1));
    assert!(!missing_args.stderr.is_empty());

    let unknown = Command::new(env!("CARGO_BIN_EXE_ppimc"))
        .args(["--bogus", "in.cpp", "out.asm"])
        .output()
        .unwrap();
    assert_eq!(unknown.status.code(), Some(1));
}

#[test]
fn test_cli_rejects_undeclared_operands() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("typo.cpp");
    let output = dir.path().join("typo.asm");
    fs::write(&input, "Matrix A(3, 2); Matrix B(2, 4); C = Ax * Bx;").unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_ppimc"))
        .arg(&input)
        .arg(&output)
        .output()
        .unwrap();

    assert_eq!(result.status.code(), Some(1));
    assert!(!output.exists());
}

#[test]
fn test_cli_failed_compile_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.cpp");
    let output = dir.path().join("bad.asm");
    fs::write(&input, "Matrix A(3, 2); Matrix B(3, 4); C = A * B;").unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_ppimc"))
        .arg(&input)
        .arg(&output)
        .output()
        .unwrap();

    assert_eq!(result.status.code(), Some(1));
    assert!(!output.exists());
}
