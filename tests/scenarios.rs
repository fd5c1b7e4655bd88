//! End-to-end scenarios that exercise real subprocesses rather than mocking
//! the OS. Requires `gcc` and `python3` on `PATH`.

use judge_core::model::{Attempt, ExecutionStatus, Language, TestCase};

fn attempt(
    language: Language,
    source: &str,
    time_limit_seconds: u32,
    memory_limit_megabytes: u32,
    tests: Vec<TestCase>,
) -> Attempt {
    Attempt {
        id: 1,
        programming_language: language,
        source_code: source.to_string(),
        time_limit_seconds,
        memory_limit_megabytes,
        tests,
    }
}

fn test_case(input: &[&str], expected: &[&str]) -> TestCase {
    TestCase {
        input: input.iter().map(|s| s.to_string()).collect(),
        expected_output: expected.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn memory_exhaustion_is_mle() {
    let source = r#"
import sys
chunks = []
while True:
    chunks.append(bytearray(50 * 1024 * 1024))
"#;
    let a = attempt(Language::Python, source, 10, 20, vec![test_case(&[], &[""])]);
    let v = judge_core::executor::execute(&a);
    assert_eq!(v.status, ExecutionStatus::MemoryLimitExceeded);
}

#[test]
fn output_flood_is_ole() {
    let source = r#"
print("x" * (20 * 1024 * 1024))
"#;
    let a = attempt(Language::Python, source, 5, 128, vec![test_case(&[], &[""])]);
    let v = judge_core::executor::execute(&a);
    assert_eq!(v.status, ExecutionStatus::OutputLimitExceeded);
}

#[test]
fn cpp_missing_semicolon_is_compilation_error() {
    let source = r#"
#include <iostream>
int main() {
    std::cout << "hi" << std::endl
    return 0;
}
"#;
    let a = attempt(Language::Cpp, source, 5, 256, vec![test_case(&[], &[""])]);
    let v = judge_core::executor::execute(&a);
    assert_eq!(v.status, ExecutionStatus::CompilationError);
    assert!(v.error_traceback.is_some());
    assert!(v.failed_test_number.is_none());
}

#[test]
fn c_division_by_zero_traps() {
    let source = r#"
int main() {
    volatile int a = 1;
    volatile int b = 0;
    return a / b;
}
"#;
    let a = attempt(Language::C, source, 5, 64, vec![test_case(&[], &[""])]);
    let v = judge_core::executor::execute(&a);
    assert_eq!(v.status, ExecutionStatus::RuntimeError);
}

#[test]
fn c_infinite_loop_is_tle() {
    let source = r#"
int main() {
    volatile int x = 0;
    while (1) { x++; }
    return 0;
}
"#;
    let mut a = attempt(Language::C, source, 2, 64, vec![test_case(&[], &[""])]);
    a.time_limit_seconds = 2;
    let v = judge_core::executor::execute(&a);
    assert_eq!(v.status, ExecutionStatus::TimeLimitExceeded);
    assert_eq!(v.failed_test_number, Some(1));
}

#[test]
fn early_exit_stops_before_second_test() {
    // First test fails (wrong answer); a second, always-passing test must
    // never be reported as run.
    let source = "input()\nprint(1)\n";
    let a = attempt(
        Language::Python,
        source,
        5,
        64,
        vec![test_case(&["1"], &["999"]), test_case(&["1"], &["1"])],
    );
    let v = judge_core::executor::execute(&a);
    assert_eq!(v.status, ExecutionStatus::WrongAnswer);
    assert_eq!(v.failed_test_number, Some(1));
}
