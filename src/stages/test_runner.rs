//! Test Runner Stage: runs a submission once per test case under the
//! supervisor and compares normalized stdout to the expected output.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::model::{Attempt, ExecutionStatus, Verdict};
use crate::profile::Profile;
use crate::supervisor::{self, RunRequest};
use crate::verdict::{classify, normalize_lines, normalize_output, RunOutcome};
use crate::workspace::Workspace;

/// Runs every test case in order, stopping at the first non-passing one.
/// Returns the attempt's final [`Verdict`].
pub fn run_tests(
    attempt: &Attempt,
    profile: &Profile,
    workspace: &Workspace,
    src_path: &std::path::Path,
) -> Verdict {
    let exe = workspace.exe_path();
    let cmd = profile.expand_run(
        &src_path.display().to_string(),
        &exe.display().to_string(),
        &workspace.path().display().to_string(),
        attempt.memory_limit_megabytes,
    );
    let env_overrides = crate::profile::env_overrides(
        attempt.programming_language,
        attempt.memory_limit_megabytes,
    );

    let mut max_elapsed = 0.0f64;
    let mut max_peak_mb = 0.0f64;

    for (idx, test) in attempt.tests.iter().enumerate() {
        let test_number = idx as u32 + 1;
        let stdin = build_stdin(&test.input);

        tracing::debug!(attempt_id = attempt.id, test_number, "running test");

        let req = RunRequest {
            cmd: &cmd,
            stdin: stdin.as_bytes(),
            time_limit_secs: attempt.time_limit_seconds,
            memory_limit_mb: attempt.memory_limit_megabytes,
            is_compilation: false,
            workdir: workspace.path(),
            env_overrides: &env_overrides,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let result = supervisor::run(&req);

        match classify(&result, attempt.memory_limit_megabytes) {
            RunOutcome::OutputLimitExceeded => {
                return Verdict::failed(attempt.id, ExecutionStatus::OutputLimitExceeded)
                    .with_failed_test(test_number);
            }
            RunOutcome::MemoryLimitExceeded => {
                return Verdict::failed(attempt.id, ExecutionStatus::MemoryLimitExceeded)
                    .with_failed_test(test_number);
            }
            RunOutcome::TimeLimitExceeded => {
                return Verdict::failed(attempt.id, ExecutionStatus::TimeLimitExceeded)
                    .with_failed_test(test_number);
            }
            RunOutcome::RuntimeError(stderr) => {
                return Verdict::failed(attempt.id, ExecutionStatus::RuntimeError)
                    .with_failed_test(test_number)
                    .with_error(stderr);
            }
            RunOutcome::Passed => {
                let actual = normalize_output(&result.stdout);
                let expected = normalize_lines(&test.expected_output);
                if actual != expected {
                    return Verdict::failed(attempt.id, ExecutionStatus::WrongAnswer)
                        .with_failed_test(test_number)
                        .with_outputs(result.stdout.clone(), test.expected_output.join("\n"));
                }
                max_elapsed = max_elapsed.max(result.elapsed_secs);
                max_peak_mb = max_peak_mb.max(result.peak_rss_mib);
            }
        }
    }

    Verdict::ok(attempt.id, max_elapsed, max_peak_mb)
}

/// Input lines are joined with `\n` and a trailing `\n` is appended
/// unconditionally — even a zero-line test case produces `"\n"`, so a
/// submission that unconditionally reads one line sees a blank line rather
/// than immediate EOF.
fn build_stdin(input: &[String]) -> String {
    let mut s = input.join("\n");
    s.push('\n');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_stdin_joins_with_trailing_newline() {
        let input = vec!["5".to_string()];
        assert_eq!(build_stdin(&input), "5\n");
    }

    #[test]
    fn build_stdin_of_empty_input_is_a_lone_newline() {
        let input: Vec<String> = vec![];
        assert_eq!(build_stdin(&input), "\n");
    }

    #[test]
    fn build_stdin_joins_multiple_lines() {
        let input = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        assert_eq!(build_stdin(&input), "1\n2\n3\n");
    }
}
