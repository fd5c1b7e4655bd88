//! Verdict Engine: precedence rules for classifying one [`SupervisorResult`]
//! into a run outcome, plus the output normalization rules used to compare
//! actual and expected output.

use crate::supervisor::SupervisorResult;

/// Signals treated as an auxiliary time-limit signal (rlimit CPU
/// enforcement and a race with the wall-clock killer often surface as one
/// of these rather than a clean SIGKILL).
const SIG_TLE: [i32; 4] = [libc::SIGXCPU, libc::SIGTRAP, libc::SIGKILL, libc::SIGFPE];

/// Result of classifying one supervised run, prior to output comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exited 0, empty stderr — proceed to compare stdout against expected.
    Passed,
    OutputLimitExceeded,
    MemoryLimitExceeded,
    TimeLimitExceeded,
    RuntimeError(String),
}

/// Apply the verdict precedence rules. `memory_limit_mb` is the attempt's (or
/// compilation's) memory budget, used for the 90%-of-limit OOM heuristic.
pub fn classify(result: &SupervisorResult, memory_limit_mb: u32) -> RunOutcome {
    if result.output_exceeded {
        return RunOutcome::OutputLimitExceeded;
    }
    if result.memory_exceeded {
        return RunOutcome::MemoryLimitExceeded;
    }
    if result.time_exceeded {
        return RunOutcome::TimeLimitExceeded;
    }

    if result.exit_status < 0 {
        let sig = -result.exit_status;
        let near_memory_limit = result.peak_rss_mib >= 0.9 * memory_limit_mb as f64;

        if SIG_TLE.contains(&sig) && !near_memory_limit {
            return RunOutcome::TimeLimitExceeded;
        }
        if sig == libc::SIGSEGV {
            let stderr = format!("Segmentation fault\n{}", result.stderr);
            return RunOutcome::RuntimeError(stderr);
        }
        if sig == libc::SIGKILL && near_memory_limit {
            return RunOutcome::MemoryLimitExceeded;
        }
        return RunOutcome::RuntimeError(result.stderr.clone());
    }

    if result.exit_status > 0 || !result.stderr.is_empty() {
        return RunOutcome::RuntimeError(result.stderr.clone());
    }

    RunOutcome::Passed
}

/// Split on newlines, trim each line, discard empty lines, join the rest
/// with a single space. Idempotent: normalizing an already-normalized
/// string yields the same bytes.
pub fn normalize_output(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_lines(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_result() -> SupervisorResult {
        SupervisorResult {
            stdout: String::new(),
            stderr: String::new(),
            elapsed_secs: 0.1,
            exit_status: 0,
            peak_rss_mib: 10.0,
            output_exceeded: false,
            time_exceeded: false,
            memory_exceeded: false,
            killed_by_supervisor: false,
            kill_reason: None,
        }
    }

    #[test]
    fn output_exceeded_wins_over_everything() {
        let mut r = base_result();
        r.output_exceeded = true;
        r.memory_exceeded = true;
        r.time_exceeded = true;
        assert_eq!(classify(&r, 64), RunOutcome::OutputLimitExceeded);
    }

    #[test]
    fn memory_exceeded_wins_over_time() {
        let mut r = base_result();
        r.memory_exceeded = true;
        r.time_exceeded = true;
        assert_eq!(classify(&r, 64), RunOutcome::MemoryLimitExceeded);
    }

    #[test]
    fn time_exceeded_flag_wins_over_signal_interpretation() {
        let mut r = base_result();
        r.time_exceeded = true;
        r.exit_status = -(libc::SIGSEGV);
        assert_eq!(classify(&r, 64), RunOutcome::TimeLimitExceeded);
    }

    #[test]
    fn sigxcpu_below_memory_threshold_is_tle() {
        let mut r = base_result();
        r.exit_status = -(libc::SIGXCPU);
        r.peak_rss_mib = 10.0;
        assert_eq!(classify(&r, 64), RunOutcome::TimeLimitExceeded);
    }

    #[test]
    fn sigsegv_is_runtime_error_with_prefix() {
        let mut r = base_result();
        r.exit_status = -(libc::SIGSEGV);
        r.stderr = "core dumped".to_string();
        match classify(&r, 64) {
            RunOutcome::RuntimeError(msg) => assert!(msg.starts_with("Segmentation fault\n")),
            other => panic!("expected RuntimeError, got {other:?}"),
        }
    }

    #[test]
    fn sigkill_near_memory_limit_is_mle() {
        let mut r = base_result();
        r.exit_status = -(libc::SIGKILL);
        r.peak_rss_mib = 60.0; // >= 90% of 64
        assert_eq!(classify(&r, 64), RunOutcome::MemoryLimitExceeded);
    }

    #[test]
    fn sigkill_away_from_memory_limit_is_tle_via_sig_tle_set() {
        let mut r = base_result();
        r.exit_status = -(libc::SIGKILL);
        r.peak_rss_mib = 1.0;
        assert_eq!(classify(&r, 64), RunOutcome::TimeLimitExceeded);
    }

    #[test]
    fn nonzero_exit_is_runtime_error() {
        let mut r = base_result();
        r.exit_status = 1;
        r.stderr = "boom".to_string();
        assert_eq!(classify(&r, 64), RunOutcome::RuntimeError("boom".to_string()));
    }

    #[test]
    fn exit_zero_with_stderr_is_runtime_error() {
        let mut r = base_result();
        r.stderr = "Traceback (most recent call last)".to_string();
        assert_eq!(
            classify(&r, 64),
            RunOutcome::RuntimeError("Traceback (most recent call last)".to_string())
        );
    }

    #[test]
    fn exit_zero_empty_stderr_passes() {
        let r = base_result();
        assert_eq!(classify(&r, 64), RunOutcome::Passed);
    }

    #[test]
    fn normalization_drops_empty_lines_and_trims() {
        assert_eq!(normalize_output("  42 \n\n  \n7\n"), "42 7");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_output("  42 \n\n  \n7\n");
        let twice = normalize_output(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_output_and_single_empty_expected_line_are_equal() {
        let actual = normalize_output("");
        let expected = normalize_lines(&[String::new()]);
        assert_eq!(actual, expected);
        assert_eq!(actual, "");
    }
}
