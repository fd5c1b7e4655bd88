//! Compiler Stage: runs a submission's compile command (if its language
//! profile has one) under the supervisor and interprets the outcome.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::model::{ExecutionStatus, Language, Verdict};
use crate::profile::{self, Profile, COMPILATION_MEMORY_MB, COMPILATION_TIME_LIMIT_SECS};
use crate::supervisor::{self, RunRequest};
use crate::workspace::Workspace;

/// Outcome of the compiler stage: either there's nothing more to do (no
/// compile step, or it succeeded and the test runner should proceed), or a
/// terminal verdict for the whole attempt.
pub enum CompileOutcome {
    Proceed,
    Terminal(Verdict),
}

pub fn compile(
    attempt_id: i64,
    language: Language,
    profile: &Profile,
    workspace: &Workspace,
    src_path: &std::path::Path,
) -> CompileOutcome {
    if profile.compile.is_none() {
        return CompileOutcome::Proceed;
    }

    let exe = workspace.exe_path();
    let cmd = profile
        .expand_compile(
            &src_path.display().to_string(),
            &exe.display().to_string(),
            &workspace.path().display().to_string(),
            COMPILATION_MEMORY_MB,
        )
        .expect("compile template present, checked above");
    let env_overrides = profile::env_overrides(language, COMPILATION_MEMORY_MB);

    tracing::info!(attempt_id, cmd = ?cmd, "compiling attempt");

    let req = RunRequest {
        cmd: &cmd,
        stdin: b"",
        time_limit_secs: COMPILATION_TIME_LIMIT_SECS,
        memory_limit_mb: COMPILATION_MEMORY_MB,
        is_compilation: true,
        workdir: workspace.path(),
        env_overrides: &env_overrides,
        cancel: Arc::new(AtomicBool::new(false)),
    };
    let result = supervisor::run(&req);

    if result.exit_status == 0 && !result.memory_exceeded && !result.time_exceeded {
        tracing::info!(attempt_id, "compilation succeeded");
        return CompileOutcome::Proceed;
    }

    let status = if result.memory_exceeded {
        ExecutionStatus::MemoryLimitExceeded
    } else if result.time_exceeded {
        ExecutionStatus::TimeLimitExceeded
    } else {
        ExecutionStatus::CompilationError
    };
    tracing::info!(attempt_id, ?status, "compilation failed");

    CompileOutcome::Terminal(Verdict::failed(attempt_id, status).with_error(result.stderr))
}
