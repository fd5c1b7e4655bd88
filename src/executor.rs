//! Ties the pipeline together: Workspace → Compiler Stage → Test Runner
//! Stage → Verdict.

use crate::model::{Attempt, Verdict};
use crate::profile::profile_for;
use crate::stages::{compile, test_runner};
use crate::workspace::Workspace;

/// Execute one attempt end to end: create the workspace, write the source,
/// compile if needed, run every test case, and produce the final verdict.
/// The workspace is torn down on every return path via [`Workspace`]'s
/// `Drop` impl, including the early-return paths below.
pub fn execute(attempt: &Attempt) -> Verdict {
    tracing::info!(
        attempt_id = attempt.id,
        language = ?attempt.programming_language,
        "executing attempt"
    );

    let workspace = match Workspace::create() {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!(attempt_id = attempt.id, error = %e, "failed to create workspace");
            return Verdict::synthesized_runtime_error(attempt.id);
        }
    };

    let profile = profile_for(attempt.programming_language);

    let src_path = match workspace.write_source(&profile, &attempt.source_code) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(attempt_id = attempt.id, error = %e, "failed to write source file");
            return Verdict::synthesized_runtime_error(attempt.id);
        }
    };

    if let compile::CompileOutcome::Terminal(verdict) = compile::compile(
        attempt.id,
        attempt.programming_language,
        &profile,
        &workspace,
        &src_path,
    ) {
        return verdict;
    }

    test_runner::run_tests(attempt, &profile, &workspace, &src_path)
}
