#![warn(missing_docs)]
//! Core of a programming-judge execution service: a sandboxed,
//! resource-limited evaluator that compiles (if needed) and runs a user's
//! submission against an ordered sequence of test cases and reduces the run
//! to a single [`Verdict`].
//!
//! # Modules
//! - `profile`: the Language Profile Registry — file extensions and
//!   compile/run command templates per language.
//! - `limits`: the Limits Installer — CPU, address-space, and file-size
//!   rlimits applied to a child before it execs.
//! - `supervisor`: the Process Supervisor — spawns, drains, samples RSS,
//!   enforces the wall-clock deadline, and reaps one child process.
//! - `stages`: the Compiler Stage and Test Runner Stage built on top of the
//!   supervisor.
//! - `verdict`: the Verdict Engine's precedence rules and output
//!   normalization.
//! - `workspace`: the per-attempt temporary directory.
//! - `executor`: wires the stages above into one `execute(&Attempt)` call.
//! - `intake`: the Work Intake Adapter — consumes attempts from a durable
//!   AMQP queue and publishes verdicts.
//!
//! # Non-goals
//! No network-reachable execution, no persistent filesystem for
//! submissions, no kernel-namespace sandboxing (rlimits and process-group
//! kill are the isolation primitives), no floating-point tolerance, no
//! interactive tests, multi-file submissions, or custom checkers.

pub mod config;
pub mod error;
pub mod executor;
pub mod intake;
pub mod limits;
pub mod model;
pub mod profile;
pub mod stages;
pub mod supervisor;
pub mod verdict;
pub mod workspace;

pub use error::{ExecutorError, Result};
pub use model::{Attempt, ExecutionStatus, Language, TestCase, Verdict};
