use thiserror::Error;

/// Errors surfaced by the executor core.
///
/// Recovery for all of these happens locally; the executor never propagates
/// a bare `ExecutorError` past the intake adapter, which maps any of them to
/// a synthesized `RuntimeError` verdict.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to create workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("malformed work message: {0}")]
    MalformedMessage(String),

    #[error("broker error: {0}")]
    Broker(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
