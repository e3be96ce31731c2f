use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Encode(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cooperative cancellation outcome. Not a user-facing failure: the
    /// orchestrator treats it as an early-termination signal, never records
    /// it on an item and never forwards it to the notifier.
    #[error("operation cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
