use thiserror::Error;

/// Request-terminal failures surfaced to callers.
///
/// Retrieval problems never appear here; they degrade to "no memory".
#[derive(Debug, Error)]
pub enum StudyError {
    /// Rejected before any collaborator was called.
    #[error("{0}")]
    InputValidation(String),

    /// The generation collaborator failed.
    #[error("generation failed: {0:#}")]
    Generation(#[source] anyhow::Error),

    /// Generated text held no usable cards.
    #[error("{0}")]
    GenerationFormat(String),
}

impl StudyError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::GenerationFormat(msg.into())
    }
}

pub type StudyResult<T> = std::result::Result<T, StudyError>;
