//! Manga pipeline error taxonomy

use thiserror::Error;

/// Error kinds the pipeline core reasons about when deciding retry vs. terminal behavior.
///
/// This is a coarser view than [`MangaError`]'s variants — several variants share a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    RateLimited,
    ContentFiltered,
    ModelNotFound,
    InvalidPrompt,
    Transient,
    Internal,
}

/// Pipeline error type shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum MangaError {
    /// Malformed request shape, out-of-range value, unknown enum, malformed path parameter.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing story/episode/preferences.
    #[error("not found: {0}")]
    NotFound(String),

    /// Episode already exists, or a status transition would violate monotonicity.
    #[error("conflict: {0}")]
    Conflict(String),

    /// No principal attached to the request.
    #[error("unauthorized")]
    Unauthorized,

    /// Per-user/IP rate window exhausted.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Image generator refused the prompt on content-safety grounds. Permanent.
    #[error("content filtered: {0}")]
    ContentFiltered(String),

    /// Requested model is not available. Permanent.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Prompt rejected as malformed by the generator. Permanent.
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    /// Network, throttling, 5xx, empty provider body, bus publish failure, budget exceeded.
    /// Retryable; event handlers let this propagate for bus redelivery.
    #[error("transient error: {0}")]
    Transient(String),

    /// Anything else. Maps to HTTP 500 INTERNAL_ERROR at the boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MangaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MangaError::Validation(_) => ErrorKind::Validation,
            MangaError::NotFound(_) => ErrorKind::NotFound,
            MangaError::Conflict(_) => ErrorKind::Conflict,
            MangaError::Unauthorized => ErrorKind::Unauthorized,
            MangaError::RateLimited { .. } => ErrorKind::RateLimited,
            MangaError::ContentFiltered(_) => ErrorKind::ContentFiltered,
            MangaError::ModelNotFound(_) => ErrorKind::ModelNotFound,
            MangaError::InvalidPrompt(_) => ErrorKind::InvalidPrompt,
            MangaError::Transient(_) => ErrorKind::Transient,
            MangaError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether an event handler should propagate this error so the bus redelivers it,
    /// as opposed to marking the record FAILED and acknowledging.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    /// The three provider error kinds that must never be retried.
    pub fn is_permanent_provider_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ContentFiltered | ErrorKind::ModelNotFound | ErrorKind::InvalidPrompt
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MangaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(MangaError::Transient("boom".into()).is_transient());
        assert!(!MangaError::Validation("bad".into()).is_transient());
    }

    #[test]
    fn permanent_provider_errors_are_recognized() {
        assert!(MangaError::ContentFiltered("nope".into()).is_permanent_provider_error());
        assert!(MangaError::ModelNotFound("gpt-x".into()).is_permanent_provider_error());
        assert!(MangaError::InvalidPrompt("empty".into()).is_permanent_provider_error());
        assert!(!MangaError::Transient("retry me".into()).is_permanent_provider_error());
    }
}
