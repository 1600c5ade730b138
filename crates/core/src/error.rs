#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Raised when command output cannot be turned into a sample at all.
///
/// Individual malformed fields never produce this error; they become `None`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("tracking unavailable")]
    TrackingUnavailable,
}
