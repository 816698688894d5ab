//! Error types for functors and streams
//!
//! Misuse of a stream's lifecycle (pushing after stop, stopping a producer
//! that cannot stop) surfaces as a `StreamError`. Errors raised by user
//! transforms are never wrapped: they travel through a sequence as `Result`
//! items and reach whoever pulls them.

/// Main error type for stream operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The value handed to a dynamic source adapter is neither array-like,
    /// pull-capable nor iterator-shaped
    #[error("Unsupported source kind: {0}")]
    UnsupportedSourceKind(String),
    /// `push` or `start` on a stream that is stopping or done
    #[error("Stream is closed")]
    Closed,
    /// `stop` on a producer that never declared a stop capability
    #[error("Stream producer cannot be stopped")]
    Unstoppable,
    /// `start` on a producer that never declared a start capability
    #[error("Stream producer cannot be started")]
    Unstartable,
    /// `push` on a stream whose producer does not accept pushed values
    #[error("Stream does not accept pushed values")]
    Unpushable,
    /// A multi-stream combinator received too few sources
    #[error("Combinator requires at least {required} streams, got {given}")]
    CombinatorArity { required: usize, given: usize },
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(StreamError::Closed.to_string(), "Stream is closed");
        assert_eq!(
            StreamError::CombinatorArity { required: 2, given: 1 }.to_string(),
            "Combinator requires at least 2 streams, got 1"
        );
        assert_eq!(
            StreamError::UnsupportedSourceKind("string".into()).to_string(),
            "Unsupported source kind: string"
        );
    }
}
