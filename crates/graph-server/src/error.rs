//! Error types for Graphline.

use tokio_util::codec::AnyDelimiterCodecError;

/// The error type shared by the graph store, the command layer and the
/// connection handling code.
#[derive(Debug, thiserror::Error)]
pub enum GraphlineError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("node '{0}' already exists")]
    AlreadyExists(String),

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("connection fault: {0}")]
    Connection(#[from] AnyDelimiterCodecError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GraphlineError {
    /// Errors that end the session rather than producing a reply line.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, GraphlineError::Connection(_))
    }
}

/// Convenience type alias for `Result<T, GraphlineError>`.
pub type GraphlineResult<T> = Result<T, GraphlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphlineError::NodeNotFound("A".into());
        assert_eq!(err.to_string(), "node 'A' not found");

        let err = GraphlineError::AlreadyExists("B".into());
        assert_eq!(err.to_string(), "node 'B' already exists");

        let err = GraphlineError::MalformedCommand("expected integer weight".into());
        assert_eq!(err.to_string(), "malformed command: expected integer weight");
    }

    #[test]
    fn test_connection_faults() {
        let err = GraphlineError::Connection(AnyDelimiterCodecError::MaxChunkLengthExceeded);
        assert!(err.is_connection_fault());

        let err: GraphlineError =
            AnyDelimiterCodecError::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
                .into();
        assert!(err.is_connection_fault());
        assert!(err.to_string().starts_with("connection fault: "));

        assert!(!GraphlineError::NodeNotFound("A".into()).is_connection_fault());
    }
}
