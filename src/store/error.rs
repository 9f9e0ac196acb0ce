use thiserror::Error;

/// Errors surfaced by the graph store and the hierarchy pipeline
#[derive(Debug, Error)]
pub enum GraphError {
    /// A lookup expected to match exactly one entity matched none
    #[error("not found")]
    NotFound,

    /// A lookup expected to match at most one entity matched several
    #[error("multiple found where one expected")]
    MultipleFound,

    /// The active backend does not support this operation
    #[error("operation not implemented by this backend: {0}")]
    NotImplemented(&'static str),

    /// Retryable backend fault (connection, lock, timeout)
    #[error("transient backend error: {0}")]
    Transient(String),

    /// Non-retryable backend fault (malformed statement, invalid request)
    #[error("backend error: {0}")]
    Backend(String),

    /// A response could not be decoded into the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The call context deadline passed before the work was dispatched
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Wraps a failure with the statement that produced it
    #[error("statement failed: {statement:?}")]
    Statement {
        statement: String,
        #[source]
        source: Box<GraphError>,
    },
}

/// Markers carried by backend messages for requests the backend rejected outright
const PERMANENT_MARKERS: &[&str] = &[
    "MALFORMED REQUEST",
    "INVALID REQUEST ARGUMENTS",
    "InvalidParameter",
    "SyntaxError",
    "Neo.ClientError.Statement",
];

impl GraphError {
    /// Build an error from a raw backend message, classifying it by its content.
    /// Anything the backend did not reject as a bad request (connection drops,
    /// lock conflicts, timeouts) is transient.
    pub fn from_backend_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if PERMANENT_MARKERS.iter().any(|m| message.contains(m)) {
            GraphError::Backend(message)
        } else {
            GraphError::Transient(message)
        }
    }

    /// Wrap with the statement text for diagnostics
    pub fn with_statement(self, statement: impl Into<String>) -> Self {
        match self {
            // already carries its statement
            GraphError::Statement { .. } => self,
            other => GraphError::Statement {
                statement: statement.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping statement wrappers
    pub fn root(&self) -> &GraphError {
        match self {
            GraphError::Statement { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether re-running the whole statement is safe and may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self.root(), GraphError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), GraphError::NotFound)
    }

    pub fn is_multiple_found(&self) -> bool {
        matches!(self.root(), GraphError::MultipleFound)
    }

    /// A conflict over the hierarchy root still means a hierarchy exists
    pub fn implies_existence(&self) -> bool {
        self.is_multiple_found()
    }
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_classification() {
        assert!(!GraphError::from_backend_message(" MALFORMED REQUEST ").is_transient());
        assert!(!GraphError::from_backend_message("Neo.ClientError.Statement.SyntaxError").is_transient());
        assert!(GraphError::from_backend_message("ConcurrentModificationException on vertex").is_transient());
        assert!(GraphError::from_backend_message("read timed out").is_transient());
        assert!(GraphError::from_backend_message("something odd happened").is_transient());
    }

    #[test]
    fn test_statement_wrapper_keeps_root() {
        let err = GraphError::MultipleFound.with_statement("g.V()");
        assert!(err.is_multiple_found());
        assert!(err.implies_existence());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "statement failed: \"g.V()\"");

        // wrapping twice keeps the first statement
        let rewrapped = err.with_statement("other");
        match rewrapped {
            GraphError::Statement { statement, .. } => assert_eq!(statement, "g.V()"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_and_not_implemented_are_permanent() {
        assert!(!GraphError::Decode("bad row".to_string()).is_transient());
        assert!(!GraphError::NotImplemented("clone_nodes_from_ids").is_transient());
        assert!(GraphError::Transient("lock".to_string())
            .with_statement("MATCH (n)")
            .is_transient());
    }
}
