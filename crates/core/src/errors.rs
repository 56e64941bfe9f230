use thiserror::Error;

/// Failure reported by a remote collaborator (issue tracker or source host).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("{entity} not found")]
    NotFound { entity: String },
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
    #[error("remote service rejected credentials: {0}")]
    Unauthorized(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("could not decode remote response: {0}")]
    Decode(String),
}

impl LookupError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound { entity: entity.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("captured `{slot}` value `{value}` is not a valid number")]
    MalformedCapture { slot: &'static str, value: String },
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    CollaboratorFailure,
    MalformedCapture,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedCapture { .. } => ErrorKind::MalformedCapture,
            Self::Lookup(LookupError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Lookup(_) => ErrorKind::CollaboratorFailure,
        }
    }

    /// Only not-found failures are ever shown in the channel.
    pub fn is_user_visible(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{DispatchError, ErrorKind, LookupError};

    #[test]
    fn not_found_lookup_is_user_visible() {
        let error = DispatchError::from(LookupError::not_found("pull request #42"));

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(error.is_user_visible());
    }

    #[test]
    fn timeouts_and_integration_failures_stay_internal() {
        let timeout = DispatchError::from(LookupError::Timeout {
            operation: "fetch pull request".to_owned(),
            secs: 10,
        });
        let integration =
            DispatchError::from(LookupError::Integration("connection reset".to_owned()));

        assert_eq!(timeout.kind(), ErrorKind::CollaboratorFailure);
        assert_eq!(integration.kind(), ErrorKind::CollaboratorFailure);
        assert!(!timeout.is_user_visible());
        assert!(!integration.is_user_visible());
    }

    #[test]
    fn malformed_capture_is_its_own_kind() {
        let error = DispatchError::MalformedCapture {
            slot: "number",
            value: "99999999999999999999999".to_owned(),
        };

        assert_eq!(error.kind(), ErrorKind::MalformedCapture);
        assert!(!error.is_user_visible());
        assert!(error.to_string().contains("99999999999999999999999"));
    }
}
