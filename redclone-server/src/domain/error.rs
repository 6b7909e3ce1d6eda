use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum DomainError {
    #[error("validation failed for '{field}': {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("{field} already in use")]
    AlreadyExists { field: &'static str },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("forbidden")]
    Forbidden,

    #[error("transaction aborted by a concurrent write, retry the request")]
    TransactionAborted,

    #[error("unexpected domain error: {0}")]
    Unexpected(String),
}

/// Machine-readable error category surfaced to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    NotFound,
    Unauthenticated,
    Unauthorized,
    TransactionAborted,
    ValidationFailed,
    Internal,
}

impl ErrorKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::TransactionAborted => "transaction_aborted",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl DomainError {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation { .. } | DomainError::AlreadyExists { .. } => {
                ErrorKind::ValidationFailed
            }
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::Unauthenticated | DomainError::InvalidCredentials => {
                ErrorKind::Unauthenticated
            }
            DomainError::Forbidden => ErrorKind::Unauthorized,
            DomainError::TransactionAborted => ErrorKind::TransactionAborted,
            DomainError::Unexpected(_) => ErrorKind::Internal,
        }
    }

    /// Input field the error refers to, if any.
    pub(crate) fn field(&self) -> Option<&'static str> {
        match self {
            DomainError::Validation { field, .. } | DomainError::AlreadyExists { field } => {
                Some(field)
            }
            _ => None,
        }
    }

    pub(crate) fn post_not_found(id: i64) -> Self {
        DomainError::NotFound(format!("post id: {id}"))
    }
}
