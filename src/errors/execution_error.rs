use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    NotFound,
    ExecutionRefused,
    SecurityRejected,
    AuthExpired,
    ExecutionFailed,
    InvalidArgument,
    Timeout,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ExecutionError {
    pub fn new(
        kind: ExecutionErrorKind,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(
                kind,
                ExecutionErrorKind::Timeout | ExecutionErrorKind::AuthExpired
            ),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::NotFound, "NOT_FOUND", message)
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::new(
            ExecutionErrorKind::ExecutionRefused,
            "EXECUTION_REFUSED",
            message,
        )
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(
            ExecutionErrorKind::SecurityRejected,
            "SECURITY_REJECTED",
            message,
        )
    }

    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::AuthExpired, "AUTH_EXPIRED", message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(
            ExecutionErrorKind::ExecutionFailed,
            "EXECUTION_FAILED",
            message,
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(
            ExecutionErrorKind::InvalidArgument,
            "INVALID_ARGUMENT",
            message,
        )
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Timeout, "TIMEOUT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Internal, "INTERNAL", message)
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ExecutionError {}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::internal(err.to_string())
    }
}
