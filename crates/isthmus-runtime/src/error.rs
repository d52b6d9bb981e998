//! Error types raised while generated bindings run.

use std::fmt;

use crate::value::Value;

/// An instance of a declared error code, carried across the boundary by
/// tag and parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainError {
    /// Qualified name of the error domain.
    pub domain: String,
    /// The error code tag within the domain.
    pub code: String,
    /// Typed parameters in declaration order.
    pub params: Vec<Value>,
    pub message: String,
}

impl DomainError {
    pub fn new(domain: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code: code.into(),
            params: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_param(mut self, param: Value) -> Self {
        self.params.push(param);
        self
    }

    pub fn is(&self, domain: &str, code: &str) -> bool {
        self.domain == domain && self.code == code
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.code)?;
        if !self.params.is_empty() {
            write!(f, "(")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{param}")?;
            }
            write!(f, ")")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for DomainError {}

/// Errors raised by the bridging runtime.
///
/// `InvalidHandle`, `DoubleCompletion` and `Abandoned` are protocol
/// violations: they signal a corrupted boundary contract and are never
/// downgraded to warnings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid native handle: 0 never names a live object")]
    InvalidHandle,

    #[error("pending result completed more than once")]
    DoubleCompletion,

    #[error("pending result abandoned without a completion")]
    Abandoned,

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("native failure: {message}")]
    Native { message: String },

    #[error("managed failure: {message}")]
    Managed { message: String },

    #[error("wire format error: {detail}")]
    Wire { detail: String },
}

impl BridgeError {
    pub fn wire(detail: impl Into<String>) -> Self {
        BridgeError::Wire { detail: detail.into() }
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidHandle | BridgeError::DoubleCompletion | BridgeError::Abandoned
        )
    }
}

/// Result type for bridging operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_display_keeps_parameters() {
        let err = DomainError::new("test.errors", "something_with_parameters", "some error message")
            .with_param(Value::I32(42));
        assert_eq!(
            err.to_string(),
            "test.errors.something_with_parameters(42): some error message"
        );
        assert!(err.is("test.errors", "something_with_parameters"));
    }

    #[test]
    fn protocol_violations() {
        assert!(BridgeError::InvalidHandle.is_protocol_violation());
        assert!(BridgeError::DoubleCompletion.is_protocol_violation());
        assert!(!BridgeError::wire("truncated").is_protocol_violation());
        let wrapped: BridgeError = DomainError::new("d", "c", "m").into();
        assert!(matches!(wrapped, BridgeError::Domain(_)));
    }
}
