//! Error types for the intentgate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for broker operations.
///
/// `NotFound` propagates to the caller (it indicates caller misuse).
/// `Analyzer` is absorbed at the call site and converted into a conservative
/// fallback verdict — validate-style operations never surface it.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    // --- Analyzer errors ---
    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Result type alias using our BrokerError.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// What kind of resource a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Intent,
    Capability,
    Contract,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Intent => "Client intent",
            ResourceKind::Capability => "Server capability",
            ResourceKind::Contract => "Contract",
        };
        f.write_str(s)
    }
}

/// Errors from the Semantic Analyzer boundary.
///
/// Every caller must define a deterministic fallback for these — the broker
/// stays correct if the analyzer is permanently unavailable.
#[derive(Debug, Clone, Error)]
pub enum AnalyzerError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed analyzer output: {0}")]
    Malformed(String),

    #[error("Analyzer not configured: {0}")]
    NotConfigured(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_resource_kind() {
        let err = BrokerError::not_found(ResourceKind::Capability, "cap-123");
        assert!(err.to_string().contains("Server capability"));
        assert!(err.to_string().contains("cap-123"));
    }

    #[test]
    fn analyzer_error_converts() {
        let err: BrokerError = AnalyzerError::Timeout("no response after 120s".into()).into();
        assert!(err.to_string().contains("timed out"));
    }
}
