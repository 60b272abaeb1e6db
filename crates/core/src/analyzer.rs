//! IntentAnalyzer trait — the abstraction over semantic analysis backends.
//!
//! An analyzer judges whether a declared purpose aligns with a capability,
//! whether a transaction serves the agreed purpose, whether a response stays
//! within the client's tolerances, and whether recent behavior has drifted.
//!
//! The broker treats the analyzer as a fallible black box: every call may
//! time out or return garbage, and every caller defines a deterministic
//! fallback. Implementations live outside core (e.g. the Ollama adapter);
//! adapters own all text-to-structure recovery so the broker only ever sees
//! typed verdicts or a typed failure.

use crate::contract::CompatibilityReport;
use crate::declaration::{ClientIntent, ServerCapability};
use crate::error::AnalyzerError;
use crate::verdict::{DriftReport, ResponseVerdict, TransactionRecord, TransactionVerdict};
use async_trait::async_trait;

/// The Semantic Analyzer oracle consumed by the broker.
///
/// Verdicts returned here carry empty `contract_id`/`transaction_id` fields;
/// the broker fills them in before recording or returning them.
#[async_trait]
pub trait IntentAnalyzer: Send + Sync {
    /// A human-readable name for this analyzer backend (e.g. "ollama").
    fn name(&self) -> &str;

    /// Judge compatibility between a client intent and a server capability.
    async fn analyze_compatibility(
        &self,
        intent: &ClientIntent,
        capability: &ServerCapability,
    ) -> Result<CompatibilityReport, AnalyzerError>;

    /// Judge whether a request (and optional response) serves the agreed
    /// purpose under the contract's constraints.
    async fn validate_transaction(
        &self,
        request: &serde_json::Value,
        response: Option<&serde_json::Value>,
        purpose: &str,
        constraints: &[String],
    ) -> Result<TransactionVerdict, AnalyzerError>;

    /// Judge whether a server response stays within the client's declared
    /// data requirements and constraints (client protection).
    async fn validate_response(
        &self,
        intent: &ClientIntent,
        capability: &ServerCapability,
        request: &serde_json::Value,
        response: &serde_json::Value,
        constraints: &[String],
    ) -> Result<ResponseVerdict, AnalyzerError>;

    /// Judge whether recent transactions have drifted from the original
    /// purpose.
    async fn analyze_drift(
        &self,
        purpose: &str,
        records: &[TransactionRecord],
        window_hours: i64,
    ) -> Result<DriftReport, AnalyzerError>;

    /// Health check — can we reach the analyzer backend?
    async fn health_check(&self) -> Result<bool, AnalyzerError> {
        Ok(true)
    }
}
