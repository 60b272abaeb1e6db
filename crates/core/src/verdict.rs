//! Verdict value objects — the results of checking transactions, responses,
//! and drift against a contract.
//!
//! Verdicts are transient: validate-style operations always return one (never
//! an error), so a calling gateway can branch uniformly on allow vs deny.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of validating one transaction or response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid,
    Suspicious,
    DriftDetected,
}

/// What the caller should do with the transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Allow,
    Deny,
    Flag,
    Sanitize,
    RequireReview,
}

/// Verdict for the server-protection path: does the request align with the
/// contract's agreed purpose and constraints?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionVerdict {
    pub contract_id: String,
    pub transaction_id: String,
    pub result: ValidationResult,

    /// Confidence in the verdict, 0.0 to 1.0.
    pub confidence: f64,
    pub reasons: Vec<String>,

    /// How well the transaction aligns with the declared intent, 0.0 to 1.0.
    pub alignment_score: f64,
    pub risk_factors: Vec<String>,
    pub suggested_action: SuggestedAction,
    pub validated_at: DateTime<Utc>,

    /// Client-protection verdict, attached by bidirectional validation when a
    /// response was present and the request itself was valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_protection: Option<ResponseVerdict>,
}

impl TransactionVerdict {
    /// Fixed deny verdict for terminal states (unknown/inactive/expired
    /// contract, analyzer failure). Zero confidence, no analyzer call implied.
    pub fn denied(contract_id: &str, reason: impl Into<String>, risk_tag: &str) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            transaction_id: Uuid::new_v4().to_string(),
            result: ValidationResult::Invalid,
            confidence: 0.0,
            reasons: vec![reason.into()],
            alignment_score: 0.0,
            risk_factors: vec![risk_tag.to_string()],
            suggested_action: SuggestedAction::Deny,
            validated_at: Utc::now(),
            client_protection: None,
        }
    }
}

/// Verdict for the client-protection path: does the server's response stay
/// within the client's declared data requirements and constraints?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseVerdict {
    pub contract_id: String,
    pub transaction_id: String,
    pub result: ValidationResult,
    pub confidence: f64,
    pub reasons: Vec<String>,

    /// How well the response complies with client constraints, 0.0 to 1.0.
    pub compliance_score: f64,
    pub privacy_violations: Vec<String>,
    pub leakage_risks: Vec<String>,

    /// Fields present in the response the client never asked for.
    pub unexpected_data: Vec<String>,
    pub suggested_action: SuggestedAction,
    pub validated_at: DateTime<Utc>,
}

impl ResponseVerdict {
    /// Fixed deny verdict for terminal states on the response path.
    pub fn denied(
        contract_id: &str,
        transaction_id: &str,
        reason: impl Into<String>,
        violation_tag: &str,
        leakage_tag: &str,
    ) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            transaction_id: transaction_id.to_string(),
            result: ValidationResult::Invalid,
            confidence: 0.0,
            reasons: vec![reason.into()],
            compliance_score: 0.0,
            privacy_violations: vec![violation_tag.to_string()],
            leakage_risks: vec![leakage_tag.to_string()],
            unexpected_data: Vec::new(),
            suggested_action: SuggestedAction::Deny,
            validated_at: Utc::now(),
        }
    }
}

/// One entry in a contract's transaction ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub request: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    pub result: ValidationResult,
    pub alignment_score: f64,
}

/// Severity of detected intent drift.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    None,
    Low,
    Medium,
    High,
    Unknown,
}

/// What to do about detected drift.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriftAction {
    Continue,
    Review,
    Renegotiate,
    Terminate,
}

/// Result of analyzing a contract's recent transaction window for drift from
/// the originally agreed purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub drift_detected: bool,
    pub severity: DriftSeverity,
    pub indicators: Vec<String>,
    pub recommended_action: DriftAction,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DriftReport {
    /// No recent transactions to analyze — full-confidence no-drift, no
    /// analyzer call needed.
    pub fn idle() -> Self {
        Self {
            drift_detected: false,
            severity: DriftSeverity::None,
            indicators: Vec::new(),
            recommended_action: DriftAction::Continue,
            confidence: 1.0,
            error: None,
        }
    }

    /// Fallback when the drift oracle itself failed: no drift asserted,
    /// operator review recommended, contract state untouched.
    pub fn analysis_failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            drift_detected: false,
            severity: DriftSeverity::Unknown,
            indicators: vec![format!("Analysis failed: {error}")],
            recommended_action: DriftAction::Review,
            confidence: 0.0,
            error: Some(error),
        }
    }
}
