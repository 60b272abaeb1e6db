//! The intent contract — the binding, time-boxed agreement at the center of
//! the broker.
//!
//! A contract is created once by negotiation and then mutated only by the
//! transaction validator (outcome/violation recording) and the sweeper
//! (deactivation on expiry). Contracts are never deleted; inactive contracts
//! are retained for audit.

use crate::declaration::{ClientIntent, ServerCapability};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Violations before a contract is permanently deactivated.
pub const VIOLATION_THRESHOLD: u32 = 5;

/// Status of a compatibility analysis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityStatus {
    Compatible,
    Incompatible,
    RequiresNegotiation,
    AnalysisFailed,
}

/// Result of the analyzer's compatibility check for one negotiation.
///
/// Embedded in the contract it produced; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub status: CompatibilityStatus,

    /// Confidence in the verdict, 0.0 to 1.0.
    pub confidence: f64,

    /// Reasons for the compatibility decision.
    pub reasons: Vec<String>,

    /// Additional constraints the analyzer recommends.
    #[serde(default)]
    pub suggested_constraints: Vec<String>,

    /// Free-form risk assessment.
    #[serde(default)]
    pub risk_assessment: serde_json::Map<String, serde_json::Value>,

    /// Analyzer-specific metadata (model name, raw response size, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CompatibilityReport {
    /// Synthesize a report for an analyzer that failed or was unreachable.
    pub fn analysis_failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut risk_assessment = serde_json::Map::new();
        risk_assessment.insert("error".into(), serde_json::Value::String(reason.clone()));
        Self {
            status: CompatibilityStatus::AnalysisFailed,
            confidence: 0.0,
            reasons: vec![format!("Analysis failed: {reason}")],
            suggested_constraints: Vec::new(),
            risk_assessment,
            metadata: serde_json::Map::new(),
        }
    }
}

/// Binding agreement between one client intent and one server capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentContract {
    pub contract_id: String,

    /// The originating declarations, embedded for audit.
    pub client_intent: ClientIntent,
    pub server_capability: ServerCapability,
    pub compatibility: CompatibilityReport,

    // Terms derived from negotiation
    pub agreed_purpose: String,
    pub allowed_operations: Vec<String>,
    pub data_access_scope: Vec<String>,
    pub constraints: Vec<String>,
    pub rate_limits: HashMap<String, u64>,

    // Lifecycle
    pub created_at: DateTime<Utc>,
    /// Computed once at creation from the intent's duration; never recomputed.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub violation_count: u32,
    pub last_validated: Option<DateTime<Utc>>,

    // Monitoring
    pub transaction_count: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
}

impl IntentContract {
    /// Create a contract shell from its declarations and compatibility report.
    ///
    /// Terms start empty and inactive; negotiation fills them in based on the
    /// report's status. `expires_at` is fixed here from the intent's duration.
    pub fn new(
        client_intent: ClientIntent,
        server_capability: ServerCapability,
        compatibility: CompatibilityReport,
    ) -> Self {
        let created_at = Utc::now();
        let expires_at = client_intent
            .duration_minutes
            .map(|minutes| created_at + Duration::minutes(minutes));
        Self {
            contract_id: Uuid::new_v4().to_string(),
            client_intent,
            server_capability,
            compatibility,
            agreed_purpose: String::new(),
            allowed_operations: Vec::new(),
            data_access_scope: Vec::new(),
            constraints: Vec::new(),
            rate_limits: HashMap::new(),
            created_at,
            expires_at,
            is_active: false,
            violation_count: 0,
            last_validated: None,
            transaction_count: 0,
            successful_transactions: 0,
            failed_transactions: 0,
        }
    }

    /// Has the contract's expiry passed? Contracts without `expires_at`
    /// never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() > expires_at,
            None => false,
        }
    }

    /// Record the outcome of one validated transaction.
    pub fn record_transaction(&mut self, success: bool) {
        self.transaction_count += 1;
        if success {
            self.successful_transactions += 1;
        } else {
            self.failed_transactions += 1;
        }
        self.last_validated = Some(Utc::now());
    }

    /// Record an intent violation. Hitting [`VIOLATION_THRESHOLD`]
    /// deactivates the contract permanently.
    pub fn record_violation(&mut self) {
        self.violation_count += 1;
        if self.violation_count >= VIOLATION_THRESHOLD {
            self.is_active = false;
        }
    }

    /// Fraction of transactions that validated successfully.
    pub fn success_rate(&self) -> f64 {
        if self.transaction_count == 0 {
            return 0.0;
        }
        self.successful_transactions as f64 / self.transaction_count as f64
    }
}
