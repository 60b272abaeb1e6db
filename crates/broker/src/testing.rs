//! Test doubles for the analyzer boundary.
//!
//! `StubAnalyzer` returns canned verdicts, records per-method call counts,
//! and can be told to fail any method. Transaction verdicts can also be
//! queued so successive validations see different outcomes. Public so
//! integration tests and downstream consumers can drive a broker without a
//! live model.

use intentgate_core::{
    AnalyzerError, ClientIntent, CompatibilityReport, CompatibilityStatus, DataSensitivity,
    DriftAction, DriftReport, DriftSeverity, IntentAnalyzer, ResponseVerdict, ServerCapability,
    SuggestedAction, TransactionRecord, TransactionVerdict, ValidationResult,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Per-method call counters, readable from tests.
#[derive(Default)]
pub struct CallCounts {
    compatibility: AtomicUsize,
    transaction: AtomicUsize,
    response: AtomicUsize,
    drift: AtomicUsize,
}

impl CallCounts {
    pub fn compatibility(&self) -> usize {
        self.compatibility.load(Ordering::SeqCst)
    }

    pub fn transaction(&self) -> usize {
        self.transaction.load(Ordering::SeqCst)
    }

    pub fn response(&self) -> usize {
        self.response.load(Ordering::SeqCst)
    }

    pub fn drift(&self) -> usize {
        self.drift.load(Ordering::SeqCst)
    }
}

type StubResult<T> = Result<T, AnalyzerError>;

/// Scripted analyzer double.
pub struct StubAnalyzer {
    pub calls: CallCounts,
    compatibility: Mutex<StubResult<CompatibilityReport>>,
    /// Queued one-shot transaction verdicts, consumed front-first.
    transaction_queue: Mutex<VecDeque<StubResult<TransactionVerdict>>>,
    transaction_default: Mutex<StubResult<TransactionVerdict>>,
    response: Mutex<StubResult<ResponseVerdict>>,
    drift: Mutex<StubResult<DriftReport>>,
}

impl StubAnalyzer {
    fn with_compatibility(report: CompatibilityReport) -> Self {
        Self {
            calls: CallCounts::default(),
            compatibility: Mutex::new(Ok(report)),
            transaction_queue: Mutex::new(VecDeque::new()),
            transaction_default: Mutex::new(Ok(valid_transaction_verdict(0.9))),
            response: Mutex::new(Ok(compliant_response_verdict())),
            drift: Mutex::new(Ok(no_drift_report())),
        }
    }

    /// Analyzer that finds every pairing compatible at the given confidence.
    pub fn compatible(confidence: f64) -> Self {
        Self::with_compatibility(CompatibilityReport {
            status: CompatibilityStatus::Compatible,
            confidence,
            reasons: vec!["Intent matches capability".into()],
            suggested_constraints: Vec::new(),
            risk_assessment: serde_json::Map::new(),
            metadata: serde_json::Map::new(),
        })
    }

    /// Analyzer that rejects every pairing.
    pub fn incompatible() -> Self {
        Self::with_compatibility(CompatibilityReport {
            status: CompatibilityStatus::Incompatible,
            confidence: 0.95,
            reasons: vec!["Capability does not cover requested data".into()],
            suggested_constraints: Vec::new(),
            risk_assessment: serde_json::Map::new(),
            metadata: serde_json::Map::new(),
        })
    }

    /// Analyzer that asks for renegotiation on every pairing.
    pub fn requires_negotiation() -> Self {
        Self::with_compatibility(CompatibilityReport {
            status: CompatibilityStatus::RequiresNegotiation,
            confidence: 0.6,
            reasons: vec!["Overlap is partial".into()],
            suggested_constraints: Vec::new(),
            risk_assessment: serde_json::Map::new(),
            metadata: serde_json::Map::new(),
        })
    }

    pub fn set_suggested_constraints(&self, constraints: Vec<String>) {
        if let Ok(report) = &mut *self.compatibility.lock().unwrap() {
            report.suggested_constraints = constraints;
        }
    }

    pub fn fail_compatibility(&self, error: AnalyzerError) {
        *self.compatibility.lock().unwrap() = Err(error);
    }

    /// Queue a one-shot transaction verdict ahead of the default.
    pub fn queue_transaction(&self, verdict: TransactionVerdict) {
        self.transaction_queue.lock().unwrap().push_back(Ok(verdict));
    }

    pub fn queue_transaction_error(&self, error: AnalyzerError) {
        self.transaction_queue.lock().unwrap().push_back(Err(error));
    }

    /// Replace the default verdict returned once the queue is drained.
    pub fn set_transaction_default(&self, verdict: TransactionVerdict) {
        *self.transaction_default.lock().unwrap() = Ok(verdict);
    }

    pub fn fail_transactions(&self, error: AnalyzerError) {
        *self.transaction_default.lock().unwrap() = Err(error);
    }

    pub fn set_response(&self, verdict: ResponseVerdict) {
        *self.response.lock().unwrap() = Ok(verdict);
    }

    pub fn fail_response(&self, error: AnalyzerError) {
        *self.response.lock().unwrap() = Err(error);
    }

    pub fn set_drift(&self, report: DriftReport) {
        *self.drift.lock().unwrap() = Ok(report);
    }

    pub fn fail_drift(&self, error: AnalyzerError) {
        *self.drift.lock().unwrap() = Err(error);
    }
}

#[async_trait]
impl IntentAnalyzer for StubAnalyzer {
    fn name(&self) -> &str {
        "stub"
    }

    async fn analyze_compatibility(
        &self,
        _intent: &ClientIntent,
        _capability: &ServerCapability,
    ) -> StubResult<CompatibilityReport> {
        self.calls.compatibility.fetch_add(1, Ordering::SeqCst);
        self.compatibility.lock().unwrap().clone()
    }

    async fn validate_transaction(
        &self,
        _request: &serde_json::Value,
        _response: Option<&serde_json::Value>,
        _purpose: &str,
        _constraints: &[String],
    ) -> StubResult<TransactionVerdict> {
        self.calls.transaction.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.transaction_queue.lock().unwrap().pop_front() {
            return next;
        }
        self.transaction_default.lock().unwrap().clone()
    }

    async fn validate_response(
        &self,
        _intent: &ClientIntent,
        _capability: &ServerCapability,
        _request: &serde_json::Value,
        _response: &serde_json::Value,
        _constraints: &[String],
    ) -> StubResult<ResponseVerdict> {
        self.calls.response.fetch_add(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone()
    }

    async fn analyze_drift(
        &self,
        _purpose: &str,
        _records: &[TransactionRecord],
        _window_hours: i64,
    ) -> StubResult<DriftReport> {
        self.calls.drift.fetch_add(1, Ordering::SeqCst);
        self.drift.lock().unwrap().clone()
    }
}

/// A matched weather intent/capability pair for tests: sixty-minute session,
/// read-only client, public data.
pub fn declarations() -> (ClientIntent, ServerCapability) {
    let intent = ClientIntent::new(
        "plan a weekend trip",
        vec!["weather".into()],
        vec!["read_only".into()],
        Some(60),
    );
    let capability = ServerCapability::new(
        vec!["weather".into()],
        vec!["no_pii".into()],
        HashMap::from([("requests_per_minute".to_string(), 60)]),
        DataSensitivity::Public,
        vec!["read".into()],
    );
    (intent, capability)
}

/// An allow verdict at the given alignment score. Ids are left empty, the
/// way an analyzer adapter would return them.
pub fn valid_transaction_verdict(alignment_score: f64) -> TransactionVerdict {
    TransactionVerdict {
        contract_id: String::new(),
        transaction_id: String::new(),
        result: ValidationResult::Valid,
        confidence: 0.9,
        reasons: vec!["Request serves the agreed purpose".into()],
        alignment_score,
        risk_factors: Vec::new(),
        suggested_action: SuggestedAction::Allow,
        validated_at: Utc::now(),
        client_protection: None,
    }
}

/// A deny verdict with the given reason.
pub fn invalid_transaction_verdict(reason: &str) -> TransactionVerdict {
    TransactionVerdict {
        contract_id: String::new(),
        transaction_id: String::new(),
        result: ValidationResult::Invalid,
        confidence: 0.85,
        reasons: vec![reason.to_string()],
        alignment_score: 0.1,
        risk_factors: vec!["purpose_mismatch".into()],
        suggested_action: SuggestedAction::Deny,
        validated_at: Utc::now(),
        client_protection: None,
    }
}

/// A flag verdict for behavior that is off but not clearly invalid.
pub fn suspicious_transaction_verdict(reason: &str) -> TransactionVerdict {
    TransactionVerdict {
        contract_id: String::new(),
        transaction_id: String::new(),
        result: ValidationResult::Suspicious,
        confidence: 0.7,
        reasons: vec![reason.to_string()],
        alignment_score: 0.4,
        risk_factors: vec!["anomalous_pattern".into()],
        suggested_action: SuggestedAction::Flag,
        validated_at: Utc::now(),
        client_protection: None,
    }
}

/// A clean client-protection verdict.
pub fn compliant_response_verdict() -> ResponseVerdict {
    ResponseVerdict {
        contract_id: String::new(),
        transaction_id: String::new(),
        result: ValidationResult::Valid,
        confidence: 0.9,
        reasons: vec!["Response stays within declared requirements".into()],
        compliance_score: 0.95,
        privacy_violations: Vec::new(),
        leakage_risks: Vec::new(),
        unexpected_data: Vec::new(),
        suggested_action: SuggestedAction::Allow,
        validated_at: Utc::now(),
    }
}

/// A client-protection verdict flagging the given violations.
pub fn violating_response_verdict(
    privacy_violations: Vec<String>,
    leakage_risks: Vec<String>,
) -> ResponseVerdict {
    ResponseVerdict {
        contract_id: String::new(),
        transaction_id: String::new(),
        result: ValidationResult::Invalid,
        confidence: 0.8,
        reasons: vec!["Response exceeds the client's declared scope".into()],
        compliance_score: 0.2,
        privacy_violations,
        leakage_risks,
        unexpected_data: Vec::new(),
        suggested_action: SuggestedAction::Sanitize,
        validated_at: Utc::now(),
    }
}

pub fn no_drift_report() -> DriftReport {
    DriftReport {
        drift_detected: false,
        severity: DriftSeverity::None,
        indicators: Vec::new(),
        recommended_action: DriftAction::Continue,
        confidence: 0.9,
        error: None,
    }
}

pub fn drift_report(severity: DriftSeverity, action: DriftAction) -> DriftReport {
    DriftReport {
        drift_detected: true,
        severity,
        indicators: vec!["Requests no longer match the stated purpose".into()],
        recommended_action: action,
        confidence: 0.85,
        error: None,
    }
}
