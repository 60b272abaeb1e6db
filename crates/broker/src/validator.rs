//! Phase 3: transaction validation against an agreed contract.
//!
//! Validation never returns an error to the caller — every outcome is a
//! verdict, so a gateway can branch uniformly on allow vs deny. Terminal
//! states (unknown, inactive, expired contract) deny without consulting the
//! analyzer; everything else is fetch → analyzer call → commit, with no lock
//! held across the await.

use crate::broker::IntentBroker;
use intentgate_core::{
    ResponseVerdict, TransactionRecord, TransactionVerdict, ValidationResult,
};
use tracing::warn;
use uuid::Uuid;

impl IntentBroker {
    /// Validate a client request against its contract (server protection).
    ///
    /// An already-available response may be passed along as extra context
    /// for the analyzer and the ledger record; it does not trigger the
    /// client-protection check — that is [`Self::validate_bidirectional`].
    pub async fn validate_request(
        &self,
        contract_id: &str,
        request: &serde_json::Value,
        response: Option<&serde_json::Value>,
    ) -> TransactionVerdict {
        self.validate_inner(contract_id, request, response).await
    }

    /// Validate a request and, when the request is valid and a response is
    /// present, the server's response as well (client protection).
    ///
    /// A non-valid request short-circuits: the response oracle is never
    /// consulted. A non-valid response escalates the verdict to suspicious,
    /// taking its risk factors and suggested action from the response check.
    /// Both halves share one transaction id.
    pub async fn validate_bidirectional(
        &self,
        contract_id: &str,
        request: &serde_json::Value,
        response: Option<&serde_json::Value>,
    ) -> TransactionVerdict {
        let mut verdict = self.validate_inner(contract_id, request, response).await;
        if verdict.result != ValidationResult::Valid {
            return verdict;
        }
        let Some(response) = response else {
            return verdict;
        };

        let protection = self
            .response_check(contract_id, &verdict.transaction_id, request, response)
            .await;
        if protection.result != ValidationResult::Valid {
            verdict.result = ValidationResult::Suspicious;
            verdict.suggested_action = protection.suggested_action;
            let mut risks: Vec<String> = protection
                .privacy_violations
                .iter()
                .chain(protection.leakage_risks.iter())
                .cloned()
                .collect();
            if risks.is_empty() {
                risks = vec![
                    "server_response_violation".to_string(),
                    "client_protection_triggered".to_string(),
                ];
            }
            verdict.risk_factors = risks;
            warn!(
                contract_id = %contract_id,
                transaction_id = %verdict.transaction_id,
                "Server response violated client protection"
            );
        }
        verdict.client_protection = Some(protection);
        verdict
    }

    /// Validate a server response in isolation (client protection only).
    /// Read-only: no counters, violations, or ledger entries are touched.
    pub async fn validate_response(
        &self,
        contract_id: &str,
        request: &serde_json::Value,
        response: &serde_json::Value,
    ) -> ResponseVerdict {
        let transaction_id = Uuid::new_v4().to_string();
        self.response_check(contract_id, &transaction_id, request, response)
            .await
    }

    async fn validate_inner(
        &self,
        contract_id: &str,
        request: &serde_json::Value,
        response: Option<&serde_json::Value>,
    ) -> TransactionVerdict {
        let Some(cell) = self.store.get(contract_id) else {
            return TransactionVerdict::denied(contract_id, "Contract not found", "unknown_contract");
        };

        // Terminal checks and snapshot under the contract lock; the lock is
        // released before the analyzer call.
        let (purpose, constraints) = {
            let mut inner = cell.inner.lock().unwrap();
            if !inner.contract.is_active {
                return TransactionVerdict::denied(
                    contract_id,
                    "Contract is not active",
                    "inactive_contract",
                );
            }
            if inner.contract.is_expired() {
                // Lazy expiry: flip here so the deny is consistent even if
                // the sweeper has not run yet.
                inner.contract.is_active = false;
                drop(inner);
                self.store.recompute_active();
                warn!(contract_id = %contract_id, "Contract expired during validation");
                return TransactionVerdict::denied(
                    contract_id,
                    "Contract has expired",
                    "expired_contract",
                );
            }
            (
                inner.contract.agreed_purpose.clone(),
                inner.contract.constraints.clone(),
            )
        };

        let verdict = match self
            .analyzer
            .validate_transaction(request, response, &purpose, &constraints)
            .await
        {
            Ok(mut verdict) => {
                verdict.contract_id = contract_id.to_string();
                verdict.transaction_id = Uuid::new_v4().to_string();
                verdict
            }
            Err(e) => {
                warn!(contract_id = %contract_id, error = %e, "Transaction analysis failed");
                TransactionVerdict::denied(
                    contract_id,
                    format!("Validation analysis failed: {e}"),
                    "analysis_failure",
                )
            }
        };

        // Commit: counters, violation bookkeeping, and the ledger entry land
        // together under the contract lock.
        let deactivated = {
            let mut inner = cell.inner.lock().unwrap();
            inner
                .contract
                .record_transaction(verdict.result == ValidationResult::Valid);
            // Every non-valid verdict counts against the violation budget.
            if verdict.result != ValidationResult::Valid {
                inner.contract.record_violation();
                if !inner.contract.is_active {
                    warn!(
                        contract_id = %contract_id,
                        violations = inner.contract.violation_count,
                        "Contract deactivated after repeated violations"
                    );
                }
            }
            inner.ledger.push(TransactionRecord {
                transaction_id: verdict.transaction_id.clone(),
                timestamp: verdict.validated_at,
                request: request.clone(),
                response: response.cloned(),
                result: verdict.result,
                alignment_score: verdict.alignment_score,
            });
            !inner.contract.is_active
        };
        if deactivated {
            self.store.recompute_active();
        }

        verdict
    }

    /// Client-protection check shared by `validate_response` and the
    /// bidirectional path. Never mutates contract state.
    async fn response_check(
        &self,
        contract_id: &str,
        transaction_id: &str,
        request: &serde_json::Value,
        response: &serde_json::Value,
    ) -> ResponseVerdict {
        let Some(cell) = self.store.get(contract_id) else {
            return ResponseVerdict::denied(
                contract_id,
                transaction_id,
                "Contract not found",
                "unknown_contract",
                "contract_not_found",
            );
        };

        let (intent, capability, constraints) = {
            let inner = cell.inner.lock().unwrap();
            (
                inner.contract.client_intent.clone(),
                inner.contract.server_capability.clone(),
                inner.contract.constraints.clone(),
            )
        };

        match self
            .analyzer
            .validate_response(&intent, &capability, request, response, &constraints)
            .await
        {
            Ok(mut verdict) => {
                verdict.contract_id = contract_id.to_string();
                verdict.transaction_id = transaction_id.to_string();
                verdict
            }
            Err(e) => {
                warn!(contract_id = %contract_id, error = %e, "Response analysis failed");
                ResponseVerdict::denied(
                    contract_id,
                    transaction_id,
                    format!("Response analysis failed: {e}"),
                    "analysis_failure",
                    "unverified_response",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        declarations, invalid_transaction_verdict, suspicious_transaction_verdict,
        violating_response_verdict, StubAnalyzer,
    };
    use intentgate_core::{
        AnalyzerError, ClientIntent, SuggestedAction, VIOLATION_THRESHOLD,
    };
    use std::sync::Arc;

    async fn broker_with_contract(
        analyzer: StubAnalyzer,
    ) -> (IntentBroker, Arc<StubAnalyzer>, String) {
        let analyzer = Arc::new(analyzer);
        let broker = IntentBroker::new(analyzer.clone());
        let (intent, capability) = declarations();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);
        let contract = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();
        (broker, analyzer, contract.contract_id)
    }

    fn lookup_request() -> serde_json::Value {
        serde_json::json!({"tool": "get_forecast", "args": {"city": "Lisbon"}})
    }

    #[tokio::test]
    async fn unknown_contract_denies_without_analyzer() {
        let analyzer = Arc::new(StubAnalyzer::compatible(0.9));
        let broker = IntentBroker::new(analyzer.clone());

        let verdict = broker.validate_request("missing", &lookup_request(), None).await;

        assert_eq!(verdict.result, ValidationResult::Invalid);
        assert_eq!(verdict.risk_factors, vec!["unknown_contract".to_string()]);
        assert_eq!(verdict.suggested_action, SuggestedAction::Deny);
        assert_eq!(analyzer.calls.transaction(), 0);
    }

    #[tokio::test]
    async fn inactive_contract_denies_without_analyzer() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::incompatible()).await;

        let verdict = broker.validate_request(&contract_id, &lookup_request(), None).await;

        assert_eq!(verdict.risk_factors, vec!["inactive_contract".to_string()]);
        assert_eq!(analyzer.calls.transaction(), 0);
        // No transaction was recorded either.
        assert_eq!(broker.contract(&contract_id).unwrap().transaction_count, 0);
    }

    #[tokio::test]
    async fn expired_contract_denies_and_deactivates_lazily() {
        let analyzer = Arc::new(StubAnalyzer::compatible(0.9));
        let broker = IntentBroker::new(analyzer.clone());
        let intent = ClientIntent::new(
            "plan a weekend trip",
            vec!["weather".into()],
            vec![],
            Some(-1),
        );
        let (_, capability) = declarations();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);
        let contract = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();
        assert!(contract.is_active);

        let verdict = broker
            .validate_request(&contract.contract_id, &lookup_request(), None)
            .await;

        assert_eq!(verdict.risk_factors, vec!["expired_contract".to_string()]);
        assert_eq!(analyzer.calls.transaction(), 0);
        assert!(!broker.contract(&contract.contract_id).unwrap().is_active);
    }

    #[tokio::test]
    async fn valid_request_commits_counters_and_ledger() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;

        let verdict = broker.validate_request(&contract_id, &lookup_request(), None).await;

        assert_eq!(verdict.result, ValidationResult::Valid);
        assert_eq!(verdict.contract_id, contract_id);
        assert!(!verdict.transaction_id.is_empty());
        assert_eq!(analyzer.calls.transaction(), 1);

        let contract = broker.contract(&contract_id).unwrap();
        assert_eq!(contract.transaction_count, 1);
        assert_eq!(contract.successful_transactions, 1);
        assert!(contract.last_validated.is_some());

        let cell = broker.store.get(&contract_id).unwrap();
        let inner = cell.inner.lock().unwrap();
        assert_eq!(inner.ledger.len(), 1);
    }

    #[tokio::test]
    async fn repeated_violations_hit_threshold_and_deactivate() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;
        analyzer.set_transaction_default(invalid_transaction_verdict("off-purpose request"));

        for _ in 0..VIOLATION_THRESHOLD {
            let verdict = broker.validate_request(&contract_id, &lookup_request(), None).await;
            assert_eq!(verdict.result, ValidationResult::Invalid);
        }

        let contract = broker.contract(&contract_id).unwrap();
        assert_eq!(contract.violation_count, VIOLATION_THRESHOLD);
        assert!(!contract.is_active);
        assert_eq!(contract.failed_transactions, u64::from(VIOLATION_THRESHOLD));

        // Once deactivated, further requests deny without the analyzer.
        let before = analyzer.calls.transaction();
        let verdict = broker.validate_request(&contract_id, &lookup_request(), None).await;
        assert_eq!(verdict.risk_factors, vec!["inactive_contract".to_string()]);
        assert_eq!(analyzer.calls.transaction(), before);
    }

    #[tokio::test]
    async fn analyzer_failure_is_a_failed_transaction() {
        let (broker, _, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;
        let cell = broker.store.get(&contract_id).unwrap();

        let analyzer = Arc::new(StubAnalyzer::compatible(0.9));
        analyzer.fail_transactions(AnalyzerError::Network("connection refused".into()));
        // Swap in a failing analyzer against the same store.
        let broker = IntentBroker {
            analyzer: analyzer.clone(),
            ..broker
        };

        let verdict = broker.validate_request(&contract_id, &lookup_request(), None).await;

        assert_eq!(verdict.result, ValidationResult::Invalid);
        assert!(verdict.reasons[0].contains("connection refused"));
        assert_eq!(verdict.risk_factors, vec!["analysis_failure".to_string()]);

        let inner = cell.inner.lock().unwrap();
        assert_eq!(inner.contract.failed_transactions, 1);
        // The deny verdict counts like any other non-valid outcome.
        assert_eq!(inner.contract.violation_count, 1);
        assert!(inner.contract.is_active);
        assert_eq!(inner.ledger.len(), 1);
    }

    #[tokio::test]
    async fn suspicious_verdict_burns_the_violation_budget() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;
        analyzer.set_transaction_default(suspicious_transaction_verdict("unusual access pattern"));

        let verdict = broker.validate_request(&contract_id, &lookup_request(), None).await;
        assert_eq!(verdict.result, ValidationResult::Suspicious);

        let contract = broker.contract(&contract_id).unwrap();
        assert_eq!(contract.failed_transactions, 1);
        assert_eq!(contract.violation_count, 1);

        // Staying suspicious eventually deactivates, same as invalid.
        for _ in 1..VIOLATION_THRESHOLD {
            broker.validate_request(&contract_id, &lookup_request(), None).await;
        }
        let contract = broker.contract(&contract_id).unwrap();
        assert_eq!(contract.violation_count, VIOLATION_THRESHOLD);
        assert!(!contract.is_active);
    }

    #[tokio::test]
    async fn request_path_accepts_a_response_without_protection_check() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;

        let response = serde_json::json!({"forecast": "sunny"});
        let verdict = broker
            .validate_request(&contract_id, &lookup_request(), Some(&response))
            .await;

        assert_eq!(verdict.result, ValidationResult::Valid);
        assert!(verdict.client_protection.is_none());
        assert_eq!(analyzer.calls.transaction(), 1);
        assert_eq!(analyzer.calls.response(), 0);

        // The response still lands in the ledger record.
        let cell = broker.store.get(&contract_id).unwrap();
        let inner = cell.inner.lock().unwrap();
        let records = inner
            .ledger
            .recent_since(chrono::Utc::now() - chrono::Duration::hours(1));
        assert_eq!(records[0].response, Some(response));
    }

    #[tokio::test]
    async fn bidirectional_short_circuits_on_invalid_request() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;
        analyzer.set_transaction_default(invalid_transaction_verdict("off-purpose request"));

        let response = serde_json::json!({"forecast": "sunny"});
        let verdict = broker
            .validate_bidirectional(&contract_id, &lookup_request(), Some(&response))
            .await;

        assert_eq!(verdict.result, ValidationResult::Invalid);
        assert!(verdict.client_protection.is_none());
        assert_eq!(analyzer.calls.response(), 0);
    }

    #[tokio::test]
    async fn bidirectional_attaches_clean_protection_verdict() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;

        let response = serde_json::json!({"forecast": "sunny"});
        let verdict = broker
            .validate_bidirectional(&contract_id, &lookup_request(), Some(&response))
            .await;

        assert_eq!(verdict.result, ValidationResult::Valid);
        assert_eq!(analyzer.calls.response(), 1);
        let protection = verdict.client_protection.unwrap();
        assert_eq!(protection.result, ValidationResult::Valid);
        assert_eq!(protection.transaction_id, verdict.transaction_id);
        assert_eq!(protection.contract_id, contract_id);
    }

    #[tokio::test]
    async fn bidirectional_escalates_on_violating_response() {
        let (broker, _, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;
        let analyzer = Arc::new(StubAnalyzer::compatible(0.9));
        analyzer.set_response(violating_response_verdict(
            vec!["pii_exposure".into()],
            vec!["location_leak".into()],
        ));
        let broker = IntentBroker {
            analyzer: analyzer.clone(),
            ..broker
        };

        let response = serde_json::json!({"forecast": "sunny", "home_address": "..."});
        let verdict = broker
            .validate_bidirectional(&contract_id, &lookup_request(), Some(&response))
            .await;

        assert_eq!(verdict.result, ValidationResult::Suspicious);
        assert_eq!(verdict.suggested_action, SuggestedAction::Sanitize);
        assert_eq!(
            verdict.risk_factors,
            vec!["pii_exposure".to_string(), "location_leak".to_string()]
        );
        assert!(verdict.client_protection.is_some());
    }

    #[tokio::test]
    async fn bidirectional_without_response_skips_protection() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;

        let verdict = broker
            .validate_bidirectional(&contract_id, &lookup_request(), None)
            .await;

        assert_eq!(verdict.result, ValidationResult::Valid);
        assert!(verdict.client_protection.is_none());
        assert_eq!(analyzer.calls.response(), 0);
    }

    #[tokio::test]
    async fn response_path_is_read_only() {
        let (broker, analyzer, contract_id) =
            broker_with_contract(StubAnalyzer::compatible(0.9)).await;

        let response = serde_json::json!({"forecast": "sunny"});
        let verdict = broker
            .validate_response(&contract_id, &lookup_request(), &response)
            .await;

        assert_eq!(verdict.result, ValidationResult::Valid);
        assert_eq!(analyzer.calls.response(), 1);
        let contract = broker.contract(&contract_id).unwrap();
        assert_eq!(contract.transaction_count, 0);
        assert_eq!(contract.violation_count, 0);
    }

    #[tokio::test]
    async fn response_path_unknown_contract() {
        let analyzer = Arc::new(StubAnalyzer::compatible(0.9));
        let broker = IntentBroker::new(analyzer.clone());

        let response = serde_json::json!({"forecast": "sunny"});
        let verdict = broker
            .validate_response("missing", &lookup_request(), &response)
            .await;

        assert_eq!(verdict.result, ValidationResult::Invalid);
        assert_eq!(verdict.privacy_violations, vec!["unknown_contract".to_string()]);
        assert_eq!(analyzer.calls.response(), 0);
    }
}
