//! The intent broker — declaration, negotiation, and contract access.
//!
//! Negotiation is the only path that creates contracts. It never panics past
//! its boundary: an unreachable or confused analyzer produces an inactive,
//! audit-recorded contract rather than an error. `NotFound` on the handles
//! does propagate, since it indicates caller misuse.

use crate::registry::DeclarationRegistry;
use crate::store::ContractStore;
use intentgate_core::{
    BrokerError, ClientIntent, CompatibilityReport, CompatibilityStatus, IntentAnalyzer,
    IntentContract, ResourceKind, Result, ServerCapability,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestrates the mutual-intent agreement lifecycle:
///
/// 1. Declaration — clients declare intent, servers register capabilities
/// 2. Negotiation — the analyzer judges compatibility and a contract is cut
/// 3. Validation — every transaction is checked against the agreed intent
pub struct IntentBroker {
    pub(crate) analyzer: Arc<dyn IntentAnalyzer>,
    pub(crate) registry: DeclarationRegistry,
    pub(crate) store: ContractStore,
    /// Serializes sweeps — at most one expiry sweep in flight.
    pub(crate) sweep_gate: tokio::sync::Mutex<()>,
}

impl IntentBroker {
    /// Create a broker around the given semantic analyzer.
    pub fn new(analyzer: Arc<dyn IntentAnalyzer>) -> Self {
        Self {
            analyzer,
            registry: DeclarationRegistry::new(),
            store: ContractStore::new(),
            sweep_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Phase 1: store a client's intent declaration. Returns its handle.
    pub fn declare_intent(&self, intent: ClientIntent) -> String {
        self.registry.declare_intent(intent)
    }

    /// Phase 1: store a server's capability declaration. Returns its handle.
    pub fn register_capability(&self, capability: ServerCapability) -> String {
        self.registry.register_capability(capability)
    }

    /// Phase 2: negotiate a contract between a declared intent and a
    /// registered capability.
    ///
    /// The returned contract may be inactive: `requires_negotiation` leaves
    /// it pending for an operator workflow, and incompatible or failed
    /// analyses leave it rejected. All outcomes are stored permanently for
    /// audit. Fails only when a handle does not resolve — in that case no
    /// contract is created.
    pub async fn negotiate(
        &self,
        intent_id: &str,
        capability_id: &str,
        extra_constraints: Option<Vec<String>>,
    ) -> Result<IntentContract> {
        self.store
            .update_counters(|c| c.total_negotiations += 1);

        let intent = self
            .registry
            .intent(intent_id)
            .ok_or_else(|| BrokerError::not_found(ResourceKind::Intent, intent_id))?;
        let capability = self
            .registry
            .capability(capability_id)
            .ok_or_else(|| BrokerError::not_found(ResourceKind::Capability, capability_id))?;

        info!(
            intent_id = %intent_id,
            capability_id = %capability_id,
            "Negotiating intent contract"
        );

        // The analyzer may be unreachable or return garbage; either way
        // negotiation proceeds with a synthesized failure report.
        let report = match self
            .analyzer
            .analyze_compatibility(&intent, &capability)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Compatibility analysis failed");
                CompatibilityReport::analysis_failed(e.to_string())
            }
        };

        let mut contract =
            IntentContract::new((*intent).clone(), (*capability).clone(), report);

        match contract.compatibility.status {
            CompatibilityStatus::Compatible => {
                contract.is_active = true;
                contract.agreed_purpose = contract.client_intent.purpose.clone();
                contract.allowed_operations =
                    contract.server_capability.supported_operations.clone();
                contract.data_access_scope = contract.client_intent.data_requirements.clone();
                contract.rate_limits = contract.server_capability.rate_limits.clone();

                // Constraint union: client's own, then analyzer-suggested,
                // then caller-supplied. Order preserved, duplicates allowed.
                let mut constraints = contract.client_intent.constraints.clone();
                constraints.extend(contract.compatibility.suggested_constraints.iter().cloned());
                constraints.extend(extra_constraints.unwrap_or_default());
                contract.constraints = constraints;

                self.store.update_counters(|c| c.successful_contracts += 1);
                info!(contract_id = %contract.contract_id, "Contract successfully negotiated");
            }
            CompatibilityStatus::RequiresNegotiation => {
                // Pending prefix keeps the audit trail readable; an operator
                // workflow outside the broker must re-drive negotiation.
                contract.agreed_purpose =
                    format!("PENDING: {}", contract.client_intent.purpose);
                warn!(contract_id = %contract.contract_id, "Contract requires negotiation");
            }
            CompatibilityStatus::Incompatible => {
                contract.agreed_purpose =
                    format!("REJECTED: {}", contract.client_intent.purpose);
                self.store.update_counters(|c| c.failed_negotiations += 1);
                warn!(
                    contract_id = %contract.contract_id,
                    "Contract rejected due to incompatibility"
                );
            }
            CompatibilityStatus::AnalysisFailed => {
                contract.agreed_purpose =
                    format!("FAILED: {}", contract.client_intent.purpose);
                self.store.update_counters(|c| c.failed_negotiations += 1);
                warn!(contract_id = %contract.contract_id, "Contract negotiation failed");
            }
        }

        let cell = self.store.insert(contract);
        let view = cell.inner.lock().unwrap().contract.clone();

        if view.is_active {
            self.store
                .bind_session(&view.client_intent.client_id, &view.contract_id);
            self.store.update_counters(|c| c.active_contracts += 1);
        }

        Ok(view)
    }

    /// Audit view of one stored contract.
    pub fn contract(&self, contract_id: &str) -> Option<IntentContract> {
        self.store
            .get(contract_id)
            .map(|cell| cell.inner.lock().unwrap().contract.clone())
    }

    /// The current active contract for a client, if any.
    pub fn contract_for_client(&self, client_id: &str) -> Option<IntentContract> {
        let contract_id = self.store.session(client_id)?;
        self.contract(&contract_id)
    }

    /// Snapshot of every contract currently flagged active.
    pub fn active_contracts(&self) -> Vec<IntentContract> {
        self.store
            .cells()
            .iter()
            .filter_map(|cell| {
                let inner = cell.inner.lock().unwrap();
                inner.contract.is_active.then(|| inner.contract.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{declarations, StubAnalyzer};
    use intentgate_core::{AnalyzerError, VIOLATION_THRESHOLD};

    fn broker_with(analyzer: StubAnalyzer) -> (IntentBroker, Arc<StubAnalyzer>) {
        let analyzer = Arc::new(analyzer);
        (IntentBroker::new(analyzer.clone()), analyzer)
    }

    #[tokio::test]
    async fn compatible_negotiation_activates_contract() {
        let (broker, _) = broker_with(StubAnalyzer::compatible(0.9));
        let (intent, capability) = declarations();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);

        let contract = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();

        assert!(contract.is_active);
        assert_eq!(contract.agreed_purpose, "plan a weekend trip");
        assert_eq!(contract.allowed_operations, vec!["read"]);
        assert_eq!(contract.data_access_scope, vec!["weather"]);
        assert_eq!(
            contract.expires_at.unwrap(),
            contract.created_at + chrono::Duration::minutes(60)
        );

        let stats = broker.store.counters();
        assert_eq!(stats.total_negotiations, 1);
        assert_eq!(stats.successful_contracts, 1);
        assert_eq!(stats.active_contracts, 1);
    }

    #[tokio::test]
    async fn constraint_union_preserves_order_and_duplicates() {
        let analyzer = StubAnalyzer::compatible(0.9);
        analyzer.set_suggested_constraints(vec!["aggregate_only".into(), "read_only".into()]);
        let (broker, _) = broker_with(analyzer);
        let (intent, capability) = declarations();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);

        let contract = broker
            .negotiate(&intent_id, &capability_id, Some(vec!["audited".into()]))
            .await
            .unwrap();

        assert_eq!(
            contract.constraints,
            vec!["read_only", "aggregate_only", "read_only", "audited"]
        );
    }

    #[tokio::test]
    async fn unknown_capability_fails_without_creating_contract() {
        let (broker, analyzer) = broker_with(StubAnalyzer::compatible(0.9));
        let (intent, _) = declarations();
        let intent_id = broker.declare_intent(intent);

        let err = broker
            .negotiate(&intent_id, "no-such-capability", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BrokerError::NotFound {
                kind: ResourceKind::Capability,
                ..
            }
        ));
        assert_eq!(broker.store.contract_count(), 0);
        assert_eq!(analyzer.calls.compatibility(), 0);
        // The attempt itself is still counted.
        assert_eq!(broker.store.counters().total_negotiations, 1);
    }

    #[tokio::test]
    async fn incompatible_contract_is_inactive_but_retained() {
        let (broker, _) = broker_with(StubAnalyzer::incompatible());
        let (intent, capability) = declarations();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);

        let contract = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();

        assert!(!contract.is_active);
        assert!(contract.agreed_purpose.starts_with("REJECTED:"));
        assert_eq!(broker.store.contract_count(), 1);
        assert_eq!(broker.store.counters().failed_negotiations, 1);
        assert_eq!(broker.store.counters().active_contracts, 0);
        assert!(broker
            .contract_for_client(&contract.client_intent.client_id)
            .is_none());
    }

    #[tokio::test]
    async fn requires_negotiation_leaves_contract_pending() {
        let (broker, _) = broker_with(StubAnalyzer::requires_negotiation());
        let (intent, capability) = declarations();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);

        let contract = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();

        assert!(!contract.is_active);
        assert!(contract.agreed_purpose.starts_with("PENDING:"));
        // Neither a success nor a failed negotiation.
        let stats = broker.store.counters();
        assert_eq!(stats.successful_contracts, 0);
        assert_eq!(stats.failed_negotiations, 0);
    }

    #[tokio::test]
    async fn analyzer_failure_degrades_to_inactive_contract() {
        let analyzer = StubAnalyzer::compatible(0.9);
        analyzer.fail_compatibility(AnalyzerError::Timeout("no response".into()));
        let (broker, _) = broker_with(analyzer);
        let (intent, capability) = declarations();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);

        let contract = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();

        assert!(!contract.is_active);
        assert!(contract.agreed_purpose.starts_with("FAILED:"));
        assert_eq!(
            contract.compatibility.status,
            CompatibilityStatus::AnalysisFailed
        );
        assert!(contract.compatibility.reasons[0].contains("no response"));
    }

    #[tokio::test]
    async fn new_active_contract_replaces_client_session() {
        let (broker, _) = broker_with(StubAnalyzer::compatible(0.9));
        let (intent, capability) = declarations();
        let client_id = intent.client_id.clone();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);

        let first = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();
        let second = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();

        assert_ne!(first.contract_id, second.contract_id);
        let current = broker.contract_for_client(&client_id).unwrap();
        assert_eq!(current.contract_id, second.contract_id);
    }

    #[tokio::test]
    async fn violation_threshold_is_visible_through_audit_view() {
        let (broker, _) = broker_with(StubAnalyzer::compatible(0.9));
        let (intent, capability) = declarations();
        let intent_id = broker.declare_intent(intent);
        let capability_id = broker.register_capability(capability);
        let contract = broker
            .negotiate(&intent_id, &capability_id, None)
            .await
            .unwrap();

        let cell = broker.store.get(&contract.contract_id).unwrap();
        for _ in 0..VIOLATION_THRESHOLD {
            cell.inner.lock().unwrap().contract.record_violation();
        }
        assert!(!broker.contract(&contract.contract_id).unwrap().is_active);
    }
}
