//! Observability snapshots for operators and monitoring.

use crate::broker::IntentBroker;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time snapshot of one contract's lifecycle and counters.
#[derive(Debug, Clone, Serialize)]
pub struct ContractStats {
    pub contract_id: String,
    pub agreed_purpose: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,
    pub violation_count: u32,
    pub transaction_count: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    pub success_rate: f64,
    pub ledger_entries: usize,
    pub constraints: Vec<String>,
}

/// Point-in-time snapshot of the whole broker.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerStats {
    pub total_negotiations: u64,
    pub successful_contracts: u64,
    pub failed_negotiations: u64,
    pub active_contracts: u64,
    pub total_contracts: usize,
    pub intents_declared: usize,
    pub capabilities_registered: usize,
    pub active_sessions: usize,
}

impl IntentBroker {
    /// Stats for one contract, or `None` if it was never negotiated.
    pub fn contract_stats(&self, contract_id: &str) -> Option<ContractStats> {
        let cell = self.store.get(contract_id)?;
        let inner = cell.inner.lock().unwrap();
        Some(ContractStats {
            contract_id: inner.contract.contract_id.clone(),
            agreed_purpose: inner.contract.agreed_purpose.clone(),
            is_active: inner.contract.is_active,
            created_at: inner.contract.created_at,
            expires_at: inner.contract.expires_at,
            last_validated: inner.contract.last_validated,
            violation_count: inner.contract.violation_count,
            transaction_count: inner.contract.transaction_count,
            successful_transactions: inner.contract.successful_transactions,
            failed_transactions: inner.contract.failed_transactions,
            success_rate: inner.contract.success_rate(),
            ledger_entries: inner.ledger.len(),
            constraints: inner.contract.constraints.clone(),
        })
    }

    /// Broker-wide stats. The active count is recomputed from the contracts
    /// themselves, so the snapshot is accurate even mid-expiry.
    pub fn broker_stats(&self) -> BrokerStats {
        self.store.recompute_active();
        let counters = self.store.counters();
        BrokerStats {
            total_negotiations: counters.total_negotiations,
            successful_contracts: counters.successful_contracts,
            failed_negotiations: counters.failed_negotiations,
            active_contracts: counters.active_contracts,
            total_contracts: self.store.contract_count(),
            intents_declared: self.registry.intent_count(),
            capabilities_registered: self.registry.capability_count(),
            active_sessions: self.store.session_count(),
        }
    }
}
