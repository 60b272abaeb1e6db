//! Contract store — the shared mutable state behind the broker.
//!
//! Locking discipline: the outer maps are behind `RwLock`s held only long
//! enough to resolve an `Arc`; each contract's mutable state (lifecycle
//! fields plus its ledger) sits behind that contract's own `Mutex`, so
//! concurrent operations on the *same* contract serialize while different
//! contracts proceed independently. No lock is ever held across an `.await`.

use crate::ledger::TransactionLedger;
use intentgate_core::IntentContract;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// One stored contract: immutable id plus lock-guarded mutable state.
pub(crate) struct ContractCell {
    pub id: String,
    pub inner: Mutex<ContractInner>,
}

/// The mutable half of a contract: the contract itself and its ledger,
/// updated together under one lock so counters and records never diverge.
pub(crate) struct ContractInner {
    pub contract: IntentContract,
    pub ledger: TransactionLedger,
}

/// Running negotiation counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NegotiationCounters {
    pub total_negotiations: u64,
    pub successful_contracts: u64,
    pub failed_negotiations: u64,
    pub active_contracts: u64,
}

/// Shared store of contracts, client sessions, and broker counters.
#[derive(Default)]
pub(crate) struct ContractStore {
    contracts: RwLock<HashMap<String, Arc<ContractCell>>>,
    /// client_id -> contract_id of the client's current active contract.
    sessions: RwLock<HashMap<String, String>>,
    counters: Mutex<NegotiationCounters>,
}

impl ContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a contract permanently (active or not). Returns its cell.
    pub fn insert(&self, contract: IntentContract) -> Arc<ContractCell> {
        let cell = Arc::new(ContractCell {
            id: contract.contract_id.clone(),
            inner: Mutex::new(ContractInner {
                contract,
                ledger: TransactionLedger::new(),
            }),
        });
        self.contracts
            .write()
            .unwrap()
            .insert(cell.id.clone(), cell.clone());
        cell
    }

    pub fn get(&self, contract_id: &str) -> Option<Arc<ContractCell>> {
        self.contracts.read().unwrap().get(contract_id).cloned()
    }

    /// Snapshot of every stored cell, for sweeps and listings.
    pub fn cells(&self) -> Vec<Arc<ContractCell>> {
        self.contracts.read().unwrap().values().cloned().collect()
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.read().unwrap().len()
    }

    /// Bind a client to its current active contract, replacing any prior
    /// session — at most one live session per client id.
    pub fn bind_session(&self, client_id: &str, contract_id: &str) {
        self.sessions
            .write()
            .unwrap()
            .insert(client_id.to_string(), contract_id.to_string());
    }

    pub fn session(&self, client_id: &str) -> Option<String> {
        self.sessions.read().unwrap().get(client_id).cloned()
    }

    /// Drop every session pointing at one of the given contracts.
    pub fn unbind_contracts(&self, contract_ids: &[String]) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.retain(|_, contract_id| !contract_ids.contains(contract_id));
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn counters(&self) -> NegotiationCounters {
        *self.counters.lock().unwrap()
    }

    pub fn update_counters(&self, f: impl FnOnce(&mut NegotiationCounters)) {
        f(&mut self.counters.lock().unwrap());
    }

    /// Recompute the active-contract counter from the contracts themselves.
    /// The sweeper uses this instead of incremental bookkeeping so the
    /// counter cannot drift from reality.
    pub fn recompute_active(&self) -> u64 {
        let cells = self.cells();
        let active = cells
            .iter()
            .filter(|cell| cell.inner.lock().unwrap().contract.is_active)
            .count() as u64;
        self.update_counters(|c| c.active_contracts = active);
        active
    }
}
