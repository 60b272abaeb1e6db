//! Phase 4: drift analysis over a contract's recent transaction window.
//!
//! Drift asks a different question than per-transaction validation: not "is
//! this request ok" but "has the pattern of requests wandered from the
//! declared purpose". Only high-severity drift mutates the contract.

use crate::broker::IntentBroker;
use chrono::{Duration, Utc};
use intentgate_core::{BrokerError, DriftReport, DriftSeverity, ResourceKind, Result};
use tracing::{info, warn};

impl IntentBroker {
    /// Analyze the contract's transactions from the trailing window for
    /// drift from the agreed purpose.
    ///
    /// An empty window short-circuits to a no-drift report without touching
    /// the analyzer. High-severity drift permanently deactivates the
    /// contract; an analyzer failure leaves it untouched and recommends
    /// operator review.
    pub async fn analyze_drift(&self, contract_id: &str, window_hours: i64) -> Result<DriftReport> {
        let cell = self
            .store
            .get(contract_id)
            .ok_or_else(|| BrokerError::not_found(ResourceKind::Contract, contract_id))?;

        let cutoff = Utc::now() - Duration::hours(window_hours);
        let (purpose, records) = {
            let inner = cell.inner.lock().unwrap();
            (
                inner.contract.agreed_purpose.clone(),
                inner.ledger.recent_since(cutoff),
            )
        };

        if records.is_empty() {
            return Ok(DriftReport::idle());
        }

        let report = match self
            .analyzer
            .analyze_drift(&purpose, &records, window_hours)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(contract_id = %contract_id, error = %e, "Drift analysis failed");
                return Ok(DriftReport::analysis_failed(e.to_string()));
            }
        };

        match report.severity {
            DriftSeverity::High => {
                cell.inner.lock().unwrap().contract.is_active = false;
                self.store
                    .unbind_contracts(std::slice::from_ref(&cell.id));
                self.store.recompute_active();
                warn!(
                    contract_id = %contract_id,
                    indicators = ?report.indicators,
                    "High-severity drift detected; contract deactivated"
                );
            }
            DriftSeverity::Medium => {
                warn!(
                    contract_id = %contract_id,
                    indicators = ?report.indicators,
                    "Medium-severity drift detected"
                );
            }
            _ => {
                info!(
                    contract_id = %contract_id,
                    drift_detected = report.drift_detected,
                    "Drift analysis complete"
                );
            }
        }

        Ok(report)
    }
}
