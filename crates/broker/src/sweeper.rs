//! Expiry sweeping — lazy expiry's proactive counterpart.
//!
//! Validation already denies expired contracts on contact; the sweeper
//! additionally deactivates them in the background so listings, sessions,
//! and counters do not advertise contracts nobody can use.

use crate::broker::IntentBroker;
use intentgate_config::BrokerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

impl IntentBroker {
    /// Deactivate every active contract whose expiry has passed, drop their
    /// client sessions, and recompute the active counter. Returns the number
    /// of contracts deactivated by this sweep.
    ///
    /// At most one sweep runs at a time; concurrent callers queue on the
    /// gate rather than double-sweeping.
    pub async fn sweep_expired(&self) -> usize {
        let _gate = self.sweep_gate.lock().await;

        let mut expired = Vec::new();
        for cell in self.store.cells() {
            let mut inner = cell.inner.lock().unwrap();
            if inner.contract.is_active && inner.contract.is_expired() {
                inner.contract.is_active = false;
                expired.push(cell.id.clone());
            }
        }

        if !expired.is_empty() {
            self.store.unbind_contracts(&expired);
            info!(count = expired.len(), "Swept expired contracts");
        }
        // Recomputed from the contracts themselves rather than decremented,
        // so a racing lazy-expiry flip cannot skew the counter.
        self.store.recompute_active();

        expired.len()
    }
}

/// Handle to the background sweep task. Aborts the task on drop.
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a background task sweeping at the given interval.
    pub fn spawn(broker: Arc<IntentBroker>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let swept = broker.sweep_expired().await;
                debug!(swept, "Sweep cycle complete");
            }
        });
        Self { handle }
    }

    /// Spawn with the interval from broker configuration.
    pub fn spawn_from_config(broker: Arc<IntentBroker>, config: &BrokerConfig) -> Self {
        Self::spawn(broker, Duration::from_secs(config.sweep_interval_secs))
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{declarations, StubAnalyzer};
    use intentgate_core::ClientIntent;

    async fn broker_with_contracts() -> (IntentBroker, String, String) {
        let broker = IntentBroker::new(Arc::new(StubAnalyzer::compatible(0.9)));
        let (_, capability) = declarations();
        let capability_id = broker.register_capability(capability);

        let expired_intent = ClientIntent::new(
            "plan a weekend trip",
            vec!["weather".into()],
            vec![],
            Some(-1),
        );
        let expired_id = broker.declare_intent(expired_intent);
        let expired = broker
            .negotiate(&expired_id, &capability_id, None)
            .await
            .unwrap();

        let (fresh_intent, _) = declarations();
        let fresh_id = broker.declare_intent(fresh_intent);
        let fresh = broker
            .negotiate(&fresh_id, &capability_id, None)
            .await
            .unwrap();

        (broker, expired.contract_id, fresh.contract_id)
    }

    #[tokio::test]
    async fn sweep_deactivates_only_expired_contracts() {
        let (broker, expired_id, fresh_id) = broker_with_contracts().await;

        let swept = broker.sweep_expired().await;

        assert_eq!(swept, 1);
        let expired = broker.contract(&expired_id).unwrap();
        assert!(!expired.is_active);
        assert!(broker.contract(&fresh_id).unwrap().is_active);
        assert!(broker
            .contract_for_client(&expired.client_intent.client_id)
            .is_none());
        assert_eq!(broker.store.counters().active_contracts, 1);
    }

    #[tokio::test]
    async fn second_sweep_finds_nothing() {
        let (broker, _, _) = broker_with_contracts().await;
        assert_eq!(broker.sweep_expired().await, 1);
        assert_eq!(broker.sweep_expired().await, 0);
    }

    #[tokio::test]
    async fn sweep_on_empty_store_is_a_no_op() {
        let broker = IntentBroker::new(Arc::new(StubAnalyzer::compatible(0.9)));
        assert_eq!(broker.sweep_expired().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_deactivates_expired_contracts() {
        let (broker, expired_id, _) = broker_with_contracts().await;
        let broker = Arc::new(broker);

        let sweeper = Sweeper::spawn(broker.clone(), Duration::from_secs(60));
        // The first interval tick fires immediately; let it run.
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!broker.contract(&expired_id).unwrap().is_active);
        sweeper.shutdown();
    }
}
