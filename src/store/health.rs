//! Background store liveness probe.

use super::CounterStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, warn};

/// Periodically exercises a lightweight liveness check against the store.
/// Failures are logged and never crash the process; the serving paths have
/// their own degradation behavior.
pub struct HealthProbe {
    store: Arc<dyn CounterStore>,
    period: Duration,
}

impl HealthProbe {
    pub fn new(store: Arc<dyn CounterStore>, period: Duration) -> Self {
        HealthProbe { store, period }
    }

    pub async fn run(self) {
        let mut tick = interval(self.period);

        loop {
            tick.tick().await;
            match self.store.ping().await {
                Ok(()) => debug!("store health probe ok"),
                Err(e) => warn!(error = %e, "store health probe failed"),
            }
        }
    }
}
