use crate::clock::{Clock, TokioClock};
use crate::config::DEFAULT_REFRESH_PERIOD;
use policy_core::MetricsState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefreshSummary {
    pub cycles: u64,
    /// Series updates that failed, summed over all cycles.
    pub failures: usize,
}

/// Drives `MetricsState::initialize_and_update` once immediately and then
/// once per period until cancelled.
pub struct RefreshLoop<C = TokioClock> {
    state: Arc<MetricsState>,
    clock: C,
    period: Duration,
}

impl RefreshLoop<TokioClock> {
    pub fn new(state: Arc<MetricsState>, period: Duration) -> Self {
        Self::with_clock(state, period, TokioClock)
    }

    pub fn with_defaults(state: Arc<MetricsState>) -> Self {
        Self::new(state, DEFAULT_REFRESH_PERIOD)
    }
}

impl<C: Clock> RefreshLoop<C> {
    pub fn with_clock(state: Arc<MetricsState>, period: Duration, clock: C) -> Self {
        Self {
            state,
            clock,
            period,
        }
    }

    pub async fn run(&self, token: CancellationToken) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        info!("Generating initial metrics...");
        self.cycle(&mut summary).await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = self.clock.sleep(self.period) => {}
            }

            info!("Refreshing metrics...");
            self.cycle(&mut summary).await;
        }

        info!("Refresh loop stopped after {} cycles", summary.cycles);
        summary
    }

    async fn cycle(&self, summary: &mut RefreshSummary) {
        let report = self.state.initialize_and_update().await;
        summary.cycles += 1;
        summary.failures += report.failures.len();

        if report.is_clean() {
            debug!(
                "Cycle {} applied {} counters, {} gauges",
                summary.cycles, report.counters_applied, report.gauges_applied
            );
        } else {
            warn!(
                "Cycle {} finished with {} failed series updates",
                summary.cycles,
                report.failures.len()
            );
        }
    }
}
