use crate::catalogue::SeriesCatalogue;
use crate::labels::{LabelSet, MetricKind};
use crate::registry::DynRegistry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Guards the one-time counter seeding. Starts unset and can only ever be
/// set; there is no reset short of restarting the process.
#[derive(Debug, Default)]
pub struct InitializationFlag(AtomicBool);

impl InitializationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns true only for the call that performed the transition.
    pub fn set(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesFailure {
    pub metric: String,
    pub kind: MetricKind,
    pub labels: LabelSet,
    pub error: String,
}

/// Outcome of one `initialize_and_update` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateReport {
    /// Whether this call performed the one-time counter seeding.
    pub seeded: bool,
    pub counters_applied: usize,
    pub gauges_applied: usize,
    pub failures: Vec<SeriesFailure>,
}

impl UpdateReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the synthetic series and applies them to an injected registry:
/// counters once per process lifetime, gauges on every call.
pub struct MetricsState {
    catalogue: SeriesCatalogue,
    registry: DynRegistry,
    initialized: InitializationFlag,
    update_lock: Mutex<()>,
    cycles: AtomicU64,
}

impl MetricsState {
    /// Registers every catalogue metric. A metric the registry refuses is
    /// logged and its later updates fail individually.
    pub fn new(catalogue: SeriesCatalogue, registry: DynRegistry) -> Self {
        for descriptor in &catalogue.metrics {
            match registry.register(descriptor) {
                Ok(()) => debug!("Registered {} '{}'", descriptor.kind, descriptor.name),
                Err(e) => warn!("Failed to register metric '{}': {}", descriptor.name, e),
            }
        }

        Self {
            catalogue,
            registry,
            initialized: InitializationFlag::new(),
            update_lock: Mutex::new(()),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn with_builtin(registry: DynRegistry) -> Self {
        Self::new(SeriesCatalogue::builtin(), registry)
    }

    pub fn catalogue(&self) -> &SeriesCatalogue {
        &self.catalogue
    }

    pub fn registry(&self) -> &DynRegistry {
        &self.registry
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.is_set()
    }

    /// Number of completed `initialize_and_update` calls.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Seeds counters on the first call, then (re)applies every gauge.
    ///
    /// Calls are serialized, so concurrent triggers still seed exactly once.
    /// Individual series failures are logged and reported; they never abort
    /// the rest of the batch.
    pub async fn initialize_and_update(&self) -> UpdateReport {
        let _guard = self.update_lock.lock().await;
        let mut report = UpdateReport::default();

        if !self.initialized.is_set() {
            self.seed_counters(&mut report);
            report.seeded = self.initialized.set();
            debug!(
                "Seeded {} counter increments across {} experiment groups",
                report.counters_applied,
                self.catalogue.experiments.len()
            );
        }

        for seed in &self.catalogue.gauges {
            match self.registry.set_gauge(&seed.metric, &seed.labels, seed.value) {
                Ok(()) => report.gauges_applied += 1,
                Err(e) => {
                    warn!("Failed to set {}{}: {}", seed.metric, seed.labels, e);
                    report.failures.push(SeriesFailure {
                        metric: seed.metric.clone(),
                        kind: MetricKind::Gauge,
                        labels: seed.labels.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.cycles.fetch_add(1, Ordering::Relaxed);
        info!(
            "Metrics updated: {} gauges set, {} failed series",
            report.gauges_applied,
            report.failures.len()
        );
        report
    }

    fn seed_counters(&self, report: &mut UpdateReport) {
        for group in &self.catalogue.experiments {
            for seed in &group.increments {
                match self
                    .registry
                    .increment_counter(&seed.metric, &seed.labels, seed.delta)
                {
                    Ok(()) => report.counters_applied += 1,
                    Err(e) => {
                        warn!(
                            "Failed to increment {}{} in '{}': {}",
                            seed.metric, seed.labels, group.name, e
                        );
                        report.failures.push(SeriesFailure {
                            metric: seed.metric.clone(),
                            kind: MetricKind::Counter,
                            labels: seed.labels.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            match &group.summary {
                Some(summary) => info!("{}", summary),
                None => debug!("Seeded '{}'", group.name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CounterSeed, ExperimentGroup};
    use crate::error::PolicyError;
    use crate::registry::{MetricsRegistry, MockMetricsRegistry, PrometheusRegistry};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn builtin_state() -> (Arc<PrometheusRegistry>, MetricsState) {
        let registry = Arc::new(PrometheusRegistry::new());
        let state = MetricsState::with_builtin(registry.clone());
        (registry, state)
    }

    fn root_high() -> LabelSet {
        LabelSet::new().with("policy", "require-non-root").with("severity", "high")
    }

    #[test]
    fn test_flag_transitions_once() {
        let flag = InitializationFlag::new();
        assert!(!flag.is_set());
        assert!(flag.set());
        assert!(flag.is_set());
        assert!(!flag.set());
        assert!(flag.is_set());
    }

    #[tokio::test]
    async fn test_first_call_seeds() {
        let (registry, state) = builtin_state();
        assert!(!state.is_initialized());

        let report = state.initialize_and_update().await;

        assert!(report.seeded);
        assert!(report.is_clean());
        assert_eq!(report.counters_applied, 15);
        assert_eq!(report.gauges_applied, 11);
        assert!(state.is_initialized());
        assert_eq!(registry.value("policy_violations_total", &root_high()), Some(5.0));
    }

    #[tokio::test]
    async fn test_second_call_does_not_reseed() {
        let (registry, state) = builtin_state();

        state.initialize_and_update().await;
        let report = state.initialize_and_update().await;

        assert!(!report.seeded);
        assert_eq!(report.counters_applied, 0);
        assert_eq!(report.gauges_applied, 11);
        assert_eq!(registry.value("policy_violations_total", &root_high()), Some(5.0));
        assert_eq!(state.cycles(), 2);
    }

    #[tokio::test]
    async fn test_gauge_restored_on_next_call() {
        let (registry, state) = builtin_state();
        let critical = LabelSet::new().with("severity", "critical");

        state.initialize_and_update().await;
        assert_eq!(registry.value("vulnerability_count", &critical), Some(3.0));

        registry.set_gauge("vulnerability_count", &critical, 99.0).unwrap();
        state.initialize_and_update().await;

        assert_eq!(registry.value("vulnerability_count", &critical), Some(3.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_triggers_seed_once() {
        let (registry, state) = builtin_state();
        let state = Arc::new(state);

        let triggers = (0..8).map(|_| {
            let state = state.clone();
            tokio::spawn(async move { state.initialize_and_update().await })
        });
        let reports = futures::future::join_all(triggers).await;

        let seeded = reports
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|r| r.seeded)
            .count();
        assert_eq!(seeded, 1);

        for ((name, labels), total) in state.catalogue().counter_totals() {
            assert_eq!(registry.value(&name, &labels), Some(total));
        }
    }

    #[tokio::test]
    async fn test_rejected_series_does_not_block_batch() {
        let mut registry = MockMetricsRegistry::new();
        registry.expect_register().returning(|_| Ok(()));
        registry.expect_set_gauge().returning(|_, _, _| Ok(()));
        registry
            .expect_increment_counter()
            .times(10)
            .returning(|_, labels, _| {
                if labels.get("policy") == Some("require-encryption") {
                    Err(PolicyError::InvalidLabels {
                        metric: "policy_violations_total".to_string(),
                        reason: "rejected".to_string(),
                    })
                } else {
                    Ok(())
                }
            });

        let mut builder = ExperimentGroup::builder().name("batch");
        for policy in [
            "require-non-root",
            "no-privileged-containers",
            "read-only-filesystem",
            "require-resource-limits",
            "require-health-checks",
            "require-encryption",
            "require-readiness-probe",
            "no-critical-vulnerabilities",
            "no-public-access",
            "require-security-groups",
        ] {
            builder = builder.increment(CounterSeed::new(
                "policy_violations_total",
                LabelSet::new().with("policy", policy).with("severity", "high"),
                1.0,
            ));
        }
        let catalogue = SeriesCatalogue::builder()
            .counter("policy_violations_total", "Total policy violations", &["policy", "severity"])
            .experiment(builder.build())
            .build();

        let state = MetricsState::new(catalogue, Arc::new(registry));
        let report = state.initialize_and_update().await;

        assert_eq!(report.counters_applied, 9);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].labels.get("policy"), Some("require-encryption"));
        assert!(state.is_initialized());
    }

    #[tokio::test]
    async fn test_malformed_gauge_is_skipped() {
        let catalogue = SeriesCatalogue::builder()
            .gauge("vulnerability_count", "Number of vulnerabilities", &["severity"])
            .gauge_seed("vulnerability_count", LabelSet::new().with("severity", "critical"), 3.0)
            .gauge_seed("vulnerability_count", LabelSet::new().with("sev", "high"), 12.0)
            .gauge_seed("vulnerability_count", LabelSet::new().with("severity", "low"), 15.0)
            .build();
        let registry = Arc::new(PrometheusRegistry::new());
        let state = MetricsState::new(catalogue, registry.clone());

        let report = state.initialize_and_update().await;

        assert_eq!(report.gauges_applied, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            registry.value("vulnerability_count", &LabelSet::new().with("severity", "low")),
            Some(15.0)
        );
    }

    proptest! {
        #[test]
        fn prop_values_stable_across_calls(calls in 1usize..12) {
            let (registry, state) = builtin_state();

            tokio_test::block_on(async {
                for _ in 0..calls {
                    state.initialize_and_update().await;
                }
            });

            for ((name, labels), total) in state.catalogue().counter_totals() {
                prop_assert_eq!(registry.value(&name, &labels), Some(total));
            }
            for ((name, labels), value) in state.catalogue().gauge_values() {
                prop_assert_eq!(registry.value(&name, &labels), Some(value));
            }
            prop_assert_eq!(state.cycles(), calls as u64);
        }
    }
}
