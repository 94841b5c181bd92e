use chrono::{DateTime, Utc};
use policy_core::{MetricsState, Result, SeriesSample};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub initialized: bool,
    pub refresh_cycles: u64,
    pub series: Vec<SeriesSample>,
}

pub struct JsonExporter;

impl JsonExporter {
    pub fn snapshot(state: &MetricsState) -> Result<MetricsSnapshot> {
        Ok(MetricsSnapshot {
            generated_at: Utc::now(),
            initialized: state.is_initialized(),
            refresh_cycles: state.cycles(),
            series: state.registry().snapshot()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_core::{LabelSet, MetricKind, PrometheusRegistry};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_snapshot() {
        let state = MetricsState::with_builtin(Arc::new(PrometheusRegistry::new()));

        let empty = JsonExporter::snapshot(&state).unwrap();
        assert!(!empty.initialized);
        assert!(empty.series.is_empty());

        state.initialize_and_update().await;
        let snapshot = JsonExporter::snapshot(&state).unwrap();

        assert!(snapshot.initialized);
        assert_eq!(snapshot.refresh_cycles, 1);
        assert_eq!(snapshot.series.len(), 15 + 11);
        assert!(snapshot.series.iter().any(|s| s.kind == MetricKind::Gauge
            && s.name == "vulnerability_scan_status"
            && s.labels == LabelSet::new().with("image", "api-service-vulnerable")
            && s.value == 0.0));
    }
}
