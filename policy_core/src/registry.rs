use crate::catalogue::MetricDescriptor;
use crate::error::{PolicyError, Result};
use crate::labels::{LabelSet, MetricKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One observed value, as read back from a registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesSample {
    pub name: String,
    pub kind: MetricKind,
    pub labels: LabelSet,
    pub value: f64,
}

/// Storage behind the exporter. Implementations must tolerate scrapes
/// running concurrently with updates.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsRegistry: Send + Sync {
    /// Declare a metric family. Fails on a duplicate name.
    fn register(&self, descriptor: &MetricDescriptor) -> Result<()>;

    /// Add a non-negative delta to a counter series.
    fn increment_counter(&self, name: &str, labels: &LabelSet, delta: f64) -> Result<()>;

    /// Overwrite a gauge series.
    fn set_gauge(&self, name: &str, labels: &LabelSet, value: f64) -> Result<()>;

    /// Every series that currently holds a value.
    fn snapshot(&self) -> Result<Vec<SeriesSample>>;

    /// Text exposition format, version 0.0.4.
    fn encode_text(&self) -> Result<String>;

    fn value(&self, name: &str, labels: &LabelSet) -> Option<f64> {
        self.snapshot()
            .ok()?
            .into_iter()
            .find(|sample| sample.name == name && &sample.labels == labels)
            .map(|sample| sample.value)
    }
}

pub type DynRegistry = Arc<dyn MetricsRegistry>;

enum Family {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

struct RegisteredMetric {
    descriptor: MetricDescriptor,
    family: Family,
}

/// Registry backed by the `prometheus` crate. Each instance owns a private
/// `prometheus::Registry`, so tests never share state through the global one.
pub struct PrometheusRegistry {
    registry: Registry,
    families: DashMap<String, RegisteredMetric>,
}

impl PrometheusRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            families: DashMap::new(),
        }
    }

    /// Also export `process_*` series (CPU, memory, open fds) for this process.
    /// Only Linux provides them; elsewhere this is a no-op.
    pub fn with_process_metrics(self) -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let collector = prometheus::process_collector::ProcessCollector::for_self();
            self.registry.register(Box::new(collector))?;
        }
        Ok(self)
    }

    fn check_labels(descriptor: &MetricDescriptor, labels: &LabelSet) -> Result<()> {
        if labels.has_keys(&descriptor.label_keys) {
            return Ok(());
        }
        Err(PolicyError::InvalidLabels {
            metric: descriptor.name.clone(),
            reason: format!(
                "got keys [{}], expected [{}]",
                labels.keys().collect::<Vec<_>>().join(", "),
                descriptor.label_keys.join(", ")
            ),
        })
    }

    fn kind_mismatch(descriptor: &MetricDescriptor, expected: MetricKind) -> PolicyError {
        PolicyError::KindMismatch {
            name: descriptor.name.clone(),
            expected,
            actual: descriptor.kind,
        }
    }
}

impl Default for PrometheusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry for PrometheusRegistry {
    fn register(&self, descriptor: &MetricDescriptor) -> Result<()> {
        match self.families.entry(descriptor.name.clone()) {
            Entry::Occupied(_) => Err(PolicyError::DuplicateMetric(descriptor.name.clone())),
            Entry::Vacant(slot) => {
                // prometheus refuses an empty help string
                let help = if descriptor.help.is_empty() {
                    descriptor.name.as_str()
                } else {
                    descriptor.help.as_str()
                };
                let opts = Opts::new(descriptor.name.as_str(), help);
                let keys: Vec<&str> = descriptor.label_keys.iter().map(String::as_str).collect();

                let family = match descriptor.kind {
                    MetricKind::Counter => {
                        let vec = CounterVec::new(opts, &keys)?;
                        self.registry.register(Box::new(vec.clone()))?;
                        Family::Counter(vec)
                    }
                    MetricKind::Gauge => {
                        let vec = GaugeVec::new(opts, &keys)?;
                        self.registry.register(Box::new(vec.clone()))?;
                        Family::Gauge(vec)
                    }
                };

                slot.insert(RegisteredMetric {
                    descriptor: descriptor.clone(),
                    family,
                });
                Ok(())
            }
        }
    }

    fn increment_counter(&self, name: &str, labels: &LabelSet, delta: f64) -> Result<()> {
        let metric = self
            .families
            .get(name)
            .ok_or_else(|| PolicyError::UnknownMetric(name.to_string()))?;

        let Family::Counter(vec) = &metric.family else {
            return Err(Self::kind_mismatch(&metric.descriptor, MetricKind::Counter));
        };

        if !delta.is_finite() || delta < 0.0 {
            return Err(PolicyError::InvalidDelta {
                metric: name.to_string(),
                delta,
            });
        }

        Self::check_labels(&metric.descriptor, labels)?;
        vec.get_metric_with(&labels.as_lookup())?.inc_by(delta);
        Ok(())
    }

    fn set_gauge(&self, name: &str, labels: &LabelSet, value: f64) -> Result<()> {
        let metric = self
            .families
            .get(name)
            .ok_or_else(|| PolicyError::UnknownMetric(name.to_string()))?;

        let Family::Gauge(vec) = &metric.family else {
            return Err(Self::kind_mismatch(&metric.descriptor, MetricKind::Gauge));
        };

        Self::check_labels(&metric.descriptor, labels)?;
        vec.get_metric_with(&labels.as_lookup())?.set(value);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<SeriesSample>> {
        Ok(samples_from_families(&self.registry.gather()))
    }

    fn encode_text(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| PolicyError::EncodingError(e.to_string()))
    }
}

fn samples_from_families(families: &[MetricFamily]) -> Vec<SeriesSample> {
    let mut samples = Vec::new();

    for family in families {
        let kind = match family.get_field_type() {
            MetricType::COUNTER => MetricKind::Counter,
            MetricType::GAUGE => MetricKind::Gauge,
            _ => continue,
        };

        for metric in family.get_metric() {
            let labels = metric
                .get_label()
                .iter()
                .map(|pair| (pair.get_name(), pair.get_value()))
                .collect::<LabelSet>();
            let value = match kind {
                MetricKind::Counter => metric.get_counter().get_value(),
                MetricKind::Gauge => metric.get_gauge().get_value(),
            };

            samples.push(SeriesSample {
                name: family.get_name().to_string(),
                kind,
                labels,
                value,
            });
        }
    }

    samples
}
