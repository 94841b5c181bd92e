use crate::error::{PolicyError, Result};
use crate::labels::{LabelSet, MetricKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Name, kind and label schema of one metric family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    #[serde(default)]
    pub help: String,
    pub kind: MetricKind,
    #[serde(default)]
    pub label_keys: Vec<String>,
}

impl MetricDescriptor {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        kind: MetricKind,
        label_keys: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            label_keys: label_keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// A one-time counter increment applied during first initialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CounterSeed {
    pub metric: String,
    #[serde(default)]
    pub labels: LabelSet,
    pub delta: f64,
}

impl CounterSeed {
    pub fn new(metric: impl Into<String>, labels: LabelSet, delta: f64) -> Self {
        Self {
            metric: metric.into(),
            labels,
            delta,
        }
    }
}

/// A gauge value re-applied on every refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GaugeSeed {
    pub metric: String,
    #[serde(default)]
    pub labels: LabelSet,
    pub value: f64,
}

impl GaugeSeed {
    pub fn new(metric: impl Into<String>, labels: LabelSet, value: f64) -> Self {
        Self {
            metric: metric.into(),
            labels,
            value,
        }
    }
}

/// Counter increments that belong to one experiment, logged together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentGroup {
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub increments: Vec<CounterSeed>,
}

impl ExperimentGroup {
    pub fn builder() -> ExperimentGroupBuilder {
        ExperimentGroupBuilder::default()
    }
}

/// The fixed table of series the exporter publishes, with their seed values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeriesCatalogue {
    #[serde(default)]
    pub metrics: Vec<MetricDescriptor>,
    #[serde(default)]
    pub experiments: Vec<ExperimentGroup>,
    #[serde(default)]
    pub gauges: Vec<GaugeSeed>,
}

/// TOML files nest the catalogue under a `[catalogue]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueConfig {
    pub catalogue: SeriesCatalogue,
}

impl SeriesCatalogue {
    pub fn builder() -> CatalogueBuilder {
        CatalogueBuilder::default()
    }

    /// Counter increments in application order.
    pub fn counter_seeds(&self) -> impl Iterator<Item = &CounterSeed> {
        self.experiments.iter().flat_map(|e| e.increments.iter())
    }

    pub fn counter_seed_count(&self) -> usize {
        self.experiments.iter().map(|e| e.increments.len()).sum()
    }

    /// Value every counter series holds after one application of the seeds.
    pub fn counter_totals(&self) -> BTreeMap<(String, LabelSet), f64> {
        let mut totals = BTreeMap::new();
        for seed in self.counter_seeds() {
            *totals
                .entry((seed.metric.clone(), seed.labels.clone()))
                .or_insert(0.0) += seed.delta;
        }
        totals
    }

    /// Value every gauge series holds after a refresh. Later seeds win.
    pub fn gauge_values(&self) -> BTreeMap<(String, LabelSet), f64> {
        self.gauges
            .iter()
            .map(|g| ((g.metric.clone(), g.labels.clone()), g.value))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut kinds: HashMap<&str, &MetricDescriptor> = HashMap::new();

        for metric in &self.metrics {
            if !is_valid_metric_name(&metric.name) {
                return Err(invalid(format!("'{}' is not a valid metric name", metric.name)));
            }

            let mut seen = HashSet::new();
            for key in &metric.label_keys {
                if !is_valid_label_name(key) {
                    return Err(invalid(format!(
                        "'{}' is not a valid label name on metric '{}'",
                        key, metric.name
                    )));
                }
                if !seen.insert(key.as_str()) {
                    return Err(invalid(format!(
                        "label '{}' declared twice on metric '{}'",
                        key, metric.name
                    )));
                }
            }

            if kinds.insert(metric.name.as_str(), metric).is_some() {
                return Err(invalid(format!("metric '{}' declared twice", metric.name)));
            }
        }

        for (i, group) in self.experiments.iter().enumerate() {
            if group.name.is_empty() {
                return Err(invalid(format!("experiment {} name cannot be empty", i)));
            }

            for seed in &group.increments {
                let descriptor = check_seed_target(
                    &kinds,
                    &seed.metric,
                    &seed.labels,
                    MetricKind::Counter,
                )?;
                if !seed.delta.is_finite() || seed.delta < 0.0 {
                    return Err(invalid(format!(
                        "counter seed {}{} in experiment '{}' has delta {}, must be finite and >= 0",
                        descriptor.name, seed.labels, group.name, seed.delta
                    )));
                }
            }
        }

        for seed in &self.gauges {
            check_seed_target(&kinds, &seed.metric, &seed.labels, MetricKind::Gauge)?;
            if !seed.value.is_finite() {
                return Err(invalid(format!(
                    "gauge seed {}{} has non-finite value",
                    seed.metric, seed.labels
                )));
            }
        }

        Ok(())
    }

    /// The policy compliance catalogue: four experiments worth of violation
    /// counters, blocked deployments and vulnerability scan gauges.
    pub fn builtin() -> Self {
        let violation = |policy: &str, severity: &str, delta: f64| {
            CounterSeed::new(
                "policy_violations_total",
                LabelSet::new().with("policy", policy).with("severity", severity),
                delta,
            )
        };
        let blocked = |reason: &str, delta: f64| {
            CounterSeed::new(
                "deployment_blocked_total",
                LabelSet::new().with("reason", reason),
                delta,
            )
        };

        Self::builder()
            .counter(
                "policy_violations_total",
                "Total policy violations",
                &["policy", "severity"],
            )
            .gauge(
                "policy_validation_duration_seconds",
                "Policy validation duration",
                &["policy"],
            )
            .gauge("vulnerability_count", "Number of vulnerabilities", &["severity"])
            .counter(
                "deployment_blocked_total",
                "Deployments blocked by policy",
                &["reason"],
            )
            .gauge(
                "vulnerability_scan_status",
                "Vulnerability scan status",
                &["image"],
            )
            .experiment(
                ExperimentGroup::builder()
                    .name("security-root-user")
                    .summary("Generated Experiment 1 violations: Root user and privileged containers")
                    .increment(violation("require-non-root", "high", 5.0))
                    .increment(violation("no-privileged-containers", "critical", 2.0))
                    .increment(violation("read-only-filesystem", "medium", 3.0))
                    .build(),
            )
            .experiment(
                ExperimentGroup::builder()
                    .name("missing-resource-limits")
                    .summary("Generated Experiment 2 violations: Missing resource limits and health checks")
                    .increment(violation("require-resource-limits", "medium", 4.0))
                    .increment(violation("require-health-checks", "medium", 3.0))
                    .increment(violation("require-readiness-probe", "low", 2.0))
                    .build(),
            )
            .experiment(
                ExperimentGroup::builder()
                    .name("vulnerable-dependencies")
                    .summary("Generated Experiment 3 violations: 3 CRITICAL, 12 HIGH CVEs detected")
                    .increment(violation("no-critical-vulnerabilities", "critical", 15.0))
                    .build(),
            )
            .experiment(
                ExperimentGroup::builder()
                    .name("terraform-security")
                    .summary("Generated Experiment 4 violations: Unencrypted resources and public access")
                    .increment(violation("require-encryption", "high", 2.0))
                    .increment(violation("no-public-access", "high", 3.0))
                    .increment(violation("require-backup-retention", "medium", 1.0))
                    .increment(violation("require-security-groups", "high", 1.0))
                    .build(),
            )
            .experiment(
                ExperimentGroup::builder()
                    .name("deployments-blocked")
                    .increment(blocked("security-violation", 2.0))
                    .increment(blocked("critical-vulnerabilities", 1.0))
                    .increment(blocked("terraform-violation", 1.0))
                    .increment(blocked("missing-encryption", 1.0))
                    .build(),
            )
            .gauge_seed("vulnerability_count", LabelSet::new().with("severity", "critical"), 3.0)
            .gauge_seed("vulnerability_count", LabelSet::new().with("severity", "high"), 12.0)
            .gauge_seed("vulnerability_count", LabelSet::new().with("severity", "medium"), 8.0)
            .gauge_seed("vulnerability_count", LabelSet::new().with("severity", "low"), 15.0)
            .gauge_seed(
                "policy_validation_duration_seconds",
                LabelSet::new().with("policy", "kubernetes-security"),
                0.045,
            )
            .gauge_seed(
                "policy_validation_duration_seconds",
                LabelSet::new().with("policy", "terraform-security"),
                0.023,
            )
            .gauge_seed(
                "policy_validation_duration_seconds",
                LabelSet::new().with("policy", "vulnerability-scan"),
                120.5,
            )
            .gauge_seed(
                "policy_validation_duration_seconds",
                LabelSet::new().with("policy", "bestpractices"),
                0.035,
            )
            // 0 = scan failed, 1 = scan passed
            .gauge_seed(
                "vulnerability_scan_status",
                LabelSet::new().with("image", "api-service-vulnerable"),
                0.0,
            )
            .gauge_seed(
                "vulnerability_scan_status",
                LabelSet::new().with("image", "api-service-secure"),
                1.0,
            )
            .gauge_seed(
                "vulnerability_scan_status",
                LabelSet::new().with("image", "worker-service"),
                1.0,
            )
            .build()
    }
}

fn invalid(message: String) -> PolicyError {
    PolicyError::InvalidCatalogue(message)
}

fn check_seed_target<'a>(
    kinds: &HashMap<&str, &'a MetricDescriptor>,
    metric: &str,
    labels: &LabelSet,
    expected: MetricKind,
) -> Result<&'a MetricDescriptor> {
    let descriptor = kinds
        .get(metric)
        .copied()
        .ok_or_else(|| invalid(format!("seed references undeclared metric '{}'", metric)))?;

    if descriptor.kind != expected {
        return Err(invalid(format!(
            "{} seed targets '{}', which is a {}",
            expected, metric, descriptor.kind
        )));
    }

    if !labels.has_keys(&descriptor.label_keys) {
        return Err(invalid(format!(
            "seed {}{} does not match label keys [{}]",
            metric,
            labels,
            descriptor.label_keys.join(", ")
        )));
    }

    Ok(descriptor)
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, with the `__` prefix reserved.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Default)]
pub struct CatalogueBuilder {
    metrics: Vec<MetricDescriptor>,
    experiments: Vec<ExperimentGroup>,
    gauges: Vec<GaugeSeed>,
}

impl CatalogueBuilder {
    pub fn metric(mut self, descriptor: MetricDescriptor) -> Self {
        self.metrics.push(descriptor);
        self
    }

    pub fn counter(self, name: &str, help: &str, label_keys: &[&str]) -> Self {
        self.metric(MetricDescriptor::new(name, help, MetricKind::Counter, label_keys))
    }

    pub fn gauge(self, name: &str, help: &str, label_keys: &[&str]) -> Self {
        self.metric(MetricDescriptor::new(name, help, MetricKind::Gauge, label_keys))
    }

    pub fn experiment(mut self, group: ExperimentGroup) -> Self {
        self.experiments.push(group);
        self
    }

    pub fn gauge_seed(mut self, metric: &str, labels: LabelSet, value: f64) -> Self {
        self.gauges.push(GaugeSeed::new(metric, labels, value));
        self
    }

    pub fn build(self) -> SeriesCatalogue {
        SeriesCatalogue {
            metrics: self.metrics,
            experiments: self.experiments,
            gauges: self.gauges,
        }
    }
}

#[derive(Default)]
pub struct ExperimentGroupBuilder {
    name: Option<String>,
    summary: Option<String>,
    increments: Vec<CounterSeed>,
}

impl ExperimentGroupBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn increment(mut self, seed: CounterSeed) -> Self {
        self.increments.push(seed);
        self
    }

    pub fn build(self) -> ExperimentGroup {
        ExperimentGroup {
            name: self.name.unwrap_or_else(|| "unnamed".to_string()),
            summary: self.summary,
            increments: self.increments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid() {
        let catalogue = SeriesCatalogue::builtin();
        assert!(catalogue.validate().is_ok());
        assert_eq!(catalogue.metrics.len(), 5);
        assert_eq!(catalogue.experiments.len(), 5);
        assert_eq!(catalogue.counter_seed_count(), 15);
        assert_eq!(catalogue.gauges.len(), 11);
    }

    #[test]
    fn test_builtin_logs_one_line_per_experiment() {
        let catalogue = SeriesCatalogue::builtin();
        let summaries: Vec<_> = catalogue
            .experiments
            .iter()
            .filter_map(|e| e.summary.as_deref())
            .collect();

        assert_eq!(summaries.len(), 4);
        assert!(summaries.iter().all(|s| s.starts_with("Generated Experiment")));
        assert!(catalogue
            .experiments
            .iter()
            .any(|e| e.name == "deployments-blocked" && e.summary.is_none()));
    }

    #[test]
    fn test_builtin_totals() {
        let catalogue = SeriesCatalogue::builtin();
        let totals = catalogue.counter_totals();

        let key = (
            "policy_violations_total".to_string(),
            LabelSet::new().with("policy", "require-non-root").with("severity", "high"),
        );
        assert_eq!(totals.get(&key), Some(&5.0));

        let blocked: f64 = totals
            .iter()
            .filter(|((name, _), _)| name == "deployment_blocked_total")
            .map(|(_, v)| *v)
            .sum();
        assert_eq!(blocked, 5.0);

        let gauges = catalogue.gauge_values();
        let critical = (
            "vulnerability_count".to_string(),
            LabelSet::new().with("severity", "critical"),
        );
        assert_eq!(gauges.get(&critical), Some(&3.0));
    }

    #[test]
    fn test_validation_rejects_undeclared_metric() {
        let catalogue = SeriesCatalogue::builder()
            .gauge_seed("missing", LabelSet::new(), 1.0)
            .build();
        assert!(matches!(
            catalogue.validate(),
            Err(PolicyError::InvalidCatalogue(_))
        ));
    }

    #[test]
    fn test_validation_rejects_kind_mismatch() {
        let catalogue = SeriesCatalogue::builder()
            .counter("requests_total", "", &[])
            .gauge_seed("requests_total", LabelSet::new(), 1.0)
            .build();
        assert!(catalogue.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_label_mismatch() {
        let catalogue = SeriesCatalogue::builder()
            .gauge("vulnerability_count", "", &["severity"])
            .gauge_seed("vulnerability_count", LabelSet::new().with("sev", "low"), 1.0)
            .build();
        assert!(catalogue.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_negative_delta() {
        let catalogue = SeriesCatalogue::builder()
            .counter("deployment_blocked_total", "", &["reason"])
            .experiment(
                ExperimentGroup::builder()
                    .name("bad")
                    .increment(CounterSeed::new(
                        "deployment_blocked_total",
                        LabelSet::new().with("reason", "x"),
                        -1.0,
                    ))
                    .build(),
            )
            .build();
        assert!(catalogue.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_duplicates() {
        let catalogue = SeriesCatalogue::builder()
            .gauge("vulnerability_count", "", &[])
            .counter("vulnerability_count", "", &[])
            .build();
        assert!(catalogue.validate().is_err());

        let catalogue = SeriesCatalogue::builder()
            .gauge("vulnerability_count", "", &["severity", "severity"])
            .build();
        assert!(catalogue.validate().is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(is_valid_metric_name("policy_violations_total"));
        assert!(is_valid_metric_name("ns:rate_5m"));
        assert!(!is_valid_metric_name("9lives"));
        assert!(!is_valid_metric_name("policy-violations"));
        assert!(!is_valid_metric_name(""));

        assert!(is_valid_label_name("severity"));
        assert!(!is_valid_label_name("__name__"));
        assert!(!is_valid_label_name("has:colon"));
    }
}
