use crate::error::{ClientError, Result};
use crate::reporter::HttpReporter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";

/// One element of an instant-vector query result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl QuerySample {
    pub fn metric_name(&self) -> Option<&str> {
        self.labels.get("__name__").map(String::as_str)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Client for the Prometheus HTTP query API.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    reporter: HttpReporter,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            reporter: HttpReporter::new(base_url)?,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_PROMETHEUS_URL)
    }

    /// Evaluates `expr` as an instant query. An unreadable payload yields no
    /// samples rather than an error.
    pub async fn query(&self, expr: &str) -> Result<Vec<QuerySample>> {
        let response = self
            .reporter
            .get_with_query("/api/v1/query", &[("query", expr)])
            .await?;

        if !response.is_success() {
            return Err(ClientError::Status {
                url: self.reporter.url("/api/v1/query"),
                status: response.status,
            });
        }

        Ok(response
            .body
            .map(|body| parse_query_response(&body))
            .unwrap_or_default())
    }
}

/// Extracts the samples of a `{"status":"success","data":{"resultType":"vector",...}}`
/// payload. Anything else is treated as "no data".
pub fn parse_query_response(body: &Value) -> Vec<QuerySample> {
    if body.get("status").and_then(Value::as_str) != Some("success") {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        warn!("Query did not succeed: {}", reason);
        return Vec::new();
    }

    let data = body.get("data");
    let result_type = data.and_then(|d| d.get("resultType")).and_then(Value::as_str);
    if result_type != Some("vector") {
        warn!("Unsupported query result type: {:?}", result_type);
        return Vec::new();
    }

    let Some(results) = data.and_then(|d| d.get("result")).and_then(Value::as_array) else {
        return Vec::new();
    };

    results.iter().filter_map(parse_sample).collect()
}

fn parse_sample(entry: &Value) -> Option<QuerySample> {
    let labels = entry
        .get("metric")
        .and_then(Value::as_object)
        .map(|metric| {
            metric
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    // "value": [<unix time>, "<sample as string>"]
    let raw = entry.get("value")?.get(1)?.as_str()?;
    match raw.parse::<f64>() {
        Ok(value) => Some(QuerySample { labels, value }),
        Err(_) => {
            warn!("Skipping sample with unparsable value '{}'", raw);
            None
        }
    }
}
