pub mod json;
pub mod prometheus;

pub use json::{JsonExporter, MetricsSnapshot};
pub use self::prometheus::PrometheusExporter;
