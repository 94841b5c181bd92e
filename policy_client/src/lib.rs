pub mod error;
pub mod prometheus;
pub mod reporter;

pub use error::{ClientError, Result};
pub use prometheus::{parse_query_response, PrometheusClient, QuerySample, DEFAULT_PROMETHEUS_URL};
pub use reporter::{ApiResponse, HttpReporter, DEFAULT_TIMEOUT};
