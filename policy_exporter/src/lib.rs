pub mod exporters;
pub mod server;

pub use exporters::{JsonExporter, MetricsSnapshot, PrometheusExporter};
pub use server::{router, serve, serve_with_listener, HealthResponse};
