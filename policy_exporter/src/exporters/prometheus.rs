use policy_core::{MetricsState, Result};

pub struct PrometheusExporter;

impl PrometheusExporter {
    /// `Content-Type` of the text exposition format.
    pub const CONTENT_TYPE: &'static str = ::prometheus::TEXT_FORMAT;

    pub fn format(state: &MetricsState) -> Result<String> {
        state.registry().encode_text()
    }
}
