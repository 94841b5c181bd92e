use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Metric already registered: {0}")]
    DuplicateMetric(String),

    #[error("Metric '{name}' is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: crate::labels::MetricKind,
        actual: crate::labels::MetricKind,
    },

    #[error("Invalid labels for '{metric}': {reason}")]
    InvalidLabels { metric: String, reason: String },

    #[error("Invalid counter delta {delta} for '{metric}': must be finite and >= 0")]
    InvalidDelta { metric: String, delta: f64 },

    #[error("Invalid catalogue: {0}")]
    InvalidCatalogue(String),

    #[error("Registry error: {0}")]
    RegistryError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
