pub mod catalogue;
pub mod error;
pub mod labels;
pub mod registry;
pub mod state;

pub use catalogue::{
    CatalogueConfig, CounterSeed, ExperimentGroup, GaugeSeed, MetricDescriptor, SeriesCatalogue,
};
pub use error::{PolicyError, Result};
pub use labels::{LabelSet, MetricKind};
pub use registry::{DynRegistry, MetricsRegistry, PrometheusRegistry, SeriesSample};
pub use state::{InitializationFlag, MetricsState, SeriesFailure, UpdateReport};
