pub mod clock;
pub mod config;
pub mod parser;
pub mod refresh;

pub use clock::{Clock, TokioClock};
pub use config::{ExporterConfig, DEFAULT_PORT, DEFAULT_REFRESH_PERIOD};
pub use parser::{
    parse_catalogue_from_file, parse_catalogue_from_str, parse_config_from_file,
    parse_config_from_str,
};
pub use refresh::{RefreshLoop, RefreshSummary};
