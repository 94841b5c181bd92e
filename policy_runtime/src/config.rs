use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 9091;
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExporterConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(with = "humantime_serde", default = "default_refresh_period")]
    pub refresh_period: Duration,
    /// Catalogue file to load instead of the builtin table.
    #[serde(default)]
    pub catalogue: Option<PathBuf>,
    #[serde(default = "default_process_metrics")]
    pub process_metrics: bool,
}

/// TOML files nest the settings under an `[exporter]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfigFile {
    pub exporter: ExporterConfig,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            refresh_period: default_refresh_period(),
            catalogue: None,
            process_metrics: default_process_metrics(),
        }
    }
}

impl ExporterConfig {
    pub fn builder() -> ExporterConfigBuilder {
        ExporterConfigBuilder::default()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.refresh_period.is_zero() {
            return Err("refresh_period must be > 0".to_string());
        }
        Ok(())
    }
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_refresh_period() -> Duration {
    DEFAULT_REFRESH_PERIOD
}

fn default_process_metrics() -> bool {
    true
}

/// Overlays explicit settings (CLI flags, env) on top of a base config.
#[derive(Default)]
pub struct ExporterConfigBuilder {
    base: Option<ExporterConfig>,
    bind: Option<IpAddr>,
    port: Option<u16>,
    refresh_period: Option<Duration>,
    catalogue: Option<PathBuf>,
    process_metrics: Option<bool>,
}

impl ExporterConfigBuilder {
    pub fn base(mut self, base: ExporterConfig) -> Self {
        self.base = Some(base);
        self
    }

    pub fn bind(mut self, bind: Option<IpAddr>) -> Self {
        self.bind = bind;
        self
    }

    pub fn port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn refresh_period(mut self, period: Option<Duration>) -> Self {
        self.refresh_period = period;
        self
    }

    pub fn catalogue(mut self, catalogue: Option<PathBuf>) -> Self {
        self.catalogue = catalogue;
        self
    }

    pub fn process_metrics(mut self, enabled: Option<bool>) -> Self {
        self.process_metrics = enabled;
        self
    }

    pub fn build(self) -> ExporterConfig {
        let base = self.base.unwrap_or_default();
        ExporterConfig {
            bind: self.bind.unwrap_or(base.bind),
            port: self.port.unwrap_or(base.port),
            refresh_period: self.refresh_period.unwrap_or(base.refresh_period),
            catalogue: self.catalogue.or(base.catalogue),
            process_metrics: self.process_metrics.unwrap_or(base.process_metrics),
        }
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
