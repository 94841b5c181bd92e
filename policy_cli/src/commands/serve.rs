use anyhow::Result;
use policy_core::{MetricsState, PrometheusRegistry, SeriesCatalogue};
use policy_runtime::{parse_catalogue_from_file, parse_config_from_file, ExporterConfig, RefreshLoop};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct ServeOptions {
    pub config: Option<PathBuf>,
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub period: Option<Duration>,
    pub catalogue: Option<PathBuf>,
    pub no_process_metrics: bool,
}

pub async fn execute(options: ServeOptions) -> Result<()> {
    let base = match &options.config {
        Some(path) => {
            info!("Loading config: {}", path.display());
            parse_config_from_file(path).await?
        }
        None => ExporterConfig::default(),
    };

    let config = ExporterConfig::builder()
        .base(base)
        .bind(options.bind)
        .port(options.port)
        .refresh_period(options.period)
        .catalogue(options.catalogue)
        .process_metrics(options.no_process_metrics.then_some(false))
        .build();
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let catalogue = match &config.catalogue {
        Some(path) => {
            info!("Loading catalogue: {}", path.display());
            parse_catalogue_from_file(path).await?
        }
        None => SeriesCatalogue::builtin(),
    };

    let mut registry = PrometheusRegistry::new();
    if config.process_metrics {
        registry = registry.with_process_metrics()?;
    }

    let state = Arc::new(MetricsState::new(catalogue, Arc::new(registry)));
    let token = CancellationToken::new();

    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    let server = {
        let state = state.clone();
        let token = token.clone();
        let addr = config.socket_addr();
        tokio::spawn(async move {
            let result = policy_exporter::serve(addr, state, token.clone()).await;
            if let Err(e) = &result {
                error!("Metrics endpoint failed: {}", e);
                token.cancel();
            }
            result
        })
    };

    info!(
        "Refreshing metrics every {}",
        humantime::format_duration(config.refresh_period)
    );
    let summary = RefreshLoop::new(state, config.refresh_period)
        .run(token)
        .await;

    server.await??;

    info!(
        "Exporter finished: {} refresh cycles, {} failed series updates",
        summary.cycles, summary.failures
    );
    Ok(())
}
