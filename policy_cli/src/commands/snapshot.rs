use crate::ui;
use anyhow::Result;
use policy_client::HttpReporter;
use policy_exporter::MetricsSnapshot;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Series")]
    series: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Value")]
    value: f64,
}

pub async fn execute(url: String) -> Result<()> {
    ui::print_header("Exporter Snapshot");
    println!("Exporter: {}\n", url);

    let reporter = HttpReporter::new(url)?;
    let response = reporter.get("/metrics.json").await?;

    if !response.is_success() {
        anyhow::bail!("Exporter responded with HTTP {}", response.status);
    }

    let Some(snapshot) = response
        .body
        .and_then(|body| serde_json::from_value::<MetricsSnapshot>(body).ok())
    else {
        ui::print_info("No data available");
        return Ok(());
    };

    println!("Generated at: {}", snapshot.generated_at);
    println!("Initialized: {}", snapshot.initialized);
    println!("Refresh cycles: {}\n", snapshot.refresh_cycles);

    let rows: Vec<SeriesRow> = snapshot
        .series
        .into_iter()
        .map(|sample| SeriesRow {
            series: format!("{}{}", sample.name, sample.labels),
            kind: sample.kind.to_string(),
            value: sample.value,
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}
