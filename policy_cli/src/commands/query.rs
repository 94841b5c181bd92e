use crate::ui;
use anyhow::Result;
use policy_client::PrometheusClient;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Labels")]
    labels: String,
    #[tabled(rename = "Value")]
    value: f64,
}

pub async fn execute(expr: String, prometheus_url: String) -> Result<()> {
    ui::print_header("Prometheus Query");
    println!("Server: {}", prometheus_url);
    println!("Query: {}\n", expr);

    let client = PrometheusClient::new(prometheus_url)?;
    let samples = match client.query(&expr).await {
        Ok(samples) => samples,
        Err(e) => {
            ui::print_error(&format!("Query failed: {}", e));
            return Err(e.into());
        }
    };

    if samples.is_empty() {
        ui::print_info(&format!("No data for {} yet", expr));
        return Ok(());
    }

    ui::print_success(&format!("Found {} time series", samples.len()));

    let rows: Vec<SampleRow> = samples
        .into_iter()
        .map(|sample| SampleRow {
            labels: sample
                .labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect::<Vec<_>>()
                .join(", "),
            value: sample.value,
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}
