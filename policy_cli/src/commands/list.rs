use crate::ui;
use anyhow::Result;
use colored::Colorize;
use policy_core::SeriesCatalogue;
use policy_runtime::parse_catalogue_from_file;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Metric")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Labels")]
    labels: String,
    #[tabled(rename = "Seeds")]
    seeds: usize,
}

pub async fn execute(catalogue: Option<PathBuf>) -> Result<()> {
    let catalogue = match catalogue {
        Some(path) => parse_catalogue_from_file(path).await?,
        None => SeriesCatalogue::builtin(),
    };

    ui::print_header("Published Series");

    let rows: Vec<SeriesRow> = catalogue
        .metrics
        .iter()
        .map(|metric| SeriesRow {
            name: metric.name.clone(),
            kind: metric.kind.to_string(),
            labels: metric.label_keys.join(", "),
            seeds: catalogue
                .counter_seeds()
                .filter(|s| s.metric == metric.name)
                .count()
                + catalogue.gauges.iter().filter(|g| g.metric == metric.name).count(),
        })
        .collect();

    println!("\nTotal metrics: {}\n", rows.len());
    println!("{}", Table::new(rows).with(Style::rounded()));

    println!(
        "\n{}",
        "Use 'policy-exporter serve' to publish these series".yellow()
    );

    Ok(())
}
