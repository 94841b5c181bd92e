use crate::ui;
use anyhow::Result;
use policy_runtime::parse_catalogue_from_file;
use std::path::PathBuf;

pub async fn execute(catalogue_file: PathBuf) -> Result<()> {
    ui::print_header("Validating Catalogue");
    println!("File: {}", catalogue_file.display());

    match parse_catalogue_from_file(&catalogue_file).await {
        Ok(catalogue) => {
            println!();
            ui::print_success("Catalogue is valid!");
            println!("\nCatalogue Details:");
            println!("  Metrics: {}", catalogue.metrics.len());
            println!("  Experiment groups: {}", catalogue.experiments.len());
            println!("  Counter seeds: {}", catalogue.counter_seed_count());
            println!("  Gauge seeds: {}", catalogue.gauges.len());

            if catalogue.metrics.is_empty() {
                println!();
                ui::print_warning("Catalogue declares no metrics");
            }

            for (i, group) in catalogue.experiments.iter().enumerate() {
                println!("\n  Experiment {}: {}", i + 1, group.name);
                if let Some(summary) = &group.summary {
                    println!("    {}", summary);
                }
                for seed in &group.increments {
                    println!("      {}{} += {}", seed.metric, seed.labels, seed.delta);
                }
            }

            Ok(())
        }
        Err(e) => {
            println!();
            ui::print_error("Catalogue is invalid!");
            println!("\nError: {}", e);
            Err(e)
        }
    }
}
