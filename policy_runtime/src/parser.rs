use crate::config::{ExporterConfig, ExporterConfigFile};
use anyhow::Result;
use policy_core::{CatalogueConfig, SeriesCatalogue};
use std::path::Path;

pub async fn parse_catalogue_from_file(path: impl AsRef<Path>) -> Result<SeriesCatalogue> {
    let path = path.as_ref();
    let format = format_of(path)?;
    let contents = tokio::fs::read_to_string(path).await?;
    parse_catalogue_from_str(&contents, format)
}

pub fn parse_catalogue_from_str(content: &str, format: &str) -> Result<SeriesCatalogue> {
    let catalogue: SeriesCatalogue = match format.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content)?,
        "toml" => toml::from_str::<CatalogueConfig>(content)?.catalogue,
        "json" => serde_json::from_str(content)?,
        _ => return Err(anyhow::anyhow!("Unsupported format: {}", format)),
    };
    catalogue.validate()?;
    Ok(catalogue)
}

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<ExporterConfig> {
    let path = path.as_ref();
    let format = format_of(path)?;
    let contents = tokio::fs::read_to_string(path).await?;
    parse_config_from_str(&contents, format)
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<ExporterConfig> {
    let config: ExporterConfig = match format.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content)?,
        "toml" => toml::from_str::<ExporterConfigFile>(content)?.exporter,
        "json" => serde_json::from_str(content)?,
        _ => return Err(anyhow::anyhow!("Unsupported format: {}", format)),
    };
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}

fn format_of(path: &Path) -> Result<&str> {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext @ ("yaml" | "yml" | "toml" | "json")) => Ok(ext),
        _ => Err(anyhow::anyhow!(
            "Unsupported file format. Use .yaml, .yml, .toml, or .json"
        )),
    }
}
