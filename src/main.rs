mod config;
mod dataset;
mod dedup;
mod models;
mod normalize;
mod pipeline;
mod scoring;
mod scrapers;
mod storage;

use anyhow::{bail, Context};
use config::RunConfig;
use pipeline::Scoring;
use scrapers::{OpenRentSource, SearchParams};
use std::path::Path;
use storage::RentalStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "housing-scout.json";

fn load_config(path: Option<&str>) -> anyhow::Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_path(path),
        None if Path::new(DEFAULT_CONFIG).exists() => RunConfig::from_path(DEFAULT_CONFIG),
        None => Ok(RunConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,sqlx=warn".into()
            }),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let today = chrono::Local::now().date_naive();

    match args.first().map(String::as_str) {
        Some("import") => {
            let Some(csv_path) = args.get(1) else {
                bail!("usage: housing-scout import <file.csv> [config.json]");
            };
            let config = load_config(args.get(2).map(String::as_str))?;
            let Some(db_path) = &config.database_path else {
                bail!("import needs database_path in the config");
            };
            let store = RentalStore::open(db_path).await?;
            pipeline::import_csv(csv_path, &store).await?;
        }
        config_path => {
            let config = load_config(config_path)?;

            info!("🏠 Housing Scout - OpenRent rental scraper");
            info!("==========================================");
            info!("Search radius: {} miles", config.radius);

            // Load artifacts before touching the site so a bad path fails fast
            let scoring = Scoring::from_config(&config).context("Failed to load scoring artifacts")?;

            let source =
                OpenRentSource::new(SearchParams::with_radius(config.radius), config.pacing.clone())?;
            let dataset = pipeline::run(&config, &source, scoring.as_ref(), today).await?;

            info!("✅ Scraped {} new listings", dataset.len());
        }
    }

    Ok(())
}
