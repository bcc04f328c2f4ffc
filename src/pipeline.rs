use crate::config::{FailurePolicy, Pacing, RunConfig};
use crate::dataset::Dataset;
use crate::dedup::KnownIds;
use crate::scoring::{self, FeaturePipeline, FeatureTransform, LinearModel, Predictor};
use crate::scrapers::openrent::{extract_listing, parse_search_results};
use crate::scrapers::{ListingSource, SearchParams};
use crate::storage::{flat_file, RentalStore};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use tokio::time::sleep;
use tracing::{info, warn};

/// Loaded scoring artifacts
pub struct Scoring {
    pub transform: Box<dyn FeatureTransform + Send + Sync>,
    pub predictor: Box<dyn Predictor + Send + Sync>,
}

impl Scoring {
    /// Load both artifacts named in the config, if any
    pub fn from_config(config: &RunConfig) -> Result<Option<Self>> {
        let Some((transform, model)) = config.artifacts() else {
            return Ok(None);
        };
        info!("Loading scoring artifacts");
        Ok(Some(Self {
            transform: Box::new(FeaturePipeline::from_path(transform)?),
            predictor: Box::new(LinearModel::from_path(model)?),
        }))
    }
}

/// Scrape new listings from `source` into a dataset
///
/// `known` is updated with every listing scraped, so repeats on the same page
/// are fetched only once.
pub async fn collect(
    source: &dyn ListingSource,
    params: &SearchParams,
    known: &mut KnownIds,
    reference_date: NaiveDate,
    policy: FailurePolicy,
    pacing: &Pacing,
) -> Result<Dataset> {
    info!(
        "{} listings already in database. Searching {} for new ones...",
        known.len(),
        source.source_name()
    );

    let search_html = source
        .search_page()
        .await
        .context("Failed to render search page")?;
    let summaries = parse_search_results(&search_html, params)?;

    let mut dataset = Dataset::new(reference_date);
    for summary in summaries {
        if !known.insert_new(&summary.id) {
            continue;
        }

        let html = match source.detail_page(&summary.link).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Skipping listing {}: {e:#}", summary.id);
                sleep(std::time::Duration::from_millis(pacing.after_failure_ms)).await;
                continue;
            }
        };

        match extract_listing(&html, &summary, reference_date, policy) {
            Ok(listing) => {
                dataset.push(listing);
                info!("{} new listings scraped", dataset.len());
                sleep(Pacing::jitter(pacing.between_listings_ms)).await;
            }
            Err(e) => {
                warn!("Skipping listing {}: {e:#}", summary.id);
                sleep(std::time::Duration::from_millis(pacing.after_failure_ms)).await;
            }
        }
    }

    info!("Scraping completed - {} new listings found!", dataset.len());
    Ok(dataset)
}

/// Write a finished dataset to every configured sink
///
/// The CSV files are written first. A failure while writing the table leaves
/// them in place; the next run picks the listings up again.
pub async fn persist(
    dataset: &Dataset,
    config: &RunConfig,
    store: Option<&RentalStore>,
) -> Result<()> {
    if let Some(path) = &config.run_csv_path {
        flat_file::write_run(path, dataset)?;
    }
    if let Some(path) = &config.history_csv_path {
        flat_file::append_history(path, dataset)?;
    }
    if let Some(store) = store {
        store.append(dataset.rows()).await?;
        info!("There are now {} listings in the database.", store.count().await?);
    }
    Ok(())
}

/// One complete scrape: dedup, collect, score, persist
pub async fn run(
    config: &RunConfig,
    source: &dyn ListingSource,
    scoring: Option<&Scoring>,
    reference_date: NaiveDate,
) -> Result<Dataset> {
    let store = match &config.database_path {
        Some(path) => Some(RentalStore::open(path).await?),
        None => None,
    };
    // Without a table the cumulative file is the record of what was stored
    let mut known = match (&store, &config.history_csv_path) {
        (Some(store), _) => store.known_ids().await?,
        (None, Some(history)) => flat_file::known_ids(history)?,
        (None, None) => KnownIds::default(),
    };

    let params = SearchParams::with_radius(config.radius);
    let mut dataset = collect(
        source,
        &params,
        &mut known,
        reference_date,
        config.failure_policy,
        &config.pacing,
    )
    .await?;

    if let Some(scoring) = scoring {
        scoring::score(
            &mut dataset,
            scoring.transform.as_ref(),
            scoring.predictor.as_ref(),
        )?;
    }

    persist(&dataset, config, store.as_ref()).await?;
    Ok(dataset)
}

/// Append a previously written CSV file to the table, skipping stored ids
///
/// Rows keep the scrape date they were written with.
pub async fn import_csv(csv_path: impl AsRef<Path>, store: &RentalStore) -> Result<u64> {
    let csv_path = csv_path.as_ref();
    let mut known = store.known_ids().await?;
    let rows = flat_file::read_listings(csv_path)?;
    let total = rows.len();

    let fresh: Vec<_> = rows
        .into_iter()
        .filter(|l| known.insert_new(&l.property_id))
        .collect();
    info!(
        "Importing {} of {} listings from {}",
        fresh.len(),
        total,
        csv_path.display()
    );

    let written = store.append(&fresh).await?;
    info!("There are now {} listings in the database.", store.count().await?);
    Ok(written)
}
