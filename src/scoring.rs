//! Optional price prediction over an assembled dataset.
//!
//! The trained artifacts are injected as two capabilities: a feature transform
//! and a predictor. The JSON-backed [`FeaturePipeline`] and [`LinearModel`] are
//! the implementations loaded from disk by the binary.

use crate::dataset::Dataset;
use crate::models::{Flag, Listing};
use crate::normalize;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Model-ready rows, one per listing, all of the same width
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

pub trait FeatureTransform {
    fn transform(&self, rows: &[Listing]) -> Result<FeatureMatrix>;
}

pub trait Predictor {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Fill `predicted_price` on every row; any failure aborts the run
pub fn score(
    dataset: &mut Dataset,
    transform: &dyn FeatureTransform,
    predictor: &dyn Predictor,
) -> Result<()> {
    if dataset.is_empty() {
        return Ok(());
    }

    let features = transform
        .transform(dataset.rows())
        .context("Feature transform failed")?;
    if features.rows.len() != dataset.len() {
        bail!(
            "feature transform produced {} rows for {} listings",
            features.rows.len(),
            dataset.len()
        );
    }

    let predictions = predictor.predict(&features).context("Scoring failed")?;
    if predictions.len() != dataset.len() {
        bail!(
            "model produced {} predictions for {} listings",
            predictions.len(),
            dataset.len()
        );
    }

    for (row, price) in dataset.rows_mut().iter_mut().zip(predictions) {
        row.predicted_price = Some(price);
    }
    info!("Scored {} listings", dataset.len());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFeature {
    NumBedrooms,
    NumBathrooms,
    MaxTenants,
    Deposit,
    MinTenancyMonths,
    ClosestStationMins,
    BedBathRatio,
}

impl NumericFeature {
    /// None for sentinels and undefined ratios
    fn value(self, l: &Listing) -> Option<f64> {
        let known = |v: i64| (v >= 0).then_some(v as f64);
        match self {
            NumericFeature::NumBedrooms => known(l.num_bedrooms),
            NumericFeature::NumBathrooms => known(l.num_bathrooms),
            NumericFeature::MaxTenants => known(l.max_tenants),
            NumericFeature::Deposit => known(l.deposit),
            NumericFeature::MinTenancyMonths => known(l.min_tenancy_months),
            NumericFeature::ClosestStationMins => known(l.closest_station_mins),
            NumericFeature::BedBathRatio => {
                normalize::bed_bath_ratio(l.num_bedrooms, l.num_bathrooms)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalFeature {
    ListingType,
    Region,
    Area,
    Furnishing,
    BillsIncluded,
    StudentFriendly,
    FamilyFriendly,
    PetFriendly,
    SmokerFriendly,
    Garden,
    Parking,
    Fireplace,
}

impl CategoricalFeature {
    fn value(self, l: &Listing) -> Option<String> {
        let flag = |f: Flag| Some(f.as_str().to_string());
        match self {
            CategoricalFeature::ListingType => l
                .listing_title
                .as_deref()
                .map(|t| normalize::listing_type(t).as_str().to_string()),
            CategoricalFeature::Region => l
                .postcode
                .as_deref()
                .and_then(normalize::region)
                .map(String::from),
            CategoricalFeature::Area => l
                .listing_title
                .as_deref()
                .and_then(normalize::area_from_title),
            CategoricalFeature::Furnishing => Some(l.furnishing.clone()),
            CategoricalFeature::BillsIncluded => flag(l.bills_included),
            CategoricalFeature::StudentFriendly => flag(l.student_friendly),
            CategoricalFeature::FamilyFriendly => flag(l.family_friendly),
            CategoricalFeature::PetFriendly => flag(l.pet_friendly),
            CategoricalFeature::SmokerFriendly => flag(l.smoker_friendly),
            CategoricalFeature::Garden => flag(l.garden),
            CategoricalFeature::Parking => flag(l.parking),
            CategoricalFeature::Fireplace => flag(l.fireplace),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericStep {
    pub feature: NumericFeature,
    pub mean: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotStep {
    pub feature: CategoricalFeature,
    pub categories: Vec<String>,
}

/// Standardized numerics followed by one-hot categoricals
///
/// Unknown values (sentinels, undefined ratio) are imputed with the mean, so
/// they standardize to zero. Unseen categories encode as all zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturePipeline {
    #[serde(default)]
    pub numeric: Vec<NumericStep>,
    #[serde(default)]
    pub categorical: Vec<OneHotStep>,
}

impl FeaturePipeline {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let pipeline: Self = load_json(path.as_ref())?;
        if let Some(step) = pipeline.numeric.iter().find(|s| s.scale == 0.0) {
            bail!("feature {:?} has zero scale", step.feature);
        }
        Ok(pipeline)
    }

    fn columns(&self) -> Vec<String> {
        let numeric = self
            .numeric
            .iter()
            .map(|s| snake_name(&s.feature));
        let one_hot = self.categorical.iter().flat_map(|s| {
            let prefix = snake_name(&s.feature);
            s.categories
                .iter()
                .map(move |c| format!("{prefix}={c}"))
        });
        numeric.chain(one_hot).collect()
    }
}

impl FeatureTransform for FeaturePipeline {
    fn transform(&self, rows: &[Listing]) -> Result<FeatureMatrix> {
        let columns = self.columns();
        let rows = rows
            .iter()
            .map(|listing| {
                let mut out = Vec::with_capacity(columns.len());
                for step in &self.numeric {
                    let value = step.feature.value(listing).unwrap_or(step.mean);
                    out.push((value - step.mean) / step.scale);
                }
                for step in &self.categorical {
                    let value = step.feature.value(listing);
                    out.extend(step.categories.iter().map(|c| {
                        if value.as_deref() == Some(c.as_str()) {
                            1.0
                        } else {
                            0.0
                        }
                    }));
                }
                out
            })
            .collect();
        Ok(FeatureMatrix { columns, rows })
    }
}

/// `intercept + coefficients · features`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref())
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.width() != self.coefficients.len() {
            bail!(
                "model expects {} features, transform produced {}",
                self.coefficients.len(),
                features.width()
            );
        }
        Ok(features
            .rows
            .iter()
            .map(|row| {
                self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(x, w)| x * w)
                        .sum::<f64>()
            })
            .collect())
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse artifact {}", path.display()))
}

fn snake_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
