use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do when a field group is missing from a detail page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fill that group with sentinel values and keep the listing
    #[default]
    FillSentinels,
    /// Drop the whole listing
    SkipListing,
}

/// Waits between browser and HTTP actions, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub initial_load_ms: (u64, u64),
    pub scroll_pause_ms: u64,
    pub before_capture_ms: (u64, u64),
    pub between_listings_ms: (u64, u64),
    pub after_failure_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            initial_load_ms: (4_000, 7_000),
            scroll_pause_ms: 1_000,
            before_capture_ms: (2_000, 4_000),
            between_listings_ms: (0, 1_100),
            after_failure_ms: 1_000,
        }
    }
}

impl Pacing {
    /// No waiting at all
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            initial_load_ms: (0, 0),
            scroll_pause_ms: 0,
            before_capture_ms: (0, 0),
            between_listings_ms: (0, 0),
            after_failure_ms: 0,
        }
    }

    /// Uniform random duration in `[lo, hi]`
    pub fn jitter((lo, hi): (u64, u64)) -> Duration {
        if hi <= lo {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::random_range(lo..=hi))
    }
}

/// Parameters for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Search radius around London, in miles
    pub radius: u32,
    /// SQLite file holding the `rentals` table; `None` disables the table sink
    pub database_path: Option<PathBuf>,
    /// Per-run CSV, overwritten each run
    pub run_csv_path: Option<PathBuf>,
    /// Cumulative CSV, appended each run
    pub history_csv_path: Option<PathBuf>,
    /// Feature transform artifact (JSON)
    pub transform_path: Option<PathBuf>,
    /// Regression model artifact (JSON)
    pub model_path: Option<PathBuf>,
    pub failure_policy: FailurePolicy,
    pub pacing: Pacing,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            database_path: Some(PathBuf::from("real_estate.db")),
            run_csv_path: Some(PathBuf::from("scraped_data.csv")),
            history_csv_path: None,
            transform_path: None,
            model_path: None,
            failure_policy: FailurePolicy::default(),
            pacing: Pacing::default(),
        }
    }
}

impl RunConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.transform_path.is_some() != self.model_path.is_some() {
            bail!("transform_path and model_path must be set together");
        }
        Ok(())
    }

    /// Both scoring artifacts, when configured
    pub fn artifacts(&self) -> Option<(&Path, &Path)> {
        match (&self.transform_path, &self.model_path) {
            (Some(t), Some(m)) => Some((t.as_path(), m.as_path())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"radius": 5, "failure_policy": "skip_listing"}"#).unwrap();
        assert_eq!(config.radius, 5);
        assert_eq!(config.failure_policy, FailurePolicy::SkipListing);
        assert_eq!(config.database_path, Some(PathBuf::from("real_estate.db")));
        assert_eq!(config.pacing.scroll_pause_ms, 1_000);
    }

    #[test]
    fn artifacts_must_come_in_pairs() {
        let config = RunConfig {
            model_path: Some("model.json".into()),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(config.artifacts().is_none());
    }

    #[test]
    fn jitter_stays_in_range() {
        for _ in 0..50 {
            let d = Pacing::jitter((10, 20));
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert_eq!(Pacing::jitter((0, 0)), Duration::ZERO);
    }
}
