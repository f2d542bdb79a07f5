//! The main entry point for running the sighting enrichment pipeline.
//!
//! A [`Pipeline`] owns a store directory with four CSV files: the geocoded
//! location store, the full-text report store, the weather cache and the
//! joined output. Each update step reads a store, reconciles it with fresh
//! input and atomically rewrites it, so steps can run independently and a
//! run can be resumed after an interrupted weather backfill.

use crate::error::PipelineError;
use crate::join::{clean_locations, join_reports_locations};
use crate::locations::extractor::{extract_locations, locations_frame};
use crate::reports::{load_report_batch, merge_reports, reports_frame};
use crate::store::io::{scan_store, write_store};
use crate::store::merge::merge_keep_latest;
use crate::utils::{default_store_dir, ensure_store_dir_exists};
use crate::weather::cache::{empty_cache_frame, merge_cache, missing_keys};
use crate::weather::fetcher::{fetch_missing, results_frame, WeatherProvider};
use crate::weather::projector::{cache_index, project_weather};
use bon::bon;
use chrono::{Local, NaiveDateTime};
use log::{info, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};

const LOCATIONS_FILE: &str = "geocoded_reports.csv";
const REPORTS_FILE: &str = "raw_reports.csv";
const WEATHER_CACHE_FILE: &str = "weather_cache.csv";
const JOINED_FILE: &str = "reports_joined.csv";

const DEFAULT_FETCH_QUOTA: u32 = 900;

/// Outcome of a weather sync: either every wanted key is now cached, or the
/// request quota ran out with keys still missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherSync {
    CaughtUp,
    Backlog,
}

/// What a full [`Pipeline::run`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub weather: WeatherSync,
    pub weather_calls: u32,
    /// False when the run stopped before the join because the weather cache
    /// still has a backlog.
    pub joined_built: bool,
}

/// The sighting enrichment pipeline over one store directory.
///
/// Create an instance with the builder; every argument is optional.
///
/// ```rust,no_run
/// # use cryptid_pipeline::{Pipeline, PipelineError};
/// # async fn run() -> Result<(), PipelineError> {
/// let pipeline = Pipeline::builder().build().await?;
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    store_dir: PathBuf,
    fetch_quota: u32,
    run_timestamp: NaiveDateTime,
}

#[bon]
impl Pipeline {
    /// Creates a pipeline over a store directory.
    ///
    /// # Arguments
    ///
    /// * `.store_dir(PathBuf)`: Optional. Directory holding the store files,
    ///   created if absent. Defaults to a platform data directory.
    /// * `.fetch_quota(u32)`: Optional. Weather request budget per run.
    ///   Defaults to `900`.
    /// * `.run_timestamp(NaiveDateTime)`: Optional. The timestamp this run is
    ///   considered to happen at; it tags merged rows and bounds the
    ///   future-sighting filter. Defaults to the current local time.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StoreDirResolution`] when no store directory
    /// was given and the platform default cannot be determined, and
    /// [`PipelineError::StoreDirCreation`] when the directory cannot be
    /// created.
    #[builder]
    pub async fn new(
        store_dir: Option<PathBuf>,
        fetch_quota: Option<u32>,
        run_timestamp: Option<NaiveDateTime>,
    ) -> Result<Self, PipelineError> {
        let store_dir = match store_dir {
            Some(dir) => dir,
            None => default_store_dir()?,
        };
        ensure_store_dir_exists(&store_dir).await?;
        Ok(Self {
            store_dir,
            fetch_quota: fetch_quota.unwrap_or(DEFAULT_FETCH_QUOTA),
            run_timestamp: run_timestamp.unwrap_or_else(|| Local::now().naive_local()),
        })
    }

    fn locations_path(&self) -> PathBuf {
        self.store_dir.join(LOCATIONS_FILE)
    }

    fn reports_path(&self) -> PathBuf {
        self.store_dir.join(REPORTS_FILE)
    }

    fn weather_cache_path(&self) -> PathBuf {
        self.store_dir.join(WEATHER_CACHE_FILE)
    }

    fn joined_path(&self) -> PathBuf {
        self.store_dir.join(JOINED_FILE)
    }

    async fn replace_store(&self, path: PathBuf, df: DataFrame) -> Result<(), PipelineError> {
        tokio::task::spawn_blocking(move || write_store(&path, df)).await??;
        Ok(())
    }

    /// Extracts geocoded locations from a place-marker document and folds
    /// them into the location store, keeping the latest extraction per
    /// report number.
    pub async fn update_locations(&self, doc: &str) -> Result<(), PipelineError> {
        let extraction_date = self.run_timestamp.date();
        let rows = extract_locations(doc, extraction_date)?;
        let batch = locations_frame(&rows)?;

        let path = self.locations_path();
        let merged = if tokio::fs::metadata(&path).await.is_ok() {
            let store = scan_store(&path)?;
            merge_keep_latest(store, batch.lazy(), &["number"], "extraction_date")?.collect()?
        } else {
            info!("No location store yet, starting one at {:?}.", path);
            batch
        };
        self.replace_store(path, merged).await
    }

    /// Loads a scraped NDJSON report batch and folds it into the report
    /// store, keeping the latest scrape per report number.
    pub async fn update_reports(&self, batch_path: &Path) -> Result<(), PipelineError> {
        let reports = load_report_batch(batch_path)?;
        info!("Loaded {} reports from {:?}.", reports.len(), batch_path);
        let batch = reports_frame(&reports)?;

        let path = self.reports_path();
        let merged = if tokio::fs::metadata(&path).await.is_ok() {
            let store = scan_store(&path)?;
            merge_reports(store, batch.lazy())?.collect()?
        } else {
            info!("No report store yet, starting one at {:?}.", path);
            batch
        };
        self.replace_store(path, merged).await
    }

    /// Fetches weather for location keys not yet cached, within the request
    /// quota, and folds the results into the weather cache.
    pub async fn update_weather<P: WeatherProvider>(
        &self,
        provider: &P,
    ) -> Result<(WeatherSync, u32), PipelineError> {
        let locations = clean_locations(scan_store(&self.locations_path())?, self.run_timestamp);

        let cache_path = self.weather_cache_path();
        let cache = if tokio::fs::metadata(&cache_path).await.is_ok() {
            scan_store(&cache_path)?
        } else {
            empty_cache_frame()?.lazy()
        };

        let keys = missing_keys(locations, cache.clone())?;
        if keys.is_empty() {
            info!("Weather cache is complete, nothing to fetch.");
            return Ok((WeatherSync::CaughtUp, 0));
        }
        info!("Fetching weather for {} missing keys.", keys.len());

        let report = fetch_missing(provider, keys, self.fetch_quota).await?;
        let results = results_frame(&report, self.run_timestamp.date())?;
        let merged = merge_cache(cache, results.lazy())?.collect()?;
        self.replace_store(cache_path, merged).await?;

        if report.quota_exhausted {
            warn!(
                "Weather quota exhausted after {} calls, keys remain unfetched.",
                report.calls_made
            );
            Ok((WeatherSync::Backlog, report.calls_made))
        } else {
            Ok((WeatherSync::CaughtUp, report.calls_made))
        }
    }

    /// Joins the report store to the cleaned location store and projects the
    /// cached weather into scalar columns, replacing the joined output file.
    pub async fn build_joined(&self) -> Result<(), PipelineError> {
        let locations = clean_locations(scan_store(&self.locations_path())?, self.run_timestamp);
        let reports = scan_store(&self.reports_path())?;
        let joined = join_reports_locations(reports, locations).collect()?;

        let cache_path = self.weather_cache_path();
        let cache = if tokio::fs::metadata(&cache_path).await.is_ok() {
            scan_store(&cache_path)?.collect()?
        } else {
            empty_cache_frame()?
        };
        let index = cache_index(&cache)?;

        let projected = project_weather(joined, &index)?;
        self.replace_store(self.joined_path(), projected).await
    }

    /// Runs the whole pipeline: locations, reports, weather, then the joined
    /// output. The join is skipped while the weather cache has a backlog, so
    /// the published output never mixes enriched and known-incomplete rows.
    pub async fn run<P: WeatherProvider>(
        &self,
        doc: &str,
        report_batch_path: &Path,
        provider: &P,
    ) -> Result<RunSummary, PipelineError> {
        self.update_locations(doc).await?;
        self.update_reports(report_batch_path).await?;
        let (weather, weather_calls) = self.update_weather(provider).await?;
        let joined_built = match weather {
            WeatherSync::CaughtUp => {
                self.build_joined().await?;
                true
            }
            WeatherSync::Backlog => {
                info!("Skipping join build until the weather backlog clears.");
                false
            }
        };
        Ok(RunSummary {
            weather,
            weather_calls,
            joined_built,
        })
    }
}
