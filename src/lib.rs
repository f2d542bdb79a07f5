//! Batch pipeline for cryptid sighting reports: extracts geocoded locations
//! from place-marker documents, reconciles scraped full-text reports,
//! enriches each sighting with historical weather through a quota-bounded
//! cache, and publishes a joined, weather-annotated output store.
//!
//! The [`Pipeline`] type is the entry point; the lower-level building blocks
//! (extraction, merging, fetching, projection) are exported for callers that
//! run individual steps.

mod config;
mod error;
mod join;
mod locations;
mod pipeline;
mod reports;
mod store;
mod utils;
mod weather;

pub use error::PipelineError;
pub use pipeline::{Pipeline, RunSummary, WeatherSync};

pub use config::{ConfigError, WeatherConfig, WEATHER_KEY_VAR};

pub use join::{clean_locations, join_reports_locations};

pub use locations::error::ExtractError;
pub use locations::extractor::{
    extract_locations, locations_frame, GeocodedLocation, CELL_PRECISION,
};

pub use reports::error::ReportBatchError;
pub use reports::{
    load_report_batch, merge_reports, parse_report_batch, reports_frame, RawReport, REPORT_COLUMNS,
};

pub use store::error::StoreError;
pub use store::io::{scan_store, write_store};
pub use store::merge::{merge_keep_latest, merge_prefer_success};

pub use weather::cache::{empty_cache_frame, merge_cache, missing_keys, CACHE_COLUMNS};
pub use weather::error::WeatherError;
pub use weather::fetcher::{
    fetch_missing, results_frame, FetchReport, KeyState, VisualCrossing, WeatherKey,
    WeatherProvider,
};
pub use weather::projector::{cache_index, project_weather, DayConditions};
