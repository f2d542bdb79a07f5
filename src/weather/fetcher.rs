//! Quota-bounded fetching of historical weather for missing cache keys.
//!
//! One request in flight at a time, in the order the keys are presented. The
//! external provider's usage limit is the reason this exists: the loop stops
//! issuing requests once the call counter exceeds the quota and reports the
//! backlog through [`FetchReport::quota_exhausted`], which is a signal rather
//! than an error.

use crate::config::WeatherConfig;
use crate::weather::error::WeatherError;
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;
use reqwest::Client;
use std::future::Future;

const TIMELINE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

/// Composite cache key: spatial cell plus sighting date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WeatherKey {
    pub cell: String,
    pub date: String,
}

/// Per-key fetch state. `Failed` is stored as a null payload and offered for
/// retry on a later run; `Unresolved` marks keys the quota cut off before
/// any request was made for them.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyState {
    Unresolved,
    Pending,
    Resolved { payload: String },
    Failed,
}

/// Outcome of one fetch pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub keys: Vec<(WeatherKey, KeyState)>,
    pub calls_made: u32,
    pub quota_exhausted: bool,
}

/// The external weather source: one request per (latitude, longitude,
/// timestamp) key. A trait seam so quota accounting is testable without a
/// network.
pub trait WeatherProvider {
    fn fetch_day(
        &self,
        latitude: f64,
        longitude: f64,
        timestamp: &str,
    ) -> impl Future<Output = Result<String, WeatherError>>;
}

/// Production provider: the Visual Crossing timeline API.
pub struct VisualCrossing {
    client: Client,
    api_key: String,
}

impl VisualCrossing {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
        }
    }
}

impl WeatherProvider for VisualCrossing {
    async fn fetch_day(
        &self,
        latitude: f64,
        longitude: f64,
        timestamp: &str,
    ) -> Result<String, WeatherError> {
        let url = format!("{TIMELINE_URL}/{latitude},{longitude}/{timestamp}");
        info!("Making weather request: {}", url);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("include", "days")])
            .send()
            .await
            .map_err(|e| WeatherError::NetworkRequest(url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    WeatherError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    WeatherError::NetworkRequest(url, e)
                });
            }
        };
        response
            .text()
            .await
            .map_err(|e| WeatherError::NetworkRequest(url, e))
    }
}

/// Centre point of a spatial cell, as (latitude, longitude).
fn cell_center(cell: &str) -> Result<(f64, f64), WeatherError> {
    let (coord, _, _) = geohash::decode(cell).map_err(|source| WeatherError::CellDecode {
        cell: cell.to_string(),
        source,
    })?;
    Ok((coord.y, coord.x))
}

/// Fetches the given keys in order, one request at a time, stopping once the
/// call counter exceeds `quota`. A request failure is recorded as
/// [`KeyState::Failed`] for that key (not retried within this run) and still
/// counts against the quota.
///
/// # Errors
///
/// Only a malformed spatial cell in the key list is an error; request
/// failures are recovered locally as `Failed` states.
pub async fn fetch_missing<P: WeatherProvider>(
    provider: &P,
    keys: Vec<WeatherKey>,
    quota: u32,
) -> Result<FetchReport, WeatherError> {
    let mut keys: Vec<(WeatherKey, KeyState)> = keys
        .into_iter()
        .map(|key| (key, KeyState::Unresolved))
        .collect();
    let mut calls_made = 0u32;

    for (key, state) in keys.iter_mut() {
        let (latitude, longitude) = cell_center(&key.cell)?;
        let timestamp = format!("{}T00:00:00", key.date);
        *state = KeyState::Pending;
        match provider.fetch_day(latitude, longitude, &timestamp).await {
            Ok(payload) => {
                info!("Weather request successful for cell {} on {}.", key.cell, key.date);
                *state = KeyState::Resolved { payload };
            }
            Err(err) => {
                // Record the failure as a null payload so bad pulls don't
                // pile up from run to run; the key stays eligible next run.
                warn!(
                    "Encountered error pulling weather for cell {} on {}: {err}",
                    key.cell, key.date
                );
                *state = KeyState::Failed;
            }
        }
        calls_made += 1;
        if calls_made > quota {
            info!("Call limit reached. Terminating.");
            break;
        }
    }

    let quota_exhausted = calls_made > quota;
    Ok(FetchReport {
        keys,
        calls_made,
        quota_exhausted,
    })
}

/// Converts attempted pulls into cache-store rows, tagged with the pull
/// date. Keys the quota cut off (`Unresolved`/`Pending`) produce no row.
pub fn results_frame(report: &FetchReport, pulled_on: NaiveDate) -> PolarsResult<DataFrame> {
    let pulled = pulled_on.format("%Y-%m-%d").to_string();
    let mut cells = Vec::new();
    let mut dates = Vec::new();
    let mut payloads: Vec<Option<String>> = Vec::new();
    for (key, state) in &report.keys {
        match state {
            KeyState::Resolved { payload } => {
                cells.push(key.cell.clone());
                dates.push(key.date.clone());
                payloads.push(Some(payload.clone()));
            }
            KeyState::Failed => {
                cells.push(key.cell.clone());
                dates.push(key.date.clone());
                payloads.push(None);
            }
            KeyState::Unresolved | KeyState::Pending => {}
        }
    }
    let pulled_col = vec![pulled; cells.len()];
    df!(
        "geohash" => cells,
        "date" => dates,
        "date_pulled" => pulled_col,
        "data" => payloads,
    )
}
