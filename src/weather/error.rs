use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Weather request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("Weather request for {url} returned status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode spatial cell '{cell}'")]
    CellDecode {
        cell: String,
        #[source]
        source: geohash::GeohashError,
    },

    #[error("Failed processing weather frame: {0}")]
    Frame(#[from] PolarsError),
}
