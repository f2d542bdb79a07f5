use crate::config::ConfigError;
use crate::locations::error::ExtractError;
use crate::reports::error::ReportBatchError;
use crate::store::error::StoreError;
use crate::weather::error::WeatherError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    ReportBatch(#[from] ReportBatchError),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed processing pipeline frame: {0}")]
    Frame(#[from] polars::error::PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed to determine store directory")]
    StoreDirResolution,

    #[error("Store path exists but is not a directory: '{0}'")]
    StoreDirNotADirectory(PathBuf),

    #[error("Failed to create store directory '{0}'")]
    StoreDirCreation(PathBuf, #[source] std::io::Error),
}
