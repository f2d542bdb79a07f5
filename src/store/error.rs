use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to scan store file '{0}'")]
    Scan(PathBuf, #[source] PolarsError),

    #[error("Failed processing store frame: {0}")]
    Frame(#[from] PolarsError),

    #[error("I/O error writing store file '{0}'")]
    WriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing store file '{0}'")]
    WritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to replace store file '{0}'")]
    Replace(PathBuf, #[source] tempfile::PersistError),
}
