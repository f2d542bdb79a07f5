use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportBatchError {
    #[error("Failed to open report batch '{0}'")]
    Open(PathBuf, #[source] std::io::Error),

    #[error("I/O error reading report batch at line {line}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in report batch at line {line}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
