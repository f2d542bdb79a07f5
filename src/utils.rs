use crate::error::PipelineError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const STORE_DIR_NAME: &str = "cryptid_pipeline";

/// Default directory for the durable store files (location store, report
/// store, weather cache, joined output).
pub fn default_store_dir() -> Result<PathBuf, PipelineError> {
    dirs::data_dir()
        .ok_or(PipelineError::StoreDirResolution)
        .map(|p| p.join(STORE_DIR_NAME))
}

pub async fn ensure_store_dir_exists(path: &Path) -> Result<(), PipelineError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(PipelineError::StoreDirNotADirectory(path.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating store directory: {}", path.display());
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| PipelineError::StoreDirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(PipelineError::StoreDirCreation(path.to_path_buf(), e)),
    }
}
