//! Durable store files: CSV scan and atomic whole-file replacement.
//!
//! A run reads each store fully, merges in memory, and rewrites the file as a
//! whole. The rewrite goes through a temp file in the destination directory
//! followed by a rename, so an interrupted run leaves the store either fully
//! old or fully new.

use crate::store::error::StoreError;
use log::info;
use polars::prelude::*;
use std::path::Path;
use tempfile::NamedTempFile;

/// Lazily scans a CSV store file.
pub fn scan_store(path: &Path) -> Result<LazyFrame, StoreError> {
    LazyCsvReader::new(PlPath::new(&path.to_string_lossy()))
        .with_has_header(true)
        .finish()
        .map_err(|e| StoreError::Scan(path.to_path_buf(), e))
}

/// Replaces the store file at `path` with `df`, atomically.
pub fn write_store(path: &Path, mut df: DataFrame) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| StoreError::WriteIo(path.to_path_buf(), e))?;
    CsvWriter::new(&mut tmp)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| StoreError::WritePolars(path.to_path_buf(), e))?;
    tmp.persist(path)
        .map_err(|e| StoreError::Replace(path.to_path_buf(), e))?;
    info!("Replaced store file {:?} ({} rows).", path, df.height());
    Ok(())
}
