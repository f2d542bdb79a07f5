use std::num::ParseFloatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to parse place-marker document")]
    Xml(#[from] roxmltree::Error),

    // Positional correlation is the only thing tying the sequences together,
    // so a length mismatch invalidates the whole batch.
    #[error("len({left}): {left_count}, len({right}): {right_count}")]
    StructuralMismatch {
        left: &'static str,
        left_count: usize,
        right: &'static str,
        right_count: usize,
    },

    #[error("Placemark title '{title}' does not contain a report number")]
    UnparsableLabel { title: String },

    #[error("Failed to parse coordinate '{value}'")]
    CoordinateParse {
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("Failed to derive spatial cell for ({latitude}, {longitude})")]
    CellDerivation {
        latitude: f64,
        longitude: f64,
        #[source]
        source: geohash::GeohashError,
    },
}
