//! The weather enrichment cache: which keys still need fetching, and how new
//! pull results fold back into the cache.
//!
//! The cache is keyed by `(geohash, date)`. A null `data` payload records a
//! failed pull; it keeps the key visible in the cache file but does not count
//! as resolved, so the key is offered for fetching again on the next run.

use crate::store::merge::merge_prefer_success;
use crate::weather::error::WeatherError;
use crate::weather::fetcher::WeatherKey;
use polars::prelude::*;

/// Column order of the weather cache store.
pub const CACHE_COLUMNS: [&str; 4] = ["geohash", "date", "date_pulled", "data"];

/// Empty cache frame with the store schema; the first-run stand-in for a
/// cache file that does not exist yet.
pub fn empty_cache_frame() -> PolarsResult<DataFrame> {
    df!(
        "geohash" => Vec::<String>::new(),
        "date" => Vec::<String>::new(),
        "date_pulled" => Vec::<String>::new(),
        "data" => Vec::<Option<String>>::new(),
    )
}

/// Distinct `(geohash, date)` keys present in `locations` (non-null cell and
/// date) that have no successful entry in `cache`. Keys whose only cache
/// entries are failed pulls are returned again; only success is remembered
/// as done.
pub fn missing_keys(locations: LazyFrame, cache: LazyFrame) -> Result<Vec<WeatherKey>, WeatherError> {
    let resolved = cache
        .filter(col("data").is_not_null())
        .select([col("geohash"), col("date")]);
    let wanted = locations
        .filter(col("geohash").is_not_null().and(col("date").is_not_null()))
        .select([col("geohash"), col("date")])
        .unique_stable(None, UniqueKeepStrategy::First)
        .join(
            resolved,
            [col("geohash"), col("date")],
            [col("geohash"), col("date")],
            JoinArgs::new(JoinType::Anti),
        )
        .collect()?;

    let cells = wanted.column("geohash")?.str()?;
    let dates = wanted.column("date")?.str()?;
    let mut keys = Vec::with_capacity(wanted.height());
    for i in 0..wanted.height() {
        if let (Some(cell), Some(date)) = (cells.get(i), dates.get(i)) {
            keys.push(WeatherKey {
                cell: cell.to_string(),
                date: date.to_string(),
            });
        }
    }
    Ok(keys)
}

/// Folds freshly pulled results into the cache: per key, a successful pull
/// always beats a failed one, and the earliest successful pull is kept.
pub fn merge_cache(cache: LazyFrame, new_results: LazyFrame) -> PolarsResult<LazyFrame> {
    merge_prefer_success(cache, new_results, &["geohash", "date"], "date_pulled", "data")
}
