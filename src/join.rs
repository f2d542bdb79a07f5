//! Joins full-text reports to their geocoded locations.
//!
//! Light cleaning happens on the location side first: coordinates outside
//! the valid ranges and timestamps in the future are dropped, and the
//! sighting timestamp is reduced to day granularity (the weather cache key).
//! The join itself is a left outer join on report number: a report without
//! a resolved location stays in the output with null location fields.

use chrono::NaiveDateTime;
use polars::prelude::*;

/// Drops location rows with out-of-range coordinates or future timestamps,
/// and derives the day-granularity `date` column from `timestamp`.
///
/// `now` is the run timestamp, passed in explicitly so reruns over the same
/// input are reproducible.
pub fn clean_locations(locations: LazyFrame, now: NaiveDateTime) -> LazyFrame {
    // ISO-8601 strings order lexicographically, so the future check is a
    // plain string comparison after stripping any zone suffix.
    let now_iso = now.format("%Y-%m-%dT%H:%M:%S").to_string();
    locations
        .filter(
            col("latitude")
                .gt_eq(lit(-90.0))
                .and(col("latitude").lt_eq(lit(90.0))),
        )
        .filter(
            col("longitude")
                .gt_eq(lit(-180.0))
                .and(col("longitude").lt_eq(lit(180.0))),
        )
        .filter(
            col("timestamp")
                .str()
                .slice(lit(0), lit(19))
                .lt_eq(lit(now_iso)),
        )
        .with_column(col("timestamp").str().slice(lit(0), lit(10)).alias("date"))
}

/// Left outer join of reports to cleaned locations on report number, with
/// report-side-wins coalescing of `classification`.
pub fn join_reports_locations(reports: LazyFrame, locations: LazyFrame) -> LazyFrame {
    let report_side = reports.select([
        col("report_number").alias("number"),
        col("report_class").alias("classification"),
        col("observed"),
        col("location_details"),
        col("county"),
        col("state"),
        col("season"),
    ]);
    let location_side = locations.select([
        col("number"),
        col("classification"),
        col("latitude"),
        col("longitude"),
        col("geohash"),
        col("date"),
    ]);
    report_side
        .join(
            location_side,
            [col("number")],
            [col("number")],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(
            when(col("classification").is_null())
                .then(col("classification_right"))
                .otherwise(col("classification"))
                .alias("classification"),
        )
        .drop(by_name(["classification_right"], true))
}
