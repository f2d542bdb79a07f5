//! Raw sighting-report batches and their reconciliation with the report store.
//!
//! A scrape run produces newline-delimited JSON, one report object per line,
//! with the scraper's uppercase field names. The durable report store is a
//! CSV with the pinned lowercase schema in [`REPORT_COLUMNS`]. Merging keeps
//! the version of each report with the latest `pulled_datetime`.

pub mod error;

use crate::reports::error::ReportBatchError;
use crate::store::merge::merge_keep_latest;
use polars::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Column order of the report store. Everything is free text except the key
/// (`report_number`); `pulled_datetime` is the ISO scrape timestamp used as
/// the recency field.
pub const REPORT_COLUMNS: [&str; 19] = [
    "year",
    "season",
    "month",
    "date",
    "state",
    "county",
    "location_details",
    "nearest_town",
    "nearest_road",
    "observed",
    "also_noticed",
    "other_witnesses",
    "other_stories",
    "time_and_conditions",
    "environment",
    "report_number",
    "report_class",
    "a_and_g_references",
    "pulled_datetime",
];

/// One scraped report, as it appears in an NDJSON batch line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawReport {
    #[serde(alias = "REPORT_NUMBER")]
    pub report_number: Option<i64>,
    #[serde(alias = "REPORT_CLASS")]
    pub report_class: Option<String>,
    #[serde(alias = "YEAR")]
    pub year: Option<String>,
    #[serde(alias = "SEASON")]
    pub season: Option<String>,
    #[serde(alias = "MONTH")]
    pub month: Option<String>,
    #[serde(alias = "DATE")]
    pub date: Option<String>,
    #[serde(alias = "STATE")]
    pub state: Option<String>,
    #[serde(alias = "COUNTY")]
    pub county: Option<String>,
    #[serde(alias = "LOCATION_DETAILS")]
    pub location_details: Option<String>,
    #[serde(alias = "NEAREST_TOWN")]
    pub nearest_town: Option<String>,
    #[serde(alias = "NEAREST_ROAD")]
    pub nearest_road: Option<String>,
    #[serde(alias = "OBSERVED")]
    pub observed: Option<String>,
    #[serde(alias = "ALSO_NOTICED")]
    pub also_noticed: Option<String>,
    #[serde(alias = "OTHER_WITNESSES")]
    pub other_witnesses: Option<String>,
    #[serde(alias = "OTHER_STORIES")]
    pub other_stories: Option<String>,
    #[serde(alias = "TIME_AND_CONDITIONS")]
    pub time_and_conditions: Option<String>,
    #[serde(alias = "ENVIRONMENT")]
    pub environment: Option<String>,
    #[serde(alias = "A_&_G_REFERENCES")]
    pub a_and_g_references: Option<String>,
    #[serde(alias = "PULLED_DATETIME")]
    pub pulled_datetime: Option<String>,
}

/// Parses an NDJSON report batch. Lines that parse but carry no
/// `REPORT_NUMBER` are skipped; an unkeyed report cannot participate in the
/// merge. A line that is not valid JSON fails the batch.
pub fn parse_report_batch(reader: impl BufRead) -> Result<Vec<RawReport>, ReportBatchError> {
    let mut reports = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ReportBatchError::Io {
            line: idx + 1,
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let report: RawReport =
            serde_json::from_str(&line).map_err(|source| ReportBatchError::Json {
                line: idx + 1,
                source,
            })?;
        if report.report_number.is_none() {
            continue;
        }
        reports.push(report);
    }
    Ok(reports)
}

pub fn load_report_batch(path: &Path) -> Result<Vec<RawReport>, ReportBatchError> {
    let file = File::open(path).map_err(|source| ReportBatchError::Open(path.to_path_buf(), source))?;
    parse_report_batch(BufReader::new(file))
}

/// Assembles parsed reports into the pinned store schema.
pub fn reports_frame(reports: &[RawReport]) -> PolarsResult<DataFrame> {
    df!(
        "year" => reports.iter().map(|r| r.year.clone()).collect::<Vec<_>>(),
        "season" => reports.iter().map(|r| r.season.clone()).collect::<Vec<_>>(),
        "month" => reports.iter().map(|r| r.month.clone()).collect::<Vec<_>>(),
        "date" => reports.iter().map(|r| r.date.clone()).collect::<Vec<_>>(),
        "state" => reports.iter().map(|r| r.state.clone()).collect::<Vec<_>>(),
        "county" => reports.iter().map(|r| r.county.clone()).collect::<Vec<_>>(),
        "location_details" => reports.iter().map(|r| r.location_details.clone()).collect::<Vec<_>>(),
        "nearest_town" => reports.iter().map(|r| r.nearest_town.clone()).collect::<Vec<_>>(),
        "nearest_road" => reports.iter().map(|r| r.nearest_road.clone()).collect::<Vec<_>>(),
        "observed" => reports.iter().map(|r| r.observed.clone()).collect::<Vec<_>>(),
        "also_noticed" => reports.iter().map(|r| r.also_noticed.clone()).collect::<Vec<_>>(),
        "other_witnesses" => reports.iter().map(|r| r.other_witnesses.clone()).collect::<Vec<_>>(),
        "other_stories" => reports.iter().map(|r| r.other_stories.clone()).collect::<Vec<_>>(),
        "time_and_conditions" => reports.iter().map(|r| r.time_and_conditions.clone()).collect::<Vec<_>>(),
        "environment" => reports.iter().map(|r| r.environment.clone()).collect::<Vec<_>>(),
        "report_number" => reports.iter().map(|r| r.report_number).collect::<Vec<_>>(),
        "report_class" => reports.iter().map(|r| r.report_class.clone()).collect::<Vec<_>>(),
        "a_and_g_references" => reports.iter().map(|r| r.a_and_g_references.clone()).collect::<Vec<_>>(),
        "pulled_datetime" => reports.iter().map(|r| r.pulled_datetime.clone()).collect::<Vec<_>>(),
    )
}

/// Pins column order and dtypes so store and batch line up for the union.
fn conform_report_columns(lf: LazyFrame) -> LazyFrame {
    let columns: Vec<Expr> = REPORT_COLUMNS
        .iter()
        .map(|name| match *name {
            "report_number" => col(*name).cast(DataType::Int64),
            other => col(other).cast(DataType::String),
        })
        .collect();
    lf.select(columns)
}

/// Reconciles the existing report store with a new batch: one row per
/// `report_number`, the one with the latest `pulled_datetime`.
pub fn merge_reports(store: LazyFrame, batch: LazyFrame) -> PolarsResult<LazyFrame> {
    merge_keep_latest(
        conform_report_columns(store),
        conform_report_columns(batch),
        &["report_number"],
        "pulled_datetime",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn line(number: i64, observed: &str, pulled: &str) -> String {
        format!(
            "{{\"REPORT_NUMBER\":{number},\"REPORT_CLASS\":\"Class A\",\
             \"OBSERVED\":\"{observed}\",\"COUNTY\":\"Skamania\",\"STATE\":\"Washington\",\
             \"SEASON\":\"Summer\",\"PULLED_DATETIME\":\"{pulled}\"}}"
        )
    }

    #[test]
    fn parses_uppercase_scraper_fields() {
        let input = format!("{}\n{}\n", line(1, "tall figure", "2024-01-01T00:00:00"),
            line(2, "large tracks", "2024-01-01T00:00:00"));
        let reports = parse_report_batch(Cursor::new(input)).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].report_number, Some(1));
        assert_eq!(reports[0].observed.as_deref(), Some("tall figure"));
        assert_eq!(reports[0].state.as_deref(), Some("Washington"));
        assert_eq!(reports[0].nearest_town, None);
    }

    #[test]
    fn skips_unkeyed_reports_and_blank_lines() {
        let input = format!(
            "{}\n\n{{\"OBSERVED\":\"no number here\"}}\n",
            line(7, "x", "2024-01-01T00:00:00")
        );
        let reports = parse_report_batch(Cursor::new(input)).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].report_number, Some(7));
    }

    #[test]
    fn invalid_json_fails_with_line_number() {
        let input = format!("{}\nnot json at all\n", line(7, "x", "2024-01-01T00:00:00"));
        let err = parse_report_batch(Cursor::new(input)).unwrap_err();

        assert!(matches!(err, ReportBatchError::Json { line: 2, .. }));
    }

    #[test]
    fn frame_uses_pinned_schema() {
        let reports = parse_report_batch(Cursor::new(line(1, "x", "2024-01-01T00:00:00"))).unwrap();
        let frame = reports_frame(&reports).unwrap();

        let names: Vec<&str> = frame.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, REPORT_COLUMNS);
    }

    #[test]
    fn latest_scrape_wins_per_report_number() {
        let store = reports_frame(
            &parse_report_batch(Cursor::new(format!(
                "{}\n{}\n",
                line(1, "old text", "2019-01-01T00:00:00"),
                line(2, "unchanged", "2019-01-01T00:00:00")
            )))
            .unwrap(),
        )
        .unwrap();
        let batch = reports_frame(
            &parse_report_batch(Cursor::new(line(1, "new text", "2024-06-01T00:00:00"))).unwrap(),
        )
        .unwrap();

        let merged = merge_reports(store.lazy(), batch.lazy())
            .unwrap()
            .sort(["report_number"], SortMultipleOptions::default())
            .collect()
            .unwrap();

        assert_eq!(merged.height(), 2);
        let observed = merged.column("observed").unwrap().str().unwrap();
        assert_eq!(observed.get(0), Some("new text"));
        assert_eq!(observed.get(1), Some("unchanged"));
    }
}
