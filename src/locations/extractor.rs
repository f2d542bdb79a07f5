//! Parses a batch of place-marker nodes into validated geocoded locations.
//!
//! The source document associates fields with a record purely by position:
//! titles, classifications, timestamps and look-at coordinates are each
//! collected by an independent pass over the document, and row `i` of every
//! sequence is assumed to describe the same placemark. Because of that, any
//! length mismatch between the sequences aborts the whole batch, since one
//! missing field would silently shift every later record.

use crate::locations::error::ExtractError;
use chrono::NaiveDate;
use geohash::Coord;
use log::info;
use polars::prelude::*;
use roxmltree::{Document, Node};

/// Geohash precision used for the spatial cell id. At this resolution a cell
/// is a few square metres, so the cell key is effectively one key per
/// reported sighting location.
pub const CELL_PRECISION: usize = 10;

/// One geocoded sighting location, keyed by the report number embedded in the
/// placemark title.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedLocation {
    pub number: i64,
    pub title: String,
    pub classification: String,
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub geohash: String,
    pub extraction_date: NaiveDate,
}

fn elements<'a, 'b: 'a>(node: Node<'a, 'b>, tag: &'a str) -> impl Iterator<Item = Node<'a, 'b>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == tag)
}

/// Collects the text of every `Placemark/<outer>/<inner>` element, in
/// document order. Matches on local tag names so a namespaced document
/// behaves the same as a plain one.
fn collect_texts(document: &Document, outer: &str, inner: &str, trim: bool) -> Vec<String> {
    let mut out = Vec::new();
    for placemark in document
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Placemark")
    {
        for outer_node in elements(placemark, outer) {
            for inner_node in elements(outer_node, inner) {
                let text = inner_node.text().unwrap_or("");
                out.push(if trim {
                    text.trim().to_string()
                } else {
                    text.to_string()
                });
            }
        }
    }
    out
}

fn check_aligned(
    left: &'static str,
    left_count: usize,
    right: &'static str,
    right_count: usize,
) -> Result<(), ExtractError> {
    if left_count != right_count {
        return Err(ExtractError::StructuralMismatch {
            left,
            left_count,
            right,
            right_count,
        });
    }
    Ok(())
}

/// Extracts the report number from a title of the form `Report <digits>: …`.
fn parse_report_number(title: &str) -> Option<i64> {
    let start = title.find("Report ")? + "Report ".len();
    let rest = &title[start..];
    let colon = rest.find(':')?;
    let digits = &rest[..colon];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_coordinate(value: &str) -> Result<f64, ExtractError> {
    value
        .trim()
        .parse()
        .map_err(|source| ExtractError::CoordinateParse {
            value: value.to_string(),
            source,
        })
}

/// Runs the four positional passes over the place-marker document, validates
/// their alignment and yields one [`GeocodedLocation`] per placemark, tagged
/// with the date of this extraction run.
///
/// # Errors
///
/// * [`ExtractError::StructuralMismatch`] when any two sequences disagree in
///   length. This is fatal for the batch, never a per-row skip.
/// * [`ExtractError::UnparsableLabel`] when a title carries no report number.
/// * [`ExtractError::CoordinateParse`] / [`ExtractError::CellDerivation`] for
///   malformed coordinates.
pub fn extract_locations(
    doc: &str,
    extraction_date: NaiveDate,
) -> Result<Vec<GeocodedLocation>, ExtractError> {
    let document = Document::parse(doc)?;

    info!("Extracting report titles.");
    let titles = collect_texts(&document, "description", "b", true);

    info!("Extracting report classifications.");
    let classifications = collect_texts(&document, "description", "a", false);
    check_aligned(
        "titles",
        titles.len(),
        "classifications",
        classifications.len(),
    )?;

    info!("Extracting report timestamps.");
    let timestamps = collect_texts(&document, "TimeStamp", "when", true);
    check_aligned("titles", titles.len(), "timestamps", timestamps.len())?;

    info!("Extracting report latitudes.");
    let latitudes = collect_texts(&document, "LookAt", "latitude", true);
    check_aligned("titles", titles.len(), "latitudes", latitudes.len())?;

    info!("Extracting report longitudes.");
    let longitudes = collect_texts(&document, "LookAt", "longitude", true);
    check_aligned("titles", titles.len(), "longitudes", longitudes.len())?;

    let mut rows = Vec::with_capacity(titles.len());
    for ((((title, classification), timestamp), lat_raw), lon_raw) in titles
        .into_iter()
        .zip(classifications)
        .zip(timestamps)
        .zip(latitudes)
        .zip(longitudes)
    {
        let number =
            parse_report_number(&title).ok_or_else(|| ExtractError::UnparsableLabel {
                title: title.clone(),
            })?;
        let latitude = parse_coordinate(&lat_raw)?;
        let longitude = parse_coordinate(&lon_raw)?;
        let geohash = geohash::encode(
            Coord {
                x: longitude,
                y: latitude,
            },
            CELL_PRECISION,
        )
        .map_err(|source| ExtractError::CellDerivation {
            latitude,
            longitude,
            source,
        })?;
        rows.push(GeocodedLocation {
            number,
            title,
            classification,
            timestamp,
            latitude,
            longitude,
            geohash,
            extraction_date,
        });
    }
    info!("Extracted {} geocoded locations.", rows.len());
    Ok(rows)
}

/// Assembles extracted rows into the location store schema.
pub fn locations_frame(rows: &[GeocodedLocation]) -> PolarsResult<DataFrame> {
    df!(
        "number" => rows.iter().map(|r| r.number).collect::<Vec<_>>(),
        "title" => rows.iter().map(|r| r.title.clone()).collect::<Vec<_>>(),
        "classification" => rows.iter().map(|r| r.classification.clone()).collect::<Vec<_>>(),
        "timestamp" => rows.iter().map(|r| r.timestamp.clone()).collect::<Vec<_>>(),
        "latitude" => rows.iter().map(|r| r.latitude).collect::<Vec<_>>(),
        "longitude" => rows.iter().map(|r| r.longitude).collect::<Vec<_>>(),
        "geohash" => rows.iter().map(|r| r.geohash.clone()).collect::<Vec<_>>(),
        "extraction_date" => rows.iter()
            .map(|r| r.extraction_date.format("%Y-%m-%d").to_string())
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn placemark(number: i64, with_timestamp: bool) -> String {
        let timestamp = if with_timestamp {
            "<TimeStamp><when>2004-06-15T00:00:00Z</when></TimeStamp>"
        } else {
            ""
        };
        format!(
            "<Placemark>\
               <description><b> Report {number}: Howls heard near the ridge </b>\
               <a>Class A</a></description>\
               {timestamp}\
               <LookAt><latitude>45.0</latitude><longitude>-122.0</longitude></LookAt>\
             </Placemark>"
        )
    }

    fn document(placemarks: &[String]) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <kml xmlns=\"http://www.opengis.net/kml/2.2\"><Document>{}</Document></kml>",
            placemarks.concat()
        )
    }

    #[test]
    fn extracts_one_row_per_placemark() {
        let doc = document(&[placemark(1234, true), placemark(5678, true)]);
        let rows = extract_locations(&doc, run_date()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, 1234);
        assert_eq!(rows[1].number, 5678);
        assert_eq!(rows[0].title, "Report 1234: Howls heard near the ridge");
        assert_eq!(rows[0].classification, "Class A");
        assert_eq!(rows[0].timestamp, "2004-06-15T00:00:00Z");
        assert_eq!(rows[0].latitude, 45.0);
        assert_eq!(rows[0].longitude, -122.0);
        assert_eq!(rows[0].extraction_date, run_date());
    }

    #[test]
    fn derives_cell_at_fixed_precision() {
        let doc = document(&[placemark(1, true)]);
        let rows = extract_locations(&doc, run_date()).unwrap();

        let expected = geohash::encode(Coord { x: -122.0, y: 45.0 }, CELL_PRECISION).unwrap();
        assert_eq!(rows[0].geohash, expected);
        assert_eq!(rows[0].geohash.len(), CELL_PRECISION);
    }

    #[test]
    fn mismatched_sequences_abort_the_batch() {
        // Three placemarks, one missing its timestamp: 3 titles vs 2 timestamps.
        let doc = document(&[placemark(1, true), placemark(2, false), placemark(3, true)]);
        let err = extract_locations(&doc, run_date()).unwrap_err();

        match err {
            ExtractError::StructuralMismatch {
                left,
                left_count,
                right,
                right_count,
            } => {
                assert_eq!(left, "titles");
                assert_eq!(left_count, 3);
                assert_eq!(right, "timestamps");
                assert_eq!(right_count, 2);
            }
            other => panic!("expected StructuralMismatch, got {other:?}"),
        }
    }

    #[test]
    fn title_without_report_number_aborts_the_batch() {
        let bad = "<Placemark>\
                     <description><b>Campfire story, no number</b><a>Class B</a></description>\
                     <TimeStamp><when>2001-01-01T00:00:00Z</when></TimeStamp>\
                     <LookAt><latitude>44.0</latitude><longitude>-121.0</longitude></LookAt>\
                   </Placemark>";
        let doc = document(&[bad.to_string()]);
        let err = extract_locations(&doc, run_date()).unwrap_err();

        assert!(matches!(err, ExtractError::UnparsableLabel { title } if title.contains("Campfire")));
    }

    #[test]
    fn malformed_coordinate_aborts_the_batch() {
        let bad = "<Placemark>\
                     <description><b>Report 9: x</b><a>Class A</a></description>\
                     <TimeStamp><when>2001-01-01T00:00:00Z</when></TimeStamp>\
                     <LookAt><latitude>north-ish</latitude><longitude>-121.0</longitude></LookAt>\
                   </Placemark>";
        let doc = document(&[bad.to_string()]);
        let err = extract_locations(&doc, run_date()).unwrap_err();

        assert!(matches!(err, ExtractError::CoordinateParse { value, .. } if value == "north-ish"));
    }

    #[test]
    fn report_number_parsing() {
        assert_eq!(parse_report_number("Report 1234: Something"), Some(1234));
        assert_eq!(parse_report_number("  Report 7: x"), Some(7));
        assert_eq!(parse_report_number("Report : no digits"), None);
        assert_eq!(parse_report_number("Report 12a4: mixed"), None);
        assert_eq!(parse_report_number("No marker at all"), None);
        assert_eq!(parse_report_number("Report 55 missing colon"), None);
    }

    #[test]
    fn frame_has_store_schema() {
        let doc = document(&[placemark(1, true)]);
        let rows = extract_locations(&doc, run_date()).unwrap();
        let frame = locations_frame(&rows).unwrap();

        assert_eq!(frame.height(), 1);
        let names: Vec<&str> = frame.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            [
                "number",
                "title",
                "classification",
                "timestamp",
                "latitude",
                "longitude",
                "geohash",
                "extraction_date"
            ]
        );
    }
}
