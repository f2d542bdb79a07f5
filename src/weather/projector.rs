//! Flattens cached weather payloads into scalar daily-conditions columns.
//!
//! Cached payloads come from two API generations with different field names
//! (and, for precipitation type, different shapes). The projector reads both
//! through alias lists over loosely parsed JSON, so a payload that lacks a
//! field or carries it in an unexpected shape degrades to a null column
//! value instead of failing the row.

use polars::prelude::*;
use serde_json::Value;
use std::collections::HashMap;

/// Scalar daily conditions extracted from one weather payload. Every field
/// is optional; a payload may predate a field or omit it for the day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayConditions {
    pub summary: Option<String>,
    pub temperature_high: Option<f64>,
    pub temperature_low: Option<f64>,
    pub dew_point: Option<f64>,
    pub humidity: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub moon_phase: Option<f64>,
    pub precip_intensity: Option<f64>,
    pub precip_probability: Option<f64>,
    pub precip_type: Option<String>,
    pub pressure: Option<f64>,
    pub uv_index: Option<f64>,
    pub visibility: Option<f64>,
    pub wind_bearing: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl DayConditions {
    /// Parses a raw payload. Returns `None` when the payload is not JSON or
    /// has no daily block at all; field-level absences stay per-field nulls.
    pub fn from_payload(payload: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(payload).ok()?;
        let day = first_day(&value)?;
        Some(Self {
            summary: get_str(day, &["summary", "conditions"]),
            temperature_high: get_f64(day, &["temperatureHigh", "tempmax"]),
            temperature_low: get_f64(day, &["temperatureLow", "tempmin"]),
            dew_point: get_f64(day, &["dewPoint", "dew"]),
            humidity: get_f64(day, &["humidity"]),
            cloud_cover: get_f64(day, &["cloudCover", "cloudcover"]),
            moon_phase: get_f64(day, &["moonPhase", "moonphase"]),
            precip_intensity: get_f64(day, &["precipIntensity", "precip"]),
            precip_probability: get_f64(day, &["precipProbability", "precipprob"]),
            precip_type: get_str(day, &["precipType", "preciptype"]),
            pressure: get_f64(day, &["pressure"]),
            uv_index: get_f64(day, &["uvIndex", "uvindex"]),
            visibility: get_f64(day, &["visibility"]),
            wind_bearing: get_f64(day, &["windBearing", "winddir"]),
            wind_speed: get_f64(day, &["windSpeed", "windspeed"]),
        })
    }

    /// Midpoint of the daily high and low, when both are present.
    pub fn temperature_mid(&self) -> Option<f64> {
        match (self.temperature_low, self.temperature_high) {
            (Some(low), Some(high)) => Some(low + (high - low) / 2.0),
            _ => None,
        }
    }
}

/// The daily block of either payload generation: `days[0]` in the current
/// timeline format, `daily.data[0]` in the older one.
fn first_day(value: &Value) -> Option<&Value> {
    if let Some(day) = value.get("days").and_then(|d| d.get(0)) {
        return Some(day);
    }
    value
        .get("daily")
        .and_then(|d| d.get("data"))
        .and_then(|d| d.get(0))
}

fn get_f64(day: &Value, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| day.get(name).and_then(Value::as_f64))
}

/// String field lookup. The current format reports precipitation type as an
/// array of kinds; the first entry is taken.
fn get_str(day: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match day.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    })
}

/// Indexes a cache frame by `(geohash, date)` for row-wise projection. Rows
/// with a null payload, or a payload with no daily block, are skipped.
pub fn cache_index(cache: &DataFrame) -> PolarsResult<HashMap<(String, String), DayConditions>> {
    let cells = cache.column("geohash")?.str()?;
    let dates = cache.column("date")?.str()?;
    let payloads = cache.column("data")?.str()?;
    let mut index = HashMap::with_capacity(cache.height());
    for i in 0..cache.height() {
        if let (Some(cell), Some(date), Some(payload)) = (cells.get(i), dates.get(i), payloads.get(i))
        {
            if let Some(conditions) = DayConditions::from_payload(payload) {
                index.insert((cell.to_string(), date.to_string()), conditions);
            }
        }
    }
    Ok(index)
}

/// Appends the scalar weather columns to a joined frame, keyed on its
/// `geohash` and `date` columns. Rows without a cached payload get nulls
/// across all appended columns.
pub fn project_weather(
    mut joined: DataFrame,
    index: &HashMap<(String, String), DayConditions>,
) -> PolarsResult<DataFrame> {
    let cells = joined.column("geohash")?.str()?.clone();
    let dates = joined.column("date")?.str()?.clone();

    let mut summary: Vec<Option<String>> = Vec::with_capacity(joined.height());
    let mut temperature_high: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut temperature_mid: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut temperature_low: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut dew_point: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut humidity: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut cloud_cover: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut moon_phase: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut precip_intensity: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut precip_probability: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut precip_type: Vec<Option<String>> = Vec::with_capacity(joined.height());
    let mut pressure: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut uv_index: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut visibility: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut wind_bearing: Vec<Option<f64>> = Vec::with_capacity(joined.height());
    let mut wind_speed: Vec<Option<f64>> = Vec::with_capacity(joined.height());

    for i in 0..joined.height() {
        let conditions = match (cells.get(i), dates.get(i)) {
            (Some(cell), Some(date)) => index.get(&(cell.to_string(), date.to_string())),
            _ => None,
        };
        let c = conditions.cloned().unwrap_or_default();
        temperature_mid.push(c.temperature_mid());
        summary.push(c.summary);
        temperature_high.push(c.temperature_high);
        temperature_low.push(c.temperature_low);
        dew_point.push(c.dew_point);
        humidity.push(c.humidity);
        cloud_cover.push(c.cloud_cover);
        moon_phase.push(c.moon_phase);
        precip_intensity.push(c.precip_intensity);
        precip_probability.push(c.precip_probability);
        precip_type.push(c.precip_type);
        pressure.push(c.pressure);
        uv_index.push(c.uv_index);
        visibility.push(c.visibility);
        wind_bearing.push(c.wind_bearing);
        wind_speed.push(c.wind_speed);
    }

    joined.with_column(Series::new("summary".into(), summary))?;
    joined.with_column(Series::new("temperature_high".into(), temperature_high))?;
    joined.with_column(Series::new("temperature_mid".into(), temperature_mid))?;
    joined.with_column(Series::new("temperature_low".into(), temperature_low))?;
    joined.with_column(Series::new("dew_point".into(), dew_point))?;
    joined.with_column(Series::new("humidity".into(), humidity))?;
    joined.with_column(Series::new("cloud_cover".into(), cloud_cover))?;
    joined.with_column(Series::new("moon_phase".into(), moon_phase))?;
    joined.with_column(Series::new("precip_intensity".into(), precip_intensity))?;
    joined.with_column(Series::new("precip_probability".into(), precip_probability))?;
    joined.with_column(Series::new("precip_type".into(), precip_type))?;
    joined.with_column(Series::new("pressure".into(), pressure))?;
    joined.with_column(Series::new("uv_index".into(), uv_index))?;
    joined.with_column(Series::new("visibility".into(), visibility))?;
    joined.with_column(Series::new("wind_bearing".into(), wind_bearing))?;
    joined.with_column(Series::new("wind_speed".into(), wind_speed))?;
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMELINE_PAYLOAD: &str = r#"{
        "days": [{
            "conditions": "Partially cloudy",
            "tempmax": 62.0,
            "tempmin": 42.0,
            "dew": 38.5,
            "humidity": 71.2,
            "cloudcover": 44.0,
            "moonphase": 0.25,
            "precip": 0.08,
            "precipprob": 30.0,
            "preciptype": ["rain", "snow"],
            "pressure": 1016.3,
            "uvindex": 5.0,
            "visibility": 9.9,
            "winddir": 270.0,
            "windspeed": 12.4
        }]
    }"#;

    const LEGACY_PAYLOAD: &str = r#"{
        "daily": {
            "data": [{
                "summary": "Light rain in the morning.",
                "temperatureHigh": 55.0,
                "temperatureLow": 45.0,
                "dewPoint": 41.0,
                "humidity": 0.82,
                "cloudCover": 0.9,
                "moonPhase": 0.5,
                "precipIntensity": 0.01,
                "precipProbability": 0.6,
                "precipType": "rain",
                "pressure": 1009.0,
                "uvIndex": 2,
                "visibility": 6.2,
                "windBearing": 180,
                "windSpeed": 8.1
            }]
        }
    }"#;

    #[test]
    fn reads_the_timeline_payload_format() {
        let c = DayConditions::from_payload(TIMELINE_PAYLOAD).unwrap();

        assert_eq!(c.summary.as_deref(), Some("Partially cloudy"));
        assert_eq!(c.temperature_high, Some(62.0));
        assert_eq!(c.temperature_low, Some(42.0));
        assert_eq!(c.precip_type.as_deref(), Some("rain"));
        assert_eq!(c.wind_bearing, Some(270.0));
    }

    #[test]
    fn reads_the_legacy_payload_format() {
        let c = DayConditions::from_payload(LEGACY_PAYLOAD).unwrap();

        assert_eq!(c.summary.as_deref(), Some("Light rain in the morning."));
        assert_eq!(c.temperature_high, Some(55.0));
        assert_eq!(c.precip_type.as_deref(), Some("rain"));
        assert_eq!(c.uv_index, Some(2.0));
    }

    #[test]
    fn temperature_mid_is_the_midpoint() {
        let c = DayConditions::from_payload(LEGACY_PAYLOAD).unwrap();
        assert_eq!(c.temperature_mid(), Some(50.0));
    }

    #[test]
    fn temperature_mid_needs_both_ends() {
        let c = DayConditions {
            temperature_high: Some(60.0),
            ..Default::default()
        };
        assert_eq!(c.temperature_mid(), None);
    }

    #[test]
    fn missing_fields_stay_null() {
        let c = DayConditions::from_payload(r#"{"days":[{"tempmax": 70.0}]}"#).unwrap();

        assert_eq!(c.temperature_high, Some(70.0));
        assert_eq!(c.summary, None);
        assert_eq!(c.precip_type, None);
    }

    #[test]
    fn payload_without_daily_block_is_rejected() {
        assert_eq!(DayConditions::from_payload(r#"{"days": []}"#), None);
        assert_eq!(DayConditions::from_payload("not json"), None);
    }

    #[test]
    fn cache_index_skips_failed_pulls() {
        let cache = df!(
            "geohash" => ["aaa", "bbb"],
            "date" => ["2020-01-01", "2020-01-02"],
            "date_pulled" => ["2024-01-01", "2024-01-01"],
            "data" => [Some(TIMELINE_PAYLOAD), None],
        )
        .unwrap();

        let index = cache_index(&cache).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.contains_key(&("aaa".to_string(), "2020-01-01".to_string())));
    }

    #[test]
    fn projection_fills_matched_rows_and_nulls_the_rest() {
        let cache = df!(
            "geohash" => ["aaa"],
            "date" => ["2020-01-01"],
            "date_pulled" => ["2024-01-01"],
            "data" => [Some(TIMELINE_PAYLOAD)],
        )
        .unwrap();
        let index = cache_index(&cache).unwrap();
        let joined = df!(
            "number" => [1i64, 2],
            "geohash" => [Some("aaa"), None],
            "date" => [Some("2020-01-01"), None],
        )
        .unwrap();

        let projected = project_weather(joined, &index).unwrap();

        assert_eq!(projected.width(), 3 + 16);
        let highs = projected.column("temperature_high").unwrap().f64().unwrap();
        assert_eq!(highs.get(0), Some(62.0));
        assert_eq!(highs.get(1), None);
        let mids = projected.column("temperature_mid").unwrap().f64().unwrap();
        assert_eq!(mids.get(0), Some(52.0));
        let summaries = projected.column("summary").unwrap().str().unwrap();
        assert_eq!(summaries.get(1), None);
    }
}
