//! # Feed Parser
//!
//! Parses the raw station feed document into typed weather readings.
//!
//! The feed is a JSON document listing one measurement object per station
//! (`actual.stationmeasurements`). Stations routinely omit fields, so the
//! parser is deliberately lenient: only a structurally unparseable document
//! is an error, everything below that granularity degrades to "field
//! absent". Unparsable numeric text likewise yields an absent field.
//!
//! The parser also owns the derived quantities: apparent temperature (feed
//! value when present, wind chill otherwise) and the trend of the
//! configured trend field against a short rolling history.

use chrono::NaiveDateTime;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

use super::observation::{wind_chill, CompassDirection, FieldKey, FieldValue, Trend, WeatherReading};
use crate::config::Config;
use crate::error::{Result, VaneBridgeError};

/// Entries retained for trend derivation (oldest evicted first)
pub const TREND_HISTORY_LEN: usize = 12;

/// Feed timestamp layout (local time, no offset)
const FEED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Stateful parser for the station feed
///
/// The rolling trend history lives here, so one parser instance should be
/// reused across fetches.
#[derive(Debug)]
pub struct FeedParser {
    trend_field: FieldKey,
    trend_tolerance: f64,
    history: VecDeque<f64>,
}

impl FeedParser {
    /// Build a parser from the configured trend options
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_trend(
            config.trend_field()?,
            config.source.trend_tolerance,
        ))
    }

    /// Build a parser with explicit trend options
    pub fn with_trend(trend_field: FieldKey, trend_tolerance: f64) -> Self {
        Self {
            trend_field,
            trend_tolerance,
            history: VecDeque::with_capacity(TREND_HISTORY_LEN),
        }
    }

    /// All station identifiers mentioned in the feed
    ///
    /// Used for discovery and validation, never for selection.
    pub fn station_codes(raw: &str) -> Result<Vec<u32>> {
        let measurements = parse_measurements(raw)?;

        let mut codes = Vec::with_capacity(measurements.len());
        for measurement in measurements {
            if let Some(id) = station_id_of(&measurement) {
                if !codes.contains(&id) {
                    codes.push(id);
                }
            }
        }
        Ok(codes)
    }

    /// Parse one station's reading out of the feed
    ///
    /// # Errors
    ///
    /// Returns `FeedFormat` only if the document itself cannot be parsed;
    /// a station or field missing from an otherwise well-formed document
    /// produces absent fields instead.
    pub fn parse(&mut self, raw: &str, station_id: u32) -> Result<WeatherReading> {
        let measurements = parse_measurements(raw)?;

        let mut reading = WeatherReading::empty(station_id);

        let Some(station) = measurements
            .iter()
            .find(|measurement| station_id_of(measurement) == Some(station_id))
        else {
            debug!(station_id, "station not present in feed");
            return Ok(reading);
        };

        reading.wind_direction = text(station, "winddirection")
            .as_deref()
            .and_then(CompassDirection::from_code);
        reading.wind_speed = number(station, "windspeed");
        reading.wind_speed_max = number(station, "windgusts");
        reading.wind_speed_bft = number(station, "windspeedBft");
        reading.air_pressure = number(station, "airpressure");
        reading.temperature = number(station, "temperature");
        reading.ground_temperature = number(station, "groundtemperature");
        reading.humidity = number(station, "humidity");
        reading.rain_mm_per_hour =
            number(station, "rainFallLastHour").or_else(|| number(station, "precipitation"));
        reading.sight_distance = number(station, "visibility");
        reading.station_name = text(station, "stationname");
        reading.latitude = number(station, "lat");
        reading.longitude = number(station, "lon");
        reading.observed_at = text(station, "timestamp").and_then(|raw_time| {
            NaiveDateTime::parse_from_str(&raw_time, FEED_TIME_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        });

        reading.apparent_temperature = number(station, "feeltemperature").or_else(|| {
            match (reading.wind_speed, reading.temperature) {
                (Some(wind_speed), Some(temperature)) => {
                    Some(wind_chill(wind_speed, temperature))
                }
                _ => None,
            }
        });

        reading.trend = self.derive_trend(&reading);

        Ok(reading)
    }

    /// Compare the trend field's new value against the oldest retained
    /// history entry, then push the new value
    ///
    /// A missing trend field leaves the history untouched and the trend
    /// absent.
    fn derive_trend(&mut self, reading: &WeatherReading) -> Option<Trend> {
        let FieldValue::Number(value) = reading.field(self.trend_field) else {
            return None;
        };

        let trend = match self.history.front() {
            None => Trend::Steady,
            Some(&oldest) => {
                let delta = value - oldest;
                if delta.abs() <= self.trend_tolerance {
                    Trend::Steady
                } else if delta > 0.0 {
                    Trend::Rising
                } else {
                    Trend::Falling
                }
            }
        };

        self.history.push_back(value);
        if self.history.len() > TREND_HISTORY_LEN {
            self.history.pop_front();
        }

        Some(trend)
    }
}

/// Structural extraction of the measurement list
fn parse_measurements(raw: &str) -> Result<Vec<Value>> {
    let document: Value = serde_json::from_str(raw)
        .map_err(|e| VaneBridgeError::FeedFormat(format!("malformed feed document: {}", e)))?;

    document
        .pointer("/actual/stationmeasurements")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| {
            VaneBridgeError::FeedFormat("feed carries no station measurements".to_string())
        })
}

fn station_id_of(measurement: &Value) -> Option<u32> {
    let id = measurement.get("stationid")?;
    match id {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Lenient numeric field lookup: numbers pass through, numeric strings are
/// parsed, anything else is absent
fn number(measurement: &Value, key: &str) -> Option<f64> {
    match measurement.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(measurement: &Value, key: &str) -> Option<String> {
    measurement
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{
        "actual": {
            "sunrise": "2024-05-01T06:14:00",
            "stationmeasurements": [
                {
                    "stationid": 6320,
                    "stationname": "Meetstation Goes",
                    "lat": 51.53,
                    "lon": 3.9,
                    "timestamp": "2024-05-01T10:20:00",
                    "winddirection": "ZW",
                    "windspeed": 5.0,
                    "windgusts": 8.2,
                    "windspeedBft": 3,
                    "airpressure": 1015.3,
                    "temperature": 15.0,
                    "groundtemperature": 14.8,
                    "humidity": 82,
                    "precipitation": 0.2,
                    "visibility": 28300
                },
                {
                    "stationid": 6308,
                    "stationname": "Meetstation Cadzand",
                    "timestamp": "2024-05-01T10:20:00",
                    "winddirection": "W",
                    "windspeed": 3.61,
                    "temperature": 16.4,
                    "feeltemperature": 16.4
                }
            ]
        }
    }"#;

    fn parser() -> FeedParser {
        FeedParser::with_trend(FieldKey::AirPressure, 0.0)
    }

    #[test]
    fn test_parse_station_fields() {
        let reading = parser().parse(FEED, 6320).unwrap();

        assert_eq!(reading.station_id, 6320);
        assert_eq!(reading.wind_speed, Some(5.0));
        assert_eq!(reading.temperature, Some(15.0));
        assert_eq!(reading.wind_direction, Some(CompassDirection::Zw));
        assert_eq!(reading.wind_speed_max, Some(8.2));
        assert_eq!(reading.wind_speed_bft, Some(3.0));
        assert_eq!(reading.air_pressure, Some(1015.3));
        assert_eq!(reading.humidity, Some(82.0));
        assert_eq!(reading.rain_mm_per_hour, Some(0.2));
        assert_eq!(reading.sight_distance, Some(28300.0));
        assert_eq!(reading.station_name.as_deref(), Some("Meetstation Goes"));
        assert!(!reading.data_unavailable);
    }

    #[test]
    fn test_stations_parse_independently() {
        let mut parser = parser();

        let goes = parser.parse(FEED, 6320).unwrap();
        let cadzand = parser.parse(FEED, 6308).unwrap();

        assert_eq!(goes.wind_speed, Some(5.0));
        assert_eq!(cadzand.wind_speed, Some(3.61));
        assert_eq!(cadzand.temperature, Some(16.4));
        // Fields the second station does not report stay absent
        assert_eq!(cadzand.air_pressure, None);
        assert_eq!(cadzand.humidity, None);
    }

    #[test]
    fn test_apparent_temperature_warm_weather_passthrough() {
        // 15 degrees at 5 m/s is above the chill activation threshold
        let reading = parser().parse(FEED, 6320).unwrap();
        assert_eq!(reading.apparent_temperature, Some(15.0));
    }

    #[test]
    fn test_apparent_temperature_prefers_feed_value() {
        let reading = parser().parse(FEED, 6308).unwrap();
        assert_eq!(reading.apparent_temperature, Some(16.4));
    }

    #[test]
    fn test_apparent_temperature_from_wind_chill() {
        let feed = r#"{"actual": {"stationmeasurements": [
            {"stationid": 6320, "windspeed": 5.0, "temperature": 0.0}
        ]}}"#;

        let reading = parser().parse(feed, 6320).unwrap();
        let apparent = reading.apparent_temperature.unwrap();
        assert!((apparent - -4.94).abs() < 0.1);
    }

    #[test]
    fn test_station_codes() {
        let codes = FeedParser::station_codes(FEED).unwrap();
        assert_eq!(codes, vec![6320, 6308]);
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(matches!(
            parser().parse("<rss version=\"2.0\">", 6320),
            Err(VaneBridgeError::FeedFormat(_))
        ));
        assert!(matches!(
            parser().parse("{\"actual\": {}}", 6320),
            Err(VaneBridgeError::FeedFormat(_))
        ));
    }

    #[test]
    fn test_missing_station_yields_empty_reading() {
        let reading = parser().parse(FEED, 6275).unwrap();
        assert_eq!(reading.station_id, 6275);
        assert_eq!(reading.wind_speed, None);
        assert!(!reading.data_unavailable);
    }

    #[test]
    fn test_unparsable_numeric_text_is_absent() {
        let feed = r#"{"actual": {"stationmeasurements": [
            {"stationid": 6320, "windspeed": "-", "temperature": "12.5"}
        ]}}"#;

        let reading = parser().parse(feed, 6320).unwrap();
        assert_eq!(reading.wind_speed, None);
        assert_eq!(reading.temperature, Some(12.5));
    }

    #[test]
    fn test_unrecognized_compass_code_is_absent() {
        let feed = r#"{"actual": {"stationmeasurements": [
            {"stationid": 6320, "winddirection": "VAR"}
        ]}}"#;

        let reading = parser().parse(feed, 6320).unwrap();
        assert_eq!(reading.wind_direction, None);
    }

    #[test]
    fn test_observation_timestamp() {
        let reading = parser().parse(FEED, 6320).unwrap();
        let observed = reading.observed_at.unwrap();
        assert_eq!(observed.to_rfc3339(), "2024-05-01T10:20:00+00:00");
    }

    #[test]
    fn test_trend_rising_against_oldest_entry() {
        let mut parser = parser();
        parser.history = VecDeque::from([1000.0, 1000.0]);

        let reading = parser.parse(FEED, 6320).unwrap();
        assert_eq!(reading.trend, Some(Trend::Rising));
        assert_eq!(parser.history, VecDeque::from([1000.0, 1000.0, 1015.3]));
    }

    #[test]
    fn test_trend_steady_on_identical_values() {
        let mut parser = parser();
        parser.history = VecDeque::from([1015.3]);

        let reading = parser.parse(FEED, 6320).unwrap();
        assert_eq!(reading.trend, Some(Trend::Steady));
    }

    #[test]
    fn test_trend_falling() {
        let mut parser = parser();
        parser.history = VecDeque::from([1020.0, 1010.0]);

        let reading = parser.parse(FEED, 6320).unwrap();
        assert_eq!(reading.trend, Some(Trend::Falling));
    }

    #[test]
    fn test_trend_within_tolerance_is_steady() {
        let mut parser = FeedParser::with_trend(FieldKey::AirPressure, 0.5);
        parser.history = VecDeque::from([1015.0]);

        let reading = parser.parse(FEED, 6320).unwrap();
        assert_eq!(reading.trend, Some(Trend::Steady));
    }

    #[test]
    fn test_trend_first_parse_is_steady() {
        let reading = parser().parse(FEED, 6320).unwrap();
        assert_eq!(reading.trend, Some(Trend::Steady));
    }

    #[test]
    fn test_trend_history_evicts_oldest() {
        let mut parser = parser();
        for i in 0..TREND_HISTORY_LEN {
            parser.history.push_back(i as f64);
        }

        parser.parse(FEED, 6320).unwrap();
        assert_eq!(parser.history.len(), TREND_HISTORY_LEN);
        // The oldest entry (0.0) was evicted after the comparison
        assert_eq!(parser.history.front(), Some(&1.0));
        assert_eq!(parser.history.back(), Some(&1015.3));
    }

    #[test]
    fn test_trend_absent_when_field_missing() {
        let mut parser = parser();
        let reading = parser.parse(FEED, 6308).unwrap();

        // Station 6308 reports no air pressure
        assert_eq!(reading.trend, None);
        assert!(parser.history.is_empty());
    }
}
