//! # Data Sources
//!
//! Fetching a weather reading from a provider.
//!
//! A data source runs inside the background fetch worker: it performs the
//! blocking network I/O and parsing, and hands a finished reading back
//! through the scheduler's mailbox. Providers are selected by name through
//! the `library` configuration option.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::observation::{Trend, WeatherReading, COMPASS_HEADINGS};
use super::parser::FeedParser;
use crate::config::Config;
use crate::error::{Result, VaneBridgeError};

/// Public JSON endpoint of the Buienradar feed
pub const BUIENRADAR_URL: &str = "https://json.buienradar.nl";

/// A provider of weather readings for one station
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Provider name as used in configuration
    fn name(&self) -> &'static str;

    /// Retrieve and parse one reading
    async fn fetch(&self, station_id: u32) -> Result<WeatherReading>;
}

/// Select a provider by its configured name
///
/// # Errors
///
/// Returns `Config` if the name matches no known provider.
pub fn source_by_name(config: &Config) -> Result<Arc<dyn DataSource>> {
    match config.source.library.as_str() {
        "buienradar" => Ok(Arc::new(BuienradarSource::new(config)?)),
        "test" => Ok(Arc::new(TestSource::new())),
        other => Err(VaneBridgeError::Config(format!(
            "data provider '{}' not found",
            other
        ))),
    }
}

/// Live readings from the Buienradar JSON feed
pub struct BuienradarSource {
    client: reqwest::Client,
    url: String,
    /// The parser carries the rolling trend history across fetches
    parser: Mutex<FeedParser>,
}

impl BuienradarSource {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_url(config, BUIENRADAR_URL.to_string())
    }

    /// Point the source at a non-default endpoint
    pub fn with_url(config: &Config, url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.source.timeout))
            .build()
            .map_err(|e| VaneBridgeError::Fetch(e.to_string()))?;

        Ok(Self {
            client,
            url,
            parser: Mutex::new(FeedParser::new(config)?),
        })
    }
}

#[async_trait]
impl DataSource for BuienradarSource {
    fn name(&self) -> &'static str {
        "buienradar"
    }

    async fn fetch(&self, station_id: u32) -> Result<WeatherReading> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| VaneBridgeError::Fetch(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| VaneBridgeError::Fetch(e.to_string()))?;
        debug!(station_id, bytes = body.len(), "feed document retrieved");

        let mut parser = self
            .parser
            .lock()
            .map_err(|_| VaneBridgeError::Fetch("feed parser lock poisoned".to_string()))?;
        parser.parse(&body, station_id)
    }
}

/// Deterministic readings for exercising the gauge without a network
///
/// Each fetch advances a counter and derives a predictable sweep: the
/// direction dial steps through all sixteen headings while the speed
/// needles sweep their range in opposite directions. Air pressure is left
/// absent so the pressure error flag stays visibly raised.
pub struct TestSource {
    counter: AtomicU32,
}

impl TestSource {
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }
}

impl Default for TestSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for TestSource {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn fetch(&self, station_id: u32) -> Result<WeatherReading> {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);

        let mut reading = WeatherReading::empty(station_id);
        reading.wind_direction = Some(COMPASS_HEADINGS[(count % 16) as usize]);
        reading.wind_speed = Some((count % 64) as f64);
        reading.wind_speed_max = Some((63 - count % 64) as f64);
        reading.temperature = Some((count % 40) as f64 - 10.0);
        reading.apparent_temperature = reading.temperature;
        reading.humidity = Some((count % 101) as f64);
        reading.trend = Some(Trend::Steady);
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::observation::CompassDirection;

    const CONFIG_TEXT: &str = r#"
[gauge]

[source]
library = "test"

[stations]
numbers = [6320]

[bits]
bit_0 = "wind_direction"
bit_1 = "wind_speed"
"#;

    #[tokio::test]
    async fn test_source_sweeps_deterministically() {
        let source = TestSource::new();

        let first = source.fetch(6320).await.unwrap();
        assert_eq!(first.wind_direction, Some(CompassDirection::N));
        assert_eq!(first.wind_speed, Some(0.0));
        assert_eq!(first.wind_speed_max, Some(63.0));
        assert_eq!(first.air_pressure, None);

        let second = source.fetch(6320).await.unwrap();
        assert_eq!(second.wind_direction, Some(CompassDirection::Nno));
        assert_eq!(second.wind_speed, Some(1.0));
        assert_eq!(second.wind_speed_max, Some(62.0));
    }

    #[tokio::test]
    async fn test_factory_selects_by_name() {
        let config = Config::parse(CONFIG_TEXT).unwrap();
        assert_eq!(source_by_name(&config).unwrap().name(), "test");

        let live = Config::parse(&CONFIG_TEXT.replace("\"test\"", "\"buienradar\"")).unwrap();
        assert_eq!(source_by_name(&live).unwrap().name(), "buienradar");
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = Config::parse(&CONFIG_TEXT.replace("\"test\"", "\"knmi\"")).unwrap();
        assert!(matches!(
            source_by_name(&config),
            Err(VaneBridgeError::Config(_))
        ));
    }
}
