//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The configuration carries everything the pipeline needs: the gauge bus
//! parameters, the data source options, the selectable stations, and the
//! bit-field descriptor table that fixes the frame layout. The descriptor
//! table is the single source of truth for byte order and error-flag order;
//! nothing else in the crate hardcodes field positions.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, VaneBridgeError};
use crate::feed::observation::FieldKey;
use crate::frame::protocol::{CHANGE_MASK_BITS, STATUS_FLAG_BITS};

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub gauge: GaugeConfig,
    pub source: SourceConfig,
    pub stations: StationConfig,
    bit_fields: Vec<BitField>,
}

/// Raw deserialization target; bit descriptors are parsed out of the
/// string map afterwards
#[derive(Debug, Deserialize)]
struct RawConfig {
    gauge: GaugeConfig,
    source: SourceConfig,
    stations: StationConfig,
    bits: HashMap<String, String>,
}

/// Gauge bus configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GaugeConfig {
    #[serde(default = "default_channel")]
    pub channel: u8,

    /// Baud rate of the gauge serial link
    #[serde(default = "default_frequency")]
    pub frequency: u32,

    #[serde(default)]
    pub extended_error_mode: bool,

    #[serde(default = "default_display")]
    pub display: String,

    /// Send the predictable test pattern instead of weather data
    #[serde(default)]
    pub test: bool,
}

/// Data source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_library")]
    pub library: String,

    /// Seconds between feed fetches
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Seconds per send-loop cycle
    #[serde(default = "default_sleep_time")]
    pub sleep_time: f64,

    /// Fetch timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Field whose history drives the trend derivation
    #[serde(default = "default_trend_field")]
    pub trend_field: String,

    /// Dead-band within which the trend reports steady
    #[serde(default = "default_trend_tolerance")]
    pub trend_tolerance: f64,
}

/// Station selection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    /// Number of physical selector pins
    #[serde(default = "default_pins")]
    pub pins: u8,

    /// Selectable station identifiers; selector value i picks numbers[i]
    pub numbers: Vec<u32>,
}

/// One entry of the bit-field descriptor table
#[derive(Debug, Clone, PartialEq)]
pub struct BitField {
    pub key: FieldKey,
    /// Present only on the quantized numeric range descriptor
    pub quantized: Option<QuantizedRange>,
}

/// The five-component quantized descriptor, stored verbatim
///
/// Numeric interpretation happens in the frame encoder; this layer only
/// does structural extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedRange {
    pub length: String,
    pub min: String,
    pub max: String,
    pub step: String,
}

// Default value functions
fn default_channel() -> u8 { 0 }
fn default_frequency() -> u32 { 250_000 }
fn default_display() -> String { "auto".to_string() }

fn default_library() -> String { "buienradar".to_string() }
fn default_interval() -> u64 { 300 }
fn default_sleep_time() -> f64 { 1.0 }
fn default_timeout() -> u64 { 10 }
fn default_trend_field() -> String { "air_pressure".to_string() }
fn default_trend_tolerance() -> f64 { 0.1 }

fn default_pins() -> u8 { 2 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents)?;
        let bit_fields = parse_bit_fields(&raw.bits)?;

        let config = Config {
            gauge: raw.gauge,
            source: raw.source,
            stations: raw.stations,
            bit_fields,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configured station identifiers, preserving declaration order
    ///
    /// Consumers rely on this order for selector mapping, so it is exactly
    /// the order declared in the configuration.
    pub fn station_numbers(&self) -> &[u32] {
        &self.stations.numbers
    }

    /// Station selected by a selector pin value, if in range
    pub fn station_for_selector(&self, selector: u8) -> Option<u32> {
        self.stations.numbers.get(selector as usize).copied()
    }

    /// Bit-field descriptors ordered by bit index
    pub fn bit_fields(&self) -> &[BitField] {
        &self.bit_fields
    }

    /// Field nominated for trend derivation
    pub fn trend_field(&self) -> Result<FieldKey> {
        FieldKey::from_str(&self.source.trend_field).map_err(VaneBridgeError::Config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.gauge.frequency == 0 {
            return Err(VaneBridgeError::Config(
                "frequency must be greater than 0".to_string(),
            ));
        }

        if self.source.library.is_empty() {
            return Err(VaneBridgeError::Config(
                "source library cannot be empty".to_string(),
            ));
        }

        if self.source.interval == 0 {
            return Err(VaneBridgeError::Config(
                "interval must be greater than 0".to_string(),
            ));
        }

        if self.source.sleep_time <= 0.0 {
            return Err(VaneBridgeError::Config(
                "sleep_time must be greater than 0".to_string(),
            ));
        }

        if self.source.timeout == 0 {
            return Err(VaneBridgeError::Config(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if self.source.trend_tolerance < 0.0 {
            return Err(VaneBridgeError::Config(
                "trend_tolerance cannot be negative".to_string(),
            ));
        }

        self.trend_field()?;

        if self.stations.pins == 0 || self.stations.pins > 8 {
            return Err(VaneBridgeError::Config(
                "stations pins must be between 1 and 8".to_string(),
            ));
        }

        if self.stations.numbers.is_empty() {
            return Err(VaneBridgeError::Config(
                "at least one station must be configured".to_string(),
            ));
        }

        let selectable = 1usize << self.stations.pins;
        if self.stations.numbers.len() > selectable {
            return Err(VaneBridgeError::Config(format!(
                "{} stations configured but {} pins only select {}",
                self.stations.numbers.len(),
                self.stations.pins,
                selectable
            )));
        }

        for (i, station) in self.stations.numbers.iter().enumerate() {
            if self.stations.numbers[..i].contains(station) {
                return Err(VaneBridgeError::Config(format!(
                    "station {} configured more than once",
                    station
                )));
            }
        }

        let validated = self
            .bit_fields
            .iter()
            .filter(|field| field.key.is_validated())
            .count();
        if validated > STATUS_FLAG_BITS {
            return Err(VaneBridgeError::Config(format!(
                "{} validated fields configured but the status byte has {} flag bits",
                validated, STATUS_FLAG_BITS
            )));
        }

        if self.bit_fields.len() > CHANGE_MASK_BITS {
            return Err(VaneBridgeError::Config(format!(
                "at most {} bit fields are supported",
                CHANGE_MASK_BITS
            )));
        }

        let quantized = self
            .bit_fields
            .iter()
            .filter(|field| field.quantized.is_some())
            .count();
        if quantized > 1 {
            return Err(VaneBridgeError::Config(
                "only one quantized bit field may be configured".to_string(),
            ));
        }

        Ok(())
    }
}

/// Extract the ordered descriptor table from the raw `[bits]` section
///
/// Keys are `bit_<index>`; indices must form a contiguous range starting
/// at 0 with no duplicates. A descriptor value is either a bare field key
/// or the five-component form `key,length,min,max,step`.
fn parse_bit_fields(bits: &HashMap<String, String>) -> Result<Vec<BitField>> {
    if bits.is_empty() {
        return Err(VaneBridgeError::Config(
            "at least one bit field must be configured".to_string(),
        ));
    }

    let mut table: Vec<Option<BitField>> = vec![None; bits.len()];

    for (name, descriptor) in bits {
        let index: usize = name
            .strip_prefix("bit_")
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| {
                VaneBridgeError::Config(format!("invalid bit field name '{}'", name))
            })?;

        let slot = table.get_mut(index).ok_or_else(|| {
            VaneBridgeError::Config(format!(
                "bit index {} is outside the contiguous range 0..{}",
                index,
                bits.len()
            ))
        })?;
        if slot.is_some() {
            return Err(VaneBridgeError::Config(format!(
                "bit index {} configured more than once",
                index
            )));
        }

        *slot = Some(parse_descriptor(descriptor)?);
    }

    // Every slot is filled: indices are unique and within 0..len
    Ok(table.into_iter().flatten().collect())
}

fn parse_descriptor(descriptor: &str) -> Result<BitField> {
    let parts: Vec<&str> = descriptor.split(',').map(str::trim).collect();

    let key = FieldKey::from_str(parts[0]).map_err(VaneBridgeError::Config)?;

    match parts.len() {
        1 => Ok(BitField { key, quantized: None }),
        5 => Ok(BitField {
            key,
            quantized: Some(QuantizedRange {
                length: parts[1].to_string(),
                min: parts[2].to_string(),
                max: parts[3].to_string(),
                step: parts[4].to_string(),
            }),
        }),
        n => Err(VaneBridgeError::Config(format!(
            "bit field '{}' has {} components, expected 1 or 5",
            descriptor, n
        ))),
    }
}
