//! # Observation Types
//!
//! The typed weather reading and its field-level views.
//!
//! A reading is a fixed struct with one optional slot per canonical field,
//! so "field absent" is a first-class state rather than a missing map entry.
//! The descriptor-driven frame encoder accesses fields through [`FieldKey`]
//! and [`FieldValue`] instead of reaching into the struct directly.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Temperature above which wind chill is not applied (degrees Celsius)
pub const WIND_CHILL_MAX_TEMPERATURE: f64 = 10.0;

/// Wind speed below which wind chill is not applied (m/s)
pub const WIND_CHILL_MIN_WIND_SPEED: f64 = 1.3;

/// Canonical field keys, in the spelling the configuration uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    WindDirection,
    WindSpeed,
    WindSpeedMax,
    WindSpeedBft,
    AirPressure,
    Temperature,
    ApparentTemperature,
    GroundTemperature,
    Humidity,
    RainMmPerHour,
    SightDistance,
    StationName,
    Latitude,
    Longitude,
    Date,
    Trend,
    Error,
}

impl FieldKey {
    /// Configuration spelling of this key
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::WindDirection => "wind_direction",
            FieldKey::WindSpeed => "wind_speed",
            FieldKey::WindSpeedMax => "wind_speed_max",
            FieldKey::WindSpeedBft => "wind_speed_bft",
            FieldKey::AirPressure => "air_pressure",
            FieldKey::Temperature => "temperature",
            FieldKey::ApparentTemperature => "apparent_temperature",
            FieldKey::GroundTemperature => "temperature_10_cm",
            FieldKey::Humidity => "humidity",
            FieldKey::RainMmPerHour => "rain_mm_per_hour",
            FieldKey::SightDistance => "sight_distance",
            FieldKey::StationName => "station_name",
            FieldKey::Latitude => "latitude",
            FieldKey::Longitude => "longitude",
            FieldKey::Date => "date",
            FieldKey::Trend => "trend",
            FieldKey::Error => "error",
        }
    }

    /// Whether this field gets an error flag bit in the status byte
    ///
    /// The status byte carries the frame-present marker plus seven flag
    /// bits, so exactly these seven fields are range-validated.
    pub fn is_validated(&self) -> bool {
        matches!(
            self,
            FieldKey::WindDirection
                | FieldKey::WindSpeed
                | FieldKey::WindSpeedMax
                | FieldKey::AirPressure
                | FieldKey::Temperature
                | FieldKey::ApparentTemperature
                | FieldKey::Humidity
        )
    }
}

impl FromStr for FieldKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wind_direction" => Ok(FieldKey::WindDirection),
            "wind_speed" => Ok(FieldKey::WindSpeed),
            "wind_speed_max" => Ok(FieldKey::WindSpeedMax),
            "wind_speed_bft" => Ok(FieldKey::WindSpeedBft),
            "air_pressure" => Ok(FieldKey::AirPressure),
            "temperature" => Ok(FieldKey::Temperature),
            "apparent_temperature" => Ok(FieldKey::ApparentTemperature),
            // The feed names the 10 cm probe; the gauge labels it "ground"
            "temperature_10_cm" | "ground_temperature" => Ok(FieldKey::GroundTemperature),
            "humidity" => Ok(FieldKey::Humidity),
            "rain_mm_per_hour" | "rainFallLastHour" => Ok(FieldKey::RainMmPerHour),
            "sight_distance" => Ok(FieldKey::SightDistance),
            "station_name" => Ok(FieldKey::StationName),
            "latitude" => Ok(FieldKey::Latitude),
            "longitude" => Ok(FieldKey::Longitude),
            "date" => Ok(FieldKey::Date),
            "trend" => Ok(FieldKey::Trend),
            "error" => Ok(FieldKey::Error),
            other => Err(format!("unknown field key '{}'", other)),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of change of the configured trend field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Falling,
    Steady,
    Rising,
}

impl Trend {
    /// Gauge wire code (falling = 0, steady = 1, rising = 2)
    pub fn code(&self) -> u8 {
        match self {
            Trend::Falling => 0,
            Trend::Steady => 1,
            Trend::Rising => 2,
        }
    }
}

/// The sixteen compass headings the feed reports, by feed code
///
/// The feed uses the Dutch abbreviations (O = east, Z = south, W = west).
/// The gauge index runs clockwise from north: N = 0 .. NNW = 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompassDirection {
    N,
    Nno,
    No,
    Ono,
    O,
    Ozo,
    Zo,
    Zzo,
    Z,
    Zzw,
    Zw,
    Wzw,
    W,
    Wnw,
    Nw,
    Nnw,
}

/// All headings in gauge index order
pub const COMPASS_HEADINGS: [CompassDirection; 16] = [
    CompassDirection::N,
    CompassDirection::Nno,
    CompassDirection::No,
    CompassDirection::Ono,
    CompassDirection::O,
    CompassDirection::Ozo,
    CompassDirection::Zo,
    CompassDirection::Zzo,
    CompassDirection::Z,
    CompassDirection::Zzw,
    CompassDirection::Zw,
    CompassDirection::Wzw,
    CompassDirection::W,
    CompassDirection::Wnw,
    CompassDirection::Nw,
    CompassDirection::Nnw,
];

impl CompassDirection {
    /// Look up a heading from its feed code (e.g. "NNO", "ZW")
    ///
    /// Returns `None` for anything that is not one of the sixteen codes,
    /// including the feed's "VAR" for variable wind.
    pub fn from_code(code: &str) -> Option<Self> {
        let index = COMPASS_HEADINGS
            .iter()
            .position(|heading| heading.code() == code)?;
        Some(COMPASS_HEADINGS[index])
    }

    /// Feed code for this heading
    pub fn code(&self) -> &'static str {
        match self {
            CompassDirection::N => "N",
            CompassDirection::Nno => "NNO",
            CompassDirection::No => "NO",
            CompassDirection::Ono => "ONO",
            CompassDirection::O => "O",
            CompassDirection::Ozo => "OZO",
            CompassDirection::Zo => "ZO",
            CompassDirection::Zzo => "ZZO",
            CompassDirection::Z => "Z",
            CompassDirection::Zzw => "ZZW",
            CompassDirection::Zw => "ZW",
            CompassDirection::Wzw => "WZW",
            CompassDirection::W => "W",
            CompassDirection::Wnw => "WNW",
            CompassDirection::Nw => "NW",
            CompassDirection::Nnw => "NNW",
        }
    }

    /// Gauge position index (0-15, clockwise from north)
    pub fn index(&self) -> u8 {
        COMPASS_HEADINGS
            .iter()
            .position(|heading| heading == self)
            .unwrap_or(0) as u8
    }
}

/// Typed view of one field slot, used by the frame encoder and for
/// change detection
///
/// Numeric comparison is exact value equality; tolerance, if wanted,
/// belongs to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Absent,
    Number(f64),
    Direction(CompassDirection),
    Text(&'a str),
    Time(DateTime<Utc>),
    Trend(Trend),
    Flag(bool),
}

/// One parsed, typed snapshot of weather fields for a station
///
/// Constructed fresh on every successful fetch and never mutated; the next
/// reading supersedes it. The `data_unavailable` marker is only set on the
/// sentinel produced when a fetch fails or times out.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub station_id: u32,
    pub wind_direction: Option<CompassDirection>,
    pub wind_speed: Option<f64>,
    pub wind_speed_max: Option<f64>,
    pub wind_speed_bft: Option<f64>,
    pub air_pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub ground_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub rain_mm_per_hour: Option<f64>,
    pub sight_distance: Option<f64>,
    pub station_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
    pub trend: Option<Trend>,
    pub data_unavailable: bool,
}

impl WeatherReading {
    /// A reading with every field absent
    pub fn empty(station_id: u32) -> Self {
        Self {
            station_id,
            wind_direction: None,
            wind_speed: None,
            wind_speed_max: None,
            wind_speed_bft: None,
            air_pressure: None,
            temperature: None,
            apparent_temperature: None,
            ground_temperature: None,
            humidity: None,
            rain_mm_per_hour: None,
            sight_distance: None,
            station_name: None,
            latitude: None,
            longitude: None,
            observed_at: None,
            trend: None,
            data_unavailable: false,
        }
    }

    /// The sentinel "no data" reading used on fetch failure or timeout
    ///
    /// All fields absent, with the unavailable marker set so the gauge can
    /// distinguish a known-bad fallback from a half-populated reading.
    pub fn unavailable(station_id: u32) -> Self {
        Self {
            data_unavailable: true,
            ..Self::empty(station_id)
        }
    }

    /// Typed view of the slot for `key`
    pub fn field(&self, key: FieldKey) -> FieldValue<'_> {
        fn number(value: Option<f64>) -> FieldValue<'static> {
            value.map_or(FieldValue::Absent, FieldValue::Number)
        }

        match key {
            FieldKey::WindDirection => self
                .wind_direction
                .map_or(FieldValue::Absent, FieldValue::Direction),
            FieldKey::WindSpeed => number(self.wind_speed),
            FieldKey::WindSpeedMax => number(self.wind_speed_max),
            FieldKey::WindSpeedBft => number(self.wind_speed_bft),
            FieldKey::AirPressure => number(self.air_pressure),
            FieldKey::Temperature => number(self.temperature),
            FieldKey::ApparentTemperature => number(self.apparent_temperature),
            FieldKey::GroundTemperature => number(self.ground_temperature),
            FieldKey::Humidity => number(self.humidity),
            FieldKey::RainMmPerHour => number(self.rain_mm_per_hour),
            FieldKey::SightDistance => number(self.sight_distance),
            FieldKey::StationName => self
                .station_name
                .as_deref()
                .map_or(FieldValue::Absent, FieldValue::Text),
            FieldKey::Latitude => number(self.latitude),
            FieldKey::Longitude => number(self.longitude),
            FieldKey::Date => self.observed_at.map_or(FieldValue::Absent, FieldValue::Time),
            FieldKey::Trend => self.trend.map_or(FieldValue::Absent, FieldValue::Trend),
            FieldKey::Error => FieldValue::Flag(self.data_unavailable),
        }
    }
}

/// Apparent temperature from wind speed (m/s) and temperature (degrees
/// Celsius) using the JAG/TI wind-chill equation
///
/// The equation only holds for cold, windy conditions: at temperatures
/// above 10 degrees or wind speeds below 1.3 m/s it saturates to the
/// ambient temperature.
///
/// # Examples
///
/// ```
/// use vane_bridge::feed::observation::wind_chill;
///
/// assert!((wind_chill(5.0, 0.0) - -4.94).abs() < 0.1);
/// assert_eq!(wind_chill(5.0, 15.0), 15.0);
/// ```
pub fn wind_chill(wind_speed: f64, temperature: f64) -> f64 {
    if temperature > WIND_CHILL_MAX_TEMPERATURE || wind_speed < WIND_CHILL_MIN_WIND_SPEED {
        return temperature;
    }

    let v = wind_speed.powf(0.16);
    13.12 + 0.6215 * temperature - 13.96 * v + 0.4867 * temperature * v
}
