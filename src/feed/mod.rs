//! # Weather Feed Module
//!
//! Turns raw station feeds into typed weather readings.
//!
//! This module handles:
//! - The typed observation model (`WeatherReading`, field keys, compass codes)
//! - Parsing the raw feed document for one station
//! - Derived quantities: pressure trend and apparent temperature
//! - Data sources that fetch and parse a feed in a background worker

pub mod observation;
pub mod parser;
pub mod source;
