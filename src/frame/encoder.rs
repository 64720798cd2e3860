//! # Gauge Frame Encoder
//!
//! Encodes a weather reading into a fixed-width gauge frame.
//!
//! The encoder is compiled once from the configured descriptor table; from
//! then on `encode` cannot fail. A reading with missing or out-of-range
//! fields still produces a full frame, with the affected bytes clamped or
//! zeroed and the corresponding error flag raised in the status byte; the
//! display must receive something every cycle.

use chrono::Timelike;
use tracing::debug;

use super::protocol::*;
use crate::config::{BitField, Config, QuantizedRange};
use crate::error::{Result, VaneBridgeError};
use crate::feed::observation::{FieldKey, FieldValue, WeatherReading};

/// Encode summary returned alongside each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSummary {
    /// Error flag bits, one per validated field in descriptor order
    pub error_flags: u8,

    /// Changed-field bits, one per descriptor index
    pub changed: u32,

    /// The transmitted status byte (marker | error_flags)
    pub status: u8,
}

/// History needed for change detection across encode calls
///
/// Owned exclusively by the encoder and updated once per call.
#[derive(Debug, Default)]
pub struct EncoderState {
    previous: Option<WeatherReading>,
    error_flags: u8,
}

/// One descriptor entry with its encode parameters resolved
#[derive(Debug, Clone)]
struct CompiledField {
    key: FieldKey,
    /// Flag bit position for validated fields, by descriptor order
    flag_bit: Option<u8>,
    bucket: Option<BucketRange>,
}

/// Numeric interpretation of the quantized descriptor
#[derive(Debug, Clone, Copy)]
struct BucketRange {
    length: u32,
    min: f64,
    max: f64,
    step: f64,
}

/// Maps weather readings onto the gauge's byte frame
#[derive(Debug)]
pub struct FrameEncoder {
    fields: Vec<CompiledField>,
    state: EncoderState,
}

impl FrameEncoder {
    /// Compile an encoder from the configured descriptor table
    ///
    /// # Errors
    ///
    /// Fails only on a malformed descriptor table (unparsable quantized
    /// numerics); the table itself was already structurally validated at
    /// configuration load.
    pub fn new(config: &Config) -> Result<Self> {
        let mut fields = Vec::with_capacity(config.bit_fields().len());
        let mut next_flag_bit: u8 = 0;

        for descriptor in config.bit_fields() {
            let flag_bit = if descriptor.key.is_validated() {
                let bit = next_flag_bit;
                next_flag_bit += 1;
                Some(bit)
            } else {
                None
            };

            fields.push(CompiledField {
                key: descriptor.key,
                flag_bit,
                bucket: compile_bucket(descriptor)?,
            });
        }

        Ok(Self {
            fields,
            state: EncoderState::default(),
        })
    }

    /// Frame length in bytes (fields plus the status byte), constant for
    /// the lifetime of the encoder
    pub fn frame_len(&self) -> usize {
        self.fields.len() + 1
    }

    /// Encode one reading into a frame
    ///
    /// Always produces a frame of `frame_len()` bytes. The summary carries
    /// the error flags and the changed-field mask against the previously
    /// encoded reading.
    pub fn encode(&mut self, reading: &WeatherReading) -> (Frame, FrameSummary) {
        let mut frame = vec![0u8; self.frame_len()];
        let mut error_flags: u8 = 0;
        let mut changed: u32 = 0;

        for (index, field) in self.fields.iter().enumerate() {
            let value = reading.field(field.key);

            let (byte, in_range) = encode_field(field, &value);
            frame[index] = byte;

            if !in_range {
                if let Some(bit) = field.flag_bit {
                    error_flags |= 1 << bit;
                }
            }

            let previous_value = self
                .state
                .previous
                .as_ref()
                .map_or(FieldValue::Absent, |previous| previous.field(field.key));
            if value != previous_value {
                changed |= 1 << index;
            }
        }

        let status = FRAME_PRESENT_MARKER | error_flags;
        frame[self.fields.len()] = status;

        if error_flags != self.state.error_flags {
            debug!(error_flags, "field error flags changed");
        }

        self.state.previous = Some(reading.clone());
        self.state.error_flags = error_flags;

        (frame, FrameSummary { error_flags, changed, status })
    }
}

/// Resolve the quantized descriptor's numeric range, if present
fn compile_bucket(descriptor: &BitField) -> Result<Option<BucketRange>> {
    let Some(QuantizedRange { length, min, max, step }) = &descriptor.quantized else {
        return Ok(None);
    };

    let parse = |name: &str, raw: &str| -> Result<f64> {
        raw.parse().map_err(|_| {
            VaneBridgeError::Config(format!(
                "descriptor '{}': {} '{}' is not numeric",
                descriptor.key, name, raw
            ))
        })
    };

    let bucket = BucketRange {
        length: parse("length", length)? as u32,
        min: parse("min", min)?,
        max: parse("max", max)?,
        step: parse("step", step)?,
    };

    if bucket.length == 0 || bucket.step <= 0.0 || bucket.max <= bucket.min {
        return Err(VaneBridgeError::Config(format!(
            "descriptor '{}' has an empty quantized range",
            descriptor.key
        )));
    }

    Ok(Some(bucket))
}

/// Encode one field slot; returns the byte and whether the value was
/// inside its domain
///
/// Anything out of domain (including absence) encodes to a clamped or
/// zeroed byte; validated fields then raise their flag bit at the caller.
fn encode_field(field: &CompiledField, value: &FieldValue) -> (u8, bool) {
    match field.key {
        FieldKey::WindDirection => match value {
            FieldValue::Direction(direction) => (direction.index(), true),
            _ => (0, false),
        },
        FieldKey::WindSpeed | FieldKey::WindSpeedMax | FieldKey::WindSpeedBft => {
            offset_clamp(value, 0.0, SPEED_LIMIT)
        }
        FieldKey::AirPressure => offset_clamp(value, AIR_PRESSURE_BASELINE, BYTE_LIMIT),
        FieldKey::Temperature | FieldKey::ApparentTemperature | FieldKey::GroundTemperature => {
            offset_clamp(value, TEMPERATURE_BASELINE, BYTE_LIMIT)
        }
        FieldKey::Humidity => offset_clamp(value, 0.0, BYTE_LIMIT),
        FieldKey::RainMmPerHour => match field.bucket {
            Some(bucket) => bucket_clamp(value, bucket),
            None => offset_clamp(value, 0.0, BYTE_LIMIT),
        },
        FieldKey::SightDistance => match value {
            FieldValue::Number(v) => {
                offset_clamp(&FieldValue::Number(v / SIGHT_DISTANCE_SCALE), 0.0, BYTE_LIMIT)
            }
            _ => (0, false),
        },
        FieldKey::Latitude | FieldKey::Longitude => offset_clamp(value, 0.0, BYTE_LIMIT),
        FieldKey::Date => match value {
            FieldValue::Time(t) => (t.minute() as u8, true),
            _ => (0, false),
        },
        // A name does not fit on a byte; the slot is reserved for displays
        // that look it up on their side
        FieldKey::StationName => (0, true),
        FieldKey::Trend => match value {
            FieldValue::Trend(trend) => (trend.code(), true),
            _ => (0, false),
        },
        FieldKey::Error => match value {
            FieldValue::Flag(set) => (u8::from(*set), true),
            _ => (0, false),
        },
    }
}

/// Map a numeric value onto `[0, limit]` by subtracting `baseline`
///
/// Values below the domain clamp to 0, values above clamp to `limit`;
/// either way the value counts as out of range. Absence encodes as 0 and
/// is also out of range.
fn offset_clamp(value: &FieldValue, baseline: f64, limit: u8) -> (u8, bool) {
    let FieldValue::Number(v) = value else {
        return (0, false);
    };

    let offset = v.round() - baseline;
    if offset < 0.0 {
        (0, false)
    } else if offset > limit as f64 {
        (limit, false)
    } else {
        (offset as u8, true)
    }
}

/// Map a numeric value onto the quantized descriptor's equal-width buckets
fn bucket_clamp(value: &FieldValue, bucket: BucketRange) -> (u8, bool) {
    let FieldValue::Number(v) = value else {
        return (0, false);
    };

    let snapped = (v / bucket.step).round() * bucket.step;
    if snapped < bucket.min {
        return (0, false);
    }
    if snapped > bucket.max {
        return ((bucket.length - 1) as u8, false);
    }

    let width = (bucket.max - bucket.min) / bucket.length as f64;
    let index = ((snapped - bucket.min) / width) as u32;
    (index.min(bucket.length - 1) as u8, true)
}
