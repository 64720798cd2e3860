//! # Gauge Frame Protocol Constants
//!
//! The byte-level contract agreed with the display firmware.
//!
//! Byte order and error-flag order come from the configured descriptor
//! table, not from this module; the constants here fix the per-field value
//! domains and the status byte layout.

/// Status byte frame-present marker (always set on a transmitted frame)
///
/// Lets the receiving hardware distinguish a sent-but-empty frame from no
/// transmission at all.
pub const FRAME_PRESENT_MARKER: u8 = 0x80;

/// Number of error flag bits available in the status byte
pub const STATUS_FLAG_BITS: usize = 7;

/// Width of the changed-fields mask, and with it the maximum number of
/// configurable bit fields
pub const CHANGE_MASK_BITS: usize = 32;

/// Air pressure baseline in hPa; the byte carries `pressure - 900`
pub const AIR_PRESSURE_BASELINE: f64 = 900.0;

/// Temperature baseline in degrees Celsius; the byte carries `t + 20`
pub const TEMPERATURE_BASELINE: f64 = -20.0;

/// Upper clamp for speed-like fields (6-bit range)
pub const SPEED_LIMIT: u8 = 63;

/// Upper clamp for plain range fields (full byte)
pub const BYTE_LIMIT: u8 = 255;

/// Sight distance is carried in hectometres
pub const SIGHT_DISTANCE_SCALE: f64 = 100.0;

/// Number of compass headings on the direction dial
pub const COMPASS_POSITIONS: u8 = 16;

/// A complete gauge frame: one byte per configured field plus the trailing
/// status byte
pub type Frame = Vec<u8>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_byte_layout() {
        // MSB is the marker, the rest are flag bits
        assert_eq!(FRAME_PRESENT_MARKER, 0b1000_0000);
        assert_eq!(STATUS_FLAG_BITS, 7);
        assert_eq!(FRAME_PRESENT_MARKER | 0x7F, 0xFF);
    }

    #[test]
    fn test_value_domains() {
        // Pressure domain is [900, 1155] hPa on a full byte
        assert_eq!(AIR_PRESSURE_BASELINE + BYTE_LIMIT as f64, 1155.0);
        assert_eq!(SPEED_LIMIT, 63);
        assert_eq!(COMPASS_POSITIONS, 16);
    }
}
