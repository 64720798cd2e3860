//! # Serial Transport Module
//!
//! Handles the serial link to the gauge driver board.
//!
//! This module handles:
//! - Opening the serial port at the configured baud rate
//! - Auto-detecting the device path from the configured bus channel
//! - Transmitting encoded gauge frames once per cycle
//!
//! The pipeline itself never addresses the port: it produces bytes and
//! hands them to a [`sink::FrameSink`].

pub mod sink;

use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{Result, VaneBridgeError};
use sink::FrameSink;

/// Gauge serial port handler
///
/// Manages the connection to the gauge driver board over USB serial.
pub struct GaugeSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
}

impl std::fmt::Debug for GaugeSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl GaugeSerial {
    /// Open the gauge link on a bus channel
    ///
    /// Tries the USB CDC path for the channel first, then the
    /// USB-to-serial adapter path.
    ///
    /// # Errors
    ///
    /// Returns error if no device on the channel can be opened.
    pub fn open(channel: u8, baud_rate: u32) -> Result<Self> {
        let candidates = [
            format!("/dev/ttyACM{}", channel),
            format!("/dev/ttyUSB{}", channel),
        ];
        Self::open_with_paths(&candidates, baud_rate)
    }

    /// Open the gauge link trying explicit device paths in order
    pub fn open_with_paths(paths: &[String], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("opened gauge device at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(VaneBridgeError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| VaneBridgeError::Serial(format!("failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait::async_trait]
impl FrameSink for GaugeSerial {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        self.port
            .write_all(frame)
            .await
            .map_err(|e| VaneBridgeError::Serial(format!("failed to write frame: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| VaneBridgeError::Serial(format!("failed to flush serial port: {}", e)))?;

        debug!("sent gauge frame ({} bytes)", frame.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid = vec![
            "/dev/nonexistent0".to_string(),
            "/dev/nonexistent1".to_string(),
        ];
        let result = GaugeSerial::open_with_paths(&invalid, 250_000);

        assert!(result.is_err());
        match result.unwrap_err() {
            VaneBridgeError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("expected SerialPortNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let result = GaugeSerial::open_with_paths(&[], 250_000);
        assert!(matches!(
            result,
            Err(VaneBridgeError::SerialPortNotFound(_))
        ));
    }

    #[test]
    fn test_channel_selects_device_candidates() {
        // Channel 7 will not exist on any test machine; the error message
        // names both candidate paths for it
        let result = GaugeSerial::open(7, 250_000);
        match result.unwrap_err() {
            VaneBridgeError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/ttyACM7"));
                assert!(msg.contains("/dev/ttyUSB7"));
            }
            other => panic!("expected SerialPortNotFound, got: {:?}", other),
        }
    }
}
