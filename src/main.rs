//! # Vane Bridge
//!
//! Drive an analog weathervane gauge from live station observations.
//!
//! This application periodically fetches a weather observation for the
//! selected station, encodes it into a fixed-width gauge frame, and
//! re-sends the frame over the serial link once per second so the display
//! always shows the most recent valid reading even when fetches fail.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::time::interval;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use vane_bridge::config::Config;
use vane_bridge::feed::source::source_by_name;
use vane_bridge::frame::encoder::FrameEncoder;
use vane_bridge::scheduler::{AcquisitionScheduler, FixedSelector, StationSelector};
use vane_bridge::serial::sink::FrameSink;
use vane_bridge::serial::GaugeSerial;

/// Ticks between station selector polls
const STATION_POLL_TICKS: u64 = 3;

/// Directory for the daily-rotated log files
const LOG_DIR: &str = "logs";

/// Get weather data from a provider and send it to the gauge
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Run in test mode, sending a predictable byte pattern
    #[arg(short, long)]
    test: bool,

    /// Override the fetch interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Override the selected weather station id
    #[arg(short, long)]
    station: Option<u32>,

    /// Override the data provider
    #[arg(short, long)]
    provider: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging();

    info!("Vane Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(interval) = args.interval {
        config.source.interval = interval;
    }
    if let Some(provider) = args.provider {
        config.source.library = provider;
    }

    let mut serial = GaugeSerial::open(config.gauge.channel, config.gauge.frequency)?;
    info!("gauge serial port opened at: {}", serial.device_path());

    if args.test || config.gauge.test {
        return run_test_mode(&mut serial).await;
    }

    let selector = match args.station {
        Some(station) => {
            let index = config
                .station_numbers()
                .iter()
                .position(|&s| s == station);
            match index {
                Some(index) => FixedSelector(index as u8),
                None => bail!(
                    "station {} is not configured (known: {:?})",
                    station,
                    config.station_numbers()
                ),
            }
        }
        None => FixedSelector(0),
    };

    run(&config, selector, &mut serial).await
}

/// Main send loop: one frame per cycle, fetches in the background
async fn run(
    config: &Config,
    selector: impl StationSelector,
    sink: &mut impl FrameSink,
) -> Result<()> {
    let source = source_by_name(config)?;
    info!("using data provider '{}'", source.name());

    let interval_ticks =
        ((config.source.interval as f64 / config.source.sleep_time).round() as u64).max(1);
    let station_id = config
        .station_for_selector(selector.selected())
        .unwrap_or(config.station_numbers()[0]);

    let mut scheduler = AcquisitionScheduler::new(
        source,
        interval_ticks,
        Duration::from_secs(config.source.timeout),
        station_id,
    );
    let mut encoder = FrameEncoder::new(config)?;

    let mut send_interval = interval(Duration::from_secs_f64(config.source.sleep_time));
    let mut tick_count: u64 = 0;

    info!(
        "starting send loop: {} byte frames every {}s, fetch every {}s",
        encoder.frame_len(),
        config.source.sleep_time,
        config.source.interval
    );

    loop {
        tokio::select! {
            _ = send_interval.tick() => {
                if tick_count % STATION_POLL_TICKS == 0 {
                    if let Some(station) = config.station_for_selector(selector.selected()) {
                        scheduler.select_station(station);
                    }
                }

                let reading = scheduler.tick();
                let (frame, summary) = encoder.encode(reading);

                if summary.changed != 0 {
                    debug!(
                        "frame content changed: status {:#010b}, changed mask {:#b}",
                        summary.status, summary.changed
                    );
                }

                if let Err(e) = sink.send_frame(&frame).await {
                    warn!("failed to send frame: {}", e);
                }

                tick_count += 1;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, shutting down after {} cycles", tick_count);
                break;
            }
        }
    }

    Ok(())
}

/// Test mode sends a predictable byte sequence to the gauge pins
///
/// Three bytes every second: an increasing counter (modulo 255), a
/// decreasing counter (idem), and a byte toggling between 0x55 and 0xAA.
async fn run_test_mode(sink: &mut impl FrameSink) -> Result<()> {
    info!("starting test mode");

    let mut ticker = interval(Duration::from_secs(1));
    let mut counter: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                counter += 1;
                let data = test_pattern(counter);
                debug!("test pattern: {:?}", data);

                if let Err(e) = sink.send_frame(&data).await {
                    warn!("failed to send test pattern: {}", e);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, leaving test mode");
                break;
            }
        }
    }

    Ok(())
}

fn test_pattern(counter: u32) -> [u8; 3] {
    let up = (counter % 255) as u8;
    let down = ((255 - up as u32) % 255) as u8;
    let toggle = if counter % 2 == 1 { 0x55 } else { 0xAA };
    [up, down, toggle]
}

/// Console logging plus daily-rotated file logs
///
/// The returned guard must stay alive for the file writer to flush.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "vane-bridge.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_alternates_toggle_byte() {
        assert_eq!(test_pattern(1)[2], 0x55);
        assert_eq!(test_pattern(2)[2], 0xAA);
        assert_eq!(test_pattern(3)[2], 0x55);
    }

    #[test]
    fn test_pattern_counts_up_and_down() {
        assert_eq!(test_pattern(1)[0], 1);
        assert_eq!(test_pattern(1)[1], 254);
        assert_eq!(test_pattern(100)[0], 100);
        assert_eq!(test_pattern(100)[1], 155);
    }

    #[test]
    fn test_pattern_wraps_modulo_255() {
        assert_eq!(test_pattern(255)[0], 0);
        assert_eq!(test_pattern(255)[1], 0);
        assert_eq!(test_pattern(300)[0], 45);
        assert_eq!(test_pattern(300)[1], 210);
    }

    #[test]
    fn test_station_poll_cadence() {
        // The selector is re-read every three cycles, as on the original
        // hardware
        assert_eq!(STATION_POLL_TICKS, 3);
    }
}
