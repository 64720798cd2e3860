//! # Acquisition Scheduler
//!
//! Keeps a fresh weather reading available without blocking the send loop.
//!
//! The send loop runs on a fixed one-second cadence and must never wait on
//! the network, so fetching happens in a background worker that hands its
//! result back through a single-slot mailbox. The scheduler polls the
//! mailbox without blocking on every tick; until a reading arrives (and
//! whenever a fetch fails or times out) the loop keeps sending the previous
//! reading, or the sentinel "no data" reading on first run.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::feed::observation::WeatherReading;
use crate::feed::source::DataSource;

/// Source of the station selector value
///
/// The physical selector pins are read on the transport side; this seam
/// lets the send loop poll whatever selector the deployment provides.
pub trait StationSelector: Send {
    fn selected(&self) -> u8;
}

/// A selector fixed at startup
pub struct FixedSelector(pub u8);

impl StationSelector for FixedSelector {
    fn selected(&self) -> u8 {
        self.0
    }
}

/// Drives periodic, non-blocking acquisition of weather readings
pub struct AcquisitionScheduler {
    source: Arc<dyn DataSource>,
    /// Ticks between fetch starts
    interval_ticks: u64,
    fetch_timeout: Duration,
    station_id: u32,
    ticks: u64,
    current: WeatherReading,
    mailbox_tx: mpsc::Sender<WeatherReading>,
    mailbox_rx: mpsc::Receiver<WeatherReading>,
}

impl AcquisitionScheduler {
    pub fn new(
        source: Arc<dyn DataSource>,
        interval_ticks: u64,
        fetch_timeout: Duration,
        station_id: u32,
    ) -> Self {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(1);
        Self {
            source,
            interval_ticks: interval_ticks.max(1),
            fetch_timeout,
            station_id,
            ticks: 0,
            current: WeatherReading::unavailable(station_id),
            mailbox_tx,
            mailbox_rx,
        }
    }

    /// The most recent reading (sentinel until the first fetch delivers)
    pub fn current(&self) -> &WeatherReading {
        &self.current
    }

    pub fn station_id(&self) -> u32 {
        self.station_id
    }

    /// Switch the selected station
    ///
    /// Resets the tick counter so the next tick fetches immediately
    /// instead of waiting out the remainder of the old interval.
    pub fn select_station(&mut self, station_id: u32) {
        if station_id != self.station_id {
            info!(station_id, "new station selected");
            self.station_id = station_id;
            self.ticks = 0;
        }
    }

    /// Advance one send-loop cycle; returns the reading to transmit
    ///
    /// Starts a fetch worker on interval boundaries and adopts whatever
    /// the mailbox holds, never blocking. Must run inside a tokio runtime.
    pub fn tick(&mut self) -> &WeatherReading {
        if self.ticks % self.interval_ticks == 0 {
            self.spawn_fetch();
            // Reset only once the fetch actually started, so a new fetch
            // is not piled onto a pending one by counter drift
            self.ticks = 0;
        }

        if let Ok(reading) = self.mailbox_rx.try_recv() {
            info!(
                station_id = reading.station_id,
                unavailable = reading.data_unavailable,
                "reading received"
            );
            self.current = reading;
        }

        self.ticks += 1;
        &self.current
    }

    fn spawn_fetch(&self) {
        let source = Arc::clone(&self.source);
        let station_id = self.station_id;
        let fetch_timeout = self.fetch_timeout;
        let mailbox = self.mailbox_tx.clone();

        tokio::spawn(async move {
            let reading = match timeout(fetch_timeout, source.fetch(station_id)).await {
                Ok(Ok(reading)) => reading,
                Ok(Err(e)) => {
                    warn!(station_id, error = %e, "fetch failed");
                    WeatherReading::unavailable(station_id)
                }
                Err(_) => {
                    warn!(station_id, "fetch timed out");
                    WeatherReading::unavailable(station_id)
                }
            };

            // A late result may find the slot still occupied; drop it
            // rather than wait
            let _ = mailbox.try_send(reading);
        });
    }
}
