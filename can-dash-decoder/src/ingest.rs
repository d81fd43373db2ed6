//! Frame ingestion loop
//!
//! Two states, driven by an explicit loop:
//!
//! - **Disconnected**: call [`ConnectionManager::connect`] until it succeeds,
//!   sleeping between attempts according to the [`ReconnectPolicy`]. On
//!   success emit `CanOnline(true)`.
//! - **Connected**: read frames, classify, decode and emit. On a receive
//!   error emit `CanOnline(false)` and fall back to Disconnected.
//!
//! The loop only ends when its [`CancellationToken`] is cancelled. The token
//! is checked before every connection attempt and every receive call.

use crate::bus::{BusConnector, ConnectionManager};
use crate::config::{DashConfig, ReconnectPolicy, VehicleConfig};
use crate::payload;
use crate::sink::{DashEvent, EventSink};
use crate::table::FrameDecoderTable;
use crate::types::{Category, DecodeError, RawFrame};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep while backing off
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared stop flag for the ingestion loop
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop at its next check
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, waking early if cancelled
    ///
    /// Returns true if the token was cancelled.
    fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(CANCEL_POLL_INTERVAL));
        }
    }
}

/// Counters collected over the lifetime of a loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub frames_received: u64,
    pub frames_decoded: u64,
    /// Frames whose identifier is not in the decoder table
    pub frames_ignored: u64,
    /// Frames dropped because their payload was too short
    pub frames_malformed: u64,
    pub connect_attempts: u64,
    pub disconnects: u64,
}

/// What happened to a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Decoded(Category),
    Ignored,
    Malformed(DecodeError),
}

/// Classifies frames and turns them into dash events
#[derive(Debug, Clone)]
pub struct FrameProcessor {
    table: FrameDecoderTable,
    fuel_capacity: f64,
}

impl FrameProcessor {
    pub fn new(table: FrameDecoderTable, vehicle: &VehicleConfig) -> Self {
        Self {
            table,
            fuel_capacity: vehicle.fuel_capacity_litres,
        }
    }

    pub fn from_config(config: &DashConfig) -> Self {
        Self::new(FrameDecoderTable::new(&config.identifiers), &config.vehicle)
    }

    pub fn table(&self) -> &FrameDecoderTable {
        &self.table
    }

    /// Decode one frame and emit its values in order
    ///
    /// Nothing is emitted for unknown identifiers or malformed payloads.
    pub fn process(&self, frame: &RawFrame, sink: &dyn EventSink) -> FrameOutcome {
        let category = match self.table.classify(frame.can_id) {
            Some(category) => category,
            None => {
                log::trace!("Ignoring frame with unknown ID 0x{:X}", frame.can_id);
                return FrameOutcome::Ignored;
            }
        };

        match self.emit_decoded(category, &frame.data, sink) {
            Ok(()) => FrameOutcome::Decoded(category),
            Err(e) => {
                log::warn!("Skipping frame 0x{:X}: {}", frame.can_id, e);
                FrameOutcome::Malformed(e)
            }
        }
    }

    fn emit_decoded(
        &self,
        category: Category,
        data: &[u8],
        sink: &dyn EventSink,
    ) -> Result<(), DecodeError> {
        match category {
            Category::Motion => {
                let motion = payload::decode_motion(data)?;
                sink.emit(DashEvent::Speed(motion.speed));
                sink.emit(DashEvent::Rpm(motion.rpm()));
            }
            Category::Engine => {
                let engine = payload::decode_engine(data)?;
                sink.emit(DashEvent::EngineTemp(engine.engine_temp));
                sink.emit(DashEvent::EngineRunning(engine.is_engine_running));
                sink.emit(DashEvent::CruiseControlActive(engine.is_cruise_control_active));
            }
            Category::AirTemp => {
                let air_temp = payload::decode_air_temp(data)?;
                sink.emit(DashEvent::AirTemp(air_temp));
            }
            Category::FuelLevel => {
                let level = payload::decode_fuel_level(data)?;
                sink.emit(DashEvent::FuelPercentage(payload::fuel_percentage(
                    level,
                    self.fuel_capacity,
                )));
            }
            Category::SteeringWheelControl => {
                for event in payload::decode_steering_wheel(data, Utc::now())? {
                    sink.emit(DashEvent::SteeringWheelControl(event));
                }
            }
        }
        Ok(())
    }
}

/// The reconnecting read-decode-emit loop
pub struct IngestionLoop<C: BusConnector, S: EventSink> {
    manager: ConnectionManager<C>,
    processor: FrameProcessor,
    sink: S,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
    stats: IngestStats,
}

impl<C: BusConnector, S: EventSink> IngestionLoop<C, S> {
    pub fn new(connector: C, processor: FrameProcessor, sink: S) -> Self {
        Self {
            manager: ConnectionManager::new(connector),
            processor,
            sink,
            policy: ReconnectPolicy::default(),
            cancel: CancellationToken::new(),
            stats: IngestStats::default(),
        }
    }

    /// Builder method: set the reconnect policy
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder method: use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops this loop
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled
    pub fn run(mut self) -> IngestStats {
        log::info!("Ingestion loop started on {}", self.manager.connector().describe());

        while self.connect_until_online() {
            self.sink.emit(DashEvent::CanOnline(true));

            if !self.receive_until_error() {
                break;
            }

            self.stats.disconnects += 1;
            self.sink.emit(DashEvent::CanOnline(false));
        }

        self.manager.disconnect();
        log::info!("Ingestion loop stopped: {:?}", self.stats);
        self.stats
    }

    /// Disconnected state. Returns false if cancelled before connecting.
    fn connect_until_online(&mut self) -> bool {
        let mut failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return false;
            }

            self.stats.connect_attempts += 1;
            match self.manager.connect() {
                Ok(()) => return true,
                Err(_) => {
                    failures = failures.saturating_add(1);
                    let delay = self.policy.delay_for(failures);
                    if !delay.is_zero() && self.cancel.sleep(delay) {
                        return false;
                    }
                }
            }
        }
    }

    /// Connected state. Returns true on link loss, false if cancelled.
    fn receive_until_error(&mut self) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }

            match self.manager.receive() {
                Ok(Some(frame)) => {
                    self.stats.frames_received += 1;
                    match self.processor.process(&frame, &self.sink) {
                        FrameOutcome::Decoded(_) => self.stats.frames_decoded += 1,
                        FrameOutcome::Ignored => self.stats.frames_ignored += 1,
                        FrameOutcome::Malformed(_) => self.stats.frames_malformed += 1,
                    }
                }
                Ok(None) => continue,
                Err(_) => return true,
            }
        }
    }
}

impl<C, S> IngestionLoop<C, S>
where
    C: BusConnector + Send + 'static,
    C::Handle: Send + 'static,
    S: EventSink + 'static,
{
    /// Run the loop on a dedicated named thread
    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<IngestStats>> {
        thread::Builder::new()
            .name("can-ingest".to_string())
            .spawn(move || self.run())
    }
}
