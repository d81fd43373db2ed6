//! CAN Dash Decoder Library
//!
//! Reads frames from a vehicle CAN bus, decodes them into engineering-unit
//! values and hands those values to a presentation layer as discrete
//! notifications.
//!
//! # Architecture
//!
//! - [`FrameDecoderTable`] maps arbitration identifiers to a [`Category`]
//! - [`payload`] holds one pure decoder per category
//! - [`ConnectionManager`] owns the bus handle and its [`ConnectionState`]
//! - [`IngestionLoop`] drives connection, reception and decoding, and pushes
//!   [`DashEvent`]s into an [`EventSink`]
//!
//! The library does NOT:
//! - Transmit frames
//! - Store history (every value is a point-in-time notification)
//! - Read or write user settings
//!
//! # Example Usage
//!
//! ```no_run
//! # #[cfg(all(target_os = "linux", feature = "socketcan"))]
//! # fn main() {
//! use can_dash_decoder::{DashConfig, FrameProcessor, IngestionLoop, SocketCanConnector};
//! use std::sync::mpsc;
//!
//! let config = DashConfig::new().with_interface("can0");
//! config.validate().unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! let ingest = IngestionLoop::new(
//!     SocketCanConnector::new(config.bus.clone()),
//!     FrameProcessor::from_config(&config),
//!     tx,
//! )
//! .with_reconnect_policy(config.reconnect);
//! let cancel = ingest.cancellation_token();
//! let handle = ingest.spawn().unwrap();
//!
//! for event in rx.iter().take(100) {
//!     println!("{:?}", event);
//! }
//!
//! cancel.cancel();
//! let stats = handle.join().unwrap();
//! println!("Decoded {} frames", stats.frames_decoded);
//! # }
//! # #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
//! # fn main() {}
//! ```

// Public modules
pub mod bus;
pub mod config;
pub mod ingest;
pub mod payload;
pub mod sink;
pub mod table;
pub mod types;

// Re-export main types for convenience
pub use bus::{BusConnector, ConnectionManager, FrameSource};
pub use config::{BusConfig, ConfigError, DashConfig, IdentifierMap, ReconnectPolicy, VehicleConfig};
pub use ingest::{CancellationToken, FrameOutcome, FrameProcessor, IngestStats, IngestionLoop};
pub use sink::{emit_defaults, DashEvent, EventSink};
pub use table::FrameDecoderTable;
pub use types::{
    Category, ConnectionError, ConnectionState, ControlEvent, DecodeError, DecodedEngine,
    DecodedMotion, RawFrame, SteeringControl, Timestamp,
};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use bus::{SocketCanConnector, SocketCanHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
