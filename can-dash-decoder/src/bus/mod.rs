//! Bus connection management
//!
//! A [`BusConnector`] knows how to open one channel to the bus and nothing
//! more: no retries, no backoff. The [`ConnectionManager`] owns the connector,
//! the open handle (if any) and the explicit [`ConnectionState`]. Retry policy
//! lives in the ingestion loop.

use crate::types::{ConnectionError, ConnectionState, RawFrame};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use self::socketcan::{SocketCanConnector, SocketCanHandle};

/// An open channel to the bus
pub trait FrameSource {
    /// Block until the next frame arrives
    ///
    /// Returns `Ok(None)` when no frame arrived within the source's read
    /// window, and an error when the link is gone.
    fn receive(&mut self) -> Result<Option<RawFrame>, ConnectionError>;
}

/// Opens channels to the bus with a fixed transport configuration
pub trait BusConnector {
    type Handle: FrameSource;

    /// Make a single connection attempt
    fn connect(&mut self) -> Result<Self::Handle, ConnectionError>;

    /// Human-readable name of the channel, for logging
    fn describe(&self) -> String;
}

/// Owns the bus handle and its lifecycle state
pub struct ConnectionManager<C: BusConnector> {
    connector: C,
    handle: Option<C::Handle>,
    state: ConnectionState,
}

impl<C: BusConnector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            handle: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.state == ConnectionState::Online
    }

    /// Attempt to open the bus, replacing any previous handle
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        self.handle = None;
        self.state = ConnectionState::Connecting;

        match self.connector.connect() {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = ConnectionState::Online;
                log::info!("Connected to {}", self.connector.describe());
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                log::debug!("Connection attempt on {} failed: {}", self.connector.describe(), e);
                Err(e)
            }
        }
    }

    /// Read the next frame from the open handle
    ///
    /// Any error closes the handle and moves the manager to `Disconnected`.
    pub fn receive(&mut self) -> Result<Option<RawFrame>, ConnectionError> {
        let handle = match self.handle.as_mut() {
            Some(handle) => handle,
            None => {
                self.state = ConnectionState::Disconnected;
                return Err(ConnectionError::LinkDown(self.connector.describe()));
            }
        };

        match handle.receive() {
            Ok(frame) => Ok(frame),
            Err(e) => {
                log::info!("Lost connection to {}: {}", self.connector.describe(), e);
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Close the handle, if any
    pub fn disconnect(&mut self) {
        self.handle = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Access the underlying connector
    pub fn connector(&self) -> &C {
        &self.connector
    }
}
