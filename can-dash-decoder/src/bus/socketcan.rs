//! SocketCAN backend
//!
//! Opens a raw CAN socket on a Linux network interface. The bit rate itself is
//! applied when the interface is brought up (`ip link set can0 type can
//! bitrate 33300`); here it is only compared against what the kernel reports.

use super::{BusConnector, FrameSource};
use crate::config::BusConfig;
use crate::types::{ConnectionError, RawFrame};
use socketcan::{CanFrame, CanInterface, CanSocket, EmbeddedFrame, Frame, Socket};
use std::io;
use std::time::Duration;

/// Connects to a SocketCAN interface with a fixed configuration
pub struct SocketCanConnector {
    config: BusConfig,
}

impl SocketCanConnector {
    pub fn new(config: BusConfig) -> Self {
        Self { config }
    }

    fn check_bitrate(&self) {
        let iface = match CanInterface::open(&self.config.interface) {
            Ok(iface) => iface,
            Err(_) => return,
        };
        match iface.bit_rate() {
            Ok(Some(rate)) if rate != self.config.bitrate => {
                log::warn!(
                    "Interface {} runs at {} bit/s, expected {} bit/s",
                    self.config.interface,
                    rate,
                    self.config.bitrate
                );
            }
            Ok(_) => {}
            Err(e) => log::debug!("Could not query bit rate of {}: {:?}", self.config.interface, e),
        }
    }
}

impl BusConnector for SocketCanConnector {
    type Handle = SocketCanHandle;

    fn connect(&mut self) -> Result<SocketCanHandle, ConnectionError> {
        let socket = CanSocket::open(&self.config.interface)
            .map_err(|e| ConnectionError::from_io(&self.config.interface, e))?;

        self.check_bitrate();

        Ok(SocketCanHandle {
            socket,
            interface: self.config.interface.clone(),
            read_timeout: self.config.read_timeout(),
        })
    }

    fn describe(&self) -> String {
        format!("{} @ {} bit/s", self.config.interface, self.config.bitrate)
    }
}

/// An open SocketCAN socket
pub struct SocketCanHandle {
    socket: CanSocket,
    interface: String,
    read_timeout: Duration,
}

impl FrameSource for SocketCanHandle {
    fn receive(&mut self) -> Result<Option<RawFrame>, ConnectionError> {
        match self.socket.read_frame_timeout(self.read_timeout) {
            Ok(CanFrame::Data(frame)) => Ok(Some(RawFrame::new(frame.raw_id(), frame.data()))),
            Ok(CanFrame::Remote(frame)) => {
                log::trace!("Skipping remote frame 0x{:X}", frame.raw_id());
                Ok(None)
            }
            Ok(CanFrame::Error(frame)) => {
                log::debug!("Error frame on {}: 0x{:X}", self.interface, frame.raw_id());
                Ok(None)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(ConnectionError::from_io(&self.interface, e)),
        }
    }
}
