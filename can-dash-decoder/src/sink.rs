//! Notifications delivered to the presentation layer
//!
//! The core never talks to a UI directly. It pushes [`DashEvent`]s into an
//! [`EventSink`], one per value, in the order frames were decoded. Getting
//! them onto the UI thread is the sink's job.

use crate::types::ControlEvent;
use serde::{Deserialize, Serialize};
use std::sync::mpsc;

/// One decoded value or status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DashEvent {
    /// Bus connectivity (true = online)
    CanOnline(bool),
    /// Vehicle speed in km/h
    Speed(f64),
    /// Engine speed in rpm
    Rpm(u32),
    /// Coolant temperature in °C
    EngineTemp(i32),
    EngineRunning(bool),
    CruiseControlActive(bool),
    /// Outside air temperature in °C
    AirTemp(f64),
    /// Fuel level as a percentage of tank capacity
    FuelPercentage(f64),
    SteeringWheelControl(ControlEvent),
}

/// Fire-and-forget receiver of dash notifications
///
/// Called from the ingestion thread, hence `Send`.
pub trait EventSink: Send {
    fn emit(&self, event: DashEvent);
}

impl EventSink for mpsc::Sender<DashEvent> {
    fn emit(&self, event: DashEvent) {
        // A dropped receiver means nobody is listening any more
        if self.send(event).is_err() {
            log::trace!("Event receiver dropped, notification discarded");
        }
    }
}

impl EventSink for mpsc::SyncSender<DashEvent> {
    fn emit(&self, event: DashEvent) {
        if self.send(event).is_err() {
            log::trace!("Event receiver dropped, notification discarded");
        }
    }
}

impl<S: EventSink + Sync> EventSink for std::sync::Arc<S> {
    fn emit(&self, event: DashEvent) {
        (**self).emit(event)
    }
}

/// Initial state shown before the first frame arrives: engine off, bus offline
pub fn emit_defaults(sink: &dyn EventSink) {
    sink.emit(DashEvent::EngineRunning(false));
    sink.emit(DashEvent::CanOnline(false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SteeringControl;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_channel_sink_preserves_order() {
        let (tx, rx) = mpsc::channel();
        tx.emit(DashEvent::Speed(50.0));
        tx.emit(DashEvent::Rpm(1200));
        drop(tx);

        let received: Vec<DashEvent> = rx.iter().collect();
        assert_eq!(received, vec![DashEvent::Speed(50.0), DashEvent::Rpm(1200)]);
    }

    #[test]
    fn test_emit_to_dropped_receiver_is_harmless() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        tx.emit(DashEvent::CanOnline(true));
    }

    #[test]
    fn test_emit_defaults() {
        let (tx, rx) = mpsc::channel();
        emit_defaults(&tx);
        drop(tx);

        let received: Vec<DashEvent> = rx.iter().collect();
        assert_eq!(
            received,
            vec![DashEvent::EngineRunning(false), DashEvent::CanOnline(false)]
        );
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&DashEvent::Rpm(800)).unwrap();
        assert_eq!(json, r#"{"kind":"rpm","value":800}"#);

        let time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let event = DashEvent::SteeringWheelControl(ControlEvent {
            control: SteeringControl::Mute,
            time,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"steering_wheel_control","value":{"control":"mute","time":"2024-01-01T12:00:00Z"}}"#
        );
    }
}
