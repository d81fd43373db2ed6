//! Console rendering of dash notifications
//!
//! Stands in for the graphical dashboard: every event is printed on its own
//! line, either human-readable or as one JSON object per line.

use anyhow::Result;
use can_dash_decoder::DashEvent;
use clap::ValueEnum;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Human-readable form of one event
pub fn format_text(event: &DashEvent) -> String {
    match event {
        DashEvent::CanOnline(true) => "CAN        online".to_string(),
        DashEvent::CanOnline(false) => "CAN        offline".to_string(),
        DashEvent::Speed(kmh) => format!("Speed      {:.1} km/h", kmh),
        DashEvent::Rpm(rpm) => format!("RPM        {}", rpm),
        DashEvent::EngineTemp(temp) => format!("Coolant    {} °C", temp),
        DashEvent::EngineRunning(running) => {
            format!("Engine     {}", if *running { "running" } else { "off" })
        }
        DashEvent::CruiseControlActive(active) => {
            format!("Cruise     {}", if *active { "active" } else { "inactive" })
        }
        DashEvent::AirTemp(temp) => format!("Air        {:.1} °C", temp),
        DashEvent::FuelPercentage(pct) => format!("Fuel       {:.1} %", pct),
        DashEvent::SteeringWheelControl(event) => format!(
            "Button     {} at {}",
            event.control,
            event.time.format("%H:%M:%S%.3f")
        ),
    }
}

/// Write one event in the chosen format
pub fn write_event(out: &mut impl Write, format: OutputFormat, event: &DashEvent) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", format_text(event))?,
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, event)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
