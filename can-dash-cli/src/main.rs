//! CAN Dash CLI Application
//!
//! Command-line front end for the can-dash-decoder library. It:
//! - Loads the static bus/vehicle configuration (dash.toml)
//! - Starts the ingestion loop on a background thread
//! - Prints every dash notification to stdout (text or JSON lines)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

mod config;
mod display;

use display::OutputFormat;

/// CAN Dash - Live vehicle values from a CAN bus
#[derive(Parser, Debug)]
#[command(name = "can-dash")]
#[command(about = "Decode live CAN bus frames into dashboard values", long_about = None)]
#[command(version)]
struct Args {
    /// SocketCAN interface (overrides the config file)
    #[arg(short, long, value_name = "IFACE")]
    interface: Option<String>,

    /// Expected bus bit rate (overrides the config file)
    #[arg(short, long, value_name = "BPS")]
    bitrate: Option<u32>,

    /// Path to configuration file (dash.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format for notifications
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Stop after this many notifications (for testing)
    #[arg(long, value_name = "COUNT")]
    max_events: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Dash CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_dash_decoder::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => can_dash_decoder::DashConfig::default(),
    };
    let config = config::finalize(config, args.interface.as_deref(), args.bitrate)?;
    log::debug!("Configuration: {:?}", config);

    run(&args, config)
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn run(args: &Args, config: can_dash_decoder::DashConfig) -> Result<()> {
    use can_dash_decoder::{emit_defaults, FrameProcessor, IngestionLoop, SocketCanConnector};
    use std::io::{self, Write};
    use std::sync::mpsc;

    let (tx, rx) = mpsc::channel();
    emit_defaults(&tx);

    let ingest = IngestionLoop::new(
        SocketCanConnector::new(config.bus.clone()),
        FrameProcessor::from_config(&config),
        tx,
    )
    .with_reconnect_policy(config.reconnect);
    let cancel = ingest.cancellation_token();
    let handle = ingest
        .spawn()
        .context("Failed to start ingestion thread")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut count = 0usize;

    for event in rx.iter() {
        display::write_event(&mut out, args.format, &event)?;
        out.flush()?;

        count += 1;
        if args.max_events.is_some_and(|max| count >= max) {
            log::info!("Reached {} notifications, stopping", count);
            break;
        }
    }

    cancel.cancel();
    match handle.join() {
        Ok(stats) => {
            log::info!(
                "Frames: {} received, {} decoded, {} ignored, {} malformed; {} connect attempts, {} disconnects",
                stats.frames_received,
                stats.frames_decoded,
                stats.frames_ignored,
                stats.frames_malformed,
                stats.connect_attempts,
                stats.disconnects
            );
            if args.format == OutputFormat::Json {
                log::debug!("Stats: {}", serde_json::to_string(&stats)?);
            }
        }
        Err(_) => anyhow::bail!("Ingestion thread panicked"),
    }

    Ok(())
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn run(_args: &Args, _config: can_dash_decoder::DashConfig) -> Result<()> {
    anyhow::bail!("This build has no CAN backend (SocketCAN requires Linux and the `socketcan` feature)")
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
