//! DishaStream - tracker displacement streaming daemon
//!
//! ## Data Flow
//!
//! - **Log file**: every tick appends one record (always, even offline)
//! - **TCP (default 127.0.0.1:12346)**: after connecting, sends the handshake
//!   token, then streams the same records line by line
//!
//! If the listener is unreachable the daemon keeps logging; streaming is
//! simply absent for the session.

use clap::Parser;
use disha_stream::config::Config;
use disha_stream::pose::SimulatedTrackers;
use disha_stream::sink::FileLogSink;
use disha_stream::stream::{StreamController, TickLoop};
use disha_stream::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Config file looked up in the working directory when `--config` is absent
const DEFAULT_CONFIG_PATH: &str = "disha-stream.toml";

#[derive(Parser, Debug)]
#[command(name = "disha-stream", version, about = "Stream tracker displacement vectors to a remote listener")]
struct Args {
    /// Configuration file (default: ./disha-stream.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener address (overrides [connection] address)
    #[arg(long)]
    address: Option<String>,

    /// Listener port (overrides [connection] port)
    #[arg(long)]
    port: Option<u16>,

    /// Record log file (overrides [record] path)
    #[arg(long)]
    record_path: Option<String>,

    /// Stop after N ticks (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    ticks: u64,

    /// Log records only; never open the network link
    #[arg(long)]
    no_stream: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)?,
        None => Config::default(),
    };

    if let Some(address) = &args.address {
        config.connection.address = address.clone();
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    if let Some(path) = &args.record_path {
        config.record.path = path.clone();
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize logger (RUST_LOG wins over the config file)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("DishaStream v{} starting", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => log::info!("Using config: {}", path.display()),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            log::info!("Using config: {}", DEFAULT_CONFIG_PATH)
        }
        None => log::info!("Using built-in defaults"),
    }
    log::info!(
        "Listener {}, records to {}",
        config.remote(),
        config.record.path
    );

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    let sink = FileLogSink::open(&config.record.path)?;
    let mut controller = StreamController::from_config(&config, sink);

    if args.no_stream {
        log::info!("Streaming disabled; logging records only");
    } else if let Err(e) =
        controller.start_session(&config.connection.address, config.connection.port)
    {
        // Degraded mode: keep logging without a listener
        log::warn!("Continuing without streaming: {}", e);
    }

    let mut trackers = SimulatedTrackers::from_config(&config)?;
    let ticker = TickLoop::new(config.simulation.tick_rate_hz, running).with_max_ticks(args.ticks);
    ticker.run(&mut trackers, &mut controller);

    controller.shutdown();
    log::info!("DishaStream stopped");
    Ok(())
}
