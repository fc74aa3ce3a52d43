//! Day/night scheduler binary.
//!
//! Runs one [`Scheduler`] against a [`SimulatedSky`] and takes commands
//! from standard input.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `daynight-config.yaml` (or `DAYNIGHT_CONFIG`),
//!    upgrading and saving it back if needed
//! 2. Initialize structured logging (tracing), `RUST_LOG` over `logging.level`
//! 3. Log any configuration warnings
//! 4. Build the sky and the scheduler
//! 5. Start the scheduler, retrying until the sky is ready
//! 6. Spawn the stdin command reader
//! 7. Run the scheduler loop until Ctrl-C or stdin closes
//!
//! [`Scheduler`]: daynight_core::scheduler::Scheduler
//! [`SimulatedSky`]: daynight_core::clock::SimulatedSky

mod console;
mod error;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{Timelike, Utc};
use daynight_core::clock::SimulatedSky;
use daynight_core::config::{ConfigStore, YamlFileStore};
use daynight_core::runner::{self, LogSink, SchedulerJob};
use daynight_core::scheduler::Scheduler;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "daynight-config.yaml";

/// How long the simulated sky takes to come up, as a host world would
/// while loading.
const SKY_WARMUP: Duration = Duration::from_millis(1500);

/// Sunrise hour of the simulated sky.
const SUNRISE_HOUR: f64 = 6.0;

/// Sunset hour of the simulated sky.
const SUNSET_HOUR: f64 = 18.0;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded, logging cannot be
/// initialized, or the scheduler fails to start.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is configured from it, so warnings
    //    are held until the subscriber exists.
    let config_path = std::env::var_os("DAYNIGHT_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let mut store = YamlFileStore::new(config_path);
    let loaded = store.load().map_err(EngineError::from)?;

    // 2. Initialize structured logging.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&loaded.config.logging.level).map_err(|e| {
            EngineError::LogFilter {
                level: loaded.config.logging.level.clone(),
                message: e.to_string(),
            }
        })?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("daynight-engine starting");

    // 3. Report what loading changed.
    for warning in &loaded.warnings {
        warn!(%warning, "Configuration warning");
    }
    let config = loaded.config;
    info!(
        path = %store.path().display(),
        schema_version = config.schema_version,
        day_length_minutes = config.phase.day_length_minutes,
        night_length_minutes = config.phase.night_length_minutes,
        vote_enabled = config.vote.enabled,
        tick_interval_ms = config.engine.tick_interval_ms,
        "Configuration loaded"
    );

    // 4. Build the sky and scheduler. The sky starts at the wall-clock hour.
    let now = Utc::now();
    let start_hour = f64::from(now.hour()) + f64::from(now.minute()) / 60.0;
    let sky = SimulatedSky::new(start_hour, SUNRISE_HOUR, SUNSET_HOUR)
        .ready_after(Instant::now().checked_add(SKY_WARMUP).unwrap_or_else(Instant::now));
    let tick_interval = Duration::from_millis(config.engine.tick_interval_ms);
    let retry_interval = Duration::from_millis(config.engine.clock_retry_interval_ms);
    let mut scheduler = Scheduler::new(config, sky, Box::new(store));

    // 5. Start, waiting for the sky. Ctrl-C during the wait exits cleanly.
    tokio::select! {
        started = runner::start_when_ready(&mut scheduler, retry_interval) => {
            let attempts = started.map_err(EngineError::from)?;
            info!(attempts, "Sky ready");
        }
        () = shutdown_signal() => {
            info!("Shutdown before the sky was ready");
            return Ok(());
        }
    }

    // 6. Spawn the command reader.
    let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<SchedulerJob<SimulatedSky>>();
    let reader = tokio::spawn(console::read_commands(jobs_tx));
    info!("Reading commands from standard input (try daynight.help)");

    // 7. Run until Ctrl-C or end of input.
    let mut sink = LogSink;
    let summary = runner::run_scheduler(
        &mut scheduler,
        &mut jobs_rx,
        shutdown_signal(),
        &mut sink,
        tick_interval,
    )
    .await;

    reader.abort();
    info!(
        ticks = summary.ticks,
        jobs = summary.jobs,
        notifications = summary.notifications,
        "daynight-engine shutdown complete"
    );
    Ok(())
}

/// Resolve on Ctrl-C. If the handler cannot be installed, never resolve.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
