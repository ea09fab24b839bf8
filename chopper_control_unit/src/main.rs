//! # Chopper Control Unit
//!
//! Bring-up binary for the motion-control core. Loads the TOML
//! configuration, starts the motor-safety watchdog, wires the drives and
//! servo table to logging sinks and runs the control loop at a fixed tick
//! until Ctrl-C or the tick budget runs out.
//!
//! Until a gamepad link is attached the loop is fed neutral sticks, which
//! keeps every actuator fed and stationary.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chopper_common::clock::{Clock, Millis, MonotonicClock};
use chopper_common::config::LogLevel;
use chopper_common::consts::{DEFAULT_CONFIG_PATH, DEFAULT_TICK_MS};
use chopper_control_unit::config::{ControlUnitConfig, load_config};
use chopper_control_unit::cycle::{CycleHardware, CycleRunner};
use chopper_control_unit::drive::PeripheralSettings;
use chopper_control_unit::input::{ControllerFrame, ScriptedInput};
use chopper_control_unit::rt::ThreadPlacement;
use chopper_control_unit::safety::SafetyMonitor;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Chopper Control Unit: drive, dome and servo control loop
#[derive(Parser, Debug)]
#[command(name = "chopper_control_unit")]
#[command(version)]
#[command(about = "Fixed-tick motion control loop with motor-safety watchdog")]
struct Args {
    /// Path to the control unit configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after this many ticks (runs until Ctrl-C when omitted).
    #[arg(long)]
    ticks: Option<u64>,

    /// Control loop period in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// CPU core to pin the control loop to (`rt` feature).
    #[arg(long)]
    cpu_core: Option<usize>,

    /// SCHED_FIFO priority for the control loop (`rt` feature).
    #[arg(long)]
    rt_priority: Option<i32>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let loaded = load_config(&args.config);

    let level = match (&loaded, args.verbose) {
        (_, true) => LogLevel::Debug,
        (Ok(config), false) => config.shared.log_level,
        (Err(_), false) => LogLevel::Info,
    };
    setup_tracing(level, args.json);

    info!(
        "Chopper Control Unit v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {} ({e})", args.config.display());
            process::exit(1);
        }
    };

    if let Err(e) = run(&args, &config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Chopper Control Unit shutdown complete");
}

fn run(args: &Args, config: &ControlUnitConfig) -> Result<(), Box<dyn std::error::Error>> {
    if args.tick_ms == 0 {
        return Err("--tick-ms must be > 0".into());
    }
    info!(
        service = %config.shared.service_name,
        model = ?config.drive.model,
        servo_channels = config.servo.channel_count,
        "Config OK"
    );

    let placement = ThreadPlacement {
        cpu_core: args.cpu_core,
        priority: args.rt_priority,
    };
    placement.apply_locked()?;
    info!(?placement, "RT setup complete");

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let monitor = SafetyMonitor::new(config.safety.cadence(), config.safety.placement());

    let mut runner = CycleRunner::new(
        config,
        logging_hardware(),
        Box::new(ScriptedInput::holding([ControllerFrame::default()])),
        clock,
        &monitor,
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let stats = runner.run(Duration::from_millis(args.tick_ms), &running, args.ticks);
    monitor.shutdown();
    info!(
        ticks = stats.cycle_count,
        watchdog_stops = monitor.stops_issued(),
        "control loop finished"
    );
    Ok(())
}

/// Motor controller settings are only logged on this build.
struct LoggedController {
    name: &'static str,
}

impl PeripheralSettings for LoggedController {
    fn ramping_changed(&self, ramping: u8) {
        info!(controller = self.name, ramping, "ramping set");
    }

    fn deadband_changed(&self, deadband: f32) {
        info!(controller = self.name, deadband, "deadband set");
    }

    fn expiration_changed(&self, expiration_ms: Millis) {
        info!(controller = self.name, expiration_ms, "expiration set");
    }
}

fn logging_hardware() -> CycleHardware {
    CycleHardware {
        left: Box::new(|value: f32| debug!(motor = "left", value, "motor output")),
        right: Box::new(|value: f32| debug!(motor = "right", value, "motor output")),
        dome: Box::new(|value: f32| debug!(motor = "dome", value, "motor output")),
        pulses: Box::new(|first: u8, pulses: &[u16]| {
            debug!(first, ?pulses, "servo pulses");
        }),
        body_peripheral: Some(Box::new(LoggedController { name: "body" })),
        dome_peripheral: Some(Box::new(LoggedController { name: "dome" })),
    }
}

fn setup_tracing(level: LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
