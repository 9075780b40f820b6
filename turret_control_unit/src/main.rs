//! # Turret Control Unit
//!
//! Runs the turret control core against the host simulation: simulated
//! encoders, motors, photosensors and trigger servo, with a plant task that
//! moves the turret as the motors are driven.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use turret_common::config::LogLevel;
use turret_control_unit::config::load_config;
use turret_control_unit::cycle::{TaskSpec, rt_lock_memory};
use turret_control_unit::error::UnitError;
use turret_control_unit::sim::{SimPlant, SimRig};
use turret_control_unit::telemetry::TelemetryTarget;
use turret_control_unit::unit::ControlUnit;

/// Priority of the simulated plant, above every control task.
const PLANT_PRIORITY: u8 = 5;

/// Poll interval of the main thread while the unit runs.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Turret Control Unit — encoder decoding, axis control, target acquisition
#[derive(Parser, Debug)]
#[command(name = "turret_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Two-axis turret control core on a simulated plant")]
struct Args {
    /// Path to the configuration TOML. Built-in defaults when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CPU core to pin every task thread to (overrides the configuration).
    #[arg(long)]
    cpu_core: Option<usize>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long, value_name = "SECONDS")]
    run_for: Option<f64>,

    /// Controller telemetry destination: stdout, log or off.
    #[arg(long, default_value = "stdout")]
    telemetry: TelemetryTarget,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    dump_config: bool,
}

fn main() {
    let args = Args::parse();
    let log_level = peek_log_level(&args);
    setup_tracing(&args, log_level);

    info!("Turret Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Turret Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), UnitError> {
    let mut loaded = load_config(args.config.as_deref())?;
    if let Some(cpu) = args.cpu_core {
        loaded.turret.scheduling.cpu_core = cpu;
    }
    if args.dump_config {
        print!("{}", loaded.to_toml()?);
        return Ok(());
    }
    let turret = &loaded.turret;
    info!(
        control_period_ms = turret.control.period_ms,
        acquisition_period_ms = turret.acquisition.period_ms,
        cpu_core = turret.scheduling.cpu_core,
        "Config OK"
    );

    rt_lock_memory()?;

    let rig = SimRig::new(turret);
    let target = args.telemetry;
    let mut unit = ControlUnit::build(turret, rig.peripherals(&turret.encoders), |_| {
        target.sink()
    });
    let plant = SimPlant::new(loaded.sim.clone(), turret, &rig, unit.interrupts());
    unit.add_task(
        Box::new(plant),
        TaskSpec::new(
            loaded.sim.plant_period_ms,
            PLANT_PRIORITY,
            turret.scheduling.cpu_core,
        ),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let s = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    })?;

    let running = unit.spawn(Arc::clone(&shutdown))?;

    let deadline = args
        .run_for
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    while !shutdown.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("Run time elapsed");
            running.stop();
            break;
        }
        thread::sleep(WAIT_POLL);
    }

    for (task, stats) in running.join()? {
        if stats.overruns > 0 {
            warn!(task = %task, overruns = stats.overruns, "Task overran its period");
        }
        info!(
            task = %task,
            cycles = stats.cycle_count,
            avg_ns = stats.avg_cycle_ns(),
            max_ns = stats.max_cycle_ns,
            max_latency_ns = stats.max_latency_ns,
            "Task statistics"
        );
    }
    info!(shots = rig.servo.shots(), "Shots fired");
    Ok(())
}

/// Log level from the configuration file, read before tracing exists.
/// Load errors are reported again, with logging, by [`run`].
fn peek_log_level(args: &Args) -> LogLevel {
    load_config(args.config.as_deref())
        .map(|loaded| loaded.turret.shared.log_level)
        .unwrap_or_default()
}

/// Setup tracing subscriber based on CLI arguments. Logs go to stderr,
/// stdout carries telemetry.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        log_level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
