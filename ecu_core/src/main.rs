//! Binary entry point wiring simulated collaborators together for local
//! development and bench execution (spec §6). Grounded in `evo_hal`'s
//! clap + tracing CLI shape; the shared-memory wiring that binary pairs
//! it with is out of scope here (see `DESIGN.md`), so this loop drives
//! [`ecu_core::core::Core`] directly against a synthetic crank signal
//! instead of real silicon.

#![deny(warnings)]

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use clap::Parser;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, Signal, SigSet};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

use ecu_common::config::EcuConfig;
use ecu_common::consts::MISSING_TEETH;
use ecu_common::ecu::sensors::SensorSnapshot;
use ecu_core::calibration_store::FileCalibrationStore;
use ecu_core::config::load_config;
use ecu_core::core::{Collaborators, Core};
use ecu_core::decoder::{RawCamEdge, RawToothEdge};
use ecu_core::sim::{SimActuatorHardware, SimLambdaProvider, SimSensorProvider};
use ecu_core::stop_token::StopToken;

/// ECU real-time core, run against a synthetic crank/cam signal.
#[derive(Parser, Debug)]
#[command(name = "ecu_core")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Engine control unit real-time core (simulated collaborators)")]
#[command(long_about = None)]
struct Args {
    /// Path to an EcuConfig TOML file; falls back to built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the calibration store reads/writes its blob files in.
    #[arg(long, default_value = "./calibration")]
    calibration_dir: PathBuf,

    /// Simulated engine speed to hold for the run, in RPM.
    #[arg(long, default_value_t = 1500)]
    rpm: u32,

    /// How long to run the simulated crank before shutting down, in seconds.
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Enable verbose (DEBUG) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs as JSON instead of the default human-readable format.
    #[arg(long)]
    json: bool,
}

/// The stop token installed by [`install_signal_handlers`]; `None` until
/// `main` sets it, at which point SIGINT/SIGTERM request a clean shutdown
/// instead of the default terminate-on-signal behavior.
static STOP: OnceLock<StopToken> = OnceLock::new();

extern "C" fn handle_shutdown_signal(_: libc::c_int) {
    if let Some(token) = STOP.get() {
        token.request_stop();
    }
}

fn install_signal_handlers() -> Result<(), nix::Error> {
    let handler = SigHandler::Handler(handle_shutdown_signal);
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    unsafe {
        signal::sigaction(Signal::SIGINT, &action)?;
        signal::sigaction(Signal::SIGTERM, &action)?;
    }
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// A warm, healthy idle snapshot — reasonable defaults for a bench run
/// that isn't specifically exercising a fail-safe scenario.
fn warm_idle_snapshot() -> SensorSnapshot {
    SensorSnapshot {
        map_x10_kpa: 350,
        tps_x10_pct: 0,
        clt_c: 90,
        iat_c: 25,
        vbat_x10_v: 140,
        o2_mv: 450,
        sampled_at: 0,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        tracing::error!("ecu_core startup failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("ecu_core v{} starting (simulated run)", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EcuConfig::default(),
    };

    std::fs::create_dir_all(&args.calibration_dir)?;
    let calibration = FileCalibrationStore::new(args.calibration_dir.clone());

    let collaborators = Collaborators {
        sensors: Box::new(SimSensorProvider::new(warm_idle_snapshot())),
        lambda: Box::new(SimLambdaProvider::new()),
        hw: Box::new(SimActuatorHardware::new()),
        calibration: Box::new(calibration),
    };

    let tooth_per_rev = config.tooth_per_rev;
    let map_save_interval_ms = config.map_save_interval_ms;
    let core = Core::new(config, collaborators);

    let _ = STOP.set(core.stop_token());
    if let Err(e) = install_signal_handlers() {
        warn!("failed to install signal handlers, Ctrl+C will terminate immediately: {e}");
    }

    run_synthetic_crank(&core, &args, tooth_per_rev, map_save_interval_ms);

    info!("ecu_core shutdown complete");
    Ok(())
}

/// Drives the core with a synthetic 60-minus-`MISSING_TEETH` crank wheel
/// held at a constant RPM, pacing each tooth against wall-clock time the
/// way the teacher's `run_sim_loop` paces its control cycle with
/// `thread::sleep` rather than racing ahead of real time.
fn run_synthetic_crank(core: &Core, args: &Args, tooth_per_rev: u32, map_save_interval_ms: u32) {
    let tooth_count = tooth_per_rev - MISSING_TEETH;
    let normal_period_us = 60_000_000 / (args.rpm.max(1) * tooth_per_rev);
    let gap_period_us = normal_period_us * (MISSING_TEETH + 1);

    let run_for = Duration::from_secs(args.duration_secs);
    let start = std::time::Instant::now();

    let mut tick: u32 = 0;
    let mut revolution: u32 = 0;
    let mut elapsed_ms_at_last_save: u32 = 0;
    let mut elapsed_ms_at_last_failsafe: u32 = 0;

    info!(rpm = args.rpm, tooth_count, normal_period_us, "crank simulation armed");

    loop {
        if core.is_stop_requested() || start.elapsed() >= run_for {
            break;
        }

        for tooth in 0..tooth_count {
            if core.is_stop_requested() {
                break;
            }

            let period_us = if tooth == 0 { gap_period_us } else { normal_period_us };
            std::thread::sleep(Duration::from_micros(period_us as u64));
            tick = tick.wrapping_add(period_us);

            core.on_tooth_edge(RawToothEdge {
                capture_tick: tick,
                period_us,
            });

            if tooth == 0 && revolution % 2 == 0 {
                core.on_cam_edge(RawCamEdge { capture_tick: tick });
            }

            let elapsed_ms = start.elapsed().as_millis() as u32;
            if elapsed_ms.wrapping_sub(elapsed_ms_at_last_failsafe) >= 10 {
                elapsed_ms_at_last_failsafe = elapsed_ms;
                core.failsafe_tick(elapsed_ms);
            }
            if elapsed_ms.wrapping_sub(elapsed_ms_at_last_save) >= map_save_interval_ms {
                elapsed_ms_at_last_save = elapsed_ms;
                if let Err(e) = core.save_calibration() {
                    warn!("calibration autosave failed: {e}");
                }
            }
        }

        revolution = revolution.wrapping_add(1);
        if let Some(state) = core.runtime_state() {
            debug!(revolution, rpm = state.rpm, sync = ?state.sync_state, "revolution complete");
        }
    }

    core.emergency_stop_all();
}
