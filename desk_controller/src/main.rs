//! # Desk Controller
//!
//! General controller of the dual-gearbox desk.
//!
//! Reads panel frames from stdin (or `--panel`), talks to the two gearboxes
//! over Linux `i2c-dev` (`--i2c-device`) or, without a device, to two
//! simulated gearbox nodes running in-process, and enters the fixed-period
//! control loop until interrupted.

use clap::Parser;
use desk_common::bus::BusTransport;
use desk_common::config::{DeskConfig, LogLevel};
use desk_controller::coordinator::Coordinator;
use desk_controller::cycle::{CycleRunner, rt_setup};
use desk_controller::link::I2cBus;
use desk_controller::panel::StreamPanel;
use desk_controller::power::{PowerSwitches, SimPowerSwitches, SysfsPowerSwitches};
use desk_gearbox::{GearboxNode, SimulatedBus};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Desk Controller: coordinates both gearboxes of the desk
#[derive(Parser, Debug)]
#[command(name = "desk_controller")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "General controller for the dual-gearbox desk")]
struct Args {
    /// TOML configuration file. Built-in defaults when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// I2C adapter of the gearbox bus (e.g. /dev/i2c-1).
    /// Without it both gearboxes are simulated in-process.
    #[arg(long, value_name = "PATH")]
    i2c_device: Option<PathBuf>,

    /// Panel byte stream (serial device or file). Defaults to stdin.
    #[arg(long, value_name = "PATH")]
    panel: Option<PathBuf>,

    /// GPIO value file switching the gearbox power rail.
    #[arg(long, value_name = "PATH", requires = "motor_supply_gpio")]
    gearbox_power_gpio: Option<PathBuf>,

    /// GPIO value file switching the motor power supply.
    #[arg(long, value_name = "PATH", requires = "gearbox_power_gpio")]
    motor_supply_gpio: Option<PathBuf>,

    /// Start position of the simulated gearboxes [steps].
    #[arg(long, default_value_t = 20_000)]
    sim_position: u32,

    /// SCHED_FIFO priority with the `rt` feature (0 = unchanged).
    #[arg(long, default_value_t = 0)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = DeskConfig::load_or_default(args.config.as_deref());
    let level = match &config {
        Ok(c) => c.log_level,
        Err(_) => LogLevel::Info,
    };
    setup_tracing(&args, level);

    info!("Desk Controller v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Desk Controller shutdown complete");
}

fn run(args: &Args, config: DeskConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        cycle_ms = config.timing.cycle_time_ms,
        hard = config.deviation.hard,
        soft = config.deviation.soft,
        stop_recovery = config.deviation.stop_recovery,
        "Config OK"
    );

    let bus: Box<dyn BusTransport> = match &args.i2c_device {
        Some(path) => Box::new(I2cBus::open(path)?),
        None => Box::new(simulated_bus(&config, args.sim_position)?),
    };

    let power: Box<dyn PowerSwitches> = match (&args.gearbox_power_gpio, &args.motor_supply_gpio) {
        (Some(gearbox), Some(motor)) => Box::new(SysfsPowerSwitches::new(gearbox, motor)),
        _ => {
            info!("Power rails simulated");
            Box::new(SimPowerSwitches::new())
        }
    };

    let panel = StreamPanel::open(args.panel.as_deref())?;

    rt_setup(args.rt_priority)?;
    info!(rt_priority = args.rt_priority, "RT setup complete");

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let coordinator = Coordinator::new(config, bus, power);
    let mut runner = CycleRunner::new(coordinator, panel, running);
    runner.run()?;
    Ok(())
}

/// Two simulated gearbox nodes with running step timers.
fn simulated_bus(config: &DeskConfig, position: u32) -> Result<SimulatedBus, Box<dyn std::error::Error>> {
    let mut bus = SimulatedBus::new();
    for (name, address) in [("left", config.bus.left_address), ("right", config.bus.right_address)] {
        let mut node = GearboxNode::simulated(name, address, &config.gearbox, config.deviation, position);
        node.start_timer(config.gearbox.step_interval())?;
        bus.attach(Arc::new(node));
    }
    Ok(bus)
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match configured {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
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
