//! # GeckoBot Control Unit
//!
//! Loads the control unit configuration, wires the hardware proxies into
//! the control context, starts the operator endpoint and runs the mode
//! dispatcher on the calling thread until `QUIT`.
//!
//! This build drives the simulated bench from `gecko_hal`; operator input
//! comes from a `--script` file.

use clap::Parser;
use gecko_common::config::{ConfigError, ConfigLoader};
use gecko_common::consts::DEFAULT_CONFIG_PATH;
use gecko_common::control_unit::config::ControlUnitConfig;
use gecko_common::mode::Mode;
use gecko_control_unit::comm::{CommThread, OperatorLink, Script, ScriptEndpoint};
use gecko_control_unit::context::ControlContext;
use gecko_control_unit::cycle::rt_setup;
use gecko_control_unit::modes::{build_dispatcher, terminal};
use gecko_hal::{BenchConfig, SimBench};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// GeckoBot Control Unit: mode dispatcher, PID loops and gait playback
#[derive(Parser, Debug)]
#[command(name = "gecko_control_unit")]
#[command(author = "GeckoBot")]
#[command(version)]
#[command(about = "Real-time control loop for the pneumatic GeckoBot")]
struct Args {
    /// Control unit configuration TOML. Built-in defaults are used when the
    /// default path does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Operator script replayed by the communication thread.
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// CPU core to pin the sampling thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
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
    let config = load_config(&args.config);
    let directive = match &config {
        Ok(c) if !args.verbose => c.shared.log_level.as_directive(),
        _ if args.verbose => "debug",
        _ => "info",
    };
    setup_tracing(&args, directive);

    info!("GeckoBot Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.map_err(Into::into).and_then(|c| run(&args, c)) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("GeckoBot Control Unit shutdown complete");
}

fn load_config(path: &Path) -> Result<ControlUnitConfig, ConfigError> {
    match ControlUnitConfig::load(path) {
        Err(ConfigError::FileNotFound) if path == Path::new(DEFAULT_CONFIG_PATH) => {
            Ok(ControlUnitConfig::default())
        }
        other => other,
    }
}

fn run(args: &Args, config: ControlUnitConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    info!(
        "Config OK: sampling_period={}µs, start_mode={}, valves={}, dvalves={}",
        config.sampling_period_us,
        config.start_mode,
        config.hardware.valves.len(),
        config.hardware.dvalves.len(),
    );

    let bench = SimBench::new(&config.hardware, BenchConfig::default());
    let mut ctx = ControlContext::new(&config, bench.proxies())?;
    let link = OperatorLink::new(ctx.shared());

    let signal_link = link.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        signal_link.request_mode(Mode::Exit);
    })?;

    let comm = match &args.script {
        Some(path) => {
            let script = Script::load(path)?;
            info!("Loaded {} script steps from {}", script.steps.len(), path.display());
            Some(CommThread::spawn(ScriptEndpoint::new(script), link)?)
        }
        None => {
            warn!("No operator endpoint, stop with Ctrl-C");
            None
        }
    };

    terminal::supervise(&mut ctx, comm, |ctx| -> Result<(), Box<dyn std::error::Error>> {
        rt_setup(args.cpu_core, args.rt_priority)?;
        info!(
            "RT setup complete (cpu_core={}, priority={})",
            args.cpu_core, args.rt_priority
        );

        let mut dispatcher = build_dispatcher(config.start_mode, config.route_faults_to_error);
        let mode = dispatcher.run(ctx)?;
        ctx.enter(mode);
        Ok(())
    })
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, directive: &str) {
    let filter = EnvFilter::from_default_env()
        .add_directive(directive.parse().unwrap_or_else(|_| tracing::Level::INFO.into()));

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
