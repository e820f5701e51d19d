//! Serial Class Agent CLI
//!
//! Turns a classifier device's serial output into logged classifications.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serial_class_agent::{
    config::Config,
    core::{ClassificationPolicy, CycleDriver, Dispatcher, WindowAggregator},
    sink::{FileClassLog, TerminalDisplay},
    source::{list_ports, open_replay, open_serial, ChannelLineSource},
    stats::{create_shared_stats, StatsSnapshot},
    VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "serial-class")]
#[command(version = VERSION)]
#[command(about = "Windowed classification logger for serial classifier devices", long_about = None)]
struct Cli {
    /// Enable debug logging (every received line is traced)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the device and log classifications until interrupted
    Run {
        /// Serial port (e.g. /dev/ttyACM0, COM11)
        #[arg(long)]
        port: Option<String>,

        /// Serial link rate
        #[arg(long)]
        baud: Option<u32>,

        /// Aggregation window in milliseconds
        #[arg(long)]
        window_ms: Option<u64>,

        /// Classification log file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Wait after opening the port, in milliseconds
        #[arg(long)]
        settle_ms: Option<u64>,

        /// Replay recorded device output from a file ('-' for stdin) instead of a port
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Delay between replayed lines in milliseconds
        #[arg(long, default_value = "0")]
        replay_delay_ms: u64,
    },

    /// List serial ports
    Ports,

    /// Show configuration and last session statistics
    Status,

    /// Show configuration
    Config,
}

struct RunArgs {
    port: Option<String>,
    baud: Option<u32>,
    window_ms: Option<u64>,
    output: Option<PathBuf>,
    settle_ms: Option<u64>,
    replay: Option<PathBuf>,
    replay_delay_ms: u64,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            port,
            baud,
            window_ms,
            output,
            settle_ms,
            replay,
            replay_delay_ms,
        } => cmd_run(RunArgs {
            port,
            baud,
            window_ms,
            output,
            settle_ms,
            replay,
            replay_delay_ms,
        }),
        Commands::Ports => cmd_ports().map(|_| 0),
        Commands::Status => cmd_status().map(|_| 0),
        Commands::Config => cmd_config().map(|_| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            std::process::exit(1);
        }
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not load config, using defaults");
        Config::default()
    });
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if let Some(ms) = args.window_ms {
        config.window_duration = Duration::from_millis(ms);
    }
    if let Some(output) = args.output {
        config.log_path = output;
    }
    if let Some(ms) = args.settle_ms {
        config.settle_delay = Duration::from_millis(ms);
    }
    config.validate()?;

    println!("Serial Class Agent v{VERSION}");
    println!();
    match &args.replay {
        Some(path) => println!("  Source: replay of {}", path.display()),
        None => println!("  Source: {} at {} baud", config.port, config.baud_rate),
    }
    println!("  Window duration: {}ms", config.window_duration.as_millis());
    println!("  Classification log: {}", config.log_path.display());
    println!(
        "  Sentinels: {}",
        config.sentinels.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = Arc::new(AtomicBool::new(false));
    ctrlc_handler(shutdown.clone())?;

    let mut source: ChannelLineSource = match &args.replay {
        Some(path) => open_replay(path, Duration::from_millis(args.replay_delay_ms))?,
        None => open_serial(&config.serial_settings())?,
    };

    let stats = create_shared_stats();
    let aggregator =
        WindowAggregator::new(config.window_duration, config.poll_interval, stats.clone());
    let dispatcher = Dispatcher::new(
        ClassificationPolicy::new(config.sentinels.clone()),
        FileClassLog::new(&config.log_path),
        TerminalDisplay::new(),
        stats.clone(),
    );
    let mut driver = CycleDriver::new(aggregator, dispatcher);

    let result = driver.run(&mut source, &shutdown);

    source.stop();
    driver.dispatcher_mut().display_mut().close();

    let exit_code = match result {
        Ok(outcome) => {
            info!(?outcome, "classification stopped");
            0
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, port = %config.port, "device connection failed");
            1
        }
        Err(e) => {
            info!(reason = %e, "classification stopped");
            0
        }
    };

    if let Err(e) = stats.save(&config.stats_path()) {
        warn!(error = %e, "could not save session statistics");
    }

    println!();
    println!("{}", stats.summary());
    Ok(exit_code)
}

fn cmd_ports() -> Result<()> {
    let ports = list_ports().context("could not enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    for port in ports {
        println!("{:<24} {}", port.name, port.kind);
    }
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load().context("could not load configuration")?;

    println!("Serial Class Agent Status");
    println!("=========================");
    println!();
    println!("Configuration:");
    println!("  Port: {} at {} baud", config.port, config.baud_rate);
    println!("  Window duration: {}ms", config.window_duration.as_millis());
    println!("  Classification log: {}", config.log_path.display());
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let snapshot = StatsSnapshot::load(&stats_path)
            .with_context(|| format!("could not read {}", stats_path.display()))?;
        println!("Last session ({}):", snapshot.session_start.format("%Y-%m-%d %H:%M:%S"));
        println!("{}", snapshot.summary());
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().context("could not load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(shutdown: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("could not install Ctrl+C handler")
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
