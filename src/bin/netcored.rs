//! Network core daemon (netcored)
//!
//! Owns devices and technologies, follows kernel links and kill-switches
//! and keeps background scans running.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (requires root/sudo)
//! sudo netcored
//!
//! # Start with verbose logging and an alternate configuration
//! sudo netcored --verbose --config /tmp/main.conf
//! ```

use anyhow::Context;
use clap::Parser;
use libnetcore::config::{NetcoreConfig, DEFAULT_CONFIG_PATH};
use libnetcore::daemon::{CoreHandle, Daemon};
use libnetcore::detect::SYSFS_NET;
use libnetcore::drivers::EthernetDriver;
use libnetcore::monitor::LinkMonitor;
use libnetcore::storage::ProfileStore;
use libnetcore::NetCore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Network Core Daemon
#[derive(Parser, Debug)]
#[command(name = "netcored")]
#[command(version)]
#[command(about = "Network Core Daemon - device and technology management", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Comma separated interface patterns to manage exclusively
    #[arg(short = 'i', long)]
    device: Option<String>,

    /// Comma separated interface patterns to ignore
    #[arg(short = 'I', long)]
    nodevice: Option<String>,

    /// Start in offline mode
    #[arg(long)]
    offline: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting Network Core Daemon (netcored)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    #[cfg(target_os = "linux")]
    {
        let uid = unsafe { libc::getuid() };
        if uid != 0 {
            warn!("Not running as root - link control may fail");
        }
    }

    let config = load_config(&args)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    runtime.block_on(run(args, config))
}

fn load_config(args: &Args) -> anyhow::Result<NetcoreConfig> {
    let mut config = if args.config.exists() {
        NetcoreConfig::load(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    } else {
        info!("No configuration at {}, using defaults", args.config.display());
        NetcoreConfig::default()
    };

    if let Some(allow) = &args.device {
        config.devices.allow = split_patterns(allow);
    }
    if let Some(deny) = &args.nodevice {
        config.devices.deny.extend(split_patterns(deny));
    }

    Ok(config)
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

async fn run(args: Args, config: NetcoreConfig) -> anyhow::Result<()> {
    if let Err(e) = config.ensure_directories() {
        warn!("{}", e);
    }

    let store = ProfileStore::new(&config.paths.storage_dir, &config.paths.profile);
    info!("Using profile {}", store.path().display());

    let mut daemon = Daemon::new(NetCore::new(config, Box::new(store)));
    let handle = daemon.handle();

    daemon
        .core_mut()
        .register_device_driver(Arc::new(EthernetDriver::new(handle.clone())))
        .context("Failed to register ethernet driver")?;

    if args.offline {
        daemon.core_mut().set_offline_mode(true)?;
    }

    tokio::spawn(LinkMonitor::new(SYSFS_NET).run(handle.clone()));

    let signal_handle = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = handle_signals(signal_handle).await {
            error!("Signal handler error: {}", e);
        }
    });

    info!("Network Core Daemon is ready");
    daemon.run().await;

    info!("Network Core Daemon stopped");
    Ok(())
}

/// Initialize logging based on command-line arguments
fn init_logging(args: &Args) {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("netcored={},libnetcore={}", log_level, log_level))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(atty::is(atty::Stream::Stdout))
        .init();
}

/// Handle Unix signals (SIGTERM, SIGINT, SIGHUP)
async fn handle_signals(handle: CoreHandle) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, ignoring");
            }
        }
    }

    handle.shutdown()?;
    Ok(())
}
