use pi_remote::apps::{self, AppKind};
use pi_remote::cli::{Args, Command};
use pi_remote::codegen::Generator;
use pi_remote::config::{self, LOG_FILE, SETTINGS_FILE, Settings};
use pi_remote::dispatch::Dispatcher;
use pi_remote::events::EventBus;
use pi_remote::heartbeat::{CancelToken, HeartbeatMonitor, HeartbeatPoller, PollExit, RetryPolicy, TcpProbe};
use pi_remote::latency::SystemClock;
use pi_remote::server::ApiServer;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn init_logging(args: &Args, path_config: &config::PathConfig) -> Result<()> {
    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        // File logging with specified verbosity level
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(LOG_FILE, path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("tiny_http", log::LevelFilter::Warn)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging with specified verbosity level (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("tiny_http", log::LevelFilter::Warn)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());

    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    init_logging(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    let settings_path = config::config_file(SETTINGS_FILE, &path_config);
    let settings = Settings::load(&settings_path)?;

    match args.command {
        Command::Serve { app, host, port, ui_dir, blackout_ms } => {
            let host = host.unwrap_or_else(|| settings.bind_host.clone());
            let port = port.unwrap_or(settings.rest_port);
            let tolerance = blackout_ms.map(Duration::from_millis).or(settings.blackout_tolerance());
            serve(app, &host, port, ui_dir, tolerance)
        }
        Command::Generate { app, rest_host, rest_port, dir_path } => {
            let bus = EventBus::new();
            let app = apps::build(app, &bus)?;
            let generator = Generator::new(
                rest_host.unwrap_or_else(|| settings.rest_host.clone()),
                rest_port.unwrap_or(settings.rest_port),
            )
            .heartbeat_interval(settings.heartbeat_interval())
            .latency_alpha(settings.latency_alpha);

            let written = generator.write_all(&app.registry, &dir_path)?;
            println!("Wrote {} files to {}", written.len(), dir_path.display());
            Ok(())
        }
        Command::Heartbeat { rest_host, rest_port, interval_ms, max_failures } => {
            let host = rest_host.unwrap_or_else(|| settings.rest_host.clone());
            let port = rest_port.unwrap_or(settings.rest_port);
            let delay = interval_ms.map(Duration::from_millis).unwrap_or(settings.heartbeat_interval());
            heartbeat(&host, port, delay, max_failures, settings.latency_alpha)
        }
        Command::Apps => {
            let bus = EventBus::new();
            for kind in AppKind::value_variants() {
                let app = apps::build(*kind, &bus)?;
                let ids: Vec<&str> = app.registry.components().map(|c| c.id()).collect();
                println!("{:<10} {}", kind.name(), ids.join(", "));
            }
            Ok(())
        }
    }
}

fn serve(kind: AppKind, host: &str, port: u16, ui_dir: Option<PathBuf>, tolerance: Option<Duration>) -> Result<()> {
    let bus = EventBus::new();
    bus.subscribe(|event| info!("{} -> {}", event.component_id, event.state));

    let app = apps::build(kind, &bus)?;
    info!("Serving app '{}' with {} components", kind.name(), app.registry.len());

    let monitor = Arc::new(HeartbeatMonitor::new());
    match (tolerance, app.on_blackout) {
        (Some(tolerance), Some(on_blackout)) => {
            monitor.watch(tolerance, on_blackout);
        }
        (Some(_), None) => info!("App '{}' has nothing to stop on blackout", kind.name()),
        _ => {}
    }

    let mut server = ApiServer::new(Dispatcher::new(Arc::new(app.registry)), monitor);
    if let Some(dir) = ui_dir {
        info!("Serving UI from {}", dir.display());
        server = server.with_ui_dir(dir);
    }
    server.serve(&format!("{}:{}", host, port))
}

fn heartbeat(host: &str, port: u16, delay: Duration, max_failures: Option<u32>, alpha: f64) -> Result<()> {
    let probe = TcpProbe::new(host, port, delay.max(Duration::from_secs(1)));
    let policy = RetryPolicy { delay, max_consecutive_failures: max_failures };
    let mut poller = HeartbeatPoller::with_clock(probe, policy, SystemClock::default(), alpha);

    info!("Polling http://{}:{} every {:?}", host, port, delay);
    let exit = poller.run_with(&CancelToken::new(), |p| match p.latency_ms() {
        Some(ms) => println!("{:?}  latency {:.1} ms", p.state(), ms),
        None => println!("{:?}", p.state()),
    });

    match exit {
        PollExit::GaveUp => anyhow::bail!(
            "Gave up after {} consecutive failures",
            poller.consecutive_failures()
        ),
        PollExit::Cancelled => Ok(()),
    }
}
