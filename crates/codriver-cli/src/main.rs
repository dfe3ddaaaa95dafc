//! `codriver` – the co-driver's command line entry point.
//!
//! 1. Loads `~/.codriver/config.toml`, writing the defaults on first run.
//! 2. Initialises logging (and OTLP trace export when configured).
//! 3. Opens the telemetry source, registers the reaction rules and starts
//!    the polling pipeline.
//! 4. Prints every dialogue request to the console.
//! 5. Intercepts **Ctrl-C** to stop polling, drain the bus and close the
//!    source.

mod config;
mod dialogue;

use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use codriver_kernel::RuleRegistry;
use codriver_middleware::EventBus;
use codriver_runtime::{TelemetryPipeline, init_tracing, install_turn_relay};
use codriver_telemetry::{LayoutRegistry, LocationIndex, TelemetrySource};
use codriver_types::CoDriverError;
use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    // Config first: it decides the log format.  Problems are printed, not
    // logged, since no subscriber exists yet.
    let (cfg, created) = match config::load_or_init() {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            (cfg, false)
        }
    };

    let _guard = init_tracing("codriver", cfg.log_format);

    print_banner();
    if created {
        println!(
            "  {} Default config written to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        );
    } else {
        println!("  Config loaded from {}", config::config_path().display().to_string().bold());
    }
    println!(
        "  Telemetry: {} (every {} ms)\n",
        cfg.telemetry.mode.to_string().bold(),
        cfg.telemetry.poll_interval_ms
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg)) {
        Ok(()) => {
            println!("{}", "  ✓ Co-driver stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "co-driver stopped with an error");
            println!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: config::Config) -> Result<(), CoDriverError> {
    let locations = match &cfg.telemetry.locations_path {
        Some(path) => LocationIndex::load(path)?,
        None => LocationIndex::bundled()?,
    };
    info!(locations = locations.len(), "reference locations loaded");

    let source = TelemetrySource::open(
        cfg.telemetry.source_mode(clock_seed()),
        &LayoutRegistry::builtin(),
        locations,
    )?
    .with_nearest_locations(cfg.telemetry.nearest_locations);

    let bus = EventBus::new();
    let _relay = install_turn_relay(&bus);
    dialogue::install(&bus);

    let rules = RuleRegistry::builder(bus.clone())
        .with_builtin_rules()
        .overrides(cfg.rule_overrides())
        .build();
    println!("  Rules: {}\n", rules.names().join(", ").dimmed());

    let mut pipeline = TelemetryPipeline::new(source, rules, bus)?
        .with_poll_interval(Duration::from_millis(cfg.telemetry.poll_interval_ms));

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        let _ = stop_tx.send(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; stop the process to exit");
    }

    let outcome = pipeline.run(stop_rx).await;
    pipeline.close();
    outcome.map(|ticks| info!(ticks, "shutdown complete"))
}

/// Seed for the synthetic drive when none is configured.
fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ______      ____       _                "#.bold().cyan());
    println!("{}", r#"  / ____/___  / __ \_____(_)   _____  _____"#.bold().cyan());
    println!("{}", r#" / /   / __ \/ / / / ___/ / | / / _ \/ ___/"#.bold().cyan());
    println!("{}", r#"/ /___/ /_/ / /_/ / /  / /| |/ /  __/ /    "#.bold().cyan());
    println!("{}", r#"\____/\____/_____/_/  /_/ |___/\___/_/     "#.bold().cyan());
    println!();
    println!("  {} {}", "CoDriver".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Talks about your drive, one event at a time");
    println!();
}
