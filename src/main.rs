//! qrgate: turnstile controller for QR tickets.
//!
//! Usage:
//!   qrgate --api-url URL --refresh-url URL --gpio-pin 17
//!   qrgate --actuator null            Dry run without hardware
//!
//! Tokens are best passed via `QRGATE_ACCESS_TOKEN` / `QRGATE_REFRESH_TOKEN`
//! (a `.env` file in the working directory is loaded first).

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use qrgate::{shutdown, ActuatorKind, ControlLoop, GateConfig, LineScanner};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Validate scanned QR tickets and drive the entrance turnstile
#[derive(Parser, Debug)]
#[command(name = "qrgate", version, about)]
struct Cli {
    /// Paged check-in endpoint
    #[arg(long, env = "QRGATE_API_URL")]
    api_url: String,

    /// Initial bearer token
    #[arg(long, env = "QRGATE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Token refresh endpoint
    #[arg(long, env = "QRGATE_REFRESH_URL")]
    refresh_url: String,

    /// Refresh token
    #[arg(long, env = "QRGATE_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: String,

    /// Gate output driver
    #[arg(long, env = "QRGATE_ACTUATOR", value_enum, default_value_t = ActuatorChoice::Gpio)]
    actuator: ActuatorChoice,

    /// GPIO line wired to the turnstile release (required with --actuator gpio)
    #[arg(long, env = "QRGATE_GPIO_PIN")]
    gpio_pin: Option<u32>,

    /// Pause between page requests, in milliseconds
    #[arg(long, env = "QRGATE_PAGE_DELAY_MS", default_value_t = 10)]
    page_delay_ms: u64,

    /// Trailing pages fetched when a code is not cached
    #[arg(long, env = "QRGATE_TAIL_PAGES", default_value_t = 2)]
    tail_pages: u64,

    /// How long the gate stays released, in milliseconds
    #[arg(long, env = "QRGATE_OPEN_MS", default_value_t = 2000)]
    open_ms: u64,

    /// HTTP request timeout, in seconds
    #[arg(long, env = "QRGATE_TIMEOUT_SECS", default_value_t = 5)]
    timeout_secs: u64,

    /// Where the result of the startup sync is written
    #[arg(long, env = "QRGATE_SNAPSHOT", default_value = "checkin_entries.json")]
    snapshot: PathBuf,

    /// Do not write a snapshot
    #[arg(long)]
    no_snapshot: bool,

    /// Deny codes still unknown after a resync for this many seconds without
    /// resyncing again (0 = always resync)
    #[arg(long, env = "QRGATE_MISS_TTL_SECS", default_value_t = 0)]
    miss_ttl_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ActuatorChoice {
    /// Linux sysfs GPIO output
    Gpio,
    /// No hardware, log only
    Null,
}

impl Cli {
    fn actuator_kind(&self) -> Result<ActuatorKind> {
        match (self.actuator, self.gpio_pin) {
            (ActuatorChoice::Gpio, Some(pin)) => Ok(ActuatorKind::Gpio { pin }),
            (ActuatorChoice::Gpio, None) => {
                bail!("--gpio-pin (or QRGATE_GPIO_PIN) is required with --actuator gpio")
            }
            (ActuatorChoice::Null, _) => Ok(ActuatorKind::Null),
        }
    }

    fn gate_config(&self) -> GateConfig {
        let mut config = GateConfig::new(
            self.api_url.clone(),
            self.access_token.clone(),
            self.refresh_url.clone(),
            self.refresh_token.clone(),
        );
        config.page_delay = Duration::from_millis(self.page_delay_ms);
        config.tail_pages = self.tail_pages;
        config.open_duration = Duration::from_millis(self.open_ms);
        config.request_timeout = Duration::from_secs(self.timeout_secs);
        config.miss_ttl = Duration::from_secs(self.miss_ttl_secs);
        config.snapshot_path = (!self.no_snapshot).then(|| self.snapshot.clone());
        config
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.gate_config();
    config.validate()?;

    // Hardware first: without a working gate there is nothing to serve.
    let actuator = cli
        .actuator_kind()?
        .build()
        .context("Could not acquire gate actuator (try running with GPIO permissions)")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Could not start signal runtime")?;

    let (trigger, signal) = shutdown::channel();
    runtime.spawn(shutdown::trigger_on_interrupt(trigger));

    let mut control = ControlLoop::new(config, actuator)?;
    let mut scanner = LineScanner::stdin();

    info!(api = %cli.api_url, "Starting gate");
    let summary = control.run(&mut scanner, &signal)?;
    info!(
        allowed = summary.allowed,
        denied = summary.denied,
        "Gate stopped"
    );

    runtime.shutdown_background();
    Ok(())
}
