//! Gateway relay: entry point.
//!
//! Serves the password page over HTTP and, for every correct password,
//! tells the privileged master process to let the caller's address through.
//!
//! # Usage
//!
//! ```text
//! gateway-relay [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>          TOML config file [default: /etc/gateway/relay.toml]
//!       --password <PW>          Shared secret (overrides the file)
//!       --bind <ADDR>            HTTP listen address, e.g. 0.0.0.0:8080
//!       --master-host <HOST>     Master host
//!       --master-port <PORT>     Master command port
//!       --attempts <N>           Failed attempts before lockout
//!       --timeout <SECS>         Lockout window in seconds
//!       --master-command <PATH>  Launch and supervise this master executable
//! ```
//!
//! # Precedence
//!
//! CLI flag (or its environment variable) > config file > built-in default.
//!
//! | Variable               | Flag               |
//! |------------------------|--------------------|
//! | `GATEWAY_CONFIG`       | `--config`         |
//! | `GATEWAY_PASSWORD`     | `--password`       |
//! | `GATEWAY_BIND`         | `--bind`           |
//! | `GATEWAY_MASTER_HOST`  | `--master-host`    |
//! | `GATEWAY_MASTER_PORT`  | `--master-port`    |
//! | `GATEWAY_ATTEMPTS`     | `--attempts`       |
//! | `GATEWAY_TIMEOUT`      | `--timeout`        |
//!
//! # Startup order
//!
//! 1. Logging (`RUST_LOG`, default `info`).
//! 2. Config file + CLI overrides, validated into a `RelayConfig`.
//! 3. HTML pages.
//! 4. The master process, if `--master-command` / `[master] command` is set.
//! 5. The master link; blocks until the master accepts a connection.
//! 6. Offense tracker and its sweeper.
//! 7. HTTP server, until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gateway_core::OffenseTracker;
use gateway_relay::application::AuthorizationService;
use gateway_relay::infrastructure::{
    load_config, run_server, spawn_master, spawn_offense_sweeper, AppState, FileConfig,
    MasterLink, PageSet, DEFAULT_CONFIG_PATH,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// HTTP-facing authorization relay for the access gateway.
#[derive(Debug, Parser)]
#[command(
    name = "gateway-relay",
    about = "Password-gated relay that asks the gateway master to admit client addresses",
    version
)]
struct Cli {
    /// Path of the TOML config file.  A missing file means "all defaults".
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "GATEWAY_CONFIG")]
    config: PathBuf,

    /// Shared secret clients must submit.
    #[arg(long, env = "GATEWAY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// HTTP listen address.
    #[arg(long, env = "GATEWAY_BIND")]
    bind: Option<String>,

    /// Hostname or IP address of the master process.
    #[arg(long, env = "GATEWAY_MASTER_HOST")]
    master_host: Option<String>,

    /// TCP command port of the master process.
    #[arg(long, env = "GATEWAY_MASTER_PORT")]
    master_port: Option<u16>,

    /// Failed attempts allowed before an address is locked out.
    #[arg(long, env = "GATEWAY_ATTEMPTS")]
    attempts: Option<u32>,

    /// Lockout window in seconds.
    #[arg(long, env = "GATEWAY_TIMEOUT")]
    timeout: Option<u64>,

    /// Master executable to launch and supervise.
    #[arg(long)]
    master_command: Option<PathBuf>,
}

impl Cli {
    /// Overwrites every file setting for which a flag was given.
    fn apply_to(self, file: &mut FileConfig) {
        if let Some(password) = self.password {
            file.password = Some(password);
        }
        if let Some(bind) = self.bind {
            file.http.bind = bind;
        }
        if let Some(host) = self.master_host {
            file.master.host = host;
        }
        if let Some(port) = self.master_port {
            file.master.port = port;
        }
        if let Some(attempts) = self.attempts {
            file.attempts = attempts;
        }
        if let Some(timeout) = self.timeout {
            file.timeout = timeout;
        }
        if let Some(command) = self.master_command {
            file.master.command = Some(command);
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let mut file = load_config(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    cli.apply_to(&mut file);
    let config = file
        .into_relay_config()
        .context("invalid relay configuration")?;

    info!(
        http = %config.http_bind_addr,
        master = %config.link.master,
        attempts = config.policy.max_attempts(),
        timeout_secs = config.policy.timeout().as_secs(),
        "gateway relay starting"
    );

    let pages = PageSet::load(&config.pages).context("failed to load HTML pages")?;

    // ── Master process ────────────────────────────────────────────────────────
    let _supervisor = match &config.master_command {
        Some(command) => Some(spawn_master(command).context("failed to start the master")?),
        None => None,
    };

    // ── Master link ───────────────────────────────────────────────────────────
    let link = tokio::select! {
        link = MasterLink::connect(config.link.clone(), config.password.clone()) => link,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted before the master became reachable");
            return Ok(());
        }
    };

    // ── Offense tracking ──────────────────────────────────────────────────────
    let tracker = Arc::new(OffenseTracker::new(config.policy));
    let sweep_period = config.policy.timeout().max(Duration::from_secs(1));
    let _sweeper = spawn_offense_sweeper(Arc::clone(&tracker), sweep_period);

    // ── HTTP server ───────────────────────────────────────────────────────────
    let state = AppState {
        service: Arc::new(AuthorizationService::new(Arc::new(link.clone()), tracker)),
        pages: Arc::new(pages),
        health: link.subscribe(),
    };

    run_server(config.http_bind_addr, state, shutdown_signal())
        .await
        .with_context(|| format!("HTTP server on {} failed", config.http_bind_addr))?;

    info!("gateway relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, initiating graceful shutdown"),
        Err(e) => {
            error!("failed to listen for Ctrl+C signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
