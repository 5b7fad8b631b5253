// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use nsbridge::{
    config::Config,
    constants::{DEFAULT_CONFIG_PATH, TOKIO_WORKER_THREADS},
    context::Context,
    gateway::Gateway,
    metrics::serve_metrics,
    pending::{pending_queue, ChangePoller},
    provider::{http::HttpProvider, DnsProvider},
    server::Server,
    tsig::KeyTable,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info};

/// DNS UPDATE and IXFR front end for hosted DNS provider APIs
#[derive(Parser, Debug)]
#[command(name = "nsbridge", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "NSBRIDGE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging (ignored when RUST_LOG is set)
    #[arg(short, long)]
    debug: bool,

    /// Log change batches instead of submitting them
    #[arg(long)]
    dry_run: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,

    /// Override the UDP listen address
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Provider API bearer token
    #[arg(long, env = "NSBRIDGE_PROVIDER_TOKEN", hide_env_values = true)]
    provider_token: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("nsbridge")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` if set, otherwise defaults to INFO (DEBUG with
/// `--debug`). `RUST_LOG_FORMAT=json` switches to JSON output.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    init_logging(cli.debug);

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    if cli.dry_run {
        config.server.dry_run = true;
    }
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(token) = cli.provider_token {
        config.provider.token = Some(token);
    }

    let keys = KeyTable::from_config(&config.tsig).context("invalid TSIG configuration")?;

    if cli.check_config {
        info!(
            path = %cli.config.display(),
            hosted_zones = config.hosted_zones.len(),
            masters = config.masters.len(),
            tsig_peers = keys.len(),
            "Configuration is valid"
        );
        return Ok(());
    }

    info!(
        listen = %config.server.listen,
        workers = config.server.workers,
        dry_run = config.server.dry_run,
        hosted_zones = config.hosted_zones.len(),
        "Starting nsbridge"
    );

    let provider: Arc<dyn DnsProvider> = Arc::new(HttpProvider::new(&config.provider)?);
    debug!(endpoint = %config.provider.endpoint, "Provider client created");

    let (pending, receiver) = pending_queue(config.pending.capacity);
    let poller = ChangePoller::new(
        provider.clone(),
        receiver,
        pending.clone(),
        config.pending.poll_interval(),
    );
    tokio::spawn(poller.run());

    if let Some(addr) = config.server.metrics_listen {
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(addr).await {
                error!(address = %addr, error = %e, "Metrics server exited");
            }
        });
    }

    let listen = config.server.listen;
    let workers = config.server.workers;
    let ctx = Arc::new(Context::new(config, provider, keys, pending));
    let server = Server::bind(listen, Gateway::new(ctx), workers).await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let serve = server.run();
    tokio::pin!(serve);

    loop {
        tokio::select! {
            result = &mut serve => {
                error!("CRITICAL: DNS server exited unexpectedly: {:?}", result);
                result?;
                anyhow::bail!("DNS server exited unexpectedly without error")
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                return Ok(());
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP; configuration reload is not supported, ignoring");
            }
        }
    }
}
