//! mkspoold — the elastic pool orchestrator daemon.
//!
//! # Usage
//!
//! ```text
//! mkspoold --config /etc/mkspool/mkspool.toml serve --port 8080
//! mkspoold --config mkspool.toml instance-types
//! mkspoold --config mkspool.toml pools
//! mkspoold --config mkspool.toml validate
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mkspool_client::PoolApi;
use mkspool_provider::naming::is_managed_pool;
use mkspoold::{App, Config, HttpState, build_router, run_catalog_refresh};

const DEFAULT_LOG_FILTER: &str = "info,mkspoold=debug,mkspool=debug";

#[derive(Parser)]
#[command(name = "mkspoold", about = "Elastic node pool orchestrator")]
struct Cli {
    /// Path to mkspool.toml. Defaults plus OVH_* variables when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon: catalog and pricing refreshers plus the HTTP surface.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Build the instance catalog once and print it as JSON.
    InstanceTypes,
    /// List managed node pools.
    Pools,
    /// Load and validate the configuration without contacting the API.
    Validate,
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { port } => serve(config, port).await,
        Command::InstanceTypes => print_instance_types(config).await,
        Command::Pools => print_pools(config).await,
        Command::Validate => validate(&config),
    }
}

async fn serve(config: Config, port: u16) -> anyhow::Result<()> {
    info!("mkspool daemon starting");

    let cancel = CancellationToken::new();
    let app = App::build(&config, &cancel).await?;

    let count = app
        .provider
        .refresh_instance_types(&cancel)
        .await
        .context("building instance catalog")?;
    info!(count, region = %app.region, "instance catalog ready");

    // ── Background tasks ───────────────────────────────────────

    let pricing_handle = app.pricing.clone().spawn_refresher(cancel.clone());
    let catalog_handle = tokio::spawn(run_catalog_refresh(
        app.provider.clone(),
        Duration::from_secs(config.provisioning.catalog_refresh_secs),
        cancel.clone(),
    ));

    // ── HTTP server ────────────────────────────────────────────

    let router = build_router(HttpState {
        provider: app.provider.clone(),
        metrics: app.metrics.clone(),
        cancel: cancel.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "HTTP server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for shutdown signal");
            }
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    let _ = pricing_handle.await;
    let _ = catalog_handle.await;

    info!("mkspool daemon stopped");
    Ok(())
}

async fn print_instance_types(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let app = App::build(&config, &cancel).await?;
    app.provider
        .refresh_instance_types(&cancel)
        .await
        .context("building instance catalog")?;

    let instance_types = app.provider.get_instance_types().await;
    println!("{}", serde_json::to_string_pretty(instance_types.as_ref())?);
    Ok(())
}

async fn print_pools(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let app = App::build(&config, &cancel).await?;
    let pools = app
        .api
        .list_node_pools(&cancel)
        .await
        .context("listing node pools")?;

    println!(
        "{:<36} {:<32} {:<12} {:>7} {:>7}  STATUS",
        "ID", "NAME", "FLAVOR", "DESIRED", "CURRENT"
    );
    for pool in pools.iter().filter(|p| is_managed_pool(&p.name)) {
        println!(
            "{:<36} {:<32} {:<12} {:>7} {:>7}  {}",
            pool.id, pool.name, pool.flavor, pool.desired_nodes, pool.current_nodes, pool.status
        );
    }
    Ok(())
}

fn validate(config: &Config) -> anyhow::Result<()> {
    let region = config.cluster.region.as_deref().unwrap_or("<auto>");
    println!("endpoint:     {}", config.api.endpoint);
    println!("service name: {}", config.cluster.service_name);
    println!("kube id:      {}", config.cluster.kube_id);
    println!("region:       {region}");
    for class in config.node_classes(region) {
        println!(
            "node class {:?}: monthly_billed={} anti_affinity={} tags={}",
            class.name,
            class.spec.monthly_billed,
            class.spec.anti_affinity,
            class.spec.tags.len()
        );
    }
    println!("configuration OK");
    Ok(())
}
