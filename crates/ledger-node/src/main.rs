use clap::Parser;
use ledger_node::config::{Args, NodeConfig};
use ledger_node::{build_service, routes, spawn_resolver_loop};
use std::net::SocketAddr;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = NodeConfig::load(&args)?;
    let service = build_service(&config).await?;

    let resolver = config
        .resolve_interval()
        .map(|interval| spawn_resolver_loop(service.clone(), interval));

    let app = routes::router(service);
    let addr: SocketAddr = config.listen.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ledger-node listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = resolver {
        task.abort();
    }
    info!("ledger-node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
