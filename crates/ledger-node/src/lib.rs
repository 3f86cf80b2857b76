//! HTTP node wrapping a [`LedgerService`]: config loading, the peer transport and the
//! axum routes.

pub mod config;
mod constants;
pub mod routes;
pub mod transport;

use anyhow::Result;
use config::NodeConfig;
use ledger_core::{LedgerService, NodeId, ServiceOptions};
use ledger_storage::SledStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use transport::HttpTransport;

pub type SharedService = Arc<LedgerService<HttpTransport>>;

/// Build the node's service: fresh identity, sled-backed chain when a data dir is set,
/// and the configured peers registered.
pub async fn build_service(config: &NodeConfig) -> Result<SharedService> {
    let node_id = NodeId::generate();
    let transport = Arc::new(HttpTransport::new(config.peer_timeout())?);
    let options = ServiceOptions {
        peer_timeout: config.peer_timeout(),
    };
    let mut service = LedgerService::new(node_id, transport, options);
    if let Some(dir) = &config.data_dir {
        service = service.with_store(Arc::new(SledStore::open(dir)?))?;
    }
    if !config.peers.is_empty() {
        let registered = service.register_peers(&config.peers).await?;
        info!(peers = registered.len(), "registered configured peers");
    }
    info!(node_id = %service.node_id(), "ledger service ready");
    Ok(Arc::new(service))
}

/// Run [`LedgerService::resolve`] every `interval` until the task is aborted.
pub fn spawn_resolver_loop(service: SharedService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let outcome = service.resolve().await;
            if outcome.is_replaced() {
                info!(length = outcome.chain().len(), "periodic resolution adopted peer chain");
            } else if service.peers().await.is_empty() {
                debug!("periodic resolution ran with no registered peers");
            }
        }
    })
}
