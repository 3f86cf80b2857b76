//! Longest-valid-chain conflict resolution.
//!
//! Every registered peer is asked for its chain; the longest one that is strictly longer
//! than ours and passes validation replaces the local chain wholesale. Equal lengths
//! never replace.

use crate::chain::validate_chain;
use crate::error::TransportError;
use crate::ledger::Ledger;
use crate::mine::MiningEpoch;
use crate::transport::ChainTransport;
use crate::Block;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Replaced(Vec<Block>),
    Authoritative(Vec<Block>),
}

impl Resolution {
    pub fn chain(&self) -> &[Block] {
        match self {
            Resolution::Replaced(chain) | Resolution::Authoritative(chain) => chain,
        }
    }

    pub fn is_replaced(&self) -> bool {
        matches!(self, Resolution::Replaced(_))
    }
}

pub struct ConsensusResolver<T> {
    transport: Arc<T>,
    peer_timeout: Duration,
}

impl<T: ChainTransport + 'static> ConsensusResolver<T> {
    pub fn new(transport: Arc<T>, peer_timeout: Duration) -> Self {
        Self {
            transport,
            peer_timeout,
        }
    }

    pub fn peer_timeout(&self) -> Duration {
        self.peer_timeout
    }

    /// Fetch every peer's chain concurrently. Unreachable, slow and malformed peers are
    /// logged and left out. The result is sorted by peer address.
    pub async fn fetch_chains(&self, peers: &[String]) -> Vec<(String, Vec<Block>)> {
        let mut tasks = JoinSet::new();
        for peer in peers {
            let transport = Arc::clone(&self.transport);
            let peer = peer.clone();
            let limit = self.peer_timeout;
            tasks.spawn(async move {
                let fetched = match tokio::time::timeout(limit, transport.get_chain(&peer)).await
                {
                    Ok(Ok(response)) => response.into_checked_chain(),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(TransportError::Timeout),
                };
                (peer, fetched)
            });
        }

        let mut chains = Vec::with_capacity(peers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((peer, Ok(chain))) => {
                    debug!(%peer, length = chain.len(), "fetched peer chain");
                    chains.push((peer, chain));
                }
                Ok((peer, Err(err))) => warn!(%peer, %err, "skipping unreachable peer"),
                Err(err) => warn!(%err, "peer fetch task failed"),
            }
        }
        chains.sort_by(|a, b| a.0.cmp(&b.0));
        chains
    }

    /// Run one resolution round against `ledger`.
    pub async fn resolve(
        &self,
        ledger: &RwLock<Ledger>,
        peers: &[String],
        epoch: &MiningEpoch,
    ) -> Resolution {
        self.resolve_with(ledger, peers, epoch, |_| async {}).await
    }

    /// Like [`resolve`](Self::resolve), awaiting `on_replace` with the new chain while the
    /// write lock is still held.
    pub async fn resolve_with<F, Fut>(
        &self,
        ledger: &RwLock<Ledger>,
        peers: &[String],
        epoch: &MiningEpoch,
        on_replace: F,
    ) -> Resolution
    where
        F: FnOnce(Vec<Block>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let local_len = ledger.read().await.len();
        let candidates = self.fetch_chains(peers).await;
        let winner = select_longest_valid(local_len, candidates);

        let mut guard = ledger.write().await;
        match winner {
            Some((peer, chain)) if chain.len() > guard.len() => {
                epoch.advance();
                guard.replace_chain(chain);
                on_replace(guard.chain().to_vec()).await;
                info!(%peer, length = guard.len(), "adopted longer chain from peer");
                Resolution::Replaced(guard.chain().to_vec())
            }
            Some((peer, chain)) => {
                info!(
                    %peer,
                    candidate = chain.len(),
                    local = guard.len(),
                    "local chain grew during resolution; keeping it"
                );
                Resolution::Authoritative(guard.chain().to_vec())
            }
            None => Resolution::Authoritative(guard.chain().to_vec()),
        }
    }
}

/// Pick the longest candidate that beats `local_len` and validates. Candidates are taken
/// in the order given; on equal lengths the first one wins.
pub fn select_longest_valid<I>(local_len: usize, candidates: I) -> Option<(String, Vec<Block>)>
where
    I: IntoIterator<Item = (String, Vec<Block>)>,
{
    let mut max_length = local_len;
    let mut winner = None;
    for (peer, chain) in candidates {
        if chain.len() <= max_length {
            debug!(%peer, length = chain.len(), max_length, "peer chain not longer");
            continue;
        }
        if let Err(err) = validate_chain(&chain) {
            warn!(%peer, %err, "discarding invalid peer chain");
            continue;
        }
        max_length = chain.len();
        winner = Some((peer, chain));
    }
    winner
}
