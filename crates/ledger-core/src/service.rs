//! The operations a node exposes upward: admit, mine, read, register, resolve.
//!
//! Chain and pending-buffer mutations all go through one `RwLock<Ledger>`. The proof
//! search runs on the blocking pool against a snapshot of the tip and is checked against
//! the live tip again before the block is sealed.

use crate::chain::ChainStore;
use crate::consensus::{ConsensusResolver, Resolution};
use crate::constants::DEFAULT_PEER_TIMEOUT_MS;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::mine::{find_proof_parallel, MiningEpoch, MiningTicket};
use crate::peers::PeerRegistry;
use crate::transport::ChainTransport;
use crate::{Block, NodeId, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct ServiceOptions {
    pub peer_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_millis(DEFAULT_PEER_TIMEOUT_MS),
        }
    }
}

/// The tip a proof search was started against.
#[derive(Clone, Debug)]
pub struct TipSnapshot {
    pub proof: u64,
    pub hash: String,
    ticket: MiningTicket,
}

pub struct LedgerService<T> {
    node_id: NodeId,
    ledger: Arc<RwLock<Ledger>>,
    peers: RwLock<PeerRegistry>,
    resolver: ConsensusResolver<T>,
    epoch: MiningEpoch,
    store: Option<Arc<dyn ChainStore>>,
}

impl<T: ChainTransport + 'static> LedgerService<T> {
    pub fn new(node_id: NodeId, transport: Arc<T>, options: ServiceOptions) -> Self {
        Self {
            node_id,
            ledger: Arc::new(RwLock::new(Ledger::new())),
            peers: RwLock::new(PeerRegistry::new()),
            resolver: ConsensusResolver::new(transport, options.peer_timeout),
            epoch: MiningEpoch::new(),
            store: None,
        }
    }

    /// Attach a store, restoring its chain when it holds a valid one and seeding it with
    /// our genesis otherwise.
    pub fn with_store(mut self, store: Arc<dyn ChainStore>) -> anyhow::Result<Self> {
        let stored = store.load_chain()?;
        let restored = if stored.is_empty() {
            None
        } else {
            match Ledger::from_chain(stored) {
                Ok(ledger) => Some(ledger),
                Err(err) => {
                    warn!(%err, "stored chain failed validation; starting from genesis");
                    None
                }
            }
        };
        let ledger = match restored {
            Some(ledger) => {
                info!(length = ledger.len(), "restored chain from store");
                ledger
            }
            None => {
                let ledger = Ledger::new();
                store.replace_chain(ledger.chain())?;
                ledger
            }
        };
        self.ledger = Arc::new(RwLock::new(ledger));
        self.store = Some(store);
        Ok(self)
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Queue a transaction; returns the index of the block that will hold it.
    pub async fn submit_transaction(&self, tx: Transaction) -> u64 {
        self.ledger.write().await.new_transaction(tx)
    }

    /// Find a proof for the current tip and seal the pending buffer into a block.
    ///
    /// `certificate`, when given, is stamped with this node's id and queued right before
    /// sealing. Fails with [`LedgerError::StaleMiningResult`] when the tip moved while the
    /// search ran.
    pub async fn mine_block(&self, certificate: Option<Transaction>) -> Result<Block, LedgerError> {
        let tip = self.tip_snapshot().await;
        let proof = self.search_proof(&tip).await?;
        self.commit_proof(&tip, proof, certificate).await
    }

    pub async fn tip_snapshot(&self) -> TipSnapshot {
        let ledger = self.ledger.read().await;
        let last = ledger.last_block();
        TipSnapshot {
            proof: last.proof,
            hash: last.hash(),
            ticket: self.epoch.ticket(),
        }
    }

    /// Run the proof search for `tip` on the blocking pool.
    pub async fn search_proof(&self, tip: &TipSnapshot) -> Result<u64, LedgerError> {
        let previous_proof = tip.proof;
        let previous_hash = tip.hash.clone();
        let ticket = tip.ticket.clone();
        tokio::task::spawn_blocking(move || {
            find_proof_parallel(previous_proof, &previous_hash, || ticket.is_cancelled())
        })
        .await
        .map_err(|err| LedgerError::Mining(err.to_string()))?
        .ok_or(LedgerError::MiningCancelled)
    }

    /// Seal a block with `proof` if `tip` is still the last block.
    pub async fn commit_proof(
        &self,
        tip: &TipSnapshot,
        proof: u64,
        certificate: Option<Transaction>,
    ) -> Result<Block, LedgerError> {
        let mut ledger = self.ledger.write().await;
        if ledger.last_block().hash() != tip.hash {
            warn!(proof, "tip moved during proof search; discarding result");
            return Err(LedgerError::StaleMiningResult);
        }
        if let Some(mut certificate) = certificate {
            certificate.owner = self.node_id.to_string();
            ledger.new_transaction(certificate);
        }
        let block = ledger.new_block(proof, Some(tip.hash.clone())).clone();
        let sealed = block.clone();
        persist(self.store.clone(), "block", move |store| store.put_block(&sealed)).await;
        Ok(block)
    }

    /// Full chain and its length.
    pub async fn chain(&self) -> (Vec<Block>, u64) {
        let ledger = self.ledger.read().await;
        (ledger.chain().to_vec(), ledger.len() as u64)
    }

    pub async fn pending(&self) -> Vec<Transaction> {
        self.ledger.read().await.pending().to_vec()
    }

    pub async fn register_peer(&self, address: &str) -> Result<String, LedgerError> {
        self.peers.write().await.register(address)
    }

    pub async fn register_peers<I, S>(&self, addresses: I) -> Result<Vec<String>, LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut peers = self.peers.write().await;
        peers.register_all(addresses)?;
        Ok(peers.peers())
    }

    pub async fn peers(&self) -> Vec<String> {
        self.peers.read().await.peers()
    }

    /// One round of longest-valid-chain resolution against every registered peer.
    pub async fn resolve(&self) -> Resolution {
        let peers = self.peers().await;
        let store = self.store.clone();
        self.resolver
            .resolve_with(&self.ledger, &peers, &self.epoch, |chain| {
                persist(store, "chain", move |store| store.replace_chain(&chain))
            })
            .await
    }

    /// Abort any proof search in flight.
    pub fn cancel_mining(&self) {
        self.epoch.advance();
    }
}

/// Run `write` on the blocking pool. Callers hold the ledger write lock, so writes land
/// in commit order.
async fn persist<F>(store: Option<Arc<dyn ChainStore>>, what: &'static str, write: F)
where
    F: FnOnce(&dyn ChainStore) -> anyhow::Result<()> + Send + 'static,
{
    let Some(store) = store else {
        return;
    };
    match tokio::task::spawn_blocking(move || write(store.as_ref())).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%err, what, "failed to persist"),
        Err(err) => warn!(%err, what, "persistence task failed"),
    }
}
