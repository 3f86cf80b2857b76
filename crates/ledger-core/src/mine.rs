use crate::constants::PROOF_SEARCH_BATCH;
use crate::pow::valid_proof;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Searches for the smallest valid proof, fanning each batch of candidates out over
/// rayon's pool. Returns `None` once `cancelled` reports true.
pub fn find_proof_parallel<F>(previous_proof: u64, previous_hash: &str, cancelled: F) -> Option<u64>
where
    F: Fn() -> bool + Sync,
{
    let mut start = 0u64;
    loop {
        if cancelled() {
            debug!(searched = start, "proof search cancelled");
            return None;
        }
        let end = start.saturating_add(PROOF_SEARCH_BATCH);
        // find_first keeps the result minimal within the batch; batches run in order.
        let found = (start..end)
            .into_par_iter()
            .find_first(|proof| valid_proof(previous_proof, *proof, previous_hash));
        if let Some(proof) = found {
            info!(previous_proof, proof, "found proof");
            return Some(proof);
        }
        if end == u64::MAX {
            return None;
        }
        start = end;
    }
}

/// Counter that moves whenever the chain tip is replaced out from under a miner.
#[derive(Clone, Debug, Default)]
pub struct MiningEpoch(Arc<AtomicU64>);

impl MiningEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every outstanding ticket.
    pub fn advance(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn ticket(&self) -> MiningTicket {
        MiningTicket {
            epoch: Arc::clone(&self.0),
            observed: self.0.load(Ordering::SeqCst),
        }
    }
}

/// Snapshot of the epoch taken when a search starts.
#[derive(Clone, Debug)]
pub struct MiningTicket {
    epoch: Arc<AtomicU64>,
    observed: u64,
}

impl MiningTicket {
    pub fn is_cancelled(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) != self.observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::pow;

    #[test]
    fn parallel_search_matches_sequential() {
        assert_eq!(
            find_proof_parallel(100, GENESIS_HASH, || false),
            Some(SECOND_PROOF)
        );
        assert_eq!(
            find_proof_parallel(SECOND_PROOF, SECOND_HASH, || false),
            Some(pow::find_proof(SECOND_PROOF, SECOND_HASH))
        );
    }

    #[test]
    fn cancelled_search_returns_none() {
        assert_eq!(find_proof_parallel(100, GENESIS_HASH, || true), None);
    }

    #[test]
    fn advancing_epoch_cancels_tickets() {
        let epoch = MiningEpoch::new();
        let ticket = epoch.ticket();
        assert!(!ticket.is_cancelled());
        epoch.advance();
        assert!(ticket.is_cancelled());
        assert!(!epoch.ticket().is_cancelled());
    }

    #[test]
    fn ticket_stops_running_search() {
        let epoch = MiningEpoch::new();
        let ticket = epoch.ticket();
        epoch.advance();
        assert_eq!(
            find_proof_parallel(100, GENESIS_HASH, || ticket.is_cancelled()),
            None
        );
    }
}
