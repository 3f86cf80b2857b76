use crate::chain::{genesis_block, validate_chain};
use crate::error::LedgerError;
use crate::{now_secs, Block, Transaction};
use tracing::{debug, info};

/// The local replica: an append-only chain plus the buffer of transactions waiting for
/// the next block. Callers share it behind a single lock.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            chain: vec![genesis_block()],
            pending: Vec::new(),
        }
    }

    /// Rebuild a ledger from a previously stored chain.
    pub fn from_chain(chain: Vec<Block>) -> Result<Self, LedgerError> {
        if chain.is_empty() {
            return Ok(Self::new());
        }
        validate_chain(&chain)?;
        Ok(Self {
            chain,
            pending: Vec::new(),
        })
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        // A ledger always holds at least its genesis block.
        &self.chain[self.chain.len() - 1]
    }

    /// Queue `tx` for the next block and return that block's index.
    pub fn new_transaction(&mut self, tx: Transaction) -> u64 {
        self.pending.push(tx);
        self.last_block().index + 1
    }

    /// Seal the pending buffer into a new block. `previous_hash` defaults to the digest
    /// of the current last block.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> &Block {
        let previous_hash = previous_hash.unwrap_or_else(|| self.last_block().hash());
        let block = Block {
            index: self.last_block().index + 1,
            timestamp: now_secs(),
            transactions: std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        };
        info!(
            index = block.index,
            proof,
            txs = block.transactions.len(),
            "sealed new block"
        );
        self.chain.push(block);
        self.last_block()
    }

    /// Read-only check of a foreign chain against the linking and proof rules.
    pub fn is_chain_valid(&self, candidate: &[Block]) -> bool {
        match validate_chain(candidate) {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "candidate chain rejected");
                false
            }
        }
    }

    /// Swap in `chain` wholesale. Unmined local transactions are discarded.
    pub(crate) fn replace_chain(&mut self, chain: Vec<Block>) {
        let dropped = self.pending.len();
        self.chain = chain;
        self.pending.clear();
        info!(
            length = self.chain.len(),
            dropped_pending = dropped,
            "local chain replaced"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainFault;
    use crate::fixtures::*;
    use crate::pow;

    #[test]
    fn new_ledger_holds_genesis() {
        let ledger = Ledger::new();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.last_block().index, 1);
        assert_eq!(ledger.last_block().proof, 100);
        assert_eq!(ledger.last_block().previous_hash, "1");
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn new_transaction_returns_next_index_and_is_not_idempotent() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.new_transaction(certificate()), 2);
        assert_eq!(ledger.new_transaction(certificate()), 2);
        assert_eq!(ledger.pending().len(), 2);
    }

    #[test]
    fn mining_then_sealing_flushes_pending() {
        let mut ledger = Ledger::from_chain(vec![genesis()]).unwrap();
        ledger.new_transaction(certificate());

        let last = ledger.last_block().clone();
        let proof = pow::find_proof(last.proof, &last.hash());
        assert_eq!(proof, SECOND_PROOF);

        let block = ledger.new_block(proof, None).clone();
        assert_eq!(block.index, 2);
        assert_eq!(block.transactions, vec![certificate()]);
        assert_eq!(block.previous_hash, GENESIS_HASH);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.pending().is_empty());
        assert!(ledger.is_chain_valid(ledger.chain()));
    }

    #[test]
    fn explicit_previous_hash_is_used_verbatim() {
        let mut ledger = Ledger::new();
        let block = ledger.new_block(7, Some("abc".into()));
        assert_eq!(block.previous_hash, "abc");
        assert!(!ledger.is_chain_valid(ledger.chain()));
    }

    #[test]
    fn transaction_lands_in_exactly_one_block() {
        let mut ledger = Ledger::from_chain(vec![genesis()]).unwrap();
        ledger.new_transaction(certificate());
        ledger.new_block(SECOND_PROOF, None);
        let next = pow::find_proof(SECOND_PROOF, &ledger.last_block().hash());
        ledger.new_block(next, None);
        let hits = ledger
            .chain()
            .iter()
            .flat_map(|b| &b.transactions)
            .filter(|tx| **tx == certificate())
            .count();
        assert_eq!(hits, 1);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn is_chain_valid_does_not_touch_receiver() {
        let mut ledger = Ledger::new();
        ledger.new_transaction(certificate());
        let mut foreign = valid_chain();
        foreign[1].previous_hash = "bogus".into();
        assert!(!ledger.is_chain_valid(&foreign));
        assert!(ledger.is_chain_valid(&valid_chain()));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending().len(), 1);
    }

    #[test]
    fn from_chain_rejects_invalid_chain() {
        let mut blocks = valid_chain();
        blocks[1].proof = 0;
        assert!(Ledger::from_chain(blocks).is_err());
        assert_eq!(Ledger::from_chain(valid_chain()).unwrap().len(), 3);
    }

    #[test]
    fn from_chain_rejects_tip_without_successor() {
        let stuck = Block {
            index: u64::MAX,
            ..genesis()
        };
        assert!(matches!(
            Ledger::from_chain(vec![stuck]),
            Err(LedgerError::ChainInvalid {
                reason: ChainFault::IndexOverflow,
                ..
            })
        ));
    }

    #[test]
    fn replace_chain_clears_pending() {
        let mut ledger = Ledger::new();
        ledger.new_transaction(certificate());
        ledger.replace_chain(valid_chain());
        assert_eq!(ledger.len(), 3);
        assert!(ledger.pending().is_empty());
    }
}
