use crate::constants::HASH_SIZE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod canonical;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mine;
pub mod peers;
pub mod service;
pub mod transport;

pub use consensus::{ConsensusResolver, Resolution};
pub use error::{ChainFault, LedgerError, TransportError};
pub use ledger::Ledger;
pub use mine::{MiningEpoch, MiningTicket};
pub use peers::PeerRegistry;
pub use service::{LedgerService, ServiceOptions, TipSnapshot};
pub use transport::{ChainResponse, ChainTransport};

pub type Hash = [u8; HASH_SIZE];

/// Seconds since the unix epoch with sub-second precision.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Identifier of this process, stamped as owner on the certificates it mines.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn generate() -> Self {
        Self(hex::encode(rand::random::<[u8; 16]>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A certificate record. The payload fields are opaque to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub owner: String,
    pub name: String,
    pub rollnumber: String,
    pub cgpa: String,
}

impl Transaction {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        rollnumber: impl Into<String>,
        cgpa: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            rollnumber: rollnumber.into(),
            cgpa: cgpa.into(),
        }
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("owner".into(), Value::from(self.owner.as_str()));
        map.insert("name".into(), Value::from(self.name.as_str()));
        map.insert("rollnumber".into(), Value::from(self.rollnumber.as_str()));
        map.insert("cgpa".into(), Value::from(self.cgpa.as_str()));
        Value::Object(map)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// Canonical encoding the digest is computed over.
    pub fn canonical_json(&self) -> String {
        let mut map = Map::new();
        map.insert("index".into(), Value::from(self.index));
        map.insert("timestamp".into(), Value::from(self.timestamp));
        map.insert(
            "transactions".into(),
            Value::Array(self.transactions.iter().map(Transaction::to_value).collect()),
        );
        map.insert("proof".into(), Value::from(self.proof));
        map.insert("previous_hash".into(), Value::from(self.previous_hash.as_str()));
        canonical::to_canonical_string(&Value::Object(map))
    }

    /// Lowercase hex SHA-256 of the canonical encoding.
    pub fn hash(&self) -> String {
        digest(self)
    }
}

pub fn digest(block: &Block) -> String {
    hex::encode(sha256(block.canonical_json().as_bytes()))
}

fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

pub mod pow {
    use super::{sha256, Hash};
    use crate::constants::POW_TARGET_DIFFICULTY;

    /// Digest of the puzzle input `"{previous_proof}{proof}{previous_hash}"`.
    pub fn proof_digest(previous_proof: u64, proof: u64, previous_hash: &str) -> Hash {
        let guess = format!("{previous_proof}{proof}{previous_hash}");
        sha256(guess.as_bytes())
    }

    pub fn valid_proof(previous_proof: u64, proof: u64, previous_hash: &str) -> bool {
        let hash = proof_digest(previous_proof, proof, previous_hash);
        count_leading_zero_nibbles(&hash) >= POW_TARGET_DIFFICULTY
    }

    /// Smallest proof satisfying [`valid_proof`], searched sequentially from zero.
    pub fn find_proof(previous_proof: u64, previous_hash: &str) -> u64 {
        let mut proof = 0u64;
        while !valid_proof(previous_proof, proof, previous_hash) {
            proof += 1;
        }
        proof
    }

    /// Number of leading `0` digits in the hex rendering of `hash`.
    pub fn count_leading_zero_nibbles(hash: &Hash) -> usize {
        let mut total = 0usize;
        for b in hash {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }
}

pub mod chain {
    use super::*;
    use crate::constants::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
    use crate::error::{ChainFault, LedgerError};
    use anyhow::Result;

    /// Persistence seam for the ledger. Lives in `ledger-core` so storage backends can
    /// depend on the core without a cycle.
    pub trait ChainStore: Send + Sync {
        fn put_block(&self, block: &Block) -> Result<()>;
        fn get_block(&self, index: u64) -> Result<Option<Block>>;
        fn tip_height(&self) -> Result<u64>;
        fn load_chain(&self) -> Result<Vec<Block>>;
        /// Replace every stored block with `chain`.
        fn replace_chain(&self, chain: &[Block]) -> Result<()>;
        fn close(&self) -> Result<()>;
    }

    pub fn genesis_block() -> Block {
        Block {
            index: GENESIS_INDEX,
            timestamp: now_secs(),
            transactions: vec![],
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        }
    }

    /// Walk `candidate` pairwise checking linkage, proof and index continuity.
    /// Empty and single-block chains are valid. A block at `u64::MAX` is rejected since
    /// nothing could ever be appended after it.
    pub fn validate_chain(candidate: &[Block]) -> Result<(), LedgerError> {
        if let Some(block) = candidate.iter().find(|b| b.index == u64::MAX) {
            return Err(LedgerError::ChainInvalid {
                index: block.index,
                reason: ChainFault::IndexOverflow,
            });
        }
        for pair in candidate.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let prev_hash = prev.hash();
            let expected = prev.index + 1;
            let fault = if cur.index != expected {
                Some(ChainFault::IndexGap {
                    expected,
                    found: cur.index,
                })
            } else if cur.previous_hash != prev_hash {
                Some(ChainFault::PreviousHashMismatch)
            } else if !pow::valid_proof(prev.proof, cur.proof, &prev_hash) {
                Some(ChainFault::InvalidProof)
            } else {
                None
            };
            if let Some(reason) = fault {
                return Err(LedgerError::ChainInvalid {
                    index: cur.index,
                    reason,
                });
            }
        }
        Ok(())
    }

    pub fn is_chain_valid(candidate: &[Block]) -> bool {
        validate_chain(candidate).is_ok()
    }
}
