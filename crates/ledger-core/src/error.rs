use thiserror::Error;

/// Why a candidate chain was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainFault {
    #[error("previous_hash does not match the digest of the preceding block")]
    PreviousHashMismatch,
    #[error("proof does not satisfy the difficulty target")]
    InvalidProof,
    #[error("index gap: expected {expected}, found {found}")]
    IndexGap { expected: u64, found: u64 },
    #[error("block index has no successor")]
    IndexOverflow,
}

/// Failure fetching a peer's chain. The resolver skips the peer on any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("peer timed out")]
    Timeout,
    #[error("peer answered with status {0}")]
    Status(u16),
    #[error("malformed chain response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid peer address: {0:?}")]
    InvalidAddress(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("chain invalid at block {index}: {reason}")]
    ChainInvalid { index: u64, reason: ChainFault },

    #[error("mined proof is stale: the chain tip moved during the search")]
    StaleMiningResult,

    #[error("mining was cancelled")]
    MiningCancelled,

    #[error("mining task failed: {0}")]
    Mining(String),
}
