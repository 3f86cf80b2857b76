pub const HASH_SIZE: usize = 32;

/// Leading hex zeros a proof digest needs.
pub const POW_TARGET_DIFFICULTY: usize = 4;
pub const PROOF_SEARCH_BATCH: u64 = 1 << 14;

pub const GENESIS_INDEX: u64 = 1;
pub const GENESIS_PROOF: u64 = 100;
pub const GENESIS_PREVIOUS_HASH: &str = "1";

pub const DEFAULT_PEER_TIMEOUT_MS: u64 = 5_000;
