use std::fs;

use ledger_core::{Block, Transaction};
use ledger_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

/// Linked-looking blocks; proofs are not real, the store does not validate.
pub fn sample_blocks(count: u64) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for index in 1..=count {
        let previous_hash = blocks
            .last()
            .map(|b| b.hash())
            .unwrap_or_else(|| "1".to_string());
        blocks.push(Block {
            index,
            timestamp: 1_600_000_000.0 + index as f64 * 0.5,
            transactions: vec![Transaction::new(
                format!("owner-{index}"),
                format!("student {index}"),
                format!("{index:04}"),
                "8.5",
            )],
            proof: index * 7,
            previous_hash,
        });
    }
    blocks
}
