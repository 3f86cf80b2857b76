use anyhow::{Context, Result};
use ledger_core::chain::ChainStore;
use ledger_core::Block;
use sled::{Db, IVec, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const KEY_TIP_HEIGHT: &[u8] = b"tip_height";
const KEY_TIP_HASH: &[u8] = b"tip_hash";

/// Blocks keyed by big-endian index so tree order is chain order.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path.as_ref())
      .with_context(|| format!("opening sled store at {}", path.as_ref().display()))?;
    info!("sled store opened");
    Ok(Self { db })
  }

  fn blocks(&self) -> Result<Tree> {
    Ok(self.db.open_tree(TREE_BLOCKS)?)
  }

  /// Digest of the stored tip, if any.
  pub fn tip_hash(&self) -> Result<Option<String>> {
    Ok(
      self
        .db
        .get(KEY_TIP_HASH)?
        .map(|v| String::from_utf8_lossy(&v).into_owned()),
    )
  }

  /// Drop every block and the tip markers.
  pub fn clear(&self) -> Result<()> {
    self.blocks()?.clear()?;
    self.db.remove(KEY_TIP_HEIGHT)?;
    self.db.remove(KEY_TIP_HASH)?;
    self.db.flush()?;
    Ok(())
  }

  fn write_tip(&self, block: &Block) -> Result<()> {
    self.db.insert(KEY_TIP_HEIGHT, &block.index.to_be_bytes())?;
    self.db.insert(KEY_TIP_HASH, block.hash().as_bytes())?;
    Ok(())
  }
}

fn decode(index_hint: &[u8], ivec: IVec) -> Result<Block> {
  bincode::deserialize(&ivec).with_context(|| format!("decoding block at key {index_hint:?}"))
}

impl ChainStore for SledStore {
  fn put_block(&self, block: &Block) -> Result<()> {
    let tree = self.blocks()?;
    let key = block.index.to_be_bytes();
    let bytes = bincode::serialize(block)?;
    tree.insert(key, bytes)?;

    // update tip
    self.write_tip(block)?;

    self.db.flush()?;
    debug!(index = block.index, "block persisted");
    Ok(())
  }

  fn get_block(&self, index: u64) -> Result<Option<Block>> {
    let key = index.to_be_bytes();
    self
      .blocks()?
      .get(key)?
      .map(|ivec| decode(&key, ivec))
      .transpose()
  }

  fn tip_height(&self) -> Result<u64> {
    Ok(
      self
        .db
        .get(KEY_TIP_HEIGHT)?
        .map(|v| {
          let mut arr = [0u8; 8];
          arr.copy_from_slice(&v);
          u64::from_be_bytes(arr)
        })
        .unwrap_or(0),
    )
  }

  fn load_chain(&self) -> Result<Vec<Block>> {
    self
      .blocks()?
      .iter()
      .map(|entry| {
        let (key, value) = entry?;
        decode(&key, value)
      })
      .collect()
  }

  fn replace_chain(&self, chain: &[Block]) -> Result<()> {
    let tree = self.blocks()?;
    let mut batch = sled::Batch::default();
    for key in tree.iter().keys() {
      batch.remove(key?);
    }
    for block in chain {
      batch.insert(block.index.to_be_bytes().to_vec(), bincode::serialize(block)?);
    }
    tree.apply_batch(batch)?;

    match chain.last() {
      Some(tip) => self.write_tip(tip)?,
      None => {
        self.db.remove(KEY_TIP_HEIGHT)?;
        self.db.remove(KEY_TIP_HASH)?;
      }
    }
    self.db.flush()?;
    info!(length = chain.len(), "stored chain replaced");
    Ok(())
  }

  fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }
}
