use crate::error::TransportError;
use crate::Block;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A peer's full chain as served on `GET /chain`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: u64,
}

impl ChainResponse {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len() as u64;
        Self { chain, length }
    }

    /// Reject responses whose advertised length disagrees with the blocks sent.
    pub fn into_checked_chain(self) -> Result<Vec<Block>, TransportError> {
        if self.length != self.chain.len() as u64 {
            return Err(TransportError::Malformed(format!(
                "advertised length {} but sent {} blocks",
                self.length,
                self.chain.len()
            )));
        }
        Ok(self.chain)
    }
}

/// How the consensus resolver reaches peers.
pub trait ChainTransport: Send + Sync {
    fn get_chain(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<ChainResponse, TransportError>> + Send;
}
