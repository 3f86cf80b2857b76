pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub(crate) const DEFAULT_DATA_DIR: &str = "./data";

pub(crate) const MSG_BLOCK_FORGED: &str = "New Block Forged";
pub(crate) const MSG_NODES_ADDED: &str = "New nodes have been added";
pub(crate) const MSG_CHAIN_REPLACED: &str = "Our chain was replaced";
pub(crate) const MSG_CHAIN_AUTHORITATIVE: &str = "Our chain is authoritative";
