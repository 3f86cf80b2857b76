//! Node configuration: an optional TOML file overlaid by command-line flags.

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_LISTEN};
use anyhow::{Context, Result};
use clap::Parser;
use ledger_core::constants::DEFAULT_PEER_TIMEOUT_MS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ledger-node", about = "Proof-of-work certificate ledger node")]
pub struct Args {
    /// TOML file with node settings; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long)]
    pub listen: Option<String>,

    /// Data directory for sled
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Keep the chain in memory only
    #[arg(long)]
    pub in_memory: bool,

    /// Peer to register at startup (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Per-peer timeout while resolving consensus
    #[arg(long)]
    pub peer_timeout_ms: Option<u64>,

    /// Run consensus resolution on this interval
    #[arg(long)]
    pub resolve_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    pub listen: String,
    /// `None` keeps the chain in memory.
    pub data_dir: Option<PathBuf>,
    pub peers: Vec<String>,
    pub peer_timeout_ms: u64,
    pub resolve_interval_secs: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            data_dir: Some(PathBuf::from(DEFAULT_DATA_DIR)),
            peers: Vec::new(),
            peer_timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
            resolve_interval_secs: None,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// File values first, then any flag that was given.
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(listen) = &args.listen {
            config.listen = listen.clone();
        }
        if let Some(dir) = &args.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if args.in_memory {
            config.data_dir = None;
        }
        config.peers.extend(args.peers.iter().cloned());
        if let Some(ms) = args.peer_timeout_ms {
            config.peer_timeout_ms = ms;
        }
        if args.resolve_interval_secs.is_some() {
            config.resolve_interval_secs = args.resolve_interval_secs;
        }
        Ok(config)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn resolve_interval(&self) -> Option<Duration> {
        self.resolve_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
