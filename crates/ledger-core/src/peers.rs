use crate::error::LedgerError;
use std::collections::BTreeSet;
use tracing::info;
use url::Url;

/// Known peer addresses, stored without scheme (`host:port`).
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    nodes: BTreeSet<String>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and insert `address`. Returns the stored form; re-registering is a no-op.
    pub fn register(&mut self, address: &str) -> Result<String, LedgerError> {
        let normalized = normalize_address(address)?;
        if self.nodes.insert(normalized.clone()) {
            info!(peer = %normalized, "registered peer");
        }
        Ok(normalized)
    }

    /// Register addresses in order, stopping at the first malformed one.
    pub fn register_all<I, S>(&mut self, addresses: I) -> Result<(), LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for address in addresses {
            self.register(address.as_ref())?;
        }
        Ok(())
    }

    pub fn peers(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.nodes.contains(address)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// `http://host:port/x` -> `host:port`, `//host:port` -> `host:port`,
/// `host:port` -> `host:port`. Query and fragment are dropped.
pub fn normalize_address(address: &str) -> Result<String, LedgerError> {
    let invalid = || LedgerError::InvalidAddress(address.to_string());
    let trimmed = address.trim();

    let with_authority = if trimmed.contains("://") {
        Some(trimmed.to_string())
    } else {
        trimmed.strip_prefix("//").map(|rest| format!("http://{rest}"))
    };

    let normalized = match with_authority {
        Some(raw) => {
            let url = Url::parse(&raw).map_err(|_| invalid())?;
            match (url.host_str(), url.port()) {
                (Some(host), Some(port)) if !host.is_empty() => format!("{host}:{port}"),
                (Some(host), None) if !host.is_empty() => host.to_string(),
                // no authority, keep the path the way urlparse does
                _ => url.path().to_string(),
            }
        }
        None => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    if normalized.is_empty() {
        return Err(invalid());
    }
    Ok(normalized)
}
