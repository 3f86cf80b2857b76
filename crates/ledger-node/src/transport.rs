use ledger_core::{ChainResponse, ChainTransport, TransportError};
use std::time::Duration;

/// Fetches peer chains from `http://{peer}/chain`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ChainTransport for HttpTransport {
    async fn get_chain(&self, peer: &str) -> Result<ChainResponse, TransportError> {
        let response = self
            .client
            .get(format!("http://{peer}/chain"))
            .send()
            .await
            .map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response.json::<ChainResponse>().await.map_err(classify)
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::Malformed(err.to_string())
    } else {
        TransportError::Unreachable(err.to_string())
    }
}
