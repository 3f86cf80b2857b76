use ledger_node::config::NodeConfig;
use ledger_node::{build_service, routes, SharedService};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

struct TestNode {
    addr: String,
    service: SharedService,
    client: reqwest::Client,
}

impl TestNode {
    async fn start() -> anyhow::Result<Self> {
        let config = NodeConfig {
            data_dir: None,
            peer_timeout_ms: 2_000,
            ..NodeConfig::default()
        };
        Self::start_with(config).await
    }

    async fn start_with(config: NodeConfig) -> anyhow::Result<Self> {
        let service = build_service(&config).await?;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        let app = routes::router(service.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self {
            addr,
            service,
            client: reqwest::Client::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn get(&self, path: &str) -> anyhow::Result<(StatusCode, Value)> {
        let res = self.client.get(self.url(path)).send().await?;
        Ok((res.status(), res.json().await?))
    }

    async fn post(&self, path: &str, body: Value) -> anyhow::Result<(StatusCode, Value)> {
        let res = self.client.post(self.url(path)).json(&body).send().await?;
        Ok((res.status(), res.json().await?))
    }

    async fn mine(&self) -> anyhow::Result<Value> {
        let (status, body) = self.post("/mine", json!({})).await?;
        assert_eq!(status, StatusCode::OK);
        Ok(body)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fresh_node_serves_genesis() -> anyhow::Result<()> {
    let node = TestNode::start().await?;

    let (status, body) = node.get("/chain").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["length"], 1);
    assert_eq!(body["chain"][0]["index"], 1);
    assert_eq!(body["chain"][0]["proof"], 100);
    assert_eq!(body["chain"][0]["previous_hash"], "1");
    assert_eq!(body["chain"][0]["transactions"], json!([]));

    let (status, health) = node.get("/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["height"], 1);
    assert_eq!(health["node_id"], node.service.node_id().as_str());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transactions_queue_until_mined() -> anyhow::Result<()> {
    let node = TestNode::start().await?;

    let (status, body) = node
        .post(
            "/transactions/new",
            json!({ "owner": "alice", "name": "Alice", "rollnumber": "42", "cgpa": "9.1" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["index"], 2);
    assert_eq!(body["message"], "Transaction will be added to Block 2");

    let (_, pending) = node.get("/transactions/pending").await?;
    assert_eq!(pending["length"], 1);
    assert_eq!(pending["transactions"][0]["owner"], "alice");

    let (status, mined) = node
        .post(
            "/mine",
            json!({ "name": "Bob", "rollnumber": "7", "cgpa": "8.5" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mined["message"], "New Block Forged");
    assert_eq!(mined["index"], 2);
    let txs = mined["transactions"].as_array().cloned().unwrap_or_default();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0]["owner"], "alice");
    assert_eq!(txs[1]["name"], "Bob");
    assert_eq!(txs[1]["owner"], node.service.node_id().as_str());

    let (_, chain) = node.get("/chain").await?;
    assert_eq!(chain["length"], 2);
    assert_eq!(chain["chain"][1]["previous_hash"], mined["previous_hash"]);
    let (_, pending) = node.get("/transactions/pending").await?;
    assert_eq!(pending["length"], 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_certificate_is_rejected() -> anyhow::Result<()> {
    let node = TestNode::start().await?;
    let (status, body) = node
        .post("/mine", json!({ "name": "Bob", "cgpa": "8.5" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing values");

    let (_, chain) = node.get("/chain").await?;
    assert_eq!(chain["length"], 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn register_validates_addresses() -> anyhow::Result<()> {
    let node = TestNode::start().await?;

    let (status, _) = node.post("/nodes/register", json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = node
        .post("/nodes/register", json!({ "nodes": ["   "] }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = node
        .post(
            "/nodes/register",
            json!({ "nodes": ["http://127.0.0.1:5001", "127.0.0.1:5002", "http://127.0.0.1:5001/"] }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "New nodes have been added");
    assert_eq!(body["total_nodes"], json!(["127.0.0.1:5001", "127.0.0.1:5002"]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shorter_node_adopts_longer_chain() -> anyhow::Result<()> {
    let long = TestNode::start().await?;
    let short = TestNode::start().await?;
    long.mine().await?;
    long.mine().await?;

    short
        .post(
            "/transactions/new",
            json!({ "owner": "x", "name": "dropped", "rollnumber": "0", "cgpa": "0" }),
        )
        .await?;
    short
        .post("/nodes/register", json!({ "nodes": [format!("http://{}", long.addr)] }))
        .await?;

    let (status, body) = short.get("/nodes/resolve").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Our chain was replaced");

    let (_, theirs) = long.get("/chain").await?;
    assert_eq!(body["new_chain"], theirs["chain"]);
    let (_, ours) = short.get("/chain").await?;
    assert_eq!(ours, theirs);
    let (_, pending) = short.get("/transactions/pending").await?;
    assert_eq!(pending["length"], 0);

    // the longer node keeps its chain against the now equal peer
    long.post("/nodes/register", json!({ "nodes": [short.addr.clone()] }))
        .await?;
    let (_, body) = long.get("/nodes/resolve").await?;
    assert_eq!(body["message"], "Our chain is authoritative");
    assert_eq!(body["chain"], theirs["chain"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_peer_leaves_chain_alone() -> anyhow::Result<()> {
    let node = TestNode::start().await?;
    node.mine().await?;
    node.post("/nodes/register", json!({ "nodes": ["127.0.0.1:1"] }))
        .await?;

    let started = Instant::now();
    let (status, body) = node.get("/nodes/resolve").await?;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Our chain is authoritative");
    assert_eq!(body["chain"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chain_survives_restart_with_data_dir() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = NodeConfig {
        data_dir: Some(dir.path().join("chain")),
        ..NodeConfig::default()
    };

    let mined = {
        let service = build_service(&config).await?;
        service.mine_block(None).await?
    };

    let service = build_service(&config).await?;
    let (chain, height) = service.chain().await;
    assert_eq!(height, 2);
    assert_eq!(chain[1], mined);
    Ok(())
}
