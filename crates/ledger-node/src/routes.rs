use crate::constants::{
    MSG_BLOCK_FORGED, MSG_CHAIN_AUTHORITATIVE, MSG_CHAIN_REPLACED, MSG_NODES_ADDED,
};
use crate::SharedService;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{Block, ChainResponse, LedgerError, Resolution, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chain", get(full_chain))
        .route("/transactions/new", post(new_transaction))
        .route("/transactions/pending", get(pending_transactions))
        .route("/mine", post(mine))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    BadRequest(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Ledger(err @ LedgerError::InvalidAddress(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Ledger(
                err @ (LedgerError::StaleMiningResult | LedgerError::MiningCancelled),
            ) => (StatusCode::CONFLICT, err.to_string()),
            ApiError::Ledger(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    node_id: String,
    height: u64,
}

async fn health(State(service): State<SharedService>) -> Json<Health> {
    let (_, height) = service.chain().await;
    Json(Health {
        status: "ok",
        node_id: service.node_id().to_string(),
        height,
    })
}

async fn full_chain(State(service): State<SharedService>) -> Json<ChainResponse> {
    let (chain, _) = service.chain().await;
    Json(ChainResponse::new(chain))
}

#[derive(Deserialize)]
struct TxIn {
    owner: Option<String>,
    name: String,
    rollnumber: String,
    cgpa: String,
}

async fn new_transaction(
    State(service): State<SharedService>,
    Json(tx): Json<TxIn>,
) -> impl IntoResponse {
    let owner = tx
        .owner
        .unwrap_or_else(|| service.node_id().to_string());
    let index = service
        .submit_transaction(Transaction::new(owner, tx.name, tx.rollnumber, tx.cgpa))
        .await;
    (
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Transaction will be added to Block {index}"),
            "index": index,
        })),
    )
}

async fn pending_transactions(State(service): State<SharedService>) -> Json<serde_json::Value> {
    let pending = service.pending().await;
    Json(json!({ "length": pending.len(), "transactions": pending }))
}

#[derive(Deserialize, Default)]
struct MineRequest {
    name: Option<String>,
    rollnumber: Option<String>,
    cgpa: Option<String>,
}

impl MineRequest {
    /// All three fields make a certificate, none means mine the pending buffer only.
    fn into_certificate(self) -> Result<Option<Transaction>, ApiError> {
        match (self.name, self.rollnumber, self.cgpa) {
            (Some(name), Some(rollnumber), Some(cgpa)) => {
                // owner is overwritten with the node id when the block is sealed
                Ok(Some(Transaction::new("", name, rollnumber, cgpa)))
            }
            (None, None, None) => Ok(None),
            _ => Err(ApiError::BadRequest("Missing values".into())),
        }
    }
}

#[derive(Serialize)]
struct MineResponse {
    message: &'static str,
    index: u64,
    transactions: Vec<Transaction>,
    proof: u64,
    previous_hash: String,
}

impl From<Block> for MineResponse {
    fn from(block: Block) -> Self {
        Self {
            message: MSG_BLOCK_FORGED,
            index: block.index,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }
    }
}

async fn mine(
    State(service): State<SharedService>,
    Json(request): Json<MineRequest>,
) -> Result<Json<MineResponse>, ApiError> {
    let certificate = request.into_certificate()?;
    let block = service.mine_block(certificate).await?;
    info!(index = block.index, "block forged");
    Ok(Json(block.into()))
}

#[derive(Deserialize)]
struct RegisterRequest {
    nodes: Option<Vec<String>>,
}

async fn register_nodes(
    State(service): State<SharedService>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nodes = request.nodes.ok_or_else(|| {
        ApiError::BadRequest("Error: Please supply a valid list of nodes".into())
    })?;
    let total_nodes = service.register_peers(&nodes).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": MSG_NODES_ADDED, "total_nodes": total_nodes })),
    ))
}

async fn consensus(State(service): State<SharedService>) -> Json<serde_json::Value> {
    match service.resolve().await {
        Resolution::Replaced(chain) => {
            Json(json!({ "message": MSG_CHAIN_REPLACED, "new_chain": chain }))
        }
        Resolution::Authoritative(chain) => {
            Json(json!({ "message": MSG_CHAIN_AUTHORITATIVE, "chain": chain }))
        }
    }
}
