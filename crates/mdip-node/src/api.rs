//! HTTP API server for the Gatekeeper node.
//!
//! Exposes the ledger under `/api/v1`: DID create/update/delete and
//! resolution, bulk export and import, registry queues, maintenance, the
//! content store and the block index.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use mdip_core::{
    BlockId, BlockInfo, GatekeeperEvent, MdipError, MdipResult, Operation, OperationType,
};
use mdip_gatekeeper::{
    CheckDidsResult, GetDidsOptions, GetDidsResult, ImportBatchResult, ProcessEventsResult,
    ResolveOptions, VerifyDbResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::state::NodeState;

/// Protocol version reported by `/version`.
pub const API_VERSION: u32 = 1;

// --- Request / response types ---

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub uptime_seconds: u64,
    pub dids: Option<CheckDidsResult>,
}

#[derive(Deserialize, Default)]
pub struct DidsRequest {
    #[serde(default)]
    pub dids: Option<Vec<String>>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Map ledger errors to status codes. Storage and internal details stay in the log.
fn to_api_error(e: MdipError) -> ApiError {
    match e {
        MdipError::InvalidDid(_)
        | MdipError::UnknownDid(_)
        | MdipError::InvalidOperation(_)
        | MdipError::InvalidParameter(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        other => {
            tracing::error!(error = %other, "request failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn respond<T>(result: MdipResult<T>) -> ApiResult<T> {
    result.map(Json).map_err(to_api_error)
}

// --- Node ---

async fn handle_ready(State(state): State<Arc<NodeState>>) -> Json<bool> {
    Json(state.is_ready())
}

async fn handle_version() -> Json<u32> {
    Json(API_VERSION)
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        uptime_seconds: state.uptime_seconds(),
        dids: state.last_check().await,
    })
}

async fn handle_registries(State(state): State<Arc<NodeState>>) -> Json<Vec<String>> {
    Json(state.gatekeeper.list_registries().await)
}

// --- DIDs ---

/// Creates return the new DID; updates and deletes return whether they were accepted.
async fn handle_submit_operation(
    State(state): State<Arc<NodeState>>,
    Json(operation): Json<Operation>,
) -> ApiResult<Value> {
    let gk = &state.gatekeeper;
    let result = match operation.op_type {
        OperationType::Create => gk.create_did(operation).await.map(Value::String),
        OperationType::Update => gk.update_did(operation).await.map(Value::Bool),
        OperationType::Delete => gk.delete_did(operation).await.map(Value::Bool),
    };
    respond(result)
}

async fn handle_generate_did(
    State(state): State<Arc<NodeState>>,
    Json(operation): Json<Operation>,
) -> ApiResult<String> {
    respond(state.gatekeeper.generate_did(&operation).await)
}

async fn handle_resolve_did(
    State(state): State<Arc<NodeState>>,
    Path(did): Path<String>,
    Query(options): Query<ResolveOptions>,
) -> ApiResult<mdip_core::MdipDocument> {
    state
        .gatekeeper
        .resolve_did(&did, options)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::debug!(did = %did, error = %e, "resolve failed");
            api_error(StatusCode::NOT_FOUND, "DID not found")
        })
}

async fn handle_update_did(
    State(state): State<Arc<NodeState>>,
    Path(did): Path<String>,
    Json(operation): Json<Operation>,
) -> ApiResult<bool> {
    if operation.did.as_deref() != Some(did.as_str()) {
        return Err(api_error(StatusCode::BAD_REQUEST, "operation.did does not match path"));
    }
    respond(state.gatekeeper.update_did(operation).await)
}

async fn handle_delete_did(
    State(state): State<Arc<NodeState>>,
    Path(did): Path<String>,
    Json(operation): Json<Operation>,
) -> ApiResult<bool> {
    if operation.did.as_deref() != Some(did.as_str()) {
        return Err(api_error(StatusCode::BAD_REQUEST, "operation.did does not match path"));
    }
    respond(state.gatekeeper.delete_did(operation).await)
}

async fn handle_get_dids(
    State(state): State<Arc<NodeState>>,
    Json(options): Json<GetDidsOptions>,
) -> ApiResult<GetDidsResult> {
    respond(state.gatekeeper.get_dids(options).await)
}

async fn handle_remove_dids(
    State(state): State<Arc<NodeState>>,
    Json(dids): Json<Vec<String>>,
) -> ApiResult<bool> {
    respond(state.gatekeeper.remove_dids(&dids).await)
}

async fn handle_export_dids(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<DidsRequest>,
) -> ApiResult<Vec<Vec<GatekeeperEvent>>> {
    respond(state.gatekeeper.export_dids(req.dids).await)
}

async fn handle_import_dids(
    State(state): State<Arc<NodeState>>,
    Json(dids): Json<Vec<Vec<GatekeeperEvent>>>,
) -> ApiResult<ImportBatchResult> {
    respond(state.gatekeeper.import_dids(dids).await)
}

async fn handle_export_batch(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<DidsRequest>,
) -> ApiResult<Vec<GatekeeperEvent>> {
    respond(state.gatekeeper.export_batch(req.dids).await)
}

async fn handle_import_batch(
    State(state): State<Arc<NodeState>>,
    Json(batch): Json<Vec<Value>>,
) -> ApiResult<ImportBatchResult> {
    respond(state.gatekeeper.import_batch_json(batch).await)
}

// --- Queues and maintenance ---

async fn handle_get_queue(
    State(state): State<Arc<NodeState>>,
    Path(registry): Path<String>,
) -> ApiResult<Vec<Operation>> {
    respond(state.gatekeeper.get_queue(&registry).await)
}

async fn handle_clear_queue(
    State(state): State<Arc<NodeState>>,
    Path(registry): Path<String>,
    Json(operations): Json<Vec<Operation>>,
) -> ApiResult<bool> {
    respond(state.gatekeeper.clear_queue(&registry, &operations).await)
}

async fn handle_process_events(State(state): State<Arc<NodeState>>) -> Json<ProcessEventsResult> {
    Json(state.gatekeeper.process_events().await)
}

async fn handle_reset_db(State(state): State<Arc<NodeState>>) -> ApiResult<bool> {
    respond(state.gatekeeper.reset_db().await)
}

async fn handle_verify_db(State(state): State<Arc<NodeState>>) -> ApiResult<VerifyDbResult> {
    respond(state.gatekeeper.verify_db().await)
}

// --- Content store ---

async fn handle_add_json(
    State(state): State<Arc<NodeState>>,
    Json(value): Json<Value>,
) -> Result<String, ApiError> {
    state.gatekeeper.add_json(&value).await.map_err(to_api_error)
}

async fn handle_get_json(
    State(state): State<Arc<NodeState>>,
    Path(cid): Path<String>,
) -> ApiResult<Value> {
    match state.gatekeeper.get_json(&cid).await.map_err(to_api_error)? {
        Some(value) => Ok(Json(value)),
        None => Err(api_error(StatusCode::NOT_FOUND, "not found")),
    }
}

async fn handle_add_text(
    State(state): State<Arc<NodeState>>,
    text: String,
) -> Result<String, ApiError> {
    state.gatekeeper.add_text(&text).await.map_err(to_api_error)
}

async fn handle_get_text(
    State(state): State<Arc<NodeState>>,
    Path(cid): Path<String>,
) -> Result<String, ApiError> {
    state
        .gatekeeper
        .get_text(&cid)
        .await
        .map_err(to_api_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "not found"))
}

async fn handle_add_data(
    State(state): State<Arc<NodeState>>,
    data: Bytes,
) -> Result<String, ApiError> {
    state.gatekeeper.add_data(data).await.map_err(to_api_error)
}

async fn handle_get_data(
    State(state): State<Arc<NodeState>>,
    Path(cid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state
        .gatekeeper
        .get_data(&cid)
        .await
        .map_err(to_api_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "not found"))?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

// --- Blocks ---

async fn handle_latest_block(
    State(state): State<Arc<NodeState>>,
    Path(registry): Path<String>,
) -> ApiResult<Option<BlockInfo>> {
    respond(state.gatekeeper.get_block(&registry, None).await)
}

async fn handle_get_block(
    State(state): State<Arc<NodeState>>,
    Path((registry, block_id)): Path<(String, String)>,
) -> ApiResult<Option<BlockInfo>> {
    let id = BlockId::parse(&block_id);
    respond(state.gatekeeper.get_block(&registry, Some(id)).await)
}

async fn handle_add_block(
    State(state): State<Arc<NodeState>>,
    Path(registry): Path<String>,
    Json(block): Json<BlockInfo>,
) -> ApiResult<bool> {
    respond(state.gatekeeper.add_block(&registry, block).await)
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/ready", get(handle_ready))
        .route("/api/v1/version", get(handle_version))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/registries", get(handle_registries))
        .route("/api/v1/did", post(handle_submit_operation))
        .route("/api/v1/did/generate", post(handle_generate_did))
        .route(
            "/api/v1/did/{did}",
            get(handle_resolve_did)
                .post(handle_update_did)
                .delete(handle_delete_did),
        )
        .route("/api/v1/dids", post(handle_get_dids))
        .route("/api/v1/dids/remove", post(handle_remove_dids))
        .route("/api/v1/dids/export", post(handle_export_dids))
        .route("/api/v1/dids/import", post(handle_import_dids))
        .route("/api/v1/batch/export", post(handle_export_batch))
        .route("/api/v1/batch/import", post(handle_import_batch))
        .route("/api/v1/queue/{registry}", get(handle_get_queue))
        .route("/api/v1/queue/{registry}/clear", post(handle_clear_queue))
        .route("/api/v1/events/process", post(handle_process_events))
        .route("/api/v1/db/reset", get(handle_reset_db))
        .route("/api/v1/db/verify", get(handle_verify_db))
        .route("/api/v1/cas/json", post(handle_add_json))
        .route("/api/v1/cas/json/{cid}", get(handle_get_json))
        .route("/api/v1/cas/text", post(handle_add_text))
        .route("/api/v1/cas/text/{cid}", get(handle_get_text))
        .route("/api/v1/cas/data", post(handle_add_data))
        .route("/api/v1/cas/data/{cid}", get(handle_get_data))
        .route("/api/v1/block/{registry}", post(handle_add_block))
        .route("/api/v1/block/{registry}/latest", get(handle_latest_block))
        .route("/api/v1/block/{registry}/{block_id}", get(handle_get_block))
        .with_state(state)
}

/// Serve the API on an already bound listener until the task is dropped.
pub async fn start_api_server(listener: TcpListener, state: Arc<NodeState>) -> anyhow::Result<()> {
    let app = build_router(state);
    let listen_addr = listener.local_addr()?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
