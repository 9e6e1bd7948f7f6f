//! Route handlers
//!
//! Byte fields travel as hex strings. Transition endpoints answer with the
//! committed delta's root, cursor, sequence and published events.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use shielded_pool::{PoolError, ProofVerifier, StateDelta};

use super::middleware::{decode_hash_field, decode_hex_field, CorrelationId, ValidationError};
use super::AppState;
use crate::common::NodeError;
use crate::service::Submission;
use crate::types::{EventRecord, IdentifierRecord, StoredEvent};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub depositor: String,
    pub asset: String,
    pub amount: u64,
    pub commitment: String,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Deserialize)]
pub struct ProofRequest {
    pub public_inputs: String,
    pub proof: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub public_inputs: String,
    pub proof: String,
    pub receiver: String,
}

#[derive(Debug, Deserialize)]
pub struct InstructionRequest {
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub asset: String,
    pub account: String,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return events of transitions after this sequence
    #[serde(default)]
    pub after: u64,
    /// Number of transitions to cover
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub success: bool,
    pub sequence: u64,
    pub root: String,
    pub next_index: u64,
    pub events: Vec<EventRecord>,
}

impl From<&StateDelta> for TransitionResponse {
    fn from(delta: &StateDelta) -> Self {
        Self {
            success: true,
            sequence: delta.sequence,
            root: hex::encode(delta.root),
            next_index: delta.next_index,
            events: delta.events.iter().map(EventRecord::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub root: String,
    pub next_index: u64,
    pub sequence: u64,
    pub identifiers: usize,
    pub custody_account: String,
}

#[derive(Debug, Serialize)]
pub struct IdentifierResponse {
    pub id: String,
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<IdentifierRecord>,
}

#[derive(Debug, Serialize)]
pub struct NodeResponse {
    pub level: u32,
    pub position: u32,
    pub value: String,
    /// `false` when `value` is the empty-subtree hash
    pub stored: bool,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<StoredEvent>,
    /// Pass as `after` to fetch the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_after: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub asset: String,
    pub account: String,
    pub balance: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_code: Option<u32>,
    pub details: Option<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Handler error
#[derive(Debug)]
pub enum ApiError {
    Invalid(ValidationError),
    Node(NodeError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Invalid(e)
    }
}

impl From<NodeError> for ApiError {
    fn from(e: NodeError) -> Self {
        ApiError::Node(e)
    }
}

/// HTTP status for a ledger or node failure
pub fn status_for(error: &NodeError) -> StatusCode {
    match error {
        NodeError::Pool(e) => match e {
            PoolError::AlreadyUsed(_) | PoolError::OrderAlreadyExecuted { .. } => {
                StatusCode::CONFLICT
            }
            PoolError::ProofRejected(_) | PoolError::ReceiverMismatch { .. } => {
                StatusCode::FORBIDDEN
            }
            PoolError::CapacityExhausted => StatusCode::INSUFFICIENT_STORAGE,
            PoolError::TransferFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PoolError::Reentrancy | PoolError::StateBusy => StatusCode::SERVICE_UNAVAILABLE,
            PoolError::HashFailure | PoolError::InvalidSnapshot(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        },
        NodeError::Validation(_) => StatusCode::BAD_REQUEST,
        NodeError::Verifier(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(e) => e.into_response(),
            ApiError::Node(e) => {
                let response = ErrorResponse {
                    error: match &e {
                        NodeError::Pool(_) => "Transition rejected".to_string(),
                        _ => "Request failed".to_string(),
                    },
                    code: e.error_code().to_string(),
                    pool_code: e.pool_code(),
                    details: Some(e.to_string()),
                };
                (status_for(&e), Json(response)).into_response()
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// Transition Handlers
// =============================================================================

async fn submit<V: ProofVerifier + 'static>(
    service: &AppState<V>,
    correlation: &CorrelationId,
    submission: Submission,
) -> ApiResult<TransitionResponse> {
    let delta = service.submit(submission, &correlation.0).await?;
    Ok(Json(TransitionResponse::from(&delta)))
}

/// POST /api/deposit
pub async fn handle_deposit<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Extension(correlation): Extension<CorrelationId>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<TransitionResponse> {
    let memo = if req.memo.is_empty() {
        Vec::new()
    } else {
        decode_hex_field(&req.memo, None, "memo")?
    };
    let submission = Submission::Deposit {
        depositor: decode_hash_field(&req.depositor, "depositor")?,
        asset: decode_hash_field(&req.asset, "asset")?,
        amount: req.amount,
        commitment: decode_hash_field(&req.commitment, "commitment")?,
        memo,
    };
    submit(&service, &correlation, submission).await
}

/// POST /api/transact
pub async fn handle_transact<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Extension(correlation): Extension<CorrelationId>,
    Json(req): Json<ProofRequest>,
) -> ApiResult<TransitionResponse> {
    let submission = Submission::Transact {
        public_inputs: decode_hex_field(&req.public_inputs, None, "public_inputs")?,
        proof: decode_hex_field(&req.proof, None, "proof")?,
    };
    submit(&service, &correlation, submission).await
}

/// POST /api/withdraw
pub async fn handle_withdraw<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Extension(correlation): Extension<CorrelationId>,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<TransitionResponse> {
    let submission = Submission::Withdraw {
        public_inputs: decode_hex_field(&req.public_inputs, None, "public_inputs")?,
        proof: decode_hex_field(&req.proof, None, "proof")?,
        receiver: decode_hash_field(&req.receiver, "receiver")?,
    };
    submit(&service, &correlation, submission).await
}

/// POST /api/swap
pub async fn handle_swap<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Extension(correlation): Extension<CorrelationId>,
    Json(req): Json<ProofRequest>,
) -> ApiResult<TransitionResponse> {
    let submission = Submission::Swap {
        public_inputs: decode_hex_field(&req.public_inputs, None, "public_inputs")?,
        proof: decode_hex_field(&req.proof, None, "proof")?,
    };
    submit(&service, &correlation, submission).await
}

/// POST /api/instruction
///
/// Raw discriminator-prefixed instruction bytes.
pub async fn handle_instruction<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Extension(correlation): Extension<CorrelationId>,
    Json(req): Json<InstructionRequest>,
) -> ApiResult<TransitionResponse> {
    let data = decode_hex_field(&req.data, None, "data")?;
    submit(&service, &correlation, Submission::Instruction(data)).await
}

// =============================================================================
// Read Handlers
// =============================================================================

/// GET /api/state
pub async fn handle_state<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
) -> ApiResult<StateResponse> {
    let summary = service.summary().await?;
    Ok(Json(StateResponse {
        root: hex::encode(summary.root),
        next_index: summary.next_index,
        sequence: summary.sequence,
        identifiers: summary.identifiers,
        custody_account: hex::encode(service.custody().custody_account()),
    }))
}

/// GET /api/nullifiers/:id
///
/// Covers key images too; both live in the same registry.
pub async fn handle_identifier<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Path(id): Path<String>,
) -> ApiResult<IdentifierResponse> {
    let id = decode_hash_field(&id, "id")?;
    let record = service.identifier(&id).await?;
    Ok(Json(IdentifierResponse {
        id: hex::encode(id),
        used: record.is_some(),
        record: record.as_ref().map(IdentifierRecord::from),
    }))
}

/// GET /api/nodes/:level/:position
pub async fn handle_node<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Path((level, position)): Path<(u32, u32)>,
) -> ApiResult<NodeResponse> {
    let view = service.node(level, position).await?;
    Ok(Json(NodeResponse {
        level,
        position,
        value: hex::encode(view.value),
        stored: view.stored.is_some(),
    }))
}

/// GET /api/events?after=&limit=
pub async fn handle_events<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<EventsResponse> {
    let limit = query.limit.unwrap_or(100);
    let events = service.events(query.after, limit).await?;
    // Pages always end on a transition boundary
    let next_after = events.last().map(|e| e.sequence);
    Ok(Json(EventsResponse { events, next_after }))
}

// =============================================================================
// Custody Handlers
// =============================================================================

/// POST /api/custody/credit
///
/// Funds an account in the custody book so it can deposit. Only routed when
/// the node runs with development custody enabled.
pub async fn handle_credit<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Json(req): Json<CreditRequest>,
) -> ApiResult<BalanceResponse> {
    let asset = decode_hash_field(&req.asset, "asset")?;
    let account = decode_hash_field(&req.account, "account")?;
    let balance = service.credit(&asset, &account, req.amount).await?;

    Ok(Json(BalanceResponse {
        asset: hex::encode(asset),
        account: hex::encode(account),
        balance,
    }))
}

/// GET /api/custody/:asset/:account
pub async fn handle_balance<V: ProofVerifier + 'static>(
    State(service): State<AppState<V>>,
    Path((asset, account)): Path<(String, String)>,
) -> ApiResult<BalanceResponse> {
    let asset = decode_hash_field(&asset, "asset")?;
    let account = decode_hash_field(&account, "account")?;
    Ok(Json(BalanceResponse {
        asset: hex::encode(asset),
        account: hex::encode(account),
        balance: service.custody().balance(&asset, &account),
    }))
}

/// GET /health
pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "shielded-pool-node",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
