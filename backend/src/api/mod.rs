//! REST API for the pool node
//!
//! Transitions:
//! - POST /api/deposit      - Deposit and append a commitment
//! - POST /api/transact     - Private transfer (proof-gated)
//! - POST /api/withdraw     - Withdraw to a receiver (proof-gated)
//! - POST /api/swap         - Settle two matched orders (proof-gated)
//! - POST /api/instruction  - Raw discriminator-prefixed instruction
//!
//! Reads:
//! - GET /api/state, /api/nullifiers/:id, /api/nodes/:level/:position,
//!   /api/events, /api/custody/:asset/:account, /health
//!
//! Custody (only with [`ApiOptions::dev_custody`]):
//! - POST /api/custody/credit - Fund an account in the custody book

pub mod middleware;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use shielded_pool::ProofVerifier;
use tower_http::cors::{Any, CorsLayer};

use crate::service::PoolService;
use routes::*;

// Re-exports for convenience
pub use middleware::{validate_hex, CorrelationId, ValidationError, ValidationResult};
pub use routes::{ApiError, ErrorResponse};

// =============================================================================
// Application State
// =============================================================================

pub type AppState<V> = Arc<PoolService<V>>;

/// Optional API surface
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiOptions {
    /// Route `POST /api/custody/credit`, which mints custody balances
    pub dev_custody: bool,
}

// =============================================================================
// Router Setup
// =============================================================================

pub fn create_router<V: ProofVerifier + 'static>(service: AppState<V>, options: ApiOptions) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(handle_health))
        .route("/api/deposit", post(handle_deposit::<V>))
        .route("/api/transact", post(handle_transact::<V>))
        .route("/api/withdraw", post(handle_withdraw::<V>))
        .route("/api/swap", post(handle_swap::<V>))
        .route("/api/instruction", post(handle_instruction::<V>))
        .route("/api/state", get(handle_state::<V>))
        .route("/api/nullifiers/:id", get(handle_identifier::<V>))
        .route("/api/nodes/:level/:position", get(handle_node::<V>))
        .route("/api/events", get(handle_events::<V>))
        .route("/api/custody/:asset/:account", get(handle_balance::<V>));
    if options.dev_custody {
        router = router.route("/api/custody/credit", post(handle_credit::<V>));
    }

    router
        .layer(from_fn(middleware::correlation_middleware))
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(cors)
        .with_state(service)
}

/// Start the API server
pub async fn start_server<V: ProofVerifier + 'static>(
    service: AppState<V>,
    addr: SocketAddr,
    options: ApiOptions,
) -> Result<(), std::io::Error> {
    let app = create_router(service, options);

    println!("=== Shielded Pool Node API ===");
    println!("Listening on http://{}", addr);
    println!();
    println!("Endpoints:");
    println!("  POST /api/deposit                   - Deposit a commitment");
    println!("  POST /api/transact                  - Private transfer");
    println!("  POST /api/withdraw                  - Withdraw to a receiver");
    println!("  POST /api/swap                      - Settle matched orders");
    println!("  POST /api/instruction               - Raw instruction bytes");
    println!("  GET  /api/state                     - Root, cursor, sequence");
    println!("  GET  /api/nullifiers/:id            - Identifier status");
    println!("  GET  /api/nodes/:level/:position    - Tree node");
    println!("  GET  /api/events?after=&limit=      - Published events");
    println!("  GET  /api/custody/:asset/:account   - Custody balance");
    println!("  GET  /health                        - Health check");
    if options.dev_custody {
        println!("  POST /api/custody/credit            - Fund a custody account (dev)");
    }
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "shielded_pool_node::api", error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!(target: "shielded_pool_node::api", "shutting down");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::CustodyBook;
    use crate::storage::MemoryLedgerStore;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use shielded_pool::{TransferPublicInputs, VkRegistry, WithdrawPublicInputs};
    use tower::ServiceExt;

    const ASSET: [u8; 32] = [0x7a; 32];
    const DEPOSITOR: [u8; 32] = [0x11; 32];
    const RECEIVER: [u8; 32] = [0x22; 32];
    const CUSTODY: [u8; 32] = [0xcc; 32];

    /// Accepts proofs whose first byte is non-zero
    struct FirstByteVerifier;

    impl ProofVerifier for FirstByteVerifier {
        fn verify(&self, _vk: &[u8], _inputs: &[u8], proof: &[u8]) -> bool {
            proof.first().is_some_and(|b| *b != 0)
        }
    }

    async fn app() -> Router {
        app_with(ApiOptions { dev_custody: true }).await
    }

    async fn app_with(options: ApiOptions) -> Router {
        let custody = CustodyBook::new(CUSTODY);
        custody.credit(&ASSET, &DEPOSITOR, 1_000).unwrap();
        let service = PoolService::open(
            FirstByteVerifier,
            VkRegistry::uniform(vec![1]),
            custody,
            Arc::new(MemoryLedgerStore::new()),
        )
        .await
        .unwrap();
        create_router(Arc::new(service), options)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    fn deposit_body(commitment: u8, amount: u64) -> Value {
        json!({
            "depositor": hex::encode(DEPOSITOR),
            "asset": hex::encode(ASSET),
            "amount": amount,
            "commitment": hex::encode([commitment; 32]),
            "memo": "0xc0ffee"
        })
    }

    fn transfer_body(nullifier: u8, proof_byte: u8) -> Value {
        let inputs = TransferPublicInputs {
            new_root: [0x55; 32],
            nullifiers: vec![[nullifier; 32]],
            new_commitments: vec![[0x66; 32]],
            key_image: [0; 32],
        };
        json!({
            "public_inputs": hex::encode(inputs.encode()),
            "proof": hex::encode([proof_byte; 64])
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(middleware::CORRELATION_HEADER));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_correlation_id_echoed() {
        let app = app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/state")
                    .header(middleware::CORRELATION_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[middleware::CORRELATION_HEADER], "req-42");
    }

    #[tokio::test]
    async fn test_deposit_then_state() {
        let app = app().await;

        let (status, body) = post_json(&app, "/api/deposit", deposit_body(0x01, 40)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sequence"], 1);
        assert_eq!(body["next_index"], 1);
        assert_eq!(body["events"][0]["type"], "account_updated");
        assert_eq!(body["events"][0]["memo"], "c0ffee");

        let (status, state) = get_json(&app, "/api/state").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state["root"], body["root"]);
        assert_eq!(state["custody_account"], hex::encode(CUSTODY));

        let (_, leaf) = get_json(&app, "/api/nodes/0/0").await;
        assert_eq!(leaf["value"], hex::encode([0x01; 32]));
        assert_eq!(leaf["stored"], true);

        let (_, balance) = get_json(
            &app,
            &format!("/api/custody/{}/{}", hex::encode(ASSET), hex::encode(CUSTODY)),
        )
        .await;
        assert_eq!(balance["balance"], 40);
    }

    #[tokio::test]
    async fn test_invalid_hex_rejected() {
        let app = app().await;

        let mut body = deposit_body(0x01, 1);
        body["commitment"] = json!("abcd");
        let (status, response) = post_json(&app, "/api/deposit", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["code"], "VALIDATION_ERROR");

        let (status, _) = get_json(&app, "/api/nullifiers/not-hex").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pool_rejection_carries_code() {
        let app = app().await;

        let (status, body) = post_json(&app, "/api/deposit", deposit_body(0x01, 0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "POOL_ERROR");
        assert_eq!(body["pool_code"], 6001);

        // More than the depositor holds
        let (status, body) = post_json(&app, "/api/deposit", deposit_body(0x01, 5_000)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["pool_code"], 6040);
    }

    #[tokio::test]
    async fn test_transact_replay_conflicts() {
        let app = app().await;

        let (status, body) = post_json(&app, "/api/transact", transfer_body(0x44, 0x01)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"][0]["type"], "account_updated");
        assert_eq!(body["events"][1]["type"], "transaction_executed");

        let (status, body) = post_json(&app, "/api/transact", transfer_body(0x44, 0x01)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["pool_code"], 6010);

        let (_, nullifier) = get_json(&app, &format!("/api/nullifiers/{}", hex::encode([0x44; 32]))).await;
        assert_eq!(nullifier["used"], true);
        assert_eq!(nullifier["record"]["kind"], "nullifier");
        assert_eq!(nullifier["record"]["operation"], "private_transfer");

        let (_, unused) = get_json(&app, &format!("/api/nullifiers/{}", hex::encode([0x45; 32]))).await;
        assert_eq!(unused["used"], false);
    }

    #[tokio::test]
    async fn test_rejected_proof_is_forbidden() {
        let app = app().await;

        let (status, body) = post_json(&app, "/api/transact", transfer_body(0x44, 0x00)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["pool_code"], 6030);

        let (_, state) = get_json(&app, "/api/state").await;
        assert_eq!(state["sequence"], 0);
    }

    #[tokio::test]
    async fn test_withdraw_receiver_binding() {
        let app = app().await;
        post_json(&app, "/api/deposit", deposit_body(0x01, 100)).await;

        let inputs = WithdrawPublicInputs {
            new_root: [0x70; 32],
            nullifiers: vec![[0x91; 32]],
            asset: ASSET,
            amount: 30,
            receiver: RECEIVER,
            new_commitments: vec![],
        }
        .encode();
        let body = |receiver: [u8; 32]| {
            json!({
                "public_inputs": hex::encode(&inputs),
                "proof": hex::encode([0x01; 64]),
                "receiver": hex::encode(receiver)
            })
        };

        let (status, response) = post_json(&app, "/api/withdraw", body([0x23; 32])).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(response["pool_code"], 6031);

        let (status, response) = post_json(&app, "/api/withdraw", body(RECEIVER)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["events"][0]["type"], "withdraw_executed");

        let (_, balance) = get_json(
            &app,
            &format!("/api/custody/{}/{}", hex::encode(ASSET), hex::encode(RECEIVER)),
        )
        .await;
        assert_eq!(balance["balance"], 30);
    }

    #[tokio::test]
    async fn test_instruction_endpoint() {
        let app = app().await;

        let (status, body) = post_json(&app, "/api/instruction", json!({ "data": "ff" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["pool_code"], 6005);
    }

    #[tokio::test]
    async fn test_events_paging() {
        let app = app().await;
        for commitment in 1..=3u8 {
            let (status, _) = post_json(&app, "/api/deposit", deposit_body(commitment, 1)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, page) = get_json(&app, "/api/events?limit=2").await;
        assert_eq!(page["events"].as_array().unwrap().len(), 2);
        assert_eq!(page["next_after"], 2);

        let (_, rest) = get_json(&app, "/api/events?after=2").await;
        assert_eq!(rest["events"].as_array().unwrap().len(), 1);
        assert_eq!(rest["events"][0]["event"]["commitment"], hex::encode([3u8; 32]));
    }

    #[tokio::test]
    async fn test_node_out_of_range() {
        let app = app().await;

        let (status, body) = get_json(&app, "/api/nodes/40/0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_credit_endpoint() {
        let app = app().await;

        let (status, body) = post_json(
            &app,
            "/api/custody/credit",
            json!({
                "asset": hex::encode(ASSET),
                "account": hex::encode(RECEIVER),
                "amount": 7
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 7);
    }

    #[tokio::test]
    async fn test_credit_not_routed_by_default() {
        let app = app_with(ApiOptions::default()).await;

        let (status, _) = post_json(
            &app,
            "/api/custody/credit",
            json!({
                "asset": hex::encode(ASSET),
                "account": hex::encode(RECEIVER),
                "amount": 7
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, balance) = get_json(
            &app,
            &format!("/api/custody/{}/{}", hex::encode(ASSET), hex::encode(RECEIVER)),
        )
        .await;
        assert_eq!(balance["balance"], 0);
    }
}
