//! HTTP client for an external proof verifier service
//!
//! `POST {base_url}/verify` with
//! `{"verification_key": hex, "public_inputs": hex, "proof": hex}`,
//! answered by `{"valid": bool}`.
//!
//! The ledger core calls [`ProofVerifier::verify`] synchronously, so the
//! adapter drives the async request on a captured runtime handle. It must be
//! called from a blocking thread (`spawn_blocking`), never from an async task.
//! Any transport or decoding failure is reported as a rejected proof.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use shielded_pool::ProofVerifier;
use tokio::runtime::Handle;

use crate::common::NodeError;

#[derive(Debug, Serialize)]
pub struct VerifyRequest {
    pub verification_key: String,
    pub public_inputs: String,
    pub proof: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// Verifier service HTTP client
#[derive(Debug, Clone)]
pub struct RemoteVerifier {
    client: Client,
    base_url: String,
    runtime: Handle,
}

impl RemoteVerifier {
    pub fn new(base_url: &str, timeout: Duration, runtime: Handle) -> Result<Self, NodeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::verifier(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            runtime,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service about one proof
    pub async fn check(
        &self,
        verification_key: &[u8],
        public_inputs: &[u8],
        proof: &[u8],
    ) -> Result<bool, NodeError> {
        let url = format!("{}/verify", self.base_url);
        let request = VerifyRequest {
            verification_key: hex::encode(verification_key),
            public_inputs: hex::encode(public_inputs),
            proof: hex::encode(proof),
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NodeError::verifier(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NodeError::verifier(format!(
                "verifier returned HTTP {}",
                resp.status()
            )));
        }

        let body: VerifyResponse = resp
            .json()
            .await
            .map_err(|e| NodeError::verifier(e.to_string()))?;
        Ok(body.valid)
    }
}

impl ProofVerifier for RemoteVerifier {
    fn verify(&self, verification_key: &[u8], public_inputs: &[u8], proof: &[u8]) -> bool {
        match self
            .runtime
            .block_on(self.check(verification_key, public_inputs, proof))
        {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(
                    target: "shielded_pool_node::verifier",
                    url = %self.base_url,
                    error = %e,
                    "verifier unavailable, treating proof as rejected"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;

    /// Fake verifier: accepts proofs whose first byte is 0x01
    async fn spawn_fake_verifier() -> String {
        async fn handle_verify(Json(req): Json<Value>) -> Json<Value> {
            let valid = req["proof"].as_str().map(|p| p.starts_with("01")).unwrap_or(false)
                && req["verification_key"] == "beef";
            Json(serde_json::json!({ "valid": valid }))
        }

        async fn handle_broken() -> StatusCode {
            StatusCode::INTERNAL_SERVER_ERROR
        }

        let app = Router::new()
            .route("/verify", post(handle_verify))
            .route("/broken/verify", post(handle_broken));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn verifier(base_url: &str) -> RemoteVerifier {
        RemoteVerifier::new(base_url, Duration::from_secs(5), Handle::current()).unwrap()
    }

    async fn verify_blocking(verifier: RemoteVerifier, proof: Vec<u8>) -> bool {
        tokio::task::spawn_blocking(move || verifier.verify(&[0xbe, 0xef], b"inputs", &proof))
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_verdict_forwarded() {
        let base_url = spawn_fake_verifier().await;

        assert!(verify_blocking(verifier(&base_url), vec![0x01, 0x02]).await);
        assert!(!verify_blocking(verifier(&base_url), vec![0x02]).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_http_error_is_rejection() {
        let base_url = spawn_fake_verifier().await;
        let broken = verifier(&format!("{}/broken/", base_url));

        assert_eq!(broken.base_url(), format!("{}/broken", base_url));
        assert!(broken.check(&[1], &[2], &[3]).await.is_err());
        assert!(!verify_blocking(broken, vec![0x01]).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_is_rejection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let unreachable = verifier(&format!("http://{}", addr));
        assert!(!verify_blocking(unreachable, vec![0x01]).await);
    }
}
