//! API Middleware - Input Validation, Correlation IDs and Security Headers
//!
//! - Hex validation for byte fields in request bodies and paths
//! - A correlation id per request, logged with the request, the response and
//!   any transition it drives
//! - Security headers on every response

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::common::{generate_correlation_id, log_api_request, log_api_response};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Longest caller-supplied correlation id that is honored
const MAX_CORRELATION_ID_LEN: usize = 64;

// ============================================================================
// Input Validation
// ============================================================================

/// Validation result
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![msg.into()],
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ValidationError::invalid(self.errors))
        }
    }
}

/// Validate a hex string (with or without `0x`)
pub fn validate_hex(input: &str, expected_len: Option<usize>, field_name: &str) -> ValidationResult {
    if input.is_empty() {
        return ValidationResult::error(format!("{} is required", field_name));
    }

    let hex_str = input.strip_prefix("0x").unwrap_or(input);

    if !hex_str.chars().all(|c| c.is_ascii_hexdigit()) {
        return ValidationResult::error(format!("{} must be valid hex", field_name));
    }

    if hex_str.len() % 2 != 0 {
        return ValidationResult::error(format!("{} must have an even number of hex digits", field_name));
    }

    if let Some(len) = expected_len {
        if hex_str.len() != len * 2 {
            return ValidationResult::error(format!(
                "{} must be {} bytes ({} hex characters)",
                field_name,
                len,
                len * 2
            ));
        }
    }

    ValidationResult::ok()
}

/// Decode a field already accepted by [`validate_hex`]
pub fn decode_hex_field(input: &str, expected_len: Option<usize>, field_name: &str) -> Result<Vec<u8>, ValidationError> {
    validate_hex(input, expected_len, field_name).into_result()?;
    hex::decode(input.strip_prefix("0x").unwrap_or(input))
        .map_err(|e| ValidationError::invalid(vec![format!("{}: {}", field_name, e)]))
}

/// Decode a 32-byte hex field
pub fn decode_hash_field(input: &str, field_name: &str) -> Result<[u8; 32], ValidationError> {
    let bytes = decode_hex_field(input, Some(32), field_name)?;
    bytes
        .try_into()
        .map_err(|_| ValidationError::invalid(vec![format!("{} must be 32 bytes", field_name)]))
}

// ============================================================================
// Middleware Types
// ============================================================================

/// Request correlation id, available to handlers as an extension
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

/// Validation error response
#[derive(Debug, Serialize)]
pub struct ValidationError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ValidationError {
    pub fn invalid(details: Vec<String>) -> Self {
        Self {
            error: "Invalid request".to_string(),
            code: Some("VALIDATION_ERROR".to_string()),
            details,
        }
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let status = if self.code.as_deref() == Some("VALIDATION_ERROR") {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}

/// Tag the request with a correlation id and log request and response
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_CORRELATION_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id);

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    log_api_request(&method, &path, &correlation_id);

    request
        .extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));
    let started = Instant::now();
    let mut response = next.run(request).await;

    log_api_response(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_millis() as u64,
        &correlation_id,
    );
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'"),
    );

    response
}

// ============================================================================
// Tests
// ============================================================================
