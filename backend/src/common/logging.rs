//! Structured Logging for the pool node
//!
//! Provides structured logging with:
//! - JSON output for log aggregation
//! - Correlation IDs tying an API request to the transition it drove
//! - Security events for replay attempts and rejected proofs
//!
//! # Usage
//!
//! ```ignore
//! use shielded_pool_node::common::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for production
//! ```

use serde::Serialize;
use shielded_pool::{PoolError, StateDelta};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::error::NodeError;
use crate::types::StoredEvent;

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// API request/response events
    Api,
    /// Committed or rejected ledger transitions
    Transition,
    /// Replay attempts and proof rejections
    Security,
    /// Persistence events
    Storage,
    /// System events (startup, shutdown)
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    /// Log level
    pub level: String,
    /// Event category
    pub category: EventCategory,
    /// Human-readable message
    pub message: String,
    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_code: Option<u32>,
}

impl LogEvent {
    /// Create a new log event
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Add correlation ID
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Add duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Add error details
    pub fn with_error(mut self, error: &NodeError) -> Self {
        self.error = Some(ErrorDetails {
            code: error.error_code().to_string(),
            message: error.to_string(),
            pool_code: error.pool_code(),
        });
        self
    }

    /// Serialize this event to JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Event Logging
// ============================================================================

/// Log a security-related event
pub fn log_security_event(event_type: &str, details: serde_json::Value, correlation_id: Option<&str>) {
    let mut event = LogEvent::new(LogLevel::Warn, EventCategory::Security, event_type)
        .with_data(details);

    if let Some(id) = correlation_id {
        event = event.with_correlation_id(id);
    }

    tracing::warn!(target: "shielded_pool_node::security", "{}", event.to_json());
}

/// Log an API request
pub fn log_api_request(method: &str, path: &str, correlation_id: &str) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Api, format!("{} {}", method, path))
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({
            "method": method,
            "path": path
        }));

    tracing::info!(target: "shielded_pool_node::api", "{}", event.to_json());
}

/// Log an API response
pub fn log_api_response(method: &str, path: &str, status: u16, duration_ms: u64, correlation_id: &str) {
    let level = if status >= 500 {
        LogLevel::Error
    } else if status >= 400 {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };

    let event = LogEvent::new(level, EventCategory::Api, format!("{} {} -> {}", method, path, status))
        .with_correlation_id(correlation_id)
        .with_duration(duration_ms)
        .with_data(serde_json::json!({
            "method": method,
            "path": path,
            "status": status
        }));

    match level {
        LogLevel::Error => tracing::error!(target: "shielded_pool_node::api", "{}", event.to_json()),
        LogLevel::Warn => tracing::warn!(target: "shielded_pool_node::api", "{}", event.to_json()),
        _ => tracing::info!(target: "shielded_pool_node::api", "{}", event.to_json()),
    }
}

/// Log the outcome of a submitted transition
///
/// Replay attempts and proof failures are additionally raised as security
/// events.
pub fn log_transition_event(
    operation: &str,
    correlation_id: &str,
    outcome: &Result<StateDelta, NodeError>,
) {
    match outcome {
        Ok(delta) => {
            let events: Vec<&'static str> = delta.events.iter().map(|e| e.name()).collect();
            let event = LogEvent::new(LogLevel::Info, EventCategory::Transition, operation)
                .with_correlation_id(correlation_id)
                .with_data(serde_json::json!({
                    "sequence": delta.sequence,
                    "root": hex::encode(delta.root),
                    "next_index": delta.next_index,
                    "nodes_written": delta.nodes.len(),
                    "identifiers_marked": delta.marked.len(),
                    "events": events
                }));
            tracing::info!(target: "shielded_pool_node::transition", "{}", event.to_json());
        }
        Err(error) => {
            let event = LogEvent::new(LogLevel::Warn, EventCategory::Transition, operation)
                .with_correlation_id(correlation_id)
                .with_error(error);
            tracing::warn!(target: "shielded_pool_node::transition", "{}", event.to_json());

            if let NodeError::Pool(pool_error) = error {
                if let Some(details) = security_details(pool_error) {
                    log_security_event(operation, details, Some(correlation_id));
                }
            }
        }
    }
}

fn security_details(error: &PoolError) -> Option<serde_json::Value> {
    match error {
        PoolError::AlreadyUsed(_) | PoolError::OrderAlreadyExecuted { .. } => {
            Some(serde_json::json!({
                "kind": "replay",
                "code": error.code(),
                "identifier": error.offending_identifier().map(hex::encode)
            }))
        }
        PoolError::ProofRejected(circuit) => Some(serde_json::json!({
            "kind": "proof_rejected",
            "code": error.code(),
            "circuit": circuit.as_str()
        })),
        PoolError::ReceiverMismatch { declared, supplied } => Some(serde_json::json!({
            "kind": "receiver_mismatch",
            "code": error.code(),
            "declared": hex::encode(declared),
            "supplied": hex::encode(supplied)
        })),
        _ => None,
    }
}

/// Log events persisted for a committed transition
pub fn log_published_events(events: &[StoredEvent]) {
    for stored in events {
        let event = published_event(stored);
        tracing::debug!(target: "shielded_pool_node::storage", "{}", event.to_json());
    }
}

fn published_event(stored: &StoredEvent) -> LogEvent {
    LogEvent::new(LogLevel::Debug, EventCategory::Storage, "event published").with_data(
        serde_json::json!({
            "sequence": stored.sequence,
            "position": stored.position,
            "event": stored.event
        }),
    )
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Minimum log level to output
/// * `json_format` - Use JSON format (recommended for production)
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_filter();
        EnvFilter::new(format!(
            "shielded_pool={level},shielded_pool_node={level},tower_http={level},axum={level}"
        ))
    });

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from NodeConfig
pub fn init_from_config(config: &super::config::NodeConfig) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), config.log_json)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Generate a unique correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Tests
// ============================================================================
