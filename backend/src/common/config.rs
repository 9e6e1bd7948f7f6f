//! Environment-based Configuration for the pool node
//!
//! Values come from `POOL_*` environment variables (a `.env` file is loaded
//! first by the binary). Command-line flags override them.
//!
//! # Environment Variables
//!
//! ## Server
//! - `POOL_BIND_ADDR` - API listen address (default: "127.0.0.1:8090")
//! - `POOL_DB_PATH` - SQLite database file, or ":memory:" (default: "data/pool.db")
//!
//! ## Proof Verification
//! - `POOL_VERIFIER_URL` - Base URL of the proof verifier service
//! - `POOL_VERIFIER_TIMEOUT_SECS` - Request timeout (default: 10)
//! - `POOL_VK` - Hex verification key used for every circuit
//! - `POOL_VK_TRANSFER`, `POOL_VK_WITHDRAW`, `POOL_VK_SWAP` - Per-circuit
//!   keys, each overriding `POOL_VK`
//!
//! ## Custody
//! - `POOL_CUSTODY_ACCOUNT` - Hex account holding pooled assets
//! - `POOL_DEV_CUSTODY` - Set to "1" to expose the unauthenticated credit
//!   endpoint (development only, off by default)
//!
//! ## Optional Settings
//! - `POOL_LOG_LEVEL` - Logging level (trace, debug, info, warn, error)
//! - `POOL_LOG_JSON` - Set to "1" for JSON log lines

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use shielded_pool::{Address, CircuitKind, VkRegistry};
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8090";
pub const DEFAULT_DB_PATH: &str = "data/pool.db";
pub const DEFAULT_VERIFIER_URL: &str = "http://127.0.0.1:8091";
pub const DEFAULT_VERIFIER_TIMEOUT_SECS: u64 = 10;

/// `POOL_DB_PATH` value selecting the in-memory store
pub const MEMORY_DB: &str = ":memory:";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Where ledger state is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Sqlite(PathBuf),
}

impl StoreLocation {
    pub fn parse(value: &str) -> Self {
        if value == MEMORY_DB {
            StoreLocation::Memory
        } else {
            StoreLocation::Sqlite(PathBuf::from(value))
        }
    }
}

/// Per-circuit verification keys, decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKeys {
    pub transfer: Vec<u8>,
    pub withdraw: Vec<u8>,
    pub swap: Vec<u8>,
}

impl VerificationKeys {
    pub fn registry(&self) -> VkRegistry {
        VkRegistry::new(self.transfer.clone(), self.withdraw.clone(), self.swap.clone())
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// API listen address
    pub bind_addr: SocketAddr,

    /// Ledger persistence
    pub store: StoreLocation,

    /// Proof verifier service base URL
    pub verifier_url: String,

    /// Verifier request timeout in seconds
    pub verifier_timeout_secs: u64,

    /// Verification keys handed to the gateway
    pub verification_keys: VerificationKeys,

    /// Account that holds assets pulled into the pool
    pub custody_account: Address,

    /// Expose the custody credit endpoint
    pub dev_custody: bool,

    /// Log level
    pub log_level: String,

    /// Emit JSON log lines
    pub log_json: bool,
}

impl NodeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("POOL_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("POOL_BIND_ADDR".to_string(), format!("{}", e)))?;

        let store = StoreLocation::parse(
            &lookup("POOL_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
        );

        let verifier_url =
            lookup("POOL_VERIFIER_URL").unwrap_or_else(|| DEFAULT_VERIFIER_URL.to_string());

        let verifier_timeout_secs = match lookup("POOL_VERIFIER_TIMEOUT_SECS") {
            Some(value) => value.parse().map_err(|_| {
                ConfigError::InvalidValue(
                    "POOL_VERIFIER_TIMEOUT_SECS".to_string(),
                    "must be a number of seconds".to_string(),
                )
            })?,
            None => DEFAULT_VERIFIER_TIMEOUT_SECS,
        };

        let verification_keys = load_verification_keys(&lookup)?;

        let custody_account = match lookup("POOL_CUSTODY_ACCOUNT") {
            Some(value) => parse_address("POOL_CUSTODY_ACCOUNT", &value)?,
            None => return Err(ConfigError::MissingEnvVar("POOL_CUSTODY_ACCOUNT".to_string())),
        };

        let dev_custody = lookup("POOL_DEV_CUSTODY").map(|v| v == "1").unwrap_or(false);

        let log_level = lookup("POOL_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = lookup("POOL_LOG_JSON").map(|v| v == "1").unwrap_or(false);

        Ok(Self {
            bind_addr,
            store,
            verifier_url,
            verifier_timeout_secs,
            verification_keys,
            custody_account,
            dev_custody,
            log_level,
            log_json,
        })
    }

    /// Print configuration summary (keys shortened)
    pub fn print_summary(&self) {
        println!("=== Shielded Pool Node Configuration ===");
        println!("Bind Address: {}", self.bind_addr);
        match &self.store {
            StoreLocation::Memory => println!("Store: in-memory"),
            StoreLocation::Sqlite(path) => println!("Store: sqlite at {}", path.display()),
        }
        println!("Verifier: {} ({}s timeout)", self.verifier_url, self.verifier_timeout_secs);
        for circuit in CircuitKind::ALL {
            let key = match circuit {
                CircuitKind::Transfer => &self.verification_keys.transfer,
                CircuitKind::Withdraw => &self.verification_keys.withdraw,
                CircuitKind::Swap => &self.verification_keys.swap,
            };
            println!("VK {}: {} bytes", circuit, key.len());
        }
        println!("Custody Account: {}", hex::encode(self.custody_account));
        if self.dev_custody {
            println!("Dev Custody: credit endpoint ENABLED");
        }
        println!("Log Level: {}{}", self.log_level, if self.log_json { " (json)" } else { "" });
        println!("========================================");
    }
}

/// Per-circuit key, falling back to the shared `POOL_VK`
fn load_verification_keys<F>(lookup: &F) -> Result<VerificationKeys, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let shared = lookup("POOL_VK");
    let key_for = |var_name: &str| -> Result<Vec<u8>, ConfigError> {
        let (name, value) = match lookup(var_name) {
            Some(value) => (var_name, value),
            None => match &shared {
                Some(value) => ("POOL_VK", value.clone()),
                None => return Err(ConfigError::MissingEnvVar(var_name.to_string())),
            },
        };
        let bytes = decode_hex(name, &value)?;
        if bytes.is_empty() {
            return Err(ConfigError::InvalidValue(
                name.to_string(),
                "verification key is empty".to_string(),
            ));
        }
        Ok(bytes)
    };

    Ok(VerificationKeys {
        transfer: key_for("POOL_VK_TRANSFER")?,
        withdraw: key_for("POOL_VK_WITHDRAW")?,
        swap: key_for("POOL_VK_SWAP")?,
    })
}

fn decode_hex(var_name: &str, value: &str) -> Result<Vec<u8>, ConfigError> {
    let trimmed = value.trim();
    hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| ConfigError::InvalidValue(var_name.to_string(), e.to_string()))
}

/// Decode a 32-byte hex account
pub fn parse_address(var_name: &str, value: &str) -> Result<Address, ConfigError> {
    let bytes = decode_hex(var_name, value)?;
    let address: Address = bytes.try_into().map_err(|_| {
        ConfigError::InvalidValue(var_name.to_string(), "must be 32 bytes".to_string())
    })?;
    if address == [0u8; 32] {
        return Err(ConfigError::InvalidValue(
            var_name.to_string(),
            "must not be the zero account".to_string(),
        ));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    const CUSTODY: &str = "cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc";

    #[test]
    fn test_defaults_with_shared_key() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("POOL_VK", "0xabcd"),
            ("POOL_CUSTODY_ACCOUNT", CUSTODY),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.store, StoreLocation::Sqlite(PathBuf::from(DEFAULT_DB_PATH)));
        assert_eq!(config.verifier_timeout_secs, DEFAULT_VERIFIER_TIMEOUT_SECS);
        assert_eq!(config.verification_keys.transfer, vec![0xab, 0xcd]);
        assert_eq!(config.verification_keys.withdraw, vec![0xab, 0xcd]);
        assert_eq!(config.verification_keys.swap, vec![0xab, 0xcd]);
        assert_eq!(config.custody_account, [0xcc; 32]);
        assert!(!config.dev_custody);
        assert!(!config.log_json);
    }

    #[test]
    fn test_per_circuit_key_overrides_shared() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("POOL_VK", "01"),
            ("POOL_VK_SWAP", "02"),
            ("POOL_CUSTODY_ACCOUNT", CUSTODY),
            ("POOL_DB_PATH", MEMORY_DB),
        ]))
        .unwrap();

        let registry = config.verification_keys.registry();
        assert_eq!(registry.get(CircuitKind::Transfer), &[1]);
        assert_eq!(registry.get(CircuitKind::Swap), &[2]);
        assert_eq!(config.store, StoreLocation::Memory);
    }

    #[test]
    fn test_dev_custody_opt_in() {
        let enabled = NodeConfig::from_lookup(lookup(&[
            ("POOL_VK", "01"),
            ("POOL_CUSTODY_ACCOUNT", CUSTODY),
            ("POOL_DEV_CUSTODY", "1"),
        ]))
        .unwrap();
        assert!(enabled.dev_custody);

        let other = NodeConfig::from_lookup(lookup(&[
            ("POOL_VK", "01"),
            ("POOL_CUSTODY_ACCOUNT", CUSTODY),
            ("POOL_DEV_CUSTODY", "yes"),
        ]))
        .unwrap();
        assert!(!other.dev_custody);
    }

    #[test]
    fn test_missing_keys_rejected() {
        let result = NodeConfig::from_lookup(lookup(&[
            ("POOL_VK_TRANSFER", "01"),
            ("POOL_CUSTODY_ACCOUNT", CUSTODY),
        ]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "POOL_VK_WITHDRAW"));
    }

    #[test]
    fn test_custody_account_validation() {
        assert!(matches!(
            NodeConfig::from_lookup(lookup(&[("POOL_VK", "01")])),
            Err(ConfigError::MissingEnvVar(_))
        ));
        assert!(parse_address("X", "abcd").is_err());
        assert!(parse_address("X", &"00".repeat(32)).is_err());
        assert!(parse_address("X", &"zz".repeat(32)).is_err());
        assert_eq!(parse_address("X", &format!("0x{}", "11".repeat(32))).unwrap(), [0x11; 32]);
    }

    #[test]
    fn test_invalid_bind_addr() {
        let result = NodeConfig::from_lookup(lookup(&[
            ("POOL_BIND_ADDR", "not-an-addr"),
            ("POOL_VK", "01"),
            ("POOL_CUSTODY_ACCOUNT", CUSTODY),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(name, _)) if name == "POOL_BIND_ADDR"));
    }
}
