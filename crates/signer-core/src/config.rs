//! Runtime configuration for the signing flow.
//!
//! Loaded from JSON; every field has a default so an empty object is valid:
//!
//! ```json
//! {
//!   "rpc_url": "http://127.0.0.1:8545",
//!   "request_timeout_ms": 10000,
//!   "priority_fee_floor": "0x1"
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::builder::DEFAULT_PRIORITY_FEE_FLOOR;
use crate::error::{Error, Result};

/// Node endpoint and fee policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: String,

    /// Per-request HTTP timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// `maxPriorityFeePerGas` used for every transaction, in wei.
    pub priority_fee_floor: U256,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            request_timeout_ms: 10_000,
            priority_fee_floor: DEFAULT_PRIORITY_FEE_FLOOR,
        }
    }
}

impl SignerConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] on malformed JSON and
    /// [`Error::InvalidConfig`] if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the file cannot be read, plus
    /// everything [`Self::from_json`] returns.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Rejects configurations the flow cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty URL, a zero timeout or a
    /// zero priority fee floor.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(Error::InvalidConfig("rpc_url must not be empty".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "request_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.priority_fee_floor.is_zero() {
            return Err(Error::InvalidConfig(
                "priority_fee_floor must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Builds an HTTP transport for [`Self::rpc_url`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the HTTP client cannot be built.
    #[cfg(feature = "http")]
    pub fn http_transport(&self) -> Result<crate::rpc::HttpTransport> {
        crate::rpc::HttpTransport::new(self.rpc_url.clone(), self.request_timeout())
    }
}
