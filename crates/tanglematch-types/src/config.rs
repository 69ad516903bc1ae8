//! Configuration types for the engine's node pools and keystore.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{constants, error::Result, Network, TanglematchError};

/// Candidate node endpoints per network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodesConfig {
    pub endpoints: BTreeMap<Network, Vec<String>>,
}

impl NodesConfig {
    /// A config with a single endpoint for one network.
    #[must_use]
    pub fn single(network: Network, url: impl Into<String>) -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(network, vec![url.into()]);
        Self { endpoints }
    }

    #[must_use]
    pub fn endpoints_for(&self, network: Network) -> &[String] {
        self.endpoints.get(&network).map_or(&[], Vec::as_slice)
    }

    /// Every configured network must list at least one non-empty URL.
    pub fn validate(&self) -> Result<()> {
        for (network, urls) in &self.endpoints {
            if urls.is_empty() {
                return Err(TanglematchError::Configuration(format!(
                    "no node endpoints configured for {network}"
                )));
            }
            if urls.iter().any(|u| u.trim().is_empty()) {
                return Err(TanglematchError::Configuration(format!(
                    "empty node endpoint configured for {network}"
                )));
            }
        }
        Ok(())
    }
}

/// Tuning for node acquisition and the client cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Acquisition attempts before reporting the network unavailable.
    pub max_attempts: u32,
    /// Randomized backoff window between attempts, milliseconds.
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    /// Maximum cached clients per pool.
    pub cache_capacity: usize,
    /// Per-request timeout, milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_NODE_ATTEMPTS,
            backoff_min_ms: constants::NODE_BACKOFF_MIN_MS,
            backoff_max_ms: constants::NODE_BACKOFF_MAX_MS,
            cache_capacity: constants::DEFAULT_CLIENT_CACHE_CAPACITY,
            request_timeout_ms: constants::DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(TanglematchError::Configuration(
                "pool max_attempts must be at least 1".into(),
            ));
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            return Err(TanglematchError::Configuration(format!(
                "pool backoff window inverted: {} > {}",
                self.backoff_min_ms, self.backoff_max_ms
            )));
        }
        if self.cache_capacity == 0 {
            return Err(TanglematchError::Configuration(
                "pool cache_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Keystore sealing configuration. The passphrase arrives from the
/// deployment environment, never from checked-in config files.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    pub passphrase: String,
}

impl KeystoreConfig {
    #[must_use]
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }
}

// Keeps the passphrase out of debug logs.
impl fmt::Debug for KeystoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreConfig")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
