//! Configuration for a land-sale session.

use crate::errors::{LandSaleError, Result};
use crate::networks::{PresetContracts, TokenTable};
use crate::settlement::RetryPolicy;
use crate::store::{FileStore, MemoryStore, StateStore};
use crate::types::AssetKind;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a [`crate::controller::SaleController`] needs besides its
/// collaborators.
#[derive(Clone, Debug)]
pub struct LandSaleConfig {
    /// JSON-RPC endpoint used by [`crate::wallet::EthersWallet`]
    pub rpc_url: String,

    /// Buyer private key used by [`crate::wallet::EthersWallet`]
    pub private_key: String,

    /// Base URL of the BTC rail backend
    pub backend_url: String,

    /// File for persisted state; in-memory when `None`
    pub state_path: Option<PathBuf>,

    /// Stablecoin deployments per chain
    pub tokens: TokenTable,

    /// Pre-deployed sale contracts per chain
    pub presets: PresetContracts,

    /// BTC settlement poll policy
    pub poll_policy: RetryPolicy,

    /// Generate deed metadata when no token URI is typed
    pub auto_metadata: bool,
}

impl LandSaleConfig {
    /// Creates a configuration with the default token table and poll policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use landsale_rs::config::LandSaleConfig;
    ///
    /// let config = LandSaleConfig::new(
    ///     "https://eth.llamarpc.com",
    ///     "https://deeds.example.com",
    /// )
    /// .with_preset_contract(1, "0x5FbDB2315678afecb367f032d93F642f64180aa3")
    /// .unwrap();
    /// assert!(config.presets.get(1).is_some());
    /// ```
    pub fn new(rpc_url: impl Into<String>, backend_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            private_key: String::new(),
            backend_url: backend_url.into(),
            state_path: None,
            tokens: TokenTable::with_defaults(),
            presets: PresetContracts::default(),
            poll_policy: RetryPolicy::default(),
            auto_metadata: true,
        }
    }

    /// Reads `LANDSALE_RPC_URL`, `LANDSALE_PRIVATE_KEY`, `LANDSALE_BACKEND_URL`,
    /// `LANDSALE_STATE_PATH` and optionally `LANDSALE_PRESET_CONTRACT` as
    /// `<chainId>:<address>`.
    pub fn from_env() -> Result<Self> {
        let rpc_url = std::env::var("LANDSALE_RPC_URL")
            .map_err(|_| LandSaleError::ConfigError("LANDSALE_RPC_URL is not set".to_string()))?;
        let backend_url = std::env::var("LANDSALE_BACKEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let mut config = Self::new(rpc_url, backend_url);
        if let Ok(key) = std::env::var("LANDSALE_PRIVATE_KEY") {
            config = config.with_private_key(key);
        }
        if let Ok(path) = std::env::var("LANDSALE_STATE_PATH") {
            config = config.with_state_path(path);
        }
        if let Ok(preset) = std::env::var("LANDSALE_PRESET_CONTRACT") {
            let (chain, address) = preset.split_once(':').ok_or_else(|| {
                LandSaleError::ConfigError(format!(
                    "LANDSALE_PRESET_CONTRACT must be <chainId>:<address>, got {}",
                    preset
                ))
            })?;
            let chain_id = chain
                .parse()
                .map_err(|_| LandSaleError::ConfigError(format!("Bad chain id: {}", chain)))?;
            config = config.with_preset_contract(chain_id, address)?;
        }
        Ok(config)
    }

    /// Sets the buyer key.
    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = private_key.into();
        self
    }

    /// Persists state to `path`.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Registers an extra stablecoin deployment.
    pub fn with_token(mut self, chain_id: u64, asset: AssetKind, address: &str, decimals: u8) -> Result<Self> {
        self.tokens.insert(chain_id, asset, address, decimals)?;
        Ok(self)
    }

    /// Registers a pre-deployed sale contract.
    pub fn with_preset_contract(mut self, chain_id: u64, address: &str) -> Result<Self> {
        self.presets.insert(chain_id, address)?;
        Ok(self)
    }

    /// Sets the BTC poll interval and attempt budget.
    pub fn with_poll_policy(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_policy = RetryPolicy {
            interval,
            max_attempts,
        };
        self
    }

    /// Turns generated deed metadata on or off.
    pub fn with_auto_metadata(mut self, enabled: bool) -> Self {
        self.auto_metadata = enabled;
        self
    }

    /// Opens the configured state store: a [`FileStore`] at `state_path`, or
    /// an in-memory one.
    pub fn open_store(&self) -> Result<Box<dyn StateStore>> {
        match &self.state_path {
            Some(path) => Ok(Box::new(FileStore::open(path)?)),
            None => Ok(Box::new(MemoryStore::new())),
        }
    }
}
