//! Error types for the landsale-rs library.
//!
//! This module defines all error types that can occur while connecting a wallet,
//! resolving a payment, talking to the sale contract or driving the BTC rail.

use ethers::providers::RpcError;
use thiserror::Error;

/// Main error type for land-sale operations.
#[derive(Error, Debug)]
pub enum LandSaleError {
    /// No wallet provider is configured or reachable
    #[error("No wallet provider available: {0}")]
    ProviderUnavailable(String),

    /// The wallet declined the account request or a signature
    #[error("Request rejected by the wallet")]
    UserRejected,

    /// The form names an asset outside ETH/USDT/USDC/BTC
    #[error("Unsupported asset type: {0}")]
    UnsupportedAsset(String),

    /// Price string is not a positive amount for the selected asset
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The selected token has no entry for the current chain
    #[error("{asset} not configured for chainId {chain_id}")]
    UnsupportedToken {
        /// Asset tag (e.g. "USDT")
        asset: String,
        /// Chain the lookup was made for
        chain_id: u64,
    },

    /// Neither the primary nor the fallback entry point exists on the contract
    #[error("Contract missing {primary}/{fallback}")]
    UnsupportedContract {
        /// Primary function name
        primary: &'static str,
        /// Fallback function name
        fallback: &'static str,
    },

    /// The backend refused to create a BTC invoice
    #[error("Server refused BTC invoice creation (status {0})")]
    InvoiceCreationFailed(u16),

    /// The backend refused to finalize a settled invoice
    #[error("Finalize failed on backend (status {0})")]
    FinalizeFailed(u16),

    /// The wallet now reports a different chain than the connected session
    #[error("Wallet switched from chainId {expected} to {actual}; reconnect first")]
    NetworkOrChainMismatch {
        /// Chain id captured at connect time
        expected: u64,
        /// Chain id currently reported by the wallet
        actual: u64,
    },

    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during blockchain operations
    #[error("Blockchain error: {0}")]
    BlockchainError(String),

    /// A mined transaction reported failure
    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Contract interface could not be parsed or used
    #[error("Invalid ABI: {0}")]
    InvalidAbi(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Persisted state could not be read or written
    #[error("State store error: {0}")]
    StoreError(#[from] std::io::Error),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias for land-sale operations.
pub type Result<T> = std::result::Result<T, LandSaleError>;

/// JSON-RPC code EIP-1193 wallets use for a declined request.
const USER_REJECTED_CODE: i64 = 4001;

impl From<ethers::providers::ProviderError> for LandSaleError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        if let Some(rpc) = err.as_error_response() {
            if rpc.code == USER_REJECTED_CODE {
                return LandSaleError::UserRejected;
            }
        }
        LandSaleError::BlockchainError(err.to_string())
    }
}

impl From<ethers::abi::Error> for LandSaleError {
    fn from(err: ethers::abi::Error) -> Self {
        LandSaleError::InvalidAbi(err.to_string())
    }
}

impl From<ethers::abi::AbiError> for LandSaleError {
    fn from(err: ethers::abi::AbiError) -> Self {
        LandSaleError::InvalidAbi(err.to_string())
    }
}
