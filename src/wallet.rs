//! Wallet session and the wallet provider capability.
//!
//! [`WalletProvider`] is the seam between the payment flow and whatever holds the
//! buyer's keys. [`EthersWallet`] implements it with a local key and an HTTP
//! JSON-RPC endpoint; tests and other frontends plug in their own.

use crate::errors::{LandSaleError, Result};
use crate::types::WalletSession;
use async_trait::async_trait;
use ethers::middleware::signer::SignerMiddlewareError;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;

/// Capability exposed by a connected wallet.
///
/// Mirrors what an injected browser wallet offers: account access, the current
/// chain, read-only calls and signed transactions.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Requests account access. An empty list means the user declined.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// Chain the wallet is currently on.
    async fn chain_id(&self) -> Result<u64>;

    /// Executes a read-only call against `to` and returns the raw output.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Signs and submits a transaction, then waits until it is mined.
    async fn send_transaction(&self, to: Address, data: Bytes, value: U256) -> Result<TransactionReceipt>;
}

impl WalletSession {
    /// Connects to `provider` and snapshots the account and chain.
    ///
    /// Fails with [`LandSaleError::UserRejected`] when the wallet returns no
    /// accounts.
    pub async fn connect(provider: &dyn WalletProvider) -> Result<WalletSession> {
        let accounts = provider.request_accounts().await?;
        let address = *accounts.first().ok_or(LandSaleError::UserRejected)?;
        let chain_id = provider.chain_id().await?;

        tracing::info!(%address, chain_id, "wallet connected");

        Ok(WalletSession {
            address,
            chain_id,
            has_signer: true,
        })
    }

    /// Fails when the wallet has moved to a different chain since connecting.
    pub async fn ensure_same_chain(&self, provider: &dyn WalletProvider) -> Result<()> {
        let actual = provider.chain_id().await?;
        if actual != self.chain_id {
            return Err(LandSaleError::NetworkOrChainMismatch {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }
}

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// [`WalletProvider`] backed by a local private key and an HTTP RPC endpoint.
#[derive(Clone)]
pub struct EthersWallet {
    client: Arc<SignerClient>,
}

impl EthersWallet {
    /// Connects the key to the RPC endpoint and binds it to the endpoint's chain.
    ///
    /// # Arguments
    ///
    /// * `private_key` - Buyer key (with or without 0x prefix)
    /// * `rpc_url` - JSON-RPC endpoint
    pub async fn connect(private_key: &str, rpc_url: &str) -> Result<Self> {
        if private_key.is_empty() || rpc_url.is_empty() {
            return Err(LandSaleError::ProviderUnavailable(
                "a private key and RPC URL are required".to_string(),
            ));
        }

        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| LandSaleError::ProviderUnavailable(format!("Invalid private key: {}", e)))?;
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| LandSaleError::ProviderUnavailable(format!("{}: {}", rpc_url, e)))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| LandSaleError::ProviderUnavailable(format!("{}: {}", rpc_url, e)))?;

        let client = SignerMiddleware::new(provider, wallet.with_chain_id(chain_id.as_u64()));
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl WalletProvider for EthersWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        Ok(vec![self.client.address()])
    }

    async fn chain_id(&self) -> Result<u64> {
        let chain_id = self.client.provider().get_chainid().await?;
        Ok(chain_id.as_u64())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.client.address())
            .to(to)
            .data(data)
            .into();
        let output = self.client.provider().call(&tx, None).await?;
        Ok(output)
    }

    async fn send_transaction(&self, to: Address, data: Bytes, value: U256) -> Result<TransactionReceipt> {
        let tx = TransactionRequest::new().to(to).data(data).value(value);

        let pending_tx = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| match e {
                SignerMiddlewareError::MiddlewareError(inner) => LandSaleError::from(inner),
                other => LandSaleError::BlockchainError(format!("Transaction failed: {}", other)),
            })?;

        pending_tx
            .await?
            .ok_or_else(|| LandSaleError::BlockchainError("No receipt".to_string()))
    }
}
