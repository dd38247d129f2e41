//! # landsale-rs
//!
//! Client-side payment execution for on-chain land sales.
//!
//! A buyer pays for a deed NFT in ETH, in a stablecoin (USDT or USDC) or in
//! Bitcoin. On-chain payments call a pre-deployed sale contract directly;
//! Bitcoin is paid to an invoice issued by a backend, which mints the deed on
//! Ethereum once the payment settles.
//!
//! ## Features
//!
//! - **Wallet session**: connect through any [`wallet::WalletProvider`], with
//!   chain drift detected before submitting
//! - **Payment resolution**: strict decimal parsing into base units, token
//!   lookup per chain
//! - **Approvals**: ERC-20 allowance check and a single exact approval when short
//! - **Contract dispatch**: primary/fallback entry point chosen from the ABI,
//!   minted token id decoded from the receipt
//! - **BTC rail**: invoice creation, bounded cancellable settlement polling and
//!   backend finalization
//! - **Resumable form**: persisted fields, handoff between pages, generated
//!   deed metadata
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use landsale_rs::config::LandSaleConfig;
//! use landsale_rs::controller::SaleController;
//! use landsale_rs::form::fields;
//! use landsale_rs::settlement::HttpSettlementBackend;
//! use landsale_rs::wallet::EthersWallet;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LandSaleConfig::from_env()?;
//! let wallet = EthersWallet::connect(&config.private_key, &config.rpc_url).await?;
//! let backend = HttpSettlementBackend::new(&config.backend_url)?;
//! let store = config.open_store()?;
//!
//! let mut controller = SaleController::new(config, wallet, backend, store);
//! controller.connect().await;
//! controller.edit(fields::CONTRACT_ADDRESS, "0x5FbDB2315678afecb367f032d93F642f64180aa3");
//! controller.edit(fields::PRICE_ETH, "1.25");
//! println!("{}", controller.execute_sale().await);
//! # Ok(())
//! # }
//! ```
//!
//! ## Payment rails
//!
//! | Asset | How it is paid |
//! |-------|----------------|
//! | ETH   | payable `executeSale` (fallback `mintDeed`) |
//! | USDT / USDC | `approve` when needed, then `executeSaleERC20` (fallback `mintDeedERC20`) |
//! | BTC   | invoice, poll `api/btc/status`, backend `api/btc/finalize` |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod approval;
pub mod config;
pub mod contract;
pub mod controller;
pub mod errors;
pub mod form;
pub mod networks;
pub mod resolver;
pub mod settlement;
pub mod store;
pub mod types;
pub mod utils;
pub mod wallet;

// Re-export commonly used items
pub use config::LandSaleConfig;
pub use controller::{ActionStatus, SaleController};
pub use errors::{LandSaleError, Result};
pub use types::{
    AssetKind, CreateInvoiceRequest, ExecutionResult, FinalizeRequest, FinalizeResponse, Invoice,
    InvoiceStatus, PaymentPlan, WalletSession,
};
