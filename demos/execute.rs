//! Example land-sale execution.
//!
//! Connects a local key to an RPC endpoint and pays for a deed with the asset
//! selected in the persisted form (or `ASSET`), minting the NFT deed on success.
//! For BTC it creates an invoice and polls the backend until it settles.
//!
//! Run with:
//! ```bash
//! cargo run --example execute
//! ```
//!
//! Environment variables (a `.env` file is read when present):
//! - LANDSALE_RPC_URL: JSON-RPC endpoint
//! - LANDSALE_PRIVATE_KEY: Buyer private key
//! - LANDSALE_BACKEND_URL: BTC rail backend
//! - LANDSALE_STATE_PATH: Where the form is persisted between runs
//! - CONTRACT_ADDRESS: Sale contract (optional when a preset exists)
//! - ASSET / PRICE: Payment asset (ETH, USDT, USDC, BTC) and price
//! - ARTIFACT: Path to the contract's compiler artifact (optional)

use landsale_rs::config::LandSaleConfig;
use landsale_rs::controller::SaleController;
use landsale_rs::form::fields;
use landsale_rs::settlement::HttpSettlementBackend;
use landsale_rs::types::AssetKind;
use landsale_rs::wallet::EthersWallet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LandSaleConfig::from_env()?;

    println!("🏡 Land sale execution");
    println!("   RPC:     {}", config.rpc_url);
    println!("   Backend: {}", config.backend_url);
    println!();

    let wallet = EthersWallet::connect(&config.private_key, &config.rpc_url).await?;
    let backend = HttpSettlementBackend::new(&config.backend_url)?;
    let store = config.open_store()?;
    let mut controller = SaleController::new(config, wallet, backend, store);

    if let Ok(path) = std::env::var("ARTIFACT") {
        let artifact = std::fs::read_to_string(&path)?;
        println!("📄 {}", controller.load_artifact(&artifact));
    }

    println!("🔐 {}", controller.connect().await);
    if controller.session().is_none() {
        anyhow::bail!("wallet connection failed");
    }

    if let Ok(contract) = std::env::var("CONTRACT_ADDRESS") {
        controller.edit(fields::CONTRACT_ADDRESS, contract);
    }
    if let Ok(asset) = std::env::var("ASSET") {
        controller.edit(fields::ASSET_TYPE, asset.to_uppercase());
    }
    let asset = controller.form().asset()?;
    if let Ok(price) = std::env::var("PRICE") {
        controller.edit(asset.price_field(), price);
    }

    println!("💳 {}", controller.plan_summary()?);
    if !controller.is_buyer_connected_account() {
        println!("⚠️  The deed goes to {}, not the connected account", controller.form().get(fields::BUYER_ADDRESS));
    }

    if asset == AssetKind::Btc {
        println!("🧾 {}", controller.create_btc_invoice().await);
        if controller.status().is_error() {
            anyhow::bail!("invoice creation failed");
        }

        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        println!("⏳ Waiting for BTC settlement (Ctrl-C to stop)...");
        println!("{}", controller.poll_btc_and_finalize(&cancel).await);
    } else {
        println!("📡 {}", controller.execute_sale().await);
    }

    if controller.status().is_error() {
        anyhow::bail!("{}", controller.status());
    }
    Ok(())
}
