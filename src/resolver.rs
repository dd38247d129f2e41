//! Payment method resolution.
//!
//! Turns the selected asset and the price string typed for it into a
//! [`PaymentPlan`]. Resolution is pure: it never touches the network, so every
//! failure here happens before any transaction could be attempted.

use crate::errors::{LandSaleError, Result};
use crate::networks::TokenTable;
use crate::types::{AssetKind, PaymentPlan};
use crate::utils::{parse_positive_units, BTC_DECIMALS, NATIVE_DECIMALS};

/// Resolves `asset` paid with `price` on `chain_id` into a validated plan.
///
/// Token lookups are checked before the amount, so an unsupported chain is
/// reported as [`LandSaleError::UnsupportedToken`] even if the price is also bad.
///
/// # Examples
///
/// ```
/// use landsale_rs::networks::TokenTable;
/// use landsale_rs::resolver::resolve_plan;
/// use landsale_rs::types::{AssetKind, PaymentPlan};
/// use ethers::types::U256;
///
/// let table = TokenTable::with_defaults();
/// let plan = resolve_plan(AssetKind::Usdt, "25000", Some(1), &table).unwrap();
/// match plan {
///     PaymentPlan::Token { amount, decimals, .. } => {
///         assert_eq!(decimals, 6);
///         assert_eq!(amount, U256::from(25_000_000_000u64));
///     }
///     _ => unreachable!(),
/// }
/// ```
pub fn resolve_plan(
    asset: AssetKind,
    price: &str,
    chain_id: Option<u64>,
    tokens: &TokenTable,
) -> Result<PaymentPlan> {
    match asset {
        AssetKind::Eth => {
            let amount = parse_positive_units(price, NATIVE_DECIMALS)
                .map_err(|_| LandSaleError::InvalidAmount("Enter a positive ETH amount.".to_string()))?;
            Ok(PaymentPlan::Native { amount })
        }
        AssetKind::Usdt | AssetKind::Usdc => {
            let chain_id = chain_id.ok_or_else(|| {
                LandSaleError::MissingField("Unknown chainId; connect wallet first.".to_string())
            })?;
            let token = tokens.lookup(chain_id, asset)?;
            let amount = parse_positive_units(price, token.decimals).map_err(|_| {
                LandSaleError::InvalidAmount(format!("Enter a positive {} amount.", asset))
            })?;
            Ok(PaymentPlan::Token {
                asset,
                token_address: token.address,
                decimals: token.decimals,
                amount,
            })
        }
        AssetKind::Btc => {
            let price = price.trim();
            if price.is_empty() {
                return Ok(PaymentPlan::OffChainBtc { amount: None });
            }
            parse_positive_units(price, BTC_DECIMALS)
                .map_err(|_| LandSaleError::InvalidAmount("Enter a positive BTC amount.".to_string()))?;
            Ok(PaymentPlan::OffChainBtc {
                amount: Some(price.to_string()),
            })
        }
    }
}

/// One-line description of how the selected asset is paid.
pub fn plan_summary(asset: AssetKind) -> &'static str {
    match asset {
        AssetKind::Eth => "Pay in ETH (native) — payable call; NFT deed mints on success.",
        AssetKind::Usdt => "Pay in USDT (ERC-20) — approve then contract call; NFT deed mints on success.",
        AssetKind::Usdc => "Pay in USDC (ERC-20) — approve then contract call; NFT deed mints on success.",
        AssetKind::Btc => "Pay with on-chain BTC; backend finalizes mint on Ethereum after confirmation.",
    }
}
