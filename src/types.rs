//! Core type definitions for land-sale payments.
//!
//! This module contains the data structures shared by the resolver, the on-chain
//! dispatcher and the BTC rail, including the JSON bodies exchanged with the
//! settlement backend.

use crate::errors::{LandSaleError, Result};
use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment asset selected on the form.
///
/// The string form (`"ETH"`, `"USDT"`, `"USDC"`, `"BTC"`) is what the form
/// and the persisted state store carry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssetKind {
    /// Native chain currency, paid as transaction value
    #[default]
    #[serde(rename = "ETH")]
    Eth,

    /// Tether, paid through approve + contract call
    #[serde(rename = "USDT")]
    Usdt,

    /// USD Coin, paid through approve + contract call
    #[serde(rename = "USDC")]
    Usdc,

    /// Bitcoin, settled off-chain by the backend rail
    #[serde(rename = "BTC")]
    Btc,
}

impl AssetKind {
    /// All selectable assets.
    pub const ALL: [AssetKind; 4] = [AssetKind::Eth, AssetKind::Usdt, AssetKind::Usdc, AssetKind::Btc];

    /// Tag used on the form and in persisted state.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Eth => "ETH",
            AssetKind::Usdt => "USDT",
            AssetKind::Usdc => "USDC",
            AssetKind::Btc => "BTC",
        }
    }

    /// Whether the asset is an ERC-20 token.
    pub fn is_token(&self) -> bool {
        matches!(self, AssetKind::Usdt | AssetKind::Usdc)
    }

    /// Name of the form field holding this asset's price.
    pub fn price_field(&self) -> &'static str {
        match self {
            AssetKind::Eth => crate::form::fields::PRICE_ETH,
            AssetKind::Usdt => crate::form::fields::PRICE_USDT,
            AssetKind::Usdc => crate::form::fields::PRICE_USDC,
            AssetKind::Btc => crate::form::fields::PRICE_BTC,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = LandSaleError;

    fn from_str(s: &str) -> Result<Self> {
        AssetKind::ALL
            .into_iter()
            .find(|asset| asset.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LandSaleError::UnsupportedAsset(s.to_string()))
    }
}

/// Resolved, validated description of how a sale will be paid.
///
/// Only produced by [`crate::resolver::resolve_plan`], which refuses to build a
/// plan with a non-positive amount or an unknown token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentPlan {
    /// Payable call carrying `amount` wei
    Native {
        /// Amount in wei
        amount: U256,
    },

    /// ERC-20 approve followed by a contract call
    Token {
        /// Which stablecoin
        asset: AssetKind,
        /// Token contract on the current chain
        token_address: Address,
        /// Token decimals used for the conversion
        decimals: u8,
        /// Amount in the token's smallest unit
        amount: U256,
    },

    /// Off-chain Bitcoin payment tracked by the backend
    OffChainBtc {
        /// Decimal BTC amount, `None` lets the backend price the invoice
        amount: Option<String>,
    },
}

impl PaymentPlan {
    /// Asset this plan pays with.
    pub fn asset(&self) -> AssetKind {
        match self {
            PaymentPlan::Native { .. } => AssetKind::Eth,
            PaymentPlan::Token { asset, .. } => *asset,
            PaymentPlan::OffChainBtc { .. } => AssetKind::Btc,
        }
    }

    /// Rejects an on-chain plan that would pay nothing.
    pub fn ensure_positive(&self) -> Result<()> {
        let amount = match self {
            PaymentPlan::Native { amount } | PaymentPlan::Token { amount, .. } => *amount,
            PaymentPlan::OffChainBtc { .. } => return Ok(()),
        };
        if amount.is_zero() {
            return Err(LandSaleError::InvalidAmount(format!(
                "Enter a positive {} amount.",
                self.asset()
            )));
        }
        Ok(())
    }
}

/// Snapshot of a connected wallet, taken at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSession {
    /// Connected account
    pub address: Address,

    /// Chain the wallet reported when connecting
    pub chain_id: u64,

    /// Whether transactions can be signed through this session
    pub has_signer: bool,
}

/// Outcome of a successful on-chain sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Hash of the mined sale transaction, the authoritative proof of execution
    pub transaction_hash: H256,

    /// Deed token id, when a matching mint event could be decoded
    pub minted_token_id: Option<U256>,

    /// When the receipt was observed
    pub executed_at: DateTime<Utc>,
}

/// A BTC payment invoice issued by the backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// Backend identifier used for polling and finalization
    pub id: String,

    /// Bitcoin address to pay
    pub address: String,

    /// Amount due in BTC (decimal string)
    #[serde(rename = "amountBtc", default)]
    pub amount_btc: Option<String>,

    /// BIP-21 payment URI
    #[serde(rename = "uri")]
    pub payment_uri: String,
}

/// Body of `POST /api/btc/create-invoice`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    /// Fixed or estimated BTC amount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_btc: Option<String>,

    /// Fiat amount for backend-side pricing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_usd: Option<String>,

    /// Address that receives the deed
    pub buyer_address: String,

    /// Human-readable description of the sale
    pub memo: String,

    /// Seller payout wallet, informational
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_wallet: Option<String>,
}

/// Response of `POST /api/btc/create-invoice`.
///
/// `uri` is optional on the wire; [`InvoiceResponse::into_invoice`] derives a
/// canonical `bitcoin:` URI when it is missing.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    /// Invoice id
    pub id: String,

    /// Bitcoin address
    pub address: String,

    /// Amount due
    #[serde(default)]
    pub amount_btc: Option<String>,

    /// Payment URI, when the backend provides one
    #[serde(default)]
    pub uri: Option<String>,
}

impl InvoiceResponse {
    /// Converts the wire response into an [`Invoice`].
    pub fn into_invoice(self) -> Invoice {
        let payment_uri = match self.uri {
            Some(uri) if !uri.is_empty() => uri,
            _ => format!("bitcoin:{}", self.address),
        };

        Invoice {
            id: self.id,
            address: self.address,
            amount_btc: self.amount_btc,
            payment_uri,
        }
    }
}

/// Response of `GET /api/btc/status`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStatus {
    /// Whether the payment has enough confirmations
    #[serde(default)]
    pub settled: bool,

    /// Bitcoin transaction id, once seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

/// Body of `POST /api/btc/finalize`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FinalizeRequest {
    /// Invoice id
    pub id: String,

    /// Address that receives the deed
    #[serde(rename = "buyerAddress")]
    pub buyer_address: String,

    /// Deed metadata URI
    #[serde(rename = "tokenURI")]
    pub token_uri: String,

    /// Sale contract that mints the deed
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
}

/// Response of `POST /api/btc/finalize`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FinalizeResponse {
    /// Hash of the mint transaction sent by the backend
    #[serde(rename = "ethTxHash", alias = "ethereumTxHash", default)]
    pub eth_tx_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_asset_kind_parsing() {
        assert_eq!("ETH".parse::<AssetKind>().unwrap(), AssetKind::Eth);
        assert_eq!("usdc".parse::<AssetKind>().unwrap(), AssetKind::Usdc);
        assert!("DOGE".parse::<AssetKind>().is_err());
        assert_eq!(AssetKind::Usdt.to_string(), "USDT");
        assert!(AssetKind::Usdt.is_token());
        assert!(!AssetKind::Btc.is_token());
    }

    #[test]
    fn test_invoice_uri_fallback() {
        let response: InvoiceResponse = serde_json::from_value(json!({
            "id": "abc",
            "address": "bc1qexample",
            "amountBtc": "0.015"
        }))
        .unwrap();

        let invoice = response.into_invoice();
        assert_eq!(invoice.payment_uri, "bitcoin:bc1qexample");
        assert_eq!(invoice.amount_btc.as_deref(), Some("0.015"));
    }

    #[test]
    fn test_invoice_keeps_backend_uri() {
        let response: InvoiceResponse = serde_json::from_value(json!({
            "id": "abc",
            "address": "bc1qexample",
            "uri": "bitcoin:bc1qexample?amount=0.015"
        }))
        .unwrap();

        assert_eq!(
            response.into_invoice().payment_uri,
            "bitcoin:bc1qexample?amount=0.015"
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = CreateInvoiceRequest {
            amount_btc: Some("0.5".to_string()),
            buyer_address: "0xBuyer".to_string(),
            memo: "LandSale".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amountBtc"], "0.5");
        assert_eq!(json["buyerAddress"], "0xBuyer");
        assert!(json.get("amountUsd").is_none());

        let finalize = FinalizeRequest {
            id: "abc".to_string(),
            buyer_address: "0xBuyer".to_string(),
            token_uri: "ipfs://deed".to_string(),
            contract_address: "0xSale".to_string(),
        };
        let json = serde_json::to_string(&finalize).unwrap();
        assert!(json.contains("tokenURI"));
        assert!(json.contains("contractAddress"));
    }

    #[test]
    fn test_finalize_response_alias() {
        let out: FinalizeResponse =
            serde_json::from_value(json!({"ethereumTxHash": "0xfeed"})).unwrap();
        assert_eq!(out.eth_tx_hash, "0xfeed");
    }
}
