//! Sale form state.
//!
//! The form is a plain map of field name to the string the user typed. It is
//! owned by the controller and replaced wholesale on every edit, so a payment
//! that already captured its amounts cannot observe later keystrokes.

use crate::errors::Result;
use crate::store::{self, StateStore};
use crate::types::AssetKind;
use crate::utils::json_data_uri;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Field names used on the sale pages.
pub mod fields {
    /// Sale contract address
    pub const CONTRACT_ADDRESS: &str = "contractAddress";
    /// Deed metadata URI
    pub const TOKEN_URI: &str = "tokenURI";
    /// Selected payment asset
    pub const ASSET_TYPE: &str = "assetType";
    /// Price in ETH
    pub const PRICE_ETH: &str = "priceEth";
    /// Price in USDT
    pub const PRICE_USDT: &str = "priceUsdt";
    /// Price in USDC
    pub const PRICE_USDC: &str = "priceUsdc";
    /// Price in BTC
    pub const PRICE_BTC: &str = "priceBtc";
    /// Property street address
    pub const STREET_ADDRESS: &str = "streetAddress";
    /// Property county
    pub const COUNTY: &str = "county";
    /// Legal description of the parcel
    pub const LEGAL_DESCRIPTION: &str = "legalDescription";
    /// Wallet that receives the deed
    pub const BUYER_ADDRESS: &str = "buyerAddress";
    /// Seller payout wallet
    pub const SELLER_WALLET: &str = "sellerWallet";
    /// Seller's legal name
    pub const SELLER_NAME: &str = "sellerName";
    /// Seller's postal address
    pub const SELLER_ADDRESS: &str = "sellerAddress";
    /// Buyer's legal name
    pub const BUYER_NAME: &str = "buyerName";
    /// Buyer's postal address
    pub const BUYER_ADDRESS_POSTAL: &str = "buyerAddressPostal";
    /// Effective date, stamped on execution
    pub const EFFECTIVE_DATE: &str = "effectiveDate";
    /// Closing date, stamped on execution
    pub const CLOSING_DATE: &str = "closingDate";
}

const MISSING: &str = "—";

/// Snapshot of the sale form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    values: BTreeMap<String, String>,
}

impl FormState {
    /// An empty form paying in ETH.
    pub fn new() -> Self {
        Self::default().with_field(fields::ASSET_TYPE, AssetKind::Eth.as_str())
    }

    /// Value of `field`, empty when unset.
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    /// Whether `field` holds a non-blank value.
    pub fn has(&self, field: &str) -> bool {
        !self.get(field).trim().is_empty()
    }

    /// A new snapshot with `field` set to `value`.
    pub fn with_field(&self, field: &str, value: impl Into<String>) -> FormState {
        let mut next = self.clone();
        next.values.insert(field.to_string(), value.into());
        next
    }

    /// A new snapshot with every pair applied.
    pub fn with_fields<'a>(&self, pairs: impl IntoIterator<Item = (&'a str, String)>) -> FormState {
        let mut next = self.clone();
        for (field, value) in pairs {
            next.values.insert(field.to_string(), value);
        }
        next
    }

    /// All fields, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Selected asset. A tag outside ETH/USDT/USDC/BTC, or none at all, fails
    /// with [`crate::errors::LandSaleError::UnsupportedAsset`].
    pub fn asset(&self) -> Result<AssetKind> {
        self.get(fields::ASSET_TYPE).parse()
    }

    /// Price string typed for the selected asset.
    pub fn price(&self) -> Result<&str> {
        Ok(self.get(self.asset()?.price_field()))
    }

    /// Description sent with a BTC invoice.
    ///
    /// # Examples
    ///
    /// ```
    /// use landsale_rs::form::{fields, FormState};
    ///
    /// let form = FormState::new()
    ///     .with_field(fields::STREET_ADDRESS, "1 Ranch Rd")
    ///     .with_field(fields::COUNTY, "Travis")
    ///     .with_field(fields::PRICE_ETH, "1.25");
    /// assert_eq!(
    ///     form.invoice_memo().unwrap(),
    ///     "LandSale: 1 Ranch Rd, Travis County | Price: 1.25 ETH"
    /// );
    /// ```
    pub fn invoice_memo(&self) -> Result<String> {
        let or_missing = |field: &str| {
            if self.has(field) {
                self.get(field).to_string()
            } else {
                MISSING.to_string()
            }
        };
        let asset = self.asset()?;
        let price = if self.has(asset.price_field()) {
            format!("{} {}", self.get(asset.price_field()), asset)
        } else {
            MISSING.to_string()
        };
        Ok(format!(
            "LandSale: {}, {} County | Price: {}",
            or_missing(fields::STREET_ADDRESS),
            or_missing(fields::COUNTY),
            price
        ))
    }

    /// Deed metadata generated from the form, as a base64 JSON data URI.
    pub fn auto_token_uri(&self) -> Result<String> {
        let or_na = |field: &str| {
            if self.has(field) {
                self.get(field).to_string()
            } else {
                "N/A".to_string()
            }
        };
        let asset = self.asset()?;
        let street = if self.has(fields::STREET_ADDRESS) {
            self.get(fields::STREET_ADDRESS).to_string()
        } else {
            "Property".to_string()
        };

        let metadata = json!({
            "name": format!("Land Deed — {}", street),
            "description": "On-chain deed representing a land purchase.",
            "attributes": [
                { "trait_type": "County", "value": or_na(fields::COUNTY) },
                { "trait_type": "Seller", "value": or_na(fields::SELLER_NAME) },
                { "trait_type": "Buyer", "value": or_na(fields::BUYER_NAME) },
                { "trait_type": "Seller Wallet", "value": or_na(fields::SELLER_WALLET) },
                { "trait_type": "Payment Asset", "value": asset.as_str() },
            ],
        });
        Ok(json_data_uri(&metadata.to_string()))
    }

    /// Token URI to mint with: the typed one, or generated metadata when
    /// `auto_metadata` is on and none was typed.
    pub fn effective_token_uri(&self, auto_metadata: bool) -> Result<String> {
        if self.has(fields::TOKEN_URI) {
            Ok(self.get(fields::TOKEN_URI).trim().to_string())
        } else if auto_metadata {
            self.auto_token_uri()
        } else {
            Ok(String::new())
        }
    }
}

/// Fields handed over from the previous page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffState {
    /// Field values, keyed by form field name
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,

    /// Contract ABI as JSON, when the previous page loaded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<serde_json::Value>,
}

/// Form restored on page load, with the fields the handoff pinned.
#[derive(Debug, Clone, Default)]
pub struct PrefilledForm {
    /// Restored form
    pub form: FormState,

    /// Fields supplied by the handoff, shown read-only
    pub locked: BTreeSet<String>,

    /// ABI JSON from the handoff or the store
    pub abi_json: Option<String>,
}

/// Restores the form from the handoff bundle and persisted state.
///
/// Non-empty handoff values win and lock their field. Persisted values then
/// fill whatever is still empty, except the asset type, which the persisted
/// value overrides unless the handoff set it.
pub fn prefill(base: FormState, handoff: Option<&HandoffState>, store: &dyn StateStore) -> PrefilledForm {
    let mut form = base;
    let mut locked = BTreeSet::new();
    let mut abi_json = None;

    if let Some(handoff) = handoff {
        for (field, value) in &handoff.fields {
            if !value.is_empty() {
                form = form.with_field(field, value.clone());
                locked.insert(field.clone());
            }
        }
        if let Some(abi) = handoff.abi.as_ref().filter(|abi| abi.is_array()) {
            abi_json = Some(abi.to_string());
        }
    }

    for (key, field) in store::PERSISTED_FIELDS {
        let Some(value) = store.get(key).filter(|v| !v.is_empty()) else {
            continue;
        };
        if field == fields::ASSET_TYPE {
            if !locked.contains(field) {
                form = form.with_field(field, value);
            }
        } else if !form.has(field) {
            form = form.with_field(field, value);
        }
    }

    if abi_json.is_none() {
        abi_json = store
            .get(store::ABI_KEY)
            .filter(|raw| matches!(serde_json::from_str::<serde_json::Value>(raw), Ok(v) if v.is_array()));
    }

    PrefilledForm {
        form,
        locked,
        abi_json,
    }
}
