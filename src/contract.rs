//! Sale contract interface, entry-point dispatch and mint-event decoding.
//!
//! The deed contract is deployed elsewhere; all this module knows is its ABI.
//! Which function gets called is decided by an explicit capability check
//! against that ABI rather than by trying calls until one sticks.

use crate::errors::{LandSaleError, Result};
use crate::types::{ExecutionResult, PaymentPlan};
use crate::wallet::WalletProvider;
use chrono::Utc;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, TransactionReceipt, H256, U256, U64};
use ethers::utils::keccak256;

/// Minimal ABI of the sale contract, used when no artifact is supplied.
pub const SALE_ABI: [&str; 4] = [
    "function executeSale(address buyer, string tokenURI) payable returns (uint256)",
    "function mintDeed(address to, string tokenURI) payable returns (uint256)",
    "function executeSaleERC20(address buyer, string tokenURI, address token, uint256 amount) returns (uint256)",
    "function mintDeedERC20(address to, string tokenURI, address token, uint256 amount) returns (uint256)",
];

/// Native-payment entry points: primary, fallback.
pub const NATIVE_ENTRY_POINTS: (&str, &str) = ("executeSale", "mintDeed");

/// ERC-20 entry points: primary, fallback.
pub const TOKEN_ENTRY_POINTS: (&str, &str) = ("executeSaleERC20", "mintDeedERC20");

/// Which sale function a contract exposes for a given plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// The primary `executeSale*` function
    Primary(&'static str),

    /// The `mintDeed*` fallback
    Fallback(&'static str),

    /// Neither function is present
    Unsupported {
        /// Name that was tried first
        primary: &'static str,
        /// Name that was tried second
        fallback: &'static str,
    },
}

impl EntryPoint {
    /// Function name to call, or the matching error.
    pub fn function_name(self) -> Result<&'static str> {
        match self {
            EntryPoint::Primary(name) | EntryPoint::Fallback(name) => Ok(name),
            EntryPoint::Unsupported { primary, fallback } => {
                Err(LandSaleError::UnsupportedContract { primary, fallback })
            }
        }
    }
}

/// The sale contract's interface descriptor.
#[derive(Debug, Clone)]
pub struct ContractInterface {
    abi: Abi,
}

impl ContractInterface {
    /// Wraps an already parsed ABI.
    pub fn new(abi: Abi) -> Self {
        Self { abi }
    }

    /// The built-in minimal sale ABI.
    pub fn sale_default() -> Result<Self> {
        let abi = ethers::abi::parse_abi(&SALE_ABI)
            .map_err(|e| LandSaleError::InvalidAbi(e.to_string()))?;
        Ok(Self { abi })
    }

    /// Parses a compiler artifact (`{"abi": [...]}` or `{"ABI": [...]}`) or a
    /// bare ABI array.
    ///
    /// # Examples
    ///
    /// ```
    /// use landsale_rs::contract::ContractInterface;
    ///
    /// let artifact = r#"{"abi": [{"type": "function", "name": "mintDeed",
    ///     "inputs": [{"name": "to", "type": "address"}, {"name": "tokenURI", "type": "string"}],
    ///     "outputs": [], "stateMutability": "payable"}]}"#;
    /// let iface = ContractInterface::from_artifact_json(artifact).unwrap();
    /// assert!(iface.has_function("mintDeed"));
    /// ```
    pub fn from_artifact_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let abi_value = if value.is_array() {
            value
        } else {
            value
                .get("abi")
                .or_else(|| value.get("ABI"))
                .cloned()
                .ok_or_else(|| LandSaleError::InvalidAbi("Could not find `abi` in the JSON.".to_string()))?
        };
        let abi: Abi = serde_json::from_value(abi_value)?;
        Ok(Self { abi })
    }

    /// The ABI as a JSON array, the form it is persisted in.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.abi)?)
    }

    /// Whether the contract declares a function called `name`.
    pub fn has_function(&self, name: &str) -> bool {
        self.abi.functions.contains_key(name)
    }

    /// Picks the entry point for `plan`.
    ///
    /// Off-chain plans never reach the contract from the client and resolve to
    /// [`EntryPoint::Unsupported`].
    pub fn entry_point(&self, plan: &PaymentPlan) -> EntryPoint {
        let (primary, fallback) = match plan {
            PaymentPlan::Native { .. } => NATIVE_ENTRY_POINTS,
            PaymentPlan::Token { .. } => TOKEN_ENTRY_POINTS,
            PaymentPlan::OffChainBtc { .. } => {
                return EntryPoint::Unsupported {
                    primary: NATIVE_ENTRY_POINTS.0,
                    fallback: TOKEN_ENTRY_POINTS.0,
                }
            }
        };

        if self.has_function(primary) {
            EntryPoint::Primary(primary)
        } else if self.has_function(fallback) {
            EntryPoint::Fallback(fallback)
        } else {
            EntryPoint::Unsupported { primary, fallback }
        }
    }

    /// Encodes the sale call for `plan` and returns `(calldata, value)`.
    pub fn encode_sale(
        &self,
        entry_point: EntryPoint,
        plan: &PaymentPlan,
        buyer: Address,
        token_uri: &str,
    ) -> Result<(Vec<u8>, U256)> {
        let name = entry_point.function_name()?;
        let function = self.abi.function(name)?;

        let mut args = vec![Token::Address(buyer), Token::String(token_uri.to_string())];
        let value = match plan {
            PaymentPlan::Native { amount } => *amount,
            PaymentPlan::Token {
                token_address,
                amount,
                ..
            } => {
                args.push(Token::Address(*token_address));
                args.push(Token::Uint(*amount));
                U256::zero()
            }
            PaymentPlan::OffChainBtc { .. } => {
                return Err(LandSaleError::Other(
                    "BTC payments are finalized by the backend".to_string(),
                ))
            }
        };

        Ok((function.encode_input(&args)?, value))
    }
}

/// Calls the sale contract for `plan` and waits for the receipt.
///
/// Any approval must already be in place. No transaction is sent when the
/// contract exposes neither entry point.
pub async fn dispatch_sale(
    wallet: &dyn WalletProvider,
    interface: &ContractInterface,
    contract: Address,
    plan: &PaymentPlan,
    buyer: Address,
    token_uri: &str,
) -> Result<ExecutionResult> {
    plan.ensure_positive()?;
    let entry_point = interface.entry_point(plan);
    let (data, value) = interface.encode_sale(entry_point, plan, buyer, token_uri)?;

    tracing::info!(?entry_point, asset = %plan.asset(), %contract, "submitting sale transaction");
    let receipt = wallet.send_transaction(contract, data.into(), value).await?;

    if receipt.status == Some(U64::zero()) {
        return Err(LandSaleError::TransactionReverted(format!(
            "sale {:?}",
            receipt.transaction_hash
        )));
    }

    let minted_token_id = decode_minted_token_id(&receipt, contract, buyer);
    if minted_token_id.is_none() {
        tracing::debug!(tx = ?receipt.transaction_hash, "no mint event found in receipt");
    }

    Ok(ExecutionResult {
        transaction_hash: receipt.transaction_hash,
        minted_token_id,
        executed_at: Utc::now(),
    })
}

/// Topic of `Transfer(address,address,uint256)`.
pub fn transfer_topic() -> H256 {
    H256::from(keccak256("Transfer(address,address,uint256)"))
}

/// Extracts the id of the deed minted to `buyer` by `contract`, if any.
///
/// Looks for an ERC-721 `Transfer` log (three indexed arguments) emitted by the
/// contract whose recipient is the buyer.
pub fn decode_minted_token_id(
    receipt: &TransactionReceipt,
    contract: Address,
    buyer: Address,
) -> Option<U256> {
    let topic = transfer_topic();
    let buyer_topic = H256::from(buyer);

    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .filter(|log| log.topics.len() == 4 && log.topics[0] == topic)
        .find(|log| log.topics[2] == buyer_topic)
        .map(|log| U256::from_big_endian(log.topics[3].as_bytes()))
}
