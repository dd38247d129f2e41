//! ERC-20 allowance check and approval ahead of a token sale call.

use crate::errors::{LandSaleError, Result};
use crate::types::PaymentPlan;
use crate::wallet::WalletProvider;
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::contract::abigen;
use ethers::types::{Address, H256, U256, U64};

abigen!(
    Erc20,
    r#"[
        function approve(address spender, uint256 value) external returns (bool)
        function allowance(address owner, address spender) external view returns (uint256)
        function decimals() external view returns (uint8)
    ]"#
);

/// What the sequencer did before the sale call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// The existing allowance already covered the amount
    AlreadyApproved,

    /// An approval for exactly the amount was mined
    Approved {
        /// Hash of the approval transaction
        transaction_hash: H256,
    },
}

/// Reads the allowance `owner` granted `spender` on `token`.
pub async fn current_allowance(
    wallet: &dyn WalletProvider,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256> {
    let data = AllowanceCall { owner, spender }.encode();
    let output = wallet.call(token, data.into()).await?;
    let allowance = U256::decode(output.as_ref())
        .map_err(|e| LandSaleError::BlockchainError(format!("Bad allowance response: {}", e)))?;
    Ok(allowance)
}

/// Makes sure `contract` may pull the plan's token amount from `owner`.
///
/// Non-token plans need no approval and return [`ApprovalOutcome::AlreadyApproved`].
/// When the allowance is short, a single `approve` for exactly the required
/// amount is sent and awaited; its failure ends the attempt.
pub async fn ensure_allowance(
    wallet: &dyn WalletProvider,
    plan: &PaymentPlan,
    owner: Address,
    contract: Address,
) -> Result<ApprovalOutcome> {
    let (asset, token, amount) = match plan {
        PaymentPlan::Token {
            asset,
            token_address,
            amount,
            ..
        } => (*asset, *token_address, *amount),
        _ => return Ok(ApprovalOutcome::AlreadyApproved),
    };
    plan.ensure_positive()?;

    tracing::debug!(%asset, %token, "checking allowance");
    let allowance = current_allowance(wallet, token, owner, contract).await?;
    if allowance >= amount {
        tracing::debug!(%allowance, %amount, "allowance covers amount, skipping approval");
        return Ok(ApprovalOutcome::AlreadyApproved);
    }

    tracing::info!(%asset, %amount, "approving sale contract");
    let data = ApproveCall {
        spender: contract,
        value: amount,
    }
    .encode();
    let receipt = wallet.send_transaction(token, data.into(), U256::zero()).await?;

    if receipt.status == Some(U64::zero()) {
        return Err(LandSaleError::TransactionReverted(format!(
            "{} approval {:?}",
            asset, receipt.transaction_hash
        )));
    }

    Ok(ApprovalOutcome::Approved {
        transaction_hash: receipt.transaction_hash,
    })
}
