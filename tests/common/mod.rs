//! Test doubles for the wallet and the BTC backend.

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::AbiEncode;
use ethers::types::{Address, Bytes, Log, TransactionReceipt, H256, U256, U64};
use landsale_rs::contract::transfer_topic;
use landsale_rs::errors::{LandSaleError, Result};
use landsale_rs::settlement::SettlementBackend;
use landsale_rs::types::{
    CreateInvoiceRequest, FinalizeRequest, FinalizeResponse, Invoice, InvoiceResponse, InvoiceStatus,
};
use landsale_rs::wallet::WalletProvider;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

pub const BUYER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const SALE_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const USDT_MAINNET: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
pub const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

/// One interaction with the mock wallet, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletCall {
    Read { to: Address, selector: [u8; 4] },
    Send { to: Address, selector: [u8; 4], value: U256 },
}

#[derive(Debug)]
pub struct WalletState {
    pub account: Address,
    pub chain_id: u64,
    pub allowance: U256,
    pub mint_token_id: Option<U256>,
    pub reject_accounts: bool,
    pub revert_sales: bool,
    pub calls: Vec<WalletCall>,
    pub chain_id_reads: u32,
}

#[derive(Clone)]
pub struct MockWallet(Arc<Mutex<WalletState>>);

impl MockWallet {
    pub fn new(chain_id: u64) -> Self {
        Self(Arc::new(Mutex::new(WalletState {
            account: addr(BUYER),
            chain_id,
            allowance: U256::zero(),
            mint_token_id: None,
            reject_accounts: false,
            revert_sales: false,
            calls: Vec::new(),
            chain_id_reads: 0,
        })))
    }

    pub fn state(&self) -> MutexGuard<'_, WalletState> {
        self.0.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<WalletCall> {
        self.state().calls.clone()
    }

    pub fn sends(&self) -> Vec<WalletCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, WalletCall::Send { .. }))
            .collect()
    }

    pub fn approvals(&self) -> usize {
        self.sends()
            .iter()
            .filter(|c| matches!(c, WalletCall::Send { selector, .. } if *selector == APPROVE_SELECTOR))
            .count()
    }

    pub fn sales(&self) -> usize {
        self.sends().len() - self.approvals()
    }
}

fn selector_of(data: &Bytes) -> [u8; 4] {
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    selector
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let state = self.state();
        if state.reject_accounts {
            return Ok(vec![]);
        }
        Ok(vec![state.account])
    }

    async fn chain_id(&self) -> Result<u64> {
        let mut state = self.state();
        state.chain_id_reads += 1;
        Ok(state.chain_id)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let mut state = self.state();
        let selector = selector_of(&data);
        state.calls.push(WalletCall::Read { to, selector });
        if selector != ALLOWANCE_SELECTOR {
            return Err(LandSaleError::BlockchainError("unexpected read".to_string()));
        }
        Ok(state.allowance.encode().into())
    }

    async fn send_transaction(&self, to: Address, data: Bytes, value: U256) -> Result<TransactionReceipt> {
        let mut state = self.state();
        let selector = selector_of(&data);
        state.calls.push(WalletCall::Send { to, selector, value });

        let mut receipt = TransactionReceipt {
            transaction_hash: H256::from_low_u64_be(state.calls.len() as u64),
            status: Some(U64::one()),
            ..Default::default()
        };

        if selector == APPROVE_SELECTOR {
            state.allowance = U256::from_big_endian(&data[36..68]);
            return Ok(receipt);
        }

        if state.revert_sales {
            receipt.status = Some(U64::zero());
            return Ok(receipt);
        }

        if let Some(token_id) = state.mint_token_id {
            let buyer = Address::from_slice(&data[16..36]);
            let mut id = [0u8; 32];
            token_id.to_big_endian(&mut id);
            receipt.logs.push(Log {
                address: to,
                topics: vec![
                    transfer_topic(),
                    H256::zero(),
                    H256::from(buyer),
                    H256::from(id),
                ],
                ..Default::default()
            });
        }
        Ok(receipt)
    }
}

/// What the mock BTC backend does and what it has seen.
#[derive(Debug, Default)]
pub struct BackendState {
    pub invoice: Option<InvoiceResponse>,
    pub reject_invoice: bool,
    pub settle_on_check: Option<u32>,
    pub reject_finalize: bool,
    pub status_checks: u32,
    pub check_times: Vec<Instant>,
    pub finalize_requests: Vec<FinalizeRequest>,
    pub invoice_requests: Vec<CreateInvoiceRequest>,
}

#[derive(Clone, Default)]
pub struct MockBackend(Arc<Mutex<BackendState>>);

impl MockBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.state().invoice = Some(InvoiceResponse {
            id: "abc".to_string(),
            address: "bc1qexample".to_string(),
            amount_btc: Some("0.015".to_string()),
            uri: None,
        });
        backend
    }

    pub fn settling_on(check: u32) -> Self {
        let backend = Self::new();
        backend.state().settle_on_check = Some(check);
        backend
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl SettlementBackend for MockBackend {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> Result<Invoice> {
        let mut state = self.state();
        state.invoice_requests.push(request.clone());
        if state.reject_invoice {
            return Err(LandSaleError::InvoiceCreationFailed(500));
        }
        let invoice = state
            .invoice
            .clone()
            .ok_or_else(|| LandSaleError::Other("no invoice configured".to_string()))?;
        Ok(invoice.into_invoice())
    }

    async fn status(&self, _invoice_id: &str) -> Result<Option<InvoiceStatus>> {
        let mut state = self.state();
        state.status_checks += 1;
        state.check_times.push(Instant::now());
        let settled = state
            .settle_on_check
            .map_or(false, |n| state.status_checks >= n);
        Ok(Some(InvoiceStatus {
            settled,
            tx_id: None,
        }))
    }

    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse> {
        let mut state = self.state();
        state.finalize_requests.push(request.clone());
        if state.reject_finalize {
            return Err(LandSaleError::FinalizeFailed(502));
        }
        Ok(FinalizeResponse {
            eth_tx_hash: "0xfeed".to_string(),
        })
    }
}
