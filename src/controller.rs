//! Payment execution controller.
//!
//! [`SaleController`] is the per-page orchestrator. It owns the form, the
//! wallet session, the loaded contract interface and the BTC poller, and turns
//! every user action into a [`ActionStatus`] the page can show. Actions never
//! return errors; failures are logged and reported through the status.

use crate::approval::{ensure_allowance, ApprovalOutcome};
use crate::config::LandSaleConfig;
use crate::contract::{dispatch_sale, ContractInterface};
use crate::errors::{LandSaleError, Result};
use crate::form::{fields, prefill, FormState, HandoffState};
use crate::resolver::{plan_summary, resolve_plan};
use crate::settlement::{FinalizeTarget, PollState, SettlementBackend, SettlementPoller};
use crate::store::{persist_abi, persist_form, StateStore};
use crate::types::{AssetKind, CreateInvoiceRequest, ExecutionResult, PaymentPlan, WalletSession};
use crate::utils::{address_to_string, parse_address};
use crate::wallet::WalletProvider;
use chrono::{SecondsFormat, Utc};
use ethers::types::Address;
use std::collections::BTreeSet;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Outcome of the last user action, as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionStatus {
    /// Nothing has happened yet
    #[default]
    Idle,

    /// Neutral progress or guidance
    Info(String),

    /// The action completed
    Success(String),

    /// The action failed
    Error(String),
}

impl ActionStatus {
    /// Text to display.
    pub fn message(&self) -> &str {
        match self {
            ActionStatus::Idle => "",
            ActionStatus::Info(msg) | ActionStatus::Success(msg) | ActionStatus::Error(msg) => msg,
        }
    }

    /// Whether the last action failed.
    pub fn is_error(&self) -> bool {
        matches!(self, ActionStatus::Error(_))
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Orchestrates one sale page.
///
/// Every action takes `&mut self`, so a second action cannot start while one
/// is in flight.
pub struct SaleController<W, B> {
    config: LandSaleConfig,
    wallet: W,
    store: Box<dyn StateStore>,
    poller: SettlementPoller<B>,
    session: Option<WalletSession>,
    form: FormState,
    locked: BTreeSet<String>,
    interface: Option<ContractInterface>,
    last_result: Option<ExecutionResult>,
    status: ActionStatus,
}

impl<W: WalletProvider, B: SettlementBackend> SaleController<W, B> {
    /// Creates a controller and restores the form from `store`.
    ///
    /// The contract interface is the stored ABI when there is one, otherwise
    /// the built-in sale ABI.
    pub fn new(config: LandSaleConfig, wallet: W, backend: B, store: Box<dyn StateStore>) -> Self {
        let poller = SettlementPoller::with_policy(backend, config.poll_policy);
        let mut controller = Self {
            config,
            wallet,
            store,
            poller,
            session: None,
            form: FormState::new(),
            locked: BTreeSet::new(),
            interface: ContractInterface::sale_default().ok(),
            last_result: None,
            status: ActionStatus::Idle,
        };
        controller.restore(None);
        controller
    }

    /// Creates a controller whose form starts from the previous page's handoff.
    pub fn with_handoff(
        config: LandSaleConfig,
        wallet: W,
        backend: B,
        store: Box<dyn StateStore>,
        handoff: &HandoffState,
    ) -> Self {
        let mut controller = Self::new(config, wallet, backend, store);
        controller.restore(Some(handoff));
        controller
    }

    fn restore(&mut self, handoff: Option<&HandoffState>) {
        let restored = prefill(self.form.clone(), handoff, self.store.as_ref());
        self.form = restored.form;
        self.locked.extend(restored.locked);

        if let Some(abi_json) = restored.abi_json {
            match ContractInterface::from_artifact_json(&abi_json) {
                Ok(interface) => self.interface = Some(interface),
                Err(e) => tracing::warn!(error = %e, "ignoring unusable stored ABI"),
            }
        }
    }

    /// Current form snapshot.
    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Fields pinned by the handoff.
    pub fn locked_fields(&self) -> &BTreeSet<String> {
        &self.locked
    }

    /// Connected session, if any.
    pub fn session(&self) -> Option<&WalletSession> {
        self.session.as_ref()
    }

    /// Loaded contract interface, if any.
    pub fn interface(&self) -> Option<&ContractInterface> {
        self.interface.as_ref()
    }

    /// Result of the last successful on-chain sale.
    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.last_result.as_ref()
    }

    /// Outcome of the last action.
    pub fn status(&self) -> &ActionStatus {
        &self.status
    }

    /// Where the BTC rail stands.
    pub fn poll_state(&self) -> &PollState {
        self.poller.state()
    }

    /// Active configuration.
    pub fn config(&self) -> &LandSaleConfig {
        &self.config
    }

    /// How the selected asset will be paid.
    pub fn plan_summary(&self) -> Result<&'static str> {
        Ok(plan_summary(self.form.asset()?))
    }

    /// Whether the deed recipient is the connected account.
    pub fn is_buyer_connected_account(&self) -> bool {
        match (&self.session, parse_address(self.form.get(fields::BUYER_ADDRESS))) {
            (Some(session), Ok(buyer)) => session.address == buyer,
            _ => false,
        }
    }

    /// Connects the wallet, then fills the preset contract and the buyer
    /// address when the form has none.
    pub async fn connect(&mut self) -> &ActionStatus {
        let session = match WalletSession::connect(&self.wallet).await {
            Ok(session) => session,
            Err(e) => return self.fail("connect", e),
        };

        let mut filled = Vec::new();
        if !self.form.has(fields::CONTRACT_ADDRESS) && !self.locked.contains(fields::CONTRACT_ADDRESS) {
            if let Some(preset) = self.config.presets.get(session.chain_id) {
                filled.push((fields::CONTRACT_ADDRESS, address_to_string(preset)));
            }
        }
        if !self.form.has(fields::BUYER_ADDRESS) && !self.locked.contains(fields::BUYER_ADDRESS) {
            filled.push((fields::BUYER_ADDRESS, address_to_string(session.address)));
        }
        if !filled.is_empty() {
            self.form = self.form.with_fields(filled);
            self.persist();
        }

        let message = format!(
            "Connected {} on chainId {}",
            address_to_string(session.address),
            session.chain_id
        );
        self.session = Some(session);
        self.succeed(message)
    }

    /// Replaces one form field. Fields pinned by the handoff cannot change.
    pub fn edit(&mut self, field: &str, value: impl Into<String>) -> &ActionStatus {
        if self.locked.contains(field) {
            return self.fail(
                "edit",
                LandSaleError::Other(format!("{} was set by the previous step and is read-only.", field)),
            );
        }
        self.form = self.form.with_field(field, value);
        self.persist();
        self.status = ActionStatus::Idle;
        &self.status
    }

    /// Loads the sale contract interface from a compiler artifact or ABI array.
    pub fn load_artifact(&mut self, json: &str) -> &ActionStatus {
        let loaded = ContractInterface::from_artifact_json(json)
            .and_then(|interface| Ok((interface.to_json()?, interface)));
        match loaded {
            Ok((abi_json, interface)) => {
                if let Err(e) = persist_abi(self.store.as_ref(), &abi_json) {
                    tracing::warn!(error = %e, "could not persist ABI");
                }
                self.interface = Some(interface);
                self.succeed("ABI loaded.".to_string())
            }
            Err(e) => self.fail("load_artifact", e),
        }
    }

    /// Switches back to the built-in sale ABI.
    pub fn use_sale_interface(&mut self) -> &ActionStatus {
        match ContractInterface::sale_default() {
            Ok(interface) => {
                self.interface = Some(interface);
                self.succeed("Using the standard sale ABI.".to_string())
            }
            Err(e) => self.fail("use_sale_interface", e),
        }
    }

    /// Pays for the deed on-chain with the selected asset.
    ///
    /// Token payments approve the sale contract first when the allowance is
    /// short. BTC is paid through [`SaleController::create_btc_invoice`].
    pub async fn execute_sale(&mut self) -> &ActionStatus {
        match self.form.asset() {
            Ok(AssetKind::Btc) => {
                self.status = ActionStatus::Info(
                    "BTC is paid off-chain: create an invoice and poll for settlement.".to_string(),
                );
                return &self.status;
            }
            Ok(_) => {}
            Err(e) => return self.fail("execute_sale", e),
        }

        match self.try_execute_sale().await {
            Ok(result) => {
                let mut message = format!("Sale executed. Tx: {:?}", result.transaction_hash);
                if let Some(token_id) = result.minted_token_id {
                    message.push_str(&format!(" | Deed token id: {}", token_id));
                }
                self.stamp_dates();
                self.last_result = Some(result);
                self.succeed(message)
            }
            Err(e) => self.fail("execute_sale", e),
        }
    }

    async fn try_execute_sale(&self) -> Result<ExecutionResult> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| LandSaleError::ProviderUnavailable("Connect wallet first.".to_string()))?;

        let (contract, buyer, token_uri) = self.sale_target()?;
        let interface = self
            .interface
            .as_ref()
            .ok_or_else(|| LandSaleError::InvalidAbi("Load the contract ABI first.".to_string()))?;

        let plan = resolve_plan(
            self.form.asset()?,
            self.form.price()?,
            Some(session.chain_id),
            &self.config.tokens,
        )?;

        // Local checks are done; the wallet is first touched here.
        session.ensure_same_chain(&self.wallet).await?;

        if let ApprovalOutcome::Approved { transaction_hash } =
            ensure_allowance(&self.wallet, &plan, session.address, contract).await?
        {
            tracing::info!(tx = ?transaction_hash, "approval mined");
        }

        dispatch_sale(&self.wallet, interface, contract, &plan, buyer, &token_uri).await
    }

    /// Asks the backend for a BTC invoice for the typed BTC price.
    pub async fn create_btc_invoice(&mut self) -> &ActionStatus {
        match self.try_create_btc_invoice().await {
            Ok(message) => self.succeed(message),
            Err(e) => self.fail("create_btc_invoice", e),
        }
    }

    async fn try_create_btc_invoice(&mut self) -> Result<String> {
        let chain_id = self.session.as_ref().map(|s| s.chain_id);
        let amount_btc = match resolve_plan(
            AssetKind::Btc,
            self.form.get(fields::PRICE_BTC),
            chain_id,
            &self.config.tokens,
        )? {
            PaymentPlan::OffChainBtc { amount } => amount,
            _ => None,
        };

        let buyer = self.buyer_address()?;
        let seller_wallet = Some(self.form.get(fields::SELLER_WALLET).trim())
            .filter(|w| !w.is_empty())
            .map(str::to_string);

        let request = CreateInvoiceRequest {
            amount_btc,
            amount_usd: None,
            buyer_address: address_to_string(buyer),
            memo: self.form.invoice_memo()?,
            seller_wallet,
        };
        let invoice = self.poller.create_invoice(&request).await?;

        let amount = invoice.amount_btc.as_deref().unwrap_or("the quoted amount of");
        Ok(format!(
            "Invoice {}: send {} BTC to {} ({})",
            invoice.id, amount, invoice.address, invoice.payment_uri
        ))
    }

    /// Polls the current invoice and has the backend mint the deed once it
    /// settles. `cancel` stops the poll early and keeps the invoice.
    pub async fn poll_btc_and_finalize(&mut self, cancel: &CancellationToken) -> &ActionStatus {
        let target = match self.sale_target() {
            Ok((contract, buyer, token_uri)) => FinalizeTarget {
                buyer_address: address_to_string(buyer),
                token_uri,
                contract_address: address_to_string(contract),
            },
            Err(e) => return self.fail("poll_btc_and_finalize", e),
        };

        let state = match self.poller.poll_and_finalize(&target, cancel).await {
            Ok(state) => state.clone(),
            Err(e) => return self.fail("poll_btc_and_finalize", e),
        };

        match state {
            PollState::Settled { eth_tx_hash, .. } => {
                self.stamp_dates();
                self.succeed(format!("BTC settled. Deed minted on Ethereum: {}", eth_tx_hash))
            }
            PollState::TimedOut { attempts, .. } => {
                self.status = ActionStatus::Info(format!(
                    "BTC not yet confirmed after {} checks. Try polling again later.",
                    attempts
                ));
                &self.status
            }
            _ => {
                self.status = ActionStatus::Info("BTC polling stopped.".to_string());
                &self.status
            }
        }
    }

    fn sale_target(&self) -> Result<(Address, Address, String)> {
        let contract = parse_address(self.form.get(fields::CONTRACT_ADDRESS))
            .map_err(|_| LandSaleError::InvalidAddress("Enter a valid contract address.".to_string()))?;
        let buyer = self.buyer_address()?;
        let token_uri = self.form.effective_token_uri(self.config.auto_metadata)?;
        if token_uri.is_empty() {
            return Err(LandSaleError::MissingField("Token URI is required.".to_string()));
        }
        Ok((contract, buyer, token_uri))
    }

    fn buyer_address(&self) -> Result<Address> {
        parse_address(self.form.get(fields::BUYER_ADDRESS))
            .map_err(|_| LandSaleError::InvalidAddress("Enter a valid buyer address.".to_string()))
    }

    fn stamp_dates(&mut self) {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.form = self.form.with_fields([
            (fields::EFFECTIVE_DATE, now.clone()),
            (fields::CLOSING_DATE, now),
        ]);
    }

    fn persist(&self) {
        if let Err(e) = persist_form(self.store.as_ref(), &self.form) {
            tracing::warn!(error = %e, "could not persist form");
        }
    }

    fn succeed(&mut self, message: String) -> &ActionStatus {
        tracing::info!(%message, "action succeeded");
        self.status = ActionStatus::Success(message);
        &self.status
    }

    fn fail(&mut self, action: &'static str, error: LandSaleError) -> &ActionStatus {
        tracing::warn!(action, error = %error, "action failed");
        self.status = ActionStatus::Error(error.to_string());
        &self.status
    }
}
