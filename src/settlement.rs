//! Off-chain Bitcoin settlement rail.
//!
//! The backend issues an invoice, watches the Bitcoin network and, once the
//! payment settles, mints the deed on the sale contract itself. This module
//! creates the invoice, polls its status under a bounded [`RetryPolicy`] and
//! asks the backend to finalize.

use crate::errors::{LandSaleError, Result};
use crate::types::{
    CreateInvoiceRequest, FinalizeRequest, FinalizeResponse, Invoice, InvoiceResponse, InvoiceStatus,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Default spacing between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status checks (about ten minutes at the default interval).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// The payment-rail backend.
#[async_trait]
pub trait SettlementBackend: Send + Sync {
    /// Creates an invoice. Non-success responses fail with
    /// [`LandSaleError::InvoiceCreationFailed`].
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> Result<Invoice>;

    /// Checks an invoice. `Ok(None)` means the backend did not give a usable
    /// answer, which callers treat as "not settled yet".
    async fn status(&self, invoice_id: &str) -> Result<Option<InvoiceStatus>>;

    /// Asks the backend to mint the deed for a settled invoice. Non-success
    /// responses fail with [`LandSaleError::FinalizeFailed`].
    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse>;
}

/// [`SettlementBackend`] speaking JSON over HTTP.
///
/// Endpoints are resolved against the base URL:
/// `api/btc/create-invoice`, `api/btc/status?id=`, `api/btc/finalize`.
#[derive(Clone, Debug)]
pub struct HttpSettlementBackend {
    base_url: Url,
    http_client: Client,
}

impl HttpSettlementBackend {
    /// Creates a backend client for `base_url`.
    ///
    /// # Examples
    ///
    /// ```
    /// use landsale_rs::settlement::HttpSettlementBackend;
    ///
    /// let backend = HttpSettlementBackend::new("https://deeds.example.com").unwrap();
    /// ```
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            http_client: Client::new(),
        })
    }

    /// Sets a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl SettlementBackend for HttpSettlementBackend {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> Result<Invoice> {
        let response = self
            .http_client
            .post(self.endpoint("/api/btc/create-invoice")?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LandSaleError::InvoiceCreationFailed(response.status().as_u16()));
        }

        let invoice: InvoiceResponse = response.json().await?;
        Ok(invoice.into_invoice())
    }

    async fn status(&self, invoice_id: &str) -> Result<Option<InvoiceStatus>> {
        let mut url = self.endpoint("/api/btc/status")?;
        url.query_pairs_mut().append_pair("id", invoice_id);

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "status check not successful");
            return Ok(None);
        }

        Ok(response.json::<InvoiceStatus>().await.ok())
    }

    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse> {
        let response = self
            .http_client
            .post(self.endpoint("/api/btc/finalize")?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LandSaleError::FinalizeFailed(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }
}

/// How often and how long to poll for settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between two status checks
    pub interval: Duration,

    /// Maximum number of status checks per poll
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Where the BTC rail currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// No invoice has been created yet
    NoInvoice,

    /// Invoice issued, not being polled
    InvoiceCreated(Invoice),

    /// A poll is in flight
    Polling {
        /// Invoice being polled
        invoice: Invoice,
        /// Status checks made so far
        attempt: u32,
    },

    /// Settled and minted by the backend
    Settled {
        /// Invoice that settled
        invoice: Invoice,
        /// Mint transaction reported by the backend
        eth_tx_hash: String,
    },

    /// The attempt budget ran out; polling again is allowed
    TimedOut {
        /// Invoice still awaiting payment
        invoice: Invoice,
        /// Status checks made
        attempts: u32,
    },

    /// Finalization was refused
    Failed {
        /// Invoice that settled but could not be finalized
        invoice: Invoice,
        /// What went wrong
        reason: String,
    },
}

impl PollState {
    /// The invoice this state refers to.
    pub fn invoice(&self) -> Option<&Invoice> {
        match self {
            PollState::NoInvoice => None,
            PollState::InvoiceCreated(invoice)
            | PollState::Polling { invoice, .. }
            | PollState::Settled { invoice, .. }
            | PollState::TimedOut { invoice, .. }
            | PollState::Failed { invoice, .. } => Some(invoice),
        }
    }
}

/// What the deed mint needs once the invoice settles.
#[derive(Debug, Clone)]
pub struct FinalizeTarget {
    /// Deed recipient
    pub buyer_address: String,
    /// Deed metadata URI
    pub token_uri: String,
    /// Sale contract
    pub contract_address: String,
}

/// Drives one invoice from creation to settlement.
///
/// Every operation takes `&mut self`, so two polls of the same invoice cannot
/// overlap.
pub struct SettlementPoller<B> {
    backend: B,
    policy: RetryPolicy,
    state: PollState,
}

impl<B: SettlementBackend> SettlementPoller<B> {
    /// Creates a poller with the default policy (5 s, 120 attempts).
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, RetryPolicy::default())
    }

    /// Creates a poller with a custom policy.
    pub fn with_policy(backend: B, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            state: PollState::NoInvoice,
        }
    }

    /// Current state.
    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Active retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates an invoice and replaces any previous one.
    pub async fn create_invoice(&mut self, request: &CreateInvoiceRequest) -> Result<Invoice> {
        let invoice = self.backend.create_invoice(request).await?;
        tracing::info!(id = %invoice.id, uri = %invoice.payment_uri, "BTC invoice created");
        self.state = PollState::InvoiceCreated(invoice.clone());
        Ok(invoice)
    }

    /// Polls until settled, finalizing on the first settled response.
    ///
    /// Returns the resulting state: `Settled`, `TimedOut`, or `InvoiceCreated`
    /// when `cancel` fired. A refused finalize moves to `Failed` and returns
    /// [`LandSaleError::FinalizeFailed`].
    pub async fn poll_and_finalize(
        &mut self,
        target: &FinalizeTarget,
        cancel: &CancellationToken,
    ) -> Result<&PollState> {
        if matches!(self.state, PollState::Settled { .. }) {
            return Ok(&self.state);
        }
        let invoice = self
            .state
            .invoice()
            .cloned()
            .ok_or_else(|| LandSaleError::MissingField("No BTC invoice to poll.".to_string()))?;

        for attempt in 1..=self.policy.max_attempts {
            if cancel.is_cancelled() {
                tracing::info!(id = %invoice.id, attempt, "BTC poll cancelled");
                self.state = PollState::InvoiceCreated(invoice);
                return Ok(&self.state);
            }

            self.state = PollState::Polling {
                invoice: invoice.clone(),
                attempt,
            };

            let settled = match self.backend.status(&invoice.id).await {
                Ok(Some(status)) => status.settled,
                Ok(None) => false,
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "status check failed");
                    false
                }
            };

            if settled {
                return self.finalize(invoice, target).await;
            }

            tracing::debug!(id = %invoice.id, attempt, "BTC not settled yet");

            if attempt < self.policy.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(id = %invoice.id, attempt, "BTC poll cancelled");
                        self.state = PollState::InvoiceCreated(invoice);
                        return Ok(&self.state);
                    }
                    _ = tokio::time::sleep(self.policy.interval) => {}
                }
            }
        }

        tracing::warn!(id = %invoice.id, attempts = self.policy.max_attempts, "BTC not yet confirmed");
        self.state = PollState::TimedOut {
            invoice,
            attempts: self.policy.max_attempts,
        };
        Ok(&self.state)
    }

    async fn finalize(&mut self, invoice: Invoice, target: &FinalizeTarget) -> Result<&PollState> {
        let request = FinalizeRequest {
            id: invoice.id.clone(),
            buyer_address: target.buyer_address.clone(),
            token_uri: target.token_uri.clone(),
            contract_address: target.contract_address.clone(),
        };

        match self.backend.finalize(&request).await {
            Ok(out) => {
                tracing::info!(id = %invoice.id, tx = %out.eth_tx_hash, "BTC settled, deed minted");
                self.state = PollState::Settled {
                    invoice,
                    eth_tx_hash: out.eth_tx_hash,
                };
                Ok(&self.state)
            }
            Err(e) => {
                self.state = PollState::Failed {
                    invoice,
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }
}
