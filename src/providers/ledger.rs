//! Ledger capability
//!
//! The game never owns balances. It only needs to ask an external ledger
//! for a balance and to move value, and both calls may fail. Wallet
//! backends (Solana RPC signer, custodial book, test double) implement
//! [`Ledger`].
//!
//! [`InMemoryLedger`] is the custodial book used by the simulation runner,
//! the HTTP front end, and tests. It can be switched offline or made to
//! reject transfers to exercise the failure paths.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Currency;

/// External ledger capability
pub trait Ledger: Send + Sync {
    /// Current balance of `identity` in `currency`
    ///
    /// Fails with `LEDGER_UNAVAILABLE` when the service cannot be reached.
    fn query_balance(
        &self,
        identity: &str,
        currency: &Currency,
    ) -> impl Future<Output = AppResult<f64>> + Send;

    /// Move `amount` from one identity to another
    ///
    /// Any failure surfaces as `LEDGER_TRANSFER_FAILED` (or
    /// `LEDGER_UNAVAILABLE`), never as a silent success.
    fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        currency: &Currency,
    ) -> impl Future<Output = AppResult<()>> + Send;
}

impl<L: Ledger> Ledger for Arc<L> {
    fn query_balance(
        &self,
        identity: &str,
        currency: &Currency,
    ) -> impl Future<Output = AppResult<f64>> + Send {
        self.as_ref().query_balance(identity, currency)
    }

    fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        currency: &Currency,
    ) -> impl Future<Output = AppResult<()>> + Send {
        self.as_ref().transfer(from, to, amount, currency)
    }
}

/// One completed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub currency: Currency,
    pub at: DateTime<Utc>,
}

/// Custodial in-memory book
///
/// Thread-safe via DashMap; a transfer debits then credits, and never
/// leaves a partial debit behind when it fails.
#[derive(Default)]
pub struct InMemoryLedger {
    balances: DashMap<(String, Currency), f64>,
    history: RwLock<Vec<TransferRecord>>,
    offline: AtomicBool,
    reject_transfers: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an identity out of thin air (faucet / test funding)
    pub fn deposit(&self, identity: &str, currency: &Currency, amount: f64) -> AppResult<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::invalid_wager(amount));
        }
        let mut entry = self
            .balances
            .entry((identity.to_string(), currency.clone()))
            .or_insert(0.0);
        *entry += amount;
        debug!(identity, amount, currency = %currency, "Deposit credited");
        Ok(*entry)
    }

    /// Synchronous balance peek (0 for unknown identities)
    pub fn balance(&self, identity: &str, currency: &Currency) -> f64 {
        self.balances
            .get(&(identity.to_string(), currency.clone()))
            .map(|b| *b)
            .unwrap_or(0.0)
    }

    /// Simulate the service being unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Simulate the service refusing every transfer
    pub fn set_reject_transfers(&self, reject: bool) {
        self.reject_transfers.store(reject, Ordering::SeqCst);
    }

    /// Completed transfers, oldest first
    pub fn history(&self) -> Vec<TransferRecord> {
        self.history.read().map(|h| h.clone()).unwrap_or_default()
    }

    fn ensure_online(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::ledger_unavailable("In-memory ledger is offline"));
        }
        Ok(())
    }
}

impl Ledger for InMemoryLedger {
    async fn query_balance(&self, identity: &str, currency: &Currency) -> AppResult<f64> {
        self.ensure_online()?;
        Ok(self.balance(identity, currency))
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        currency: &Currency,
    ) -> AppResult<()> {
        self.ensure_online()?;
        if self.reject_transfers.load(Ordering::SeqCst) {
            warn!("❌ Transfer {} -> {} rejected by ledger", from, to);
            return Err(AppError::transfer_failed(format!(
                "Ledger rejected transfer of {} {} from {} to {}",
                amount, currency, from, to
            )));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::transfer_failed(format!(
                "Refusing to transfer non-positive amount {}",
                amount
            )));
        }

        // Debit under the entry lock, release it before crediting
        {
            let mut source = self
                .balances
                .get_mut(&(from.to_string(), currency.clone()))
                .ok_or_else(|| {
                    AppError::transfer_failed(format!("{} has no {} account", from, currency))
                })?;
            if *source < amount {
                return Err(AppError::transfer_failed(format!(
                    "{} holds {:.6} {}, cannot send {:.6}",
                    from, *source, currency, amount
                )));
            }
            *source -= amount;
        }

        *self
            .balances
            .entry((to.to_string(), currency.clone()))
            .or_insert(0.0) += amount;

        if let Ok(mut history) = self.history.write() {
            history.push(TransferRecord {
                from: from.to_string(),
                to: to.to_string(),
                amount,
                currency: currency.clone(),
                at: Utc::now(),
            });
        }
        debug!(from, to, amount, currency = %currency, "Transfer settled");
        Ok(())
    }
}
