//! Settlement Engine
//!
//! Fixed odds against the house, settled per Hustler with no pooling:
//!
//! 1. `fee = wager * fee_pct`, credited to the [`FeeLedger`]
//! 2. `net = wager - fee`
//! 3. base payout by rank: 1 -> `net * 2.0`, 2 -> `net * 1.5`, 3 -> `net * 1.2`,
//!    anything else (rank 4+, disqualified, not entered) -> 0
//! 4. NFT bonus multiplies the base payout once
//!
//! The fee is taken before the bonus, so the bonus never dilutes fee revenue.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

use crate::models::errors::AppResult;
use crate::models::types::{Currency, RaceOutcome};
use crate::providers::ledger::Ledger;
use crate::utils::constants::payout_multiplier;

/// Bucket remainder treated as empty
const FEE_DUST: f64 = 1e-9;

/// Intermediate values of one payout computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PayoutBreakdown {
    pub fee: f64,
    pub net: f64,
    pub base: f64,
    pub payout: f64,
}

/// Pure payout arithmetic
pub fn compute_payout(
    wager: f64,
    outcome: RaceOutcome,
    nft_bonus: bool,
    fee_percentage: f64,
    nft_multiplier: f64,
) -> PayoutBreakdown {
    let fee = wager * fee_percentage;
    let net = wager - fee;
    let base = match outcome {
        RaceOutcome::Ranked(rank) => net * payout_multiplier(rank),
        RaceOutcome::Disqualified | RaceOutcome::NotEntered | RaceOutcome::Pending => 0.0,
    };
    let payout = if nft_bonus { base * nft_multiplier } else { base };

    PayoutBreakdown {
        fee,
        net,
        base,
        payout,
    }
}

/// Running fee totals awaiting a sweep, one bucket per currency
///
/// Every read-modify-write happens under one mutex, so concurrent
/// settlements and sweeps never lose or double-count a fee.
#[derive(Debug, Default)]
pub struct FeeLedger {
    totals: Mutex<HashMap<Currency, f64>>,
}

impl FeeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, currency: &Currency, amount: f64) {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        *totals.entry(currency.clone()).or_insert(0.0) += amount;
    }

    pub fn total(&self, currency: &Currency) -> f64 {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(currency)
            .copied()
            .unwrap_or(0.0)
    }

    /// Snapshot of every bucket
    pub fn totals(&self) -> HashMap<Currency, f64> {
        self.totals.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Atomically read the total and reset it to zero
    pub fn take(&self, currency: &Currency) -> f64 {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        totals.insert(currency.clone(), 0.0).unwrap_or(0.0)
    }

    /// Put back an amount taken for a sweep that failed
    pub fn restore(&self, currency: &Currency, amount: f64) {
        self.add(currency, amount);
    }

    /// Atomically take up to `amount` out of the bucket
    ///
    /// Float dust left behind is zeroed.
    pub fn take_amount(&self, currency: &Currency, amount: f64) -> f64 {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = totals.entry(currency.clone()).or_insert(0.0);
        let taken = amount.min(*bucket).max(0.0);
        *bucket -= taken;
        if *bucket < FEE_DUST {
            *bucket = 0.0;
        }
        taken
    }

    /// Move the whole bucket to the collector
    ///
    /// The bucket is zeroed before the transfer starts; fees settled while
    /// the transfer is in flight land in the fresh bucket. On failure the
    /// taken amount is restored and the error propagates.
    pub async fn sweep<L: Ledger>(
        &self,
        ledger: &L,
        currency: &Currency,
        from: &str,
        to: &str,
    ) -> AppResult<f64> {
        let amount = self.take(currency);
        self.transfer_taken(ledger, currency, amount, from, to).await
    }

    /// Move one race's share of the bucket to the collector
    ///
    /// Fees other races added to the same bucket stay put for their own
    /// sweep. Same restore-on-failure rule as [`FeeLedger::sweep`].
    pub async fn sweep_amount<L: Ledger>(
        &self,
        ledger: &L,
        currency: &Currency,
        amount: f64,
        from: &str,
        to: &str,
    ) -> AppResult<f64> {
        let taken = self.take_amount(currency, amount);
        self.transfer_taken(ledger, currency, taken, from, to).await
    }

    async fn transfer_taken<L: Ledger>(
        &self,
        ledger: &L,
        currency: &Currency,
        amount: f64,
        from: &str,
        to: &str,
    ) -> AppResult<f64> {
        if amount <= 0.0 {
            return Ok(0.0);
        }

        match ledger.transfer(from, to, amount, currency).await {
            Ok(()) => {
                info!("💸 Swept {:.6} {} in fees to {}", amount, currency, to);
                Ok(amount)
            }
            Err(e) => {
                warn!("⚠️ Fee sweep failed, restoring {:.6} {}: {}", amount, currency, e);
                self.restore(currency, amount);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ledger::InMemoryLedger;
    use std::sync::Arc;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_payout_table_for_wager_of_100() {
        let rank = |r| compute_payout(100.0, RaceOutcome::Ranked(r), false, 0.15, 1.03);

        let first = rank(1);
        assert!(close(first.fee, 15.0));
        assert!(close(first.net, 85.0));
        assert!(close(first.payout, 170.0));
        assert!(close(rank(2).payout, 127.5));
        assert!(close(rank(3).payout, 102.0));
        assert_eq!(rank(4).payout, 0.0);
        assert_eq!(rank(5).payout, 0.0);
    }

    #[test]
    fn test_non_finishers_pay_nothing_but_still_pay_fee() {
        for outcome in [RaceOutcome::Disqualified, RaceOutcome::NotEntered] {
            let b = compute_payout(100.0, outcome, true, 0.15, 1.03);
            assert_eq!(b.payout, 0.0);
            assert!(close(b.fee, 15.0));
        }
    }

    #[test]
    fn test_bonus_applies_after_fee() {
        let b = compute_payout(100.0, RaceOutcome::Ranked(1), true, 0.15, 1.03);
        assert!(close(b.base, 170.0));
        assert!(close(b.payout, 175.1));
        assert!(close(b.fee, 15.0));
    }

    #[test]
    fn test_fee_ledger_accumulates() {
        let fees = FeeLedger::new();
        let wagers = [100.0, 42.0, 7.5, 1_000.0];
        for w in wagers {
            fees.add(&Currency::Sol, compute_payout(w, RaceOutcome::Ranked(4), false, 0.15, 1.03).fee);
        }
        let expected: f64 = wagers.iter().map(|w| w * 0.15).sum();
        assert!(close(fees.total(&Currency::Sol), expected));
    }

    #[test]
    fn test_fee_ledger_concurrent_adds() {
        let fees = Arc::new(FeeLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fees = fees.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        fees.add(&Currency::Sol, 0.25);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(close(fees.total(&Currency::Sol), 2_000.0));
    }

    #[tokio::test]
    async fn test_sweep_moves_exact_total_and_resets() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("house", &Currency::Sol, 100.0).unwrap();
        let fees = FeeLedger::new();
        fees.add(&Currency::Sol, 15.0);
        fees.add(&Currency::Sol, 4.5);

        let swept = fees.sweep(&ledger, &Currency::Sol, "house", "founder").await.unwrap();
        assert!(close(swept, 19.5));
        assert_eq!(fees.total(&Currency::Sol), 0.0);
        assert!(close(ledger.balance("founder", &Currency::Sol), 19.5));
    }

    #[tokio::test]
    async fn test_failed_sweep_restores_total() {
        let ledger = InMemoryLedger::new();
        ledger.set_reject_transfers(true);
        let fees = FeeLedger::new();
        fees.add(&Currency::Sol, 15.0);

        assert!(fees.sweep(&ledger, &Currency::Sol, "house", "founder").await.is_err());
        assert!(close(fees.total(&Currency::Sol), 15.0));
    }

    #[tokio::test]
    async fn test_sweep_amount_leaves_other_races_fees() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("house", &Currency::Sol, 7.5).unwrap();
        let fees = FeeLedger::new();
        fees.add(&Currency::Sol, 7.5);
        fees.add(&Currency::Sol, 4.5);

        let swept = fees
            .sweep_amount(&ledger, &Currency::Sol, 7.5, "house", "founder")
            .await
            .unwrap();
        assert!(close(swept, 7.5));
        assert!(close(fees.total(&Currency::Sol), 4.5));
        assert!(close(ledger.balance("founder", &Currency::Sol), 7.5));

        // never takes more than the bucket holds
        assert!(close(fees.take_amount(&Currency::Sol, 100.0), 4.5));
        assert_eq!(fees.total(&Currency::Sol), 0.0);
    }

    #[tokio::test]
    async fn test_empty_sweep_skips_transfer() {
        let ledger = InMemoryLedger::new();
        ledger.set_offline(true);
        let fees = FeeLedger::new();
        assert_eq!(fees.sweep(&ledger, &Currency::Sol, "house", "founder").await.unwrap(), 0.0);
    }
}
