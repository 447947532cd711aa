//! Hustler entity
//!
//! A Hustler wagers on one Worm (by id, non-owning). The bet moves through
//! the external ledger once; settlement runs at most once per race.

use serde::Serialize;
use tracing::{info, warn};

use super::settlement::{compute_payout, FeeLedger};
use super::worm::Worm;
use crate::models::config::GameConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{BetStatus, Currency, SettlementRecord};
use crate::providers::ledger::Ledger;

/// Wagering participant
#[derive(Debug, Clone, Serialize)]
pub struct Hustler {
    pub id: String,
    pub wager: f64,
    /// Wagered-on Worm
    pub worm_id: String,
    pub currency: Currency,
    payout: f64,
    bet_status: BetStatus,
    settled: bool,
}

impl Hustler {
    pub fn new(
        id: impl Into<String>,
        wager: f64,
        worm_id: impl Into<String>,
        currency: Currency,
    ) -> AppResult<Self> {
        if !wager.is_finite() || wager <= 0.0 {
            return Err(AppError::invalid_wager(wager));
        }
        currency.validate()?;
        Ok(Self {
            id: id.into(),
            wager,
            worm_id: worm_id.into(),
            currency,
            payout: 0.0,
            bet_status: BetStatus::Pending,
            settled: false,
        })
    }

    pub fn payout(&self) -> f64 {
        self.payout
    }

    pub fn bet_status(&self) -> BetStatus {
        self.bet_status
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Check the balance, then transfer the wager to the Worm
    ///
    /// - balance below wager: `LEDGER_INSUFFICIENT_BALANCE`, nothing moves,
    ///   the bet is marked rejected
    /// - ledger down or transfer refused: the ledger error propagates and the
    ///   bet stays pending, so the caller can retry
    pub async fn place_bet<L: Ledger>(&mut self, ledger: &L) -> AppResult<()> {
        if self.bet_status == BetStatus::Placed {
            return Err(AppError::invalid_state(format!(
                "Hustler {} already placed a bet",
                self.id
            )));
        }

        let balance = ledger.query_balance(&self.id, &self.currency).await?;
        if balance < self.wager {
            self.bet_status = BetStatus::Rejected;
            warn!(
                "🚫 Bet rejected: {} holds {:.6} {}, wager {:.6}",
                self.id, balance, self.currency, self.wager
            );
            return Err(AppError::insufficient_balance(&self.id, balance, self.wager));
        }

        ledger
            .transfer(&self.id, &self.worm_id, self.wager, &self.currency)
            .await?;

        self.bet_status = BetStatus::Placed;
        info!(
            "🎲 Bet placed: {} wagered {:.6} {} on {}",
            self.id, self.wager, self.currency, self.worm_id
        );
        Ok(())
    }

    /// Settle against the wagered-on Worm's outcome
    ///
    /// Adds the fee to `fees`, stores and returns the payout. A second call
    /// fails with `GAME_ALREADY_SETTLED` and leaves the fee ledger untouched.
    pub fn settle(&mut self, worm: &Worm, fees: &FeeLedger, config: &GameConfig) -> AppResult<f64> {
        self.settle_record(worm, fees, config).map(|r| r.payout)
    }

    /// [`Hustler::settle`], returning the full settlement line
    pub fn settle_record(
        &mut self,
        worm: &Worm,
        fees: &FeeLedger,
        config: &GameConfig,
    ) -> AppResult<SettlementRecord> {
        if self.settled {
            return Err(AppError::new(
                ErrorCode::AlreadySettled,
                format!("Hustler {} was already settled", self.id),
            ));
        }
        if self.bet_status != BetStatus::Placed {
            return Err(AppError::new(
                ErrorCode::BetNotPlaced,
                format!("Hustler {} has no placed bet", self.id),
            ));
        }
        if worm.id != self.worm_id {
            return Err(AppError::unknown_worm(&worm.id));
        }
        let outcome = worm.outcome();
        if !outcome.is_terminal() {
            return Err(AppError::invalid_state(format!(
                "Worm {} has not finished",
                worm.id
            )));
        }

        let breakdown = compute_payout(
            self.wager,
            outcome,
            worm.nft_bonus,
            config.founder_fee_percentage,
            config.nft_bonus_multiplier,
        );
        fees.add(&self.currency, breakdown.fee);
        self.payout = breakdown.payout;
        self.settled = true;

        Ok(SettlementRecord {
            hustler_id: self.id.clone(),
            worm_id: self.worm_id.clone(),
            currency: self.currency.clone(),
            wager: self.wager,
            fee: breakdown.fee,
            outcome,
            payout: breakdown.payout,
        })
    }
}
