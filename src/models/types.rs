//! Type definitions for Galactic Hustlers
//! Shared data structures for races, bets, and settlement

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::is_solana_address;

// ============================================
// Geography
// ============================================

/// A captured (latitude, longitude) snapshot in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Validated constructor: latitude in [-90, 90], longitude in [-180, 180]
    pub fn new(latitude: f64, longitude: f64) -> AppResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::invalid_location(format!(
                "Latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::invalid_location(format!(
                "Longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// Re-check a value that arrived through deserialization
    pub fn validate(&self) -> AppResult<()> {
        Self::new(self.latitude, self.longitude).map(|_| ())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// A location claimed by a running game
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredLocation {
    pub location: Location,
    pub owner: String,
    pub registered_at: DateTime<Utc>,
}

// ============================================
// Currency
// ============================================

/// Asset a wager is denominated in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Currency {
    /// Native SOL
    Sol,
    /// SPL token identified by its mint address
    Token { mint: String },
}

impl Currency {
    pub fn symbol(&self) -> &str {
        match self {
            Currency::Sol => "SOL",
            Currency::Token { mint } => mint.as_str(),
        }
    }

    /// Token mints must look like Solana addresses
    pub fn validate(&self) -> AppResult<()> {
        match self {
            Currency::Sol => Ok(()),
            Currency::Token { mint } if is_solana_address(mint) => Ok(()),
            Currency::Token { mint } => Err(AppError::new(
                ErrorCode::InvalidCurrency,
                format!("Token mint {:?} is not a Solana address", mint),
            )),
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Sol
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================
// Race lifecycle
// ============================================

/// Finishing position of a Worm for one race instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "rank", rename_all = "snake_case")]
pub enum RaceOutcome {
    /// Race not resolved yet
    Pending,
    /// Worm was outside the halted circle and never raced
    NotEntered,
    /// Worm stayed within the home radius
    Disqualified,
    /// Finishing rank, 1 is the winner
    Ranked(u8),
}

impl RaceOutcome {
    /// Terminal outcomes can no longer change for this race
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RaceOutcome::Pending)
    }

    pub fn rank(&self) -> Option<u8> {
        match self {
            RaceOutcome::Ranked(rank) => Some(*rank),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RaceOutcome::Pending => "PENDING",
            RaceOutcome::NotEntered => "NOT_ENTERED",
            RaceOutcome::Disqualified => "DISQUALIFIED",
            RaceOutcome::Ranked(_) => "RANKED",
        }
    }
}

/// Orchestrator states, driven strictly in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceState {
    Registered,
    QuorumCheck,
    CircleResolving,
    Racing,
    Settled,
}

impl RaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceState::Registered => "REGISTERED",
            RaceState::QuorumCheck => "QUORUM_CHECK",
            RaceState::CircleResolving => "CIRCLE_RESOLVING",
            RaceState::Racing => "RACING",
            RaceState::Settled => "SETTLED",
        }
    }

    /// Entries are accepted until the quorum check passes
    pub fn accepts_entries(&self) -> bool {
        matches!(self, RaceState::Registered | RaceState::QuorumCheck)
    }
}

/// Circle state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleState {
    Uninitialized,
    Wandering,
    Halted,
}

/// Whether a Hustler's wager actually moved through the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Placed,
    Rejected,
}

// ============================================
// Settlement
// ============================================

/// One Hustler's settlement line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub hustler_id: String,
    pub worm_id: String,
    pub currency: Currency,
    pub wager: f64,
    pub fee: f64,
    pub outcome: RaceOutcome,
    pub payout: f64,
}

/// Result of settling a whole race
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub race_id: Uuid,
    pub currency: Currency,
    pub records: Vec<SettlementRecord>,
    /// Fees added to the ledger by this race
    pub fees_collected: f64,
    /// This race's fees moved to the founder
    pub fees_swept: f64,
    pub total_payout: f64,
    pub settled_at: DateTime<Utc>,
}

impl SettlementReport {
    pub fn summary(&self) -> String {
        format!(
            "Race: {} | Bets: {} | Fees: {:.4} {} | Payouts: {:.4} {}",
            self.race_id,
            self.records.len(),
            self.fees_collected,
            self.currency,
            self.total_payout,
            self.currency
        )
    }
}
