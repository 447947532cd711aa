//! Galactic Hustlers Library
//!
//! Location-gated racing game engine:
//! - Galactic Worms race inside a randomly wandering, randomly halting circle
//! - Hustlers wager on Worms at fixed odds against the house
//! - A founder fee is taken from every wager and swept to the founder wallet
//! - A communication graph flags suspiciously close participants

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    Circle, CollusionGraph, FeeLedger, GalacticRace, GameContext, Hustler, RaceSnapshot, Worm,
};
pub use models::{AppError, AppResult, Currency, ErrorCode, GameConfig, Location, RaceOutcome, RaceState};
pub use providers::{DexScreenerClient, FixedPriceOracle, InMemoryLedger, Ledger, PriceOracle};
pub use utils::{distance_miles, GameTelemetry, GameTelemetryStats};
