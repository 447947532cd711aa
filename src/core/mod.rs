//! Core Module - Game Rules & Race State Machine
//!
//! Otak aplikasi: circle, worm, hustler, settlement, collusion, orchestrator.
//! Semua aturan permainan ada di sini; I/O hanya lewat trait di `providers`.

pub mod circle;
pub mod collusion;
pub mod hustler;
pub mod orchestrator;
pub mod settlement;
pub mod worm;

pub use circle::Circle;
pub use collusion::CollusionGraph;
pub use hustler::Hustler;
pub use orchestrator::{CircleSnapshot, GalacticRace, GameContext, RaceSnapshot};
pub use settlement::{compute_payout, FeeLedger, PayoutBreakdown};
pub use worm::Worm;
