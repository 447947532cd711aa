//! Galactic Worm entity
//!
//! A Worm is one race participant with a live location and a home location.
//! Its outcome is set exactly once per race instance.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{Location, RaceOutcome};
use crate::utils::constants::{LAST_RANK, WIN_PROBABILITY};
use crate::utils::geo::distance_miles;

/// Race participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worm {
    pub id: String,
    /// Location snapshot at race time
    pub location: Location,
    pub home: Location,
    /// Display color or skin
    pub display: String,
    /// Owner holds a Galactic Worm NFT
    #[serde(default)]
    pub nft_bonus: bool,
    #[serde(default = "pending")]
    outcome: RaceOutcome,
}

fn pending() -> RaceOutcome {
    RaceOutcome::Pending
}

impl Worm {
    pub fn new(id: impl Into<String>, location: Location, home: Location) -> Self {
        Self {
            id: id.into(),
            location,
            home,
            display: String::new(),
            nft_bonus: false,
            outcome: RaceOutcome::Pending,
        }
    }

    /// Builder: set display attribute
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }

    /// Builder: flag NFT ownership
    pub fn with_nft_bonus(mut self, nft_bonus: bool) -> Self {
        self.nft_bonus = nft_bonus;
        self
    }

    pub fn outcome(&self) -> RaceOutcome {
        self.outcome
    }

    /// Anti-farming rule: a Worm lingering at its origin cannot race
    pub fn is_near_home(&self, home_radius_miles: f64) -> bool {
        distance_miles(&self.location, &self.home) <= home_radius_miles
    }

    /// Assign the finishing position
    ///
    /// The home check runs first and, when it disqualifies, the RNG is never
    /// touched. Otherwise one uniform draw: rank 1 with probability 0.5,
    /// else a uniform rank in 2..=5.
    pub fn resolve_outcome<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        home_radius_miles: f64,
    ) -> AppResult<RaceOutcome> {
        self.ensure_pending()?;

        if self.is_near_home(home_radius_miles) {
            self.outcome = RaceOutcome::Disqualified;
            info!("🏠 Worm {} disqualified (within {} mi of home)", self.id, home_radius_miles);
            return Ok(self.outcome);
        }

        let draw: f64 = rng.gen();
        let rank = if draw < WIN_PROBABILITY {
            1
        } else {
            rng.gen_range(2..=LAST_RANK)
        };
        self.outcome = RaceOutcome::Ranked(rank);
        debug!(worm = %self.id, rank, "Worm finished");
        Ok(self.outcome)
    }

    /// Mark a Worm that was outside the halted circle
    pub fn mark_not_entered(&mut self) -> AppResult<()> {
        self.ensure_pending()?;
        self.outcome = RaceOutcome::NotEntered;
        debug!(worm = %self.id, "Worm outside circle, not entered");
        Ok(())
    }

    /// NFT bonus, applied once to a base payout
    pub fn apply_ownership_bonus(&self, amount: f64, multiplier: f64) -> f64 {
        if self.nft_bonus {
            amount * multiplier
        } else {
            amount
        }
    }

    fn ensure_pending(&self) -> AppResult<()> {
        if self.outcome.is_terminal() {
            return Err(AppError::new(
                ErrorCode::AlreadyResolved,
                format!("Worm {} already resolved as {}", self.id, self.outcome.as_str()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    /// RNG that fails the test if it is consulted at all
    struct UntouchableRng;

    impl RngCore for UntouchableRng {
        fn next_u32(&mut self) -> u32 {
            panic!("rng consulted")
        }
        fn next_u64(&mut self) -> u64 {
            panic!("rng consulted")
        }
        fn fill_bytes(&mut self, _dest: &mut [u8]) {
            panic!("rng consulted")
        }
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            panic!("rng consulted")
        }
    }

    fn home() -> Location {
        Location::new(40.0, -75.0).unwrap()
    }

    fn far_from_home() -> Location {
        // ~6.9 miles north
        Location::new(40.1, -75.0).unwrap()
    }

    #[test]
    fn test_near_home_disqualified_without_rng() {
        let mut worm = Worm::new("w1", Location::new(40.001, -75.0).unwrap(), home());
        assert!(worm.is_near_home(0.5));

        let outcome = worm.resolve_outcome(&mut UntouchableRng, 0.5).unwrap();
        assert_eq!(outcome, RaceOutcome::Disqualified);
    }

    #[test]
    fn test_ranks_within_table() {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut wins = 0;
        for i in 0..2_000 {
            let mut worm = Worm::new(format!("w{}", i), far_from_home(), home());
            match worm.resolve_outcome(&mut rng, 0.5).unwrap() {
                RaceOutcome::Ranked(1) => wins += 1,
                RaceOutcome::Ranked(r) => assert!((2..=5).contains(&r)),
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        // 50% win chance, generous band
        assert!((850..=1150).contains(&wins), "wins = {}", wins);
    }

    #[test]
    fn test_outcome_is_terminal() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut worm = Worm::new("w1", far_from_home(), home());
        worm.resolve_outcome(&mut rng, 0.5).unwrap();

        let err = worm.resolve_outcome(&mut rng, 0.5).unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyResolved);
        assert!(worm.mark_not_entered().is_err());
    }

    #[test]
    fn test_not_entered_is_distinct_from_disqualified() {
        let mut worm = Worm::new("w1", far_from_home(), home());
        worm.mark_not_entered().unwrap();
        assert_eq!(worm.outcome(), RaceOutcome::NotEntered);
        assert_ne!(worm.outcome(), RaceOutcome::Disqualified);
    }

    #[test]
    fn test_ownership_bonus() {
        let plain = Worm::new("w1", far_from_home(), home());
        let nft = Worm::new("w2", far_from_home(), home()).with_nft_bonus(true);
        assert_eq!(plain.apply_ownership_bonus(170.0, 1.03), 170.0);
        assert!((nft.apply_ownership_bonus(170.0, 1.03) - 175.1).abs() < 1e-9);
    }
}
