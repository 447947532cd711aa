//! Circle State Machine
//!
//! The play zone wanders around the city origin and freezes at a random
//! step. Eligibility is only evaluated once the center is frozen, so no
//! participant can pre-position against the final center.
//!
//! States: `Uninitialized -> Wandering -> Halted` (terminal per race).
//!
//! - Each step re-draws the center uniformly within +/- jitter degrees of the
//!   ORIGIN along each axis, never relative to the prior center.
//! - After the move the circle halts with probability `p_halt`.
//! - Stepping is bounded by `max_steps`; hitting the bound freezes the
//!   current center.

use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::config::GameConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{CircleState, Location};
use crate::utils::geo::distance_miles;

/// Randomly positioned, randomly timed eligibility zone
#[derive(Debug, Clone)]
pub struct Circle {
    origin: Location,
    center: Option<Location>,
    state: CircleState,
    steps: u32,
    radius_miles: f64,
    jitter_degrees: f64,
    halt_probability: f64,
    max_steps: u32,
}

impl Circle {
    /// Fails with `CFG_INVALID_VALUE` when `config` does not validate
    pub fn new(origin: Location, config: &GameConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            origin,
            center: None,
            state: CircleState::Uninitialized,
            steps: 0,
            radius_miles: config.circle_radius_miles,
            jitter_degrees: config.circle_jitter_degrees,
            halt_probability: config.circle_halt_probability,
            max_steps: config.max_circle_steps,
        })
    }

    pub fn origin(&self) -> Location {
        self.origin
    }

    pub fn center(&self) -> Option<Location> {
        self.center
    }

    pub fn state(&self) -> CircleState {
        self.state
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn radius_miles(&self) -> f64 {
        self.radius_miles
    }

    /// True once the center is frozen
    pub fn is_active(&self) -> bool {
        self.state == CircleState::Halted
    }

    /// Move the center once, then maybe halt
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> AppResult<CircleState> {
        match self.state {
            CircleState::Halted => {
                return Err(AppError::invalid_state("Circle center is frozen for this race"));
            }
            CircleState::Uninitialized => {
                self.state = CircleState::Wandering;
            }
            CircleState::Wandering => {}
        }

        let j = self.jitter_degrees;
        let latitude = (self.origin.latitude + rng.gen_range(-j..=j)).clamp(-90.0, 90.0);
        let longitude = wrap_longitude(self.origin.longitude + rng.gen_range(-j..=j));
        let center = Location { latitude, longitude };
        self.center = Some(center);
        self.steps += 1;

        debug!(step = self.steps, center = %center, "Circle moved");

        if rng.gen_bool(self.halt_probability) {
            self.state = CircleState::Halted;
            info!("🎯 Circle halted at {} after {} steps", center, self.steps);
        } else if self.steps >= self.max_steps {
            self.state = CircleState::Halted;
            warn!(
                "⏱️ Circle hit the {}-step bound, freezing center at {}",
                self.max_steps, center
            );
        }

        Ok(self.state)
    }

    /// Step until halted, sleeping a random delay before each step
    ///
    /// The sleep is a `tokio` timer, so other races keep settling while a
    /// circle wanders. Returns the frozen center.
    pub async fn resolve<R: Rng + Send>(
        &mut self,
        rng: &mut R,
        config: &GameConfig,
    ) -> AppResult<Location> {
        while !self.is_active() {
            let delay_ms = rng.gen_range(config.step_delay_range());
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            self.step(rng)?;
        }

        self.center
            .ok_or_else(|| AppError::internal("Halted circle has no center"))
    }

    /// True iff halted and `loc` lies within the circle radius of the center
    pub fn contains_point(&self, loc: &Location) -> bool {
        if self.state != CircleState::Halted {
            return false;
        }
        match &self.center {
            Some(center) => distance_miles(center, loc) <= self.radius_miles,
            None => false,
        }
    }
}

/// Map any longitude back into [-180, 180)
fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}
