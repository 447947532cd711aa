//! Configuration module for Galactic Hustlers
//!
//! Semua tunable game ada di `GameConfig`. Default diambil dari
//! utils/constants.rs, lalu bisa di-override lewat environment `GH_*`.

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::{
    BONUS_MULTIPLIER_NFT, CIRCLE_HALT_PROBABILITY, CIRCLE_JITTER_DEGREES, CIRCLE_RADIUS_MILES,
    CIRCLE_STEP_DELAY_MAX_MS, CIRCLE_STEP_DELAY_MIN_MS, COLLUSION_DISTANCE_THRESHOLD,
    DEFAULT_FOUNDER_IDENTITY, DEFAULT_HOUSE_IDENTITY, FOUNDER_FEE_PERCENTAGE, GAME_RADIUS_MILES,
    GAME_TIME_INTERVAL_SECS, HOME_RADIUS_MILES, INITIAL_BONUS_USD, MAX_CIRCLE_STEPS,
    MIN_GALACTIC_HUSTLERS, MIN_GALACTIC_WORMS,
};

/// Game-wide tunables
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Minimum separation between registered games (miles)
    pub game_radius_miles: f64,
    /// Radius of the halted circle (miles)
    pub circle_radius_miles: f64,
    /// Worms closer than this to home are disqualified (miles)
    pub home_radius_miles: f64,
    /// Circle center jitter around the origin, per axis (degrees)
    pub circle_jitter_degrees: f64,
    /// Chance each circle step freezes the center
    pub circle_halt_probability: f64,
    /// Circle steps before the center is force-frozen
    pub max_circle_steps: u32,
    /// Simulated elapsed time per circle step (ms)
    pub circle_step_delay_min_ms: u64,
    pub circle_step_delay_max_ms: u64,
    /// Quorum minimums
    pub min_worms: usize,
    pub min_hustlers: usize,
    /// Start time alignment (seconds)
    pub game_interval_secs: i64,
    /// House fee fraction taken from every wager
    pub founder_fee_percentage: f64,
    /// Payout multiplier for NFT-flagged Worms
    pub nft_bonus_multiplier: f64,
    /// Registration bonus in USD
    pub initial_bonus_usd: f64,
    /// Hop count below which two identities are flagged
    pub collusion_distance_threshold: usize,
    /// Fee sweep source account
    pub house_identity: String,
    /// Fee sweep destination account
    pub founder_identity: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            game_radius_miles: GAME_RADIUS_MILES,
            circle_radius_miles: CIRCLE_RADIUS_MILES,
            home_radius_miles: HOME_RADIUS_MILES,
            circle_jitter_degrees: CIRCLE_JITTER_DEGREES,
            circle_halt_probability: CIRCLE_HALT_PROBABILITY,
            max_circle_steps: MAX_CIRCLE_STEPS,
            circle_step_delay_min_ms: CIRCLE_STEP_DELAY_MIN_MS,
            circle_step_delay_max_ms: CIRCLE_STEP_DELAY_MAX_MS,
            min_worms: MIN_GALACTIC_WORMS,
            min_hustlers: MIN_GALACTIC_HUSTLERS,
            game_interval_secs: GAME_TIME_INTERVAL_SECS,
            founder_fee_percentage: FOUNDER_FEE_PERCENTAGE,
            nft_bonus_multiplier: BONUS_MULTIPLIER_NFT,
            initial_bonus_usd: INITIAL_BONUS_USD,
            collusion_distance_threshold: COLLUSION_DISTANCE_THRESHOLD,
            house_identity: DEFAULT_HOUSE_IDENTITY.to_string(),
            founder_identity: DEFAULT_FOUNDER_IDENTITY.to_string(),
        }
    }
}

/// Read an env var and parse it, keeping the default when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("⚠️ {} has unparseable value {:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl GameConfig {
    /// Defaults overridden by `GH_*` environment variables, then validated
    pub fn from_env() -> AppResult<Self> {
        let d = Self::default();
        let config = Self {
            game_radius_miles: env_or("GH_GAME_RADIUS_MILES", d.game_radius_miles),
            circle_radius_miles: env_or("GH_CIRCLE_RADIUS_MILES", d.circle_radius_miles),
            home_radius_miles: env_or("GH_HOME_RADIUS_MILES", d.home_radius_miles),
            circle_jitter_degrees: env_or("GH_CIRCLE_JITTER_DEGREES", d.circle_jitter_degrees),
            circle_halt_probability: env_or("GH_CIRCLE_HALT_PROBABILITY", d.circle_halt_probability),
            max_circle_steps: env_or("GH_MAX_CIRCLE_STEPS", d.max_circle_steps),
            circle_step_delay_min_ms: env_or("GH_CIRCLE_STEP_DELAY_MIN_MS", d.circle_step_delay_min_ms),
            circle_step_delay_max_ms: env_or("GH_CIRCLE_STEP_DELAY_MAX_MS", d.circle_step_delay_max_ms),
            min_worms: env_or("GH_MIN_WORMS", d.min_worms),
            min_hustlers: env_or("GH_MIN_HUSTLERS", d.min_hustlers),
            game_interval_secs: env_or("GH_GAME_INTERVAL_SECS", d.game_interval_secs),
            founder_fee_percentage: env_or("GH_FOUNDER_FEE_PERCENTAGE", d.founder_fee_percentage),
            nft_bonus_multiplier: env_or("GH_NFT_BONUS_MULTIPLIER", d.nft_bonus_multiplier),
            initial_bonus_usd: env_or("GH_INITIAL_BONUS_USD", d.initial_bonus_usd),
            collusion_distance_threshold: env_or(
                "GH_COLLUSION_DISTANCE_THRESHOLD",
                d.collusion_distance_threshold,
            ),
            house_identity: std::env::var("GH_HOUSE_IDENTITY").unwrap_or(d.house_identity),
            founder_identity: std::env::var("GH_FOUNDER_IDENTITY").unwrap_or(d.founder_identity),
        };

        config.validate()?;
        info!(
            "⚙️ Game config loaded: quorum {}w/{}h, circle {}mi, fee {:.1}%",
            config.min_worms,
            config.min_hustlers,
            config.circle_radius_miles,
            config.founder_fee_percentage * 100.0
        );
        Ok(config)
    }

    /// Reject values the game rules cannot work with
    pub fn validate(&self) -> AppResult<()> {
        let positive = [
            ("game_radius_miles", self.game_radius_miles),
            ("circle_radius_miles", self.circle_radius_miles),
            ("home_radius_miles", self.home_radius_miles),
            ("circle_jitter_degrees", self.circle_jitter_degrees),
            ("nft_bonus_multiplier", self.nft_bonus_multiplier),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::config_invalid(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let fractions = [
            ("circle_halt_probability", self.circle_halt_probability),
            ("founder_fee_percentage", self.founder_fee_percentage),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::config_invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.circle_step_delay_min_ms > self.circle_step_delay_max_ms {
            return Err(AppError::config_invalid(format!(
                "circle step delay range inverted: {}..={}",
                self.circle_step_delay_min_ms, self.circle_step_delay_max_ms
            )));
        }
        if self.max_circle_steps == 0 {
            return Err(AppError::config_invalid("max_circle_steps must be at least 1"));
        }
        if self.game_interval_secs <= 0 {
            return Err(AppError::config_invalid("game_interval_secs must be positive"));
        }
        if !self.initial_bonus_usd.is_finite() || self.initial_bonus_usd < 0.0 {
            return Err(AppError::config_invalid("initial_bonus_usd must be non-negative"));
        }
        if self.house_identity.is_empty() || self.founder_identity.is_empty() {
            return Err(AppError::config_invalid("house and founder identities are required"));
        }
        Ok(())
    }

    /// Same config with circle stepping made instantaneous
    pub fn without_step_delay(mut self) -> Self {
        self.circle_step_delay_min_ms = 0;
        self.circle_step_delay_max_ms = 0;
        self
    }

    /// Per-step delay range
    pub fn step_delay_range(&self) -> RangeInclusive<u64> {
        self.circle_step_delay_min_ms..=self.circle_step_delay_max_ms
    }

    /// Longest a circle resolution may sleep in total
    pub fn max_circle_duration(&self) -> Duration {
        Duration::from_millis(self.circle_step_delay_max_ms.saturating_mul(self.max_circle_steps as u64))
    }
}
