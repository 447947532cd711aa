//! Constants Module - Single Source of Truth
//!
//! Semua nilai default game (radius, quorum, fee, odds) didefinisikan di sini.
//! `GameConfig` membaca default dari modul ini; tidak ada angka ajaib di modul lain.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "GalacticHustlers";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outbound HTTP requests
pub const USER_AGENT: &str = "GalacticHustlers/0.1.0";

/// Default timeout for price lookups (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

// ============================================
// GEOFENCING
// ============================================

/// Mean Earth radius in statute miles (great-circle distance)
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Two games may not be registered within this distance of each other
pub const GAME_RADIUS_MILES: f64 = 50.0;

/// Radius of the halted play circle
pub const CIRCLE_RADIUS_MILES: f64 = 2.0;

/// A Worm still within this distance of home is disqualified
pub const HOME_RADIUS_MILES: f64 = 0.5;

/// Circle center jitter around the city origin, per axis (degrees)
pub const CIRCLE_JITTER_DEGREES: f64 = 0.5;

/// Probability that a single circle step freezes the center
pub const CIRCLE_HALT_PROBABILITY: f64 = 0.3;

/// Hard cap on circle steps before the center is force-frozen
pub const MAX_CIRCLE_STEPS: u32 = 64;

/// Simulated elapsed time per circle step (milliseconds, inclusive range)
pub const CIRCLE_STEP_DELAY_MIN_MS: u64 = 500;
pub const CIRCLE_STEP_DELAY_MAX_MS: u64 = 2_000;

// ============================================
// QUORUM & SCHEDULING
// ============================================

/// Minimum Worms before a race may leave the quorum check
pub const MIN_GALACTIC_WORMS: usize = 5;

/// Minimum Hustlers (with placed bets) before a race may leave the quorum check
pub const MIN_GALACTIC_HUSTLERS: usize = 5;

/// Races start on the next boundary of this interval (20 minutes)
pub const GAME_TIME_INTERVAL_SECS: i64 = 20 * 60;

// ============================================
// ECONOMY
// ============================================

/// Registration bonus paid out in the race asset, priced in USD
pub const INITIAL_BONUS_USD: f64 = 25.0;

/// Multiplier applied to base payouts when the Worm carries the NFT flag
pub const BONUS_MULTIPLIER_NFT: f64 = 1.03;

/// House fee taken from every wager before odds are applied
pub const FOUNDER_FEE_PERCENTAGE: f64 = 0.15;

/// Chance that a Worm inside the circle finishes first
pub const WIN_PROBABILITY: f64 = 0.5;

/// Lowest rank a finishing Worm can be assigned
pub const LAST_RANK: u8 = 5;

/// Fixed odds by finishing rank (index 0 = rank 1). Ranks past the table pay 0.
pub const PAYOUT_MULTIPLIERS: [f64; 3] = [2.0, 1.5, 1.2];

/// Collusion is flagged when two identities are fewer than this many hops apart
pub const COLLUSION_DISTANCE_THRESHOLD: usize = 3;

// ============================================
// IDENTITIES
// ============================================

/// Account that holds collected fees until they are swept
pub const DEFAULT_HOUSE_IDENTITY: &str = "GalacticHouseVault";

/// Account that receives swept fees
pub const DEFAULT_FOUNDER_IDENTITY: &str = "FounderWalletPublicKey";

/// Wrapped SOL mint, used to price native SOL
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

// ============================================
// HELPERS
// ============================================

/// Base payout multiplier for a finishing rank
#[inline]
pub fn payout_multiplier(rank: u8) -> f64 {
    match rank {
        1..=3 => PAYOUT_MULTIPLIERS[(rank - 1) as usize],
        _ => 0.0,
    }
}

/// Check if a string looks like a Solana address (base58, 32-44 chars, no 0x prefix)
pub fn is_solana_address(address: &str) -> bool {
    !address.starts_with("0x")
        && address.len() >= 32
        && address.len() <= 44
        && address.chars().all(|c| c.is_ascii_alphanumeric())
}
