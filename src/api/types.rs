//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::core::RaceSnapshot;
use crate::models::errors::AppError;
use crate::models::types::{Currency, RaceState, RegisteredLocation};

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Set when the same request may succeed if retried
    pub retryable: bool,
}

impl ApiError {
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "API_RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            retryable: true,
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            retryable: err.is_retryable(),
        }
    }
}

// ============================================
// Locations
// ============================================

#[derive(Debug, Deserialize)]
pub struct RegisterLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub owner: String,
}

#[derive(Debug, Serialize)]
pub struct LocationsData {
    pub total: usize,
    pub locations: Vec<RegisteredLocation>,
}

// ============================================
// Players & Ledger
// ============================================

#[derive(Debug, Deserialize)]
pub struct RegisterPlayerRequest {
    pub identity: String,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Serialize)]
pub struct RegisterPlayerData {
    pub identity: String,
    pub currency: Currency,
    /// Registration bonus credited, in asset units
    pub bonus: f64,
    pub balance: f64,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub identity: String,
    pub amount: f64,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Serialize)]
pub struct BalanceData {
    pub identity: String,
    pub currency: Currency,
    pub balance: f64,
}

// ============================================
// Races
// ============================================

#[derive(Debug, Deserialize)]
pub struct CreateRaceRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub owner: String,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Deserialize)]
pub struct AddWormRequest {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub home_latitude: f64,
    pub home_longitude: f64,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub nft_bonus: bool,
}

#[derive(Debug, Deserialize)]
pub struct EnterHustlerRequest {
    pub id: String,
    pub wager: f64,
    pub worm_id: String,
    /// Defaults to the race currency
    #[serde(default)]
    pub currency: Option<Currency>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RunRaceRequest {
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RunRaceData {
    pub state: RaceState,
    /// False when the race parked at quorum check
    pub settled: bool,
    pub race: RaceSnapshot,
}

// ============================================
// Collusion
// ============================================

#[derive(Debug, Deserialize)]
pub struct IdentityPair {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Serialize)]
pub struct CommunicationData {
    /// False when the edge already existed (or a == b)
    pub recorded: bool,
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Debug, Serialize)]
pub struct CollusionCheckData {
    pub a: String,
    pub b: String,
    pub flagged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<usize>,
    pub threshold: usize,
}

// ============================================
// Stats / Telemetry
// ============================================

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub races_created: u64,
    pub races_settled: u64,
    pub races_halted_quorum: u64,
    pub bets_placed: u64,
    pub bets_rejected: u64,
    pub fees_swept: f64,
    pub total_payout: f64,
    pub collusion_flags: u64,
    pub races_tracked: usize,
    pub uptime_seconds: u64,
    pub api_version: String,
}

// ============================================
// Health Check
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}
