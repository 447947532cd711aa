//! Centralized Error Handling Module
//!
//! Setiap kegagalan memiliki kode error yang unik, supaya log dan
//! response API bisa difilter tanpa parsing pesan.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - LEDGER_xxx: external ledger capability failures
//! - GAME_xxx: race, bet, and settlement rule violations
//! - PRICE_xxx: price oracle failures
//! - CFG_xxx: configuration errors
//! - API_xxx: API errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Shorthand for `self.code.is_retryable()`
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Ledger Errors (1xx)
    // ============================================
    /// Balance below the requested wager
    InsufficientBalance,
    /// External transfer was attempted and failed
    TransferFailed,
    /// Ledger service could not be reached
    LedgerUnavailable,

    // ============================================
    // Game Errors (2xx)
    // ============================================
    /// Another game is registered within the game radius
    LocationTooClose,
    /// Latitude/longitude out of range or not finite
    InvalidLocation,
    /// Wager is zero, negative, or not finite
    InvalidWager,
    /// Referenced Worm is not part of the race
    UnknownWorm,
    /// Hustler has no placed bet
    BetNotPlaced,
    /// Hustler was already settled for this race
    AlreadySettled,
    /// Worm outcome is already terminal
    AlreadyResolved,
    /// Operation not allowed in the current race state
    InvalidState,
    /// Identity already holds a live wager in another race
    WalletBusy,
    /// Wager currency differs from the race currency
    CurrencyMismatch,
    /// Token mint is not a Solana address
    InvalidCurrency,
    /// Race does not exist
    RaceNotFound,

    // ============================================
    // Price Oracle Errors (3xx)
    // ============================================
    /// No usable price for the asset
    PriceUnavailable,
    /// Price service returned an error response
    PriceServiceError,

    // ============================================
    // Configuration Errors (4xx)
    // ============================================
    /// Missing environment variable
    ConfigMissingEnv,
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // API Errors (5xx)
    // ============================================
    /// Invalid request format
    ApiBadRequest,
    /// Rate limit exceeded
    ApiRateLimited,
    /// Internal server error
    ApiInternalError,
    /// Resource not found
    ApiNotFound,

    // ============================================
    // External / Generic Errors (9xx)
    // ============================================
    /// External service timeout
    ExternalTimeout,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            // Ledger Errors
            Self::InsufficientBalance => "LEDGER_INSUFFICIENT_BALANCE",
            Self::TransferFailed => "LEDGER_TRANSFER_FAILED",
            Self::LedgerUnavailable => "LEDGER_UNAVAILABLE",

            // Game Errors
            Self::LocationTooClose => "GAME_LOCATION_TOO_CLOSE",
            Self::InvalidLocation => "GAME_INVALID_LOCATION",
            Self::InvalidWager => "GAME_INVALID_WAGER",
            Self::UnknownWorm => "GAME_UNKNOWN_WORM",
            Self::BetNotPlaced => "GAME_BET_NOT_PLACED",
            Self::AlreadySettled => "GAME_ALREADY_SETTLED",
            Self::AlreadyResolved => "GAME_ALREADY_RESOLVED",
            Self::InvalidState => "GAME_INVALID_STATE",
            Self::WalletBusy => "GAME_WALLET_BUSY",
            Self::CurrencyMismatch => "GAME_CURRENCY_MISMATCH",
            Self::InvalidCurrency => "GAME_INVALID_CURRENCY",
            Self::RaceNotFound => "GAME_RACE_NOT_FOUND",

            // Price Errors
            Self::PriceUnavailable => "PRICE_UNAVAILABLE",
            Self::PriceServiceError => "PRICE_SERVICE_ERROR",

            // Configuration Errors
            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            // API Errors
            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiRateLimited => "API_RATE_LIMITED",
            Self::ApiInternalError => "API_INTERNAL_ERROR",
            Self::ApiNotFound => "API_NOT_FOUND",

            // Generic
            Self::ExternalTimeout => "EXTERNAL_TIMEOUT",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest
            | Self::InvalidLocation
            | Self::InvalidWager
            | Self::UnknownWorm
            | Self::CurrencyMismatch
            | Self::InvalidCurrency
            | Self::ConfigInvalidValue => 400,
            Self::InsufficientBalance => 402,
            Self::ApiNotFound | Self::RaceNotFound => 404,
            Self::LocationTooClose
            | Self::AlreadySettled
            | Self::AlreadyResolved
            | Self::InvalidState
            | Self::WalletBusy
            | Self::BetNotPlaced => 409,
            Self::ApiRateLimited => 429,
            Self::TransferFailed | Self::PriceServiceError => 502,
            Self::LedgerUnavailable | Self::PriceUnavailable => 503,
            Self::ExternalTimeout => 504,
            _ => 500,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransferFailed
                | Self::LedgerUnavailable
                | Self::PriceUnavailable
                | Self::PriceServiceError
                | Self::ExternalTimeout
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Balance below wager
    pub fn insufficient_balance(identity: &str, balance: f64, wager: f64) -> Self {
        Self::new(
            ErrorCode::InsufficientBalance,
            format!(
                "{} has balance {:.6}, wager requires {:.6}",
                identity, balance, wager
            ),
        )
    }

    /// External transfer failed
    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransferFailed, msg)
    }

    /// Ledger unreachable
    pub fn ledger_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::LedgerUnavailable, msg)
    }

    /// Registration within the game radius of an existing game
    pub fn location_too_close(distance_miles: f64, radius_miles: f64) -> Self {
        Self::new(
            ErrorCode::LocationTooClose,
            format!(
                "Existing game {:.2} miles away (minimum separation {:.2} miles)",
                distance_miles, radius_miles
            ),
        )
    }

    /// Coordinates out of range
    pub fn invalid_location(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidLocation, msg)
    }

    /// Bad wager amount
    pub fn invalid_wager(amount: f64) -> Self {
        Self::new(
            ErrorCode::InvalidWager,
            format!("Wager must be positive and finite, got {}", amount),
        )
    }

    /// Worm id not in race
    pub fn unknown_worm(worm_id: &str) -> Self {
        Self::new(ErrorCode::UnknownWorm, format!("Unknown worm: {}", worm_id))
    }

    /// Operation in the wrong state
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, msg)
    }

    /// Price oracle has no price
    pub fn price_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PriceUnavailable, msg)
    }

    /// Invalid configuration value
    pub fn config_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// API bad request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    /// API not found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiNotFound, msg)
    }

    /// API internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ExternalTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::PriceServiceError, "Connection failed")
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::PriceServiceError, "JSON parse error", err)
    }
}
