//! DexScreener API Client - live USD prices for Solana assets
//!
//! ✅ USED FOR:
//! - Converting the USD registration bonus into SOL / token units
//!
//! ❌ NOT USED FOR:
//! - Settlement arithmetic (settlement is denominated in the wager asset)
//!
//! DexScreener lags 5-30 seconds behind the chain, which is fine for a
//! one-off bonus conversion at registration time.
//!
//! API: https://api.dexscreener.com/latest/dex/tokens/{tokenAddress}
//! Free, no API key required

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::price::PriceOracle;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::Currency;
use crate::utils::constants::{DEFAULT_HTTP_TIMEOUT_SECS, USER_AGENT, WRAPPED_SOL_MINT};

/// DexScreener chain name for Solana pairs
const SOLANA_CHAIN: &str = "solana";

/// DexScreener API response
#[derive(Debug, Deserialize)]
pub struct DexScreenerResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

/// A trading pair from DexScreener
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    /// Chain ID (e.g., "solana")
    pub chain_id: String,
    /// DEX identifier (e.g., "raydium", "orca")
    pub dex_id: String,
    pub pair_address: String,
    pub base_token: DexToken,
    pub quote_token: DexToken,
    pub liquidity: Option<DexLiquidity>,
    /// Price in USD, as a decimal string
    pub price_usd: Option<String>,
}

impl DexPair {
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    /// Parsed USD price of the base token, if positive
    pub fn price(&self) -> Option<f64> {
        self.price_usd
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexLiquidity {
    pub usd: Option<f64>,
}

/// DexScreener API client
pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for DexScreenerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DexScreenerClient {
    pub fn new() -> Self {
        Self::with_base_url("https://api.dexscreener.com/latest/dex")
    }

    /// Point the client at another host (mirror or local stub)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .gzip(true)
            .build()
            .unwrap_or_else(|e| {
                warn!("⚠️ Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Mint address used to price a currency
    pub fn mint_for(currency: &Currency) -> &str {
        match currency {
            Currency::Sol => WRAPPED_SOL_MINT,
            Currency::Token { mint } => mint.as_str(),
        }
    }

    /// Fetch Solana pairs for a mint, sorted by liquidity (highest first)
    pub async fn get_token_pairs(&self, mint: &str) -> AppResult<Vec<DexPair>> {
        let url = format!("{}/tokens/{}", self.base_url, mint);

        info!("🔍 DexScreener: Fetching pairs for {}", mint);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::new(
                ErrorCode::PriceServiceError,
                format!("DexScreener API error: {}", response.status()),
            ));
        }

        let data: DexScreenerResponse = response.json().await?;
        let pairs = Self::rank_pairs(mint, data.pairs.unwrap_or_default());

        info!("📊 DexScreener: Found {} Solana pairs", pairs.len());

        Ok(pairs)
    }

    /// Keep Solana pairs where `mint` is the base token, best liquidity first
    fn rank_pairs(mint: &str, pairs: Vec<DexPair>) -> Vec<DexPair> {
        let mut pairs: Vec<DexPair> = pairs
            .into_iter()
            .filter(|p| p.chain_id.eq_ignore_ascii_case(SOLANA_CHAIN))
            .filter(|p| p.base_token.address == mint)
            .collect();

        pairs.sort_by(|a, b| {
            b.liquidity_usd()
                .partial_cmp(&a.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs
    }
}

impl PriceOracle for DexScreenerClient {
    async fn current_price(&self, currency: &Currency) -> AppResult<f64> {
        let mint = Self::mint_for(currency);
        let pairs = self.get_token_pairs(mint).await?;

        pairs
            .iter()
            .find_map(|p| p.price())
            .ok_or_else(|| AppError::price_unavailable(format!("No priced pair for {}", currency)))
    }
}
