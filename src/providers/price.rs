//! Price oracle capability
//!
//! Only used to convert the USD registration bonus into asset units.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Currency;

/// Live price source, USD per unit of asset
pub trait PriceOracle: Send + Sync {
    /// Always positive on success
    fn current_price(&self, currency: &Currency) -> impl Future<Output = AppResult<f64>> + Send;
}

impl<P: PriceOracle> PriceOracle for Arc<P> {
    fn current_price(&self, currency: &Currency) -> impl Future<Output = AppResult<f64>> + Send {
        self.as_ref().current_price(currency)
    }
}

/// Fixed price table (simulation and tests)
#[derive(Default)]
pub struct FixedPriceOracle {
    prices: DashMap<Currency, f64>,
}

impl FixedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set one price
    pub fn with_price(self, currency: Currency, usd_per_unit: f64) -> Self {
        self.prices.insert(currency, usd_per_unit);
        self
    }

    pub fn set_price(&self, currency: Currency, usd_per_unit: f64) {
        self.prices.insert(currency, usd_per_unit);
    }
}

impl PriceOracle for FixedPriceOracle {
    async fn current_price(&self, currency: &Currency) -> AppResult<f64> {
        match self.prices.get(currency).map(|p| *p) {
            Some(price) if price.is_finite() && price > 0.0 => Ok(price),
            Some(price) => Err(AppError::price_unavailable(format!(
                "Configured price for {} is not positive: {}",
                currency, price
            ))),
            None => Err(AppError::price_unavailable(format!("No price for {}", currency))),
        }
    }
}
