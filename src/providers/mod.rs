//! Providers Module - External Capabilities
//!
//! Jalur data: ledger (balance + transfer) dan price oracle (DexScreener).

pub mod dexscreener;
pub mod ledger;
pub mod price;

pub use dexscreener::DexScreenerClient;
pub use ledger::{InMemoryLedger, Ledger, TransferRecord};
pub use price::{FixedPriceOracle, PriceOracle};
