//! Telemetry Module for Galactic Hustlers
//!
//! Anonymous game counters for:
//! - Operator reports ("12 races settled, 3 halted at quorum")
//! - Spotting rejected-bet spikes (ledger trouble)
//! - Collusion monitoring
//!
//! Privacy-first: no wallet identities are stored, only counts and totals

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Aggregated statistics for reporting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameTelemetryStats {
    pub races_created: u64,
    pub races_settled: u64,
    /// Quorum checks that came back short
    pub races_halted_quorum: u64,
    pub bets_placed: u64,
    pub bets_rejected: u64,
    /// Total fee amount moved to the founder, all currencies summed
    pub fees_swept: f64,
    pub total_payout: f64,
    pub collusion_flags: u64,
    pub period_start: u64,
    pub period_end: u64,
}

impl GameTelemetryStats {
    /// Share of bet attempts that were rejected, in percent
    pub fn rejection_rate(&self) -> f64 {
        let attempts = self.bets_placed + self.bets_rejected;
        if attempts == 0 {
            0.0
        } else {
            self.bets_rejected as f64 / attempts as f64 * 100.0
        }
    }

    /// Boxed operator report
    pub fn summary(&self) -> String {
        let period_minutes = self.period_end.saturating_sub(self.period_start) / 60;

        format!(
            r#"
╔══════════════════════════════════════════════════════════════════╗
║           🪱 GALACTIC HUSTLERS - SESSION REPORT                  ║
╠══════════════════════════════════════════════════════════════════╣
║  ⏱️  Session:        {:>8} min                                  ║
║  🏁 Races created:  {:>8}                                      ║
║  ✅ Races settled:  {:>8}                                      ║
║  ⏸️  Quorum halts:   {:>8}                                      ║
║  🎲 Bets placed:    {:>8}                                      ║
║  🚫 Bets rejected:  {:>8}  ({:>5.1}%)                           ║
║  💸 Fees swept:     {:>12.4}                                  ║
║  💰 Payouts:        {:>12.4}                                  ║
║  🕵️  Collusion flags:{:>8}                                      ║
╚══════════════════════════════════════════════════════════════════╝
"#,
            period_minutes,
            self.races_created,
            self.races_settled,
            self.races_halted_quorum,
            self.bets_placed,
            self.bets_rejected,
            self.rejection_rate(),
            self.fees_swept,
            self.total_payout,
            self.collusion_flags,
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Thread-safe counters shared by every race in a `GameContext`
#[derive(Debug)]
pub struct GameTelemetry {
    races_created: AtomicU64,
    races_settled: AtomicU64,
    races_halted_quorum: AtomicU64,
    bets_placed: AtomicU64,
    bets_rejected: AtomicU64,
    collusion_flags: AtomicU64,
    // f64 totals have no atomic type
    fees_swept: RwLock<f64>,
    total_payout: RwLock<f64>,
    session_start: u64,
}

impl GameTelemetry {
    pub fn new() -> Self {
        Self {
            races_created: AtomicU64::new(0),
            races_settled: AtomicU64::new(0),
            races_halted_quorum: AtomicU64::new(0),
            bets_placed: AtomicU64::new(0),
            bets_rejected: AtomicU64::new(0),
            collusion_flags: AtomicU64::new(0),
            fees_swept: RwLock::new(0.0),
            total_payout: RwLock::new(0.0),
            session_start: current_timestamp(),
        }
    }

    pub fn record_race_created(&self) {
        self.races_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quorum_halt(&self) {
        self.races_halted_quorum.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bet_placed(&self) {
        self.bets_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bet_rejected(&self) {
        self.bets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collusion_flag(&self) {
        self.collusion_flags.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a settled race with its swept fees and total payout
    pub fn record_settlement(&self, fees_swept: f64, total_payout: f64) {
        self.races_settled.fetch_add(1, Ordering::Relaxed);
        *self.fees_swept.write().unwrap_or_else(PoisonError::into_inner) += fees_swept;
        *self.total_payout.write().unwrap_or_else(PoisonError::into_inner) += total_payout;
    }

    /// Get current statistics
    pub fn get_stats(&self) -> GameTelemetryStats {
        GameTelemetryStats {
            races_created: self.races_created.load(Ordering::Relaxed),
            races_settled: self.races_settled.load(Ordering::Relaxed),
            races_halted_quorum: self.races_halted_quorum.load(Ordering::Relaxed),
            bets_placed: self.bets_placed.load(Ordering::Relaxed),
            bets_rejected: self.bets_rejected.load(Ordering::Relaxed),
            fees_swept: *self.fees_swept.read().unwrap_or_else(PoisonError::into_inner),
            total_payout: *self.total_payout.read().unwrap_or_else(PoisonError::into_inner),
            collusion_flags: self.collusion_flags.load(Ordering::Relaxed),
            period_start: self.session_start,
            period_end: current_timestamp(),
        }
    }

    /// Export current stats to a timestamped JSON file under `dir`
    pub fn export_stats_json(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        fs::create_dir_all(dir)?;
        let stats = self.get_stats();
        let path = dir.join(format!("galactic_stats_{}.json", current_timestamp()));

        let json = serde_json::to_string_pretty(&stats)?;
        fs::write(&path, json)?;

        Ok(path)
    }
}

impl Default for GameTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let telemetry = GameTelemetry::new();
        telemetry.record_race_created();
        telemetry.record_bet_placed();
        telemetry.record_bet_placed();
        telemetry.record_bet_placed();
        telemetry.record_bet_rejected();
        telemetry.record_quorum_halt();
        telemetry.record_settlement(15.0, 170.0);
        telemetry.record_settlement(4.5, 0.0);

        let stats = telemetry.get_stats();
        assert_eq!(stats.races_created, 1);
        assert_eq!(stats.races_settled, 2);
        assert_eq!(stats.bets_placed, 3);
        assert_eq!(stats.bets_rejected, 1);
        assert_eq!(stats.races_halted_quorum, 1);
        assert!((stats.fees_swept - 19.5).abs() < 1e-9);
        assert!((stats.rejection_rate() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejection_rate_without_bets() {
        assert_eq!(GameTelemetryStats::default().rejection_rate(), 0.0);
    }

    #[test]
    fn test_summary_and_json() {
        let stats = GameTelemetryStats {
            races_settled: 7,
            collusion_flags: 2,
            fees_swept: 42.5,
            ..Default::default()
        };
        assert!(stats.summary().contains("SESSION REPORT"));
        assert!(stats.summary().contains("42.5000"));

        let json = stats.to_json();
        assert!(json.contains("races_settled"));
        assert!(json.contains("collusion_flags"));
    }

    #[test]
    fn test_export_stats_json() {
        let dir = std::env::temp_dir().join(format!("gh_telemetry_{}", std::process::id()));
        let telemetry = GameTelemetry::new();
        telemetry.record_collusion_flag();

        let path = telemetry.export_stats_json(&dir).unwrap();
        let body = fs::read_to_string(&path).unwrap();
        let parsed: GameTelemetryStats = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.collusion_flags, 1);

        let _ = fs::remove_dir_all(&dir);
    }
}
