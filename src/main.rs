//! Galactic Hustlers - race simulation runner
//!
//! Runs one complete race against the in-memory ledger:
//! - registers a city region and opens a race there
//! - enters five Worms and five Hustlers (each funded with the USD
//!   registration bonus plus a top-up)
//! - drives quorum, circle, race, settlement, fee sweep
//!
//! Environment:
//!   GH_SEED         - RNG seed for a reproducible run (default: random)
//!   GH_CITY_LAT     - Race origin latitude (default: New York)
//!   GH_CITY_LON     - Race origin longitude
//!   GH_LIVE_PRICES  - "1" to price SOL via DexScreener
//!   GH_SOL_PRICE_USD - Fixed SOL price otherwise (default: 150)
//!   GH_TELEMETRY_DIR - Export session stats as JSON here
//!   GH_LOG_LEVEL    - trace | debug | info | warn | error
//!
//! With the default 0.5 degree circle jitter most Worms end up outside the
//! 2 mile circle; `GH_CIRCLE_JITTER_DEGREES=0.01` gives a tighter game.

use galactic_hustlers::models::{Currency, GameConfig, Location};
use galactic_hustlers::providers::{DexScreenerClient, FixedPriceOracle, PriceOracle};
use galactic_hustlers::{GameContext, Hustler, InMemoryLedger, Worm};

use eyre::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const WORMS: usize = 5;
const HUSTLERS: usize = 5;
const TOP_UP_SOL: f64 = 2.0;
const WAGER_SOL: f64 = 1.0;

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let level = std::env::var("GH_LOG_LEVEL")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    println!(
        r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║        🪱  G A L A C T I C   H U S T L E R S  🪱             ║
    ║                                                              ║
    ║           Location-gated Worm racing simulation              ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#
    );

    let config = GameConfig::from_env()?;
    let seed = std::env::var("GH_SEED")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or_else(|| rand::thread_rng().gen());
    info!("🎲 RNG seed: {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let origin = Location::new(
        env_f64("GH_CITY_LAT", 40.7128),
        env_f64("GH_CITY_LON", -74.0060),
    )?;

    let ctx = GameContext::new(config.clone())?;
    let ledger = Arc::new(InMemoryLedger::new());

    // Registration bonus, live or fixed price
    let fixed = FixedPriceOracle::new().with_price(Currency::Sol, env_f64("GH_SOL_PRICE_USD", 150.0));
    let bonus = if std::env::var("GH_LIVE_PRICES").as_deref() == Ok("1") {
        match ctx.registration_bonus(&DexScreenerClient::new(), &Currency::Sol).await {
            Ok(bonus) => bonus,
            Err(e) => {
                warn!("⚠️ Live price failed ({}), using fixed price", e);
                ctx.registration_bonus(&fixed, &Currency::Sol).await?
            }
        }
    } else {
        let price = fixed.current_price(&Currency::Sol).await?;
        info!("💲 Fixed SOL price: ${:.2}", price);
        ctx.registration_bonus(&fixed, &Currency::Sol).await?
    };

    let mut race = ctx.create_race(origin, "simulation", Currency::Sol)?;
    info!("🗓️ Race {} scheduled for {}", race.id(), race.start_time());

    for i in 0..WORMS {
        // scattered within ~0.3 mi of the origin, homes ~7 mi away
        let location = Location::new(
            origin.latitude + rng.gen_range(-0.004..=0.004),
            origin.longitude + rng.gen_range(-0.004..=0.004),
        )?;
        // the last worm never left home
        let home = if i == WORMS - 1 {
            location
        } else {
            Location::new(origin.latitude + 0.1, origin.longitude)?
        };
        let worm = Worm::new(format!("worm-{}", i), location, home)
            .with_display(["crimson", "cobalt", "jade", "amber", "violet"][i % 5])
            .with_nft_bonus(i == 0);
        ctx.add_worm(&mut race, worm)?;
    }

    for i in 0..HUSTLERS {
        let id = format!("hustler-{}", i);
        if bonus > 0.0 {
            ledger.deposit(&id, &Currency::Sol, bonus)?;
        }
        ledger.deposit(&id, &Currency::Sol, TOP_UP_SOL)?;
        let hustler = Hustler::new(&id, WAGER_SOL, format!("worm-{}", i % WORMS), Currency::Sol)?;
        if let Err(e) = ctx.enter_hustler(&mut race, hustler, &ledger).await {
            warn!("🚫 {} could not enter: {}", id, e);
        }
    }

    // a couple of chats for the collusion graph
    ctx.record_communication("hustler-0", "worm-0");
    ctx.record_communication("worm-0", "hustler-3");
    for (a, b) in [("hustler-0", "hustler-3"), ("hustler-1", "worm-4")] {
        info!("🕵️ {} <-> {}: flagged = {}", a, b, ctx.flag_if_close(a, b));
    }

    info!(
        "⏳ Circle may wander up to {:?} before halting",
        config.max_circle_duration()
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = ctx.run_to_completion(&mut race, &mut rng, &ledger) => {
            let state = result?;
            info!("🏁 Race finished in state {}", state.as_str());
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n\n🛑 Shutting down gracefully...");
        }
    }

    if let Some(report) = race.report() {
        println!("\n📋 Settlement ({}):", report.currency);
        for record in &report.records {
            println!(
                "   {:<10} on {:<7} {:<13} wager {:.4}  fee {:.4}  payout {:.4}",
                record.hustler_id,
                record.worm_id,
                record.outcome.as_str(),
                record.wager,
                record.fee,
                record.payout
            );
        }
        println!("   {}", report.summary());
        println!(
            "   Founder balance: {:.4} SOL",
            ledger.balance(&config.founder_identity, &Currency::Sol)
        );
    }

    let stats = ctx.telemetry().get_stats();
    println!("{}", stats.summary());

    if let Ok(dir) = std::env::var("GH_TELEMETRY_DIR") {
        match ctx.telemetry().export_stats_json(&PathBuf::from(dir)) {
            Ok(path) => println!("   ✅ JSON exported to: {}", path.display()),
            Err(e) => println!("   ❌ JSON export failed: {}", e),
        }
    }

    Ok(())
}
