//! Galactic Hustlers API Server
//!
//! REST front end that drives the race state machine in order
//!
//! Usage:
//!   cargo run --bin galactic_api
//!
//! Environment:
//!   GH_PORT / PORT   - Server port (default: 8080)
//!   GH_HOST          - Server host (default: 0.0.0.0)
//!   GH_SOL_PRICE_USD - SOL price used for registration bonuses (default: 150)
//!   GH_TELEMETRY_DIR - Where to export stats on shutdown (default: ./telemetry)
//!   GH_LOG_LEVEL     - Log level (default: info)
//!   GH_*             - Game tunables, see `GameConfig::from_env`

use galactic_hustlers::api::{create_router, start_cleanup_task, AppState, RateLimitConfig};
use galactic_hustlers::models::{Currency, GameConfig};
use galactic_hustlers::{FixedPriceOracle, InMemoryLedger};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    let level = std::env::var("GH_LOG_LEVEL")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    print_banner();

    let config = GameConfig::from_env()?;
    let sol_price: f64 = std::env::var("GH_SOL_PRICE_USD")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(150.0);

    let ledger = Arc::new(InMemoryLedger::new());

    let oracle = FixedPriceOracle::new().with_price(Currency::Sol, sol_price);
    let state = Arc::new(AppState::new(
        config,
        ledger,
        oracle,
        RateLimitConfig::from_env(),
    )?);
    let state_for_shutdown = state.clone();

    // Start background cleanup task for rate limiter
    start_cleanup_task(state.clone());
    info!("🧹 Background cleanup task started");

    // Create router
    let app = create_router(state);

    // Get server config from env
    let host = std::env::var("GH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("GH_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 Galactic Hustlers API starting on http://{}", addr);
    info!("");
    info!("Endpoints:");
    info!("  POST /v1/locations                 - Claim a game region");
    info!("  POST /v1/players                   - Register, credit USD bonus");
    info!("  POST /v1/ledger/deposit            - Fund a simulation wallet");
    info!("  POST /v1/races                     - Open a race");
    info!("  POST /v1/races/:id/worms           - Enter a Worm");
    info!("  POST /v1/races/:id/hustlers        - Place a bet");
    info!("  POST /v1/races/:id/run             - Quorum, circle, race, settle");
    info!("  GET  /v1/races/:id                 - Race snapshot");
    info!("  POST /v1/collusion/communications  - Record a contact");
    info!("  GET  /v1/collusion/check?a=&b=     - Collusion flag");
    info!("  GET  /v1/stats                     - Session statistics");
    info!("  GET  /v1/health                    - Health check");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Graceful shutdown sequence
    info!("");
    info!("🛑 Shutdown signal received, cleaning up...");

    let telemetry = state_for_shutdown.ctx.telemetry();
    let stats = telemetry.get_stats();
    info!("   Races settled: {}", stats.races_settled);
    info!("   Bets placed: {}", stats.bets_placed);
    info!("   Fees swept: {:.4}", stats.fees_swept);

    let dir = std::env::var("GH_TELEMETRY_DIR").unwrap_or_else(|_| "./telemetry".to_string());
    match telemetry.export_stats_json(&PathBuf::from(dir)) {
        Ok(path) => info!("   ✅ Stats exported to: {}", path.display()),
        Err(e) => warn!("   ⚠️ Failed to export stats: {}", e),
    }

    info!("👋 Galactic Hustlers API shutdown complete");

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║        🪱  G A L A C T I C   H U S T L E R S  🪱             ║
    ║                                                              ║
    ║                   R A C E   A P I   v0.1.0                   ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#
    );
}
