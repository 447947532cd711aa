//! API Request Handlers
//!
//! Thin layer over [`GameContext`]: every handler validates input, drives
//! one orchestrator operation, and maps `AppError` to an HTTP status via
//! `ErrorCode::http_status`.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::middleware::{RateLimitConfig, RateLimiter};
use super::types::*;
use crate::core::{GalacticRace, GameContext, Hustler, Worm};
use crate::models::config::GameConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::Location;
use crate::providers::ledger::InMemoryLedger;
use crate::providers::price::FixedPriceOracle;

type ApiFailure = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiFailure>;

/// Shared application state
pub struct AppState {
    pub ctx: GameContext,
    pub races: DashMap<Uuid, Arc<Mutex<GalacticRace>>>,
    pub ledger: Arc<InMemoryLedger>,
    pub oracle: FixedPriceOracle,
    pub rate_limiter: RateLimiter,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: GameConfig,
        ledger: Arc<InMemoryLedger>,
        oracle: FixedPriceOracle,
        rate_limit: RateLimitConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            ctx: GameContext::new(config)?,
            races: DashMap::new(),
            ledger,
            oracle,
            rate_limiter: RateLimiter::new(rate_limit),
            start_time: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn race(&self, id: Uuid) -> AppResult<Arc<Mutex<GalacticRace>>> {
        self.races
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| AppError::new(ErrorCode::RaceNotFound, format!("No race {}", id)))
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn fail(err: AppError, start: Instant) -> ApiFailure {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("❌ {}", err);
    } else {
        warn!("⚠️ {}", err);
    }
    (
        status,
        Json(ApiResponse::error(ApiError::from(&err), elapsed_ms(start))),
    )
}

fn ok<T: serde::Serialize>(data: T, start: Instant) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data, elapsed_ms(start))))
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Locations
// ============================================

pub async fn register_location(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterLocationRequest>,
) -> ApiResult<LocationsData> {
    let start = Instant::now();

    let location = Location::new(req.latitude, req.longitude).map_err(|e| fail(e, start))?;
    state
        .ctx
        .register_location(location, &req.owner)
        .map_err(|e| fail(e, start))?;

    let locations = state.ctx.registered_locations();
    ok(
        LocationsData {
            total: locations.len(),
            locations,
        },
        start,
    )
}

pub async fn list_locations(State(state): State<Arc<AppState>>) -> ApiResult<LocationsData> {
    let start = Instant::now();
    let locations = state.ctx.registered_locations();
    ok(
        LocationsData {
            total: locations.len(),
            locations,
        },
        start,
    )
}

// ============================================
// Players & Ledger
// ============================================

/// Credit the USD registration bonus, converted at the oracle price
pub async fn register_player(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterPlayerRequest>,
) -> ApiResult<RegisterPlayerData> {
    let start = Instant::now();

    let bonus = state
        .ctx
        .registration_bonus(&state.oracle, &req.currency)
        .await
        .map_err(|e| fail(e, start))?;
    let balance = if bonus > 0.0 {
        state
            .ledger
            .deposit(&req.identity, &req.currency, bonus)
            .map_err(|e| fail(e, start))?
    } else {
        state.ledger.balance(&req.identity, &req.currency)
    };

    info!("👤 Player {} registered with {:.6} {}", req.identity, bonus, req.currency);
    ok(
        RegisterPlayerData {
            identity: req.identity,
            currency: req.currency,
            bonus,
            balance,
        },
        start,
    )
}

pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<BalanceData> {
    let start = Instant::now();
    let balance = state
        .ledger
        .deposit(&req.identity, &req.currency, req.amount)
        .map_err(|e| fail(e, start))?;

    ok(
        BalanceData {
            identity: req.identity,
            currency: req.currency,
            balance,
        },
        start,
    )
}

// ============================================
// Races
// ============================================

pub async fn create_race(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRaceRequest>,
) -> ApiResult<crate::core::RaceSnapshot> {
    let start = Instant::now();

    let origin = Location::new(req.latitude, req.longitude).map_err(|e| fail(e, start))?;
    let race = state
        .ctx
        .create_race(origin, &req.owner, req.currency)
        .map_err(|e| fail(e, start))?;

    let snapshot = race.snapshot();
    state.races.insert(race.id(), Arc::new(Mutex::new(race)));
    ok(snapshot, start)
}

pub async fn get_race(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<crate::core::RaceSnapshot> {
    let start = Instant::now();
    let handle = state.race(id).map_err(|e| fail(e, start))?;
    let race = handle.lock().await;
    ok(race.snapshot(), start)
}

pub async fn add_worm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddWormRequest>,
) -> ApiResult<crate::core::RaceSnapshot> {
    let start = Instant::now();

    let location = Location::new(req.latitude, req.longitude).map_err(|e| fail(e, start))?;
    let home = Location::new(req.home_latitude, req.home_longitude).map_err(|e| fail(e, start))?;
    let mut worm = Worm::new(req.id, location, home).with_nft_bonus(req.nft_bonus);
    if let Some(display) = req.display {
        worm = worm.with_display(display);
    }

    let handle = state.race(id).map_err(|e| fail(e, start))?;
    let mut race = handle.lock().await;
    state
        .ctx
        .add_worm(&mut race, worm)
        .map_err(|e| fail(e, start))?;
    ok(race.snapshot(), start)
}

/// Place the bet through the ledger and enter the Hustler
pub async fn enter_hustler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<EnterHustlerRequest>,
) -> ApiResult<crate::core::RaceSnapshot> {
    let start = Instant::now();

    let handle = state.race(id).map_err(|e| fail(e, start))?;
    let mut race = handle.lock().await;

    let currency = req.currency.unwrap_or_else(|| race.currency().clone());
    let hustler =
        Hustler::new(req.id, req.wager, req.worm_id, currency).map_err(|e| fail(e, start))?;
    state
        .ctx
        .enter_hustler(&mut race, hustler, state.ledger.as_ref())
        .await
        .map_err(|e| fail(e, start))?;
    ok(race.snapshot(), start)
}

/// Drive the race as far as it goes: quorum, circle, race, settlement
pub async fn run_race(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(req): Query<RunRaceRequest>,
) -> ApiResult<RunRaceData> {
    let start = Instant::now();

    let handle = state.race(id).map_err(|e| fail(e, start))?;
    let mut race = handle.lock().await;

    let mut rng = match req.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let race_state = state
        .ctx
        .run_to_completion(&mut race, &mut rng, state.ledger.as_ref())
        .await
        .map_err(|e| fail(e, start))?;

    ok(
        RunRaceData {
            state: race_state,
            settled: race_state == crate::models::types::RaceState::Settled,
            race: race.snapshot(),
        },
        start,
    )
}

// ============================================
// Collusion
// ============================================

pub async fn record_communication(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdentityPair>,
) -> ApiResult<CommunicationData> {
    let start = Instant::now();
    if req.a.is_empty() || req.b.is_empty() {
        return Err(fail(AppError::bad_request("Both identities are required"), start));
    }

    let recorded = state.ctx.record_communication(&req.a, &req.b);
    let graph = state.ctx.collusion();
    ok(
        CommunicationData {
            recorded,
            nodes: graph.node_count(),
            edges: graph.edge_count(),
        },
        start,
    )
}

pub async fn check_collusion(
    State(state): State<Arc<AppState>>,
    Query(req): Query<IdentityPair>,
) -> ApiResult<CollusionCheckData> {
    let start = Instant::now();

    let flagged = state.ctx.flag_if_close(&req.a, &req.b);
    let graph = state.ctx.collusion();
    ok(
        CollusionCheckData {
            distance: graph.distance(&req.a, &req.b),
            threshold: graph.threshold(),
            flagged,
            a: req.a,
            b: req.b,
        },
        start,
    )
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();
    let stats = state.ctx.telemetry().get_stats();

    let data = StatsData {
        races_created: stats.races_created,
        races_settled: stats.races_settled,
        races_halted_quorum: stats.races_halted_quorum,
        bets_placed: stats.bets_placed,
        bets_rejected: stats.bets_rejected,
        fees_swept: stats.fees_swept,
        total_payout: stats.total_payout,
        collusion_flags: stats.collusion_flags,
        races_tracked: state.races.len(),
        uptime_seconds: state.uptime_seconds(),
        api_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}
