//! Game Orchestrator
//!
//! Drives one race through `Registered -> QuorumCheck -> CircleResolving ->
//! Racing -> Settled`. Everything shared across races (registered regions,
//! active wallets, fee ledger, collusion graph, telemetry) lives in a
//! [`GameContext`]; each [`GalacticRace`] owns its Worms, Hustlers and
//! Circle exclusively.
//!
//! Quorum failure is a normal outcome: the race parks in `QuorumCheck` and
//! can be re-checked once more participants join.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::circle::Circle;
use super::collusion::CollusionGraph;
use super::hustler::Hustler;
use super::settlement::FeeLedger;
use super::worm::Worm;
use crate::models::config::GameConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{
    BetStatus, CircleState, Currency, Location, RaceState, RegisteredLocation, SettlementRecord,
    SettlementReport,
};
use crate::providers::ledger::Ledger;
use crate::providers::price::PriceOracle;
use crate::utils::geo::distance_miles;
use crate::utils::telemetry::GameTelemetry;

// ============================================
// Race
// ============================================

/// One race instance
#[derive(Debug)]
pub struct GalacticRace {
    id: Uuid,
    owner: String,
    currency: Currency,
    worms: Vec<Worm>,
    hustlers: Vec<Hustler>,
    circle: Circle,
    created_at: DateTime<Utc>,
    start_time: DateTime<Utc>,
    state: RaceState,
    raced: bool,
    records: Vec<SettlementRecord>,
    /// Leading `records` whose fee already moved to the house account
    fees_moved: usize,
    report: Option<SettlementReport>,
}

impl GalacticRace {
    fn new(
        origin: Location,
        owner: String,
        currency: Currency,
        config: &GameConfig,
        created_at: DateTime<Utc>,
        start_time: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            owner,
            currency,
            worms: Vec::new(),
            hustlers: Vec::new(),
            circle: Circle::new(origin, config)?,
            created_at,
            start_time,
            state: RaceState::Registered,
            raced: false,
            records: Vec::new(),
            fees_moved: 0,
            report: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn origin(&self) -> Location {
        self.circle.origin()
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn state(&self) -> RaceState {
        self.state
    }

    pub fn worms(&self) -> &[Worm] {
        &self.worms
    }

    pub fn worm(&self, worm_id: &str) -> Option<&Worm> {
        self.worms.iter().find(|w| w.id == worm_id)
    }

    /// Hustlers whose bet went through
    pub fn hustlers(&self) -> &[Hustler] {
        &self.hustlers
    }

    pub fn circle(&self) -> &Circle {
        &self.circle
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn report(&self) -> Option<&SettlementReport> {
        self.report.as_ref()
    }

    fn placed_bets(&self) -> usize {
        self.hustlers
            .iter()
            .filter(|h| h.bet_status() == BetStatus::Placed)
            .count()
    }

    fn ensure_state(&self, expected: RaceState) -> AppResult<()> {
        if self.state != expected {
            return Err(AppError::invalid_state(format!(
                "Race {} is {}, expected {}",
                self.id,
                self.state.as_str(),
                expected.as_str()
            )));
        }
        Ok(())
    }

    fn ensure_accepts_entries(&self) -> AppResult<()> {
        if !self.state.accepts_entries() {
            return Err(AppError::invalid_state(format!(
                "Race {} is {} and closed to entries",
                self.id,
                self.state.as_str()
            )));
        }
        Ok(())
    }

    fn transition(&mut self, next: RaceState) {
        info!(
            "🏁 Race {}: {} -> {}",
            self.id,
            self.state.as_str(),
            next.as_str()
        );
        self.state = next;
    }

    /// Serializable view for front ends
    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            id: self.id,
            owner: self.owner.clone(),
            state: self.state,
            currency: self.currency.clone(),
            origin: self.circle.origin(),
            created_at: self.created_at,
            start_time: self.start_time,
            circle: CircleSnapshot {
                state: self.circle.state(),
                center: self.circle.center(),
                steps: self.circle.steps(),
                radius_miles: self.circle.radius_miles(),
            },
            worms: self.worms.clone(),
            hustlers: self.hustlers.clone(),
            report: self.report.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircleSnapshot {
    pub state: CircleState,
    pub center: Option<Location>,
    pub steps: u32,
    pub radius_miles: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceSnapshot {
    pub id: Uuid,
    pub owner: String,
    pub state: RaceState,
    pub currency: Currency,
    pub origin: Location,
    pub created_at: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub circle: CircleSnapshot,
    pub worms: Vec<Worm>,
    pub hustlers: Vec<Hustler>,
    pub report: Option<SettlementReport>,
}

// ============================================
// Context
// ============================================

/// Shared state for every race run by one operator
pub struct GameContext {
    config: GameConfig,
    registered_locations: RwLock<Vec<RegisteredLocation>>,
    /// Hustler identity -> race holding its live wager
    active_wallets: DashMap<String, Uuid>,
    fee_ledger: FeeLedger,
    collusion: CollusionGraph,
    telemetry: Arc<GameTelemetry>,
}

impl GameContext {
    /// Fails with `CFG_INVALID_VALUE` when `config` does not validate
    pub fn new(config: GameConfig) -> AppResult<Self> {
        Self::with_telemetry(config, Arc::new(GameTelemetry::new()))
    }

    pub fn with_telemetry(config: GameConfig, telemetry: Arc<GameTelemetry>) -> AppResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, telemetry))
    }

    fn assemble(config: GameConfig, telemetry: Arc<GameTelemetry>) -> Self {
        let collusion = CollusionGraph::new(config.collusion_distance_threshold);
        Self {
            config,
            registered_locations: RwLock::new(Vec::new()),
            active_wallets: DashMap::new(),
            fee_ledger: FeeLedger::new(),
            collusion,
            telemetry,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn fee_ledger(&self) -> &FeeLedger {
        &self.fee_ledger
    }

    pub fn collusion(&self) -> &CollusionGraph {
        &self.collusion
    }

    pub fn telemetry(&self) -> &Arc<GameTelemetry> {
        &self.telemetry
    }

    pub fn registered_locations(&self) -> Vec<RegisteredLocation> {
        self.registered_locations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Race currently holding `identity`'s live wager
    pub fn active_race_for(&self, identity: &str) -> Option<Uuid> {
        self.active_wallets.get(identity).map(|r| *r)
    }

    // ---------- Registration ----------

    /// Claim a region; rejects anything within the game radius of a claim
    pub fn register_location(&self, location: Location, owner: &str) -> AppResult<()> {
        location.validate()?;
        let mut registered = self
            .registered_locations
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for existing in registered.iter() {
            let distance = distance_miles(&existing.location, &location);
            if distance <= self.config.game_radius_miles {
                warn!(
                    "📍 Location {} rejected: {:.1} mi from {} (owner {})",
                    location, distance, existing.location, existing.owner
                );
                return Err(AppError::location_too_close(
                    distance,
                    self.config.game_radius_miles,
                ));
            }
        }

        registered.push(RegisteredLocation {
            location,
            owner: owner.to_string(),
            registered_at: Utc::now(),
        });
        info!("📍 Location {} registered for {}", location, owner);
        Ok(())
    }

    /// Drop a claim; returns false if it was not registered
    pub fn release_location(&self, location: &Location) -> bool {
        let mut registered = self
            .registered_locations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = registered.len();
        registered.retain(|r| r.location != *location);
        let released = registered.len() < before;
        if released {
            debug!(location = %location, "Location released");
        }
        released
    }

    /// Fixed USD registration bonus converted into `currency` units
    pub async fn registration_bonus<P: PriceOracle>(
        &self,
        oracle: &P,
        currency: &Currency,
    ) -> AppResult<f64> {
        let price = oracle.current_price(currency).await?;
        let bonus = self.config.initial_bonus_usd / price;
        info!(
            "🎁 Registration bonus: ${:.2} = {:.6} {} (@ ${:.4})",
            self.config.initial_bonus_usd, bonus, currency, price
        );
        Ok(bonus)
    }

    /// First start time strictly after `now` on the game interval grid
    pub fn next_start_time(&self, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        let interval = self.config.game_interval_secs;
        let next = (now.timestamp().div_euclid(interval) + 1) * interval;
        DateTime::<Utc>::from_timestamp(next, 0)
            .ok_or_else(|| AppError::internal(format!("Start time {} out of range", next)))
    }

    /// Register `origin` and open a race there
    pub fn create_race(
        &self,
        origin: Location,
        owner: &str,
        currency: Currency,
    ) -> AppResult<GalacticRace> {
        currency.validate()?;
        let now = Utc::now();
        let start_time = self.next_start_time(now)?;
        let race = GalacticRace::new(
            origin,
            owner.to_string(),
            currency,
            &self.config,
            now,
            start_time,
        )?;
        self.register_location(origin, owner)?;

        self.telemetry.record_race_created();
        info!(
            "🪱 Race {} created at {} by {} ({}), starts {}",
            race.id, origin, owner, race.currency, start_time
        );
        Ok(race)
    }

    // ---------- Entries ----------

    pub fn add_worm(&self, race: &mut GalacticRace, worm: Worm) -> AppResult<()> {
        race.ensure_accepts_entries()?;
        if race.worm(&worm.id).is_some() {
            return Err(AppError::invalid_state(format!(
                "Worm {} already entered race {}",
                worm.id, race.id
            )));
        }
        debug!(race = %race.id, worm = %worm.id, "Worm entered");
        race.worms.push(worm);
        Ok(())
    }

    /// Place the Hustler's bet and enter it into the race
    ///
    /// Only a successfully placed bet is kept. The wallet is reserved for
    /// this race up front and released again if the bet does not go through.
    pub async fn enter_hustler<L: Ledger>(
        &self,
        race: &mut GalacticRace,
        mut hustler: Hustler,
        ledger: &L,
    ) -> AppResult<()> {
        race.ensure_accepts_entries()?;
        if hustler.currency != race.currency {
            return Err(AppError::new(
                ErrorCode::CurrencyMismatch,
                format!(
                    "Race {} settles in {}, wager is in {}",
                    race.id, race.currency, hustler.currency
                ),
            ));
        }
        if race.worm(&hustler.worm_id).is_none() {
            return Err(AppError::unknown_worm(&hustler.worm_id));
        }

        match self.active_wallets.entry(hustler.id.clone()) {
            Entry::Occupied(busy) => {
                return Err(AppError::new(
                    ErrorCode::WalletBusy,
                    format!("Wallet {} already has a live wager in race {}", hustler.id, busy.get()),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(race.id);
            }
        }

        match hustler.place_bet(ledger).await {
            Ok(()) => {
                self.telemetry.record_bet_placed();
                race.hustlers.push(hustler);
                Ok(())
            }
            Err(e) => {
                self.active_wallets.remove_if(&hustler.id, |_, id| *id == race.id);
                if e.code == ErrorCode::InsufficientBalance {
                    self.telemetry.record_bet_rejected();
                }
                Err(e)
            }
        }
    }

    // ---------- State machine ----------

    /// Returns true and advances to `CircleResolving` when quorum is met
    pub fn check_quorum(&self, race: &mut GalacticRace) -> AppResult<bool> {
        match race.state {
            RaceState::Registered => race.transition(RaceState::QuorumCheck),
            RaceState::QuorumCheck => {}
            _ => race.ensure_state(RaceState::QuorumCheck)?,
        }

        let worms = race.worms.len();
        let hustlers = race.placed_bets();
        if worms >= self.config.min_worms && hustlers >= self.config.min_hustlers {
            race.transition(RaceState::CircleResolving);
            return Ok(true);
        }

        self.telemetry.record_quorum_halt();
        info!(
            "⏸️ Race {} short of quorum: {}/{} worms, {}/{} hustlers",
            race.id, worms, self.config.min_worms, hustlers, self.config.min_hustlers
        );
        Ok(false)
    }

    /// Wander the circle until it halts; returns the frozen center
    pub async fn resolve_circle<R: Rng + Send>(
        &self,
        race: &mut GalacticRace,
        rng: &mut R,
    ) -> AppResult<Location> {
        race.ensure_state(RaceState::CircleResolving)?;
        let center = race.circle.resolve(rng, &self.config).await?;
        race.transition(RaceState::Racing);
        Ok(center)
    }

    /// Rank every Worm inside the circle; the rest are marked not entered
    pub fn run_race<R: Rng + ?Sized>(&self, race: &mut GalacticRace, rng: &mut R) -> AppResult<()> {
        race.ensure_state(RaceState::Racing)?;
        if race.raced {
            return Err(AppError::new(
                ErrorCode::AlreadyResolved,
                format!("Race {} already ran", race.id),
            ));
        }

        let home_radius = self.config.home_radius_miles;
        let GalacticRace { circle, worms, .. } = race;
        for worm in worms.iter_mut() {
            if circle.is_active() && circle.contains_point(&worm.location) {
                worm.resolve_outcome(rng, home_radius)?;
            } else {
                worm.mark_not_entered()?;
            }
        }
        race.raced = true;

        let entered = race
            .worms
            .iter()
            .filter(|w| w.outcome().rank().is_some())
            .count();
        info!("🏎️ Race {} ran: {}/{} worms ranked", race.id, entered, race.worms.len());
        Ok(())
    }

    /// Settle every Hustler, sweep fees to the founder, release the race
    ///
    /// Each fee moves from the wagered-on Worm to the house account, then
    /// this race's fees move from the house to the founder. A failed
    /// transfer leaves the race in `Racing` with its Hustlers settled;
    /// calling again resumes from the first fee not yet moved.
    pub async fn settle_race<L: Ledger>(
        &self,
        race: &mut GalacticRace,
        ledger: &L,
    ) -> AppResult<SettlementReport> {
        race.ensure_state(RaceState::Racing)?;
        if !race.raced {
            return Err(AppError::invalid_state(format!(
                "Race {} has not run yet",
                race.id
            )));
        }

        let GalacticRace {
            worms,
            hustlers,
            records,
            ..
        } = race;
        for hustler in hustlers.iter_mut().filter(|h| !h.is_settled()) {
            let worm = worms
                .iter()
                .find(|w| w.id == hustler.worm_id)
                .ok_or_else(|| AppError::unknown_worm(&hustler.worm_id))?;
            records.push(hustler.settle_record(worm, &self.fee_ledger, &self.config)?);
        }

        // each fee leaves the wagered-on Worm's account for the house
        let house = &self.config.house_identity;
        while race.fees_moved < race.records.len() {
            let record = &race.records[race.fees_moved];
            if record.fee > 0.0 {
                ledger
                    .transfer(&record.worm_id, house, record.fee, &race.currency)
                    .await?;
            }
            race.fees_moved += 1;
        }

        let race_fees: f64 = race.records.iter().map(|r| r.fee).sum();
        let fees_swept = self
            .fee_ledger
            .sweep_amount(
                ledger,
                &race.currency,
                race_fees,
                house,
                &self.config.founder_identity,
            )
            .await?;

        let report = SettlementReport {
            race_id: race.id,
            currency: race.currency.clone(),
            fees_collected: race_fees,
            fees_swept,
            total_payout: race.records.iter().map(|r| r.payout).sum(),
            records: race.records.clone(),
            settled_at: Utc::now(),
        };

        for hustler in &race.hustlers {
            self.active_wallets.remove_if(&hustler.id, |_, id| *id == race.id);
        }
        self.release_location(&race.origin());
        self.telemetry
            .record_settlement(report.fees_swept, report.total_payout);

        race.transition(RaceState::Settled);
        info!("✅ {}", report.summary());
        race.report = Some(report.clone());
        Ok(report)
    }

    /// Drive a race as far as it can go
    ///
    /// Returns `QuorumCheck` when quorum is short (re-runnable later) and
    /// `Settled` otherwise.
    pub async fn run_to_completion<R: Rng + Send, L: Ledger>(
        &self,
        race: &mut GalacticRace,
        rng: &mut R,
        ledger: &L,
    ) -> AppResult<RaceState> {
        loop {
            match race.state {
                RaceState::Registered | RaceState::QuorumCheck => {
                    if !self.check_quorum(race)? {
                        return Ok(race.state);
                    }
                }
                RaceState::CircleResolving => {
                    self.resolve_circle(race, rng).await?;
                }
                RaceState::Racing => {
                    if !race.raced {
                        self.run_race(race, rng)?;
                    }
                    self.settle_race(race, ledger).await?;
                }
                RaceState::Settled => return Ok(RaceState::Settled),
            }
        }
    }

    // ---------- Collusion ----------

    pub fn record_communication(&self, a: &str, b: &str) -> bool {
        self.collusion.record_communication(a, b)
    }

    pub fn flag_if_close(&self, a: &str, b: &str) -> bool {
        let flagged = self.collusion.flag_if_close(a, b);
        if flagged {
            self.telemetry.record_collusion_flag();
        }
        flagged
    }
}

impl Default for GameContext {
    fn default() -> Self {
        Self::assemble(GameConfig::default(), Arc::new(GameTelemetry::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::RaceOutcome;
    use crate::providers::ledger::InMemoryLedger;
    use crate::providers::price::FixedPriceOracle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const NYC: (f64, f64) = (40.7128, -74.0060);
    const WORM_MINT: &str = "WormMint11111111111111111111111111111111111";

    fn config() -> GameConfig {
        GameConfig {
            // every worm sits at the origin, so a 0.5 degree jitter could
            // leave them all outside a 2 mile circle
            circle_jitter_degrees: 0.001,
            ..GameConfig::default()
        }
        .without_step_delay()
    }

    fn nyc() -> Location {
        Location::new(NYC.0, NYC.1).unwrap()
    }

    fn worm(i: usize) -> Worm {
        // home ~7 miles north, so nobody is disqualified for lingering
        Worm::new(
            format!("worm-{}", i),
            nyc(),
            Location::new(NYC.0 + 0.1, NYC.1).unwrap(),
        )
    }

    fn funded_ledger(hustlers: usize) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        for i in 0..hustlers {
            ledger
                .deposit(&format!("hustler-{}", i), &Currency::Sol, 100.0)
                .unwrap();
        }
        ledger
    }

    async fn populated_race(ctx: &GameContext, ledger: &InMemoryLedger, worms: usize, hustlers: usize) -> GalacticRace {
        let mut race = ctx.create_race(nyc(), "owner", Currency::Sol).unwrap();
        for i in 0..worms {
            ctx.add_worm(&mut race, worm(i)).unwrap();
        }
        for i in 0..hustlers {
            let h = Hustler::new(
                format!("hustler-{}", i),
                10.0,
                format!("worm-{}", i % worms.max(1)),
                Currency::Sol,
            )
            .unwrap();
            ctx.enter_hustler(&mut race, h, ledger).await.unwrap();
        }
        race
    }

    #[test]
    fn test_location_registration_radius() {
        let ctx = GameContext::default();
        ctx.register_location(nyc(), "a").unwrap();

        // Newark, ~9 miles away
        let err = ctx
            .register_location(Location::new(40.7357, -74.1724).unwrap(), "b")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::LocationTooClose);

        // Philadelphia, ~80 miles away
        ctx.register_location(Location::new(39.9526, -75.1652).unwrap(), "c")
            .unwrap();
        assert_eq!(ctx.registered_locations().len(), 2);

        assert!(ctx.release_location(&nyc()));
        assert!(!ctx.release_location(&nyc()));
        ctx.register_location(Location::new(40.7357, -74.1724).unwrap(), "b")
            .unwrap();
    }

    #[test]
    fn test_start_time_aligned_to_interval() {
        let ctx = GameContext::default();
        let now = DateTime::<Utc>::from_timestamp(1_700_000_123, 0).unwrap();
        let start = ctx.next_start_time(now).unwrap();
        assert_eq!(start.timestamp() % 1200, 0);
        assert!(start > now);
        assert!(start.timestamp() - now.timestamp() <= 1200);

        let on_boundary = DateTime::<Utc>::from_timestamp(1_200 * 1_000, 0).unwrap();
        assert_eq!(
            ctx.next_start_time(on_boundary).unwrap().timestamp(),
            1_200 * 1_001
        );
    }

    #[tokio::test]
    async fn test_registration_bonus_conversion() {
        let ctx = GameContext::default();
        let oracle = FixedPriceOracle::new().with_price(Currency::Sol, 125.0);
        let bonus = ctx.registration_bonus(&oracle, &Currency::Sol).await.unwrap();
        assert!((bonus - 0.2).abs() < 1e-12);

        let token = Currency::Token {
            mint: "NoPrice".to_string(),
        };
        let err = ctx.registration_bonus(&oracle, &token).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PriceUnavailable);
    }

    #[tokio::test]
    async fn test_full_race_reaches_settled() {
        let config = config();
        let ctx = GameContext::new(config.clone()).unwrap();
        let ledger = funded_ledger(5);
        let mut race = populated_race(&ctx, &ledger, 5, 5).await;

        let mut rng = StdRng::seed_from_u64(7);
        let state = ctx.run_to_completion(&mut race, &mut rng, &ledger).await.unwrap();
        assert_eq!(state, RaceState::Settled);

        let report = race.report().unwrap();
        assert_eq!(report.records.len(), 5);
        assert!((report.fees_collected - 7.5).abs() < 1e-9);
        assert!((report.fees_swept - 7.5).abs() < 1e-9);
        assert!((ledger.balance(&config.founder_identity, &Currency::Sol) - 7.5).abs() < 1e-9);
        assert_eq!(ctx.fee_ledger().total(&Currency::Sol), 0.0);

        // fees came out of the wagers, the house only passes them on
        assert!((ledger.balance("worm-0", &Currency::Sol) - 8.5).abs() < 1e-9);
        assert!(ledger.balance(&config.house_identity, &Currency::Sol).abs() < 1e-9);

        // every worm was inside the circle and ranked
        assert!(race.worms().iter().all(|w| w.outcome().rank().is_some()));
        // region and wallets freed for the next race
        assert!(ctx.registered_locations().is_empty());
        assert!(ctx.active_race_for("hustler-0").is_none());

        let stats = ctx.telemetry().get_stats();
        assert_eq!(stats.races_settled, 1);
        assert_eq!(stats.bets_placed, 5);
    }

    #[tokio::test]
    async fn test_four_worms_halt_at_quorum_then_recover() {
        let config = config();
        let ctx = GameContext::new(config.clone()).unwrap();
        let ledger = funded_ledger(5);
        let mut race = populated_race(&ctx, &ledger, 4, 5).await;
        let mut rng = StdRng::seed_from_u64(3);

        let state = ctx.run_to_completion(&mut race, &mut rng, &ledger).await.unwrap();
        assert_eq!(state, RaceState::QuorumCheck);
        assert_eq!(race.circle().state(), CircleState::Uninitialized);
        assert!(race.report().is_none());
        assert_eq!(ctx.telemetry().get_stats().races_halted_quorum, 1);

        ctx.add_worm(&mut race, worm(4)).unwrap();
        let state = ctx.run_to_completion(&mut race, &mut rng, &ledger).await.unwrap();
        assert_eq!(state, RaceState::Settled);
    }

    #[tokio::test]
    async fn test_rejected_bets_do_not_count_toward_quorum() {
        let config = config();
        let ctx = GameContext::new(config.clone()).unwrap();
        let ledger = funded_ledger(4);
        let mut race = populated_race(&ctx, &ledger, 5, 4).await;

        let broke = Hustler::new("hustler-broke", 10.0, "worm-0", Currency::Sol).unwrap();
        let err = ctx.enter_hustler(&mut race, broke, &ledger).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientBalance);
        assert_eq!(race.hustlers().len(), 4);
        assert!(ctx.active_race_for("hustler-broke").is_none());

        assert!(!ctx.check_quorum(&mut race).unwrap());
        assert_eq!(ctx.telemetry().get_stats().bets_rejected, 1);
    }

    #[tokio::test]
    async fn test_entry_validation() {
        let config = config();
        let ctx = GameContext::new(config.clone()).unwrap();
        let ledger = funded_ledger(2);
        let mut race = populated_race(&ctx, &ledger, 2, 1).await;

        let err = ctx.add_worm(&mut race, worm(0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        let ghost = Hustler::new("hustler-1", 10.0, "worm-99", Currency::Sol).unwrap();
        let err = ctx.enter_hustler(&mut race, ghost, &ledger).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownWorm);

        let token = Currency::Token {
            mint: WORM_MINT.to_string(),
        };
        let wrong = Hustler::new("hustler-1", 10.0, "worm-0", token).unwrap();
        let err = ctx.enter_hustler(&mut race, wrong, &ledger).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CurrencyMismatch);

        // hustler-0 already holds a wager in this race
        let again = Hustler::new("hustler-0", 10.0, "worm-1", Currency::Sol).unwrap();
        let err = ctx.enter_hustler(&mut race, again, &ledger).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::WalletBusy);
    }

    #[tokio::test]
    async fn test_wallet_busy_across_races() {
        let config = config();
        let ctx = GameContext::new(config.clone()).unwrap();
        let ledger = funded_ledger(1);
        let mut first = populated_race(&ctx, &ledger, 1, 1).await;

        let mut second = ctx
            .create_race(Location::new(34.0522, -118.2437).unwrap(), "la", Currency::Sol)
            .unwrap();
        ctx.add_worm(&mut second, worm(0)).unwrap();
        let h = Hustler::new("hustler-0", 10.0, "worm-0", Currency::Sol).unwrap();
        let err = ctx.enter_hustler(&mut second, h, &ledger).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::WalletBusy);
        assert_eq!(ctx.active_race_for("hustler-0"), Some(first.id()));

        // entries close once the race leaves quorum check
        first.state = RaceState::Racing;
        let err = ctx.add_worm(&mut first, worm(9)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn test_worms_outside_circle_are_not_entered() {
        let config = config();
        let ctx = GameContext::new(config.clone()).unwrap();
        let ledger = funded_ledger(5);
        let mut race = populated_race(&ctx, &ledger, 5, 5).await;

        // one worm ~35 miles away from the origin
        race.worms[4].location = Location::new(NYC.0 + 0.5, NYC.1).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        ctx.run_to_completion(&mut race, &mut rng, &ledger).await.unwrap();

        assert_eq!(race.worm("worm-4").unwrap().outcome(), RaceOutcome::NotEntered);
        let record = race
            .report()
            .unwrap()
            .records
            .iter()
            .find(|r| r.worm_id == "worm-4")
            .unwrap()
            .clone();
        assert_eq!(record.payout, 0.0);
        assert!((record.fee - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_steps_are_ordered() {
        let config = config();
        let ctx = GameContext::new(config.clone()).unwrap();
        let ledger = funded_ledger(5);
        let mut race = populated_race(&ctx, &ledger, 5, 5).await;
        let mut rng = StdRng::seed_from_u64(1);

        assert!(ctx.run_race(&mut race, &mut rng).is_err());
        assert!(ctx.resolve_circle(&mut race, &mut rng).await.is_err());
        assert!(ctx.check_quorum(&mut race).unwrap());

        let err = ctx.settle_race(&mut race, &ledger).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        ctx.resolve_circle(&mut race, &mut rng).await.unwrap();
        let err = ctx.settle_race(&mut race, &ledger).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        ctx.run_race(&mut race, &mut rng).unwrap();
        let err = ctx.run_race(&mut race, &mut rng).unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyResolved);

        ctx.settle_race(&mut race, &ledger).await.unwrap();
        assert_eq!(race.state(), RaceState::Settled);
        assert!(ctx.settle_race(&mut race, &ledger).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_sweep_is_retryable() {
        let config = config();
        let ctx = GameContext::new(config.clone()).unwrap();
        let ledger = funded_ledger(5);
        let mut race = populated_race(&ctx, &ledger, 5, 5).await;
        let mut rng = StdRng::seed_from_u64(5);

        assert!(ctx.check_quorum(&mut race).unwrap());
        ctx.resolve_circle(&mut race, &mut rng).await.unwrap();
        ctx.run_race(&mut race, &mut rng).unwrap();

        ledger.set_reject_transfers(true);
        let err = ctx.settle_race(&mut race, &ledger).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransferFailed);
        assert_eq!(race.state(), RaceState::Racing);
        assert!((ctx.fee_ledger().total(&Currency::Sol) - 7.5).abs() < 1e-9);

        ledger.set_reject_transfers(false);
        let report = ctx.settle_race(&mut race, &ledger).await.unwrap();
        assert_eq!(report.records.len(), 5);
        assert!((report.fees_swept - 7.5).abs() < 1e-9);
        assert!((ledger.balance(&config.founder_identity, &Currency::Sol) - 7.5).abs() < 1e-9);
        assert!(ledger.balance(&config.house_identity, &Currency::Sol).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GameConfig {
            circle_halt_probability: 1.5,
            ..GameConfig::default()
        };
        let err = GameContext::new(config).err().unwrap();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }

    #[test]
    fn test_malformed_mint_holds_no_region() {
        let ctx = GameContext::default();
        let bad = Currency::Token {
            mint: "WormMint111".to_string(),
        };
        let err = ctx.create_race(nyc(), "owner", bad).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCurrency);
        assert!(ctx.registered_locations().is_empty());

        let token = Currency::Token {
            mint: WORM_MINT.to_string(),
        };
        assert!(ctx.create_race(nyc(), "owner", token).is_ok());
    }

    #[test]
    fn test_collusion_flags_are_counted() {
        let ctx = GameContext::default();
        ctx.record_communication("hustler-0", "worm-3");
        assert!(ctx.flag_if_close("hustler-0", "worm-3"));
        assert!(!ctx.flag_if_close("hustler-0", "stranger"));
        assert_eq!(ctx.telemetry().get_stats().collusion_flags, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let ctx = GameContext::default();
        let race = ctx.create_race(nyc(), "owner", Currency::Sol).unwrap();
        let json = serde_json::to_value(race.snapshot()).unwrap();
        assert_eq!(json["state"], "registered");
        assert_eq!(json["circle"]["state"], "uninitialized");
        assert_eq!(json["currency"]["kind"], "sol");
    }
}
