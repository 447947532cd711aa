//! Integration tests for Galactic Hustlers

use galactic_hustlers::core::compute_payout;
use galactic_hustlers::models::{Currency, ErrorCode, GameConfig, Location, RaceOutcome, RaceState};
use galactic_hustlers::{distance_miles, GameContext, Hustler, InMemoryLedger, Worm};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn test_config() -> GameConfig {
    GameConfig {
        circle_jitter_degrees: 0.001,
        ..GameConfig::default()
    }
    .without_step_delay()
}

fn loc(lat: f64, lon: f64) -> Location {
    Location::new(lat, lon).unwrap()
}

/// Opens a race at `origin` with five Worms on the origin and five funded Hustlers
async fn open_race(
    ctx: &GameContext,
    ledger: &InMemoryLedger,
    origin: Location,
    prefix: &str,
) -> galactic_hustlers::GalacticRace {
    let mut race = ctx.create_race(origin, prefix, Currency::Sol).unwrap();
    let home = loc(origin.latitude + 0.1, origin.longitude);
    for i in 0..5 {
        let worm = Worm::new(format!("{}-worm-{}", prefix, i), origin, home).with_nft_bonus(i == 0);
        ctx.add_worm(&mut race, worm).unwrap();
    }
    for i in 0..5 {
        let id = format!("{}-hustler-{}", prefix, i);
        ledger.deposit(&id, &Currency::Sol, 50.0).unwrap();
        let hustler = Hustler::new(&id, 10.0, format!("{}-worm-{}", prefix, i), Currency::Sol).unwrap();
        ctx.enter_hustler(&mut race, hustler, ledger).await.unwrap();
    }
    race
}

#[tokio::test]
async fn test_end_to_end_payouts_match_payout_table() {
    let config = test_config();
    let ctx = GameContext::new(config.clone()).unwrap();
    let ledger = InMemoryLedger::new();

    let mut race = open_race(&ctx, &ledger, loc(51.5074, -0.1278), "ldn").await;
    let mut rng = StdRng::seed_from_u64(2024);
    let state = ctx.run_to_completion(&mut race, &mut rng, &ledger).await.unwrap();
    assert_eq!(state, RaceState::Settled);

    let report = race.report().unwrap();
    for record in &report.records {
        let worm = race.worm(&record.worm_id).unwrap();
        assert_eq!(record.outcome, worm.outcome());
        let expected = compute_payout(
            record.wager,
            record.outcome,
            worm.nft_bonus,
            config.founder_fee_percentage,
            config.nft_bonus_multiplier,
        );
        assert!((record.payout - expected.payout).abs() < 1e-9);
        assert!((record.fee - 1.5).abs() < 1e-9);
    }

    // wagers went to the worms, fees came back out of them
    assert_eq!(ledger.balance("ldn-hustler-0", &Currency::Sol), 40.0);
    assert!((ledger.balance("ldn-worm-0", &Currency::Sol) - 8.5).abs() < 1e-9);
    assert!((ledger.balance(&config.founder_identity, &Currency::Sol) - 7.5).abs() < 1e-9);
    assert!(ledger.balance(&config.house_identity, &Currency::Sol).abs() < 1e-9);
}

#[tokio::test]
async fn test_concurrent_races_share_one_fee_ledger() {
    let config = test_config();
    let ctx = GameContext::new(config.clone()).unwrap();
    let ledger = InMemoryLedger::new();

    let mut paris = open_race(&ctx, &ledger, loc(48.8566, 2.3522), "par").await;
    let mut berlin = open_race(&ctx, &ledger, loc(52.5200, 13.4050), "ber").await;

    let mut rng_a = StdRng::seed_from_u64(1);
    let mut rng_b = StdRng::seed_from_u64(2);
    let (a, b) = tokio::join!(
        ctx.run_to_completion(&mut paris, &mut rng_a, &ledger),
        ctx.run_to_completion(&mut berlin, &mut rng_b, &ledger),
    );
    assert_eq!(a.unwrap(), RaceState::Settled);
    assert_eq!(b.unwrap(), RaceState::Settled);

    // each race sweeps only its own fees
    assert!((paris.report().unwrap().fees_swept - 7.5).abs() < 1e-9);
    assert!((berlin.report().unwrap().fees_swept - 7.5).abs() < 1e-9);
    assert!((ledger.balance(&config.founder_identity, &Currency::Sol) - 15.0).abs() < 1e-9);
    assert!(ctx.fee_ledger().total(&Currency::Sol).abs() < 1e-9);
    assert_eq!(ctx.telemetry().get_stats().races_settled, 2);
}

#[tokio::test]
async fn test_settled_region_can_host_a_new_race() {
    let config = test_config();
    let ctx = GameContext::new(config.clone()).unwrap();
    let ledger = InMemoryLedger::new();
    let tokyo = loc(35.6762, 139.6503);

    let mut race = open_race(&ctx, &ledger, tokyo, "tyo").await;
    let err = ctx.create_race(tokyo, "rival", Currency::Sol).unwrap_err();
    assert_eq!(err.code, ErrorCode::LocationTooClose);

    let mut rng = StdRng::seed_from_u64(9);
    ctx.run_to_completion(&mut race, &mut rng, &ledger).await.unwrap();

    // region and wallets are free again
    let mut rematch = open_race(&ctx, &ledger, tokyo, "tyo").await;
    assert_eq!(rematch.state(), RaceState::Registered);
    assert_eq!(
        ctx.run_to_completion(&mut rematch, &mut rng, &ledger).await.unwrap(),
        RaceState::Settled
    );
}

#[tokio::test]
async fn test_worm_at_home_is_disqualified_in_race() {
    let config = test_config();
    let ctx = GameContext::new(config.clone()).unwrap();
    let ledger = InMemoryLedger::new();
    let origin = loc(-33.8688, 151.2093);

    let mut race = ctx.create_race(origin, "syd", Currency::Sol).unwrap();
    for i in 0..5 {
        // worm-0 is still at home
        let home = if i == 0 { origin } else { loc(origin.latitude + 0.1, origin.longitude) };
        ctx.add_worm(&mut race, Worm::new(format!("worm-{}", i), origin, home))
            .unwrap();
    }
    for i in 0..5 {
        let id = format!("h{}", i);
        ledger.deposit(&id, &Currency::Sol, 20.0).unwrap();
        let h = Hustler::new(&id, 10.0, "worm-0", Currency::Sol).unwrap();
        ctx.enter_hustler(&mut race, h, &ledger).await.unwrap();
    }

    let mut rng = StdRng::seed_from_u64(4);
    ctx.run_to_completion(&mut race, &mut rng, &ledger).await.unwrap();

    assert_eq!(race.worm("worm-0").unwrap().outcome(), RaceOutcome::Disqualified);
    let report = race.report().unwrap();
    assert!(report.records.iter().all(|r| r.payout == 0.0));
    assert_eq!(report.total_payout, 0.0);
    assert!((report.fees_collected - 7.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_token_race_settles_without_house_funding() {
    let config = test_config();
    let ctx = GameContext::new(config.clone()).unwrap();
    let ledger = InMemoryLedger::new();
    let mint = Currency::Token {
        mint: "WormMint11111111111111111111111111111111111".to_string(),
    };
    let origin = loc(19.4326, -99.1332);

    let mut race = ctx.create_race(origin, "cdmx", mint.clone()).unwrap();
    let home = loc(origin.latitude + 0.1, origin.longitude);
    for i in 0..5 {
        ctx.add_worm(&mut race, Worm::new(format!("worm-{}", i), origin, home))
            .unwrap();
    }
    for i in 0..5 {
        let id = format!("h{}", i);
        ledger.deposit(&id, &mint, 100.0).unwrap();
        let h = Hustler::new(&id, 100.0, format!("worm-{}", i), mint.clone()).unwrap();
        ctx.enter_hustler(&mut race, h, &ledger).await.unwrap();
    }

    let mut rng = StdRng::seed_from_u64(77);
    let state = ctx.run_to_completion(&mut race, &mut rng, &ledger).await.unwrap();
    assert_eq!(state, RaceState::Settled);

    let report = race.report().unwrap();
    assert!((report.fees_swept - 75.0).abs() < 1e-9);
    assert!((ledger.balance(&config.founder_identity, &mint) - 75.0).abs() < 1e-9);
    assert!(ledger.balance(&config.house_identity, &mint).abs() < 1e-9);
    let on_worms: f64 = (0..5)
        .map(|i| ledger.balance(&format!("worm-{}", i), &mint))
        .sum();
    assert!((on_worms - 425.0).abs() < 1e-9);

    // wallets and region released
    assert!(ctx.active_race_for("h0").is_none());
    assert!(ctx.registered_locations().is_empty());
    assert!(ctx.fee_ledger().total(&mint).abs() < 1e-9);
}

#[test]
fn test_far_apart_locations_are_both_accepted() {
    let ctx = GameContext::default();
    let cities = [
        (40.7128, -74.0060),
        (34.0522, -118.2437),
        (41.8781, -87.6298),
        (29.7604, -95.3698),
        (39.9526, -75.1652),
        (47.6062, -122.3321),
    ];
    for (i, (lat, lon)) in cities.iter().enumerate() {
        ctx.register_location(loc(*lat, *lon), &format!("city-{}", i))
            .unwrap();
    }
    assert_eq!(ctx.registered_locations().len(), cities.len());

    // every registered pair is more than the game radius apart
    let registered = ctx.registered_locations();
    for a in &registered {
        for b in &registered {
            if a.owner != b.owner {
                assert!(distance_miles(&a.location, &b.location) > ctx.config().game_radius_miles);
            }
        }
    }
}

#[test]
fn test_collusion_end_to_end() {
    let ctx = GameContext::default();
    ctx.record_communication("hustler-a", "worm-x");
    ctx.record_communication("worm-x", "hustler-b");
    ctx.record_communication("hustler-b", "hustler-c");

    assert!(ctx.flag_if_close("hustler-a", "worm-x"));
    assert!(ctx.flag_if_close("hustler-a", "hustler-b"));
    assert!(!ctx.flag_if_close("hustler-a", "hustler-c"));
    assert!(!ctx.flag_if_close("hustler-a", "nobody"));
    assert_eq!(ctx.telemetry().get_stats().collusion_flags, 2);
}
