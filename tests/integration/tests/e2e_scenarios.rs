//! End-to-end scenario replays through the invariant harness.

use sim_engine::{AppliedEffect, EngineError, Event, StepOutcome};
use sim_integration_tests::{
    collateral_asset, harness_with_period, open, price_events, simple_position, ALICE, BOB, CAROL,
};

const PERIOD: u64 = 86_400;

#[test]
fn test_full_vault_lifecycle() {
    let mut h = harness_with_period(PERIOD);
    let mut events = price_events(2_000_000, 1_000_000);
    events.extend(vec![
        Event::Deposit { owner: ALICE, assets: 1_000_000 },
        Event::Donate { amount: 100_000, declared: true },
        Event::AdvanceTime { by: PERIOD },
        Event::Sync { observed_assets: None },
        open(ALICE, simple_position(1_000, 900)),
        // Healthy position: liquidation must bounce.
        Event::Liquidate { payer: BOB, owner: ALICE, position_id: sim_engine::PositionId(0) },
        // Collateral crashes 60%.
        Event::SetPrice { asset: collateral_asset(), price: 800_000 },
        Event::Liquidate { payer: BOB, owner: ALICE, position_id: sim_engine::PositionId(0) },
    ]);
    let report = h.run(events);

    assert!(report.passed(), "violations: {:?}", report.violations);

    // One full period elapsed: exactly half the declared profit released.
    assert_eq!(h.ledger().total_assets(), 1_000_000 + 50_000);
    assert_eq!(h.smoother().unreleased(), 50_000);

    // The early liquidation bounced, the post-crash one cleared the book.
    assert_eq!(
        report.steps[7].error(),
        Some(EngineError::HealthFactorAboveThreshold)
    );
    match &report.steps[9].outcome {
        StepOutcome::Applied { effect: AppliedEffect::Liquidated(outcome) } => {
            // Seizing debt value plus bonus exceeds the collateral at the
            // crashed price, so the whole position is consumed.
            assert_eq!(outcome.collateral_seized, 1_000);
            assert_eq!(outcome.collateral_returned, 0);
            assert_eq!(outcome.debt_repaid, 900);
        }
        other => panic!("liquidation did not apply: {:?}", other),
    }
    assert_eq!(h.graph().position_count(ALICE), 0);
}

#[test]
fn test_replay_continues_past_rejected_events() {
    let mut h = harness_with_period(PERIOD);
    let report = h.run(vec![
        Event::Withdraw { owner: ALICE, shares: 1 },
        open(BOB, simple_position(10, 5)), // no prices set yet: opens fine
        Event::Liquidate { payer: CAROL, owner: BOB, position_id: sim_engine::PositionId(0) },
        Event::Deposit { owner: ALICE, assets: 777 },
    ]);
    assert_eq!(report.steps[0].error(), Some(EngineError::InsufficientShares));
    assert!(report.steps[1].is_applied());
    assert_eq!(report.steps[2].error(), Some(EngineError::OracleUnavailable));
    assert!(report.steps[3].is_applied());
    assert_eq!(h.ledger().total_assets(), 777);
    assert!(report.passed(), "violations: {:?}", report.violations);
}

#[test]
fn test_untracked_donation_never_moves_share_price() {
    let mut h = harness_with_period(PERIOD);
    h.step(0, Event::Deposit { owner: ALICE, assets: 1_000_000 });
    let before = h.ledger().share_price().unwrap();

    h.step(1, Event::Donate { amount: 10_000_000, declared: false });
    h.step(2, Event::Deposit { owner: BOB, assets: 1_000_000 });

    assert_eq!(h.ledger().share_price().unwrap(), before);
    assert_eq!(h.ledger().quarantined_assets(), 10_000_000);
    // Both depositors paid the same price for the same stake.
    assert_eq!(h.ledger().balance_of(ALICE), h.ledger().balance_of(BOB));
}

#[test]
fn test_sync_cadence_does_not_change_total_release() {
    let total_time = 5 * PERIOD + 1_234;

    let mut frequent = harness_with_period(PERIOD);
    frequent.step(0, Event::Donate { amount: 999_983, declared: true });
    let mut idx = 1;
    for _ in 0..40 {
        frequent.step(idx, Event::AdvanceTime { by: total_time / 40 });
        frequent.step(idx + 1, Event::Sync { observed_assets: None });
        idx += 2;
    }
    frequent.step(idx, Event::AdvanceTime { by: total_time % 40 });
    frequent.step(idx + 1, Event::Sync { observed_assets: None });

    let mut lazy = harness_with_period(PERIOD);
    lazy.step(0, Event::Donate { amount: 999_983, declared: true });
    lazy.step(1, Event::AdvanceTime { by: total_time });
    lazy.step(2, Event::Sync { observed_assets: None });

    assert_eq!(
        frequent.smoother().released_so_far(),
        lazy.smoother().released_so_far()
    );
    assert!(lazy.smoother().released_so_far() <= 999_983);
}

#[test]
fn test_position_creation_needs_consent() {
    let mut h = harness_with_period(PERIOD);
    let denied = h.step(0, Event::OpenPosition {
        caller: BOB,
        owner: ALICE,
        terms: simple_position(100, 10),
    });
    assert_eq!(denied.error(), Some(EngineError::ConsentRequired));

    h.step(1, Event::AuthorizeCreator { owner: ALICE, creator: BOB });
    let allowed = h.step(2, Event::OpenPosition {
        caller: BOB,
        owner: ALICE,
        terms: simple_position(100, 10),
    });
    assert!(allowed.is_applied());
    assert_eq!(h.graph().position_count(ALICE), 1);
}

#[test]
fn test_report_serializes_to_json() {
    let mut h = harness_with_period(PERIOD);
    let report = h.run(vec![
        Event::Deposit { owner: ALICE, assets: 42 },
        Event::Withdraw { owner: ALICE, shares: 1 },
    ]);
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"type\":\"deposit\""));
    assert!(json.contains("\"violations\":[]"));
}
