//! Scenario runner
//!
//! Replays a TOML scenario through the invariant harness, surveys the
//! surviving positions into a health queue, and emits the full report as
//! JSON on stdout. Exits non-zero when any invariant was violated so CI
//! can gate on it.

mod config;
mod health_queue;

use anyhow::Result;
use config::Scenario;
use health_queue::{HealthQueue, OwnerHealth};
use sim_engine::{Event, InvariantHarness, PRICE_SCALE};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let scenario = Scenario::load().unwrap_or_else(|e| {
        log::warn!("Failed to load scenario ({e:#}), running built-in demo");
        Scenario::default_demo()
    });

    log::info!(
        "Replaying scenario '{}': {} events, smoothing period {}",
        scenario.name,
        scenario.events.len(),
        scenario.smoothing_period
    );

    let mut harness = InvariantHarness::new(scenario.engine_config())?;
    let events: Vec<Event> = scenario.events.iter().cloned().map(Into::into).collect();
    let report = harness.run(events);

    for step in report.steps.iter().filter(|s| !s.is_applied()) {
        log::info!("event {} rejected: {:?}", step.index, step.event);
    }

    let queue = survey_health(&harness);
    let threshold = harness.graph().config().liquidation_threshold;
    for owner in queue.liquidatable(threshold) {
        log::warn!(
            "owner {} liquidatable: health {:.6}, {} open positions",
            owner.owner,
            owner.health as f64 / PRICE_SCALE as f64,
            owner.position_count
        );
    }
    for owner in queue.alert_candidates(threshold, u128::from(scenario.health_alert_threshold)) {
        log::info!(
            "owner {} near threshold: health {:.6}",
            owner.owner,
            owner.health as f64 / PRICE_SCALE as f64
        );
    }
    if let Some(worst) = queue.peek() {
        log::info!(
            "worst surviving health: owner {} at {:.6}",
            worst.owner,
            worst.health as f64 / PRICE_SCALE as f64
        );
    }

    if report.passed() {
        log::info!("all invariants held across {} events", report.steps.len());
    } else {
        for violation in &report.violations {
            log::error!(
                "invariant '{}' violated at event {}: observed {}, expected {}",
                violation.invariant,
                violation.event_index,
                violation.observed,
                violation.expected
            );
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Snapshot every owner with open positions into the health queue.
fn survey_health(harness: &InvariantHarness) -> HealthQueue {
    let mut queue = HealthQueue::new();
    let graph = harness.graph();
    for owner in graph.owners() {
        let count = graph.position_count(owner);
        if count == 0 {
            continue;
        }
        match graph.health_factor(owner, harness.oracle()) {
            Ok(health) => queue.push(OwnerHealth {
                owner,
                health,
                position_count: count,
                as_of: harness.now(),
            }),
            Err(e) => log::warn!("health unavailable for owner {owner}: {e}"),
        }
    }
    queue
}
