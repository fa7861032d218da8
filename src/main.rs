// src/main.rs
//! Exploding Elves headless runner
//!
//! Steps one world at the configured tick rate, logs lifecycle events and a
//! periodic population report, and optionally serves Prometheus metrics.
//!
//! ```text
//! exploding-elves [CONFIG] [--print-config]
//! ```

use anyhow::{Context, Result};
use exploding_elves_engine::observability::{init_metrics, init_tracing};
use exploding_elves_engine::utils::config::EngineConfig;
use exploding_elves_engine::{ElfKind, World};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let mut config_path = None;
    let mut print_config = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--print-config" => print_config = true,
            _ => config_path = Some(arg),
        }
    }

    // Load configuration
    let config = match &config_path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => EngineConfig::load().context("failed to load configuration")?,
    };

    if print_config {
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    init_metrics(config.session.metrics_addr.as_deref())?;
    info!("Starting Exploding Elves engine v{}", exploding_elves_engine::VERSION);

    let tick_rate = config.session.tick_rate_hz;
    let run_seconds = config.session.run_seconds;
    let report_every = config.session.report_interval_secs;

    let mut world = World::new(config)?;
    info!("Session {} running at {} Hz", world.session_id(), tick_rate);

    let dt = 1.0 / tick_rate as f32;
    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut next_report = report_every;

    // Graceful shutdown handler
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Received shutdown signal, stopping");
                break;
            }
            _ = ticker.tick() => {
                step(&mut world, dt);

                let now = world.now();
                if now >= next_report {
                    next_report = now + report_every;
                    report(&world);
                }

                if run_seconds.is_some_and(|limit| now >= limit) {
                    info!("Run time limit reached at t={:.1}s", now);
                    break;
                }
            }
        }
    }

    report(&world);
    let stats = world.stats();
    info!(
        "Session {} finished: {} frames, {} spawned ({} replicated), {} destroyed, {} inert",
        stats.session_id, stats.frames, stats.spawned, stats.replicated, stats.destroyed, stats.inert
    );

    Ok(())
}

/// Advance one frame and log the events it produced. Returns how many.
fn step(world: &mut World, dt: f32) -> usize {
    world.tick(dt);

    let events = world.drain_events();
    for event in &events {
        match serde_json::to_string(event) {
            Ok(line) => debug!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
    }
    events.len()
}

fn report(world: &World) {
    let counts: Vec<String> = ElfKind::ALL
        .iter()
        .map(|kind| format!("{}={}", kind, world.population(*kind)))
        .collect();
    let stats = world.stats();
    info!(
        "t={:.1}s population [{}] live={} pairs: {} replicated, {} exploded, {} duplicate contacts",
        world.now(),
        counts.join(" "),
        stats.live,
        stats.replication_pairs,
        stats.explosion_pairs,
        stats.collisions.duplicates
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_drives_owned_world() {
        let mut config = EngineConfig::default();
        config.session.seed = Some(7);
        let mut world = World::new(config).unwrap();

        // first frame runs the initial spawns
        assert!(step(&mut world, 1.0 / 60.0) >= 4);
        for _ in 0..59 {
            step(&mut world, 1.0 / 60.0);
        }
        report(&world);

        assert_eq!(world.frame(), 60);
        assert!(world.drain_events().is_empty());
        assert!(world.live_count() >= 4);
    }
}
