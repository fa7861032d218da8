// src/observability/mod.rs
//! Logging and metrics setup
//!
//! - **Tracing**: `tracing-subscriber` with an `EnvFilter` (`RUST_LOG`,
//!   default `info`), compact or JSON output (`ELVES_LOG_FORMAT=json`)
//! - **Metrics**: `metrics` facade, optionally exported over HTTP by the
//!   Prometheus exporter
//!
//! The simulation core records through the facade unconditionally; with no
//! recorder installed the calls cost next to nothing.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log format
pub const LOG_FORMAT_ENV: &str = "ELVES_LOG_FORMAT";

/// Metric names
pub mod names {
    /// Elves activated (periodic and replicated), by kind
    pub const SPAWNED: &str = "elves_spawned_total";

    /// Successful replications, by kind
    pub const REPLICATED: &str = "elves_replicated_total";

    /// Elves that entered `Exploding`, by kind
    pub const EXPLODED: &str = "elves_exploded_total";

    /// Elves returned to their pool after exploding, by kind
    pub const DESTROYED: &str = "elves_destroyed_total";

    /// Contacts dropped by collision dedup
    pub const DUPLICATE_COLLISIONS: &str = "elves_duplicate_collisions_total";

    /// Spawns abandoned for lack of a valid position, by kind
    pub const PLACEMENT_FAILURES: &str = "elves_placement_failures_total";

    /// Draws refused by a bounded pool at capacity, by kind
    pub const POOL_EXHAUSTED: &str = "elves_pool_exhausted_total";

    /// Elves stranded outside any pool
    pub const INERT: &str = "elves_inert_total";

    /// Live elves, by kind
    pub const POPULATION: &str = "elves_population";

    /// Wall-clock time spent in one world tick (seconds)
    pub const TICK_SECONDS: &str = "elves_tick_seconds";
}

/// Install the global tracing subscriber
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;
    } else {
        builder
            .compact()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;
    }
    Ok(())
}

/// Install the Prometheus recorder, serving `/metrics` on `addr` when given.
///
/// The HTTP listener runs on the ambient tokio runtime.
pub fn init_metrics(addr: Option<&str>) -> Result<()> {
    match addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .with_context(|| format!("invalid metrics address {}", addr))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install Prometheus exporter")?;
            info!("Prometheus metrics on http://{}/metrics", addr);
        }
        None => {
            PrometheusBuilder::new()
                .install_recorder()
                .context("failed to install metrics recorder")?;
        }
    }
    Ok(())
}
