// Prometheus metrics definitions for the spheres backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Players currently registered in the game.
    pub static ref PLAYERS: IntGauge =
        IntGauge::new("spheres_players", "Players currently registered").unwrap();

    /// Live WebSocket connections.
    pub static ref CONNECTED_WEBSOCKETS: IntGauge =
        IntGauge::new("spheres_connected_websockets", "Live WebSocket connections").unwrap();

    /// Resource tokens currently active on the grid.
    pub static ref ACTIVE_RESOURCES: IntGauge =
        IntGauge::new("spheres_active_resources", "Resource tokens currently active").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total simulation ticks executed.
    pub static ref TICKS_TOTAL: IntCounter =
        IntCounter::new("spheres_ticks_total", "Total simulation ticks executed").unwrap();

    /// Snapshot sends dropped because a subscriber's buffer was full.
    pub static ref SNAPSHOT_SENDS_DROPPED_TOTAL: IntCounter = IntCounter::new(
        "spheres_snapshot_sends_dropped_total",
        "Snapshot sends dropped due to full subscriber buffers",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Per-tick processing time in milliseconds.
    pub static ref TICK_DURATION_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("spheres_tick_duration_ms", "Per-tick processing time in ms")
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PLAYERS.clone()),
        Box::new(CONNECTED_WEBSOCKETS.clone()),
        Box::new(ACTIVE_RESOURCES.clone()),
        Box::new(TICKS_TOTAL.clone()),
        Box::new(SNAPSHOT_SENDS_DROPPED_TOTAL.clone()),
        Box::new(TICK_DURATION_MS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        register_metrics();
        let output = gather_metrics();
        assert!(output.is_empty() || output.contains("spheres_"));
    }

    #[test]
    fn test_metric_increments() {
        PLAYERS.set(3);
        assert_eq!(PLAYERS.get(), 3);
        PLAYERS.set(0);

        CONNECTED_WEBSOCKETS.inc();
        CONNECTED_WEBSOCKETS.dec();

        ACTIVE_RESOURCES.set(12);
        assert_eq!(ACTIVE_RESOURCES.get(), 12);

        TICKS_TOTAL.inc();
        SNAPSHOT_SENDS_DROPPED_TOTAL.inc();
        TICK_DURATION_MS.observe(1.5);
    }
}
