// Prometheus metrics definitions for the coinrush backend.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Live WebSocket connections.
    pub static ref CONNECTED_WEBSOCKETS: IntGauge =
        IntGauge::new("coinrush_connected_websockets", "Live WebSocket connections").unwrap();

    /// Players currently in the roster.
    pub static ref ACTIVE_PLAYERS: IntGauge =
        IntGauge::new("coinrush_active_players", "Players currently in the roster").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total rounds started.
    pub static ref GAMES_STARTED_TOTAL: IntCounter =
        IntCounter::new("coinrush_games_started_total", "Total games started").unwrap();

    /// Total rounds that ran their countdown to zero.
    pub static ref GAMES_COMPLETED_TOTAL: IntCounter =
        IntCounter::new("coinrush_games_completed_total", "Total games completed").unwrap();

    /// Total WebSocket messages queued to clients.
    pub static ref WEBSOCKET_MESSAGES_SENT_TOTAL: IntCounter = IntCounter::new(
        "coinrush_websocket_messages_sent_total",
        "Total WebSocket messages sent",
    )
    .unwrap();

    /// Frames dropped because a client's outbound queue was full.
    pub static ref OUTBOUND_FRAMES_DROPPED_TOTAL: IntCounter = IntCounter::new(
        "coinrush_outbound_frames_dropped_total",
        "Frames dropped for clients that stopped reading",
    )
    .unwrap();

    /// Frames that failed to parse or were sent for the wrong session.
    pub static ref PROTOCOL_ERRORS_TOTAL: IntCounter = IntCounter::new(
        "coinrush_protocol_errors_total",
        "Malformed or unauthorized client messages",
    )
    .unwrap();

    /// Rejected joins, by reason.
    pub static ref ADMISSION_REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coinrush_admission_rejections_total", "Rejected join attempts"),
        &["reason"],
    )
    .unwrap();

    /// Coins spawned, by kind.
    pub static ref COINS_SPAWNED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coinrush_coins_spawned_total", "Total coins spawned"),
        &["kind"],
    )
    .unwrap();

    /// Coins collected, by kind.
    pub static ref COINS_COLLECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coinrush_coins_collected_total", "Total coins collected"),
        &["kind"],
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(CONNECTED_WEBSOCKETS.clone()),
            Box::new(ACTIVE_PLAYERS.clone()),
            Box::new(GAMES_STARTED_TOTAL.clone()),
            Box::new(GAMES_COMPLETED_TOTAL.clone()),
            Box::new(WEBSOCKET_MESSAGES_SENT_TOTAL.clone()),
            Box::new(OUTBOUND_FRAMES_DROPPED_TOTAL.clone()),
            Box::new(PROTOCOL_ERRORS_TOTAL.clone()),
            Box::new(ADMISSION_REJECTIONS_TOTAL.clone()),
            Box::new(COINS_SPAWNED_TOTAL.clone()),
            Box::new(COINS_COLLECTED_TOTAL.clone()),
        ];

        for c in collectors {
            REGISTRY.register(c).expect("failed to register metric");
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
