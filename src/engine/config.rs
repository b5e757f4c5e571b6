// Game tuning constants and the per-process settings derived from them.

use std::time::Duration;

// Arena dimensions in pixels
pub const ARENA_WIDTH: f64 = 800.0;
pub const ARENA_HEIGHT: f64 = 600.0;

// Player spawn placement
pub const SPAWN_MARGIN: f64 = 40.0;
pub const SPAWN_CLEARANCE: f64 = 60.0;
pub const SPAWN_ATTEMPTS: usize = 50;
pub const SPAWN_FALLBACK_MARGIN: f64 = 20.0;

// Coins are placed anywhere inside this margin
pub const COIN_MARGIN: f64 = 10.0;

pub const MAX_PLAYERS: usize = 4;
pub const MIN_PLAYERS_TO_START: usize = 2;
pub const ROUND_SECONDS: u32 = 60;
pub const NORMAL_COIN_FLOOR: usize = 10;

pub const SPEED_BOOST_MS: u64 = 1000;
pub const FREEZE_MS: i64 = 3000;

// Background task cadences
pub const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);
pub const NORMAL_COIN_PERIOD: Duration = Duration::from_secs(2);
pub const BONUS_COIN_PERIOD: Duration = Duration::from_secs(6);
pub const HAZARD_COIN_PERIOD: Duration = Duration::from_secs(15);

// Frames a connection may have queued before new ones are dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

pub const BACKGROUNDS: [&str; 4] = [
    "backgrounds/forest.png",
    "backgrounds/city.png",
    "backgrounds/lava.png",
    "backgrounds/ice.png",
];

/// Per-session tuning. Defaults mirror the constants above; the round length and
/// capacity can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct GameSettings {
    pub max_players: usize,
    pub min_players_to_start: usize,
    pub round_seconds: u32,
    pub normal_coin_floor: usize,
    pub speed_boost_ms: u64,
    pub freeze_ms: i64,
    pub countdown_period: Duration,
    pub normal_coin_period: Duration,
    pub bonus_coin_period: Duration,
    pub hazard_coin_period: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_players: MAX_PLAYERS,
            min_players_to_start: MIN_PLAYERS_TO_START,
            round_seconds: ROUND_SECONDS,
            normal_coin_floor: NORMAL_COIN_FLOOR,
            speed_boost_ms: SPEED_BOOST_MS,
            freeze_ms: FREEZE_MS,
            countdown_period: COUNTDOWN_PERIOD,
            normal_coin_period: NORMAL_COIN_PERIOD,
            bonus_coin_period: BONUS_COIN_PERIOD,
            hazard_coin_period: HAZARD_COIN_PERIOD,
        }
    }
}
