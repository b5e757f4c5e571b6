// Session state machine: lobby, countdown-gated rounds, and intent routing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;

use crate::metrics;

use super::config::{GameSettings, BACKGROUNDS};
use super::economy::{CoinEconomy, PickupEffect};
use super::player::{PlayerMap, SessionId};
use super::protocol::{ClientMessage, MenuAction, ServerMessage};
use super::roster::Roster;

/// Lifecycle phase of the shared session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Lobby,
    Playing,
}

/// Background timers that drive the session while a round is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Countdown,
    NormalCoin,
    BonusCoin,
    HazardCoin,
}

/// Rejected start/restart requests. The display text is shown to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Only the leader can start the game")]
    NotLeaderStart,
    #[error("Only the leader can restart the game")]
    NotLeaderRestart,
    #[error("You must have minimum {0} players to start the game")]
    NotEnoughPlayers(usize),
    #[error("Game has already started")]
    AlreadyStarted,
    #[error("No game in progress")]
    NotPlaying,
}

/// Side effects produced by the state machine, applied by the gateway in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send to the connection that triggered the change.
    Reply(ServerMessage),
    /// Send to every open connection.
    Broadcast(ServerMessage),
    /// Bind the triggering connection to this session id.
    Bind(SessionId),
    /// Close the triggering connection.
    Close,
}

/// Point-in-time view of the session for the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub phase: Phase,
    pub players: PlayerMap,
    pub leader_id: Option<SessionId>,
    pub game_time: u32,
    pub coins: usize,
    pub connections: usize,
}

/// The whole shared game session. Owned by exactly one task; every method runs to
/// completion before the caller sends the resulting effects.
pub struct Game {
    settings: GameSettings,
    phase: Phase,
    roster: Roster,
    economy: CoinEconomy,
    countdown: u32,
    background: String,
    /// Incremented on every entry into `Playing`, so the owner can recreate timers.
    round: u64,
    rng: StdRng,
}

impl Game {
    pub fn new(settings: GameSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    pub fn with_seed(settings: GameSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: GameSettings, rng: StdRng) -> Self {
        Self {
            phase: Phase::Lobby,
            roster: Roster::new(settings.max_players),
            economy: CoinEconomy::new(settings.normal_coin_floor),
            countdown: settings.round_seconds,
            background: BACKGROUNDS[0].to_string(),
            round: 0,
            rng,
            settings,
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn background(&self) -> &str {
        &self.background
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn economy(&self) -> &CoinEconomy {
        &self.economy
    }

    pub fn status(&self, connections: usize) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            players: self.roster.snapshot(),
            leader_id: self.roster.leader().cloned(),
            game_time: self.countdown,
            coins: self.economy.coins().len(),
            connections,
        }
    }

    /// Route one intent. The caller has already checked that the sender may act as
    /// `msg.session_id()`.
    pub fn handle(&mut self, msg: ClientMessage, now_ms: i64) -> Vec<Effect> {
        match msg {
            ClientMessage::Join { id, name } => self.join(&id, &name),
            ClientMessage::StartGame { id } => self.start_game(&id).unwrap_or_else(reject),
            ClientMessage::Restart { id } => self.restart(&id).unwrap_or_else(reject),
            ClientMessage::Move { id, x, y } => self.move_player(&id, x, y, now_ms),
            ClientMessage::Pickup { id, coin_id } => self.pickup(&id, &coin_id, now_ms),
            ClientMessage::Pause { id } => self.menu(&id, MenuAction::Pause),
            ClientMessage::Resume { id } => self.menu(&id, MenuAction::Resume),
            ClientMessage::Quit { id } => self.menu(&id, MenuAction::Quit),
        }
    }

    /// Admit a new player in the lobby, or reattach a known session mid-game.
    pub fn join(&mut self, id: &str, name: &str) -> Vec<Effect> {
        if self.phase == Phase::Playing {
            if self.roster.contains(id) {
                tracing::info!(session = id, "Session rejoined running game");
                return vec![
                    Effect::Bind(id.to_string()),
                    Effect::Reply(ServerMessage::Rejoin {
                        players: self.roster.snapshot(),
                        leader_id: self.roster.leader().cloned(),
                        coins: self.economy.coins().to_vec(),
                        game_time: self.countdown,
                    }),
                ];
            }
            metrics::ADMISSION_REJECTIONS_TOTAL
                .with_label_values(&["mid_game"])
                .inc();
            return vec![
                Effect::Reply(ServerMessage::error(LifecycleError::AlreadyStarted.to_string())),
                Effect::Close,
            ];
        }

        if let Err(e) = self.roster.admit(id, name, &mut self.rng) {
            tracing::info!(session = id, name, "Join rejected: {e}");
            metrics::ADMISSION_REJECTIONS_TOTAL
                .with_label_values(&[e.reason()])
                .inc();
            return vec![Effect::Reply(ServerMessage::error(e.to_string()))];
        }
        metrics::ACTIVE_PLAYERS.set(self.roster.len() as i64);
        tracing::info!(session = id, name, players = self.roster.len(), "Player joined");

        vec![
            Effect::Bind(id.to_string()),
            Effect::Reply(ServerMessage::ClearError),
            Effect::Broadcast(self.lobby_message()),
            Effect::Broadcast(self.players_message()),
        ]
    }

    /// LOBBY -> PLAYING, leader only, with enough players.
    pub fn start_game(&mut self, id: &str) -> Result<Vec<Effect>, LifecycleError> {
        if !self.roster.is_leader(id) {
            return Err(LifecycleError::NotLeaderStart);
        }
        if self.phase == Phase::Playing {
            return Err(LifecycleError::AlreadyStarted);
        }
        let needed = self.settings.min_players_to_start;
        if self.roster.len() < needed {
            return Err(LifecycleError::NotEnoughPlayers(needed));
        }

        self.background = BACKGROUNDS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(BACKGROUNDS[0])
            .to_string();
        self.roster.reset_scores();
        self.roster.clear_freezes();
        self.begin_round();
        metrics::GAMES_STARTED_TOTAL.inc();
        tracing::info!(
            leader = id,
            players = self.roster.len(),
            background = %self.background,
            "Game started"
        );

        Ok(vec![Effect::Broadcast(self.game_start_message())])
    }

    /// PLAYING -> PLAYING with a fresh arena, leader only.
    pub fn restart(&mut self, id: &str) -> Result<Vec<Effect>, LifecycleError> {
        if !self.roster.is_leader(id) {
            return Err(LifecycleError::NotLeaderRestart);
        }
        if self.phase != Phase::Playing {
            return Err(LifecycleError::NotPlaying);
        }

        self.roster.scatter(&mut self.rng);
        self.roster.reset_scores();
        self.roster.clear_freezes();
        self.begin_round();
        tracing::info!(leader = id, "Game restarted");

        Ok(vec![
            Effect::Broadcast(self.players_message()),
            Effect::Broadcast(self.game_start_message()),
            Effect::Broadcast(ServerMessage::MenuAction {
                action: MenuAction::Restart,
                name: self.roster.display_name(id),
            }),
        ])
    }

    fn begin_round(&mut self) {
        self.phase = Phase::Playing;
        self.economy.repopulate(&mut self.rng);
        self.countdown = self.settings.round_seconds;
        self.round += 1;
    }

    pub fn move_player(&mut self, id: &str, x: f64, y: f64, now_ms: i64) -> Vec<Effect> {
        if !self.roster.set_position(id, x, y, now_ms) {
            return Vec::new();
        }
        vec![Effect::Broadcast(self.players_message())]
    }

    pub fn pickup(&mut self, id: &str, coin_id: &str, now_ms: i64) -> Vec<Effect> {
        if self.phase != Phase::Playing || !self.roster.contains(id) {
            return Vec::new();
        }
        let freeze_ms = self.settings.freeze_ms;
        let Some(effect) =
            self.economy
                .pickup(&mut self.roster, id, coin_id, now_ms, freeze_ms, &mut self.rng)
        else {
            tracing::debug!(session = id, coin = coin_id, "Pickup of missing coin ignored");
            return Vec::new();
        };

        let mut effects = Vec::with_capacity(3);
        match effect {
            PickupEffect::Scored(score) => {
                tracing::debug!(session = id, score, "Coin collected");
            }
            PickupEffect::SpeedBoost => {
                effects.push(Effect::Broadcast(ServerMessage::SpeedBoost {
                    id: id.to_string(),
                    duration: self.settings.speed_boost_ms,
                }));
            }
            PickupEffect::Froze(until) => {
                tracing::info!(session = id, until, "Freeze coin collected");
            }
        }
        effects.push(Effect::Broadcast(self.players_message()));
        effects.push(Effect::Broadcast(self.coins_message()));
        effects
    }

    pub fn menu(&mut self, id: &str, action: MenuAction) -> Vec<Effect> {
        vec![Effect::Broadcast(ServerMessage::MenuAction {
            action,
            name: self.roster.display_name(id),
        })]
    }

    /// Drop a disconnected player. An emptied roster forces the session back to the lobby.
    pub fn leave(&mut self, id: &str) -> Vec<Effect> {
        let Some(player) = self.roster.remove(id) else {
            return Vec::new();
        };
        metrics::ACTIVE_PLAYERS.set(self.roster.len() as i64);
        tracing::info!(session = id, name = %player.name, players = self.roster.len(), "Player left");

        if self.roster.is_empty() {
            self.reset();
        }
        match self.phase {
            Phase::Playing => vec![Effect::Broadcast(self.players_message())],
            Phase::Lobby => vec![Effect::Broadcast(self.lobby_message())],
        }
    }

    fn reset(&mut self) {
        if self.phase == Phase::Playing {
            tracing::info!("Roster emptied, returning to lobby");
        }
        self.phase = Phase::Lobby;
        self.economy.clear();
        self.countdown = self.settings.round_seconds;
        self.roster.clear_leader();
    }

    /// Apply one background timer firing. Timers only matter while a round runs; the
    /// spawners stay idle in the lobby because `begin_round` replaces the coin pool anyway.
    pub fn tick(&mut self, event: TimerEvent) -> Vec<Effect> {
        if self.phase != Phase::Playing {
            return Vec::new();
        }
        match event {
            TimerEvent::Countdown => self.tick_countdown(),
            TimerEvent::NormalCoin => {
                if self.economy.top_up(&mut self.rng) {
                    vec![Effect::Broadcast(self.coins_message())]
                } else {
                    Vec::new()
                }
            }
            TimerEvent::BonusCoin => {
                self.economy.spawn_bonus(&mut self.rng);
                vec![Effect::Broadcast(self.coins_message())]
            }
            TimerEvent::HazardCoin => {
                if self.economy.spawn_hazard(&mut self.rng) {
                    vec![Effect::Broadcast(self.coins_message())]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn tick_countdown(&mut self) -> Vec<Effect> {
        self.countdown = self.countdown.saturating_sub(1);
        let mut effects = vec![Effect::Broadcast(ServerMessage::TimerUpdate {
            game_time: self.countdown,
        })];
        if self.countdown > 0 {
            return effects;
        }

        // Round over: report final scores, then wipe the arena.
        effects.push(Effect::Broadcast(ServerMessage::GameOver {
            players: self.roster.snapshot(),
        }));
        metrics::GAMES_COMPLETED_TOTAL.inc();
        if let Some(best) = self.roster.iter().max_by_key(|p| p.score) {
            tracing::info!(top = %best.name, score = best.score, "Game over");
        }

        self.phase = Phase::Lobby;
        self.economy.clear();
        self.roster.reset_scores();
        self.countdown = self.settings.round_seconds;
        effects.push(Effect::Broadcast(self.lobby_message()));
        effects
    }

    fn lobby_message(&self) -> ServerMessage {
        ServerMessage::Lobby {
            players: self.roster.snapshot(),
            leader_id: self.roster.leader().cloned(),
        }
    }

    fn players_message(&self) -> ServerMessage {
        ServerMessage::Players {
            players: self.roster.snapshot(),
        }
    }

    fn coins_message(&self) -> ServerMessage {
        ServerMessage::Coins {
            coins: self.economy.coins().to_vec(),
        }
    }

    fn game_start_message(&self) -> ServerMessage {
        ServerMessage::GameStart {
            coins: self.economy.coins().to_vec(),
            game_time: self.countdown,
            background: self.background.clone(),
        }
    }
}

fn reject(e: LifecycleError) -> Vec<Effect> {
    vec![Effect::Reply(ServerMessage::error(e.to_string()))]
}
