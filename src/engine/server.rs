// Game server: a single task owns the session and fans state out to every connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::metrics;

use super::config::{GameSettings, OUTBOUND_QUEUE_CAPACITY};
use super::game::{Effect, Game, Phase, SessionStatus, TimerEvent};
use super::player::SessionId;
use super::protocol::{ClientMessage, ServerMessage};
use super::roster::AdmitError;

/// Process-unique handle for one transport connection.
pub type ConnId = u64;

/// Frames queued for a connection's writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// A serialized message, shared between all recipients of a broadcast.
    Frame(Arc<str>),
    /// Close the transport.
    Close,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("game session is no longer running")]
    SessionClosed,
}

enum Command {
    Connect {
        conn: ConnId,
        tx: mpsc::Sender<Outgoing>,
    },
    Intent {
        conn: ConnId,
        msg: ClientMessage,
    },
    Disconnect {
        conn: ConnId,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Cloneable handle to the session task.
#[derive(Clone)]
pub struct GameServer {
    commands: mpsc::UnboundedSender<Command>,
    next_conn: Arc<AtomicU64>,
}

impl GameServer {
    /// Start the session task on the current tokio runtime.
    pub fn spawn(settings: GameSettings) -> Self {
        Self::spawn_with(Game::new(settings))
    }

    /// Start the session task around an existing game (seeded games in tests).
    pub fn spawn_with(game: Game) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = SessionActor {
            game,
            gateway: Gateway::default(),
            timers: None,
            timers_round: 0,
        };
        tokio::spawn(actor.run(rx));
        Self {
            commands: tx,
            next_conn: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new transport. Returns its id and the queue its writer drains.
    /// The queue is bounded; frames for a client that stops reading are dropped.
    pub fn connect(&self) -> Result<(ConnId, mpsc::Receiver<Outgoing>), GatewayError> {
        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.send(Command::Connect { conn, tx })?;
        Ok((conn, rx))
    }

    /// Queue a parsed intent from `conn`.
    pub fn intent(&self, conn: ConnId, msg: ClientMessage) -> Result<(), GatewayError> {
        self.send(Command::Intent { conn, msg })
    }

    /// Report that the transport behind `conn` is gone.
    pub fn disconnect(&self, conn: ConnId) -> Result<(), GatewayError> {
        self.send(Command::Disconnect { conn })
    }

    pub async fn status(&self) -> Result<SessionStatus, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        rx.await.map_err(|_| GatewayError::SessionClosed)
    }

    fn send(&self, cmd: Command) -> Result<(), GatewayError> {
        self.commands
            .send(cmd)
            .map_err(|_| GatewayError::SessionClosed)
    }
}

struct Connection {
    tx: mpsc::Sender<Outgoing>,
    session: Option<SessionId>,
}

/// Live connections and which one currently speaks for each session.
#[derive(Default)]
pub struct Gateway {
    connections: HashMap<ConnId, Connection>,
    owners: HashMap<SessionId, ConnId>,
}

impl Gateway {
    pub fn attach(&mut self, conn: ConnId, tx: mpsc::Sender<Outgoing>) {
        self.connections.insert(conn, Connection { tx, session: None });
        metrics::CONNECTED_WEBSOCKETS.set(self.connections.len() as i64);
    }

    /// Forget a connection. Returns the session it owned, if any.
    pub fn detach(&mut self, conn: ConnId) -> Option<SessionId> {
        let connection = self.connections.remove(&conn)?;
        metrics::CONNECTED_WEBSOCKETS.set(self.connections.len() as i64);
        let session = connection.session?;
        if self.owners.get(&session) == Some(&conn) {
            self.owners.remove(&session);
            Some(session)
        } else {
            None
        }
    }

    /// Bind an unbound connection to a session. A connection's binding never changes;
    /// a later bind of the same session from another connection takes ownership.
    pub fn bind(&mut self, conn: ConnId, session: &str) {
        let Some(connection) = self.connections.get_mut(&conn) else {
            return;
        };
        if connection.session.is_some() {
            return;
        }
        connection.session = Some(session.to_string());
        self.owners.insert(session.to_string(), conn);
    }

    pub fn is_bound(&self, conn: ConnId) -> bool {
        self.connections
            .get(&conn)
            .is_some_and(|c| c.session.is_some())
    }

    /// The session this connection may act for: bound and still the owner.
    pub fn owned_session(&self, conn: ConnId) -> Option<&SessionId> {
        let session = self.connections.get(&conn)?.session.as_ref()?;
        (self.owners.get(session) == Some(&conn)).then_some(session)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Serialize once and queue for every connection. Closed and full ones are skipped.
    pub fn broadcast(&self, msg: &ServerMessage) {
        let Some(frame) = encode(msg) else {
            return;
        };
        for (&conn, connection) in &self.connections {
            queue(conn, &connection.tx, Outgoing::Frame(frame.clone()));
        }
    }

    pub fn send_to(&self, conn: ConnId, msg: &ServerMessage) {
        let (Some(connection), Some(frame)) = (self.connections.get(&conn), encode(msg)) else {
            return;
        };
        queue(conn, &connection.tx, Outgoing::Frame(frame));
    }

    pub fn close(&self, conn: ConnId) {
        if let Some(connection) = self.connections.get(&conn) {
            queue(conn, &connection.tx, Outgoing::Close);
        }
    }

    /// Apply effects in order. `origin` is the connection whose intent produced them;
    /// timer-driven effects have none and may only broadcast.
    pub fn apply(&mut self, origin: Option<ConnId>, effects: Vec<Effect>) {
        for effect in effects {
            match (effect, origin) {
                (Effect::Broadcast(msg), _) => self.broadcast(&msg),
                (Effect::Reply(msg), Some(conn)) => self.send_to(conn, &msg),
                (Effect::Bind(session), Some(conn)) => self.bind(conn, &session),
                (Effect::Close, Some(conn)) => self.close(conn),
                (effect, None) => {
                    tracing::warn!(?effect, "Connection-scoped effect without a connection");
                }
            }
        }
    }
}

/// Queue without waiting. A full queue means the client stopped reading, so the
/// frame is dropped.
fn queue(conn: ConnId, tx: &mpsc::Sender<Outgoing>, item: Outgoing) {
    match tx.try_send(item) {
        Ok(()) => metrics::WEBSOCKET_MESSAGES_SENT_TOTAL.inc(),
        Err(TrySendError::Full(_)) => {
            metrics::OUTBOUND_FRAMES_DROPPED_TOTAL.inc();
            tracing::warn!(conn, "Client outbound queue full, dropping frame");
        }
        Err(TrySendError::Closed(_)) => {}
    }
}

fn encode(msg: &ServerMessage) -> Option<Arc<str>> {
    match msg.to_json() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {e}");
            None
        }
    }
}

/// The timers of one running round. Dropping the value cancels them all.
struct RoundTimers {
    countdown: Interval,
    normal: Interval,
    bonus: Interval,
    hazard: Interval,
}

impl RoundTimers {
    fn new(settings: &GameSettings) -> Self {
        Self {
            countdown: every(settings.countdown_period),
            normal: every(settings.normal_coin_period),
            bonus: every(settings.bonus_coin_period),
            hazard: every(settings.hazard_coin_period),
        }
    }

    async fn next(&mut self) -> TimerEvent {
        tokio::select! {
            _ = self.countdown.tick() => TimerEvent::Countdown,
            _ = self.normal.tick() => TimerEvent::NormalCoin,
            _ = self.bonus.tick() => TimerEvent::BonusCoin,
            _ = self.hazard.tick() => TimerEvent::HazardCoin,
        }
    }
}

/// First tick one full period from now.
fn every(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_timer(timers: &mut Option<RoundTimers>) -> TimerEvent {
    match timers {
        Some(t) => t.next().await,
        None => std::future::pending().await,
    }
}

struct SessionActor {
    game: Game,
    gateway: Gateway,
    timers: Option<RoundTimers>,
    /// Round the current timers were created for.
    timers_round: u64,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!("Game session started");
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                event = next_timer(&mut self.timers) => {
                    let effects = self.game.tick(event);
                    self.gateway.apply(None, effects);
                }
            }
            self.sync_timers();
        }
        tracing::info!("Game session stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { conn, tx } => {
                tracing::debug!(conn, "Connection attached");
                self.gateway.attach(conn, tx);
            }
            Command::Intent { conn, msg } => self.intent(conn, msg),
            Command::Disconnect { conn } => {
                tracing::debug!(conn, "Connection detached");
                if let Some(session) = self.gateway.detach(conn) {
                    let effects = self.game.leave(&session);
                    self.gateway.apply(None, effects);
                }
            }
            Command::Status { reply } => {
                let _ = reply.send(self.game.status(self.gateway.len()));
            }
        }
    }

    fn intent(&mut self, conn: ConnId, msg: ClientMessage) {
        let now_ms = chrono::Utc::now().timestamp_millis();

        if let ClientMessage::Join { .. } = msg {
            if self.gateway.is_bound(conn) {
                let reply = ServerMessage::error(AdmitError::AlreadyJoined.to_string());
                self.gateway.send_to(conn, &reply);
                return;
            }
            let effects = self.game.handle(msg, now_ms);
            self.gateway.apply(Some(conn), effects);
            return;
        }

        match self.gateway.owned_session(conn) {
            Some(session) if session == msg.session_id() => {
                let effects = self.game.handle(msg, now_ms);
                self.gateway.apply(Some(conn), effects);
            }
            Some(session) => {
                metrics::PROTOCOL_ERRORS_TOTAL.inc();
                tracing::warn!(
                    conn,
                    session = %session,
                    claimed = msg.session_id(),
                    "Dropped {} for a different session",
                    msg.kind()
                );
            }
            None => {
                metrics::PROTOCOL_ERRORS_TOTAL.inc();
                tracing::warn!(conn, "Dropped {} from unjoined connection", msg.kind());
            }
        }
    }

    /// Create timers on every round entry and drop them outside of a round.
    fn sync_timers(&mut self) {
        match self.game.phase() {
            Phase::Playing => {
                if self.timers.is_none() || self.timers_round != self.game.round() {
                    self.timers = Some(RoundTimers::new(self.game.settings()));
                    self.timers_round = self.game.round();
                }
            }
            Phase::Lobby => self.timers = None,
        }
    }
}
