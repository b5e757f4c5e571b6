// Integration tests for the session actor: joins, rounds, pickups and disconnects,
// driven through the same GameServer handle the WebSocket layer uses.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::Receiver;

use coinrush_backend::engine::config::GameSettings;
use coinrush_backend::engine::game::{Game, Phase};
use coinrush_backend::engine::protocol::ClientMessage;
use coinrush_backend::engine::server::{ConnId, GameServer, Outgoing};

struct Client {
    conn: ConnId,
    rx: Receiver<Outgoing>,
    server: GameServer,
}

impl Client {
    fn connect(server: &GameServer) -> Self {
        let (conn, rx) = server.connect().unwrap();
        Client {
            conn,
            rx,
            server: server.clone(),
        }
    }

    fn send(&self, msg: ClientMessage) {
        self.server.intent(self.conn, msg).unwrap();
    }

    fn join(&self, id: &str, name: &str) {
        self.send(ClientMessage::Join {
            id: id.into(),
            name: name.into(),
        });
    }

    fn pickup(&self, id: &str, coin_id: &str) {
        self.send(ClientMessage::Pickup {
            id: id.into(),
            coin_id: coin_id.into(),
        });
    }

    fn disconnect(&self) {
        self.server.disconnect(self.conn).unwrap();
    }

    async fn next(&mut self) -> Outgoing {
        tokio::time::timeout(Duration::from_secs(300), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection queue closed")
    }

    async fn next_value(&mut self) -> Value {
        match self.next().await {
            Outgoing::Frame(frame) => serde_json::from_str(&frame).unwrap(),
            Outgoing::Close => panic!("expected a frame, got close"),
        }
    }

    /// Skip frames until one satisfies `pred`.
    async fn expect_where(&mut self, mut pred: impl FnMut(&Value) -> bool) -> Value {
        loop {
            if let Outgoing::Frame(frame) = self.next().await {
                let value: Value = serde_json::from_str(&frame).unwrap();
                if pred(&value) {
                    return value;
                }
            }
        }
    }

    async fn expect(&mut self, kind: &str) -> Value {
        self.expect_where(|v| v["type"] == kind).await
    }
}

fn spawn_server() -> GameServer {
    GameServer::spawn_with(Game::with_seed(GameSettings::default(), 2024))
}

fn coin_ids(msg: &Value) -> Vec<String> {
    msg["coins"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

/// Alice (leader) and Bob joined and a round started. Returns the starting coin ids.
async fn start_round(server: &GameServer) -> (Client, Client, Vec<String>) {
    let mut alice = Client::connect(server);
    let mut bob = Client::connect(server);
    alice.join("a", "Alice");
    alice.expect("clear-error").await;
    bob.join("b", "Bob");
    bob.expect("clear-error").await;

    alice.send(ClientMessage::StartGame { id: "a".into() });
    let start = alice.expect("gameStart").await;
    bob.expect("gameStart").await;
    let coins = coin_ids(&start);
    (alice, bob, coins)
}

#[tokio::test(start_paused = true)]
async fn test_join_start_and_pickup() {
    let server = spawn_server();
    let mut alice = Client::connect(&server);
    let mut bob = Client::connect(&server);

    alice.join("a", "Alice");
    alice.expect("clear-error").await;
    let lobby = alice.expect("lobby").await;
    assert_eq!(lobby["leaderId"], "a");

    bob.join("b", "Bob");
    let lobby = bob.expect("lobby").await;
    assert_eq!(lobby["leaderId"], "a");
    assert_eq!(lobby["players"].as_object().unwrap().len(), 2);

    alice.send(ClientMessage::StartGame { id: "a".into() });
    let start_a = alice.expect("gameStart").await;
    let start_b = bob.expect("gameStart").await;
    assert_eq!(start_a, start_b);
    assert_eq!(start_a["gameTime"], 60);
    let coins = coin_ids(&start_a);
    assert_eq!(coins.len(), 10);

    bob.pickup("b", &coins[0]);
    for client in [&mut alice, &mut bob] {
        let players = client
            .expect_where(|v| v["type"] == "players" && v["players"]["b"]["score"] == 1)
            .await;
        assert_eq!(players["players"]["a"]["score"], 0);
        let update = client.expect("coins").await;
        let ids = coin_ids(&update);
        assert!(!ids.contains(&coins[0]));
        assert_eq!(ids.len(), 10);
    }
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_name_rejected() {
    let server = spawn_server();
    let alice = Client::connect(&server);
    alice.join("a", "Alice");

    let mut carol = Client::connect(&server);
    carol.join("c", "Alice");
    let err = carol.expect("error").await;
    assert_eq!(err["message"], "Name already exists!");

    let status = server.status().await.unwrap();
    assert_eq!(status.players.len(), 1);
    assert_eq!(status.connections, 2);
}

#[tokio::test(start_paused = true)]
async fn test_non_leader_cannot_start() {
    let server = spawn_server();
    let alice = Client::connect(&server);
    let mut bob = Client::connect(&server);
    alice.join("a", "Alice");
    bob.join("b", "Bob");

    bob.send(ClientMessage::StartGame { id: "b".into() });
    let err = bob.expect("error").await;
    assert_eq!(err["message"], "Only the leader can start the game");
    assert_eq!(server.status().await.unwrap().phase, Phase::Lobby);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_runs_to_game_over() {
    let server = spawn_server();
    let (mut alice, bob, coins) = start_round(&server).await;

    for coin in &coins[..3] {
        alice.pickup("a", coin);
    }
    for coin in &coins[3..8] {
        bob.pickup("b", coin);
    }

    let mut ticks = Vec::new();
    let over = alice
        .expect_where(|v| {
            if v["type"] == "timerUpdate" {
                ticks.push(v["gameTime"].as_u64().unwrap());
            }
            v["type"] == "gameOver"
        })
        .await;
    assert_eq!(ticks, (0..60).rev().collect::<Vec<u64>>());
    assert_eq!(over["players"]["a"]["score"], 3);
    assert_eq!(over["players"]["b"]["score"], 5);

    let status = server.status().await.unwrap();
    assert_eq!(status.phase, Phase::Lobby);
    assert_eq!(status.coins, 0);
    assert_eq!(status.game_time, 60);
    assert_eq!(status.leader_id.as_deref(), Some("a"));
    assert!(status.players.0.iter().all(|(_, p)| p.score == 0));
}

#[tokio::test(start_paused = true)]
async fn test_coin_spawners_run_during_round() {
    let server = spawn_server();
    let (mut alice, _bob, _) = start_round(&server).await;

    let hazard = alice
        .expect_where(|v| {
            v["type"] == "coins"
                && v["coins"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .any(|c| c["type"] == "frozen")
        })
        .await;
    let coins = hazard["coins"].as_array().unwrap();
    assert_eq!(coins.iter().filter(|c| c["type"] == "frozen").count(), 1);
    // Two bonus coins spawn (6s, 12s) before the first hazard at 15s.
    assert_eq!(coins.iter().filter(|c| c["type"] == "red").count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_rearms_round_timers() {
    let server = spawn_server();
    let (mut alice, mut bob, _) = start_round(&server).await;

    // Mid-round: the countdown ticks at 11s and the bonus spawner at 12s.
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    alice.send(ClientMessage::Restart { id: "a".into() });
    let restarted = tokio::time::Instant::now();

    for client in [&mut alice, &mut bob] {
        client.expect("players").await;
        let start = client.next_value().await;
        assert_eq!(start["type"], "gameStart");
        assert_eq!(start["gameTime"], 60);
        assert_eq!(coin_ids(&start).len(), 10);
        let menu = client.next_value().await;
        assert_eq!(menu["type"], "menuAction");
        assert_eq!(menu["action"], "restart");
        assert_eq!(menu["name"], "Alice");
    }

    let tick = alice.expect("timerUpdate").await;
    assert_eq!(tick["gameTime"], 59);
    let waited = restarted.elapsed();
    assert!(waited >= Duration::from_secs(1), "countdown ticked after {waited:?}");
    assert!(waited < Duration::from_millis(1500));

    alice
        .expect_where(|v| {
            v["type"] == "coins"
                && v["coins"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .any(|c| c["type"] == "red")
        })
        .await;
    let waited = restarted.elapsed();
    assert!(waited >= Duration::from_secs(6), "bonus coin after {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_mid_game_join_is_closed() {
    let server = spawn_server();
    let (_alice, _bob, _) = start_round(&server).await;

    let mut late = Client::connect(&server);
    late.join("c", "Cleo");
    let err = late.expect("error").await;
    assert_eq!(err["message"], "Game has already started");
    assert_eq!(late.next().await, Outgoing::Close);
    assert_eq!(server.status().await.unwrap().players.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_takes_over_session() {
    let server = spawn_server();
    let (_alice, old_bob, _) = start_round(&server).await;

    let mut new_bob = Client::connect(&server);
    new_bob.join("b", "Bob");
    let rejoin = new_bob.expect("rejoin").await;
    assert_eq!(rejoin["leaderId"], "a");
    assert_eq!(rejoin["coins"].as_array().unwrap().len(), 10);
    assert_eq!(rejoin["players"].as_object().unwrap().len(), 2);

    // The stale transport going away leaves the player in place.
    old_bob.disconnect();
    let status = server.status().await.unwrap();
    assert_eq!(status.players.len(), 2);
    assert_eq!(status.connections, 2);

    // Intents from the stale connection no longer count.
    old_bob.send(ClientMessage::Restart { id: "b".into() });
    new_bob.send(ClientMessage::Move {
        id: "b".into(),
        x: 12.0,
        y: 34.0,
    });
    let moved = new_bob
        .expect_where(|v| v["type"] == "players" && v["players"]["b"]["x"] == 12.0)
        .await;
    assert_eq!(moved["players"]["b"]["y"], 34.0);
}

#[tokio::test(start_paused = true)]
async fn test_leader_disconnect_and_empty_roster() {
    let server = spawn_server();
    let (alice, mut bob, _) = start_round(&server).await;

    alice.disconnect();
    let players = bob
        .expect_where(|v| v["type"] == "players" && v["players"].get("a").is_none())
        .await;
    assert!(players["players"].get("b").is_some());
    let status = server.status().await.unwrap();
    assert_eq!(status.leader_id.as_deref(), Some("b"));
    assert_eq!(status.phase, Phase::Playing);

    bob.disconnect();
    let status = server.status().await.unwrap();
    assert_eq!(status.phase, Phase::Lobby);
    assert!(status.leader_id.is_none());
    assert_eq!(status.coins, 0);
    assert_eq!(status.connections, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unjoined_and_spoofed_intents_are_dropped() {
    let server = spawn_server();
    let mut alice = Client::connect(&server);
    let stranger = Client::connect(&server);
    alice.join("a", "Alice");
    alice.expect("clear-error").await;

    stranger.send(ClientMessage::Pause { id: "a".into() });
    alice.send(ClientMessage::Quit { id: "someone-else".into() });
    alice.send(ClientMessage::Resume { id: "a".into() });

    // The only menu action that gets through is Alice's own.
    let menu = alice.expect("menuAction").await;
    assert_eq!(menu["action"], "resume");
    assert_eq!(menu["name"], "Alice");
}
