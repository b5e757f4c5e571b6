use rand::seq::SliceRandom;
use rand::Rng;
use serde::ser::{Serialize, Serializer};

/// Opaque identity chosen by the client and bound to one connection.
pub type SessionId = String;

/// Avatar colors. Assignment prefers a color nobody holds yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl PlayerColor {
    pub const PALETTE: [PlayerColor; 6] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Green,
        PlayerColor::Yellow,
        PlayerColor::Purple,
        PlayerColor::Orange,
    ];

    /// Pick a color not in `used`, or any palette color when all are taken.
    pub fn pick<R: Rng + ?Sized>(used: &[PlayerColor], rng: &mut R) -> PlayerColor {
        let available: Vec<PlayerColor> = Self::PALETTE
            .iter()
            .copied()
            .filter(|c| !used.contains(c))
            .collect();
        available
            .choose(rng)
            .or_else(|| Self::PALETTE.choose(rng))
            .copied()
            .unwrap_or(PlayerColor::Red)
    }
}

/// A player admitted to the session.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: SessionId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub color: PlayerColor,
    pub score: u32,
    /// Unix epoch millis after which movement is re-enabled.
    pub frozen_until: Option<i64>,
}

impl Player {
    pub fn is_frozen(&self, now_ms: i64) -> bool {
        self.frozen_until.is_some_and(|until| until > now_ms)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            score: self.score,
            color: self.color,
            frozen_until: self.frozen_until.unwrap_or(0),
        }
    }
}

/// Wire view of a player.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub score: u32,
    pub color: PlayerColor,
    /// 0 when the player is not frozen.
    pub frozen_until: i64,
}

/// Roster snapshot keyed by session id, serialized as a JSON object in join order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerMap(pub Vec<(SessionId, PlayerSnapshot)>);

impl PlayerMap {
    pub fn get(&self, id: &str) -> Option<&PlayerSnapshot> {
        self.0.iter().find(|(pid, _)| pid == id).map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a Player> for PlayerMap {
    fn from_iter<I: IntoIterator<Item = &'a Player>>(iter: I) -> Self {
        PlayerMap(iter.into_iter().map(|p| (p.id.clone(), p.snapshot())).collect())
    }
}

impl Serialize for PlayerMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(id, p)| (id, p)))
    }
}
