/// Roster of admitted players, leader election and admission rules.
use rand::Rng;
use thiserror::Error;

use super::player::{Player, PlayerColor, PlayerMap, SessionId};
use super::spawn::place_entity;

/// Why a join was refused. The display text is what the client shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmitError {
    #[error("Name cannot be empty!")]
    EmptyName,
    #[error("Already joined!")]
    AlreadyJoined,
    #[error("Name already exists!")]
    DuplicateName,
    #[error("Max {0} player count reached")]
    RoomFull(usize),
}

impl AdmitError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmitError::EmptyName => "empty_name",
            AdmitError::AlreadyJoined => "already_joined",
            AdmitError::DuplicateName => "duplicate_name",
            AdmitError::RoomFull(_) => "room_full",
        }
    }
}

/// Active players in join order plus the current leader.
#[derive(Debug)]
pub struct Roster {
    players: Vec<Player>,
    leader: Option<SessionId>,
    max_players: usize,
}

impl Roster {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: Vec::new(),
            leader: None,
            max_players,
        }
    }

    /// Admit a new player. The first player admitted into a leaderless roster leads.
    pub fn admit<R: Rng + ?Sized>(
        &mut self,
        id: &str,
        name: &str,
        rng: &mut R,
    ) -> Result<&Player, AdmitError> {
        if name.trim().is_empty() {
            return Err(AdmitError::EmptyName);
        }
        if self.contains(id) {
            return Err(AdmitError::AlreadyJoined);
        }
        if self.players.iter().any(|p| p.name == name) {
            return Err(AdmitError::DuplicateName);
        }
        if self.players.len() >= self.max_players {
            return Err(AdmitError::RoomFull(self.max_players));
        }

        let (x, y) = place_entity(rng, &self.positions());
        let used: Vec<PlayerColor> = self.players.iter().map(|p| p.color).collect();
        let color = PlayerColor::pick(&used, rng);

        if self.leader.is_none() {
            self.leader = Some(id.to_string());
        }
        self.players.push(Player {
            id: id.to_string(),
            name: name.to_string(),
            x,
            y,
            color,
            score: 0,
            frozen_until: None,
        });
        Ok(&self.players[self.players.len() - 1])
    }

    /// Remove a player, handing leadership to the earliest remaining joiner if needed.
    pub fn remove(&mut self, id: &str) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == id)?;
        let removed = self.players.remove(idx);
        if self.leader.as_deref() == Some(id) {
            self.leader = self.players.first().map(|p| p.id.clone());
        }
        Some(removed)
    }

    /// Overwrite a player's position unless they are frozen. Returns whether it moved.
    pub fn set_position(&mut self, id: &str, x: f64, y: f64, now_ms: i64) -> bool {
        match self.get_mut(id) {
            Some(p) if !p.is_frozen(now_ms) => {
                p.x = x;
                p.y = y;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn leader(&self) -> Option<&SessionId> {
        self.leader.as_ref()
    }

    pub fn is_leader(&self, id: &str) -> bool {
        self.leader.as_deref() == Some(id)
    }

    pub fn clear_leader(&mut self) {
        self.leader = None;
    }

    /// Display name for menu notifications.
    pub fn display_name(&self, id: &str) -> String {
        self.get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "A player".to_string())
    }

    pub fn snapshot(&self) -> PlayerMap {
        self.players.iter().collect()
    }

    pub fn reset_scores(&mut self) {
        for p in &mut self.players {
            p.score = 0;
        }
    }

    pub fn clear_freezes(&mut self) {
        for p in &mut self.players {
            p.frozen_until = None;
        }
    }

    /// Freeze everyone except `picker` until `until_ms`.
    pub fn freeze_others(&mut self, picker: &str, until_ms: i64) {
        for p in self.players.iter_mut().filter(|p| p.id != picker) {
            p.frozen_until = Some(until_ms);
        }
    }

    /// Fresh spawn positions for every player, placed one after another so each respects
    /// the clearance from those already re-placed.
    pub fn scatter<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut placed: Vec<(f64, f64)> = Vec::with_capacity(self.players.len());
        for p in &mut self.players {
            let (x, y) = place_entity(rng, &placed);
            p.x = x;
            p.y = y;
            placed.push((x, y));
        }
    }

    fn positions(&self) -> Vec<(f64, f64)> {
        self.players.iter().map(|p| (p.x, p.y)).collect()
    }
}
