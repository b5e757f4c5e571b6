/// The live coin collection: spawn cadence per kind and pickup resolution.
use rand::Rng;

use crate::metrics;

use super::coin::{Coin, CoinKind};
use super::roster::Roster;
use super::spawn::spawn_coin;

/// What a successful pickup did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickupEffect {
    /// Normal coin; carries the picker's new score.
    Scored(u32),
    /// Bonus coin; the boost itself lives on the clients.
    SpeedBoost,
    /// Hazard coin; everyone but the picker is frozen until this epoch-ms instant.
    Froze(i64),
}

#[derive(Debug)]
pub struct CoinEconomy {
    coins: Vec<Coin>,
    normal_floor: usize,
}

impl CoinEconomy {
    pub fn new(normal_floor: usize) -> Self {
        Self {
            coins: Vec::new(),
            normal_floor,
        }
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn count(&self, kind: CoinKind) -> usize {
        self.coins.iter().filter(|c| c.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.coins.clear();
    }

    fn spawn<R: Rng + ?Sized>(&mut self, rng: &mut R, kind: CoinKind) {
        self.coins.push(spawn_coin(rng, kind));
        metrics::COINS_SPAWNED_TOTAL
            .with_label_values(&[kind.label()])
            .inc();
    }

    /// Replace every coin with a fresh set of normal coins up to the floor.
    pub fn repopulate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.clear();
        for _ in 0..self.normal_floor {
            self.spawn(rng, CoinKind::Normal);
        }
    }

    /// Add one normal coin if the normal count is below the floor.
    pub fn top_up<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.count(CoinKind::Normal) >= self.normal_floor {
            return false;
        }
        self.spawn(rng, CoinKind::Normal);
        true
    }

    /// Bonus coins accumulate without a cap.
    pub fn spawn_bonus<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.spawn(rng, CoinKind::BonusSpeed);
    }

    /// At most one hazard coin is ever live.
    pub fn spawn_hazard<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.count(CoinKind::FreezeHazard) > 0 {
            return false;
        }
        self.spawn(rng, CoinKind::FreezeHazard);
        true
    }

    fn take(&mut self, coin_id: &str) -> Option<Coin> {
        let idx = self.coins.iter().position(|c| c.id == coin_id)?;
        Some(self.coins.remove(idx))
    }

    /// Remove the coin and apply its effect in one step, then top normal coins up.
    ///
    /// Returns `None` when the coin is already gone; nothing changes in that case.
    pub fn pickup<R: Rng + ?Sized>(
        &mut self,
        roster: &mut Roster,
        picker: &str,
        coin_id: &str,
        now_ms: i64,
        freeze_ms: i64,
        rng: &mut R,
    ) -> Option<PickupEffect> {
        let coin = self.take(coin_id)?;
        metrics::COINS_COLLECTED_TOTAL
            .with_label_values(&[coin.kind.label()])
            .inc();

        let effect = match coin.kind {
            CoinKind::Normal => {
                let score = match roster.get_mut(picker) {
                    Some(p) => {
                        p.score += 1;
                        p.score
                    }
                    None => 0,
                };
                PickupEffect::Scored(score)
            }
            CoinKind::BonusSpeed => PickupEffect::SpeedBoost,
            CoinKind::FreezeHazard => {
                let until = now_ms + freeze_ms;
                roster.freeze_others(picker, until);
                PickupEffect::Froze(until)
            }
        };

        self.top_up(rng);
        Some(effect)
    }
}
