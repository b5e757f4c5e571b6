/// Placement of players and coins inside the arena.
///
/// Player placement keeps a clearance radius from everyone already standing in the
/// arena, but gives up after a bounded number of tries so a crowded arena can never
/// stall a join or a restart.
use rand::Rng;
use uuid::Uuid;

use super::coin::{Coin, CoinKind};
use super::config::*;

/// Random integer coordinate in `[margin, extent - margin)`.
fn coord<R: Rng + ?Sized>(rng: &mut R, extent: f64, margin: f64) -> f64 {
    let span = (extent - margin * 2.0).max(1.0) as i64;
    (rng.gen_range(0..span) as f64) + margin
}

/// Find a spawn point at least `SPAWN_CLEARANCE` away from every occupied position.
pub fn place_entity<R: Rng + ?Sized>(rng: &mut R, occupied: &[(f64, f64)]) -> (f64, f64) {
    for _ in 0..SPAWN_ATTEMPTS {
        let x = coord(rng, ARENA_WIDTH, SPAWN_MARGIN);
        let y = coord(rng, ARENA_HEIGHT, SPAWN_MARGIN);
        let clear = occupied
            .iter()
            .all(|&(px, py)| (px - x).hypot(py - y) >= SPAWN_CLEARANCE);
        if clear {
            return (x, y);
        }
    }
    (
        coord(rng, ARENA_WIDTH, SPAWN_FALLBACK_MARGIN),
        coord(rng, ARENA_HEIGHT, SPAWN_FALLBACK_MARGIN),
    )
}

/// Create a coin of the given kind at a random in-bounds position.
pub fn spawn_coin<R: Rng + ?Sized>(rng: &mut R, kind: CoinKind) -> Coin {
    Coin {
        id: format!("{}-{}", kind.label(), Uuid::new_v4().simple()),
        x: coord(rng, ARENA_WIDTH, COIN_MARGIN),
        y: coord(rng, ARENA_HEIGHT, COIN_MARGIN),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_place_entity_within_margin() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let (x, y) = place_entity(&mut rng, &[]);
            assert!((SPAWN_MARGIN..ARENA_WIDTH - SPAWN_MARGIN).contains(&x));
            assert!((SPAWN_MARGIN..ARENA_HEIGHT - SPAWN_MARGIN).contains(&y));
        }
    }

    #[test]
    fn test_place_entity_keeps_clearance() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut occupied = Vec::new();
        for _ in 0..4 {
            let pos = place_entity(&mut rng, &occupied);
            for &(ox, oy) in &occupied {
                assert!((pos.0 - ox).hypot(pos.1 - oy) >= SPAWN_CLEARANCE);
            }
            occupied.push(pos);
        }
    }

    #[test]
    fn test_place_entity_falls_back_when_crowded() {
        let mut rng = StdRng::seed_from_u64(3);
        // A grid tighter than the clearance radius leaves no valid spot.
        let mut occupied = Vec::new();
        let mut x = 0.0;
        while x <= ARENA_WIDTH {
            let mut y = 0.0;
            while y <= ARENA_HEIGHT {
                occupied.push((x, y));
                y += 30.0;
            }
            x += 30.0;
        }
        let (x, y) = place_entity(&mut rng, &occupied);
        assert!((SPAWN_FALLBACK_MARGIN..ARENA_WIDTH - SPAWN_FALLBACK_MARGIN).contains(&x));
        assert!((SPAWN_FALLBACK_MARGIN..ARENA_HEIGHT - SPAWN_FALLBACK_MARGIN).contains(&y));
    }

    #[test]
    fn test_spawn_coin_ids_are_unique_and_tagged() {
        let mut rng = StdRng::seed_from_u64(4);
        let a = spawn_coin(&mut rng, CoinKind::FreezeHazard);
        let b = spawn_coin(&mut rng, CoinKind::FreezeHazard);
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("frozen-"));
        assert_eq!(a.kind, CoinKind::FreezeHazard);
        assert!((COIN_MARGIN..ARENA_WIDTH - COIN_MARGIN).contains(&a.x));
        assert!((COIN_MARGIN..ARENA_HEIGHT - COIN_MARGIN).contains(&a.y));
    }
}
