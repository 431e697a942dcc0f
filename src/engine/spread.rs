//! Ownership propagation: per-tick wavefront diffusion of tile ownership
//! from core tiles outward, with contested-tile resolution.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::grid::{Grid, TileIndex, TileType};
use super::player::{PlayerHandle, Roster};

/// Claims on a single tile: for each claiming player, the set of distinct
/// origin tiles the claims came from this tick.
pub type SpreadBucket = BTreeMap<PlayerHandle, BTreeSet<TileIndex>>;

/// All claims for one tick, keyed by target tile.
pub type ClaimMap = HashMap<TileIndex, SpreadBucket>;

/// Record a claim on `target` by `player`, originating from `origin`.
pub fn add_claim(claims: &mut ClaimMap, target: TileIndex, player: PlayerHandle, origin: TileIndex) {
    claims
        .entry(target)
        .or_default()
        .entry(player)
        .or_default()
        .insert(origin);
}

/// Seed claims from every core tile onto its neighbours. Cores broadcast
/// every tick regardless of prior state, and these claims are applied in the
/// current tick rather than being delayed.
pub fn seed_core_claims(grid: &Grid, roster: &Roster, claims: &mut ClaimMap) {
    for (handle, player) in roster.iter() {
        for &core in &player.core_positions {
            let core_idx = grid.index_of(core);
            for nb in grid.neighbors(core) {
                add_claim(claims, grid.index_of(nb), handle, core_idx);
            }
        }
    }
}

/// Resolve this tick's claims against the grid and return the claims pending
/// for the next tick.
///
/// Per tile: the player with the strictly highest count of distinct origins
/// wins, ties freeze ownership, and core tiles always keep their owner. A
/// tile that ends the tick owned, with at least one recorded origin for its
/// owner, becomes a wavefront origin itself: it claims each of its
/// neighbours for next tick, excluding the tiles the winning claims came
/// from so the wave does not reflect backward.
pub fn resolve(grid: &mut Grid, incoming: ClaimMap) -> ClaimMap {
    let mut next = ClaimMap::new();

    for (idx, bucket) in &incoming {
        let mut top_player: Option<PlayerHandle> = None;
        let mut top_count = 0usize;
        let mut contested = false;

        for (&player, origins) in bucket {
            let count = origins.len();
            if count == 0 {
                continue;
            }
            if count > top_count {
                top_count = count;
                top_player = Some(player);
                contested = false;
            } else if count == top_count && Some(player) != top_player {
                contested = true;
            }
        }

        let (owner, pos) = {
            let tile = grid.tile_mut(*idx);
            let owner_before = tile.owner;
            if top_count > 0 && !contested {
                tile.owner = top_player;
            }
            // Cores are never capturable.
            if tile.tile_type == TileType::Core {
                tile.owner = owner_before;
            }
            match tile.owner {
                Some(owner) => (owner, tile.position),
                None => continue,
            }
        };

        let origins = match bucket.get(&owner) {
            Some(origins) if !origins.is_empty() => origins,
            _ => continue,
        };

        for &origin in origins {
            for nb in grid.neighbors(pos) {
                let nb_idx = grid.index_of(nb);
                if nb_idx == origin {
                    continue;
                }
                add_claim(&mut next, nb_idx, owner, *idx);
            }
        }
    }

    next
}
