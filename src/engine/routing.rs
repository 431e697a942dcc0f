//! Resource routing: per-player distance fields and greedy token descent
//! toward the controlling owner's nearest core.

use std::collections::{BTreeMap, VecDeque};

use super::grid::{Grid, Position, TileIndex};
use super::player::{PlayerHandle, Roster};

/// Sentinel distance for tiles no core can reach.
pub const UNREACHABLE: u32 = u32::MAX;

/// A mobile resource token.
#[derive(Clone, Debug)]
pub struct Resource {
    pub id: u64,
    pub position: Position,
    /// Last-known controlling owner, set opportunistically while the token
    /// sits on owned ground.
    pub owner: Option<PlayerHandle>,
}

/// Active tokens keyed by monotonic id, with a dense per-tile occupancy
/// index for collision checks.
pub struct ResourceTable {
    tokens: BTreeMap<u64, Resource>,
    by_tile: Vec<Option<u64>>,
    next_id: u64,
}

impl ResourceTable {
    pub fn new(tile_count: usize) -> Self {
        ResourceTable {
            tokens: BTreeMap::new(),
            by_tile: vec![None; tile_count],
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Active tokens in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.tokens.values()
    }

    pub fn token_at(&self, idx: TileIndex) -> Option<u64> {
        self.by_tile[idx]
    }
}

/// Multi-source BFS hop-distance from each player's cores over the whole
/// grid (8-neighbour adjacency), indexed by player handle. Rebuilt from
/// scratch every tick since ownership shifts tile-by-tile.
pub fn distance_fields(grid: &Grid, roster: &Roster) -> Vec<Vec<u32>> {
    let size = grid.width * grid.height;
    let mut fields = Vec::with_capacity(roster.len());
    let mut queue: VecDeque<Position> = VecDeque::new();

    for (_, player) in roster.iter() {
        let mut distances = vec![UNREACHABLE; size];

        queue.clear();
        for &core in &player.core_positions {
            distances[grid.index_of(core)] = 0;
            queue.push_back(core);
        }

        while let Some(current) = queue.pop_front() {
            let current_dist = distances[grid.index_of(current)];
            for nb in grid.neighbors(current) {
                let idx = grid.index_of(nb);
                if distances[idx] != UNREACHABLE {
                    continue;
                }
                distances[idx] = current_dist + 1;
                queue.push_back(nb);
            }
        }

        fields.push(distances);
    }

    fields
}

/// Spawn a token on every resource-base tile that lacks one.
pub fn spawn_tokens(grid: &Grid, table: &mut ResourceTable) {
    for (idx, tile) in grid.tiles().iter().enumerate() {
        if !tile.resource_base || table.by_tile[idx].is_some() {
            continue;
        }
        table.next_id += 1;
        let id = table.next_id;
        table.tokens.insert(
            id,
            Resource {
                id,
                position: tile.position,
                owner: None,
            },
        );
        table.by_tile[idx] = Some(id);
    }
}

/// Advance every active token one step down its controlling owner's
/// distance field. Tokens on unowned ground stay put; a token at distance 0
/// is consumed and credits its owner; a move onto an occupied tile is
/// skipped this tick.
pub fn advance_tokens(
    grid: &Grid,
    roster: &mut Roster,
    table: &mut ResourceTable,
    fields: &[Vec<u32>],
) {
    let ids: Vec<u64> = table.tokens.keys().copied().collect();

    for id in ids {
        let pos = table.tokens[&id].position;
        let idx = grid.index_of(pos);

        let owner = match grid.tile(idx).owner {
            Some(owner) => owner,
            None => continue,
        };
        let field = &fields[owner];

        if let Some(token) = table.tokens.get_mut(&id) {
            token.owner = Some(owner);
        }

        let dist = field[idx];
        if dist == UNREACHABLE {
            continue;
        }
        if dist == 0 {
            // The token is sitting on its owner's core.
            roster.player_mut(owner).resource_count += 1;
            table.tokens.remove(&id);
            table.by_tile[idx] = None;
            continue;
        }

        let next_pos = match next_step(grid, pos, field) {
            Some(next_pos) => next_pos,
            None => continue,
        };
        let next_idx = grid.index_of(next_pos);
        if table.by_tile[next_idx].is_some() {
            // Collision avoidance: tokens never overlap.
            continue;
        }

        table.by_tile[idx] = None;
        table.by_tile[next_idx] = Some(id);
        if let Some(token) = table.tokens.get_mut(&id) {
            token.position = next_pos;
        }
    }
}

/// Recompute each tile's occupancy flag from the current token positions.
pub fn refresh_occupancy(grid: &mut Grid, table: &ResourceTable) {
    for idx in 0..grid.width * grid.height {
        grid.tile_mut(idx).has_resource = table.by_tile[idx].is_some();
    }
}

/// The neighbour with the smallest strictly-improving distance, scanning in
/// the grid's fixed neighbour order. First strictly-smaller match wins on
/// ties; callers rely on this exact order.
fn next_step(grid: &Grid, current: Position, field: &[u32]) -> Option<Position> {
    let current_dist = field[grid.index_of(current)];

    let mut best = current;
    let mut best_dist = current_dist;

    for nb in grid.neighbors(current) {
        let dist = field[grid.index_of(nb)];
        if dist < best_dist {
            best_dist = dist;
            best = nb;
        }
    }

    if best_dist >= current_dist {
        return None;
    }

    Some(best)
}
