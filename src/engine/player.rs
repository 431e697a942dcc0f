use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;

use super::config::COLOR_POOL;
use super::grid::Position;

/// Stable integer handle addressing a player in the roster. Players are
/// never removed, so handles stay valid for the life of the game.
pub type PlayerHandle = usize;

/// A territory owner. Snapshots and API responses carry value copies of
/// this struct; mutating a copy never affects engine state.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub color: String,
    /// Currently always one core, kept as a sequence for future multi-core.
    pub core_positions: Vec<Position>,
    pub resource_count: u64,
    pub joined_at_tick: i64,
}

/// Dense player storage with a public-id index.
#[derive(Default)]
pub struct Roster {
    players: Vec<Player>,
    by_id: HashMap<String, PlayerHandle>,
}

impl Roster {
    pub fn new() -> Self {
        Roster::default()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn handle_of(&self, id: &str) -> Option<PlayerHandle> {
        self.by_id.get(id).copied()
    }

    pub fn player(&self, handle: PlayerHandle) -> &Player {
        &self.players[handle]
    }

    pub fn player_mut(&mut self, handle: PlayerHandle) -> &mut Player {
        &mut self.players[handle]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerHandle, &Player)> {
        self.players.iter().enumerate()
    }

    /// Insert a new player and return its handle. The caller must have
    /// checked that the id is not already present.
    pub fn insert(&mut self, player: Player) -> PlayerHandle {
        let handle = self.players.len();
        self.by_id.insert(player.id.clone(), handle);
        self.players.push(player);
        handle
    }

    /// Pick an unused palette colour, or a pseudo-random fallback once the
    /// palette is exhausted (collisions are tolerated in the fallback).
    pub fn next_color(&self, rng: &mut StdRng) -> String {
        let used: HashSet<&str> = self.players.iter().map(|p| p.color.as_str()).collect();
        let available: Vec<&str> = COLOR_POOL
            .iter()
            .copied()
            .filter(|c| !used.contains(c))
            .collect();

        if available.is_empty() {
            return format!("#{:06x}", rng.gen_range(0..0x100_0000));
        }

        available[rng.gen_range(0..available.len())].to_string()
    }
}
