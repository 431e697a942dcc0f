use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::metrics;

use super::config::MIN_SUBSCRIBER_BUFFER;
use super::grid::{Grid, Position, TileType};
use super::player::{Player, PlayerHandle, Roster};
use super::routing::{self, ResourceTable};
use super::spread::{self, ClaimMap};

/// Errors surfaced by player placement. None are fatal to the engine and
/// none interrupt the tick scheduler.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("no available tiles for core placement")]
    NoPlacementAvailable,
    #[error("player {0} already exists")]
    PlayerExists(String),
    #[error("position {0} out of bounds")]
    OutOfBounds(Position),
    #[error("tile {0} already contains a core")]
    CoreOccupied(Position),
}

/// Tile view in a snapshot, with the owner handle mapped back to the
/// player's public id.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileView {
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(rename = "type")]
    pub tile_type: TileType,
    pub has_resource: bool,
    pub core_border: bool,
    pub resource_base: bool,
}

/// Resource token view in a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub position: Position,
}

/// Immutable, fully-copied view of the world after one tick. Safe to hand
/// to any number of concurrent readers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub tick: i64,
    pub width: usize,
    pub height: usize,
    pub players: HashMap<String, Player>,
    pub tiles: Vec<TileView>,
    pub resources: Vec<ResourceView>,
}

struct GameState {
    tick: i64,
    grid: Grid,
    roster: Roster,
    resources: ResourceTable,
    /// Claims pending application next tick; the only propagation state
    /// carried across tick boundaries.
    pending: ClaimMap,
    rng: StdRng,
    subscribers: HashMap<u64, mpsc::Sender<GameSnapshot>>,
    next_subscriber: u64,
}

/// The simulation engine. All mutation and all consistent multi-field reads
/// happen under a single reader/writer lock, so a snapshot always reflects
/// one atomic tick. Cheap to clone; clones share the same world.
#[derive(Clone)]
pub struct Game {
    inner: Arc<RwLock<GameState>>,
}

/// Handle for an active snapshot subscription. Unsubscribing (or dropping)
/// removes the subscriber and closes its channel; calling `unsubscribe`
/// more than once is harmless.
pub struct Subscription {
    id: Option<u64>,
    inner: Arc<RwLock<GameState>>,
}

impl Subscription {
    pub fn unsubscribe(&mut self) {
        if let Some(id) = self.id.take() {
            self.inner.write().unwrap().subscribers.remove(&id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Game {
    /// Create a game with a fresh entropy seed.
    pub fn new(width: usize, height: usize, resource_bases: usize) -> Self {
        Game::with_rng(width, height, resource_bases, StdRng::from_entropy())
    }

    /// Create a game with a caller-supplied generator, for deterministic
    /// placement and palette assignment in tests.
    pub fn with_rng(width: usize, height: usize, resource_bases: usize, mut rng: StdRng) -> Self {
        let mut grid = Grid::new(width, height);
        seed_resource_tiles(&mut grid, &mut rng, resource_bases);
        let resources = ResourceTable::new(width * height);

        Game {
            inner: Arc::new(RwLock::new(GameState {
                tick: 0,
                grid,
                roster: Roster::new(),
                resources,
                pending: ClaimMap::new(),
                rng,
                subscribers: HashMap::new(),
                next_subscriber: 0,
            })),
        }
    }

    /// Join a player, placing a core on a random legal tile. Idempotent:
    /// joining an existing id returns that player's current state with no
    /// side effects, so reconnects are free.
    pub fn add_player(&self, id: &str) -> Result<Player, GameError> {
        let mut guard = self.inner.write().unwrap();
        let state = &mut *guard;

        if let Some(handle) = state.roster.handle_of(id) {
            return Ok(state.roster.player(handle).clone());
        }

        let color = state.roster.next_color(&mut state.rng);
        let pos = random_core_position(&state.grid, &mut state.rng)?;

        let handle = state.roster.insert(Player {
            id: id.to_string(),
            color,
            core_positions: vec![pos],
            resource_count: 0,
            joined_at_tick: state.tick,
        });

        let tile = state.grid.tile_mut(state.grid.index_of(pos));
        tile.tile_type = TileType::Core;
        tile.owner = Some(handle);
        tile.core_border = true;

        Ok(state.roster.player(handle).clone())
    }

    /// Explicit-placement join used by tests and tooling. Unlike
    /// `add_player`, a duplicate id is an error here.
    pub fn add_player_at(
        &self,
        id: &str,
        pos: Position,
        color: &str,
    ) -> Result<Player, GameError> {
        let mut guard = self.inner.write().unwrap();
        let state = &mut *guard;

        if state.roster.handle_of(id).is_some() {
            return Err(GameError::PlayerExists(id.to_string()));
        }
        if !state.grid.is_in_bounds(pos) {
            return Err(GameError::OutOfBounds(pos));
        }

        let idx = state.grid.index_of(pos);
        {
            let tile = state.grid.tile(idx);
            if tile.tile_type == TileType::Core && tile.owner.is_some() {
                return Err(GameError::CoreOccupied(pos));
            }
        }

        let color = if color.is_empty() {
            state.roster.next_color(&mut state.rng)
        } else {
            color.to_string()
        };

        let handle = state.roster.insert(Player {
            id: id.to_string(),
            color,
            core_positions: vec![pos],
            resource_count: 0,
            joined_at_tick: state.tick,
        });

        let tile = state.grid.tile_mut(idx);
        tile.tile_type = TileType::Core;
        tile.owner = Some(handle);
        tile.core_border = true;

        Ok(state.roster.player(handle).clone())
    }

    /// Read-only player lookup by public id.
    pub fn player(&self, id: &str) -> Option<Player> {
        let state = self.inner.read().unwrap();
        state
            .roster
            .handle_of(id)
            .map(|handle| state.roster.player(handle).clone())
    }

    pub fn player_count(&self) -> usize {
        self.inner.read().unwrap().roster.len()
    }

    /// Run one simulation tick: propagate ownership, route resources, then
    /// broadcast the resulting snapshot. The lock is released before
    /// delivery; sends are non-blocking, so a subscriber with a full buffer
    /// simply misses this tick.
    pub fn tick(&self) -> GameSnapshot {
        let (snapshot, senders) = {
            let mut guard = self.inner.write().unwrap();
            let state = &mut *guard;

            state.tick += 1;

            let mut incoming = std::mem::take(&mut state.pending);
            spread::seed_core_claims(&state.grid, &state.roster, &mut incoming);
            state.pending = spread::resolve(&mut state.grid, incoming);

            let fields = routing::distance_fields(&state.grid, &state.roster);
            routing::spawn_tokens(&state.grid, &mut state.resources);
            routing::advance_tokens(&state.grid, &mut state.roster, &mut state.resources, &fields);
            routing::refresh_occupancy(&mut state.grid, &state.resources);

            let snapshot = state.snapshot();
            let senders: Vec<mpsc::Sender<GameSnapshot>> =
                state.subscribers.values().cloned().collect();
            (snapshot, senders)
        };

        for tx in senders {
            match tx.try_send(snapshot.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    metrics::SNAPSHOT_SENDS_DROPPED_TOTAL.inc();
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }

        snapshot
    }

    /// Fresh deep copy of the current state, independent of later mutation.
    pub fn current_snapshot(&self) -> GameSnapshot {
        self.inner.read().unwrap().snapshot()
    }

    /// Register a snapshot subscriber with the given buffer capacity
    /// (minimum 1). Returns the receiving end and an unsubscribe handle.
    pub fn subscribe(&self, buffer: usize) -> (mpsc::Receiver<GameSnapshot>, Subscription) {
        let buffer = buffer.max(MIN_SUBSCRIBER_BUFFER);
        let (tx, rx) = mpsc::channel(buffer);

        let mut state = self.inner.write().unwrap();
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.insert(id, tx);

        (
            rx,
            Subscription {
                id: Some(id),
                inner: self.inner.clone(),
            },
        )
    }
}

impl GameState {
    fn snapshot(&self) -> GameSnapshot {
        let player_id = |handle: PlayerHandle| self.roster.player(handle).id.clone();

        let tiles = self
            .grid
            .tiles()
            .iter()
            .map(|tile| TileView {
                position: tile.position,
                owner_id: tile.owner.map(player_id),
                tile_type: tile.tile_type,
                has_resource: tile.has_resource,
                core_border: tile.core_border,
                resource_base: tile.resource_base,
            })
            .collect();

        let players = self
            .roster
            .iter()
            .map(|(_, player)| (player.id.clone(), player.clone()))
            .collect();

        let resources = self
            .resources
            .iter()
            .map(|token| ResourceView {
                id: format!("res-{}", token.id),
                owner_id: token.owner.map(player_id),
                position: token.position,
            })
            .collect();

        GameSnapshot {
            tick: self.tick,
            width: self.grid.width,
            height: self.grid.height,
            players,
            tiles,
            resources,
        }
    }
}

/// Designate `count` resource-base tiles, chosen uniformly at random
/// without replacement. Bases are immutable for the life of the game.
fn seed_resource_tiles(grid: &mut Grid, rng: &mut StdRng, count: usize) {
    let mut available: Vec<Position> = grid.tiles().iter().map(|t| t.position).collect();

    for _ in 0..count {
        if available.is_empty() {
            break;
        }
        let pick = rng.gen_range(0..available.len());
        let pos = available.swap_remove(pick);
        let idx = grid.index_of(pos);
        let tile = grid.tile_mut(idx);
        tile.tile_type = TileType::Resource;
        tile.resource_base = true;
    }
}

/// A random tile legal for automatic core placement: not a core, not
/// core-bordering, not a resource base.
fn random_core_position(grid: &Grid, rng: &mut StdRng) -> Result<Position, GameError> {
    let candidates: Vec<Position> = grid
        .tiles()
        .iter()
        .filter(|t| {
            t.tile_type != TileType::Core && !t.core_border && t.tile_type != TileType::Resource
        })
        .map(|t| t.position)
        .collect();

    if candidates.is_empty() {
        return Err(GameError::NoPlacementAvailable);
    }
    Ok(candidates[rng.gen_range(0..candidates.len())])
}
