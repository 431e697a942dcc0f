use std::fmt;

use serde::{Deserialize, Serialize};

use super::player::PlayerHandle;

/// Index of a tile in the grid arena (`y * width + x`).
pub type TileIndex = usize;

/// A grid coordinate. Identity is value equality; may be out of bounds
/// during neighbour computation, so components are signed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Tile classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileType {
    Normal,
    Core,
    Resource,
}

/// A single tile in the world grid. The owner is a roster handle; the
/// snapshot layer maps it back to the player's public id.
#[derive(Clone, Debug)]
pub struct Tile {
    pub position: Position,
    pub tile_type: TileType,
    pub owner: Option<PlayerHandle>,
    /// Occupancy flag derived from token positions each tick.
    pub has_resource: bool,
    /// Marks a tile that hosts a core, excluded from automatic placement.
    pub core_border: bool,
    /// Permanently designated resource spawn point, immutable after creation.
    pub resource_base: bool,
}

/// Fixed-size rectangular world grid. The shape is immutable after
/// construction; tile contents are mutated only by the engine under its lock.
pub struct Grid {
    pub width: usize,
    pub height: usize,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Create a grid of normal, unowned tiles.
    pub fn new(width: usize, height: usize) -> Self {
        let mut tiles = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                tiles.push(Tile {
                    position: Position::new(x as i32, y as i32),
                    tile_type: TileType::Normal,
                    owner: None,
                    has_resource: false,
                    core_border: false,
                    resource_base: false,
                });
            }
        }
        Grid {
            width,
            height,
            tiles,
        }
    }

    /// Returns true if `pos` is within the grid bounds.
    pub fn is_in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    /// Arena index of an in-bounds position.
    #[inline]
    pub fn index_of(&self, pos: Position) -> TileIndex {
        pos.y as usize * self.width + pos.x as usize
    }

    pub fn tile(&self, idx: TileIndex) -> &Tile {
        &self.tiles[idx]
    }

    pub fn tile_mut(&mut self, idx: TileIndex) -> &mut Tile {
        &mut self.tiles[idx]
    }

    /// Tile at a position, or None when out of bounds.
    pub fn tile_at(&self, pos: Position) -> Option<&Tile> {
        if self.is_in_bounds(pos) {
            Some(&self.tiles[self.index_of(pos)])
        } else {
            None
        }
    }

    pub fn tile_at_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        if self.is_in_bounds(pos) {
            let idx = self.index_of(pos);
            Some(&mut self.tiles[idx])
        } else {
            None
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The up-to-8 in-bounds Moore neighbours of `pos`, in fixed scan order
    /// (dx outer, dy inner). Downstream tie-breaking depends on this order.
    pub fn neighbors(&self, pos: Position) -> Vec<Position> {
        let mut result = Vec::with_capacity(8);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let next = Position::new(pos.x + dx, pos.y + dy);
                if self.is_in_bounds(next) {
                    result.push(next);
                }
            }
        }
        result
    }
}
