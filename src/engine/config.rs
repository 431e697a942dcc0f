// Engine constants and defaults.

/// Colour palette assigned to joining players. Colours are unique while the
/// palette has capacity; afterwards the engine falls back to pseudo-random
/// colours and tolerates collisions.
pub const COLOR_POOL: [&str; 10] = [
    "#ff4f4f", "#4f83ff", "#4fff73", "#ff4fbd", "#ffb84f", "#9b59ff", "#4ffff4", "#ffd24f",
    "#2ecc71", "#e74c3c",
];

/// Default grid width in tiles.
pub const DEFAULT_WIDTH: usize = 64;

/// Default grid height in tiles.
pub const DEFAULT_HEIGHT: usize = 64;

/// Default tick interval in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 1000;

/// Minimum per-subscriber snapshot buffer capacity.
pub const MIN_SUBSCRIBER_BUFFER: usize = 1;
