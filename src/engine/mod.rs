// Simulation engine: grid world, ownership propagation, resource routing,
// and the snapshot/subscription hub.

pub mod config;
pub mod game;
pub mod grid;
pub mod player;
pub mod routing;
pub mod spread;
