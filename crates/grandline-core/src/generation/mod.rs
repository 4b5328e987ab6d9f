//! Generation - procedural creation of islands, crews and characters

mod names;
mod world;

pub use names::*;
pub use world::*;
