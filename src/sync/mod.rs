//! Keeps the station layer in step with whatever part of the map is visible.

mod plugin;
mod settle;
mod synchronizer;

pub use plugin::*;
pub use settle::*;
pub use synchronizer::*;
