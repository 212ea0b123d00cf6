//! Compute module - grid state, rule execution and pattern search.

mod automaton;
mod cancel;
mod grid;
mod playback;

pub mod evolution;

pub use automaton::*;
pub use cancel::*;
pub use grid::*;
pub use playback::*;
