//! Cellygen - rule-language cellular automata and pattern search.
//!
//! Automata are described by a set of named states, a neighborhood and a
//! small transition language. The crate compiles that language, runs the
//! resulting automaton on a bounded sparse grid and searches for initial
//! patterns that keep evolving for as long as possible.
//!
//! # Architecture
//!
//! - `schema`: configuration and data types (states, neighborhoods, rules,
//!   search settings)
//! - `compiler`: rule text to [`schema::RuleTable`] with positioned
//!   diagnostics
//! - `compute`: the grid, the automaton step, playback and the genetic
//!   search
//!
//! # Example
//!
//! ```rust,no_run
//! use cellygen::{
//!     compiler,
//!     compute::{Automaton, CancelToken, Grid, Position, StepOutcome},
//!     schema::{AutomatonConfig, StateId},
//! };
//!
//! // Conway's Life on a 64x64 grid
//! let config = AutomatonConfig::default();
//! let rules = compiler::compile(&config).into_result().expect("valid rules");
//! let automaton = Automaton::new(config.states.clone(), config.neighborhood, rules);
//!
//! // A blinker
//! let mut grid = Grid::new(config.width, config.height);
//! for x in 10..13 {
//!     grid.set(Position::new(x, 10), StateId(1)).unwrap();
//! }
//!
//! let cancel = CancelToken::new();
//! for _ in 0..10 {
//!     if let StepOutcome::Finished = automaton.step(&mut grid, &cancel).unwrap() {
//!         break;
//!     }
//! }
//! println!("Live cells after 10 generations: {}", grid.live_count());
//! ```

pub mod compiler;
pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compiler::{Compilation, CompileError, Compiler};
pub use compute::evolution::{EvolutionEngine, PatternExport};
pub use compute::{Automaton, Grid, Playback};
pub use schema::{AutomatonConfig, EvolutionConfig, RuleTable, StateSet};
