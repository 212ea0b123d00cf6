//! Genetic search for long-lived initial patterns.
//!
//! A population of chromosomes, each a full initial grid pattern, is evolved
//! against a compiled automaton:
//!
//! - **Chromosomes** (`chromosome`): random patterns, crossover and mutation
//! - **Fitness** (`fitness`): play a pattern out and score its survival
//! - **Selection** (`selection`): roulette wheel, rank, steady state,
//!   tournament, elitism and random selection
//! - **Search** (`search`): the epoch loop, best tracking and cancellation
//! - **Archive** (`archive`): text export and import of a pattern together
//!   with its automaton
//!
//! # Example
//!
//! ```rust,no_run
//! use cellygen::schema::{AutomatonConfig, EvolutionConfig};
//! use cellygen::compute::evolution::EvolutionEngine;
//!
//! let automaton = AutomatonConfig::default();
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), &automaton).unwrap();
//! let result = engine.run_with_callback(|progress| {
//!     println!("Epoch {}: best fitness = {:.3}", progress.epoch, progress.best.fitness);
//! }).unwrap();
//!
//! println!("Best pattern fitness: {:.3}", result.best.stats.fitness);
//! ```

mod archive;
mod chromosome;
mod fitness;
mod search;
mod selection;

pub use archive::{PatternError, PatternExport, settings_summary};
pub use chromosome::{Chromosome, ChromosomeRng};
pub use fitness::{EvaluationTrajectory, FitnessEvaluator};
pub use search::{EvolutionEngine, EvolutionError, EvolutionHandle};
pub use selection::{
    elite_indices, rank, random, roulette_wheel, select, steady_state, tournament, unfit_count,
};
