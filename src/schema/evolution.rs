//! Genetic search configuration types.
//!
//! The search evolves initial grid configurations. Each candidate is played
//! out with the automaton until it stops changing or reaches one of the
//! configured targets, and is scored from how long it lived, how populated it
//! stayed and how small it started.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ConfigError, StateId};

/// Top-level configuration for the genetic pattern search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of chromosomes per epoch.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Probability that a pair of parents is recombined (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Probability that a single gene is replaced (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Selection strategy.
    #[serde(default)]
    pub selection: SelectionMethod,
    /// Fitness multipliers.
    #[serde(default)]
    pub fitness: FitnessWeights,
    /// Evaluation and run bounds.
    #[serde(default)]
    pub targets: Targets,
    /// Chromosomes protected from crossover and mutation under elitism.
    #[serde(default = "default_elites")]
    pub elites: usize,
    /// Probability that a tournament keeps the fitter contender.
    #[serde(default = "default_tournament_win_rate")]
    pub tournament_win_rate: f64,
    /// Fraction of the population allowed to recombine under steady state.
    #[serde(default = "default_unfit_fraction")]
    pub unfit_fraction: f64,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            selection: SelectionMethod::default(),
            fitness: FitnessWeights::default(),
            targets: Targets::default(),
            elites: default_elites(),
            tournament_win_rate: default_tournament_win_rate(),
            unfit_fraction: default_unfit_fraction(),
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    30
}
fn default_crossover_rate() -> f64 {
    0.25
}
fn default_mutation_rate() -> f64 {
    0.01
}
fn default_elites() -> usize {
    2
}
fn default_tournament_win_rate() -> f64 {
    0.75
}
fn default_unfit_fraction() -> f64 {
    0.1
}

/// Selection strategy used to build the next population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Fitness-proportionate draws.
    #[default]
    RouletteWheel,
    /// Draws proportional to rank (1 = worst).
    Rank,
    /// Recombine only the weakest fraction; has its own crossover.
    SteadyState,
    /// Best-of-two with a configurable upset chance.
    Tournament,
    /// Pass-through; top chromosomes are protected later.
    Elitism,
    /// Coin-flip inclusion.
    Random,
}

impl SelectionMethod {
    pub const ALL: [SelectionMethod; 6] = [
        SelectionMethod::RouletteWheel,
        SelectionMethod::Rank,
        SelectionMethod::SteadyState,
        SelectionMethod::Tournament,
        SelectionMethod::Elitism,
        SelectionMethod::Random,
    ];

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            SelectionMethod::RouletteWheel => "Roulette Wheel",
            SelectionMethod::Rank => "Rank",
            SelectionMethod::SteadyState => "Steady State",
            SelectionMethod::Tournament => "Tournament",
            SelectionMethod::Elitism => "Elitism",
            SelectionMethod::Random => "Random",
        }
    }
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Multipliers of the fitness function
/// `(g * generations + p * avg_population) * (1 - s * initial_size / area) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights {
    #[serde(default = "default_generation_weight")]
    pub generation: f64,
    #[serde(default)]
    pub population: f64,
    #[serde(default)]
    pub initial_size: f64,
}

fn default_generation_weight() -> f64 {
    1.0
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            generation: default_generation_weight(),
            population: 0.0,
            initial_size: 0.0,
        }
    }
}

/// Bounds on a single evaluation and on the whole run. Zero disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targets {
    /// Stop evaluating a chromosome after this many generations.
    #[serde(default = "default_generation_target")]
    pub generations: usize,
    /// Stop evaluating a chromosome once this many cells are live.
    ///
    /// With `generations` at zero this is the only per-chromosome bound: a
    /// pattern that oscillates below it forever is only ended by cancelling
    /// the run.
    #[serde(default)]
    pub population: usize,
    /// Stop the run after this many epochs. Zero runs until cancelled.
    #[serde(default = "default_epoch_target")]
    pub epochs: usize,
}

fn default_generation_target() -> usize {
    100
}
fn default_epoch_target() -> usize {
    10
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            generations: default_generation_target(),
            population: 0,
            epochs: default_epoch_target(),
        }
    }
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Simulation statistics of one chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeStats {
    /// Generations that produced changes before evaluation stopped.
    pub generations: usize,
    /// Mean live-cell count over those generations, rounded up.
    pub average_population: usize,
    /// Live cells in the initial pattern.
    pub initial_size: usize,
    pub fitness: f64,
}

impl Default for ChromosomeStats {
    fn default() -> Self {
        Self {
            generations: 0,
            average_population: 0,
            initial_size: 0,
            fitness: 1.0,
        }
    }
}

/// A chromosome's initial pattern together with its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeSnapshot {
    /// Epoch the chromosome was evaluated in (0 = initial population).
    pub epoch: usize,
    pub stats: ChromosomeStats,
    /// Grid columns.
    pub width: usize,
    /// Grid rows.
    pub height: usize,
    /// Row-major genes, one state per cell.
    pub pattern: Vec<StateId>,
}

/// Progress update emitted once per epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Epochs completed (0 = initial population evaluated).
    pub epoch: usize,
    /// Epoch target, 0 when unbounded.
    pub total_epochs: usize,
    /// Chromosomes evaluated so far.
    pub evaluations: u64,
    /// Best chromosome of this epoch.
    pub last: ChromosomeStats,
    /// Best chromosome seen so far.
    pub best: ChromosomeStats,
    /// Average fitness of the current population.
    pub avg_fitness: f64,
    /// Current phase of the algorithm.
    pub phase: EvolutionPhase,
}

/// Fitness history for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Best fitness found so far, per epoch.
    pub best_fitness: Vec<f64>,
    /// Average fitness per epoch.
    pub avg_fitness: Vec<f64>,
}

impl EvolutionHistory {
    pub fn record(&mut self, best: f64, avg: f64) {
        self.best_fitness.push(best);
        self.avg_fitness.push(avg);
    }

    pub fn len(&self) -> usize {
        self.best_fitness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best_fitness.is_empty()
    }
}

/// Current phase of the search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    #[default]
    Initializing,
    Evaluating,
    Selecting,
    Reproducing,
    Complete,
    Stopped,
}

/// Final result of a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best chromosome across all epochs.
    pub best: ChromosomeSnapshot,
    pub stats: EvolutionStats,
    pub history: EvolutionHistory,
}

/// Statistics from a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Epochs completed after the initial evaluation.
    pub epochs: usize,
    /// Chromosome evaluations performed.
    pub total_evaluations: u64,
    pub best_fitness: f64,
    /// Average fitness of the final population.
    pub final_avg_fitness: f64,
    /// Wall-clock time, in seconds.
    pub elapsed_seconds: f64,
    pub evaluations_per_second: f64,
    pub stop_reason: StopReason,
}

/// Reason the search stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the epoch target.
    EpochTarget,
    /// Cancelled by the caller.
    Cancelled,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("{name} must be within [0, 1] (got {value})")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("{name} multiplier must be non-negative (got {value})")]
    NegativeMultiplier { name: &'static str, value: f64 },
    #[error("Generation and population targets cannot both be zero")]
    UnboundedEvaluation,
    #[error("Elite count {elites} must be below the population size {population}")]
    TooManyElites { elites: usize, population: usize },
    #[error("At least one state besides FREE is required")]
    NoLiveStates,
    #[error("At least one rule is required")]
    NoRules,
    #[error("Automaton config validation failed: {0}")]
    Automaton(#[from] ConfigError),
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        if self.population_size < 2 {
            return Err(EvolutionConfigError::PopulationTooSmall);
        }

        let check_probability = |value: f64, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(EvolutionConfigError::InvalidProbability { name, value })
            }
        };
        check_probability(self.crossover_rate, "Crossover rate")?;
        check_probability(self.mutation_rate, "Mutation rate")?;
        check_probability(self.tournament_win_rate, "Tournament win rate")?;
        check_probability(self.unfit_fraction, "Unfit fraction")?;

        let check_multiplier = |value: f64, name: &'static str| {
            if value >= 0.0 {
                Ok(())
            } else {
                Err(EvolutionConfigError::NegativeMultiplier { name, value })
            }
        };
        check_multiplier(self.fitness.generation, "Generation")?;
        check_multiplier(self.fitness.population, "Population")?;
        check_multiplier(self.fitness.initial_size, "Initial size")?;

        // a population target alone is accepted; see `Targets::population`
        if self.targets.generations == 0 && self.targets.population == 0 {
            return Err(EvolutionConfigError::UnboundedEvaluation);
        }

        if self.selection == SelectionMethod::Elitism && self.elites >= self.population_size {
            return Err(EvolutionConfigError::TooManyElites {
                elites: self.elites,
                population: self.population_size,
            });
        }

        Ok(())
    }
}
