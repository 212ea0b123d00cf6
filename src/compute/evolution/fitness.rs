//! Chromosome evaluation.
//!
//! A chromosome is played out from its initial pattern until a generation
//! produces no changes or one of the configured targets is reached:
//!
//! ```text
//! fitness = (g * generations + p * average_population)
//!         * (1 - s * initial_size / area) + 1
//! ```

use log::trace;

use crate::compute::{Automaton, CancelToken, Grid, StepError, StepOutcome};
use crate::schema::{ChromosomeStats, FitnessWeights, StateId, Targets};

/// Plays chromosomes out and scores them.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    automaton: Automaton,
    weights: FitnessWeights,
    targets: Targets,
    width: usize,
    height: usize,
}

impl FitnessEvaluator {
    pub fn new(
        automaton: Automaton,
        weights: FitnessWeights,
        targets: Targets,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            automaton,
            weights,
            targets,
            width,
            height,
        }
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// Simulate `pattern` and compute its statistics.
    ///
    /// No delay is inserted between generations. With only a population
    /// target, a pattern that settles into an oscillation below it runs
    /// until `cancel` fires.
    pub fn evaluate(
        &self,
        pattern: &[StateId],
        cancel: &CancelToken,
    ) -> Result<ChromosomeStats, StepError> {
        let mut grid = Grid::from_pattern(self.width, self.height, pattern);
        let initial_size = grid.live_count();
        let mut trajectory = EvaluationTrajectory::default();

        loop {
            match self.automaton.step(&mut grid, cancel)? {
                StepOutcome::Finished => break,
                StepOutcome::Changed(_) => trajectory.record(grid.live_count()),
            }

            if self.targets.generations > 0 && trajectory.generations() >= self.targets.generations
            {
                break;
            }
            if self.targets.population > 0 && grid.live_count() >= self.targets.population {
                break;
            }
        }

        let average = trajectory.average_population();
        let fitness = self.fitness(trajectory.generations(), average, initial_size);
        trace!(
            "Evaluated chromosome: {} generations, avg population {:.2}, fitness {:.3}",
            trajectory.generations(),
            average,
            fitness
        );

        Ok(ChromosomeStats {
            generations: trajectory.generations(),
            average_population: average.ceil() as usize,
            initial_size,
            fitness,
        })
    }

    /// Fitness from raw statistics. The average population is used unrounded.
    pub fn fitness(&self, generations: usize, average_population: f64, initial_size: usize) -> f64 {
        let area = (self.width * self.height).max(1) as f64;
        let survival =
            self.weights.generation * generations as f64 + self.weights.population * average_population;
        survival * (1.0 - self.weights.initial_size * initial_size as f64 / area) + 1.0
    }
}

/// Live-cell counts after each generation that produced changes.
#[derive(Debug, Clone, Default)]
pub struct EvaluationTrajectory {
    live_counts: Vec<usize>,
}

impl EvaluationTrajectory {
    pub fn record(&mut self, live: usize) {
        self.live_counts.push(live);
    }

    pub fn generations(&self) -> usize {
        self.live_counts.len()
    }

    /// Mean live-cell count, 0 when no generation was recorded.
    pub fn average_population(&self) -> f64 {
        if self.live_counts.is_empty() {
            return 0.0;
        }
        self.live_counts.iter().sum::<usize>() as f64 / self.live_counts.len() as f64
    }
}
