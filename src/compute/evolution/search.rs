//! Genetic search over initial grid patterns.

use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::compiler::{self, CompileError};
use crate::compute::{Automaton, CancelToken, Cancelled, StepError};
use crate::schema::{
    AutomatonConfig, ChromosomeSnapshot, ChromosomeStats, ConfigError, EvolutionConfig,
    EvolutionConfigError, EvolutionHistory, EvolutionPhase, EvolutionProgress, EvolutionResult,
    EvolutionStats, SelectionMethod, StateId, StopReason,
};

use super::chromosome::{Chromosome, ChromosomeRng};
use super::fitness::FitnessEvaluator;
use super::selection::{elite_indices, select};

/// Errors that prevent a search from starting or completing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvolutionError {
    #[error(transparent)]
    Config(#[from] EvolutionConfigError),
    #[error("Rule text has {} error(s)", .0.len())]
    InvalidRules(Vec<CompileError>),
    #[error("Evaluation failed: {0}")]
    Step(#[from] StepError),
    #[error("Search worker panicked")]
    WorkerPanicked,
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: ChromosomeRng,
    evaluator: FitnessEvaluator,
    width: usize,
    height: usize,
    population: Vec<Chromosome>,
    history: EvolutionHistory,
    epoch: usize,
    evaluations: u64,
    /// Best of the last evaluated epoch.
    last: ChromosomeStats,
    /// Best chromosome so far and the epoch it was found in.
    best: Option<(usize, Chromosome)>,
    phase: EvolutionPhase,
    cancel: CancelToken,
}

impl EvolutionEngine {
    /// Compile the automaton configuration and create an engine for it.
    pub fn new(config: EvolutionConfig, automaton: &AutomatonConfig) -> Result<Self, EvolutionError> {
        automaton
            .validate()
            .map_err(EvolutionConfigError::from)
            .inspect_err(|e| warn!("Rejected automaton configuration: {}", e))?;

        let compilation = compiler::compile(automaton);
        if !compilation.is_ok() {
            warn!(
                "Rejected rule text: {} compile error(s)",
                compilation.errors.len()
            );
            return Err(EvolutionError::InvalidRules(compilation.errors));
        }

        let automaton_engine = Automaton::new(
            automaton.states.clone(),
            automaton.neighborhood,
            compilation.rules,
        );
        Self::with_automaton(config, automaton_engine, automaton.width, automaton.height)
    }

    /// Create an engine for an already compiled automaton.
    pub fn with_automaton(
        config: EvolutionConfig,
        automaton: Automaton,
        width: usize,
        height: usize,
    ) -> Result<Self, EvolutionError> {
        let checked = config
            .validate()
            .and_then(|()| {
                if width == 0 || height == 0 {
                    Err(ConfigError::InvalidDimensions.into())
                } else if automaton.states().user_count() == 0 {
                    Err(EvolutionConfigError::NoLiveStates)
                } else if automaton.rules().is_empty() {
                    Err(EvolutionConfigError::NoRules)
                } else {
                    Ok(())
                }
            })
            .inspect_err(|e| warn!("Rejected evolution configuration: {}", e));
        checked?;

        let rng = config
            .random_seed
            .map_or_else(ChromosomeRng::random, ChromosomeRng::new);
        let evaluator = FitnessEvaluator::new(
            automaton,
            config.fitness.clone(),
            config.targets.clone(),
            width,
            height,
        );

        Ok(Self {
            config,
            rng,
            evaluator,
            width,
            height,
            population: Vec::new(),
            history: EvolutionHistory::default(),
            epoch: 0,
            evaluations: 0,
            last: ChromosomeStats::default(),
            best: None,
            phase: EvolutionPhase::Initializing,
            cancel: CancelToken::new(),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Current population, in evaluation order.
    pub fn population(&self) -> &[Chromosome] {
        &self.population
    }

    /// Initialize the population.
    pub fn initialize(&mut self) {
        let area = self.width * self.height;
        let live_states = self.evaluator.automaton().states().user_count();

        self.population = (0..self.config.population_size)
            .map(|_| self.rng.random_chromosome(area, live_states))
            .collect();
        self.epoch = 0;
        self.evaluations = 0;
        self.best = None;
        self.last = ChromosomeStats::default();
        self.history = EvolutionHistory::default();
    }

    /// Evaluate all chromosomes in parallel.
    fn evaluate_population(&mut self) -> Result<(), StepError> {
        self.phase = EvolutionPhase::Evaluating;
        let evaluator = &self.evaluator;
        let cancel = &self.cancel;

        self.population
            .par_iter_mut()
            .try_for_each(|chromosome| -> Result<(), StepError> {
                chromosome.stats = evaluator.evaluate(&chromosome.pattern, cancel)?;
                Ok(())
            })?;

        self.evaluations += self.population.len() as u64;
        Ok(())
    }

    /// Build the next population: selection, crossover and mutation.
    fn step_epoch(&mut self) -> Result<(), Cancelled> {
        let elitism = self.config.selection == SelectionMethod::Elitism;
        let elites: Vec<Chromosome> = if elitism {
            elite_indices(&self.population, self.config.elites)
                .into_iter()
                .map(|i| self.population[i].clone())
                .collect()
        } else {
            Vec::new()
        };

        self.phase = EvolutionPhase::Selecting;
        let selected = select(&self.population, &self.config, &mut self.rng, &self.cancel)?;

        self.phase = EvolutionPhase::Reproducing;
        let mut next = if self.config.selection == SelectionMethod::SteadyState {
            selected
        } else {
            self.crossover(&selected, elites)?
        };
        self.mutate(&mut next)?;

        for chromosome in &mut next {
            *chromosome = Chromosome::new(std::mem::take(&mut chromosome.pattern));
        }
        self.population = next;
        Ok(())
    }

    /// Pair adjacent chromosomes and recombine each pair with the crossover
    /// rate. Elites are prepended unchanged and the overflow trimmed.
    fn crossover(
        &mut self,
        selected: &[Chromosome],
        elites: Vec<Chromosome>,
    ) -> Result<Vec<Chromosome>, Cancelled> {
        let size = self.config.population_size;
        let mut next = elites;
        next.reserve(selected.len());

        for pair in selected.chunks_exact(2) {
            self.cancel.check()?;
            let (mut a, mut b) = (pair[0].clone(), pair[1].clone());
            if self.rng.chance(self.config.crossover_rate) {
                self.rng.crossover(&mut a, &mut b);
            }
            next.push(a);
            next.push(b);
            if next.len() >= size {
                break;
            }
        }
        if selected.len() % 2 == 1
            && let Some(last) = selected.last()
        {
            next.push(last.clone());
        }

        next.truncate(size);
        Ok(next)
    }

    /// Mutate every chromosome except the leading elites.
    fn mutate(&mut self, population: &mut [Chromosome]) -> Result<(), Cancelled> {
        let protected = if self.config.selection == SelectionMethod::Elitism {
            self.config.elites
        } else {
            0
        };
        let states = self.evaluator.automaton().states().len();

        for chromosome in population.iter_mut().skip(protected) {
            self.cancel.check()?;
            self.rng
                .mutate(chromosome, self.config.mutation_rate, states);
        }
        Ok(())
    }

    /// Record the epoch's best chromosome and the best so far. Ties keep the
    /// chromosome found first.
    fn update_best(&mut self) {
        let Some(first) = self.population.first() else {
            return;
        };
        let epoch_best = self.population[1..]
            .iter()
            .fold(first, |best, c| if c.fitness() > best.fitness() { c } else { best });

        self.last = epoch_best.stats;
        let improved = match &self.best {
            None => true,
            Some((_, best)) => epoch_best.fitness() > best.fitness(),
        };
        if improved {
            self.best = Some((self.epoch, epoch_best.clone()));
        }

        let avg = self.avg_fitness();
        self.history
            .record(self.best.as_ref().map_or(0.0, |(_, b)| b.fitness()), avg);
    }

    fn avg_fitness(&self) -> f64 {
        if self.population.is_empty() {
            0.0
        } else {
            self.population.iter().map(Chromosome::fitness).sum::<f64>()
                / self.population.len() as f64
        }
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        EvolutionProgress {
            epoch: self.epoch,
            total_epochs: self.config.targets.epochs,
            evaluations: self.evaluations,
            last: self.last,
            best: self
                .best
                .as_ref()
                .map_or_else(ChromosomeStats::default, |(_, b)| b.stats),
            avg_fitness: self.avg_fitness(),
            phase: self.phase,
        }
    }

    /// Best chromosome so far.
    pub fn best(&self) -> Option<ChromosomeSnapshot> {
        self.best
            .as_ref()
            .map(|(epoch, c)| c.to_snapshot(*epoch, self.width, self.height))
    }

    /// Check if the search should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        let target = self.config.targets.epochs;
        if target > 0 && self.epoch >= target {
            return Some(StopReason::EpochTarget);
        }
        None
    }

    /// Run the search with progress callback.
    pub fn run_with_callback<F>(&mut self, callback: F) -> Result<EvolutionResult, EvolutionError>
    where
        F: Fn(&EvolutionProgress),
    {
        let start_time = Instant::now();
        info!(
            "Starting search: population {}, {} selection, epoch target {}",
            self.config.population_size,
            self.config.selection,
            self.config.targets.epochs
        );

        self.phase = EvolutionPhase::Initializing;
        self.initialize();
        callback(&self.progress());

        // Evaluate initial population
        let stop_reason = match self.evaluate_population() {
            Ok(()) => {
                self.update_best();
                callback(&self.progress());

                loop {
                    if let Some(reason) = self.should_stop() {
                        break reason;
                    }
                    if self.step_epoch().is_err() {
                        break StopReason::Cancelled;
                    }
                    match self.evaluate_population() {
                        Ok(()) => {}
                        Err(StepError::Cancelled) => break StopReason::Cancelled,
                        Err(e) => return Err(self.fail(e)),
                    }

                    self.epoch += 1;
                    self.update_best();
                    debug!(
                        "Epoch {}: best {:.3}, last {:.3}, avg {:.3}",
                        self.epoch,
                        self.progress().best.fitness,
                        self.last.fitness,
                        self.avg_fitness()
                    );
                    callback(&self.progress());
                }
            }
            Err(StepError::Cancelled) => StopReason::Cancelled,
            Err(e) => return Err(self.fail(e)),
        };

        self.phase = match stop_reason {
            StopReason::Cancelled => EvolutionPhase::Stopped,
            StopReason::EpochTarget => EvolutionPhase::Complete,
        };
        callback(&self.progress());

        let elapsed = start_time.elapsed().as_secs_f64();
        let best = self.best().unwrap_or_else(|| {
            Chromosome::new(vec![StateId::FREE; self.width * self.height]).to_snapshot(
                0,
                self.width,
                self.height,
            )
        });
        info!(
            "Search stopped after {} epochs ({:?}); best fitness {:.3}",
            self.epoch, stop_reason, best.stats.fitness
        );

        Ok(EvolutionResult {
            stats: EvolutionStats {
                epochs: self.epoch,
                total_evaluations: self.evaluations,
                best_fitness: best.stats.fitness,
                final_avg_fitness: self.avg_fitness(),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
            best,
            history: self.history.clone(),
        })
    }

    /// Run the search (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }

    /// Run the search on a dedicated thread.
    pub fn spawn<F>(mut self, callback: F) -> EvolutionHandle
    where
        F: Fn(&EvolutionProgress) + Send + 'static,
    {
        let cancel = self.cancel_handle();
        let worker = thread::spawn(move || self.run_with_callback(callback));
        EvolutionHandle { cancel, worker }
    }

    fn fail(&mut self, error: StepError) -> EvolutionError {
        warn!("Search aborted: {}", error);
        self.phase = EvolutionPhase::Stopped;
        EvolutionError::Step(error)
    }
}

/// Handle to a search running on its own thread.
pub struct EvolutionHandle {
    cancel: CancelToken,
    worker: JoinHandle<Result<EvolutionResult, EvolutionError>>,
}

impl EvolutionHandle {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Wait for the search to end.
    pub fn join(self) -> Result<EvolutionResult, EvolutionError> {
        self.worker
            .join()
            .map_err(|_| EvolutionError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FitnessWeights, StateSet, Targets};

    fn config(selection: SelectionMethod) -> EvolutionConfig {
        EvolutionConfig {
            population_size: 10,
            crossover_rate: 1.0,
            mutation_rate: 0.05,
            selection,
            fitness: FitnessWeights {
                generation: 1.0,
                population: 0.1,
                initial_size: 0.0,
            },
            targets: Targets {
                generations: 20,
                population: 0,
                epochs: 3,
            },
            random_seed: Some(42),
            ..Default::default()
        }
    }

    fn life(width: usize, height: usize) -> AutomatonConfig {
        AutomatonConfig {
            width,
            height,
            ..Default::default()
        }
    }

    #[test]
    fn test_engine_creation() {
        let mut engine =
            EvolutionEngine::new(config(SelectionMethod::RouletteWheel), &life(12, 12)).unwrap();
        engine.initialize();
        assert_eq!(engine.population.len(), 10);
        assert!(engine.population.iter().all(|c| c.pattern.len() == 144));
    }

    #[test]
    fn test_degenerate_configs_rejected() {
        let no_states = AutomatonConfig {
            states: StateSet::free_only(),
            rules: String::new(),
            ..life(8, 8)
        };
        assert_eq!(
            EvolutionEngine::new(EvolutionConfig::default(), &no_states).err(),
            Some(EvolutionError::Config(EvolutionConfigError::NoLiveStates))
        );

        let no_rules = AutomatonConfig {
            rules: "! nothing here".to_string(),
            ..life(8, 8)
        };
        assert_eq!(
            EvolutionEngine::new(EvolutionConfig::default(), &no_rules).err(),
            Some(EvolutionError::Config(EvolutionConfigError::NoRules))
        );

        let broken = AutomatonConfig {
            rules: "ALIVE / GHOST ;".to_string(),
            ..life(8, 8)
        };
        assert!(matches!(
            EvolutionEngine::new(EvolutionConfig::default(), &broken),
            Err(EvolutionError::InvalidRules(errors)) if errors.len() == 1
        ));

        let tiny = EvolutionConfig {
            population_size: 1,
            ..Default::default()
        };
        assert!(matches!(
            EvolutionEngine::new(tiny, &life(8, 8)),
            Err(EvolutionError::Config(EvolutionConfigError::PopulationTooSmall))
        ));
    }

    #[test]
    fn test_run_every_selection_method() {
        for method in SelectionMethod::ALL {
            let mut engine = EvolutionEngine::new(config(method), &life(12, 12)).unwrap();
            let result = engine.run().unwrap();

            assert_eq!(result.stats.epochs, 3, "{method}");
            assert_eq!(result.stats.stop_reason, StopReason::EpochTarget);
            assert_eq!(result.stats.total_evaluations, 40);
            assert_eq!(result.history.len(), 4);
            assert!(result.stats.best_fitness >= 1.0);
            assert_eq!(result.best.pattern.len(), 144);
            assert_eq!(engine.population.len(), 10);
        }
    }

    #[test]
    fn test_best_never_decreases() {
        let mut engine =
            EvolutionEngine::new(config(SelectionMethod::Tournament), &life(10, 10)).unwrap();
        let result = engine.run().unwrap();
        let best = &result.history.best_fitness;
        assert!(best.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(best.last().copied(), Some(result.stats.best_fitness));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            EvolutionEngine::new(config(SelectionMethod::Rank), &life(10, 10))
                .unwrap()
                .run()
                .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.best, b.best);
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn test_elites_carried_forward() {
        let mut config = config(SelectionMethod::Elitism);
        config.mutation_rate = 1.0;
        config.elites = 2;
        let mut engine = EvolutionEngine::new(config, &life(12, 12)).unwrap();

        engine.initialize();
        engine.evaluate_population().unwrap();
        let elites: Vec<Vec<StateId>> = elite_indices(&engine.population, 2)
            .into_iter()
            .map(|i| engine.population[i].pattern.clone())
            .collect();

        engine.step_epoch().unwrap();
        assert_eq!(engine.population.len(), 10);
        assert_eq!(engine.population[0].pattern, elites[0]);
        assert_eq!(engine.population[1].pattern, elites[1]);
        // everything else was rewritten by mutation
        assert!(
            engine.population[2..]
                .iter()
                .all(|c| !elites.contains(&c.pattern))
        );
    }

    #[test]
    fn test_cancellation() {
        let mut config = config(SelectionMethod::RouletteWheel);
        config.targets.epochs = 0;
        let mut engine = EvolutionEngine::new(config, &life(12, 12)).unwrap();
        engine.cancel_handle().cancel();

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.epochs, 0);
    }

    #[test]
    fn test_spawned_search_can_be_cancelled() {
        let mut config = config(SelectionMethod::Tournament);
        // unbounded epochs: only cancellation ends the run
        config.targets.epochs = 0;
        let engine = EvolutionEngine::new(config, &life(16, 16)).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let handle = engine.spawn(move |progress| {
            let _ = tx.send(progress.epoch);
        });
        // wait until at least one epoch went through
        while rx.recv().is_ok_and(|epoch| epoch < 1) {}
        handle.cancel();

        let result = handle.join().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert!(result.stats.epochs >= 1);
    }
}
