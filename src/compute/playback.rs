//! Interactive playback on a worker thread.
//!
//! The grid lives behind a mutex shared with the display side. The worker
//! locks it once per generation, steps it, and hands the generation's changes
//! back through a channel so the reader can redraw incrementally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use super::automaton::{Automaton, StepError, StepOutcome};
use super::cancel::CancelToken;
use super::grid::{CellChange, Grid};
use crate::schema::PlaybackDelay;

/// Message sent by the playback worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A generation was applied.
    Generation {
        generation: u64,
        changes: Vec<CellChange>,
    },
    /// The last generation produced no changes.
    Finished { generation: u64 },
    /// A step failed; playback halted.
    Failed(StepError),
    /// Stopped by request or after the requested number of generations.
    Stopped { generation: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Playback is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Step(#[from] StepError),
}

/// Owns a grid and steps it with an [`Automaton`].
pub struct Playback {
    automaton: Arc<Automaton>,
    grid: Arc<Mutex<Grid>>,
    generation: Arc<AtomicU64>,
    delay: Option<PlaybackDelay>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl Playback {
    pub fn new(automaton: Automaton, grid: Grid) -> Self {
        Self {
            automaton: Arc::new(automaton),
            grid: Arc::new(Mutex::new(grid)),
            generation: Arc::new(AtomicU64::new(0)),
            delay: Some(PlaybackDelay::default()),
            cancel: CancelToken::new(),
            worker: None,
        }
    }

    /// Pause between continuous generations; `None` runs flat out.
    pub fn with_delay(mut self, delay: Option<PlaybackDelay>) -> Self {
        self.delay = delay;
        self
    }

    /// Takes effect the next time [`Playback::play`] is called.
    pub fn set_delay(&mut self, delay: Option<PlaybackDelay>) {
        self.delay = delay;
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// Shared handle to the grid for readers on other threads.
    pub fn grid(&self) -> Arc<Mutex<Grid>> {
        Arc::clone(&self.grid)
    }

    /// Copy of the current grid.
    pub fn snapshot(&self) -> Grid {
        lock(&self.grid).clone()
    }

    /// Generations applied since construction or the last reset.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Step once on the calling thread.
    pub fn step(&mut self) -> Result<StepOutcome, PlaybackError> {
        self.reap()?;
        let outcome = step_locked(&self.automaton, &self.grid, &self.cancel)?;
        if !outcome.is_finished() {
            self.generation.fetch_add(1, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    /// Start continuous playback on a worker thread, optionally stopping
    /// after `limit` generations.
    pub fn play(&mut self, limit: Option<u64>) -> Result<Receiver<PlaybackEvent>, PlaybackError> {
        self.reap()?;
        self.cancel.reset();

        let (tx, rx) = mpsc::channel();
        let automaton = Arc::clone(&self.automaton);
        let grid = Arc::clone(&self.grid);
        let generation = Arc::clone(&self.generation);
        let cancel = self.cancel.clone();
        let delay = self.delay;

        info!("Playback started (delay {:?}, limit {:?})", delay.map(|d| d.millis()), limit);

        self.worker = Some(thread::spawn(move || {
            let mut played = 0u64;
            loop {
                if cancel.is_cancelled() || limit.is_some_and(|l| played >= l) {
                    let _ = tx.send(PlaybackEvent::Stopped {
                        generation: generation.load(Ordering::Relaxed),
                    });
                    break;
                }

                let event = match step_locked(&automaton, &grid, &cancel) {
                    Ok(StepOutcome::Changed(changes)) => {
                        played += 1;
                        let current = generation.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!("Generation {}: {} changes", current, changes.len());
                        PlaybackEvent::Generation {
                            generation: current,
                            changes,
                        }
                    }
                    Ok(StepOutcome::Finished) => {
                        let _ = tx.send(PlaybackEvent::Finished {
                            generation: generation.load(Ordering::Relaxed),
                        });
                        break;
                    }
                    Err(StepError::Cancelled) => continue,
                    Err(e) => {
                        warn!("Playback halted: {}", e);
                        let _ = tx.send(PlaybackEvent::Failed(e));
                        break;
                    }
                };

                // receiver gone: nobody is watching any more
                if tx.send(event).is_err() {
                    break;
                }

                if let Some(delay) = delay {
                    thread::sleep(delay.duration());
                }
            }
        }));

        Ok(rx)
    }

    /// Request the worker to stop and wait for it. Single steps work again
    /// afterwards.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.join();
        self.cancel.reset();
    }

    /// Wait for the worker to finish on its own.
    pub fn join(&mut self) {
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("Playback worker panicked");
        }
    }

    /// Replace the grid and reset the generation counter.
    pub fn reset(&mut self, grid: Grid) -> Result<(), PlaybackError> {
        self.reap()?;
        *lock(&self.grid) = grid;
        self.generation.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Forget a finished worker; refuse while one is still running.
    fn reap(&mut self) -> Result<(), PlaybackError> {
        if self.is_running() {
            return Err(PlaybackError::AlreadyRunning);
        }
        self.join();
        Ok(())
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(grid: &Mutex<Grid>) -> MutexGuard<'_, Grid> {
    grid.lock().unwrap_or_else(|e| e.into_inner())
}

fn step_locked(
    automaton: &Automaton,
    grid: &Mutex<Grid>,
    cancel: &CancelToken,
) -> Result<StepOutcome, StepError> {
    let mut grid = lock(grid);
    automaton.step(&mut grid, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::compute::grid::Position;
    use crate::schema::{Neighborhood, StateId, StateSet};

    const LIFE: &str = "FREE / A : ( ALL @ = 3#A ) ;\nA / FREE : ( ALL @ = -2#A | +3#A ) ;";

    fn playback(cells: &[(i64, i64)]) -> Playback {
        let states = StateSet::new(["A"]).unwrap();
        let rules = Compiler::new(&states, Neighborhood::moore())
            .compile(LIFE)
            .into_result()
            .unwrap();
        let mut grid = Grid::new(8, 8);
        for &(x, y) in cells {
            grid.set(Position::new(x, y), StateId(1)).unwrap();
        }
        Playback::new(Automaton::new(states, Neighborhood::moore(), rules), grid).with_delay(None)
    }

    #[test]
    fn test_single_steps() {
        let mut playback = playback(&[(1, 2), (2, 2), (3, 2)]);
        let outcome = playback.step().unwrap();
        assert_eq!(outcome.changes().len(), 4);
        assert_eq!(playback.generation(), 1);
        assert_eq!(playback.snapshot().get(Position::new(2, 1)), Some(StateId(1)));
    }

    #[test]
    fn test_play_until_finished() {
        // a lone cell dies, then nothing changes
        let mut playback = playback(&[(4, 4)]);
        let events: Vec<PlaybackEvent> = playback.play(None).unwrap().iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], PlaybackEvent::Generation { generation: 1, changes } if changes.len() == 1));
        assert_eq!(events[1], PlaybackEvent::Finished { generation: 1 });
        playback.join();
        assert_eq!(playback.snapshot().live_count(), 0);
    }

    #[test]
    fn test_play_with_limit() {
        let mut playback = playback(&[(1, 2), (2, 2), (3, 2)]);
        let events: Vec<PlaybackEvent> = playback.play(Some(3)).unwrap().iter().collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[3], PlaybackEvent::Stopped { generation: 3 });
        playback.join();
        assert_eq!(playback.generation(), 3);

        playback.reset(Grid::new(8, 8)).unwrap();
        assert_eq!(playback.generation(), 0);
        assert_eq!(playback.step().unwrap(), StepOutcome::Finished);
    }

    #[test]
    fn test_stop_halts_worker() {
        let mut playback = playback(&[(1, 2), (2, 2), (3, 2)])
            .with_delay(Some(PlaybackDelay::Ms100));
        let rx = playback.play(None).unwrap();
        assert!(matches!(rx.recv().unwrap(), PlaybackEvent::Generation { .. }));
        playback.stop();
        assert!(!playback.is_running());
        let last = rx.iter().last();
        assert!(matches!(last, Some(PlaybackEvent::Stopped { .. }) | None));
    }

    #[test]
    fn test_step_after_stop() {
        let mut playback = playback(&[(1, 2), (2, 2), (3, 2)])
            .with_delay(Some(PlaybackDelay::Ms100));
        let rx = playback.play(None).unwrap();
        assert!(matches!(rx.recv().unwrap(), PlaybackEvent::Generation { .. }));
        playback.stop();

        let before = playback.generation();
        let outcome = playback.step().unwrap();
        assert_eq!(outcome.changes().len(), 4);
        assert_eq!(playback.generation(), before + 1);

        playback.reset(Grid::new(8, 8)).unwrap();
        assert_eq!(playback.step().unwrap(), StepOutcome::Finished);
    }

    #[test]
    fn test_step_refused_while_running() {
        let mut playback = playback(&[(1, 2), (2, 2), (3, 2)])
            .with_delay(Some(PlaybackDelay::Ms1000));
        let _rx = playback.play(None).unwrap();
        assert_eq!(playback.step(), Err(PlaybackError::AlreadyRunning));
        playback.stop();
    }
}
