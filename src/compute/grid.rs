//! Sparse grid state.
//!
//! Only non-`FREE` cells are stored. A reverse index maps every live state to
//! the positions holding it; both maps are updated together so that
//! `position ∈ by_state[s]` holds exactly when `cells[position] == s`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::schema::{Direction, StateId, StateSet};

/// Cell coordinates; `x` is the column, `y` the row (growing south).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    #[inline]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The neighbor in `direction`.
    #[inline]
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Row-major order.
impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One cell transition produced by a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellChange {
    pub from: StateId,
    pub to: StateId,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Position ({}, {}) is outside the {width}x{height} grid", .position.x, .position.y)]
pub struct OutOfBounds {
    pub position: Position,
    pub width: usize,
    pub height: usize,
}

/// Bounded sparse grid with a state → positions reverse index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: BTreeMap<Position, StateId>,
    by_state: BTreeMap<StateId, BTreeSet<Position>>,
}

impl Grid {
    /// An all-`FREE` grid of `width` columns and `height` rows.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: BTreeMap::new(),
            by_state: BTreeMap::new(),
        }
    }

    /// Build from a dense row-major pattern.
    pub fn from_pattern(width: usize, height: usize, pattern: &[StateId]) -> Self {
        let mut grid = Self::new(width, height);
        for (i, &state) in pattern.iter().enumerate().take(width * height) {
            if !state.is_free() {
                grid.insert((i % width) as i64, (i / width) as i64, state);
            }
        }
        grid
    }

    /// Dense row-major pattern, `FREE` where no cell is stored.
    pub fn to_pattern(&self) -> Vec<StateId> {
        let mut pattern = vec![StateId::FREE; self.area()];
        for (position, &state) in &self.cells {
            pattern[self.index(*position)] = state;
        }
        pattern
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as u64) < self.width as u64
            && (position.y as u64) < self.height as u64
    }

    #[inline]
    fn index(&self, position: Position) -> usize {
        position.y as usize * self.width + position.x as usize
    }

    /// State at `position`, or `None` outside the grid.
    #[inline]
    pub fn get(&self, position: Position) -> Option<StateId> {
        if !self.in_bounds(position) {
            return None;
        }
        Some(self.cells.get(&position).copied().unwrap_or(StateId::FREE))
    }

    /// Set a cell, returning its previous state.
    pub fn set(&mut self, position: Position, state: StateId) -> Result<StateId, OutOfBounds> {
        if !self.in_bounds(position) {
            return Err(OutOfBounds {
                position,
                width: self.width,
                height: self.height,
            });
        }

        let previous = match self.cells.remove(&position) {
            Some(old) => {
                if let Some(positions) = self.by_state.get_mut(&old) {
                    positions.remove(&position);
                    if positions.is_empty() {
                        self.by_state.remove(&old);
                    }
                }
                old
            }
            None => StateId::FREE,
        };

        if !state.is_free() {
            self.cells.insert(position, state);
            self.by_state.entry(state).or_default().insert(position);
        }

        Ok(previous)
    }

    fn insert(&mut self, x: i64, y: i64, state: StateId) {
        let position = Position::new(x, y);
        self.cells.insert(position, state);
        self.by_state.entry(state).or_default().insert(position);
    }

    /// Apply a generation's changes. Nothing is modified if any change falls
    /// outside the grid.
    pub fn apply(&mut self, changes: &[CellChange]) -> Result<(), OutOfBounds> {
        if let Some(change) = changes.iter().find(|c| !self.in_bounds(c.position)) {
            return Err(OutOfBounds {
                position: change.position,
                width: self.width,
                height: self.height,
            });
        }
        for change in changes {
            self.set(change.position, change.to)?;
        }
        Ok(())
    }

    /// Reset every cell to `FREE`.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.by_state.clear();
    }

    /// Number of non-`FREE` cells.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of cells holding `state`, `FREE` included.
    pub fn count(&self, state: StateId) -> usize {
        if state.is_free() {
            self.area() - self.live_count()
        } else {
            self.by_state.get(&state).map_or(0, BTreeSet::len)
        }
    }

    /// Positions holding a live `state`, in row-major order.
    pub fn positions(&self, state: StateId) -> impl Iterator<Item = Position> + '_ {
        self.by_state.get(&state).into_iter().flatten().copied()
    }

    /// `FREE` positions in row-major order.
    pub fn free_positions(&self) -> impl Iterator<Item = Position> + '_ {
        let width = self.width as i64;
        (0..self.area() as i64)
            .map(move |i| Position::new(i % width, i / width))
            .filter(|p| !self.cells.contains_key(p))
    }

    /// Live cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, StateId)> + '_ {
        self.cells.iter().map(|(&p, &s)| (p, s))
    }

    /// Randomly fill the grid: every cell independently, with `probability`,
    /// receives a uniformly chosen non-`FREE` state. Other cells are cleared.
    pub fn populate<R: Rng + ?Sized>(&mut self, states: &StateSet, probability: f64, rng: &mut R) {
        self.clear();
        let live = states.user_count();
        if live == 0 {
            return;
        }
        for y in 0..self.height as i64 {
            for x in 0..self.width as i64 {
                if rng.r#gen::<f64>() < probability {
                    let state = StateId(rng.gen_range(1..=live) as u16);
                    self.insert(x, y, state);
                }
            }
        }
    }

    /// Whether the forward map and the reverse index agree.
    pub fn is_consistent(&self) -> bool {
        let indexed: usize = self.by_state.values().map(BTreeSet::len).sum();
        indexed == self.cells.len()
            && self.by_state.iter().all(|(state, positions)| {
                !state.is_free()
                    && !positions.is_empty()
                    && positions
                        .iter()
                        .all(|p| self.cells.get(p) == Some(state) && self.in_bounds(*p))
            })
    }
}
