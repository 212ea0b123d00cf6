//! Automaton execution engine.
//!
//! One generation evaluates every rule, in table order, against the grid as
//! it was at the start of the generation. A cell matched by a rule is not
//! considered by later rules. Changes are applied together once all rules
//! have run, so no rule observes another rule's effect within a generation.

use std::collections::{BTreeSet, HashSet};

use log::trace;

use super::cancel::{CancelToken, Cancelled};
use super::grid::{CellChange, Grid, OutOfBounds, Position};
use crate::schema::{
    CountCondition, Direction, Expr, Neighborhood, RuleTable, Scope, StateId, StateSet, Transition,
};

/// Runtime evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("Rule {} (offset {offset}) references undeclared state '{state}'", .rule + 1)]
    UndeclaredState {
        /// Zero-based index in the rule table.
        rule: usize,
        offset: usize,
        state: String,
    },
    #[error("Rule {} (offset {offset}) references direction {direction} outside the neighborhood", .rule + 1)]
    UndeclaredDirection {
        rule: usize,
        offset: usize,
        direction: Direction,
    },
    #[error(transparent)]
    Grid(#[from] OutOfBounds),
    #[error("Step cancelled")]
    Cancelled,
}

impl From<Cancelled> for StepError {
    fn from(_: Cancelled) -> Self {
        StepError::Cancelled
    }
}

/// Result of a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Changes applied to the grid, grouped by rule and row-major within a rule.
    Changed(Vec<CellChange>),
    /// Nothing changed; the grid is left as it was.
    Finished,
}

impl StepOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, StepOutcome::Finished)
    }

    pub fn changes(&self) -> &[CellChange] {
        match self {
            StepOutcome::Changed(changes) => changes,
            StepOutcome::Finished => &[],
        }
    }
}

/// A rule with every name resolved against the active state universe.
struct ResolvedRule {
    source: StateId,
    target: StateId,
    condition: Option<Expr<ResolvedClause>>,
    matches_all: bool,
    /// Distinct states named by count conditions.
    condition_states: Vec<StateId>,
}

struct ResolvedClause {
    /// Directions counted by this clause, already restricted to the
    /// configured neighborhood.
    directions: Neighborhood,
    condition: Expr<CountCondition<StateId>>,
}

/// Rule table bound to a state universe and neighborhood.
#[derive(Debug, Clone)]
pub struct Automaton {
    states: StateSet,
    neighborhood: Neighborhood,
    rules: RuleTable,
    heuristic: bool,
}

impl Automaton {
    pub fn new(states: StateSet, neighborhood: Neighborhood, rules: RuleTable) -> Self {
        Self {
            states,
            neighborhood,
            rules,
            heuristic: true,
        }
    }

    /// Always scan every source cell instead of choosing the cheaper scan.
    /// Results are identical; only the running time differs.
    pub fn with_full_scan(mut self) -> Self {
        self.heuristic = false;
        self
    }

    pub fn states(&self) -> &StateSet {
        &self.states
    }

    pub fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Compute and apply one generation.
    pub fn step(&self, grid: &mut Grid, cancel: &CancelToken) -> Result<StepOutcome, StepError> {
        let changes = self.changes(grid, cancel)?;
        if changes.is_empty() {
            return Ok(StepOutcome::Finished);
        }
        grid.apply(&changes)?;
        Ok(StepOutcome::Changed(changes))
    }

    /// Compute one generation's changes without touching the grid.
    pub fn changes(&self, grid: &Grid, cancel: &CancelToken) -> Result<Vec<CellChange>, StepError> {
        let rules = self.resolve()?;
        let mut visited: HashSet<Position> = HashSet::new();
        let mut changes = Vec::new();

        for (index, rule) in rules.iter().enumerate() {
            cancel.check()?;

            let matched = self.matching_cells(grid, rule, &visited, cancel)?;
            trace!("Rule {} matched {} cells", index + 1, matched.len());

            for position in matched {
                visited.insert(position);
                changes.push(CellChange {
                    from: rule.source,
                    to: rule.target,
                    position,
                });
            }
        }

        Ok(changes)
    }

    fn resolve(&self) -> Result<Vec<ResolvedRule>, StepError> {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| self.resolve_rule(index, rule))
            .collect()
    }

    fn resolve_rule(&self, index: usize, rule: &Transition) -> Result<ResolvedRule, StepError> {
        let lookup = |name: &str| {
            self.states
                .id(name)
                .ok_or_else(|| StepError::UndeclaredState {
                    rule: index,
                    offset: rule.offset,
                    state: name.to_string(),
                })
        };

        let source = lookup(rule.source.as_str())?;
        let target = lookup(rule.target.as_str())?;
        let condition_states = rule
            .condition_states()
            .into_iter()
            .map(lookup)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(direction) = rule
            .directions()
            .iter()
            .find(|&d| !self.neighborhood.contains(d))
        {
            return Err(StepError::UndeclaredDirection {
                rule: index,
                offset: rule.offset,
                direction,
            });
        }

        let condition = match &rule.condition {
            None => None,
            Some(expr) => Some(expr.try_map(&mut |clause| {
                let directions = match &clause.scope {
                    Scope::All => self.neighborhood,
                    scope => scope
                        .named()
                        .iter()
                        .filter(|&d| self.neighborhood.contains(d))
                        .collect(),
                };
                let condition = clause.condition.try_map(&mut |c| {
                    Ok::<_, StepError>(CountCondition {
                        count: c.count,
                        comparator: c.comparator,
                        state: lookup(c.state.as_str())?,
                    })
                })?;
                Ok::<_, StepError>(ResolvedClause {
                    directions,
                    condition,
                })
            })?),
        };

        Ok(ResolvedRule {
            source,
            target,
            condition,
            matches_all: rule.matches_all,
            condition_states,
        })
    }

    /// Unvisited cells of the rule's source state that satisfy its condition,
    /// in row-major order.
    fn matching_cells(
        &self,
        grid: &Grid,
        rule: &ResolvedRule,
        visited: &HashSet<Position>,
        cancel: &CancelToken,
    ) -> Result<Vec<Position>, StepError> {
        let Some(condition) = &rule.condition else {
            return Ok(self
                .source_cells(grid, rule.source)
                .filter(|p| !visited.contains(p))
                .collect());
        };

        let mut matched = Vec::new();

        if self.full_scan(grid, rule) {
            for position in self.source_cells(grid, rule.source) {
                cancel.check()?;
                if !visited.contains(&position) && self.applies(grid, position, condition) {
                    matched.push(position);
                }
            }
            return Ok(matched);
        }

        // Every leaf needs at least one neighbor in a condition state, so
        // only cells around such neighbors can match.
        let mut candidates = BTreeSet::new();
        for &state in &rule.condition_states {
            for neighbor in grid.positions(state) {
                for direction in self.neighborhood.iter() {
                    let (dx, dy) = direction.offset();
                    let position = Position::new(neighbor.x - dx, neighbor.y - dy);
                    if grid.get(position) == Some(rule.source) && !visited.contains(&position) {
                        candidates.insert(position);
                    }
                }
            }
        }

        for position in candidates {
            cancel.check()?;
            if self.applies(grid, position, condition) {
                matched.push(position);
            }
        }

        Ok(matched)
    }

    /// Cost heuristic choosing between scanning every source cell and only
    /// the cells around condition-state cells.
    fn full_scan(&self, grid: &Grid, rule: &ResolvedRule) -> bool {
        if !self.heuristic || rule.matches_all {
            return true;
        }
        if rule.condition_states.iter().any(|s| s.is_free()) {
            return true;
        }
        let sources = grid.count(rule.source);
        let around: usize = rule.condition_states.iter().map(|&s| grid.count(s)).sum();
        sources <= around
    }

    fn source_cells<'g>(
        &self,
        grid: &'g Grid,
        source: StateId,
    ) -> Box<dyn Iterator<Item = Position> + 'g> {
        if source.is_free() {
            Box::new(grid.free_positions())
        } else {
            Box::new(grid.positions(source))
        }
    }

    /// Evaluate a rule condition against the neighborhood view of `position`.
    fn applies(&self, grid: &Grid, position: Position, condition: &Expr<ResolvedClause>) -> bool {
        // Out-of-bounds and unconfigured directions are absent from the view.
        let view: [Option<StateId>; 9] = Direction::ALL.map(|d| {
            if self.neighborhood.contains(d) {
                grid.get(position.step(d))
            } else {
                None
            }
        });

        condition.evaluate(&mut |clause: &ResolvedClause| {
            clause.condition.evaluate(&mut |c: &CountCondition<StateId>| {
                let occurrences = clause
                    .directions
                    .iter()
                    .filter(|&d| view[d as usize] == Some(c.state))
                    .count();
                c.test(occurrences as u32)
            })
        })
    }
}
