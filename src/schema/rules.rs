//! Compiled transition rules.
//!
//! A rule table is an ordered list of [`Transition`]s. Each transition maps a
//! source state to a target state under an optional condition shaped as
//! OR-of-AND of neighborhood clauses, where every clause holds its own
//! OR-of-AND of numeric count conditions. Both levels share the [`Expr`] tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Direction, Neighborhood};

/// Boolean expression tree over leaves of type `T`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr<T> {
    Leaf(T),
    And(Vec<Expr<T>>),
    Or(Vec<Expr<T>>),
}

impl<T> Expr<T> {
    /// Build an OR-of-AND tree from groups of leaves, collapsing singletons.
    ///
    /// Returns `None` when there are no leaves at all.
    pub fn from_groups(groups: Vec<Vec<T>>) -> Option<Self> {
        let mut alternatives: Vec<Expr<T>> = groups
            .into_iter()
            .filter(|g| !g.is_empty())
            .map(|group| {
                let mut terms: Vec<Expr<T>> = group.into_iter().map(Expr::Leaf).collect();
                if terms.len() == 1 {
                    terms.remove(0)
                } else {
                    Expr::And(terms)
                }
            })
            .collect();

        match alternatives.len() {
            0 => None,
            1 => Some(alternatives.remove(0)),
            _ => Some(Expr::Or(alternatives)),
        }
    }

    /// Evaluate with `test` deciding each leaf.
    ///
    /// `And` stops at the first false term, `Or` at the first true one.
    pub fn evaluate<F>(&self, test: &mut F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        match self {
            Expr::Leaf(leaf) => test(leaf),
            Expr::And(terms) => terms.iter().all(|t| t.evaluate(test)),
            Expr::Or(terms) => terms.iter().any(|t| t.evaluate(test)),
        }
    }

    /// Visit every leaf in source order.
    pub fn for_each_leaf<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a T),
    {
        match self {
            Expr::Leaf(leaf) => visit(leaf),
            Expr::And(terms) | Expr::Or(terms) => {
                for term in terms {
                    term.for_each_leaf(visit);
                }
            }
        }
    }

    /// Map every leaf, failing on the first error.
    pub fn try_map<U, E, F>(&self, map: &mut F) -> Result<Expr<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        Ok(match self {
            Expr::Leaf(leaf) => Expr::Leaf(map(leaf)?),
            Expr::And(terms) => Expr::And(
                terms
                    .iter()
                    .map(|t| t.try_map(map))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Or(terms) => Expr::Or(
                terms
                    .iter()
                    .map(|t| t.try_map(map))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl<T: fmt::Display> fmt::Display for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (terms, separator) = match self {
            Expr::Leaf(leaf) => return leaf.fmt(f),
            Expr::And(terms) => (terms, " & "),
            Expr::Or(terms) => (terms, " | "),
        };
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                f.write_str(separator)?;
            }
            term.fmt(f)?;
        }
        Ok(())
    }
}

/// Comparison applied to a neighbor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// Exactly `count` (no sign).
    Equal,
    /// Fewer than `count` (`-` sign).
    Less,
    /// More than `count` (`+` sign).
    More,
}

impl Comparator {
    #[inline]
    pub fn test(self, occurrences: u32, count: u32) -> bool {
        match self {
            Comparator::Equal => occurrences == count,
            Comparator::Less => occurrences < count,
            Comparator::More => occurrences > count,
        }
    }

    pub fn sign(self) -> &'static str {
        match self {
            Comparator::Equal => "",
            Comparator::Less => "-",
            Comparator::More => "+",
        }
    }
}

/// `[sign]count#STATE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountCondition<S = String> {
    pub count: u32,
    pub comparator: Comparator,
    pub state: S,
}

impl<S> CountCondition<S> {
    #[inline]
    pub fn test(&self, occurrences: u32) -> bool {
        self.comparator.test(occurrences, self.count)
    }

    /// True when the condition can hold with zero matching neighbors.
    pub fn holds_when_absent(&self) -> bool {
        match self.comparator {
            Comparator::Less => true,
            Comparator::Equal => self.count == 0,
            Comparator::More => false,
        }
    }
}

impl<S: fmt::Display> fmt::Display for CountCondition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}#{}", self.comparator.sign(), self.count, self.state)
    }
}

/// Which neighbors a clause counts over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Every direction of the configured neighborhood.
    All,
    /// The listed directions, in source order.
    Directions(Vec<Direction>),
}

impl Scope {
    /// Directions named explicitly by this scope.
    pub fn named(&self) -> Neighborhood {
        match self {
            Scope::All => Neighborhood::empty(),
            Scope::Directions(dirs) => dirs.iter().copied().collect(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("ALL"),
            Scope::Directions(dirs) if dirs.len() == 1 => dirs[0].fmt(f),
            Scope::Directions(dirs) => {
                let names: Vec<&str> = dirs.iter().map(|d| d.name()).collect();
                write!(f, "[{}]", names.join(","))
            }
        }
    }
}

/// `( scope @ = conditions )`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodClause<S = String> {
    pub scope: Scope,
    pub condition: Expr<CountCondition<S>>,
}

impl<S: fmt::Display> fmt::Display for NeighborhoodClause<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "( {} @ = {} )", self.scope, self.condition)
    }
}

/// One compiled rule: `SOURCE / TARGET [: condition] ;`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub source: String,
    pub target: String,
    /// `None` for unconditional rules.
    pub condition: Option<Expr<NeighborhoodClause>>,
    /// Cost hint: evaluating this rule may have to visit every source cell.
    pub matches_all: bool,
    /// Character offset of the rule's first token in the compiled text.
    pub offset: usize,
}

impl Transition {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        condition: Option<Expr<NeighborhoodClause>>,
        offset: usize,
    ) -> Self {
        let matches_all = match &condition {
            None => true,
            Some(expr) => {
                let mut any = false;
                expr.for_each_leaf(&mut |clause: &NeighborhoodClause| {
                    clause
                        .condition
                        .for_each_leaf(&mut |c: &CountCondition| any |= c.holds_when_absent());
                });
                any
            }
        };

        Self {
            source: source.into(),
            target: target.into(),
            condition,
            matches_all,
            offset,
        }
    }

    /// Distinct condition states, in order of first appearance.
    pub fn condition_states(&self) -> Vec<&str> {
        let mut states: Vec<&str> = Vec::new();
        if let Some(expr) = &self.condition {
            expr.for_each_leaf(&mut |clause: &NeighborhoodClause| {
                clause.condition.for_each_leaf(&mut |c: &CountCondition| {
                    if !states.contains(&c.state.as_str()) {
                        states.push(c.state.as_str());
                    }
                });
            });
        }
        states
    }

    /// Every direction named explicitly by the rule's clauses.
    pub fn directions(&self) -> Neighborhood {
        let mut directions = Neighborhood::empty();
        if let Some(expr) = &self.condition {
            expr.for_each_leaf(&mut |clause: &NeighborhoodClause| {
                for d in clause.scope.named().iter() {
                    directions.insert(d);
                }
            });
        }
        directions
    }

    /// Identity used for duplicate detection: at most one rule per
    /// source and target pair, whatever its condition.
    pub fn signature(&self) -> (String, String) {
        (self.source.clone(), self.target.clone())
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            None => write!(f, "{} / {} ;", self.source, self.target),
            Some(expr) => write!(f, "{} / {} : {} ;", self.source, self.target, expr),
        }
    }
}

/// Ordered, immutable transition table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    transitions: Vec<Transition>,
}

impl RuleTable {
    pub fn new(transitions: Vec<Transition>) -> Self {
        Self { transitions }
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transition> {
        self.transitions.iter()
    }
}

impl<'a> IntoIterator for &'a RuleTable {
    type Item = &'a Transition;
    type IntoIter = std::slice::Iter<'a, Transition>;

    fn into_iter(self) -> Self::IntoIter {
        self.transitions.iter()
    }
}

impl fmt::Display for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for transition in &self.transitions {
            writeln!(f, "{transition}")?;
        }
        Ok(())
    }
}
