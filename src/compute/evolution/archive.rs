//! Text export of discovered patterns.
//!
//! ```text
//! [ALGORITHM SETTINGS]
//! free-form summary, ignored on import
//! [STATES]
//! ALIVE;
//! [RULES]
//! FREE / ALIVE : ( ALL @ = 3#ALIVE ) ;
//! [NEIGHBORS]
//! NW N NE W E SW S SE
//! [SIZE]
//! rows cols
//! [CELLS]
//! x y ALIVE;
//! ```
//!
//! Cell coordinates are relative to the grid centre: `x = col - cols / 2`,
//! `y = row - rows / 2`.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::debug;

use crate::compiler::{self, Compilation};
use crate::compute::{Grid, Position};
use crate::schema::{
    AutomatonConfig, ChromosomeSnapshot, CompilerLimits, Direction, EvolutionConfig,
    EvolutionResult, Neighborhood, RuleTable, StateError, StateId, StateSet,
};

const SETTINGS: &str = "[ALGORITHM SETTINGS]";
const STATES: &str = "[STATES]";
const RULES: &str = "[RULES]";
const NEIGHBORS: &str = "[NEIGHBORS]";
const SIZE: &str = "[SIZE]";
const CELLS: &str = "[CELLS]";

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Missing section {0}")]
    MissingSection(&'static str),
    #[error("Line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("Line {line}: unknown state '{name}'")]
    UnknownState { line: usize, name: String },
    #[error("Line {line}: cell ({x}, {y}) lies outside the {cols}x{rows} grid")]
    OutOfBounds {
        line: usize,
        x: i64,
        y: i64,
        cols: usize,
        rows: usize,
    },
    #[error(transparent)]
    State(#[from] StateError),
}

/// A complete automaton together with one initial pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternExport {
    /// Human-readable run summary.
    pub settings: String,
    pub states: StateSet,
    /// Rule text, one rule per line.
    pub rules: String,
    pub neighborhood: Neighborhood,
    pub grid: Grid,
}

impl PatternExport {
    pub fn new(states: StateSet, rules: &RuleTable, neighborhood: Neighborhood, grid: Grid) -> Self {
        Self {
            settings: String::new(),
            states,
            rules: rules.to_string(),
            neighborhood,
            grid,
        }
    }

    /// Export the best chromosome of a search run.
    pub fn from_snapshot(
        states: StateSet,
        rules: &RuleTable,
        neighborhood: Neighborhood,
        snapshot: &ChromosomeSnapshot,
    ) -> Self {
        let grid = Grid::from_pattern(snapshot.width, snapshot.height, &snapshot.pattern);
        Self::new(states, rules, neighborhood, grid)
    }

    pub fn with_settings(mut self, settings: impl Into<String>) -> Self {
        self.settings = settings.into();
        self
    }

    /// Automaton configuration reproducing the exported automaton.
    pub fn to_config(&self) -> AutomatonConfig {
        AutomatonConfig {
            states: self.states.clone(),
            neighborhood: self.neighborhood,
            width: self.grid.width(),
            height: self.grid.height(),
            rules: self.rules.clone(),
            limits: CompilerLimits::default(),
        }
    }

    /// Compile the exported rule text.
    pub fn compile(&self) -> Compilation {
        compiler::compile(&self.to_config())
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let sections = Sections::split(text);

        let settings = sections
            .get(SETTINGS)
            .map(|lines| {
                lines
                    .iter()
                    .map(|(_, l)| *l)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        let names: Vec<&str> = sections
            .require(STATES)?
            .iter()
            .map(|(_, l)| l.trim().trim_end_matches(';').trim())
            .filter(|l| !l.is_empty())
            .collect();
        let states = StateSet::new(names)?;

        let mut rules = String::new();
        for (_, line) in sections.require(RULES)? {
            if !line.trim().is_empty() {
                rules.push_str(line);
                rules.push('\n');
            }
        }

        let mut neighborhood = Neighborhood::empty();
        for &(line, text) in sections.require(NEIGHBORS)? {
            for word in text.split_whitespace() {
                let direction: Direction = word.parse().map_err(|_| PatternError::Malformed {
                    line,
                    message: format!("unknown direction '{word}'"),
                })?;
                neighborhood.insert(direction);
            }
        }

        let (rows, cols) = parse_size(sections.require(SIZE)?)?;
        let mut grid = Grid::new(cols, rows);
        let (cx, cy) = ((cols / 2) as i64, (rows / 2) as i64);

        for &(line, text) in sections.require(CELLS)? {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let malformed = || PatternError::Malformed {
                line,
                message: format!("expected 'x y STATE;', found '{text}'"),
            };
            let body = text.strip_suffix(';').ok_or_else(malformed)?;
            let mut fields = body.split_whitespace();
            let (Some(x), Some(y), Some(name), None) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(malformed());
            };
            let x: i64 = x.parse().map_err(|_| malformed())?;
            let y: i64 = y.parse().map_err(|_| malformed())?;

            let state = states
                .id(name)
                .filter(|s| !s.is_free())
                .ok_or_else(|| PatternError::UnknownState {
                    line,
                    name: name.to_string(),
                })?;
            grid.set(Position::new(x + cx, y + cy), state)
                .map_err(|_| PatternError::OutOfBounds {
                    line,
                    x,
                    y,
                    cols,
                    rows,
                })?;
        }

        debug!(
            "Parsed pattern export: {} states, {}x{} grid, {} cells",
            states.user_count(),
            cols,
            rows,
            grid.live_count()
        );

        Ok(Self {
            settings,
            states,
            rules,
            neighborhood,
            grid,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PatternError> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PatternError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Dense pattern of the exported grid.
    pub fn pattern(&self) -> Vec<StateId> {
        self.grid.to_pattern()
    }
}

impl fmt::Display for PatternExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.grid.height();
        let cols = self.grid.width();

        writeln!(f, "{SETTINGS}")?;
        // keep markers inside the summary from opening a section
        for line in self.settings.lines().filter(|l| marker(l).is_none()) {
            writeln!(f, "{line}")?;
        }

        writeln!(f, "{STATES}")?;
        for (_, name) in self.states.live() {
            writeln!(f, "{name};")?;
        }

        writeln!(f, "{RULES}")?;
        for line in self.rules.lines().filter(|l| !l.trim().is_empty()) {
            writeln!(f, "{line}")?;
        }

        writeln!(f, "{NEIGHBORS}")?;
        writeln!(f, "{}", self.neighborhood)?;

        writeln!(f, "{SIZE}")?;
        writeln!(f, "{rows} {cols}")?;

        writeln!(f, "{CELLS}")?;
        let (cx, cy) = ((cols / 2) as i64, (rows / 2) as i64);
        for (position, state) in self.grid.iter() {
            let name = self.states.name(state).unwrap_or_default();
            writeln!(f, "{} {} {};", position.x - cx, position.y - cy, name)?;
        }
        Ok(())
    }
}

/// Human-readable summary of a run for the settings section.
pub fn settings_summary(config: &EvolutionConfig, result: &EvolutionResult) -> String {
    let best = &result.best.stats;
    format!(
        "Elapsed: {:.1} s\nEpoch: {}\n\n\
         Reached generation: {}\nReached avg. population: {}\nInitial size: {}\nFitness: {:.6}\n\n\
         Selection Method: {}\nPopulation Size: {}\nProbability of Mutation: {:.6}\nProbability of Crossover: {:.6}\n\n\
         Generation Multiplier: {:.6}\nPopulation Multiplier: {:.6}\nInitial Size Multiplier: {:.6}\n\n\
         Epochs Target: {}\nGeneration Target: {}\nPopulation Target: {}",
        result.stats.elapsed_seconds,
        result.stats.epochs,
        best.generations,
        best.average_population,
        best.initial_size,
        best.fitness,
        config.selection,
        config.population_size,
        config.mutation_rate,
        config.crossover_rate,
        config.fitness.generation,
        config.fitness.population,
        config.fitness.initial_size,
        config.targets.epochs,
        config.targets.generations,
        config.targets.population,
    )
}

/// Canonical marker for a line that opens a section.
fn marker(line: &str) -> Option<&'static str> {
    let line = line.trim();
    [SETTINGS, STATES, RULES, NEIGHBORS, SIZE, CELLS]
        .into_iter()
        .find(|m| m.eq_ignore_ascii_case(line))
}

/// Section bodies keyed by marker, each line with its 1-based number.
struct Sections<'a> {
    sections: Vec<(&'static str, Vec<(usize, &'a str)>)>,
}

impl<'a> Sections<'a> {
    fn split(text: &'a str) -> Self {
        let mut sections: Vec<(&'static str, Vec<(usize, &'a str)>)> = Vec::new();
        for (i, line) in text.lines().enumerate() {
            match marker(line) {
                Some(m) => sections.push((m, Vec::new())),
                None => {
                    if let Some((_, body)) = sections.last_mut() {
                        body.push((i + 1, line));
                    }
                }
            }
        }
        Self { sections }
    }

    fn get(&self, marker: &str) -> Option<&[(usize, &'a str)]> {
        self.sections
            .iter()
            .find(|(m, _)| *m == marker)
            .map(|(_, body)| body.as_slice())
    }

    fn require(&self, marker: &'static str) -> Result<&[(usize, &'a str)], PatternError> {
        self.get(marker).ok_or(PatternError::MissingSection(marker))
    }
}

fn parse_size(lines: &[(usize, &str)]) -> Result<(usize, usize), PatternError> {
    let Some(&(line, text)) = lines.iter().find(|(_, l)| !l.trim().is_empty()) else {
        return Err(PatternError::MissingSection(SIZE));
    };
    let malformed = || PatternError::Malformed {
        line,
        message: format!("expected 'rows cols', found '{}'", text.trim()),
    };
    let numbers: Vec<usize> = text
        .split_whitespace()
        .map(|w| w.parse().map_err(|_| malformed()))
        .collect::<Result<_, _>>()?;
    match numbers[..] {
        [rows, cols] if rows > 0 && cols > 0 => Ok((rows, cols)),
        _ => Err(malformed()),
    }
}
