//! Configuration types for an automaton: state universe, neighborhood, grid
//! extent, rule text and compiler limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Neighborhood, STATE_CHARS_MAX, STATE_CHARS_MIN, StateError, StateSet};

/// Conway's Life written in the rule language.
pub const LIFE_RULES: &str = "\
! birth
FREE / ALIVE : ( ALL @ = 3#ALIVE ) ;
! death by isolation or overcrowding
ALIVE / FREE : ( ALL @ = -2#ALIVE | +3#ALIVE ) ;
";

/// Top-level automaton configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomatonConfig {
    /// User states in declaration order (`FREE` is implicit).
    pub states: StateSet,
    /// Directions consulted when building a cell's neighborhood view.
    #[serde(default = "default_neighborhood")]
    pub neighborhood: Neighborhood,
    /// Grid columns.
    pub width: usize,
    /// Grid rows.
    pub height: usize,
    /// Rule source text.
    #[serde(default)]
    pub rules: String,
    /// Compiler bounds.
    #[serde(default)]
    pub limits: CompilerLimits,
}

fn default_neighborhood() -> Neighborhood {
    Neighborhood::moore()
}

impl Default for AutomatonConfig {
    fn default() -> Self {
        Self {
            // "ALIVE" is a valid name, so this cannot fail.
            states: StateSet::new(["ALIVE"]).unwrap_or_default(),
            neighborhood: default_neighborhood(),
            width: 64,
            height: 64,
            rules: LIFE_RULES.to_string(),
            limits: CompilerLimits::default(),
        }
    }
}

impl AutomatonConfig {
    /// Number of cells in the grid.
    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        let area = self
            .width
            .checked_mul(self.height)
            .ok_or(ConfigError::InvalidDimensions)?;
        if i64::try_from(area).is_err() {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.neighborhood.is_empty() {
            return Err(ConfigError::EmptyNeighborhood);
        }
        self.limits.validate()?;
        for (_, name) in self.states.live() {
            let len = name.chars().count();
            if len < self.limits.state_chars_min || len > self.limits.state_chars_max {
                return Err(ConfigError::State(StateError::InvalidLength {
                    name: name.to_string(),
                    min: self.limits.state_chars_min,
                    max: self.limits.state_chars_max,
                }));
            }
        }
        Ok(())
    }
}

/// Bounds enforced by the rule compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerLimits {
    #[serde(default = "default_state_chars_min")]
    pub state_chars_min: usize,
    #[serde(default = "default_state_chars_max")]
    pub state_chars_max: usize,
    /// Maximum length of the rule text, in characters.
    #[serde(default = "default_rule_chars_max")]
    pub rule_chars_max: usize,
    /// Maximum number of rules; exceeding it replaces all diagnostics.
    #[serde(default = "default_rules_max")]
    pub rules_max: usize,
}

fn default_state_chars_min() -> usize {
    STATE_CHARS_MIN
}
fn default_state_chars_max() -> usize {
    STATE_CHARS_MAX
}
fn default_rule_chars_max() -> usize {
    1024
}
fn default_rules_max() -> usize {
    1024
}

impl Default for CompilerLimits {
    fn default() -> Self {
        Self {
            state_chars_min: default_state_chars_min(),
            state_chars_max: default_state_chars_max(),
            rule_chars_max: default_rule_chars_max(),
            rules_max: default_rules_max(),
        }
    }
}

impl CompilerLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_chars_min == 0 || self.state_chars_min > self.state_chars_max {
            return Err(ConfigError::InvalidLimits(format!(
                "state name length bounds {}..={} are empty",
                self.state_chars_min, self.state_chars_max
            )));
        }
        if self.rules_max == 0 {
            return Err(ConfigError::InvalidLimits(
                "rule count limit must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pause inserted between generations during continuous playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum PlaybackDelay {
    Ms100,
    #[default]
    Ms250,
    Ms500,
    Ms1000,
    Ms2000,
}

impl PlaybackDelay {
    pub const ALL: [PlaybackDelay; 5] = [
        PlaybackDelay::Ms100,
        PlaybackDelay::Ms250,
        PlaybackDelay::Ms500,
        PlaybackDelay::Ms1000,
        PlaybackDelay::Ms2000,
    ];

    pub fn millis(self) -> u64 {
        match self {
            PlaybackDelay::Ms100 => 100,
            PlaybackDelay::Ms250 => 250,
            PlaybackDelay::Ms500 => 500,
            PlaybackDelay::Ms1000 => 1000,
            PlaybackDelay::Ms2000 => 2000,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_millis(self.millis())
    }
}

impl TryFrom<u64> for PlaybackDelay {
    type Error = ConfigError;

    fn try_from(millis: u64) -> Result<Self, Self::Error> {
        PlaybackDelay::ALL
            .into_iter()
            .find(|d| d.millis() == millis)
            .ok_or(ConfigError::InvalidDelay(millis))
    }
}

impl From<PlaybackDelay> for u64 {
    fn from(delay: PlaybackDelay) -> Self {
        delay.millis()
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (width, height) must be non-zero and addressable")]
    InvalidDimensions,
    #[error("Neighborhood must contain at least one direction")]
    EmptyNeighborhood,
    #[error("Invalid compiler limits: {0}")]
    InvalidLimits(String),
    #[error("Playback delay must be one of 100, 250, 500, 1000 or 2000 ms (got {0})")]
    InvalidDelay(u64),
    #[error(transparent)]
    State(#[from] StateError),
}
