//! State universe for an automaton.
//!
//! States are interned names. `FREE` always exists at index 0 and denotes an
//! empty cell; user states follow in declaration order, and that order stays
//! fixed for the lifetime of a [`StateSet`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the distinguished empty state.
pub const FREE: &str = "FREE";

/// Maximum number of states, `FREE` included.
pub const STATES_MAX: usize = 256;

/// Minimum length of a state name.
pub const STATE_CHARS_MIN: usize = 1;

/// Maximum length of a state name.
pub const STATE_CHARS_MAX: usize = 32;

/// Index of a state inside its [`StateSet`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StateId(pub u16);

impl StateId {
    /// The empty state.
    pub const FREE: StateId = StateId(0);

    #[inline]
    pub fn is_free(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered, interned set of state names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StateSet {
    /// `names[0]` is always `FREE`.
    names: Vec<String>,
    index: HashMap<String, StateId>,
}

impl StateSet {
    /// Build a state universe from user state names (without `FREE`).
    ///
    /// Names are upper-cased. Validation mirrors the state editor: bounded
    /// length, `[A-Z0-9_]` only, no duplicates and no redeclared `FREE`.
    pub fn new<I, S>(names: I) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::free_only();

        for name in names {
            let name = normalize_state_name(name.as_ref())?;
            if name == FREE {
                return Err(StateError::ReservedName);
            }
            if set.index.contains_key(&name) {
                return Err(StateError::Duplicate(name));
            }
            if set.names.len() >= STATES_MAX {
                return Err(StateError::TooMany { max: STATES_MAX - 1 });
            }

            let id = StateId(set.names.len() as u16);
            set.index.insert(name.clone(), id);
            set.names.push(name);
        }

        Ok(set)
    }

    /// A universe holding only `FREE`.
    pub fn free_only() -> Self {
        let mut index = HashMap::new();
        index.insert(FREE.to_string(), StateId::FREE);
        Self {
            names: vec![FREE.to_string()],
            index,
        }
    }

    /// Number of states, `FREE` included.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: `FREE` is always present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of user-declared states.
    #[inline]
    pub fn user_count(&self) -> usize {
        self.names.len() - 1
    }

    /// Look up a state by name (case-insensitive).
    pub fn id(&self, name: &str) -> Option<StateId> {
        self.index
            .get(name)
            .or_else(|| self.index.get(&name.to_ascii_uppercase()))
            .copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.id(name).is_some()
    }

    pub fn name(&self, id: StateId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// All states in index order, `FREE` first.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (StateId(i as u16), name.as_str()))
    }

    /// User states only, in index order.
    pub fn live(&self) -> impl Iterator<Item = (StateId, &str)> {
        self.iter().skip(1)
    }
}

impl Default for StateSet {
    fn default() -> Self {
        Self::free_only()
    }
}

impl TryFrom<Vec<String>> for StateSet {
    type Error = StateError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<StateSet> for Vec<String> {
    fn from(set: StateSet) -> Self {
        set.names.into_iter().skip(1).collect()
    }
}

/// Upper-case and validate a single state name.
pub fn normalize_state_name(name: &str) -> Result<String, StateError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(STATE_CHARS_MIN..=STATE_CHARS_MAX).contains(&len) {
        return Err(StateError::InvalidLength {
            name: name.to_string(),
            min: STATE_CHARS_MIN,
            max: STATE_CHARS_MAX,
        });
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StateError::IllegalCharacters(name.to_string()));
    }
    Ok(name.to_ascii_uppercase())
}

/// State declaration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("State name '{name}' must be between {min} and {max} characters")]
    InvalidLength { name: String, min: usize, max: usize },
    #[error("State name '{0}' may only contain letters, digits and '_'")]
    IllegalCharacters(String),
    #[error("State '{0}' is declared more than once")]
    Duplicate(String),
    #[error("State name FREE is reserved")]
    ReservedName,
    #[error("At most {max} states may be declared")]
    TooMany { max: usize },
}
