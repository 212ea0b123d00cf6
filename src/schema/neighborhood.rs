//! Neighborhood directions and the configured neighborhood mask.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the nine relative positions around (and including) a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Nw,
    N,
    Ne,
    W,
    C,
    E,
    Sw,
    S,
    Se,
}

impl Direction {
    /// All directions in row-major order.
    pub const ALL: [Direction; 9] = [
        Direction::Nw,
        Direction::N,
        Direction::Ne,
        Direction::W,
        Direction::C,
        Direction::E,
        Direction::Sw,
        Direction::S,
        Direction::Se,
    ];

    /// Offset `(dx, dy)`; y grows downwards (south).
    #[inline]
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::Nw => (-1, -1),
            Direction::N => (0, -1),
            Direction::Ne => (1, -1),
            Direction::W => (-1, 0),
            Direction::C => (0, 0),
            Direction::E => (1, 0),
            Direction::Sw => (-1, 1),
            Direction::S => (0, 1),
            Direction::Se => (1, 1),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Nw => "NW",
            Direction::N => "N",
            Direction::Ne => "NE",
            Direction::W => "W",
            Direction::C => "C",
            Direction::E => "E",
            Direction::Sw => "SW",
            Direction::S => "S",
            Direction::Se => "SE",
        }
    }

    #[inline]
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Direction::ALL
            .into_iter()
            .find(|d| d.name() == upper)
            .ok_or_else(|| UnknownDirection(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown direction '{0}'")]
pub struct UnknownDirection(pub String);

/// Set of directions, stored as a 9-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Direction>", into = "Vec<Direction>")]
pub struct Neighborhood(u16);

impl Neighborhood {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// All nine positions, centre included.
    pub const fn full() -> Self {
        Self(0x1FF)
    }

    /// The eight surrounding cells.
    pub fn moore() -> Self {
        Direction::ALL
            .into_iter()
            .filter(|&d| d != Direction::C)
            .collect()
    }

    /// N, W, E and S.
    pub fn von_neumann() -> Self {
        [Direction::N, Direction::W, Direction::E, Direction::S]
            .into_iter()
            .collect()
    }

    #[inline]
    pub fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    pub fn insert(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    pub fn remove(&mut self, direction: Direction) {
        self.0 &= !direction.bit();
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether every direction of `other` is also in `self`.
    pub fn is_superset(self, other: Neighborhood) -> bool {
        other.0 & !self.0 == 0
    }

    /// Members in row-major order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |&d| self.contains(d))
    }
}

impl FromIterator<Direction> for Neighborhood {
    fn from_iter<T: IntoIterator<Item = Direction>>(iter: T) -> Self {
        let mut set = Self::empty();
        for d in iter {
            set.insert(d);
        }
        set
    }
}

impl From<Vec<Direction>> for Neighborhood {
    fn from(directions: Vec<Direction>) -> Self {
        directions.into_iter().collect()
    }
}

impl From<Neighborhood> for Vec<Direction> {
    fn from(set: Neighborhood) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for Neighborhood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Direction::name).collect();
        f.write_str(&names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directions() {
        assert_eq!("nw".parse::<Direction>().unwrap(), Direction::Nw);
        assert_eq!("C".parse::<Direction>().unwrap(), Direction::C);
        assert!("NNE".parse::<Direction>().is_err());
    }

    #[test]
    fn test_neighborhood_mask() {
        let hood = Neighborhood::von_neumann();
        assert_eq!(hood.len(), 4);
        assert!(hood.contains(Direction::N));
        assert!(!hood.contains(Direction::Ne));
        assert!(Neighborhood::moore().is_superset(hood));
        assert!(!hood.is_superset(Neighborhood::moore()));
        assert_eq!(Neighborhood::moore().len(), 8);
        assert_eq!(Neighborhood::full().len(), 9);
        assert_eq!(hood.to_string(), "N W E S");
    }

    #[test]
    fn test_serialization() {
        let hood = Neighborhood::von_neumann();
        let json = serde_json::to_string(&hood).unwrap();
        assert_eq!(json, r#"["N","W","E","S"]"#);
        let parsed: Neighborhood = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hood);
    }
}
