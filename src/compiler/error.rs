//! Compiler diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::Direction;

/// A diagnostic anchored at a character offset of the original rule text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} at offset {offset}")]
pub struct CompileError {
    /// Zero-based character offset into the text passed to the compiler.
    pub offset: usize,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub(crate) fn new(offset: usize, kind: CompileErrorKind) -> Self {
        Self { offset, kind }
    }

    /// 1-based `(line, column)` of this error within `text`.
    pub fn line_col(&self, text: &str) -> (usize, usize) {
        line_col(text, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CompileErrorKind {
    #[error("illegal character '{0}'")]
    IllegalCharacter(char),
    #[error("invalid first state '{0}'")]
    InvalidFirstState(String),
    #[error("invalid second state '{0}'")]
    InvalidSecondState(String),
    #[error("invalid condition state '{0}'")]
    InvalidConditionState(String),
    #[error("invalid direction '{0}'")]
    InvalidDirection(String),
    #[error("direction {0} listed more than once")]
    DuplicateNeighbor(Direction),
    #[error("duplicate rule")]
    DuplicateRule,
    #[error("a state cannot transition to itself")]
    IllegalRule,
    #[error("size of rule surpasses maximum limit")]
    SizeLimitExceeded,
    #[error("number of rules surpasses maximum limit of {max}")]
    RuleCountExceeded { max: usize },
    #[error("expected {0}")]
    Expected(Expected),
}

/// What the parser was looking for when it hit an unexpected token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expected {
    /// `/` between the two states.
    Slash,
    /// `:` or `;` after the second state.
    ColonOrSemicolon,
    /// `(` opening a neighborhood clause.
    OpenParen,
    /// `ALL`, a direction or `[`.
    Neighborhood,
    /// A direction inside `[...]`.
    Direction,
    /// `,` or `]` inside `[...]`.
    CommaOrBracket,
    At,
    Equals,
    /// `[sign][number]#STATE`.
    Condition,
    Hash,
    /// `&`, `|` or `)` after a count condition.
    ConnectiveOrCloseParen,
    /// `&`, `|` or `;` after a neighborhood clause.
    ConnectiveOrSemicolon,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Expected::Slash => "'/'",
            Expected::ColonOrSemicolon => "either ':' or ';'",
            Expected::OpenParen => "'('",
            Expected::Neighborhood => "'ALL', a direction or '['",
            Expected::Direction => "a direction",
            Expected::CommaOrBracket => "either ',' or ']'",
            Expected::At => "'@'",
            Expected::Equals => "'='",
            Expected::Condition => "a condition like '3#STATE'",
            Expected::Hash => "'#'",
            Expected::ConnectiveOrCloseParen => "either '&', '|' or ')'",
            Expected::ConnectiveOrSemicolon => "either '&', '|' or ';'",
        })
    }
}

/// Convert a character offset into a 1-based `(line, column)` pair.
///
/// Offsets past the end of `text` map to the position just after its last
/// character.
pub fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for c in text.chars().take(offset) {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
