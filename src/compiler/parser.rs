//! Token-stream parse pass.
//!
//! ```text
//! rule         := STATE "/" STATE ( ";" | ":" clauses ";" )
//! clauses      := clause ( ("&" | "AND" | "|" | "OR") clause )*
//! clause       := "(" neighborhood "@" ( "=" | <before a sign> ) conditions ")"
//! neighborhood := "ALL" | DIRECTION | "[" DIRECTION ("," DIRECTION)* "]"
//! conditions   := condition ( ("&" | "AND" | "|" | "OR") condition )*
//! condition    := ["+" | "-"] [NUMBER] "#" STATE
//! ```
//!
//! A failing rule is dropped and parsing resumes after the next `;`.
//! Illegal characters between rules are skipped; the lexer reports them.

use std::collections::HashSet;

use log::trace;

use super::error::{CompileError, CompileErrorKind, Expected};
use super::lexer::{Token, TokenKind};
use crate::schema::{
    Comparator, CompilerLimits, CountCondition, Direction, Expr, Neighborhood, NeighborhoodClause,
    Scope, StateSet, Transition,
};

type ParseResult<T> = Result<T, CompileError>;

/// Connective between two terms of a clause or condition list.
enum Connective {
    And,
    Or,
}

pub(crate) struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    states: &'a StateSet,
    neighborhood: Neighborhood,
    limits: CompilerLimits,
    /// Characters consumed by the rule being parsed.
    rule_chars: usize,
}

impl<'a> Parser<'a> {
    pub fn new(
        tokens: &'a [Token],
        states: &'a StateSet,
        neighborhood: Neighborhood,
        limits: CompilerLimits,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            states,
            neighborhood,
            limits,
            rule_chars: 0,
        }
    }

    /// Parse every rule, collecting transitions and diagnostics.
    pub fn parse_all(&mut self) -> (Vec<Transition>, Vec<CompileError>) {
        let mut transitions = Vec::new();
        let mut errors = Vec::new();
        let mut signatures = HashSet::new();

        while !self.eof() {
            if matches!(self.peek().kind, TokenKind::Illegal(_)) {
                self.pos += 1;
                continue;
            }
            let start = self.pos;
            self.rule_chars = 0;

            match self.parse_rule() {
                Ok((transition, target_offset)) => {
                    if signatures.insert(transition.signature()) {
                        transitions.push(transition);
                    } else {
                        errors.push(CompileError::new(
                            target_offset,
                            CompileErrorKind::DuplicateRule,
                        ));
                    }
                }
                Err(error) => {
                    self.resync();
                    // An illegal character inside the rule was already
                    // reported and is the root cause of the failure.
                    let tainted = self.tokens[start..self.pos]
                        .iter()
                        .any(|t| matches!(t.kind, TokenKind::Illegal(_)));
                    if tainted {
                        trace!("Dropped rule at offset {} after illegal character", error.offset);
                    } else {
                        errors.push(error);
                    }
                }
            }
        }

        (transitions, errors)
    }

    // ------------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------------

    fn peek(&self) -> &'a Token {
        // tokenize() always terminates the stream with Eof
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// Consume the next token, charging it against the per-rule size limit.
    fn bump(&mut self) -> ParseResult<&'a Token> {
        let token = self.peek();
        if self.rule_chars + token.len > self.limits.rule_chars_max {
            return Err(CompileError::new(
                token.offset,
                CompileErrorKind::SizeLimitExceeded,
            ));
        }
        self.rule_chars += token.len;
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        Ok(token)
    }

    fn expect_symbol(&mut self, symbol: char, expected: Expected) -> ParseResult<&'a Token> {
        if self.peek().is_symbol(symbol) {
            self.bump()
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: Expected) -> CompileError {
        CompileError::new(self.peek().offset, CompileErrorKind::Expected(expected))
    }

    fn connective(&self) -> Option<Connective> {
        let token = self.peek();
        if token.is_symbol('&') || token.is_word("AND") {
            Some(Connective::And)
        } else if token.is_symbol('|') || token.is_word("OR") {
            Some(Connective::Or)
        } else {
            None
        }
    }

    /// Skip past the next `;` at or after the current position.
    fn resync(&mut self) {
        while !self.eof() {
            let token = self.peek();
            self.pos += 1;
            if token.is_symbol(';') {
                break;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Grammar
    // ------------------------------------------------------------------------

    /// Returns the transition and the offset of its second state.
    fn parse_rule(&mut self) -> ParseResult<(Transition, usize)> {
        let start = self.peek().offset;

        let source = self.state(CompileErrorKind::InvalidFirstState)?;
        self.expect_symbol('/', Expected::Slash)?;

        let target_offset = self.peek().offset;
        let target = self.state(CompileErrorKind::InvalidSecondState)?;
        if source == target {
            return Err(CompileError::new(
                target_offset,
                CompileErrorKind::IllegalRule,
            ));
        }

        let token = self.peek();
        let condition = if token.is_symbol(';') {
            self.bump()?;
            None
        } else if token.is_symbol(':') {
            self.bump()?;
            Some(self.clauses()?)
        } else {
            return Err(self.unexpected(Expected::ColonOrSemicolon));
        };

        Ok((
            Transition::new(source, target, condition, start),
            target_offset,
        ))
    }

    /// Read a declared state name, reporting `invalid` otherwise.
    fn state(&mut self, invalid: fn(String) -> CompileErrorKind) -> ParseResult<String> {
        let token = self.peek();
        let TokenKind::Word(word) = &token.kind else {
            return Err(CompileError::new(token.offset, invalid(token.text())));
        };

        let len = word.chars().count();
        let in_bounds =
            (self.limits.state_chars_min..=self.limits.state_chars_max).contains(&len);
        let name = self
            .states
            .id(word)
            .and_then(|id| self.states.name(id))
            .filter(|_| in_bounds);

        match name {
            Some(name) => {
                self.bump()?;
                Ok(name.to_string())
            }
            None => Err(CompileError::new(token.offset, invalid(word.clone()))),
        }
    }

    /// Clauses up to and including the terminating `;`.
    fn clauses(&mut self) -> ParseResult<Expr<NeighborhoodClause>> {
        let mut groups = vec![vec![self.clause()?]];

        loop {
            if self.peek().is_symbol(';') {
                self.bump()?;
                break;
            }
            match self.connective() {
                Some(Connective::And) => {}
                Some(Connective::Or) => groups.push(Vec::new()),
                None => return Err(self.unexpected(Expected::ConnectiveOrSemicolon)),
            }
            self.bump()?;
            let clause = self.clause()?;
            if let Some(group) = groups.last_mut() {
                group.push(clause);
            }
        }

        Ok(Expr::from_groups(groups).unwrap_or(Expr::And(Vec::new())))
    }

    fn clause(&mut self) -> ParseResult<NeighborhoodClause> {
        self.expect_symbol('(', Expected::OpenParen)?;
        let scope = self.scope()?;
        self.expect_symbol('@', Expected::At)?;
        // `@ +3#A` is shorthand for `@ = +3#A`
        let token = self.peek();
        if !(token.is_symbol('+') || token.is_symbol('-')) {
            self.expect_symbol('=', Expected::Equals)?;
        }
        let condition = self.conditions()?;
        Ok(NeighborhoodClause { scope, condition })
    }

    fn scope(&mut self) -> ParseResult<Scope> {
        let token = self.peek();

        if token.is_word("ALL") {
            self.bump()?;
            return Ok(Scope::All);
        }

        if token.is_symbol('[') {
            self.bump()?;
            let mut directions: Vec<Direction> = Vec::new();
            loop {
                let offset = self.peek().offset;
                let direction = self.direction(Expected::Direction)?;
                if directions.contains(&direction) {
                    return Err(CompileError::new(
                        offset,
                        CompileErrorKind::DuplicateNeighbor(direction),
                    ));
                }
                directions.push(direction);

                let token = self.peek();
                if token.is_symbol(',') {
                    self.bump()?;
                } else if token.is_symbol(']') {
                    self.bump()?;
                    break;
                } else {
                    return Err(self.unexpected(Expected::CommaOrBracket));
                }
            }
            return Ok(Scope::Directions(directions));
        }

        let direction = self.direction(Expected::Neighborhood)?;
        Ok(Scope::Directions(vec![direction]))
    }

    /// A configured direction. Words that name no direction at all are
    /// reported as `invalid_word`.
    fn direction(&mut self, invalid_word: Expected) -> ParseResult<Direction> {
        let token = self.peek();
        let TokenKind::Word(word) = &token.kind else {
            return Err(self.unexpected(invalid_word));
        };

        match word.parse::<Direction>() {
            Ok(direction) if self.neighborhood.contains(direction) => {
                self.bump()?;
                Ok(direction)
            }
            Ok(_) => Err(CompileError::new(
                token.offset,
                CompileErrorKind::InvalidDirection(word.clone()),
            )),
            Err(_) if invalid_word == Expected::Direction => Err(CompileError::new(
                token.offset,
                CompileErrorKind::InvalidDirection(word.clone()),
            )),
            Err(_) => Err(self.unexpected(invalid_word)),
        }
    }

    /// Count conditions up to and including the closing `)`.
    fn conditions(&mut self) -> ParseResult<Expr<CountCondition>> {
        let mut groups = vec![vec![self.condition()?]];

        loop {
            if self.peek().is_symbol(')') {
                self.bump()?;
                break;
            }
            match self.connective() {
                Some(Connective::And) => {}
                Some(Connective::Or) => groups.push(Vec::new()),
                None => return Err(self.unexpected(Expected::ConnectiveOrCloseParen)),
            }
            self.bump()?;
            let condition = self.condition()?;
            if let Some(group) = groups.last_mut() {
                group.push(condition);
            }
        }

        Ok(Expr::from_groups(groups).unwrap_or(Expr::And(Vec::new())))
    }

    fn condition(&mut self) -> ParseResult<CountCondition> {
        let comparator = if self.peek().is_symbol('+') {
            self.bump()?;
            Comparator::More
        } else if self.peek().is_symbol('-') {
            self.bump()?;
            Comparator::Less
        } else {
            Comparator::Equal
        };

        let token = self.peek();
        let count = match &token.kind {
            TokenKind::Word(word) if word.bytes().all(|b| b.is_ascii_digit()) => {
                let count = word.parse::<u32>().map_err(|_| {
                    CompileError::new(token.offset, CompileErrorKind::SizeLimitExceeded)
                })?;
                self.bump()?;
                count
            }
            TokenKind::Symbol('#') => 1,
            _ => return Err(self.unexpected(Expected::Condition)),
        };

        self.expect_symbol('#', Expected::Hash)?;
        let state = self.state(CompileErrorKind::InvalidConditionState)?;

        Ok(CountCondition {
            count,
            comparator,
            state,
        })
    }
}
