//! Normalization pass: splits rule text into upper-cased words and symbols.
//!
//! Every token keeps the character offset at which it starts in the original
//! text, so diagnostics can point back into the editor buffer unchanged.
//! Comments run from `!` to the end of the line and are never validated.

use super::error::{CompileError, CompileErrorKind};

/// Structural symbols of the rule language.
pub(crate) const SYMBOLS: &[char] = &[
    '/', ':', ';', '(', ')', '[', ']', ',', '=', '&', '|', '#', '@', '+', '-',
];

const COMMENT: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Run of `[A-Z0-9_]`, upper-cased.
    Word(String),
    Symbol(char),
    /// Character already reported as illegal.
    Illegal(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Character offset of the first character.
    pub offset: usize,
    /// Length in characters.
    pub len: usize,
}

impl Token {
    pub fn is_symbol(&self, symbol: char) -> bool {
        self.kind == TokenKind::Symbol(symbol)
    }

    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w == word)
    }

    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Word(w) => w.clone(),
            TokenKind::Symbol(c) | TokenKind::Illegal(c) => c.to_string(),
            TokenKind::Eof => String::new(),
        }
    }
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize `text`. The stream always ends with a single [`TokenKind::Eof`].
pub(crate) fn tokenize(text: &str) -> (Vec<Token>, Vec<CompileError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut chars = text.chars().enumerate().peekable();
    let mut end = 0;

    while let Some((offset, c)) = chars.next() {
        end = offset + 1;

        if c == COMMENT {
            for (i, c) in chars.by_ref() {
                end = i + 1;
                if c == '\n' {
                    break;
                }
            }
            continue;
        }

        if c.is_whitespace() {
            continue;
        }

        if is_word_char(c) {
            let mut word = String::new();
            word.push(c.to_ascii_uppercase());
            while let Some(&(i, next)) = chars.peek() {
                if !is_word_char(next) {
                    break;
                }
                word.push(next.to_ascii_uppercase());
                end = i + 1;
                chars.next();
            }
            let len = word.len();
            tokens.push(Token {
                kind: TokenKind::Word(word),
                offset,
                len,
            });
            continue;
        }

        let kind = if SYMBOLS.contains(&c) {
            TokenKind::Symbol(c)
        } else {
            errors.push(CompileError::new(
                offset,
                CompileErrorKind::IllegalCharacter(c),
            ));
            TokenKind::Illegal(c)
        };
        tokens.push(Token {
            kind,
            offset,
            len: 1,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: end,
        len: 0,
    });

    (tokens, errors)
}
