//! Rule compiler.
//!
//! Turns rule text into an ordered [`RuleTable`] plus every diagnostic found
//! along the way. Compilation never fails outright: malformed rules are
//! reported and skipped, and the rest of the text is still compiled.
//!
//! ```text
//! ! Conway's Life
//! FREE / ALIVE : ( ALL @ = 3#ALIVE ) ;
//! ALIVE / FREE : ( ALL @ = -2#ALIVE | +3#ALIVE ) ;
//! ```

mod error;
mod lexer;
mod parser;

pub use error::{CompileError, CompileErrorKind, Expected, line_col};

use log::debug;

use crate::schema::{AutomatonConfig, CompilerLimits, Neighborhood, RuleTable, StateSet};

/// Output of a compilation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compilation {
    /// Rules that compiled cleanly, in source order.
    pub rules: RuleTable,
    /// Diagnostics ordered by offset.
    pub errors: Vec<CompileError>,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The rule table, or the diagnostics if there were any.
    pub fn into_result(self) -> Result<RuleTable, Vec<CompileError>> {
        if self.errors.is_empty() {
            Ok(self.rules)
        } else {
            Err(self.errors)
        }
    }
}

/// Compiles rule text against a state universe and neighborhood.
#[derive(Debug, Clone)]
pub struct Compiler<'a> {
    states: &'a StateSet,
    neighborhood: Neighborhood,
    limits: CompilerLimits,
}

impl<'a> Compiler<'a> {
    pub fn new(states: &'a StateSet, neighborhood: Neighborhood) -> Self {
        Self {
            states,
            neighborhood,
            limits: CompilerLimits::default(),
        }
    }

    pub fn from_config(config: &'a AutomatonConfig) -> Self {
        Self::new(&config.states, config.neighborhood).with_limits(config.limits)
    }

    pub fn with_limits(mut self, limits: CompilerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn compile(&self, text: &str) -> Compilation {
        let (tokens, mut errors) = lexer::tokenize(text);
        let (transitions, parse_errors) =
            parser::Parser::new(&tokens, self.states, self.neighborhood, self.limits).parse_all();

        errors.extend(parse_errors);
        errors.sort_by_key(|e| e.offset);

        if transitions.len() > self.limits.rules_max {
            errors = vec![CompileError::new(
                0,
                CompileErrorKind::RuleCountExceeded {
                    max: self.limits.rules_max,
                },
            )];
        }

        debug!(
            "Compiled {} rules with {} errors",
            transitions.len(),
            errors.len()
        );

        Compilation {
            rules: RuleTable::new(transitions),
            errors,
        }
    }
}

/// Compile the rule text of `config`.
pub fn compile(config: &AutomatonConfig) -> Compilation {
    Compiler::from_config(config).compile(&config.rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Comparator, CountCondition, Direction, Expr, NeighborhoodClause, Scope, Transition,
    };
    use proptest::prelude::*;

    fn states() -> StateSet {
        StateSet::new(["A", "B", "C"]).unwrap()
    }

    fn compile_text(text: &str) -> Compilation {
        let states = states();
        Compiler::new(&states, Neighborhood::von_neumann()).compile(text)
    }

    fn single_error(text: &str) -> CompileError {
        let compilation = compile_text(text);
        assert_eq!(compilation.errors.len(), 1, "{text}: {:?}", compilation.errors);
        compilation.errors[0].clone()
    }

    #[test]
    fn test_compile_scenarios() {
        let states = StateSet::new(["A", "B"]).unwrap();
        let compilation = Compiler::new(&states, Neighborhood::moore()).compile(
            "A / B : ( [N,S,E,W] @ = 2#A ) ;\n\
             free / a : ( all @ = 3#a ) ;\n\
             A / FREE : ( ALL @ + 3#A ) ;",
        );
        assert!(compilation.is_ok(), "{:?}", compilation.errors);
        assert_eq!(compilation.rules.len(), 3);

        let first = compilation.rules.get(0).unwrap();
        assert_eq!(first.source, "A");
        assert_eq!(first.target, "B");
        assert_eq!(first.offset, 0);
        assert!(!first.matches_all);
        assert_eq!(
            first.condition,
            Some(Expr::Leaf(NeighborhoodClause {
                scope: Scope::Directions(vec![Direction::N, Direction::S, Direction::E, Direction::W]),
                condition: Expr::Leaf(CountCondition {
                    count: 2,
                    comparator: Comparator::Equal,
                    state: "A".to_string(),
                }),
            }))
        );

        let birth = compilation.rules.get(1).unwrap();
        assert_eq!(birth.source, "FREE");
        assert_eq!(birth.offset, 32);
        assert_eq!(birth.to_string(), "FREE / A : ( ALL @ = 3#A ) ;");

        let death = compilation.rules.get(2).unwrap();
        assert_eq!(death.to_string(), "A / FREE : ( ALL @ = +3#A ) ;");
    }

    #[test]
    fn test_bare_hash_and_keywords() {
        let compilation =
            compile_text("a / b : ( n @ = #a and -#b or +#c ) OR ( [s] @ = 0#A ) ;\nc / a ;");
        assert!(compilation.is_ok(), "{:?}", compilation.errors);
        let rule = compilation.rules.get(0).unwrap();
        assert_eq!(
            rule.to_string(),
            "A / B : ( N @ = 1#A & -1#B | +1#C ) | ( S @ = 0#A ) ;"
        );
        assert!(rule.matches_all);

        let unconditional = compilation.rules.get(1).unwrap();
        assert_eq!(unconditional.condition, None);
        assert!(unconditional.matches_all);
    }

    #[test]
    fn test_error_kinds() {
        use CompileErrorKind as K;
        let cases: Vec<(&str, CompileErrorKind, usize)> = vec![
            ("X / A ;", K::InvalidFirstState("X".into()), 0),
            ("A - B ;", K::Expected(Expected::Slash), 2),
            ("A / X ;", K::InvalidSecondState("X".into()), 4),
            ("A / B ( ALL @ = 1#A ) ;", K::Expected(Expected::ColonOrSemicolon), 6),
            ("A / B : ALL @ = 1#A ;", K::Expected(Expected::OpenParen), 8),
            ("A / B : ( NE @ = 1#A ) ;", K::InvalidDirection("NE".into()), 10),
            ("A / B : ( FOO @ = 1#A ) ;", K::Expected(Expected::Neighborhood), 10),
            ("A / B : ( [N,N] @ = 1#A ) ;", K::DuplicateNeighbor(Direction::N), 13),
            ("A / B : ( [N S] @ = 1#A ) ;", K::Expected(Expected::CommaOrBracket), 13),
            ("A / B : ( [N,XX] @ = 1#A ) ;", K::InvalidDirection("XX".into()), 13),
            ("A / B : ( ALL = 1#A ) ;", K::Expected(Expected::At), 14),
            ("A / B : ( ALL @ 1#A ) ;", K::Expected(Expected::Equals), 16),
            ("A / B : ( ALL @ = 1#Z ) ;", K::InvalidConditionState("Z".into()), 20),
            ("A / B : ( ALL @ = 1A#A ) ;", K::Expected(Expected::Condition), 18),
            ("A / B : ( ALL @ = 1 A ) ;", K::Expected(Expected::Hash), 20),
            ("A / B : ( ALL @ = 1#A ;", K::Expected(Expected::ConnectiveOrCloseParen), 22),
            ("A / B : ( ALL @ = 1#A ) B ;", K::Expected(Expected::ConnectiveOrSemicolon), 24),
            ("A / A ;", K::IllegalRule, 4),
            ("A / B : ( ALL @ = 99999999999#A ) ;", K::SizeLimitExceeded, 18),
        ];

        for (text, kind, offset) in cases {
            assert_eq!(single_error(text), CompileError { offset, kind }, "{text}");
            assert!(compile_text(text).rules.is_empty(), "{text}");
        }
    }

    #[test]
    fn test_resync_after_error() {
        let text = "A / B : ( ALL @ = 3 A ) ;\nB / A ;\nC / : ;\nC / A ;";
        let compilation = compile_text(text);

        let kinds: Vec<&CompileErrorKind> = compilation.errors.iter().map(|e| &e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &CompileErrorKind::Expected(Expected::Hash),
                &CompileErrorKind::InvalidSecondState(":".into()),
            ]
        );
        let rendered: Vec<String> = compilation.rules.iter().map(|r| r.to_string()).collect();
        assert_eq!(rendered, vec!["B / A ;", "C / A ;"]);
        assert_eq!(compilation.rules.get(1).unwrap().offset, 42);
    }

    #[test]
    fn test_duplicate_rules() {
        let compilation = compile_text("A / B ;\nA / B ;\nA / B : ( ALL @ = 1#A ) ;\nB / A ;");
        assert_eq!(
            compilation.errors,
            vec![
                CompileError {
                    offset: 12,
                    kind: CompileErrorKind::DuplicateRule
                },
                CompileError {
                    offset: 20,
                    kind: CompileErrorKind::DuplicateRule
                },
            ]
        );
        let rendered: Vec<String> = compilation.rules.iter().map(|r| r.to_string()).collect();
        assert_eq!(rendered, vec!["A / B ;", "B / A ;"]);
    }

    #[test]
    fn test_illegal_character_between_rules() {
        let text = "A / B ;$\nB / C ;\nC / A ;%";
        let compilation = compile_text(text);
        assert_eq!(
            compilation.errors,
            vec![
                CompileError {
                    offset: 7,
                    kind: CompileErrorKind::IllegalCharacter('$')
                },
                CompileError {
                    offset: 24,
                    kind: CompileErrorKind::IllegalCharacter('%')
                },
            ]
        );
        let rendered: Vec<String> = compilation.rules.iter().map(|r| r.to_string()).collect();
        assert_eq!(rendered, vec!["A / B ;", "B / C ;", "C / A ;"]);
    }

    #[test]
    fn test_illegal_character_reported_once() {
        let text = "A / B ;\nB / C : ( ALL @ = 2#A ) ;\n! comments may say $anything\nC / A ;";
        let text = text.replacen("2#A", "2#$A", 1);
        let compilation = compile_text(&text);
        let dollar = text.chars().position(|c| c == '$').unwrap();
        assert_eq!(
            compilation.errors,
            vec![CompileError {
                offset: dollar,
                kind: CompileErrorKind::IllegalCharacter('$')
            }]
        );
        assert_eq!(compilation.errors[0].line_col(&text), (2, 21));
        assert_eq!(compilation.rules.len(), 2);
    }

    #[test]
    fn test_rule_size_limit() {
        let states = states();
        let limits = CompilerLimits {
            rule_chars_max: 10,
            ..Default::default()
        };
        let compilation = Compiler::new(&states, Neighborhood::moore())
            .with_limits(limits)
            .compile("A / B : ( ALL @ = 1#A ) ;\nB / A ;");
        assert_eq!(
            compilation.errors,
            vec![CompileError {
                offset: 18,
                kind: CompileErrorKind::SizeLimitExceeded
            }]
        );
        assert_eq!(compilation.rules.len(), 1);
    }

    #[test]
    fn test_rule_count_sentinel() {
        let states = states();
        let limits = CompilerLimits {
            rules_max: 2,
            ..Default::default()
        };
        let compilation = Compiler::new(&states, Neighborhood::moore())
            .with_limits(limits)
            .compile("A / B ;\nB / C ;\nC / A ;\nX / A ;");
        assert_eq!(
            compilation.errors,
            vec![CompileError {
                offset: 0,
                kind: CompileErrorKind::RuleCountExceeded { max: 2 }
            }]
        );
        assert!(compilation.into_result().is_err());
    }

    #[test]
    fn test_compile_config() {
        let config = AutomatonConfig::default();
        let rules = compile(&config).into_result().unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.get(1).unwrap().matches_all);
        assert!(!rules.get(0).unwrap().matches_all);
    }

    // ------------------------------------------------------------------------
    // Property tests
    // ------------------------------------------------------------------------

    fn state_name() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["FREE", "A", "B", "C"])
    }

    fn comparator() -> impl Strategy<Value = Comparator> {
        prop_oneof![
            Just(Comparator::Equal),
            Just(Comparator::Less),
            Just(Comparator::More)
        ]
    }

    fn or_of_and<T, S>(leaf: S) -> impl Strategy<Value = Expr<T>>
    where
        T: std::fmt::Debug,
        S: Strategy<Value = T>,
    {
        prop::collection::vec(prop::collection::vec(leaf, 1..3), 1..3)
            .prop_map(|groups| Expr::from_groups(groups).unwrap())
    }

    fn clause() -> impl Strategy<Value = NeighborhoodClause> {
        let count = (0u32..9, comparator(), state_name()).prop_map(|(count, comparator, state)| {
            CountCondition {
                count,
                comparator,
                state: state.to_string(),
            }
        });
        let scope = prop_oneof![
            Just(Scope::All),
            prop::sample::subsequence(
                vec![Direction::N, Direction::W, Direction::E, Direction::S],
                1..=4
            )
            .prop_map(Scope::Directions),
        ];
        (scope, or_of_and(count)).prop_map(|(scope, condition)| NeighborhoodClause { scope, condition })
    }

    fn rule_texts() -> impl Strategy<Value = Vec<String>> {
        let transition = (state_name(), state_name(), prop::option::of(or_of_and(clause())))
            .prop_filter("source differs from target", |(s, t, _)| s != t)
            .prop_map(|(s, t, c)| Transition::new(s, t, c, 0));

        prop::collection::vec(transition, 1..8).prop_map(|rules| {
            let mut seen = std::collections::HashSet::new();
            rules
                .into_iter()
                .filter(|r| seen.insert(r.signature()))
                .map(|r| r.to_string())
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_well_formed_texts_compile(texts in rule_texts()) {
            let compilation = compile_text(&texts.join("\n"));
            prop_assert!(compilation.is_ok(), "{:?}", compilation.errors);
            prop_assert_eq!(compilation.rules.len(), texts.len());
            let rendered: Vec<String> = compilation.rules.iter().map(|r| r.to_string()).collect();
            prop_assert_eq!(rendered, texts);
        }

        #[test]
        fn test_illegal_character_resyncs(
            texts in rule_texts(),
            pick in any::<prop::sample::Index>(),
            at in any::<prop::sample::Index>(),
            illegal in prop::sample::select(vec!['$', '%', '?', '~', '^', '{', '"', 'é']),
        ) {
            let victim = pick.index(texts.len());
            let line: Vec<char> = texts[victim].chars().collect();
            // anywhere from before the rule's first character to after its ';'
            let position = at.index(line.len() + 1);
            // only a character inside the rule breaks it
            let broken = position > 0 && position < line.len();

            let mut injected = texts.clone();
            let mut chars = line.clone();
            chars.insert(position, illegal);
            injected[victim] = chars.into_iter().collect();

            let offset = texts[..victim].iter().map(|t| t.chars().count() + 1).sum::<usize>() + position;
            let compilation = compile_text(&injected.join("\n"));

            prop_assert_eq!(
                compilation.errors,
                vec![CompileError { offset, kind: CompileErrorKind::IllegalCharacter(illegal) }]
            );
            let rendered: Vec<String> = compilation.rules.iter().map(|r| r.to_string()).collect();
            let expected: Vec<String> = texts
                .iter()
                .enumerate()
                .filter(|&(i, _)| !(broken && i == victim))
                .map(|(_, t)| t.clone())
                .collect();
            prop_assert_eq!(rendered, expected);
        }
    }
}
