//! Schema module - Configuration and data types for rule-language automata.

mod config;
mod evolution;
mod neighborhood;
mod rules;
mod states;

pub use config::*;
pub use evolution::*;
pub use neighborhood::*;
pub use rules::*;
pub use states::*;
