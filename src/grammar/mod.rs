pub mod config;
pub mod error;
pub mod grammar;
pub mod ll1_table;
pub mod nullable_first_follow;
pub mod parse;
pub mod predictive_parser;
pub mod pretty_print;

pub use config::{GrammarConfig, SymbolConvention};
pub use error::BuildError;
pub use grammar::{Grammar, ProductionId, Rule};

pub const EPSILON: &str = "ε";
pub const EPSILON_ALIAS: &str = "_";
pub const END_MARK: &str = "$";
