extern crate wasm_bindgen;

use wasm_bindgen::prelude::*;

pub mod grammar;
pub use grammar::{
    ll1_table::{ConflictKind, ParseTable, TableCell},
    parse::{parse_rules, tokenize},
    predictive_parser::{
        Action, NodeKind, ParseError, ParseOptions, ParseRun, ParseStep, RecoveryMode,
        RecoveryPoint, TreeNode,
    },
    pretty_print::{Analysis, CellOutput, ConflictOutput, GroupedRule},
    BuildError, Grammar, GrammarConfig, ProductionId, Rule, SymbolConvention,
};

/// Builds and analyzes a grammar with the default configuration.
pub fn build(rules: &[Rule], start_symbol: Option<&str>) -> Result<Grammar, BuildError> {
    Grammar::build(rules, start_symbol, &GrammarConfig::default())
}

pub fn analyze(grammar: &Grammar) -> Analysis {
    grammar.to_analysis()
}

/// Runs the predictive parser with panic-mode recovery.
pub fn run<S: AsRef<str>>(grammar: &Grammar, input_tokens: &[S], max_steps: usize) -> ParseRun {
    grammar.run(input_tokens, &ParseOptions::with_max_steps(max_steps))
}

fn error_json(e: BuildError) -> String {
    serde_json::json!({ "error": e.to_string() }).to_string()
}

fn build_from_text(grammar: &str) -> Result<Grammar, BuildError> {
    let config = GrammarConfig::default();
    let rules = parse_rules(grammar, &config)?;
    Grammar::build(&rules, None, &config)
}

#[wasm_bindgen]
pub fn analyze_to_json(grammar: &str) -> String {
    match build_from_text(grammar) {
        Ok(g) => analyze(&g).to_json(),
        Err(e) => error_json(e),
    }
}

#[wasm_bindgen]
pub fn trace_to_json(grammar: &str, input: &str, max_steps: usize) -> String {
    match build_from_text(grammar) {
        Ok(g) => run(&g, &tokenize(input), max_steps).to_json(),
        Err(e) => error_json(e),
    }
}
