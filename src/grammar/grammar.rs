use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{ll1_table::ParseTable, BuildError, GrammarConfig, END_MARK, EPSILON};

/// One rule as handed over by the caller: a left-hand side and its
/// alternatives. An alternative made of the ε placeholder alone is the
/// empty production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub left: String,
    pub alternatives: Vec<Vec<String>>,
    /// Source line of each alternative, filled in by the notation reader.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<usize>,
}

impl Rule {
    pub fn new(left: impl Into<String>, alternatives: Vec<Vec<String>>) -> Self {
        Self {
            left: left.into(),
            alternatives,
            lines: Vec::new(),
        }
    }

    /// Line to blame for alternative `alt` (or the left side when `None`).
    /// Rules without recorded lines fall back to `position`.
    fn line(&self, alt: Option<usize>, position: usize) -> usize {
        self.lines
            .get(alt.unwrap_or(0))
            .copied()
            .unwrap_or(position)
    }
}

#[derive(Debug, Clone)]
pub struct NonTerminal {
    pub index: usize,
    pub name: String,
    pub first: BTreeSet<usize>,
    pub follow: BTreeSet<usize>,
    pub nullable: bool,
    /// An empty production is the ε-production.
    pub productions: Vec<Vec<usize>>,
}

impl NonTerminal {
    pub fn new(index: usize, name: String) -> Self {
        Self {
            index,
            name,
            first: BTreeSet::new(),
            follow: BTreeSet::new(),
            nullable: false,
            productions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Symbol {
    NonTerminal(NonTerminal),
    Terminal(String),
}

impl Symbol {
    pub fn non_terminal(&self) -> Option<&NonTerminal> {
        match self {
            Symbol::NonTerminal(e) => Some(e),
            Symbol::Terminal(_) => None,
        }
    }

    pub fn mut_non_terminal(&mut self) -> Option<&mut NonTerminal> {
        match self {
            Symbol::NonTerminal(e) => Some(e),
            Symbol::Terminal(_) => None,
        }
    }
}

/// Names one alternative of one nonterminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductionId {
    pub left: usize,
    pub alt: usize,
}

/// A fully analyzed grammar. FIRST/FOLLOW sets and the parse table are
/// computed once by [`Grammar::build`] and never change afterwards.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(super) symbols: Vec<Symbol>,
    pub(super) symbol_table: HashMap<String, usize>,
    pub(super) start_symbol: usize,
    pub(super) end_mark: usize,
    pub(super) table: ParseTable,
}

impl Grammar {
    fn empty() -> Self {
        Self {
            symbols: Vec::new(),
            symbol_table: HashMap::new(),
            start_symbol: 0,
            end_mark: 0,
            table: ParseTable::default(),
        }
    }

    /// Registers every symbol, then runs the FIRST, FOLLOW and table
    /// builders. `start_symbol` defaults to the left side of the first rule.
    pub fn build(
        rules: &[Rule],
        start_symbol: Option<&str>,
        config: &GrammarConfig,
    ) -> Result<Self, BuildError> {
        if rules.is_empty() {
            return Err(BuildError::NoRules);
        }

        let mut g = Self::empty();

        let mut declared: HashSet<&str> = HashSet::new();
        for (i, rule) in rules.iter().enumerate() {
            let line = rule.line(None, i + 1);
            let left = rule.left.trim();
            if left.is_empty() {
                return Err(BuildError::malformed(line, left, "empty left side"));
            }
            if left.split_whitespace().count() != 1 {
                return Err(BuildError::malformed(
                    line,
                    left,
                    "left side contains whitespace",
                ));
            }
            if left == END_MARK || config.is_epsilon(left) {
                return Err(BuildError::malformed(
                    line,
                    left,
                    "reserved symbol used as left side",
                ));
            }
            if declared.insert(left) {
                g.add_non_terminal(left);
            }
        }

        for (i, rule) in rules.iter().enumerate() {
            let left_name = rule.left.trim();
            let left = g.symbol_table[left_name];
            if rule.alternatives.is_empty() {
                return Err(BuildError::malformed(
                    rule.line(None, i + 1),
                    left_name,
                    "no alternatives",
                ));
            }
            for (alt, alternative) in rule.alternatives.iter().enumerate() {
                let line = rule.line(Some(alt), i + 1);
                let production = g.register_alternative(line, left_name, alternative, config)?;
                g.add_production(left, production);
            }
        }

        g.end_mark = g.add_terminal(END_MARK.to_string());

        let start_name = match start_symbol {
            Some(name) => name.trim(),
            None => rules[0].left.trim(),
        };
        if !declared.contains(start_name) {
            return Err(BuildError::UnknownStartSymbol(start_name.to_string()));
        }
        g.start_symbol = g.symbol_table[start_name];

        g.calculate_nullable_first_follow();
        g.table = g.generate_ll1_parsing_table();

        Ok(g)
    }

    fn register_alternative(
        &mut self,
        line: usize,
        left: &str,
        alternative: &[String],
        config: &GrammarConfig,
    ) -> Result<Vec<usize>, BuildError> {
        match alternative {
            [] => {
                return Err(BuildError::malformed(
                    line,
                    left,
                    format!("empty alternative, write {} for the empty string", config.epsilon),
                ))
            }
            [only] if config.is_epsilon(only.trim()) => return Ok(Vec::new()),
            _ => {}
        }

        let mut production = Vec::with_capacity(alternative.len());
        for s in alternative.iter().map(|s| s.trim()) {
            if config.is_epsilon(s) {
                return Err(BuildError::malformed(
                    line,
                    left,
                    "ε must be the only symbol of its alternative",
                ));
            }
            if s == END_MARK {
                return Err(BuildError::malformed(
                    line,
                    left,
                    "the end marker cannot appear in a production",
                ));
            }
            let idx = match self.get_symbol_index(s) {
                Some(idx) => idx,
                None if config.convention.is_non_terminal(s) => self.add_non_terminal(s),
                None => self.add_terminal(s.to_string()),
            };
            production.push(idx);
        }
        Ok(production)
    }

    pub fn terminal_iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.symbols.iter().enumerate().filter_map(|(i, s)| {
            if let Symbol::Terminal(name) = s {
                Some((i, name.as_str()))
            } else {
                None
            }
        })
    }

    pub fn non_terminal_iter(&self) -> impl Iterator<Item = &NonTerminal> {
        self.symbols.iter().filter_map(|s| s.non_terminal())
    }

    pub fn get_symbol_index(&self, name: &str) -> Option<usize> {
        self.symbol_table.get(name).cloned()
    }

    /// Index of `name` if it is a terminal of this grammar.
    pub fn terminal_index(&self, name: &str) -> Option<usize> {
        self.get_symbol_index(name).filter(|&idx| self.is_terminal(idx))
    }

    pub fn is_terminal(&self, index: usize) -> bool {
        matches!(self.symbols.get(index), Some(Symbol::Terminal(_)))
    }

    pub fn non_terminal(&self, index: usize) -> Option<&NonTerminal> {
        self.symbols.get(index).and_then(|s| s.non_terminal())
    }

    pub fn get_symbol_name(&self, index: usize) -> &str {
        match &self.symbols[index] {
            Symbol::NonTerminal(e) => e.name.as_str(),
            Symbol::Terminal(e) => e.as_str(),
        }
    }

    pub fn start_symbol(&self) -> usize {
        self.start_symbol
    }

    pub fn end_mark(&self) -> usize {
        self.end_mark
    }

    pub fn table(&self) -> &ParseTable {
        &self.table
    }

    pub fn production(&self, id: ProductionId) -> &[usize] {
        self.non_terminal(id.left)
            .and_then(|nt| nt.productions.get(id.alt))
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    pub fn production_to_vec_str(&self, production: &[usize]) -> Vec<&str> {
        if production.is_empty() {
            vec![EPSILON]
        } else {
            production.iter().map(|&idx| self.get_symbol_name(idx)).collect()
        }
    }

    /// `A -> a B`, or `A -> ε` for the empty production.
    pub fn production_to_string(&self, id: ProductionId) -> String {
        format!(
            "{} -> {}",
            self.get_symbol_name(id.left),
            self.production_to_vec_str(self.production(id)).join(" ")
        )
    }

    fn add_non_terminal(&mut self, name: &str) -> usize {
        let idx = self.symbols.len();
        self.symbols
            .push(Symbol::NonTerminal(NonTerminal::new(idx, name.to_string())));
        self.symbol_table.insert(name.to_string(), idx);
        idx
    }

    fn add_terminal(&mut self, name: String) -> usize {
        let idx = self.symbols.len();
        self.symbols.push(Symbol::Terminal(name.clone()));
        self.symbol_table.insert(name, idx);
        idx
    }

    fn add_production(&mut self, left: usize, right: Vec<usize>) {
        if let Some(nt) = self.symbols[left].mut_non_terminal() {
            nt.productions.push(right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{parse::parse_rules, SymbolConvention};

    fn build(text: &str) -> Result<Grammar, BuildError> {
        let config = GrammarConfig::default();
        Grammar::build(&parse_rules(text, &config)?, None, &config)
    }

    #[test]
    fn classifies_symbols_by_case() {
        let g = build("S -> A b\nA -> a | ε").unwrap();

        let terminals: Vec<&str> = g.terminal_iter().map(|(_, name)| name).collect();
        assert_eq!(terminals, vec!["b", "a", "$"]);

        let non_terminals: Vec<&str> = g.non_terminal_iter().map(|nt| nt.name.as_str()).collect();
        assert_eq!(non_terminals, vec!["S", "A"]);

        assert_eq!(g.get_symbol_name(g.start_symbol()), "S");
        assert!(g.is_terminal(g.end_mark()));
    }

    #[test]
    fn epsilon_is_never_registered() {
        let g = build("S -> a S b | ε").unwrap();
        assert_eq!(g.get_symbol_index(EPSILON), None);
        let s = g.non_terminal(g.start_symbol()).unwrap();
        assert_eq!(s.productions[1], Vec::<usize>::new());
        assert_eq!(
            g.production_to_string(ProductionId { left: s.index, alt: 1 }),
            "S -> ε"
        );
    }

    #[test]
    fn start_follow_contains_end_mark() {
        let g = build("S -> a").unwrap();
        let s = g.non_terminal(g.start_symbol()).unwrap();
        assert!(s.follow.contains(&g.end_mark()));
    }

    #[test]
    fn no_rules() {
        let config = GrammarConfig::default();
        assert_eq!(
            Grammar::build(&[], None, &config).unwrap_err(),
            BuildError::NoRules
        );
    }

    #[test]
    fn empty_alternative_is_malformed() {
        let config = GrammarConfig::default();
        let rules = vec![Rule::new("S", vec![vec![]])];
        assert!(matches!(
            Grammar::build(&rules, None, &config),
            Err(BuildError::MalformedRule { line: 1, .. })
        ));
    }

    #[test]
    fn epsilon_mixed_with_symbols_is_malformed() {
        let config = GrammarConfig::default();
        let rules = vec![Rule::new(
            "S",
            vec![vec!["a".to_string(), "ε".to_string()]],
        )];
        assert!(matches!(
            Grammar::build(&rules, None, &config),
            Err(BuildError::MalformedRule { .. })
        ));
    }

    #[test]
    fn explicit_start_symbol() {
        let config = GrammarConfig::default();
        let rules = parse_rules("A -> a\nS -> A", &config).unwrap();
        let g = Grammar::build(&rules, Some("S"), &config).unwrap();
        assert_eq!(g.get_symbol_name(g.start_symbol()), "S");

        assert_eq!(
            Grammar::build(&rules, Some("B"), &config).unwrap_err(),
            BuildError::UnknownStartSymbol("B".to_string())
        );
    }

    #[test]
    fn undefined_non_terminal_is_kept_without_productions() {
        let g = build("S -> A").unwrap();
        let a = g.non_terminal(g.get_symbol_index("A").unwrap()).unwrap();
        assert!(a.productions.is_empty());
        assert!(a.first.is_empty());
    }

    #[test]
    fn declared_convention() {
        let config = GrammarConfig {
            convention: SymbolConvention::Declared,
            ..GrammarConfig::default()
        };
        let rules = parse_rules("expr -> ID rest\nrest -> + expr | ε", &config).unwrap();
        let g = Grammar::build(&rules, None, &config).unwrap();
        assert!(g.terminal_index("ID").is_some());
        assert!(g.terminal_index("rest").is_none());
        assert!(g.non_terminal(g.get_symbol_index("rest").unwrap()).is_some());
    }

    #[test]
    fn repeated_left_side_appends_alternatives() {
        let g = build("S -> a\nS -> b").unwrap();
        assert_eq!(g.non_terminal(g.start_symbol()).unwrap().productions.len(), 2);
    }

    fn malformed_line(result: Result<Grammar, BuildError>) -> Option<usize> {
        match result {
            Err(BuildError::MalformedRule { line, .. }) => Some(line),
            _ => None,
        }
    }

    #[test]
    fn end_mark_on_right_side_is_malformed() {
        assert_eq!(malformed_line(build("S -> a $")), Some(1));
    }

    #[test]
    fn reserved_left_sides_are_malformed() {
        let config = GrammarConfig::default();
        for left in ["$", "ε", "_"] {
            let rules = vec![
                Rule::new("S", vec![vec!["a".to_string()]]),
                Rule::new(left, vec![vec!["b".to_string()]]),
            ];
            assert_eq!(
                malformed_line(Grammar::build(&rules, None, &config)),
                Some(2),
                "left side {}",
                left
            );
        }
    }

    #[test]
    fn errors_point_at_source_lines() {
        assert_eq!(malformed_line(build("S -> a\n| b ε")), Some(2));
        assert_eq!(malformed_line(build("S -> a\n\nA -> b\n  | c\n| $")), Some(5));
        assert_eq!(malformed_line(build("S -> a\n\n$ -> b")), Some(3));
    }
}
