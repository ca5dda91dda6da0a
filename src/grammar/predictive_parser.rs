use std::fmt;

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ll1_table::TableCell, Grammar, ProductionId, END_MARK, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// `sync` cells pop the nonterminal, `skip` cells discard the token.
    #[default]
    PanicMode,
    /// Any `sync` or `skip` cell stops the run with a no-production error.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub max_steps: usize,
    pub recovery: RecoveryMode,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_steps: 100,
            recovery: RecoveryMode::default(),
        }
    }
}

impl ParseOptions {
    pub fn with_max_steps(max_steps: usize) -> Self {
        Self {
            max_steps,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParseError {
    #[error("expected '{expected}', found '{found}'")]
    Mismatch { expected: String, found: String },
    #[error("no production for {non_terminal} with '{token}'")]
    NoProduction { non_terminal: String, token: String },
    #[error("max-steps limit ({max_steps}) exceeded")]
    MaxStepsExceeded { max_steps: usize },
    #[error("unknown symbol '{symbol}'")]
    UnknownSymbol { symbol: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Accept,
    Match { terminal: String },
    Apply { production: String },
    SyncPop { non_terminal: String },
    SkipToken { token: String },
    Error { error: ParseError },
}

impl Action {
    fn is_final(&self) -> bool {
        matches!(self, Action::Accept | Action::Error { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Accept => write!(f, "accept"),
            Action::Match { terminal } => write!(f, "match '{}'", terminal),
            Action::Apply { production } => write!(f, "{}", production),
            Action::SyncPop { non_terminal } => write!(f, "sync-pop {}", non_terminal),
            Action::SkipToken { token } => write!(f, "skip '{}'", token),
            Action::Error { error } => write!(f, "error: {}", error),
        }
    }
}

/// One iteration of the automaton. `stack` is listed bottom to top and
/// still holds the symbol the action was taken on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseStep {
    pub step: usize,
    pub stack: Vec<String>,
    pub input: Vec<String>,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryPoint {
    pub step: usize,
    pub token: String,
    pub non_terminal: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    NonTerminal,
    Terminal,
    Epsilon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub label: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Matched terminals, left to right.
    pub fn leaves(&self) -> Vec<&str> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a str>) {
        if self.kind == NodeKind::Terminal {
            leaves.push(self.label.as_str());
        }
        for child in &self.children {
            child.collect_leaves(leaves);
        }
    }

    /// `S(a, S(ε), b)`
    pub fn to_bracketed(&self) -> String {
        if self.children.is_empty() {
            return self.label.clone();
        }
        format!(
            "{}({})",
            self.label,
            self.children
                .iter()
                .map(|c| c.to_bracketed())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// Everything a run produces. The tree may be partial when the run did not
/// accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseRun {
    pub trace: Vec<ParseStep>,
    pub tree: TreeNode,
    pub sync_points: Vec<RecoveryPoint>,
    pub skip_points: Vec<RecoveryPoint>,
    pub accepted: bool,
}

impl ParseRun {
    pub fn last_action(&self) -> Option<&Action> {
        self.trace.last().map(|s| &s.action)
    }

    pub fn error(&self) -> Option<&ParseError> {
        match self.last_action() {
            Some(Action::Error { error }) => Some(error),
            _ => None,
        }
    }
}

struct ArenaNode {
    label: String,
    kind: NodeKind,
    children: Vec<usize>,
}

const ROOT: usize = 0;

struct PredictiveParser<'g> {
    grammar: &'g Grammar,
    options: ParseOptions,
    /// (symbol, tree node to attach to); `None` only for the start symbol.
    stack: Vec<(usize, Option<usize>)>,
    tokens: Vec<String>,
    cursor: usize,
    nodes: Vec<ArenaNode>,
    trace: Vec<ParseStep>,
    sync_points: Vec<RecoveryPoint>,
    skip_points: Vec<RecoveryPoint>,
}

impl<'g> PredictiveParser<'g> {
    fn new<S: AsRef<str>>(grammar: &'g Grammar, input: &[S], options: ParseOptions) -> Self {
        let tokens = input
            .iter()
            .map(|t| t.as_ref().to_string())
            .chain(std::iter::once(END_MARK.to_string()))
            .collect();
        let start = grammar.start_symbol();
        Self {
            grammar,
            options,
            stack: vec![(grammar.end_mark(), None), (start, None)],
            tokens,
            cursor: 0,
            nodes: vec![ArenaNode {
                label: grammar.get_symbol_name(start).to_string(),
                kind: NodeKind::NonTerminal,
                children: Vec::new(),
            }],
            trace: Vec::new(),
            sync_points: Vec::new(),
            skip_points: Vec::new(),
        }
    }

    fn current_token(&self) -> &str {
        self.tokens
            .get(self.cursor)
            .map(|t| t.as_str())
            .unwrap_or(END_MARK)
    }

    /// True once only the appended end marker is left. A `$` supplied as
    /// input is an ordinary token outside the alphabet.
    fn at_end(&self) -> bool {
        self.cursor + 1 >= self.tokens.len()
    }

    fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        let stack = self
            .stack
            .iter()
            .map(|(s, _)| self.grammar.get_symbol_name(*s).to_string())
            .collect();
        let input = self.tokens.get(self.cursor..).unwrap_or(&[]).to_vec();
        (stack, input)
    }

    fn attach(&mut self, parent: usize, label: &str, kind: NodeKind) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(ArenaNode {
            label: label.to_string(),
            kind,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(idx);
        idx
    }

    fn run(mut self) -> ParseRun {
        while !self.stack.is_empty() {
            let step = self.trace.len() + 1;
            let (stack, input) = self.snapshot();

            if self.trace.len() >= self.options.max_steps {
                let action = Action::Error {
                    error: ParseError::MaxStepsExceeded {
                        max_steps: self.options.max_steps,
                    },
                };
                warn!("step {}: {}", step, action);
                self.trace.push(ParseStep {
                    step,
                    stack,
                    input,
                    action,
                });
                break;
            }

            let Some((symbol, parent)) = self.stack.pop() else {
                break;
            };
            let action = self.step(step, symbol, parent);
            trace!("step {}: {}", step, action);
            let done = action.is_final();
            self.trace.push(ParseStep {
                step,
                stack,
                input,
                action,
            });
            if done {
                break;
            }
        }

        let accepted = matches!(
            self.trace.last().map(|s| &s.action),
            Some(Action::Accept)
        ) && self.sync_points.is_empty()
            && self.skip_points.is_empty();
        info!(
            "parse finished after {} steps: {} ({} sync, {} skip)",
            self.trace.len(),
            if accepted { "accepted" } else { "rejected" },
            self.sync_points.len(),
            self.skip_points.len()
        );

        let tree = assemble(&self.nodes, ROOT);
        ParseRun {
            trace: self.trace,
            tree,
            sync_points: self.sync_points,
            skip_points: self.skip_points,
            accepted,
        }
    }

    fn step(&mut self, step: usize, symbol: usize, parent: Option<usize>) -> Action {
        let g = self.grammar;
        let token = self.current_token().to_string();
        let name = g.get_symbol_name(symbol);

        if symbol == g.end_mark() && self.at_end() {
            return Action::Accept;
        }

        if g.is_terminal(symbol) {
            if name != token || symbol == g.end_mark() {
                return Action::Error {
                    error: ParseError::Mismatch {
                        expected: name.to_string(),
                        found: token,
                    },
                };
            }
            self.cursor += 1;
            if let Some(parent) = parent {
                self.attach(parent, name, NodeKind::Terminal);
            }
            return Action::Match { terminal: token };
        }

        if !g.table().has_row(symbol) {
            return Action::Error {
                error: ParseError::UnknownSymbol {
                    symbol: name.to_string(),
                },
            };
        }

        // tokens outside the grammar's alphabet are discarded like a skip cell
        let lookahead = match g.terminal_index(&token) {
            Some(t) if t == g.end_mark() && !self.at_end() => None,
            t => t,
        };
        let cell = match lookahead {
            Some(t) => g.table().cell(symbol, t).cloned().unwrap_or_default(),
            None => TableCell::Skip,
        };
        let recover = self.options.recovery == RecoveryMode::PanicMode;

        match cell {
            TableCell::Sync if recover => {
                warn!("step {}: sync-pop {} on '{}'", step, name, token);
                self.sync_points.push(RecoveryPoint {
                    step,
                    token,
                    non_terminal: name.to_string(),
                });
                Action::SyncPop {
                    non_terminal: name.to_string(),
                }
            }
            TableCell::Skip if recover => {
                warn!("step {}: skip '{}' while expanding {}", step, token, name);
                self.cursor += 1;
                self.stack.push((symbol, parent));
                self.skip_points.push(RecoveryPoint {
                    step,
                    token: token.clone(),
                    non_terminal: name.to_string(),
                });
                Action::SkipToken { token }
            }
            TableCell::Productions(ids) if !ids.is_empty() => self.apply(parent, ids[0]),
            _ => Action::Error {
                error: ParseError::NoProduction {
                    non_terminal: name.to_string(),
                    token,
                },
            },
        }
    }

    /// Expands with `id`. A conflicting cell always resolves to its
    /// earliest-declared production.
    fn apply(&mut self, parent: Option<usize>, id: ProductionId) -> Action {
        let g = self.grammar;
        let node = match parent {
            Some(parent) => self.attach(parent, g.get_symbol_name(id.left), NodeKind::NonTerminal),
            None => ROOT,
        };

        let production = g.production(id);
        if production.is_empty() {
            self.attach(node, EPSILON, NodeKind::Epsilon);
        } else {
            self.stack
                .extend(production.iter().rev().map(|&s| (s, Some(node))));
        }

        Action::Apply {
            production: g.production_to_string(id),
        }
    }
}

fn assemble(nodes: &[ArenaNode], idx: usize) -> TreeNode {
    let node = &nodes[idx];
    TreeNode {
        label: node.label.clone(),
        kind: node.kind,
        children: node.children.iter().map(|&c| assemble(nodes, c)).collect(),
    }
}

impl Grammar {
    /// Runs the table-driven parser over `input`. The grammar is only read,
    /// so any number of runs may share it.
    pub fn run<S: AsRef<str>>(&self, input: &[S], options: &ParseOptions) -> ParseRun {
        PredictiveParser::new(self, input, *options).run()
    }
}
