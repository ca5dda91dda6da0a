use std::collections::BTreeMap;

use crowbook_text_processing::escape;
use serde::Serialize;

use super::{
    ll1_table::{Conflict, ConflictKind, TableCell},
    predictive_parser::{NodeKind, ParseRun, TreeNode},
    Grammar, EPSILON,
};

fn align_columns(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let width: Vec<usize> = (0..columns)
        .map(|j| {
            rows.iter()
                .filter_map(|r| r.get(j))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();
    rows.iter()
        .map(|line| {
            line.iter()
                .enumerate()
                .map(|(i, s)| format!("{:>width$}", s, width = width[i]))
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tex_text(s: &str) -> String {
    escape::tex(s).replace(EPSILON, "$\\epsilon$")
}

/// `A -> a B` with the arrow typeset.
fn tex_production(production: &str) -> String {
    match production.split_once(" -> ") {
        Some((left, right)) => format!("{} $\\rightarrow$ {}", tex_text(left), tex_text(right)),
        None => tex_text(production),
    }
}

fn tex_symbols(symbols: &[&str], terminals: &[&str]) -> String {
    symbols
        .iter()
        .map(|&s| {
            if s == EPSILON {
                "\\epsilon".to_string()
            } else if terminals.contains(&s) {
                format!("\\text{{{}}}", escape::tex(s))
            } else {
                escape::tex(s).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\\ ")
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionOutput<'a> {
    pub left: &'a str,
    pub rights: Vec<Vec<&'a str>>,
}

impl ProductionOutput<'_> {
    pub fn to_plaintext(&self, left_width: usize) -> String {
        self.rights
            .iter()
            .enumerate()
            .map(|(i, right)| {
                let head = if i == 0 { self.left } else { "" };
                let arrow = if i == 0 { "->" } else { " |" };
                format!("{:>w$} {} {}", head, arrow, right.join(" "), w = left_width)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_latex(&self, terminals: &[&str]) -> String {
        let rights = self
            .rights
            .iter()
            .map(|r| tex_symbols(r, terminals))
            .collect::<Vec<_>>()
            .join(" \\mid ");
        format!("{} & \\rightarrow & {}", escape::tex(self.left), rights)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionOutputVec<'a> {
    productions: Vec<ProductionOutput<'a>>,
    #[serde(skip)]
    terminals: Vec<&'a str>,
}

impl ProductionOutputVec<'_> {
    pub fn to_plaintext(&self) -> String {
        let left_width = self
            .productions
            .iter()
            .map(|p| p.left.chars().count())
            .max()
            .unwrap_or(0);
        self.productions
            .iter()
            .map(|p| p.to_plaintext(left_width))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_latex(&self) -> String {
        std::iter::once("\\[\\begin{array}{cll}".to_string())
            .chain(self.productions.iter().map(|p| p.to_latex(&self.terminals)))
            .collect::<Vec<_>>()
            .join("\\\\\n")
            + "\n\\end{array}\\]"
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NonTerminalOutput<'a> {
    name: &'a str,
    nullable: bool,
    first: Vec<&'a str>,
    follow: Vec<&'a str>,
}

impl NonTerminalOutput<'_> {
    fn to_plaintext(&self) -> Vec<String> {
        vec![
            self.name.to_string(),
            self.nullable.to_string(),
            self.first.join(", "),
            self.follow.join(", "),
        ]
    }

    fn to_latex(&self) -> String {
        let set = |a: &[&str]| {
            a.iter()
                .map(|&s| {
                    if s == EPSILON {
                        "$\\epsilon$".to_string()
                    } else {
                        escape::tex(s).to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join("\\ ")
        };
        format!(
            "{} & {} & {} & {}",
            escape::tex(self.name),
            self.nullable,
            set(self.first.as_slice()),
            set(self.follow.as_slice())
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NonTerminalOutputVec<'a> {
    data: Vec<NonTerminalOutput<'a>>,
}

impl NonTerminalOutputVec<'_> {
    pub fn to_plaintext(&self) -> String {
        let header: Vec<String> = ["Symbol", "Nullable", "First", "Follow"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows: Vec<Vec<String>> = std::iter::once(header)
            .chain(self.data.iter().map(|d| d.to_plaintext()))
            .collect();
        align_columns(&rows)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_latex(&self) -> String {
        let content = self
            .data
            .iter()
            .map(|e| e.to_latex())
            .collect::<Vec<_>>()
            .join("\\\\\n");

        "\\begin{tabular}{c|c|c|c}\n".to_string()
            + "Symbol & Nullable & First & Follow\\\\\\hline\n"
            + &content
            + "\\\\\n\\end{tabular}"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "productions", rename_all = "snake_case")]
pub enum CellOutput {
    Empty,
    Sync,
    Skip,
    Production(Vec<String>),
}

impl CellOutput {
    fn to_plaintext(&self) -> String {
        match self {
            CellOutput::Empty => String::new(),
            CellOutput::Sync => "sync".to_string(),
            CellOutput::Skip => "skip".to_string(),
            CellOutput::Production(p) => p.join(" / "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictOutput {
    pub non_terminal: String,
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub productions: [String; 2],
    pub intersection: Vec<String>,
    pub suggestion: String,
}

impl ConflictOutput {
    fn new(c: &Conflict, g: &Grammar) -> Self {
        Self {
            non_terminal: g.get_symbol_name(c.non_terminal).to_string(),
            kind: c.kind,
            productions: [
                g.production_to_string(c.productions.0),
                g.production_to_string(c.productions.1),
            ],
            intersection: c
                .intersection
                .iter()
                .map(|&t| g.get_symbol_name(t).to_string())
                .collect(),
            suggestion: c.suggestion(g),
        }
    }

    pub fn to_plaintext(&self) -> String {
        format!(
            "{} on {}: {} | {} share {{{}}}\n  hint: {}",
            self.kind,
            self.non_terminal,
            self.productions[0],
            self.productions[1],
            self.intersection.join(", "),
            self.suggestion
        )
    }

    fn to_latex(&self) -> String {
        format!(
            "{} & {} & {} & {} & {}",
            escape::tex(&self.non_terminal),
            escape::tex(&self.kind.to_string()),
            self.productions
                .iter()
                .map(|p| tex_production(p))
                .collect::<Vec<_>>()
                .join(", "),
            self.intersection
                .iter()
                .map(|t| escape::tex(t).to_string())
                .collect::<Vec<_>>()
                .join(", "),
            tex_text(&self.suggestion)
        )
    }
}

/// One left-hand side with its alternatives, each joined by spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedRule {
    pub lhs: String,
    pub rhs: Vec<String>,
}

/// Read-only projection of an analyzed grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub grammar: Vec<GroupedRule>,
    pub terminals: Vec<String>,
    pub non_terminals: Vec<String>,
    pub first_sets: BTreeMap<String, Vec<String>>,
    pub follow_sets: BTreeMap<String, Vec<String>>,
    #[serde(rename = "is_LL1")]
    pub is_ll1: bool,
    pub conflicts: Vec<ConflictOutput>,
    pub parse_table: BTreeMap<String, BTreeMap<String, CellOutput>>,
}

impl Analysis {
    pub fn first_conflicts(&self) -> impl Iterator<Item = &ConflictOutput> {
        self.conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::FirstFirst)
    }

    pub fn follow_conflicts(&self) -> impl Iterator<Item = &ConflictOutput> {
        self.conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::FirstFollow)
    }

    pub fn conflicts_to_plaintext(&self) -> String {
        if self.conflicts.is_empty() {
            return "grammar is LL(1)".to_string();
        }
        self.conflicts
            .iter()
            .map(|c| c.to_plaintext())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn conflicts_to_latex(&self) -> String {
        if self.conflicts.is_empty() {
            return "grammar is LL(1)".to_string();
        }
        let body = self
            .conflicts
            .iter()
            .map(|c| c.to_latex())
            .collect::<Vec<_>>()
            .join("\\\\\n");
        "\\begin{tabular}{c|l|l|l|l}\n".to_string()
            + "Symbol & Kind & Productions & Intersection & Hint\\\\\\hline\n"
            + &body
            + "\\\\\n\\end{tabular}"
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub struct LL1ParsingTable<'a> {
    terminals: Vec<&'a str>,
    rows: Vec<(&'a str, Vec<CellOutput>)>,
}

impl LL1ParsingTable<'_> {
    pub fn to_plaintext(&self) -> String {
        let mut header: Vec<String> = vec![String::new()];
        header.extend(self.terminals.iter().map(|&t| t.to_string()));
        let rows: Vec<Vec<String>> = std::iter::once(header)
            .chain(self.rows.iter().map(|(left, row)| {
                std::iter::once(left.to_string())
                    .chain(row.iter().map(|c| c.to_plaintext()))
                    .collect()
            }))
            .collect();
        align_columns(&rows)
    }

    pub fn to_latex(&self) -> String {
        let mut header: Vec<String> = vec![format!(
            "\\[\\begin{{array}}{{c{}}}\n",
            "|l".repeat(self.terminals.len())
        )];
        header.extend(
            self.terminals
                .iter()
                .map(|&t| format!("\\text{{{}}}", escape::tex(t))),
        );
        let header = header.join(" & ");

        let body = self
            .rows
            .iter()
            .map(|(left, row)| {
                std::iter::once(escape::tex(*left).to_string())
                    .chain(row.iter().map(|cell| match cell {
                        CellOutput::Production(p) if p.len() > 1 => {
                            format!("{{\\color{{red}}{}}}", self.production_cell_latex(p))
                        }
                        CellOutput::Production(p) => self.production_cell_latex(p),
                        CellOutput::Sync => "\\textit{sync}".to_string(),
                        CellOutput::Skip | CellOutput::Empty => String::new(),
                    }))
                    .collect::<Vec<_>>()
                    .join(" & ")
            })
            .collect::<Vec<_>>()
            .join("\\\\\n");

        header + "\\\\\\hline\n" + &body + "\n\\end{array}\\]"
    }

    fn production_cell_latex(&self, productions: &[String]) -> String {
        productions
            .iter()
            .map(|p| {
                let (left, right) = p.split_once(" -> ").unwrap_or((p.as_str(), ""));
                let right: Vec<&str> = right.split_whitespace().collect();
                format!(
                    "{} \\rightarrow {}",
                    escape::tex(left),
                    tex_symbols(&right, &self.terminals)
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl ParseRun {
    pub fn to_plaintext(&self) -> String {
        let header: Vec<String> = ["Step", "Stack", "Input", "Action"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows: Vec<Vec<String>> = std::iter::once(header)
            .chain(self.trace.iter().map(|s| {
                vec![
                    s.step.to_string(),
                    s.stack.join(" "),
                    s.input.join(" "),
                    s.action.to_string(),
                ]
            }))
            .collect();
        let verdict = if self.accepted {
            "accepted".to_string()
        } else {
            format!(
                "not accepted ({} sync, {} skip)",
                self.sync_points.len(),
                self.skip_points.len()
            )
        };
        align_columns(&rows) + "\n" + &verdict
    }

    pub fn to_latex(&self) -> String {
        let body = self
            .trace
            .iter()
            .map(|s| {
                format!(
                    "{} & {} & {} & {}",
                    s.step,
                    escape::tex(&s.stack.join(" ")),
                    escape::tex(&s.input.join(" ")),
                    tex_text(&s.action.to_string())
                )
            })
            .collect::<Vec<_>>()
            .join("\\\\\n");
        "\\begin{tabular}{r|l|r|l}\n".to_string()
            + "Step & Stack & Input & Action\\\\\\hline\n"
            + &body
            + "\\\\\n\\end{tabular}"
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl TreeNode {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Bracket tree for the `forest` package.
    pub fn to_latex(&self) -> String {
        "\\begin{forest}\n".to_string() + &self.forest_node() + "\n\\end{forest}"
    }

    fn forest_node(&self) -> String {
        let label = match self.kind {
            NodeKind::Epsilon => "$\\epsilon$".to_string(),
            NodeKind::Terminal => format!("\\text{{{}}}", escape::tex(&self.label)),
            NodeKind::NonTerminal => escape::tex(&self.label).to_string(),
        };
        let children: String = self
            .children
            .iter()
            .map(|c| " ".to_string() + &c.forest_node())
            .collect();
        format!("[{{{}}}{}]", label, children)
    }
}

impl Grammar {
    pub fn to_production_output_vec(&self) -> ProductionOutputVec {
        let productions = self
            .non_terminal_iter()
            .filter(|nt| !nt.productions.is_empty())
            .map(|nt| ProductionOutput {
                left: nt.name.as_str(),
                rights: nt
                    .productions
                    .iter()
                    .map(|p| self.production_to_vec_str(p))
                    .collect(),
            })
            .collect();
        ProductionOutputVec {
            productions,
            terminals: self.terminal_iter().map(|(_, t)| t).collect(),
        }
    }

    pub fn to_non_terminal_output_vec(&self) -> NonTerminalOutputVec {
        let data = self
            .non_terminal_iter()
            .map(|nt| {
                let mut first: Vec<&str> =
                    nt.first.iter().map(|&i| self.get_symbol_name(i)).collect();
                if nt.nullable {
                    first.push(EPSILON);
                }
                NonTerminalOutput {
                    name: nt.name.as_str(),
                    nullable: nt.nullable,
                    first,
                    follow: nt.follow.iter().map(|&i| self.get_symbol_name(i)).collect(),
                }
            })
            .collect();
        NonTerminalOutputVec { data }
    }

    fn cell_output(&self, cell: &TableCell) -> CellOutput {
        match cell {
            TableCell::Empty => CellOutput::Empty,
            TableCell::Sync => CellOutput::Sync,
            TableCell::Skip => CellOutput::Skip,
            TableCell::Productions(ids) => CellOutput::Production(
                ids.iter().map(|&id| self.production_to_string(id)).collect(),
            ),
        }
    }

    pub fn to_ll1_parsing_table(&self) -> LL1ParsingTable {
        let table = self.table();
        LL1ParsingTable {
            terminals: table
                .terminals()
                .iter()
                .map(|&t| self.get_symbol_name(t))
                .collect(),
            rows: table
                .rows()
                .map(|(nt, row)| {
                    (
                        self.get_symbol_name(nt),
                        row.iter().map(|c| self.cell_output(c)).collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn to_analysis(&self) -> Analysis {
        let table = self.table();
        let name = |i: &usize| self.get_symbol_name(*i).to_string();

        let mut first_sets = BTreeMap::new();
        let mut follow_sets = BTreeMap::new();
        for nt in self.non_terminal_iter() {
            let mut first: Vec<String> = nt.first.iter().map(name).collect();
            if nt.nullable {
                first.push(EPSILON.to_string());
            }
            first_sets.insert(nt.name.clone(), first);
            follow_sets.insert(nt.name.clone(), nt.follow.iter().map(name).collect());
        }

        let parse_table: BTreeMap<String, BTreeMap<String, CellOutput>> = table
            .rows()
            .map(|(nt, row)| {
                let cells: BTreeMap<String, CellOutput> = table
                    .terminals()
                    .iter()
                    .zip(row)
                    .map(|(t, c)| (name(t), self.cell_output(c)))
                    .collect();
                (name(&nt), cells)
            })
            .collect();

        let grammar = self
            .non_terminal_iter()
            .filter(|nt| !nt.productions.is_empty())
            .map(|nt| GroupedRule {
                lhs: nt.name.clone(),
                rhs: nt
                    .productions
                    .iter()
                    .map(|p| self.production_to_vec_str(p).join(" "))
                    .collect(),
            })
            .collect();

        Analysis {
            grammar,
            terminals: self.terminal_iter().map(|(_, t)| t.to_string()).collect(),
            non_terminals: self.non_terminal_iter().map(|nt| nt.name.clone()).collect(),
            first_sets,
            follow_sets,
            is_ll1: table.is_ll1(),
            conflicts: table
                .conflicts()
                .iter()
                .map(|c| ConflictOutput::new(c, self))
                .collect(),
            parse_table,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::{parse::parse_rules, Grammar, GrammarConfig};

    use super::CellOutput;
    use crate::grammar::{parse::tokenize, predictive_parser::ParseOptions};

    fn build(text: &str) -> Grammar {
        let config = GrammarConfig::default();
        Grammar::build(&parse_rules(text, &config).unwrap(), None, &config).unwrap()
    }

    #[test]
    fn productions_plaintext() {
        let g = build("S -> a S b | ε\nAB -> c");
        assert_eq!(
            g.to_production_output_vec().to_plaintext(),
            " S -> a S b\n    | ε\nAB -> c"
        );
    }

    #[test]
    fn analysis_projection() {
        let a = build("S -> a S b | ε").to_analysis();
        assert_eq!(a.terminals, vec!["a", "b", "$"]);
        assert_eq!(a.non_terminals, vec!["S"]);
        assert_eq!(a.first_sets["S"], vec!["a", "ε"]);
        assert_eq!(a.follow_sets["S"], vec!["b", "$"]);
        assert!(a.is_ll1);
        assert_eq!(
            a.parse_table["S"]["a"],
            CellOutput::Production(vec!["S -> a S b".to_string()])
        );
    }

    #[test]
    fn analysis_json_keys() {
        let json = build("A -> a | a b").to_analysis().to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["is_LL1"], false);
        assert_eq!(value["conflicts"][0]["type"], "FIRST/FIRST conflict");
        assert_eq!(value["conflicts"][0]["intersection"][0], "a");
        assert_eq!(value["parse_table"]["A"]["$"]["kind"], "sync");
        assert_eq!(value["parse_table"]["A"]["b"]["kind"], "skip");
    }

    #[test]
    fn ll1_table_plaintext_marks_recovery() {
        let text = build("S -> a").to_ll1_parsing_table().to_plaintext();
        assert_eq!(text, "  |      a |    $\nS | S -> a | sync");
    }

    #[test]
    fn non_terminal_summary_lists_epsilon() {
        let text = build("S -> a S b | ε").to_non_terminal_output_vec().to_plaintext();
        assert!(text.lines().nth(1).unwrap().contains("a, ε"));
    }

    #[test]
    fn analysis_echoes_grouped_grammar() {
        let json = build("S -> a S b\nS -> ε\nT -> c").to_analysis().to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["grammar"][0]["lhs"], "S");
        assert_eq!(value["grammar"][0]["rhs"][0], "a S b");
        assert_eq!(value["grammar"][0]["rhs"][1], "ε");
        assert_eq!(value["grammar"][1]["lhs"], "T");
    }

    #[test]
    fn conflicts_latex_tabular() {
        let a = build("A -> a | a b").to_analysis();
        let tex = a.conflicts_to_latex();
        assert!(tex.starts_with("\\begin{tabular}"));
        assert!(tex.contains("A & FIRST/FIRST conflict & A $\\rightarrow$ a, A $\\rightarrow$ a b & a & "));
        assert!(tex.ends_with("\\end{tabular}"));

        assert_eq!(build("S -> a").to_analysis().conflicts_to_latex(), "grammar is LL(1)");
    }

    #[test]
    fn conflicts_latex_escapes_epsilon_and_specials() {
        let tex = build("S -> A a_b\nA -> a_b | ε").to_analysis().conflicts_to_latex();
        assert!(tex.contains("A $\\rightarrow$ $\\epsilon$"));
        assert!(tex.contains("a\\_b"));
    }

    #[test]
    fn tree_latex_is_forest_bracket_tree() {
        let g = build("S -> a S b | ε");
        let run = g.run(&tokenize("a b"), &ParseOptions::default());
        assert_eq!(
            run.tree.to_latex(),
            "\\begin{forest}\n[{S} [{\\text{a}}] [{S} [{$\\epsilon$}]] [{\\text{b}}]]\n\\end{forest}"
        );
    }
}
