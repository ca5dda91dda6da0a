use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};
use serde::Serialize;

use super::{Grammar, ProductionId};

/// One cell of the LL(1) table. Empty cells are turned into one of the two
/// recovery markers once the table is built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TableCell {
    #[default]
    Empty,
    /// Pop the nonterminal without consuming input.
    Sync,
    /// Discard the lookahead token and retry the nonterminal.
    Skip,
    /// More than one production means the cell is a conflict.
    Productions(Vec<ProductionId>),
}

impl TableCell {
    fn push(&mut self, id: ProductionId) {
        match self {
            TableCell::Productions(ids) => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            _ => *self = TableCell::Productions(vec![id]),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, TableCell::Productions(ids) if ids.len() > 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictKind {
    #[serde(rename = "FIRST/FIRST conflict")]
    FirstFirst,
    #[serde(rename = "FIRST/FOLLOW conflict")]
    FirstFollow,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::FirstFirst => write!(f, "FIRST/FIRST conflict"),
            ConflictKind::FirstFollow => write!(f, "FIRST/FOLLOW conflict"),
        }
    }
}

/// Two productions of one nonterminal competing for the same lookahead
/// terminals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub non_terminal: usize,
    pub productions: (ProductionId, ProductionId),
    pub intersection: BTreeSet<usize>,
}

impl Conflict {
    pub fn suggestion(&self, g: &Grammar) -> String {
        let left = g.get_symbol_name(self.non_terminal);
        let terminals = self
            .intersection
            .iter()
            .map(|&t| g.get_symbol_name(t))
            .collect::<Vec<_>>()
            .join(", ");
        match self.kind {
            ConflictKind::FirstFirst => format!(
                "left-factor the alternatives `{}` and `{}`: both can start with {{{}}}, \
                 move the common prefix into {} and the remainders into a new nonterminal",
                g.production_to_string(self.productions.0),
                g.production_to_string(self.productions.1),
                terminals,
                left
            ),
            ConflictKind::FirstFollow => format!(
                "{} can derive ε while {{{}}} may also follow it; rewrite {} so that \
                 FIRST of its alternatives and FOLLOW({}) are disjoint",
                left, terminals, left, left
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseTable {
    terminals: Vec<usize>,
    columns: HashMap<usize, usize>,
    rows: Vec<(usize, Vec<TableCell>)>,
    row_of: HashMap<usize, usize>,
    conflicts: Vec<Conflict>,
}

impl ParseTable {
    /// Terminal symbols in column order, `$` last.
    pub fn terminals(&self) -> &[usize] {
        &self.terminals
    }

    pub fn rows(&self) -> impl Iterator<Item = (usize, &[TableCell])> {
        self.rows.iter().map(|(nt, row)| (*nt, row.as_slice()))
    }

    pub fn has_row(&self, non_terminal: usize) -> bool {
        self.row_of.contains_key(&non_terminal)
    }

    pub fn cell(&self, non_terminal: usize, terminal: usize) -> Option<&TableCell> {
        let row = self.row_of.get(&non_terminal)?;
        let col = self.columns.get(&terminal)?;
        self.rows[*row].1.get(*col)
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn is_ll1(&self) -> bool {
        self.rows
            .iter()
            .all(|(_, row)| row.iter().all(|cell| !cell.is_conflict()))
    }
}

impl Grammar {
    pub(super) fn generate_ll1_parsing_table(&self) -> ParseTable {
        let terminals: Vec<usize> = self.terminal_iter().map(|(idx, _)| idx).collect();
        let columns: HashMap<usize, usize> = terminals
            .iter()
            .enumerate()
            .map(|(col, &idx)| (idx, col))
            .collect();

        let mut rows: Vec<(usize, Vec<TableCell>)> = Vec::new();
        for nt in self.non_terminal_iter() {
            let mut row = vec![TableCell::Empty; terminals.len()];
            for alt in 0..nt.productions.len() {
                let id = ProductionId {
                    left: nt.index,
                    alt,
                };
                let (first, nullable) = self.first_of_production(id);
                for col in first.iter().map(|idx| columns[idx]) {
                    row[col].push(id);
                }
                if nullable {
                    for col in nt.follow.iter().map(|idx| columns[idx]) {
                        row[col].push(id);
                    }
                }
            }
            rows.push((nt.index, row));
        }

        let conflicts = self.detect_conflicts(&terminals, &rows);
        for c in &conflicts {
            warn!(
                "{} on {}: {} / {}",
                c.kind,
                self.get_symbol_name(c.non_terminal),
                self.production_to_string(c.productions.0),
                self.production_to_string(c.productions.1)
            );
        }

        for (nt, row) in rows.iter_mut() {
            let Some(nt) = self.non_terminal(*nt) else {
                continue;
            };
            for (col, cell) in row.iter_mut().enumerate() {
                if *cell == TableCell::Empty {
                    let t = terminals[col];
                    *cell = if t == self.end_mark || nt.follow.contains(&t) {
                        TableCell::Sync
                    } else {
                        TableCell::Skip
                    };
                }
            }
        }

        debug!(
            "LL(1) table built: {} rows x {} columns, {} conflicts",
            rows.len(),
            terminals.len(),
            conflicts.len()
        );

        let row_of = rows
            .iter()
            .enumerate()
            .map(|(i, (nt, _))| (*nt, i))
            .collect();
        ParseTable {
            terminals,
            columns,
            rows,
            row_of,
            conflicts,
        }
    }

    /// Groups every pair of productions sharing a cell by kind: terminals
    /// both productions can start with are FIRST/FIRST, the rest can only
    /// come from FOLLOW through a nullable production.
    fn detect_conflicts(
        &self,
        terminals: &[usize],
        rows: &[(usize, Vec<TableCell>)],
    ) -> Vec<Conflict> {
        let mut conflicts: Vec<Conflict> = Vec::new();
        for (nt, row) in rows {
            for (col, cell) in row.iter().enumerate() {
                let TableCell::Productions(ids) = cell else {
                    continue;
                };
                let t = terminals[col];
                for (i, &p) in ids.iter().enumerate() {
                    for &q in &ids[i + 1..] {
                        let kind = if self.first_of_production(p).0.contains(&t)
                            && self.first_of_production(q).0.contains(&t)
                        {
                            ConflictKind::FirstFirst
                        } else {
                            ConflictKind::FirstFollow
                        };
                        match conflicts
                            .iter_mut()
                            .find(|c| c.kind == kind && c.productions == (p, q))
                        {
                            Some(c) => {
                                c.intersection.insert(t);
                            }
                            None => conflicts.push(Conflict {
                                kind,
                                non_terminal: *nt,
                                productions: (p, q),
                                intersection: BTreeSet::from([t]),
                            }),
                        }
                    }
                }
            }
        }
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{parse::parse_rules, GrammarConfig};

    fn build(text: &str) -> Grammar {
        let config = GrammarConfig::default();
        Grammar::build(&parse_rules(text, &config).unwrap(), None, &config).unwrap()
    }

    fn cell<'a>(g: &'a Grammar, nt: &str, t: &str) -> &'a TableCell {
        g.table()
            .cell(
                g.get_symbol_index(nt).unwrap(),
                g.get_symbol_index(t).unwrap(),
            )
            .unwrap()
    }

    fn names(g: &Grammar, set: &BTreeSet<usize>) -> Vec<String> {
        set.iter().map(|&i| g.get_symbol_name(i).to_string()).collect()
    }

    #[test]
    fn balanced_grammar_table() {
        let g = build("S -> a S b | ε");
        let s = g.start_symbol();
        assert!(g.table().is_ll1());
        assert!(g.table().conflicts().is_empty());
        assert_eq!(
            cell(&g, "S", "a"),
            &TableCell::Productions(vec![ProductionId { left: s, alt: 0 }])
        );
        assert_eq!(
            cell(&g, "S", "b"),
            &TableCell::Productions(vec![ProductionId { left: s, alt: 1 }])
        );
        assert_eq!(
            cell(&g, "S", "$"),
            &TableCell::Productions(vec![ProductionId { left: s, alt: 1 }])
        );
    }

    #[test]
    fn first_first_conflict() {
        let g = build("A -> a | a b");
        assert!(!g.table().is_ll1());
        let conflicts = g.table().conflicts();
        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.kind, ConflictKind::FirstFirst);
        assert_eq!(g.get_symbol_name(c.non_terminal), "A");
        assert_eq!(names(&g, &c.intersection), vec!["a"]);
        assert_eq!(g.production_to_string(c.productions.0), "A -> a");
        assert_eq!(g.production_to_string(c.productions.1), "A -> a b");
        assert!(c.suggestion(&g).contains("left-factor"));
    }

    #[test]
    fn first_follow_conflict() {
        let g = build("S -> A a\nA -> a | ε");
        assert!(!g.table().is_ll1());
        let conflicts = g.table().conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::FirstFollow);
        assert_eq!(g.get_symbol_name(conflicts[0].non_terminal), "A");
        assert_eq!(names(&g, &conflicts[0].intersection), vec!["a"]);
        assert_eq!(g.production_to_string(conflicts[0].productions.1), "A -> ε");
        assert!(cell(&g, "A", "a").is_conflict());
    }

    #[test]
    fn recovery_markers() {
        let g = build("S -> A b\nA -> a");
        // b is in FOLLOW(A); $ always syncs
        assert_eq!(cell(&g, "A", "b"), &TableCell::Sync);
        assert_eq!(cell(&g, "A", "$"), &TableCell::Sync);
        assert_eq!(cell(&g, "S", "b"), &TableCell::Skip);
        assert_eq!(cell(&g, "S", "$"), &TableCell::Sync);
        for (_, row) in g.table().rows() {
            assert!(row.iter().all(|c| *c != TableCell::Empty));
        }
    }

    #[test]
    fn no_alternatives_no_epsilon_is_ll1() {
        let g = build("S -> A B\nA -> a C\nB -> b\nC -> c");
        assert!(g.table().is_ll1());
    }

    #[test]
    fn nullable_alternative_in_first_and_follow_is_not_duplicated() {
        let g = build("S -> A b\nA -> B\nB -> b | ε");
        let a = cell(&g, "A", "b");
        assert_eq!(
            a,
            &TableCell::Productions(vec![ProductionId {
                left: g.get_symbol_index("A").unwrap(),
                alt: 0
            }])
        );
        // the real conflict lives on B
        assert!(cell(&g, "B", "b").is_conflict());
    }
}
