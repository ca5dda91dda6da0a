use std::collections::BTreeSet;

use log::debug;

use super::{grammar::Symbol, Grammar, ProductionId};

impl Grammar {
    pub(super) fn calculate_nullable_first_follow(&mut self) {
        let (start, end_mark) = (self.start_symbol, self.end_mark);
        if let Some(start) = self.symbols[start].mut_non_terminal() {
            start.follow.insert(end_mark);
        }

        let mut passes = 1;
        while self.first_pass() {
            passes += 1;
        }
        debug!("FIRST sets converged after {} passes", passes);

        let mut passes = 1;
        while self.follow_pass() {
            passes += 1;
        }
        debug!("FOLLOW sets converged after {} passes", passes);
    }

    /// FIRST of a symbol sequence and whether the whole sequence can vanish.
    /// The empty sequence is nullable with an empty FIRST set.
    pub fn first_of_sequence(&self, sequence: &[usize]) -> (BTreeSet<usize>, bool) {
        let mut first = BTreeSet::new();
        for &idx in sequence {
            match &self.symbols[idx] {
                Symbol::Terminal(_) => {
                    first.insert(idx);
                    return (first, false);
                }
                Symbol::NonTerminal(nt) => {
                    first.extend(nt.first.iter().cloned());
                    if !nt.nullable {
                        return (first, false);
                    }
                }
            }
        }
        (first, true)
    }

    pub fn first_of_symbol(&self, index: usize) -> (BTreeSet<usize>, bool) {
        self.first_of_sequence(std::slice::from_ref(&index))
    }

    pub fn first_of_production(&self, id: ProductionId) -> (BTreeSet<usize>, bool) {
        self.first_of_sequence(self.production(id))
    }

    /// One relaxation over every nonterminal. Returns whether any FIRST set
    /// or nullable flag grew.
    pub(super) fn first_pass(&mut self) -> bool {
        let mut changed = false;
        for i in 0..self.symbols.len() {
            let (first, nullable) = match &self.symbols[i] {
                Symbol::Terminal(_) => continue,
                Symbol::NonTerminal(nt) => nt.productions.iter().fold(
                    (BTreeSet::new(), false),
                    |(mut first, nullable), production| {
                        let (f, n) = self.first_of_sequence(production);
                        first.extend(f);
                        (first, nullable || n)
                    },
                ),
            };

            if let Some(nt) = self.symbols[i].mut_non_terminal() {
                if nt.first != first || nt.nullable != nullable {
                    nt.first = first;
                    nt.nullable = nullable;
                    changed = true;
                }
            }
        }
        changed
    }

    /// One relaxation of every `L -> ... B γ` context. Returns whether any
    /// FOLLOW set grew.
    pub(super) fn follow_pass(&mut self) -> bool {
        let mut additions: Vec<(usize, BTreeSet<usize>)> = Vec::new();
        for left in self.non_terminal_iter() {
            for production in &left.productions {
                for (i, &idx) in production.iter().enumerate() {
                    if self.is_terminal(idx) {
                        continue;
                    }
                    let (mut follow, nullable) = self.first_of_sequence(&production[i + 1..]);
                    if nullable {
                        follow.extend(left.follow.iter().cloned());
                    }
                    additions.push((idx, follow));
                }
            }
        }

        let mut changed = false;
        for (idx, follow) in additions {
            if let Some(nt) = self.symbols[idx].mut_non_terminal() {
                let before = nt.follow.len();
                nt.follow.extend(follow);
                changed |= nt.follow.len() != before;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::{parse::parse_rules, Grammar, GrammarConfig};

    fn build(text: &str) -> Grammar {
        let config = GrammarConfig::default();
        Grammar::build(&parse_rules(text, &config).unwrap(), None, &config).unwrap()
    }

    fn names(g: &Grammar, set: &std::collections::BTreeSet<usize>) -> Vec<String> {
        let mut v: Vec<String> = set.iter().map(|&i| g.get_symbol_name(i).to_string()).collect();
        v.sort();
        v
    }

    const EXPR: &str = "E -> T E'
E' -> + T E' | ε
T -> F T'
T' -> * F T' | ε
F -> ( E ) | id";

    #[test]
    fn expression_grammar_first() {
        let g = build(EXPR);
        for (name, expected, nullable) in [
            ("E", vec!["(", "id"], false),
            ("E'", vec!["+"], true),
            ("T", vec!["(", "id"], false),
            ("T'", vec!["*"], true),
            ("F", vec!["(", "id"], false),
        ] {
            let nt = g.non_terminal(g.get_symbol_index(name).unwrap()).unwrap();
            assert_eq!(names(&g, &nt.first), expected, "FIRST({})", name);
            assert_eq!(nt.nullable, nullable, "nullable({})", name);
        }
    }

    #[test]
    fn expression_grammar_follow() {
        let g = build(EXPR);
        for (name, expected) in [
            ("E", vec!["$", ")"]),
            ("E'", vec!["$", ")"]),
            ("T", vec!["$", ")", "+"]),
            ("T'", vec!["$", ")", "+"]),
            ("F", vec!["$", ")", "*", "+"]),
        ] {
            let nt = g.non_terminal(g.get_symbol_index(name).unwrap()).unwrap();
            assert_eq!(names(&g, &nt.follow), expected, "FOLLOW({})", name);
        }
    }

    #[test]
    fn terminal_first_is_itself() {
        let g = build(EXPR);
        for (idx, _) in g.terminal_iter() {
            let (first, nullable) = g.first_of_symbol(idx);
            assert_eq!(first.into_iter().collect::<Vec<_>>(), vec![idx]);
            assert!(!nullable);
        }
    }

    #[test]
    fn mutual_recursion_converges() {
        let g = build("A -> B x | a\nB -> A y | b | ε");
        let a = g.non_terminal(g.get_symbol_index("A").unwrap()).unwrap();
        let b = g.non_terminal(g.get_symbol_index("B").unwrap()).unwrap();
        assert_eq!(names(&g, &a.first), vec!["a", "b", "x"]);
        assert_eq!(names(&g, &b.first), vec!["a", "b", "x"]);
        assert!(!a.nullable);
        assert!(b.nullable);
    }

    #[test]
    fn left_recursion_converges() {
        let g = build("E -> E + id | id");
        let e = g.non_terminal(g.start_symbol()).unwrap();
        assert_eq!(names(&g, &e.first), vec!["id"]);
        assert_eq!(names(&g, &e.follow), vec!["$", "+"]);
    }

    #[test]
    fn fixed_point_is_idempotent() {
        let mut g = build(EXPR);
        assert!(!g.first_pass());
        assert!(!g.follow_pass());
    }

    #[test]
    fn nullable_through_chain() {
        let g = build("S -> A B c\nA -> ε\nB -> A");
        let (first, nullable) = g.first_of_production(crate::grammar::ProductionId {
            left: g.start_symbol(),
            alt: 0,
        });
        assert_eq!(names(&g, &first), vec!["c"]);
        assert!(!nullable);
        let b = g.non_terminal(g.get_symbol_index("B").unwrap()).unwrap();
        assert!(b.nullable);
        assert_eq!(names(&g, &b.follow), vec!["c"]);
    }

    #[test]
    fn unreachable_non_terminal_keeps_empty_follow() {
        let g = build("S -> a\nU -> b");
        let u = g.non_terminal(g.get_symbol_index("U").unwrap()).unwrap();
        assert!(u.follow.is_empty());
        assert_eq!(names(&g, &u.first), vec!["b"]);
    }
}
