use super::{BuildError, GrammarConfig, Rule};

/// Reads rules written as `LHS -> ALT1 | ALT2`, one per line. A line that
/// starts with `|` adds alternatives to the previous rule.
pub fn parse_rules(grammar: &str, config: &GrammarConfig) -> Result<Vec<Rule>, BuildError> {
    let mut rules: Vec<Rule> = Vec::new();

    for (i, line) in grammar.lines().enumerate() {
        if line.chars().all(|c| c.is_whitespace()) {
            continue;
        }
        let line_no = i + 1;
        let parts: Vec<&str> = line.split("->").collect();
        if parts.len() > 2 {
            return Err(BuildError::malformed(line_no, "", "too many \"->\""));
        }

        let rights = if parts.len() == 2 {
            let left = parts[0].trim();
            if left.is_empty() {
                return Err(BuildError::malformed(line_no, left, "empty left side"));
            }
            if left.split_whitespace().count() != 1 {
                return Err(BuildError::malformed(
                    line_no,
                    left,
                    "left side contains whitespace",
                ));
            }
            rules.push(Rule::new(left, Vec::new()));
            parts[1]
        } else {
            match (parts[0].trim().strip_prefix('|'), rules.is_empty()) {
                (Some(rest), false) => rest,
                _ => {
                    return Err(BuildError::malformed(
                        line_no,
                        "",
                        "cannot find left side",
                    ))
                }
            }
        };

        let Some(rule) = rules.last_mut() else {
            continue;
        };
        for right in rights.split('|') {
            let symbols: Vec<String> = right.split_whitespace().map(str::to_string).collect();
            if symbols.is_empty() {
                return Err(BuildError::malformed(
                    line_no,
                    &rule.left,
                    format!("empty alternative, write {} for the empty string", config.epsilon),
                ));
            }
            rule.alternatives.push(symbols);
            rule.lines.push(line_no);
        }
    }

    Ok(rules)
}

/// Splits an input string into the tokens the parser consumes.
pub fn tokenize(input: &str) -> Vec<&str> {
    input.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<Rule>, BuildError> {
        parse_rules(text, &GrammarConfig::default())
    }

    #[test]
    fn simple_parse() {
        let rules = parse("S -> a").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].left, "S");
        assert_eq!(rules[0].alternatives, vec![vec!["a".to_string()]]);
        assert_eq!(rules[0].lines, vec![1]);
    }

    #[test]
    fn simple_parse_with_space_and_newline() {
        let rules = parse("  S -> a \n | b c").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].alternatives,
            vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]]
        );
        assert_eq!(rules[0].lines, vec![1, 2]);
    }

    #[test]
    fn epsilon_alternative_is_kept_verbatim() {
        let rules = parse("S -> a S b | ε").unwrap();
        assert_eq!(rules[0].alternatives[1], vec!["ε".to_string()]);
    }

    #[test]
    fn empty_parse() {
        assert!(parse("  \n  ").unwrap().is_empty());
    }

    #[test]
    fn two_rightarrows_parse() {
        assert!(matches!(
            parse("S -> a -> b"),
            Err(BuildError::MalformedRule { line: 1, .. })
        ));
    }

    #[test]
    fn no_left_parse() {
        assert!(parse("-> a").is_err());
    }

    #[test]
    fn no_previous_left_parse() {
        assert!(matches!(
            parse("| a b\n S -> a"),
            Err(BuildError::MalformedRule { line: 1, .. })
        ));
    }

    #[test]
    fn left_contain_space() {
        assert!(parse("S a S -> x").is_err());
    }

    #[test]
    fn empty_alternative_reports_line() {
        assert!(matches!(
            parse("S -> a\nA -> b | "),
            Err(BuildError::MalformedRule { line: 2, .. })
        ));
    }

    #[test]
    fn tokenize_splits_on_whitespace() {
        assert_eq!(tokenize(" a  a\tb "), vec!["a", "a", "b"]);
    }
}
