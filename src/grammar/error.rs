use thiserror::Error;

/// Errors that stop a grammar from being built. No partial grammar is
/// produced when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("no rules supplied")]
    NoRules,
    /// `line` is the source line when the rule came from text, otherwise
    /// the rule's 1-based position.
    #[error("line {line} ({left}): {reason}")]
    MalformedRule {
        line: usize,
        left: String,
        reason: String,
    },
    #[error("start symbol `{0}` has no rule")]
    UnknownStartSymbol(String),
}

impl BuildError {
    pub(crate) fn malformed(line: usize, left: &str, reason: impl Into<String>) -> Self {
        BuildError::MalformedRule {
            line,
            left: left.to_string(),
            reason: reason.into(),
        }
    }
}
