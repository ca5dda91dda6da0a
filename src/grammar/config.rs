use serde::{Deserialize, Serialize};

use super::{EPSILON, EPSILON_ALIAS};

/// How right-hand-side tokens that never appear as a left-hand side are
/// classified. Left-hand sides are always nonterminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolConvention {
    /// `E`, `T'`, `EXPR` are nonterminals; `id`, `+`, `Expr` are not.
    #[default]
    Uppercase,
    /// Only declared left-hand sides are nonterminals.
    Declared,
}

impl SymbolConvention {
    pub fn is_non_terminal(&self, name: &str) -> bool {
        match self {
            SymbolConvention::Uppercase => {
                name.chars().any(|c| c.is_uppercase()) && !name.chars().any(|c| c.is_lowercase())
            }
            SymbolConvention::Declared => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub convention: SymbolConvention,
    /// Placeholder written for an empty alternative.
    pub epsilon: String,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            convention: SymbolConvention::default(),
            epsilon: EPSILON.to_string(),
        }
    }
}

impl GrammarConfig {
    pub fn is_epsilon(&self, token: &str) -> bool {
        token == self.epsilon || token == EPSILON || token == EPSILON_ALIAS
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
