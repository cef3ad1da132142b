//! Ordered keyword rules mapping transaction descriptions to categories.
//!
//! Rules are evaluated in declaration order and the first rule with a
//! keyword contained in the lowercased description wins. Order is part of
//! the contract, so rule files are JSON arrays, never maps.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CycleError, Result};

/// Category used when no rule matches.
pub const DEFAULT_CATEGORY: &str = "Other";

/// One category and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new<I, S>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// `true` when any keyword is a substring of the already-lowercased text.
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|kw| lowered.contains(kw.as_str()))
    }
}

/// On-disk shape of a rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default = "default_category")]
    pub default_category: String,
    pub rules: Vec<CategoryRule>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// A validated, ordered rule list plus its fallback category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    rules: Vec<CategoryRule>,
    default_category: String,
}

impl RuleSet {
    /// Validate and normalise `rules`.
    ///
    /// Keywords are trimmed and lowercased; blank keywords are discarded. An
    /// empty list, or a rule left with no keywords, is rejected.
    pub fn new(rules: Vec<CategoryRule>, default_category: impl Into<String>) -> Result<Self> {
        if rules.is_empty() {
            return Err(CycleError::EmptyRuleSet);
        }

        let rules = rules
            .into_iter()
            .map(|rule| {
                let keywords: Vec<String> = rule
                    .keywords
                    .iter()
                    .map(|kw| kw.trim().to_lowercase())
                    .filter(|kw| !kw.is_empty())
                    .collect();
                if keywords.is_empty() {
                    return Err(CycleError::EmptyRule(rule.name));
                }
                Ok(CategoryRule {
                    name: rule.name,
                    keywords,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            default_category: default_category.into(),
        })
    }

    /// Rules for Brazilian bank statements, in priority order.
    pub fn builtin() -> Self {
        let rules = vec![
            CategoryRule::new(
                "Alimentação",
                [
                    "restaurante",
                    "lanchonete",
                    "padaria",
                    "supermercado",
                    "mercado",
                    "ifood",
                    "comida",
                ],
            ),
            CategoryRule::new(
                "Transporte",
                ["uber", "taxi", "combustivel", "posto", "gasolina", "metro"],
            ),
            CategoryRule::new(
                "Lazer",
                ["cinema", "teatro", "show", "netflix", "spotify", "amazon", "shopee"],
            ),
            CategoryRule::new("Saque", ["saque dinheiro banco 24h"]),
            CategoryRule::new(
                "Serviços/Contas",
                ["tarifa", "servico", "agua", "energia", "net", "pix enviado"],
            ),
            CategoryRule::new("Educação", ["escola", "curso", "livro"]),
            CategoryRule::new("Remuneração", ["salario", "credito de", "remuneracao"]),
        ];
        Self {
            rules,
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }

    /// Parse a JSON rule file body.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: RuleFile = serde_json::from_str(json)?;
        Self::new(file.rules, file.default_category)
    }

    /// Load a JSON rule file from disk.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CycleError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::from_json_str(&content)?;
        tracing::debug!(
            "Loaded {} category rules from {}",
            rules.rules.len(),
            path.display()
        );
        Ok(rules)
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    /// Category of `description`: the first matching rule, else the default.
    ///
    /// Never fails; an empty description simply matches nothing.
    pub fn classify(&self, description: &str) -> &str {
        let lowered = description.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.name.as_str())
            .unwrap_or(&self.default_category)
    }
}
