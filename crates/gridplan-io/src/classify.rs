//! Technology classification.
//!
//! Raw technology labels (`gas-cc`, `upv_7`, `battery_4`, ...) are mapped to
//! a [`TechnologyCategory`] and subtype by an ordered list of rules. The
//! first rule whose matcher accepts the trimmed, lowercased label wins, so
//! more specific rules must come first. Rule order is the only thing that
//! decides ties; nothing here iterates an unordered collection.

use std::sync::Arc;

use gridplan_core::{BuildError, BuildResult, TechnologyCategory};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::{BuildConfig, OverrideMode};

const DEFAULT_RULES: &str = include_str!("../data/technology_rules.yaml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Matcher {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationRule {
    pub category: TechnologyCategory,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(rename = "match")]
    pub matcher: Matcher,
}

impl ClassificationRule {
    pub fn new(category: TechnologyCategory, matcher: Matcher) -> Self {
        Self {
            category,
            subtype: None,
            matcher,
        }
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: TechnologyCategory,
    pub subtype: String,
}

impl Classification {
    /// Fallback used by tolerant builds.
    pub fn unclassified(label: &str) -> Self {
        Self {
            category: TechnologyCategory::Unclassified,
            subtype: normalize(label),
        }
    }
}

#[derive(Debug)]
enum CompiledMatcher {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(Regex),
}

impl CompiledMatcher {
    fn compile(matcher: &Matcher) -> BuildResult<Self> {
        Ok(match matcher {
            Matcher::Exact(s) => CompiledMatcher::Exact(normalize(s)),
            Matcher::Prefix(s) => CompiledMatcher::Prefix(normalize(s)),
            Matcher::Suffix(s) => CompiledMatcher::Suffix(normalize(s)),
            Matcher::Contains(s) => CompiledMatcher::Contains(normalize(s)),
            Matcher::Regex(pattern) => CompiledMatcher::Regex(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        BuildError::Config(format!("invalid classification regex '{pattern}': {e}"))
                    })?,
            ),
        })
    }

    fn is_match(&self, label: &str) -> bool {
        match self {
            CompiledMatcher::Exact(s) => label == s,
            CompiledMatcher::Prefix(s) => label.starts_with(s.as_str()),
            CompiledMatcher::Suffix(s) => label.ends_with(s.as_str()),
            CompiledMatcher::Contains(s) => label.contains(s.as_str()),
            CompiledMatcher::Regex(re) => re.is_match(label),
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    category: TechnologyCategory,
    subtype: Option<String>,
    matcher: CompiledMatcher,
}

/// Immutable, ordered rule list shared by a build.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Arc<[CompiledRule]>,
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

impl RuleSet {
    pub fn new(rules: &[ClassificationRule]) -> BuildResult<Self> {
        let compiled = rules
            .iter()
            .map(|rule| {
                if rule.category == TechnologyCategory::Unclassified {
                    return Err(BuildError::Config(
                        "classification rules cannot target 'unclassified'".into(),
                    ));
                }
                Ok(CompiledRule {
                    category: rule.category,
                    subtype: rule.subtype.as_deref().map(normalize),
                    matcher: CompiledMatcher::compile(&rule.matcher)?,
                })
            })
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(Self {
            rules: compiled.into(),
        })
    }

    /// Rules bundled with the crate.
    pub fn default_rules() -> BuildResult<Vec<ClassificationRule>> {
        serde_yaml::from_str(DEFAULT_RULES)
            .map_err(|e| BuildError::Config(format!("bundled technology rules: {e}")))
    }

    /// Defaults combined with any rules the configuration adds or substitutes.
    pub fn from_config(config: &BuildConfig) -> BuildResult<Self> {
        let defaults = Self::default_rules()?;
        let rules = match &config.classification_rules {
            None => defaults,
            Some(over) => match over.mode {
                OverrideMode::Replace => over.rules.clone(),
                OverrideMode::Extend => over.rules.iter().cloned().chain(defaults).collect(),
            },
        };
        Self::new(&rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First matching rule's category and subtype.
    pub fn classify(&self, label: &str) -> Option<Classification> {
        let label = normalize(label);
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_match(&label))
            .map(|rule| Classification {
                category: rule.category,
                subtype: rule.subtype.clone().unwrap_or_else(|| label.clone()),
            })
    }

    /// Every category whose rules match `label`, in rule order, without repeats.
    pub fn matches(&self, label: &str) -> Vec<TechnologyCategory> {
        let label = normalize(label);
        let mut found = Vec::new();
        for rule in self.rules.iter().filter(|r| r.matcher.is_match(&label)) {
            if !found.contains(&rule.category) {
                found.push(rule.category);
            }
        }
        found
    }
}
