//! Parameter allow-list.
//!
//! # Responsibilities
//! - Compile configured rules into anchored matchers at startup
//! - Decide whether a resolved parameter set may be proxied
//!
//! # Design Decisions
//! - OR of rules, AND within a rule
//! - Empty allow-list = allow everything
//! - `*` matches any run of characters (including `/`); everything else is
//!   literal. A pattern written as `/.../` is a regular expression instead.
//! - Both forms are anchored at start and end
//! - No per-request compilation

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::ConfigurationError;
use crate::routing::ParameterSet;

/// Compiled matcher for one parameter value.
#[derive(Debug, Clone)]
pub struct ValueMatcher {
    source: String,
    regex: Regex,
}

impl ValueMatcher {
    /// Compile a wildcard (or `/regex/`) pattern.
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let body = match pattern.strip_prefix('/').and_then(|p| p.strip_suffix('/')) {
            Some(raw) => format!("(?:{})", raw),
            None => pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*"),
        };
        let regex = Regex::new(&format!("(?s)^{}$", body))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A conjunction of per-parameter constraints.
#[derive(Debug, Clone)]
pub struct AllowRule {
    constraints: Vec<(String, ValueMatcher)>,
}

impl AllowRule {
    /// Every constrained parameter must be present and match.
    pub fn matches(&self, params: &ParameterSet) -> bool {
        self.constraints.iter().all(|(name, matcher)| {
            params
                .get(name)
                .map(|value| matcher.is_match(value))
                .unwrap_or(false)
        })
    }
}

/// The full allow-list.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    rules: Vec<AllowRule>,
}

impl AllowList {
    /// Compile the `allowed_params` config entries.
    pub fn compile(rules: &[BTreeMap<String, String>]) -> Result<Self, ConfigurationError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let mut constraints = Vec::with_capacity(rule.len());
            for (param, pattern) in rule {
                let matcher = ValueMatcher::compile(pattern).map_err(|e| {
                    ConfigurationError::AllowPattern {
                        param: param.clone(),
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    }
                })?;
                constraints.push((param.clone(), matcher));
            }
            compiled.push(AllowRule { constraints });
        }
        Ok(Self { rules: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_allowed(&self, params: &ParameterSet) -> bool {
        self.rules.is_empty() || self.rules.iter().any(|rule| rule.matches(params))
    }
}
