//! Pattern registry: named upstream URL templates.
//!
//! # Responsibilities
//! - Parse `name=template` entries (or a single template) from config
//! - Strip and parse the inline `|cache:<seconds>` annotation
//! - Extract placeholders once, at startup
//! - Reject templates that can never be resolved in the configured mode
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - Templates are pre-split into literal and slot parts so building a URL
//!   never re-scans the template
//! - Route names double as cache namespaces, so they must be filesystem-safe

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RoutesConfig;
use crate::error::ConfigurationError;

/// Route name used when a single template is configured.
pub const DEFAULT_ROUTE: &str = "default";

/// Key suffix marking a capture slot in NAMED mode.
pub const CAPTURE_SUFFIX: &str = "-last";

const CACHE_ANNOTATION: &str = "|cache:";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z0-9_]+)(-last)?\}").expect("placeholder pattern is valid")
});

/// How request path segments are turned into parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterMode {
    /// `/key/value/key/value/...`
    #[default]
    Named,
    /// `/value1/value2/...` mapped onto `{1}`, `{2}`, ...
    Positional,
}

/// A `{name}` slot in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Name with any capture suffix removed.
    pub name: String,
    /// Written as `{name-last}` in the template.
    pub capture: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum TemplatePart {
    Literal(String),
    Slot(String),
}

/// One configured upstream route.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    name: String,
    template: String,
    parts: Vec<TemplatePart>,
    placeholders: Vec<Placeholder>,
    cache_ttl_secs: u64,
    max_index: Option<usize>,
}

impl RoutePattern {
    /// Parse a raw template (possibly carrying a cache annotation) for `name`.
    pub fn parse(name: &str, raw: &str, mode: ParameterMode) -> Result<Self, ConfigurationError> {
        validate_route_name(name)?;

        let (template, cache_ttl_secs) = match raw.rsplit_once(CACHE_ANNOTATION) {
            Some((template, secs)) => {
                // Expiry is tracked in epoch milliseconds.
                let ttl = secs
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|s| s.checked_mul(1000).is_some())
                    .ok_or_else(|| ConfigurationError::CacheAnnotation {
                        route: name.to_string(),
                        annotation: format!("{}{}", CACHE_ANNOTATION, secs),
                    })?;
                (template.trim(), ttl)
            }
            None => (raw.trim(), 0),
        };

        if template.is_empty() {
            return Err(template_error(name, "template is empty"));
        }

        let mut parts = Vec::new();
        let mut placeholders = Vec::new();
        let mut cursor = 0;
        for caps in PLACEHOLDER.captures_iter(template) {
            let whole = caps.get(0).expect("group 0 always matches");
            if whole.start() > cursor {
                parts.push(TemplatePart::Literal(template[cursor..whole.start()].to_string()));
            }
            let placeholder = Placeholder {
                name: caps[1].to_string(),
                capture: caps.get(2).is_some(),
            };
            parts.push(TemplatePart::Slot(placeholder.name.clone()));
            placeholders.push(placeholder);
            cursor = whole.end();
        }
        if cursor < template.len() {
            parts.push(TemplatePart::Literal(template[cursor..].to_string()));
        }

        let max_index = match mode {
            ParameterMode::Named => None,
            ParameterMode::Positional => Some(positional_max_index(name, &placeholders)?),
        };

        let pattern = Self {
            name: name.to_string(),
            template: template.to_string(),
            parts,
            placeholders,
            cache_ttl_secs,
            max_index,
        };
        pattern.check_url_shape()?;
        Ok(pattern)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template with the cache annotation removed.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder occurrences in template order.
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Distinct placeholder names in first-occurrence order.
    pub fn required_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.placeholders.len());
        for p in &self.placeholders {
            if !names.contains(&p.name.as_str()) {
                names.push(&p.name);
            }
        }
        names
    }

    pub fn cache_ttl_secs(&self) -> u64 {
        self.cache_ttl_secs
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_ttl_secs > 0
    }

    /// Highest `{N}` referenced by the template (POSITIONAL mode only).
    pub fn max_index(&self) -> Option<usize> {
        self.max_index
    }

    pub(crate) fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// The template with every slot filled must be an absolute http(s) URL.
    fn check_url_shape(&self) -> Result<(), ConfigurationError> {
        let sample: String = self
            .parts
            .iter()
            .map(|part| match part {
                TemplatePart::Literal(text) => text.as_str(),
                TemplatePart::Slot(_) => "x",
            })
            .collect();

        let parsed = url::Url::parse(&sample)
            .map_err(|e| template_error(&self.name, &format!("not a valid URL: {}", e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(template_error(
                &self.name,
                &format!("unsupported scheme '{}'", other),
            )),
        }
    }
}

fn positional_max_index(route: &str, placeholders: &[Placeholder]) -> Result<usize, ConfigurationError> {
    let mut max = 0;
    for p in placeholders {
        let index = match p.name.parse::<usize>() {
            Ok(i) if i > 0 && !p.capture => i,
            _ => {
                return Err(template_error(
                    route,
                    &format!("placeholder '{{{}}}' is not a positive index", p.name),
                ))
            }
        };
        max = max.max(index);
    }
    if max == 0 {
        return Err(template_error(
            route,
            "positional mode requires at least one numeric placeholder",
        ));
    }
    Ok(max)
}

fn validate_route_name(name: &str) -> Result<(), ConfigurationError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidRouteName(name.to_string()))
    }
}

fn template_error(route: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::Template {
        route: route.to_string(),
        reason: reason.to_string(),
    }
}

/// All configured routes, keyed by name.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    routes: BTreeMap<String, RoutePattern>,
    mode: ParameterMode,
    multi: bool,
}

impl PatternRegistry {
    /// Build the registry from the `[routes]` config section.
    pub fn from_config(config: &RoutesConfig) -> Result<Self, ConfigurationError> {
        let single = config
            .pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let mode = config.parameter_mode;
        let mut routes = BTreeMap::new();

        match (single, config.patterns.is_empty()) {
            (Some(template), true) => {
                let route = RoutePattern::parse(DEFAULT_ROUTE, template, mode)?;
                routes.insert(DEFAULT_ROUTE.to_string(), route);
            }
            (None, false) => {
                for entry in &config.patterns {
                    let (name, template) = entry
                        .split_once('=')
                        .ok_or_else(|| ConfigurationError::MalformedEntry(entry.clone()))?;
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(ConfigurationError::MalformedEntry(entry.clone()));
                    }
                    let route = RoutePattern::parse(name, template, mode)?;
                    if routes.insert(name.to_string(), route).is_some() {
                        return Err(ConfigurationError::DuplicateRoute(name.to_string()));
                    }
                }
            }
            _ => return Err(ConfigurationError::PatternSource),
        }

        Ok(Self {
            routes,
            mode,
            multi: single.is_none(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&RoutePattern> {
        self.routes.get(name)
    }

    /// The implicit route in single-pattern mode.
    pub fn single(&self) -> Option<&RoutePattern> {
        if self.multi {
            None
        } else {
            self.routes.get(DEFAULT_ROUTE)
        }
    }

    pub fn routes(&self) -> impl Iterator<Item = &RoutePattern> {
        self.routes.values()
    }

    pub fn mode(&self) -> ParameterMode {
        self.mode
    }

    /// True when routes are selected via `/service/<name>/...`.
    pub fn is_multi(&self) -> bool {
        self.multi
    }
}
