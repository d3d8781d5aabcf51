//! Path resolution: request segments → parameter set.
//!
//! # Responsibilities
//! - Split the raw request path into decoded segments
//! - NAMED mode: consume `key/value` pairs, honouring `-last` capture keys
//! - POSITIONAL mode: assign segments to `{1}..{M}`, folding the tail into `{M}`
//! - Check every placeholder of the route received a non-empty value
//!
//! # Design Decisions
//! - Pure functions: no I/O, no shared state
//! - Capture values are rejoined with `/` so the builder can restore structure

use percent_encoding::percent_decode_str;

use crate::error::ProxyError;
use crate::routing::pattern::{ParameterMode, RoutePattern, CAPTURE_SUFFIX};
use crate::routing::ParameterSet;

/// Split a request path into percent-decoded, non-empty segments.
///
/// A decoded segment never contains `/`, so only a capture slot (which
/// rejoins several segments) can hand the builder a multi-segment value.
pub fn split_segments(path: &str) -> Result<Vec<String>, ProxyError> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect()
}

fn decode_segment(raw: &str) -> Result<String, ProxyError> {
    let decoded = percent_decode_str(raw).decode_utf8().map_err(|_| {
        ProxyError::MalformedPath(format!("segment '{}' is not valid UTF-8", raw))
    })?;
    if decoded.contains('/') {
        return Err(ProxyError::MalformedPath(format!(
            "segment '{}' encodes a path separator",
            raw
        )));
    }
    // The upstream URL parser would resolve these against the template.
    if decoded == "." || decoded == ".." {
        return Err(ProxyError::MalformedPath(format!(
            "dot segment '{}' is not allowed",
            raw
        )));
    }
    Ok(decoded.into_owned())
}

/// Resolve `segments` against `route` and validate completeness.
pub fn resolve(
    route: &RoutePattern,
    mode: ParameterMode,
    segments: &[String],
) -> Result<ParameterSet, ProxyError> {
    let params = match mode {
        ParameterMode::Named => resolve_named(segments)?,
        ParameterMode::Positional => {
            // Registry construction guarantees an index in positional mode.
            let max_index = route.max_index().unwrap_or(1);
            resolve_positional(max_index, segments)
        }
    };
    validate(route, &params)?;
    Ok(params)
}

/// Alternating key/value pairs; a `-last` key captures everything after it.
pub fn resolve_named(segments: &[String]) -> Result<ParameterSet, ProxyError> {
    let mut params = ParameterSet::new();
    let mut i = 0;
    while i < segments.len() {
        let key = &segments[i];
        if i + 1 >= segments.len() {
            return Err(ProxyError::MalformedPath(format!(
                "odd number of segments: key '{}' has no value",
                key
            )));
        }
        if let Some(name) = key.strip_suffix(CAPTURE_SUFFIX) {
            params.insert(name.to_string(), segments[i + 1..].join("/"));
            break;
        }
        params.insert(key.clone(), segments[i + 1].clone());
        i += 2;
    }
    Ok(params)
}

/// Segments fill `{1}`, `{2}`, ...; index `max_index` absorbs the rest.
pub fn resolve_positional(max_index: usize, segments: &[String]) -> ParameterSet {
    let mut params = ParameterSet::new();
    for (offset, segment) in segments.iter().enumerate() {
        let index = offset + 1;
        if index == max_index {
            params.insert(index.to_string(), segments[offset..].join("/"));
            break;
        }
        params.insert(index.to_string(), segment.clone());
    }
    params
}

fn validate(route: &RoutePattern, params: &ParameterSet) -> Result<(), ProxyError> {
    for name in route.required_names() {
        match params.get(name) {
            Some(value) if !value.is_empty() => {}
            _ => return Err(ProxyError::MissingParameter(name.to_string())),
        }
    }
    Ok(())
}
