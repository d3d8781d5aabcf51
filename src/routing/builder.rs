//! Upstream URL construction.
//!
//! Substitutes resolved parameters into a route's pre-split template.
//! Values are percent-encoded per path segment, so a capture value such as
//! `docs/api v1` keeps its hierarchy (`docs/api%20v1`) instead of collapsing
//! into a single opaque segment.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::routing::pattern::{RoutePattern, TemplatePart};
use crate::routing::ParameterSet;

/// Everything except unreserved characters and `!*'()`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Build the upstream URL for `route`. Absent values substitute as empty.
pub fn build_url(route: &RoutePattern, params: &ParameterSet) -> String {
    let mut url = String::with_capacity(route.template().len() + 32);
    for part in route.parts() {
        match part {
            TemplatePart::Literal(text) => url.push_str(text),
            TemplatePart::Slot(name) => {
                if let Some(value) = params.get(name) {
                    url.push_str(&encode_value(value));
                }
            }
        }
    }
    url
}

/// Encode a value, preserving `/` between individually encoded segments.
pub fn encode_value(value: &str) -> String {
    value
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::pattern::ParameterMode;
    use percent_encoding::percent_decode_str;

    fn route(template: &str) -> RoutePattern {
        RoutePattern::parse("r", template, ParameterMode::Named).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> ParameterSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_github_release_url() {
        let r = route("https://github.com/{owner}/{repository}/releases/download/{tag}/{filename}");
        let p = params(&[
            ("owner", "twbs"),
            ("repository", "bootstrap"),
            ("tag", "v5.3.8"),
            ("filename", "bootstrap.zip"),
        ]);
        assert_eq!(
            build_url(&r, &p),
            "https://github.com/twbs/bootstrap/releases/download/v5.3.8/bootstrap.zip"
        );
    }

    #[test]
    fn test_capture_keeps_slashes() {
        let r = route("https://api.example.com/{service}/{path}");
        let p = params(&[("service", "files"), ("path", "a/b c")]);
        assert_eq!(build_url(&r, &p), "https://api.example.com/files/a/b%20c");
    }

    #[test]
    fn test_capture_suffix_in_template() {
        let r = route("https://cdn.example.com/{path-last}");
        let p = params(&[("path", "docs/readme.md")]);
        assert_eq!(build_url(&r, &p), "https://cdn.example.com/docs/readme.md");
    }

    #[test]
    fn test_single_segment_value_is_opaque() {
        let value = "v1 beta?x=1&y=#2";
        let encoded = encode_value(value);
        assert!(!encoded.contains(['?', '&', '#', ' ']));
        assert_eq!(percent_decode_str(&encoded).decode_utf8().unwrap(), value);
    }

    #[test]
    fn test_unicode_round_trip() {
        let encoded = encode_value("résumé.pdf");
        assert_eq!(encoded, "r%C3%A9sum%C3%A9.pdf");
        assert_eq!(percent_decode_str(&encoded).decode_utf8().unwrap(), "résumé.pdf");
    }

    #[test]
    fn test_build_is_idempotent() {
        let r = route("https://x.io/{a}?q={b}");
        let p = params(&[("a", "one two"), ("b", "x/y")]);
        assert_eq!(build_url(&r, &p), build_url(&r, &p));
    }

    #[test]
    fn test_absent_value_is_empty() {
        let r = route("https://x.io/{a}/{b}");
        let p = params(&[("a", "1")]);
        assert_eq!(build_url(&r, &p), "https://x.io/1/");
    }
}
