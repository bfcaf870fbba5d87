//! JSON References: a URL plus a JSON-Pointer fragment.
//!
//! Every reference handled by this crate is absolute. References without a
//! scheme resolve against the private `json-schema:///` scope, so the pool
//! can use plain strings as keys and the fragment-only case falls out of the
//! general machinery.
use crate::error::SchemaError;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::fmt;
use url::Url;

pub(crate) const DEFAULT_ROOT_URL: &str = "json-schema:///";

pub(crate) static DEFAULT_SCOPE: Lazy<Url> =
    Lazy::new(|| Url::parse(DEFAULT_ROOT_URL).expect("Is a valid URL"));

/// A parsed JSON Reference.
///
/// The URL part is always absolute and fragment-stripped; the JSON-Pointer
/// fragment is stored separately, percent-decoded. Pool keys use the
/// [`canonical`](JsonReference::canonical) form and fragments are applied
/// only after the document is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonReference {
    url: Url,
    fragment: String,
}

impl JsonReference {
    /// Parse `reference`, resolving relative forms against the default scope.
    pub fn parse(reference: &str) -> Result<JsonReference, SchemaError> {
        JsonReference::parse_with_base(reference, &DEFAULT_SCOPE)
    }

    pub(crate) fn parse_with_base(
        reference: &str,
        base: &Url,
    ) -> Result<JsonReference, SchemaError> {
        let mut url = Url::options().base_url(Some(base)).parse(reference)?;
        let fragment = percent_decode_str(url.fragment().unwrap_or(""))
            .decode_utf8()
            .map_err(|_| SchemaError::InvalidReference(reference.to_string()))?
            .into_owned();
        url.set_fragment(None);
        Ok(JsonReference { url, fragment })
    }

    /// Resolve `reference` against this one. Absolute references stand alone,
    /// relative ones merge path components with this reference's URL.
    pub fn inherit(&self, reference: &str) -> Result<JsonReference, SchemaError> {
        JsonReference::parse_with_base(reference, &self.url)
    }

    /// The fragment-stripped absolute form used as a pool key.
    pub fn canonical(&self) -> &str {
        self.url.as_str()
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    /// The decoded JSON-Pointer fragment; empty for whole-document references.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// True when the reference carries no real location, i.e. it lives in the
    /// default scope used for loaders without an origin URL.
    pub fn is_fragment_only(&self) -> bool {
        self.url.as_str() == DEFAULT_ROOT_URL
    }

    /// True for `file://` references.
    pub fn is_file_scheme(&self) -> bool {
        self.url.scheme() == "file"
    }

    /// True for `http://` and `https://` references.
    pub fn is_http_scheme(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Navigate `document` by the pointer fragment. Fails when any segment is
    /// absent.
    pub fn pointer_get<'a>(&self, document: &'a Value) -> Result<&'a Value, SchemaError> {
        pointer(document, &self.fragment)
            .ok_or_else(|| SchemaError::InvalidReference(self.to_string()))
    }
}

impl fmt::Display for JsonReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fragment.is_empty() {
            write!(f, "{}", self.url)
        } else {
            write!(f, "{}#{}", self.url, self.fragment)
        }
    }
}

/// JSON-Pointer lookup with `~0`/`~1` unescaping.
fn pointer<'a>(document: &'a Value, pointer: &str) -> Option<&'a Value> {
    if pointer.is_empty() {
        return Some(document);
    }
    if !pointer.starts_with('/') {
        // Location-independent fragments are resolved by the pool, not here
        return None;
    }
    let tokens = pointer
        .split('/')
        .skip(1)
        .map(|token| token.replace("~1", "/").replace("~0", "~"));
    let mut target = document;
    for token in tokens {
        target = match target {
            Value::Object(map) => map.get(&token)?,
            Value::Array(items) => items.get(parse_index(&token)?)?,
            _ => return None,
        };
    }
    Some(target)
}

fn parse_index(s: &str) -> Option<usize> {
    if s.starts_with('+') || (s.starts_with('0') && s.len() != 1) {
        None
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::JsonReference;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("#", "json-schema:///", "" ; "bare fragment")]
    #[test_case("#/definitions/foo", "json-schema:///", "/definitions/foo" ; "pointer only")]
    #[test_case("http://example.com/schema.json#/a", "http://example.com/schema.json", "/a" ; "absolute with pointer")]
    #[test_case("http://example.com/schema.json#", "http://example.com/schema.json", "" ; "empty fragment is dropped")]
    fn parsing(reference: &str, canonical: &str, fragment: &str) {
        let parsed = JsonReference::parse(reference).unwrap();
        assert_eq!(parsed.canonical(), canonical);
        assert_eq!(parsed.fragment(), fragment);
    }

    #[test_case("http://example.com/a/b.json", "c.json", "http://example.com/a/c.json" ; "sibling")]
    #[test_case("http://example.com/a/b.json", "/c.json", "http://example.com/c.json" ; "rooted")]
    #[test_case("http://example.com/a/b.json", "http://other.com/x.json", "http://other.com/x.json" ; "absolute wins")]
    #[test_case("http://example.com/a/b.json", "#/foo", "http://example.com/a/b.json#/foo" ; "fragment keeps base")]
    fn inheriting(base: &str, relative: &str, expected: &str) {
        let base = JsonReference::parse(base).unwrap();
        assert_eq!(base.inherit(relative).unwrap().to_string(), expected);
    }

    #[test]
    fn pointer_navigation() {
        let document = json!({"a": {"b": [10, {"c~d": 1, "e/f": 2}]}});
        let reference = JsonReference::parse("#/a/b/1/c~0d").unwrap();
        assert_eq!(reference.pointer_get(&document).unwrap(), &json!(1));
        let reference = JsonReference::parse("#/a/b/1/e~1f").unwrap();
        assert_eq!(reference.pointer_get(&document).unwrap(), &json!(2));
        let missing = JsonReference::parse("#/a/x").unwrap();
        assert!(missing.pointer_get(&document).is_err());
    }
}
