//! Named format checkers: the built-in draft 4/6/7 set plus user-registered
//! ones.
//!
//! The registry is process-wide. Validation takes the read lock; `add` and
//! `remove` take the write lock, so user checkers may be (un)registered while
//! other threads validate. Unknown format names always pass.
use ahash::AHashMap;
use chrono::{DateTime, NaiveDate};
use email_address::EmailAddress;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::{
    net::IpAddr,
    str::FromStr,
    sync::Arc,
};
use url::Url;
use uuid_simd::{parse_hyphenated, Out};

lazy_static::lazy_static! {
    static ref DATE_RE: Regex =
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}\z").expect("Is a valid regex");
    static ref IRI_REFERENCE_RE: Regex =
        Regex::new(r"^(\w+:(/?/?))?[^#\\\s]*(#[^\\\s]*)?\z").expect("Is a valid regex");
    static ref JSON_POINTER_RE: Regex =
        Regex::new(r"^(/(([^/~])|(~[01]))*)*\z").expect("Is a valid regex");
    static ref RELATIVE_JSON_POINTER_RE: Regex =
        Regex::new(r"^(?:0|[1-9][0-9]*)(?:#|(?:/(?:[^~/]|~0|~1)*)*)\z").expect("Is a valid regex");
    static ref TIME_RE: Regex =
        Regex::new(
        r"^([01][0-9]|2[0-3]):([0-5][0-9]):([0-5][0-9])(\.[0-9]{6})?(([Zz])|([+|\-]([01][0-9]|2[0-3]):[0-5][0-9]))\z",
    ).expect("Is a valid regex");
    static ref URI_REFERENCE_RE: Regex =
        Regex::new(r"^(\w+:(/?/?))?[^#\\\s]*(#[^\\\s]*)?\z").expect("Is a valid regex");
    static ref URI_TEMPLATE_RE: Regex = Regex::new(
        r#"^(?:(?:[^\x00-\x20"'<>%\\^`{|}]|%[0-9a-f]{2})|\{[+#./;?&=,!@|]?(?:[a-z0-9_]|%[0-9a-f]{2})+(?::[1-9][0-9]{0,3}|\*)?(?:,(?:[a-z0-9_]|%[0-9a-f]{2})+(?::[1-9][0-9]{0,3}|\*)?)*})*\z"#
    )
    .expect("Is a valid regex");
}

/// A named format checker.
///
/// Checkers receive the raw value under validation: the built-in string
/// formats ignore non-strings (they return `true`), while user checkers with
/// numeric semantics may inspect numbers as well.
pub trait FormatChecker: Send + Sync {
    /// Whether `value` satisfies the format.
    fn is_format(&self, value: &Value) -> bool;
}

impl<F> FormatChecker for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn is_format(&self, value: &Value) -> bool {
        self(value)
    }
}

/// The process-wide registry consulted by the `format` keyword.
pub struct FormatCheckerChain {
    checkers: RwLock<AHashMap<String, Arc<dyn FormatChecker>>>,
}

/// The global format checker registry.
pub static FORMAT_CHECKERS: Lazy<FormatCheckerChain> = Lazy::new(FormatCheckerChain::with_builtins);

impl FormatCheckerChain {
    fn with_builtins() -> FormatCheckerChain {
        let chain = FormatCheckerChain {
            checkers: RwLock::new(AHashMap::new()),
        };
        chain
            .add("date", is_date)
            .add("date-time", is_date_time)
            .add("email", is_email)
            .add("hostname", is_hostname)
            .add("idn-email", is_email)
            .add("idn-hostname", is_hostname)
            .add("ipv4", is_ipv4)
            .add("ipv6", is_ipv6)
            .add("iri", is_uri)
            .add("iri-reference", is_iri_reference)
            .add("json-pointer", is_json_pointer)
            .add("regex", is_regex)
            .add("relative-json-pointer", is_relative_json_pointer)
            .add("time", is_time)
            .add("uri", is_uri)
            .add("uri-reference", is_uri_reference)
            .add("uri-template", is_uri_template)
            .add("uuid", is_uuid);
        chain
    }

    /// Register `checker` under `name`, replacing any previous one.
    pub fn add(&self, name: &str, checker: impl FormatChecker + 'static) -> &Self {
        self.checkers
            .write()
            .insert(name.to_string(), Arc::new(checker));
        self
    }

    /// Remove the checker registered under `name`, if any.
    pub fn remove(&self, name: &str) -> &Self {
        self.checkers.write().remove(name);
        self
    }

    /// Whether a checker is registered under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.checkers.read().contains_key(name)
    }

    /// Check `value` against the checker registered under `name`. Unknown
    /// names always pass; this is a compatibility requirement.
    pub fn is_format(&self, name: &str, value: &Value) -> bool {
        match self.checkers.read().get(name) {
            Some(checker) => checker.is_format(value),
            None => true,
        }
    }
}

impl std::fmt::Debug for FormatCheckerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.checkers.read().keys().cloned().collect();
        names.sort_unstable();
        f.debug_struct("FormatCheckerChain")
            .field("checkers", &names)
            .finish()
    }
}

fn is_date(value: &Value) -> bool {
    if let Value::String(item) = value {
        // Zero padding is ignored by the underlying parser, hence the extra
        // regex gate
        NaiveDate::parse_from_str(item, "%Y-%m-%d").is_ok() && DATE_RE.is_match(item.as_str())
    } else {
        true
    }
}

fn is_date_time(value: &Value) -> bool {
    if let Value::String(item) = value {
        DateTime::parse_from_rfc3339(item).is_ok()
    } else {
        true
    }
}

fn is_email(value: &Value) -> bool {
    if let Value::String(item) = value {
        EmailAddress::from_str(item).is_ok()
    } else {
        true
    }
}

fn is_valid_hostname(hostname: &str) -> bool {
    !(hostname.ends_with('-')
        || hostname.starts_with('-')
        || hostname.is_empty()
        || hostname.chars().count() > 255
        || hostname
            .chars()
            .any(|c| !(c.is_alphanumeric() || c == '-' || c == '.'))
        || hostname.split('.').any(|part| part.chars().count() > 63))
}

fn is_hostname(value: &Value) -> bool {
    if let Value::String(item) = value {
        is_valid_hostname(item)
    } else {
        true
    }
}

fn is_ipv4(value: &Value) -> bool {
    if let Value::String(item) = value {
        if item.starts_with('0') {
            return false;
        }
        match IpAddr::from_str(item.as_str()) {
            Ok(address) => address.is_ipv4(),
            Err(_) => false,
        }
    } else {
        true
    }
}

fn is_ipv6(value: &Value) -> bool {
    if let Value::String(item) = value {
        match IpAddr::from_str(item.as_str()) {
            Ok(address) => address.is_ipv6(),
            Err(_) => false,
        }
    } else {
        true
    }
}

fn is_uri(value: &Value) -> bool {
    if let Value::String(item) = value {
        Url::from_str(item).is_ok()
    } else {
        true
    }
}

fn is_uri_reference(value: &Value) -> bool {
    if let Value::String(item) = value {
        URI_REFERENCE_RE.is_match(item)
    } else {
        true
    }
}

fn is_iri_reference(value: &Value) -> bool {
    if let Value::String(item) = value {
        IRI_REFERENCE_RE.is_match(item)
    } else {
        true
    }
}

fn is_uri_template(value: &Value) -> bool {
    if let Value::String(item) = value {
        URI_TEMPLATE_RE.is_match(item)
    } else {
        true
    }
}

fn is_json_pointer(value: &Value) -> bool {
    if let Value::String(item) = value {
        JSON_POINTER_RE.is_match(item)
    } else {
        true
    }
}

fn is_relative_json_pointer(value: &Value) -> bool {
    if let Value::String(item) = value {
        RELATIVE_JSON_POINTER_RE.is_match(item)
    } else {
        true
    }
}

fn is_regex(value: &Value) -> bool {
    if let Value::String(item) = value {
        fancy_regex::Regex::new(item).is_ok()
    } else {
        true
    }
}

fn is_time(value: &Value) -> bool {
    if let Value::String(item) = value {
        TIME_RE.is_match(item)
    } else {
        true
    }
}

fn is_uuid(value: &Value) -> bool {
    if let Value::String(item) = value {
        let mut out = [0; 16];
        parse_hyphenated(item.as_bytes(), Out::from_mut(&mut out)).is_ok()
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::FORMAT_CHECKERS;
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case("date-time", &json!("2018-11-13T20:20:39+00:00"), true)]
    #[test_case("date-time", &json!("not a timestamp"), false)]
    #[test_case("date", &json!("1963-06-19"), true)]
    #[test_case("date", &json!("06/19/1963"), false)]
    #[test_case("email", &json!("joe.bloggs@example.com"), true)]
    #[test_case("email", &json!("not-an-email"), false)]
    #[test_case("hostname", &json!("www.example.com"), true)]
    #[test_case("hostname", &json!("-starts-with-dash"), false)]
    #[test_case("ipv4", &json!("192.168.0.1"), true)]
    #[test_case("ipv4", &json!("256.0.0.1"), false)]
    #[test_case("ipv6", &json!("::1"), true)]
    #[test_case("ipv6", &json!("12345::"), false)]
    #[test_case("uri", &json!("http://example.com/"), true)]
    #[test_case("uri-reference", &json!("/relative/path"), true)]
    #[test_case("uuid", &json!("2eb8aa08-aa98-11ea-b4aa-73b441d16380"), true)]
    #[test_case("uuid", &json!("not-a-uuid"), false)]
    #[test_case("regex", &json!("^a*$"), true)]
    #[test_case("regex", &json!("(unbalanced"), false)]
    #[test_case("json-pointer", &json!("/a/b"), true)]
    #[test_case("json-pointer", &json!("a/b"), false)]
    #[test_case("relative-json-pointer", &json!("1/a"), true)]
    #[test_case("time", &json!("20:20:39Z"), true)]
    #[test_case("time", &json!("25:00:00Z"), false)]
    fn builtins(name: &str, value: &Value, expected: bool) {
        assert_eq!(FORMAT_CHECKERS.is_format(name, value), expected);
    }

    #[test]
    fn non_strings_pass_string_formats() {
        assert!(FORMAT_CHECKERS.is_format("email", &json!(42)));
        assert!(FORMAT_CHECKERS.is_format("ipv4", &json!(null)));
    }

    #[test]
    fn unknown_format_passes() {
        assert!(FORMAT_CHECKERS.is_format("no-such-format", &json!("anything")));
    }

    #[test]
    fn add_and_remove() {
        fn even_only(value: &Value) -> bool {
            value.as_u64().map_or(true, |item| item % 2 == 0)
        }
        FORMAT_CHECKERS.add("even", even_only);
        assert!(FORMAT_CHECKERS.has("even"));
        assert!(FORMAT_CHECKERS.is_format("even", &json!(4)));
        assert!(!FORMAT_CHECKERS.is_format("even", &json!(3)));
        FORMAT_CHECKERS.remove("even");
        assert!(!FORMAT_CHECKERS.has("even"));
    }
}
