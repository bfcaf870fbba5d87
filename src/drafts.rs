//! Draft registry: the known meta-schemas and the keyword dialect of each
//! supported draft.
use serde_json::Value;

/// Canonical URL of the draft 4 meta-schema.
pub const DRAFT4_SCHEMA_URL: &str = "http://json-schema.org/draft-04/schema";
/// Canonical URL of the draft 6 meta-schema.
pub const DRAFT6_SCHEMA_URL: &str = "http://json-schema.org/draft-06/schema";
/// Canonical URL of the draft 7 meta-schema.
pub const DRAFT7_SCHEMA_URL: &str = "http://json-schema.org/draft-07/schema";

lazy_static::lazy_static! {
    static ref DRAFT4: Value = serde_json::from_str(include_str!("../meta_schemas/draft4.json")).expect("Valid schema!");
    static ref DRAFT6: Value = serde_json::from_str(include_str!("../meta_schemas/draft6.json")).expect("Valid schema!");
    static ref DRAFT7: Value = serde_json::from_str(include_str!("../meta_schemas/draft7.json")).expect("Valid schema!");
}

/// JSON Schema draft version.
#[non_exhaustive]
#[derive(Debug, PartialEq, Copy, Clone, Hash, Eq)]
pub enum Draft {
    /// JSON Schema Draft 4
    Draft4,
    /// JSON Schema Draft 6
    Draft6,
    /// JSON Schema Draft 7
    Draft7,
    /// Accept the union of all supported drafts' keywords. This is the
    /// default when the schema has no recognised `$schema` and no draft was
    /// set explicitly; it performs no meta-schema validation.
    Hybrid,
}

impl Default for Draft {
    fn default() -> Self {
        Draft::Hybrid
    }
}

impl Draft {
    /// The keyword naming the schema identity: `id` in draft 4, `$id` later.
    pub(crate) const fn id_keyword(self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            Draft::Draft6 | Draft::Draft7 | Draft::Hybrid => "$id",
        }
    }

    /// Bare `true`/`false` schemas exist from draft 6 on.
    pub(crate) const fn supports_boolean_schemas(self) -> bool {
        !matches!(self, Draft::Draft4)
    }

    /// In draft 4 `exclusiveMinimum`/`exclusiveMaximum` are boolean flags on
    /// `minimum`/`maximum`; later drafts make them standalone numbers.
    /// `Hybrid` accepts either shape.
    pub(crate) const fn boolean_exclusive_bounds(self) -> bool {
        matches!(self, Draft::Draft4 | Draft::Hybrid)
    }

    pub(crate) const fn numeric_exclusive_bounds(self) -> bool {
        !matches!(self, Draft::Draft4)
    }

    pub(crate) fn supports_keyword(self, keyword: &str) -> bool {
        match keyword {
            "const" | "contains" | "propertyNames" => !matches!(self, Draft::Draft4),
            "if" | "then" | "else" => matches!(self, Draft::Draft7 | Draft::Hybrid),
            _ => true,
        }
    }

    /// The canonical meta-schema URL, if this draft has one.
    pub(crate) const fn schema_url(self) -> Option<&'static str> {
        match self {
            Draft::Draft4 => Some(DRAFT4_SCHEMA_URL),
            Draft::Draft6 => Some(DRAFT6_SCHEMA_URL),
            Draft::Draft7 => Some(DRAFT7_SCHEMA_URL),
            Draft::Hybrid => None,
        }
    }
}

/// The embedded meta-schema for a well-known URL. Loaders consult this before
/// touching the network, so the three standard URIs never require a fetch.
pub(crate) fn meta_schema_document(url: &str) -> Option<&'static Value> {
    match url.trim_end_matches('#') {
        DRAFT4_SCHEMA_URL => Some(&DRAFT4),
        DRAFT6_SCHEMA_URL => Some(&DRAFT6),
        DRAFT7_SCHEMA_URL => Some(&DRAFT7),
        _ => None,
    }
}

/// Get the `Draft` from a meta-schema URL.
pub(crate) fn draft_from_url(url: &str) -> Option<Draft> {
    match url.trim_end_matches('#') {
        DRAFT7_SCHEMA_URL => Some(Draft::Draft7),
        DRAFT6_SCHEMA_URL => Some(Draft::Draft6),
        DRAFT4_SCHEMA_URL => Some(Draft::Draft4),
        _ => None,
    }
}

/// Get the `Draft` from a schema's `$schema` keyword.
pub(crate) fn draft_from_schema(schema: &Value) -> Option<Draft> {
    schema
        .get("$schema")
        .and_then(Value::as_str)
        .and_then(draft_from_url)
}

/// The declared identity of `schema` under `draft`, if any.
pub(crate) fn id_of(draft: Draft, schema: &Value) -> Option<&str> {
    let object = schema.as_object()?;
    match draft {
        Draft::Draft4 => object.get("id"),
        Draft::Draft6 | Draft::Draft7 => object.get("$id"),
        Draft::Hybrid => object.get("$id").or_else(|| object.get("id")),
    }
    .and_then(Value::as_str)
}
