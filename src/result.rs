//! Validation results: the accumulated findings plus the score used to pick
//! the most informative branch inside `anyOf`/`oneOf`.
use crate::context::{ContextPath, JsonContext};
use crate::locales;
use serde_json::{Map, Value};
use std::fmt;

/// The kind of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ErrorKind {
    InvalidType,
    Required,
    FalseSchema,
    ConstMismatch,
    EnumMismatch,
    PatternMismatch,
    FormatMismatch,
    MultipleOf,
    NumberGte,
    NumberGt,
    NumberLte,
    NumberLt,
    StringGte,
    StringLte,
    ArrayMinItems,
    ArrayMaxItems,
    ArrayNoAdditionalItems,
    ArrayItemsUnique,
    ArrayContains,
    ObjectMinProperties,
    ObjectMaxProperties,
    AdditionalPropertyNotAllowed,
    InvalidPropertyName,
    InvalidPropertyPattern,
    MissingDependency,
    NumberAllOf,
    NumberAnyOf,
    NumberOneOf,
    NumberNot,
    ConditionThen,
    ConditionElse,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable tag of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidType => "invalid_type",
            ErrorKind::Required => "required",
            ErrorKind::FalseSchema => "false_schema",
            ErrorKind::ConstMismatch => "const",
            ErrorKind::EnumMismatch => "enum",
            ErrorKind::PatternMismatch => "pattern",
            ErrorKind::FormatMismatch => "format",
            ErrorKind::MultipleOf => "multiple_of",
            ErrorKind::NumberGte => "number_gte",
            ErrorKind::NumberGt => "number_gt",
            ErrorKind::NumberLte => "number_lte",
            ErrorKind::NumberLt => "number_lt",
            ErrorKind::StringGte => "string_gte",
            ErrorKind::StringLte => "string_lte",
            ErrorKind::ArrayMinItems => "array_min_items",
            ErrorKind::ArrayMaxItems => "array_max_items",
            ErrorKind::ArrayNoAdditionalItems => "array_no_additional_items",
            ErrorKind::ArrayItemsUnique => "unique",
            ErrorKind::ArrayContains => "contains",
            ErrorKind::ObjectMinProperties => "object_min_properties",
            ErrorKind::ObjectMaxProperties => "object_max_properties",
            ErrorKind::AdditionalPropertyNotAllowed => "additional_property_not_allowed",
            ErrorKind::InvalidPropertyName => "invalid_property_name",
            ErrorKind::InvalidPropertyPattern => "invalid_property_pattern",
            ErrorKind::MissingDependency => "missing_dependency",
            ErrorKind::NumberAllOf => "number_all_of",
            ErrorKind::NumberAnyOf => "number_any_of",
            ErrorKind::NumberOneOf => "number_one_of",
            ErrorKind::NumberNot => "number_not",
            ErrorKind::ConditionThen => "condition_then",
            ErrorKind::ConditionElse => "condition_else",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation finding.
#[derive(Debug, Clone)]
pub struct ResultError {
    kind: ErrorKind,
    context: ContextPath,
    description: String,
    value: Value,
    details: Map<String, Value>,
}

impl ResultError {
    pub(crate) fn new(
        kind: ErrorKind,
        context: ContextPath,
        value: &Value,
        details: Map<String, Value>,
    ) -> ResultError {
        ResultError {
            kind,
            description: locales::describe(kind, &details),
            context,
            value: value.clone(),
            details,
        }
    }

    /// The kind tag of this finding.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The offending property, when one is named in the details, otherwise
    /// the dotted instance path.
    pub fn field(&self) -> String {
        if let Some(Value::String(property)) = self.details.get("property") {
            return property.clone();
        }
        self.context.field()
    }

    /// Human readable description with placeholders substituted.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The named substitution values that produced the description.
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    /// The path through the instance that failed validation.
    pub fn context(&self) -> &ContextPath {
        &self.context
    }

    /// The offending value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for ResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = serde_json::to_string(&self.value).map_err(|_| fmt::Error)?;
        if self.context.is_root() {
            write!(f, "{}, given {}", self.description, value)
        } else {
            write!(
                f,
                "{} : {}, given {}",
                self.context.field(),
                self.description,
                value
            )
        }
    }
}

/// The outcome of validating one instance against a compiled schema.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ResultError>,
    // Scores how well the validation matched; used to pick the most
    // informative branch when reporting anyOf/oneOf failures.
    score: i32,
}

impl ValidationResult {
    pub(crate) fn new() -> ValidationResult {
        ValidationResult::default()
    }

    /// True when no finding was recorded.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All findings, in evaluation order.
    pub fn errors(&self) -> &[ResultError] {
        &self.errors
    }

    /// Consume the result, yielding the findings.
    pub fn into_errors(self) -> Vec<ResultError> {
        self.errors
    }

    pub(crate) fn score(&self) -> i32 {
        self.score
    }

    pub(crate) fn add_error(
        &mut self,
        kind: ErrorKind,
        context: &JsonContext<'_>,
        value: &Value,
        details: Map<String, Value>,
    ) {
        self.errors
            .push(ResultError::new(kind, context.into(), value, details));
        // nets -1 with the +1 added when the sub-schema walk completes
        self.score -= 2;
    }

    pub(crate) fn merge(&mut self, other: ValidationResult) {
        self.score += other.score;
        self.errors.extend(other.errors);
    }

    pub(crate) fn increment_score(&mut self) {
        self.score += 1;
    }
}
