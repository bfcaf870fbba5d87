//! Description templates for validation findings.
//!
//! Templates carry `%name%` placeholders that are substituted from the
//! finding's details map, so callers can re-render findings in another
//! language by swapping this table.
use crate::result::ErrorKind;
use serde_json::{Map, Value};

pub(crate) fn template(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidType => "Invalid type. Expected: %expected%, given: %given%",
        ErrorKind::Required => "%property% is required",
        ErrorKind::FalseSchema => "False always fails validation",
        ErrorKind::ConstMismatch => "%allowed% is required",
        ErrorKind::EnumMismatch => "Must match one of the enum values [%allowed%]",
        ErrorKind::PatternMismatch => "Does not match pattern '%pattern%'",
        ErrorKind::FormatMismatch => "Does not match format '%format%'",
        ErrorKind::MultipleOf => "Must be a multiple of %multiple%",
        ErrorKind::NumberGte => "Must be greater than or equal to %min%",
        ErrorKind::NumberGt => "Must be greater than %min%",
        ErrorKind::NumberLte => "Must be less than or equal to %max%",
        ErrorKind::NumberLt => "Must be less than %max%",
        ErrorKind::StringGte => "String length must be greater than or equal to %min%",
        ErrorKind::StringLte => "String length must be less than or equal to %max%",
        ErrorKind::ArrayMinItems => "Array must have at least %min% items",
        ErrorKind::ArrayMaxItems => "Array must have at most %max% items",
        ErrorKind::ArrayNoAdditionalItems => "No additional items allowed on array",
        ErrorKind::ArrayItemsUnique => "Array items[%i%,%j%] must be unique",
        ErrorKind::ArrayContains => "At least one of the items must match",
        ErrorKind::ObjectMinProperties => "Must have at least %min% properties",
        ErrorKind::ObjectMaxProperties => "Must have at most %max% properties",
        ErrorKind::AdditionalPropertyNotAllowed => {
            "Additional property %property% is not allowed"
        }
        ErrorKind::InvalidPropertyName => "Property name of \"%property%\" does not match",
        ErrorKind::InvalidPropertyPattern => {
            "Property \"%property%\" does not match pattern '%pattern%'"
        }
        ErrorKind::MissingDependency => "Has a dependency on %dependency%",
        ErrorKind::NumberAllOf => "Must validate all the schemas (allOf)",
        ErrorKind::NumberAnyOf => "Must validate at least one schema (anyOf)",
        ErrorKind::NumberOneOf => "Must validate one and only one schema (oneOf)",
        ErrorKind::NumberNot => "Must not validate the schema (not)",
        ErrorKind::ConditionThen => "Must validate \"then\" as \"if\" was valid",
        ErrorKind::ConditionElse => "Must validate \"else\" as \"if\" was not valid",
        ErrorKind::Internal => "Internal error: %error%",
    }
}

/// Render the template of `kind`, substituting every `%name%` placeholder
/// from `details`. String details are inserted verbatim, everything else in
/// its JSON form.
pub(crate) fn describe(kind: ErrorKind, details: &Map<String, Value>) -> String {
    let mut description = template(kind).to_string();
    for (name, value) in details {
        let placeholder = format!("%{}%", name);
        if !description.contains(placeholder.as_str()) {
            continue;
        }
        let rendered = match value {
            Value::String(item) => item.clone(),
            other => other.to_string(),
        };
        description = description.replace(placeholder.as_str(), &rendered);
    }
    description
}

#[cfg(test)]
mod tests {
    use super::describe;
    use crate::result::ErrorKind;
    use serde_json::{Map, Value};

    #[test]
    fn substitution() {
        let mut details = Map::new();
        details.insert("property".to_string(), Value::String("foo".to_string()));
        assert_eq!(describe(ErrorKind::Required, &details), "foo is required");
    }

    #[test]
    fn unmatched_placeholders_are_kept() {
        let details = Map::new();
        assert_eq!(
            describe(ErrorKind::Required, &details),
            "%property% is required"
        );
    }
}
