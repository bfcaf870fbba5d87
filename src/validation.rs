//! The validation walk: depth-first evaluation of a compiled sub-schema
//! graph against a JSON value.
//!
//! Findings never halt the walk; only a failed type gate short-circuits
//! descent into the current node. Combinators run before structural
//! constraints and funnel their branch results through score selection.
use crate::context::JsonContext;
use crate::formats::FORMAT_CHECKERS;
use crate::numbers;
use crate::result::{ErrorKind, ValidationResult};
use crate::schema::Schema;
use crate::subschema::{Dependency, NodeId, PrimitiveType, SchemaOrBool, SubSchema};
use ahash::AHashMap;
use serde_json::{Map, Number, Value};

fn details(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), value.clone());
    }
    map
}

fn regex_matches(regex: &fancy_regex::Regex, text: &str) -> bool {
    // An engine error (e.g. a backtracking limit) counts as a non-match
    matches!(regex.is_match(text), Ok(true))
}

impl Schema {
    /// Validate an already-decoded value against the compiled graph.
    pub fn validate_value(&self, instance: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();
        let context = JsonContext::new();
        self.validate_recursive(self.root, instance, &mut result, &context);
        result
    }

    fn sub_validate(
        &self,
        node: NodeId,
        instance: &Value,
        context: &JsonContext<'_>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();
        self.validate_recursive(node, instance, &mut result, context);
        result
    }

    fn validate_recursive(
        &self,
        node_id: NodeId,
        instance: &Value,
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) {
        let node = self.arena.get(node_id);

        // A node with `$ref` delegates to its target immediately
        if let Some(target) = node.ref_schema {
            self.validate_recursive(target, instance, result, context);
            return;
        }

        // Bare boolean schemas short-circuit
        if let Some(pass) = node.pass {
            if !pass {
                result.add_error(ErrorKind::FalseSchema, context, instance, Map::new());
            }
            return;
        }

        match instance {
            Value::Null => {
                if !node.types.is_empty() && !node.types.contains(PrimitiveType::Null) {
                    self.type_error(node, instance, "null", result, context);
                    return;
                }
                self.validate_combinators(node, instance, result, context);
                self.validate_common(node, instance, result, context);
            }
            Value::Bool(_) => {
                if !node.types.is_empty() && !node.types.contains(PrimitiveType::Boolean) {
                    self.type_error(node, instance, "boolean", result, context);
                    return;
                }
                self.validate_combinators(node, instance, result, context);
                self.validate_common(node, instance, result, context);
            }
            Value::String(item) => {
                if !node.types.is_empty() && !node.types.contains(PrimitiveType::String) {
                    self.type_error(node, instance, "string", result, context);
                    return;
                }
                self.validate_combinators(node, instance, result, context);
                self.validate_string(node, instance, item, result, context);
                self.validate_common(node, instance, result, context);
            }
            Value::Number(number) => {
                // An integer is a number whose exact rational form has
                // denominator 1, so 1.0 passes an "integer" gate
                let is_integer = numbers::is_integer(number);
                let type_ok = node.types.is_empty()
                    || node.types.contains(PrimitiveType::Number)
                    || (is_integer && node.types.contains(PrimitiveType::Integer));
                if !type_ok {
                    let given = if is_integer { "integer" } else { "number" };
                    self.type_error(node, instance, given, result, context);
                    return;
                }
                self.validate_combinators(node, instance, result, context);
                self.validate_number(node, instance, number, result, context);
                self.validate_common(node, instance, result, context);
            }
            Value::Array(items) => {
                if !node.types.is_empty() && !node.types.contains(PrimitiveType::Array) {
                    self.type_error(node, instance, "array", result, context);
                    return;
                }
                self.validate_combinators(node, instance, result, context);
                self.validate_array(node, instance, items, result, context);
                self.validate_common(node, instance, result, context);
            }
            Value::Object(object) => {
                if !node.types.is_empty() && !node.types.contains(PrimitiveType::Object) {
                    self.type_error(node, instance, "object", result, context);
                    return;
                }
                self.validate_combinators(node, instance, result, context);
                self.validate_object(node, instance, object, result, context);
                self.validate_common(node, instance, result, context);

                for &child_id in &node.properties_children {
                    let child = self.arena.get(child_id);
                    if let Some(value) = object.get(&child.property) {
                        let sub_context = context.push(child.property.as_str());
                        self.validate_recursive(child_id, value, result, &sub_context);
                    }
                }
            }
        }

        result.increment_score();
    }

    fn type_error(
        &self,
        node: &SubSchema,
        instance: &Value,
        given: &str,
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) {
        result.add_error(
            ErrorKind::InvalidType,
            context,
            instance,
            details(&[
                ("expected", Value::String(node.types.to_string())),
                ("given", Value::String(given.to_string())),
            ]),
        );
    }

    fn validate_combinators(
        &self,
        node: &SubSchema,
        instance: &Value,
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) {
        if !node.any_of.is_empty() {
            let mut validated = false;
            let mut best: Option<ValidationResult> = None;
            for &branch in &node.any_of {
                let branch_result = self.sub_validate(branch, instance, context);
                if branch_result.valid() {
                    validated = true;
                    break;
                }
                let better = best
                    .as_ref()
                    .map_or(true, |current| branch_result.score() > current.score());
                if better {
                    best = Some(branch_result);
                }
            }
            if !validated {
                result.add_error(ErrorKind::NumberAnyOf, context, instance, Map::new());
                // surface the most promising mismatch
                if let Some(best) = best {
                    result.merge(best);
                }
            }
        }

        if !node.one_of.is_empty() {
            let mut validated = 0;
            let mut best: Option<ValidationResult> = None;
            for &branch in &node.one_of {
                let branch_result = self.sub_validate(branch, instance, context);
                if branch_result.valid() {
                    validated += 1;
                } else {
                    let better = best
                        .as_ref()
                        .map_or(true, |current| branch_result.score() > current.score());
                    if better {
                        best = Some(branch_result);
                    }
                }
            }
            if validated != 1 {
                result.add_error(ErrorKind::NumberOneOf, context, instance, Map::new());
                if validated == 0 {
                    if let Some(best) = best {
                        result.merge(best);
                    }
                }
            }
        }

        if !node.all_of.is_empty() {
            let mut failed = false;
            for &branch in &node.all_of {
                let branch_result = self.sub_validate(branch, instance, context);
                if !branch_result.valid() {
                    failed = true;
                    result.merge(branch_result);
                }
            }
            if failed {
                result.add_error(ErrorKind::NumberAllOf, context, instance, Map::new());
            }
        }

        if let Some(branch) = node.not {
            if self.sub_validate(branch, instance, context).valid() {
                result.add_error(ErrorKind::NumberNot, context, instance, Map::new());
            }
        }

        if !node.dependencies.is_empty() {
            if let Value::Object(object) = instance {
                for key in object.keys() {
                    match node.dependencies.get(key) {
                        Some(Dependency::Properties(names)) => {
                            for name in names {
                                if !object.contains_key(name) {
                                    result.add_error(
                                        ErrorKind::MissingDependency,
                                        context,
                                        instance,
                                        details(&[(
                                            "dependency",
                                            Value::String(name.clone()),
                                        )]),
                                    );
                                }
                            }
                        }
                        Some(Dependency::Node(dependent)) => {
                            self.validate_recursive(*dependent, instance, result, context);
                        }
                        None => {}
                    }
                }
            }
        }

        if let Some(if_branch) = node.if_schema {
            let if_result = self.sub_validate(if_branch, instance, context);
            if if_result.valid() {
                if let Some(then_branch) = node.then_schema {
                    let then_result = self.sub_validate(then_branch, instance, context);
                    if !then_result.valid() {
                        result.add_error(ErrorKind::ConditionThen, context, instance, Map::new());
                        result.merge(then_result);
                    }
                }
            } else if let Some(else_branch) = node.else_schema {
                let else_result = self.sub_validate(else_branch, instance, context);
                if !else_result.valid() {
                    result.add_error(ErrorKind::ConditionElse, context, instance, Map::new());
                    result.merge(else_result);
                }
            }
        }
    }

    fn validate_common(
        &self,
        node: &SubSchema,
        instance: &Value,
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) {
        if !node.enum_values.is_empty() {
            let canonical = numbers::canonical_string(instance);
            if !node.enum_values.iter().any(|option| option == &canonical) {
                result.add_error(
                    ErrorKind::EnumMismatch,
                    context,
                    instance,
                    details(&[("allowed", Value::String(node.enum_values.join(",")))]),
                );
            }
        }

        if let Some(expected) = &node.const_value {
            if &numbers::canonical_string(instance) != expected {
                result.add_error(
                    ErrorKind::ConstMismatch,
                    context,
                    instance,
                    details(&[("allowed", Value::String(expected.clone()))]),
                );
            }
        }

        if let Some(format) = &node.format {
            // Unknown names always pass; string checkers see strings, user
            // checkers with numeric semantics see numbers
            if matches!(instance, Value::String(_) | Value::Number(_))
                && !FORMAT_CHECKERS.is_format(format, instance)
            {
                result.add_error(
                    ErrorKind::FormatMismatch,
                    context,
                    instance,
                    details(&[("format", Value::String(format.clone()))]),
                );
            }
        }
    }

    fn validate_string(
        &self,
        node: &SubSchema,
        instance: &Value,
        item: &str,
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) {
        // Lengths are unicode code points, not bytes
        let length = item.chars().count() as u64;
        if let Some(min) = node.min_length {
            if length < min {
                result.add_error(
                    ErrorKind::StringGte,
                    context,
                    instance,
                    details(&[("min", Value::from(min))]),
                );
            }
        }
        if let Some(max) = node.max_length {
            if length > max {
                result.add_error(
                    ErrorKind::StringLte,
                    context,
                    instance,
                    details(&[("max", Value::from(max))]),
                );
            }
        }
        if let Some((source, regex)) = &node.pattern {
            if !regex_matches(regex, item) {
                result.add_error(
                    ErrorKind::PatternMismatch,
                    context,
                    instance,
                    details(&[("pattern", Value::String(source.clone()))]),
                );
            }
        }
    }

    fn validate_number(
        &self,
        node: &SubSchema,
        instance: &Value,
        number: &Number,
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) {
        let value = numbers::to_fraction(number);

        if let Some(multiple) = &node.multiple_of {
            let quotient = value.clone() / multiple.clone();
            if !numbers::is_integer_fraction(&quotient) {
                result.add_error(
                    ErrorKind::MultipleOf,
                    context,
                    instance,
                    details(&[(
                        "multiple",
                        Value::String(numbers::decimal_string(multiple)),
                    )]),
                );
            }
        }

        if let Some(maximum) = &node.maximum {
            if value > *maximum {
                result.add_error(
                    ErrorKind::NumberLte,
                    context,
                    instance,
                    details(&[("max", Value::String(numbers::decimal_string(maximum)))]),
                );
            }
        }
        if let Some(maximum) = &node.exclusive_maximum {
            if value >= *maximum {
                result.add_error(
                    ErrorKind::NumberLt,
                    context,
                    instance,
                    details(&[("max", Value::String(numbers::decimal_string(maximum)))]),
                );
            }
        }
        if let Some(minimum) = &node.minimum {
            if value < *minimum {
                result.add_error(
                    ErrorKind::NumberGte,
                    context,
                    instance,
                    details(&[("min", Value::String(numbers::decimal_string(minimum)))]),
                );
            }
        }
        if let Some(minimum) = &node.exclusive_minimum {
            if value <= *minimum {
                result.add_error(
                    ErrorKind::NumberGt,
                    context,
                    instance,
                    details(&[("min", Value::String(numbers::decimal_string(minimum)))]),
                );
            }
        }
    }

    fn validate_array(
        &self,
        node: &SubSchema,
        instance: &Value,
        items: &[Value],
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) {
        if node.items_single {
            if let Some(&single) = node.items_children.first() {
                for (index, item) in items.iter().enumerate() {
                    let sub_context = context.push(index);
                    self.validate_recursive(single, item, result, &sub_context);
                }
            }
        } else if !node.items_children.is_empty() {
            let positions = node.items_children.len();
            for (index, (&child, item)) in node.items_children.iter().zip(items).enumerate() {
                let sub_context = context.push(index);
                self.validate_recursive(child, item, result, &sub_context);
            }
            if items.len() > positions {
                match node.additional_items {
                    Some(SchemaOrBool::DenyAll) => {
                        result.add_error(
                            ErrorKind::ArrayNoAdditionalItems,
                            context,
                            instance,
                            Map::new(),
                        );
                    }
                    Some(SchemaOrBool::Node(extra)) => {
                        for (index, item) in items.iter().enumerate().skip(positions) {
                            let sub_context = context.push(index);
                            self.validate_recursive(extra, item, result, &sub_context);
                        }
                    }
                    Some(SchemaOrBool::AllowAll) | None => {}
                }
            }
        }

        let count = items.len() as u64;
        if let Some(min) = node.min_items {
            if count < min {
                result.add_error(
                    ErrorKind::ArrayMinItems,
                    context,
                    instance,
                    details(&[("min", Value::from(min))]),
                );
            }
        }
        if let Some(max) = node.max_items {
            if count > max {
                result.add_error(
                    ErrorKind::ArrayMaxItems,
                    context,
                    instance,
                    details(&[("max", Value::from(max))]),
                );
            }
        }

        if node.unique_items {
            let mut seen: AHashMap<String, usize> = AHashMap::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let canonical = numbers::canonical_string(item);
                if let Some(&first) = seen.get(&canonical) {
                    result.add_error(
                        ErrorKind::ArrayItemsUnique,
                        context,
                        instance,
                        details(&[("i", Value::from(first)), ("j", Value::from(index))]),
                    );
                } else {
                    seen.insert(canonical, index);
                }
            }
        }

        if let Some(contains) = node.contains {
            let found = items
                .iter()
                .any(|item| self.sub_validate(contains, item, context).valid());
            if !found {
                result.add_error(ErrorKind::ArrayContains, context, instance, Map::new());
            }
        }
    }

    fn validate_object(
        &self,
        node: &SubSchema,
        instance: &Value,
        object: &Map<String, Value>,
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) {
        let count = object.len() as u64;
        if let Some(min) = node.min_properties {
            if count < min {
                result.add_error(
                    ErrorKind::ObjectMinProperties,
                    context,
                    instance,
                    details(&[("min", Value::from(min))]),
                );
            }
        }
        if let Some(max) = node.max_properties {
            if count > max {
                result.add_error(
                    ErrorKind::ObjectMaxProperties,
                    context,
                    instance,
                    details(&[("max", Value::from(max))]),
                );
            }
        }

        for name in &node.required {
            if !object.contains_key(name) {
                result.add_error(
                    ErrorKind::Required,
                    context,
                    instance,
                    details(&[("property", Value::String(name.clone()))]),
                );
            }
        }

        for (key, value) in object {
            let named = node
                .properties_children
                .iter()
                .any(|&child| self.arena.get(child).property == *key);
            let pattern_matched =
                self.validate_pattern_property(node, key, value, result, context);
            // A key is "additional" only if properties does not name it and
            // no patternProperties regex matches it, in that order
            if !named && !pattern_matched {
                match node.additional_properties {
                    Some(SchemaOrBool::DenyAll) => {
                        result.add_error(
                            ErrorKind::AdditionalPropertyNotAllowed,
                            context,
                            value,
                            details(&[("property", Value::String(key.clone()))]),
                        );
                    }
                    Some(SchemaOrBool::Node(extra)) => {
                        let sub_context = context.push(key.as_str());
                        self.validate_recursive(extra, value, result, &sub_context);
                    }
                    Some(SchemaOrBool::AllowAll) | None => {}
                }
            }
        }

        if let Some(names_schema) = node.property_names {
            for key in object.keys() {
                let name_value = Value::String(key.clone());
                if !self.sub_validate(names_schema, &name_value, context).valid() {
                    result.add_error(
                        ErrorKind::InvalidPropertyName,
                        context,
                        &name_value,
                        details(&[("property", Value::String(key.clone()))]),
                    );
                }
            }
        }
    }

    fn validate_pattern_property(
        &self,
        node: &SubSchema,
        key: &str,
        value: &Value,
        result: &mut ValidationResult,
        context: &JsonContext<'_>,
    ) -> bool {
        let mut matched = false;
        for pattern in &node.pattern_properties {
            if regex_matches(&pattern.regex, key) {
                matched = true;
                let sub_context = context.push(key);
                let sub_result = self.sub_validate(pattern.node, value, &sub_context);
                if !sub_result.valid() {
                    result.add_error(
                        ErrorKind::InvalidPropertyPattern,
                        context,
                        value,
                        details(&[
                            ("property", Value::String(key.to_string())),
                            ("pattern", Value::String(pattern.source.clone())),
                        ]),
                    );
                }
            }
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use crate::loaders::StringLoader;
    use crate::result::ErrorKind;
    use crate::schema::SchemaLoader;
    use serde_json::{json, Value};
    use test_case::test_case;

    fn validate(schema: &str, instance: Value) -> crate::result::ValidationResult {
        let compiled = SchemaLoader::new()
            .compile(&StringLoader::new(schema))
            .expect("valid schema");
        compiled.validate_value(&instance)
    }

    #[test_case(r#"{"anyOf": [{"type": "integer"}, {"minimum": 2}]}"#, json!(1), true)]
    #[test_case(r#"{"anyOf": [{"type": "integer"}, {"minimum": 2}]}"#, json!(1.5), false)]
    #[test_case(r#"{"allOf": [{"type": "integer"}, {"minimum": 2}]}"#, json!(3), true)]
    #[test_case(r#"{"allOf": [{"type": "integer"}, {"minimum": 2}]}"#, json!(1), false)]
    #[test_case(r#"{"not": {"type": "integer"}}"#, json!("x"), true)]
    #[test_case(r#"{"not": {"type": "integer"}}"#, json!(1), false)]
    #[test_case(r#"{"if": {"minimum": 10}, "then": {"multipleOf": 2}}"#, json!(12), true)]
    #[test_case(r#"{"if": {"minimum": 10}, "then": {"multipleOf": 2}}"#, json!(11), false)]
    #[test_case(r#"{"if": {"minimum": 10}, "else": {"multipleOf": 2}}"#, json!(4), true)]
    #[test_case(r#"{"if": {"minimum": 10}, "else": {"multipleOf": 2}}"#, json!(3), false)]
    #[test_case(r#"{"dependencies": {"a": ["b"]}}"#, json!({"a": 1, "b": 2}), true)]
    #[test_case(r#"{"dependencies": {"a": ["b"]}}"#, json!({"a": 1}), false)]
    #[test_case(r#"{"dependencies": {"a": {"required": ["b"]}}}"#, json!({"a": 1}), false)]
    #[test_case(r#"{"contains": {"minimum": 5}}"#, json!([1, 7]), true)]
    #[test_case(r#"{"contains": {"minimum": 5}}"#, json!([1, 2]), false)]
    #[test_case(r#"{"propertyNames": {"maxLength": 3}}"#, json!({"ab": 1}), true)]
    #[test_case(r#"{"propertyNames": {"maxLength": 3}}"#, json!({"abcd": 1}), false)]
    #[test_case(r#"{"uniqueItems": true}"#, json!([1, 2]), true)]
    #[test_case(r#"{"uniqueItems": true}"#, json!([1, 1.0]), false)]
    #[test_case(r#"{"items": [{"type": "integer"}], "additionalItems": false}"#, json!([1]), true)]
    #[test_case(r#"{"items": [{"type": "integer"}], "additionalItems": false}"#, json!([1, 2]), false)]
    #[test_case(r#"{"multipleOf": 0.0001}"#, json!(0.0075), true)]
    #[test_case(r#"{"multipleOf": 0.0001}"#, json!(0.00751), false)]
    #[test_case(r#"{"exclusiveMinimum": 1.1}"#, json!(1.1), false)]
    #[test_case(r#"{"exclusiveMinimum": 1.1}"#, json!(1.2), true)]
    #[test_case(r#"{"minLength": 2}"#, json!("日本"), true)]
    #[test_case(r#"{"minLength": 3}"#, json!("日本"), false)]
    #[test_case(r#"{"format": "no-such-format"}"#, json!("anything"), true)]
    fn validity(schema: &str, instance: Value, expected: bool) {
        assert_eq!(
            validate(schema, instance.clone()).valid(),
            expected,
            "schema={} instance={}",
            schema,
            instance
        );
    }

    #[test]
    fn boolean_false_schema() {
        let result = validate("false", json!(1));
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].kind(), ErrorKind::FalseSchema);
        assert!(validate("true", json!(1)).valid());
    }

    #[test]
    fn additional_property_context() {
        let result = validate(
            r#"{"properties": {"a": {}}, "additionalProperties": false}"#,
            json!({"a": 1, "b": 2}),
        );
        assert_eq!(result.errors().len(), 1);
        let error = &result.errors()[0];
        assert_eq!(error.kind(), ErrorKind::AdditionalPropertyNotAllowed);
        assert_eq!(error.field(), "b");
        assert_eq!(
            error.description(),
            "Additional property b is not allowed"
        );
    }

    #[test]
    fn any_of_reports_closest_branch() {
        // The second branch scores higher (the type gate passes), so its
        // errors are the ones surfaced next to the anyOf finding
        let result = validate(
            r#"{"anyOf": [{"type": "string"}, {"type": "object", "required": ["a"]}]}"#,
            json!({"b": 1}),
        );
        assert!(!result.valid());
        let kinds: Vec<_> = result.errors().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds[0], ErrorKind::NumberAnyOf);
        assert!(kinds.contains(&ErrorKind::Required));
        assert!(!kinds.contains(&ErrorKind::InvalidType));
    }

    #[test]
    fn nested_contexts() {
        let result = validate(
            r#"{"properties": {"a": {"items": {"type": "integer"}}}}"#,
            json!({"a": [1, "x"]}),
        );
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].context().to_string(), "(root).a.1");
    }
}
