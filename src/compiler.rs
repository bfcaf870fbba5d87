//! Schema compilation: walk a decoded document and emit the sub-schema
//! graph, validating every keyword argument on the way.
//!
//! References are resolved eagerly. A memo of already-compiled nodes keyed by
//! absolute reference makes cyclic `$ref` chains terminate: the target node
//! is registered before its body is parsed, so a back-edge links to the
//! in-flight node instead of recursing.
use crate::drafts::{self, Draft};
use crate::error::SchemaError;
use crate::numbers;
use crate::pool::SchemaPool;
use crate::reference::JsonReference;
use crate::subschema::{
    Dependency, NodeId, PatternProperty, PrimitiveType, SchemaArena, SchemaOrBool, SubSchema,
    ROOT_PROPERTY,
};
use ahash::AHashMap;
use serde_json::{Map, Value};

pub(crate) struct Compiler<'a> {
    arena: SchemaArena,
    pool: &'a mut SchemaPool,
    reference_pool: AHashMap<String, NodeId>,
    draft: Draft,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(pool: &'a mut SchemaPool, draft: Draft) -> Compiler<'a> {
        Compiler {
            arena: SchemaArena::new(),
            pool,
            reference_pool: AHashMap::new(),
            draft,
        }
    }

    pub(crate) fn compile(
        mut self,
        document: &Value,
        reference: JsonReference,
    ) -> Result<(SchemaArena, NodeId), SchemaError> {
        let root = self.arena.alloc(SubSchema::new(
            self.draft,
            reference.clone(),
            ROOT_PROPERTY.to_string(),
            None,
        ));
        self.reference_pool.insert(reference.to_string(), root);
        // The root is also addressable by its declared identity
        if let Some(id) = drafts::id_of(self.draft, document) {
            if let Ok(resolved) = reference.inherit(id) {
                self.reference_pool.insert(resolved.to_string(), root);
            }
        }
        self.parse_schema(document, root)?;
        Ok((self.arena, root))
    }

    fn node_reference(&self, node: NodeId) -> JsonReference {
        self.arena.get(node).reference.clone()
    }

    fn compile_child(
        &mut self,
        raw: &Value,
        property: &str,
        parent: NodeId,
    ) -> Result<NodeId, SchemaError> {
        let reference = self.node_reference(parent);
        let child = self.arena.alloc(SubSchema::new(
            self.draft,
            reference,
            property.to_string(),
            Some(parent),
        ));
        self.parse_schema(raw, child)?;
        Ok(child)
    }

    fn parse_schema(&mut self, raw: &Value, node: NodeId) -> Result<(), SchemaError> {
        match raw {
            Value::Bool(pass) => {
                if !self.draft.supports_boolean_schemas() {
                    return Err(SchemaError::must_be("schema", "object"));
                }
                self.arena.get_mut(node).pass = Some(*pass);
                Ok(())
            }
            Value::Object(object) => self.parse_object(raw, object, node),
            _ => {
                let expected = if self.draft.supports_boolean_schemas() {
                    "object/boolean"
                } else {
                    "object"
                };
                Err(SchemaError::must_be("schema", expected))
            }
        }
    }

    #[allow(clippy::too_many_lines)] // one arm per keyword, boring but linear
    fn parse_object(
        &mut self,
        raw: &Value,
        object: &Map<String, Value>,
        node: NodeId,
    ) -> Result<(), SchemaError> {
        // id / $id re-roots the base reference for every descendant
        let id_keyword = self.draft.id_keyword();
        if let Some(value) = object.get(id_keyword) {
            if !value.is_string() {
                return Err(SchemaError::must_be(id_keyword, "string"));
            }
        }
        if let Some(id) = drafts::id_of(self.draft, raw) {
            let resolved = self.node_reference(node).inherit(id)?;
            let schema = self.arena.get_mut(node);
            schema.id = Some(resolved.clone());
            schema.reference = resolved;
        }

        // $ref isolates the node: sibling keywords are ignored in drafts 4-7
        if let Some(value) = object.get("$ref") {
            let target = value
                .as_str()
                .ok_or_else(|| SchemaError::must_be("$ref", "string"))?;
            let target_reference = self.node_reference(node).inherit(target)?;
            let key = target_reference.to_string();
            if let Some(&compiled) = self.reference_pool.get(&key) {
                self.arena.get_mut(node).ref_schema = Some(compiled);
            } else {
                let raw_target = self.pool.resolve(&target_reference, Draft::Hybrid)?;
                let referenced = self.arena.alloc(SubSchema::new(
                    self.draft,
                    target_reference,
                    key.clone(),
                    None,
                ));
                self.reference_pool.insert(key, referenced);
                self.parse_schema(&raw_target, referenced)?;
                self.arena.get_mut(node).ref_schema = Some(referenced);
            }
            return Ok(());
        }

        if let Some(value) = object.get("title") {
            let title = value
                .as_str()
                .ok_or_else(|| SchemaError::must_be("title", "string"))?;
            self.arena.get_mut(node).title = Some(title.to_string());
        }
        if let Some(value) = object.get("description") {
            let description = value
                .as_str()
                .ok_or_else(|| SchemaError::must_be("description", "string"))?;
            self.arena.get_mut(node).description = Some(description.to_string());
        }
        if let Some(value) = object.get("default") {
            self.arena.get_mut(node).default = Some(value.clone());
        }

        if let Some(value) = object.get("type") {
            match value {
                Value::String(name) => self.add_type(node, name)?,
                Value::Array(names) => {
                    for item in names {
                        let name = item.as_str().ok_or_else(|| {
                            SchemaError::must_be("type", "string/array of strings")
                        })?;
                        self.add_type(node, name)?;
                    }
                }
                _ => return Err(SchemaError::must_be("type", "string/array of strings")),
            }
        }

        if let Some(value) = object.get("properties") {
            let map = value
                .as_object()
                .ok_or_else(|| SchemaError::must_be("properties", "object"))?;
            for (key, subschema) in map {
                let child = self.compile_child(subschema, key, node)?;
                self.arena.get_mut(node).properties_children.push(child);
            }
        }

        if let Some(value) = object.get("patternProperties") {
            let map = value
                .as_object()
                .ok_or_else(|| SchemaError::must_be("patternProperties", "object"))?;
            for (key, subschema) in map {
                let regex = fancy_regex::Regex::new(key)
                    .map_err(|_| SchemaError::InvalidRegex(key.clone()))?;
                let child = self.compile_child(subschema, key, node)?;
                self.arena.get_mut(node).pattern_properties.push(PatternProperty {
                    source: key.clone(),
                    regex,
                    node: child,
                });
            }
        }

        if let Some(value) = object.get("additionalProperties") {
            let compiled = self.parse_schema_or_bool(value, "additionalProperties", node)?;
            self.arena.get_mut(node).additional_properties = Some(compiled);
        }

        if let Some(value) = object.get("items") {
            match value {
                Value::Array(positions) => {
                    for position in positions {
                        let child = self.compile_child(position, "items", node)?;
                        self.arena.get_mut(node).items_children.push(child);
                    }
                }
                Value::Object(_) | Value::Bool(_) => {
                    let child = self.compile_child(value, "items", node)?;
                    let schema = self.arena.get_mut(node);
                    schema.items_children.push(child);
                    schema.items_single = true;
                }
                _ => {
                    return Err(SchemaError::must_be("items", "schema or array of schemas"));
                }
            }
        }

        if let Some(value) = object.get("additionalItems") {
            let compiled = self.parse_schema_or_bool(value, "additionalItems", node)?;
            self.arena.get_mut(node).additional_items = Some(compiled);
        }

        if let Some(value) = object.get("dependencies") {
            let map = value
                .as_object()
                .ok_or_else(|| SchemaError::must_be("dependencies", "object"))?;
            for (key, entry) in map {
                let dependency = match entry {
                    Value::Array(names) => {
                        let mut required = Vec::with_capacity(names.len());
                        for name in names {
                            let name = name.as_str().ok_or_else(|| {
                                SchemaError::must_be("dependency", "schema or array of strings")
                            })?;
                            required.push(name.to_string());
                        }
                        Dependency::Properties(required)
                    }
                    Value::Object(_) | Value::Bool(_) => {
                        Dependency::Node(self.compile_child(entry, key, node)?)
                    }
                    _ => {
                        return Err(SchemaError::must_be(
                            "dependency",
                            "schema or array of strings",
                        ))
                    }
                };
                self.arena
                    .get_mut(node)
                    .dependencies
                    .insert(key.clone(), dependency);
            }
        }

        if let Some(value) = object.get("required") {
            let names = value
                .as_array()
                .ok_or_else(|| SchemaError::must_be("required", "array of strings"))?;
            for name in names {
                let name = name
                    .as_str()
                    .ok_or_else(|| SchemaError::must_be("required", "array of strings"))?;
                let schema = self.arena.get_mut(node);
                if schema.required.iter().any(|existing| existing == name) {
                    return Err(SchemaError::invalid_schema("required items must be unique"));
                }
                schema.required.push(name.to_string());
            }
        }

        self.parse_numeric_bounds(object, node)?;
        self.parse_counts(object, node)?;

        if let Some(value) = object.get("pattern") {
            let pattern = value
                .as_str()
                .ok_or_else(|| SchemaError::must_be("pattern", "string"))?;
            let regex = fancy_regex::Regex::new(pattern)
                .map_err(|_| SchemaError::InvalidRegex(pattern.to_string()))?;
            self.arena.get_mut(node).pattern = Some((pattern.to_string(), regex));
        }

        if let Some(value) = object.get("format") {
            let format = value
                .as_str()
                .ok_or_else(|| SchemaError::must_be("format", "string"))?;
            self.arena.get_mut(node).format = Some(format.to_string());
        }

        if let Some(value) = object.get("uniqueItems") {
            let unique = value
                .as_bool()
                .ok_or_else(|| SchemaError::must_be("uniqueItems", "boolean"))?;
            self.arena.get_mut(node).unique_items = unique;
        }

        if self.draft.supports_keyword("contains") {
            if let Some(value) = object.get("contains") {
                let child = self.compile_child(value, "contains", node)?;
                self.arena.get_mut(node).contains = Some(child);
            }
        }

        if self.draft.supports_keyword("propertyNames") {
            if let Some(value) = object.get("propertyNames") {
                let child = self.compile_child(value, "propertyNames", node)?;
                self.arena.get_mut(node).property_names = Some(child);
            }
        }

        if let Some(value) = object.get("enum") {
            let options = value
                .as_array()
                .ok_or_else(|| SchemaError::must_be("enum", "array"))?;
            for option in options {
                let canonical = numbers::canonical_string(option);
                let schema = self.arena.get_mut(node);
                if schema.enum_values.iter().any(|existing| existing == &canonical) {
                    return Err(SchemaError::invalid_schema("enum items must be unique"));
                }
                schema.enum_values.push(canonical);
            }
        }

        if self.draft.supports_keyword("const") {
            if let Some(value) = object.get("const") {
                self.arena.get_mut(node).const_value = Some(numbers::canonical_string(value));
            }
        }

        if let Some(value) = object.get("allOf") {
            let branches = value
                .as_array()
                .ok_or_else(|| SchemaError::must_be("allOf", "array of schemas"))?;
            for branch in branches {
                let child = self.compile_child(branch, "allOf", node)?;
                self.arena.get_mut(node).all_of.push(child);
            }
        }
        if let Some(value) = object.get("anyOf") {
            let branches = value
                .as_array()
                .ok_or_else(|| SchemaError::must_be("anyOf", "array of schemas"))?;
            for branch in branches {
                let child = self.compile_child(branch, "anyOf", node)?;
                self.arena.get_mut(node).any_of.push(child);
            }
        }
        if let Some(value) = object.get("oneOf") {
            let branches = value
                .as_array()
                .ok_or_else(|| SchemaError::must_be("oneOf", "array of schemas"))?;
            for branch in branches {
                let child = self.compile_child(branch, "oneOf", node)?;
                self.arena.get_mut(node).one_of.push(child);
            }
        }

        if let Some(value) = object.get("not") {
            let child = self.compile_child(value, "not", node)?;
            self.arena.get_mut(node).not = Some(child);
        }

        if self.draft.supports_keyword("if") {
            if let Some(value) = object.get("if") {
                let child = self.compile_child(value, "if", node)?;
                self.arena.get_mut(node).if_schema = Some(child);
            }
            if let Some(value) = object.get("then") {
                let child = self.compile_child(value, "then", node)?;
                self.arena.get_mut(node).then_schema = Some(child);
            }
            if let Some(value) = object.get("else") {
                let child = self.compile_child(value, "else", node)?;
                self.arena.get_mut(node).else_schema = Some(child);
            }
        }

        if let Some(value) = object.get("definitions") {
            let map = value
                .as_object()
                .ok_or_else(|| SchemaError::must_be("definitions", "object"))?;
            for (key, subschema) in map {
                let child = self.compile_child(subschema, key, node)?;
                self.arena.get_mut(node).definitions.push(child);
            }
        }

        Ok(())
    }

    fn add_type(&mut self, node: NodeId, name: &str) -> Result<(), SchemaError> {
        let kind = PrimitiveType::from_str(name)
            .ok_or_else(|| SchemaError::invalid_schema(format!("{} is not a valid type", name)))?;
        if !self.arena.get_mut(node).types.add(kind) {
            return Err(SchemaError::invalid_schema(format!(
                "{} type is duplicated",
                name
            )));
        }
        Ok(())
    }

    fn parse_schema_or_bool(
        &mut self,
        value: &Value,
        keyword: &str,
        node: NodeId,
    ) -> Result<SchemaOrBool, SchemaError> {
        match value {
            Value::Bool(true) => Ok(SchemaOrBool::AllowAll),
            Value::Bool(false) => Ok(SchemaOrBool::DenyAll),
            Value::Object(_) => Ok(SchemaOrBool::Node(self.compile_child(value, keyword, node)?)),
            _ => Err(SchemaError::must_be(keyword, "boolean/schema")),
        }
    }

    fn parse_numeric_bounds(
        &mut self,
        object: &Map<String, Value>,
        node: NodeId,
    ) -> Result<(), SchemaError> {
        if let Some(value) = object.get("multipleOf") {
            let number = match value {
                Value::Number(number) => number,
                _ => return Err(SchemaError::must_be("multipleOf", "number")),
            };
            let fraction = numbers::to_fraction(number);
            if fraction <= numbers::zero() {
                return Err(SchemaError::invalid_schema(
                    "multipleOf must be strictly greater than 0",
                ));
            }
            self.arena.get_mut(node).multiple_of = Some(fraction);
        }

        if let Some(value) = object.get("minimum") {
            let number = match value {
                Value::Number(number) => number,
                _ => return Err(SchemaError::must_be("minimum", "number")),
            };
            self.arena.get_mut(node).minimum = Some(numbers::to_fraction(number));
        }
        if let Some(value) = object.get("maximum") {
            let number = match value {
                Value::Number(number) => number,
                _ => return Err(SchemaError::must_be("maximum", "number")),
            };
            self.arena.get_mut(node).maximum = Some(numbers::to_fraction(number));
        }

        // In draft 4 the exclusive keywords are boolean flags on minimum and
        // maximum; drafts 6/7 made them standalone numeric bounds. Hybrid
        // accepts either shape, keyed on the value type.
        if let Some(value) = object.get("exclusiveMinimum") {
            match value {
                Value::Bool(flag) if self.draft.boolean_exclusive_bounds() => {
                    if *flag {
                        let schema = self.arena.get_mut(node);
                        match schema.minimum.take() {
                            Some(bound) => schema.exclusive_minimum = Some(bound),
                            None => {
                                return Err(SchemaError::invalid_schema(
                                    "exclusiveMinimum cannot be used without minimum",
                                ))
                            }
                        }
                    }
                }
                Value::Number(number) if self.draft.numeric_exclusive_bounds() => {
                    self.arena.get_mut(node).exclusive_minimum =
                        Some(numbers::to_fraction(number));
                }
                _ => {
                    return Err(SchemaError::must_be(
                        "exclusiveMinimum",
                        self.exclusive_bound_shape(),
                    ))
                }
            }
        }
        if let Some(value) = object.get("exclusiveMaximum") {
            match value {
                Value::Bool(flag) if self.draft.boolean_exclusive_bounds() => {
                    if *flag {
                        let schema = self.arena.get_mut(node);
                        match schema.maximum.take() {
                            Some(bound) => schema.exclusive_maximum = Some(bound),
                            None => {
                                return Err(SchemaError::invalid_schema(
                                    "exclusiveMaximum cannot be used without maximum",
                                ))
                            }
                        }
                    }
                }
                Value::Number(number) if self.draft.numeric_exclusive_bounds() => {
                    self.arena.get_mut(node).exclusive_maximum =
                        Some(numbers::to_fraction(number));
                }
                _ => {
                    return Err(SchemaError::must_be(
                        "exclusiveMaximum",
                        self.exclusive_bound_shape(),
                    ))
                }
            }
        }

        let schema = self.arena.get(node);
        if let (Some(minimum), Some(maximum)) = (&schema.minimum, &schema.maximum) {
            if minimum > maximum {
                return Err(SchemaError::invalid_schema(
                    "minimum cannot be greater than maximum",
                ));
            }
        }
        Ok(())
    }

    const fn exclusive_bound_shape(&self) -> &'static str {
        match self.draft {
            Draft::Draft4 => "boolean",
            Draft::Hybrid => "boolean/number",
            _ => "number",
        }
    }

    fn parse_counts(
        &mut self,
        object: &Map<String, Value>,
        node: NodeId,
    ) -> Result<(), SchemaError> {
        let min_length = parse_count(object, "minLength")?;
        let max_length = parse_count(object, "maxLength")?;
        let min_items = parse_count(object, "minItems")?;
        let max_items = parse_count(object, "maxItems")?;
        let min_properties = parse_count(object, "minProperties")?;
        let max_properties = parse_count(object, "maxProperties")?;

        for (lower, upper, message) in [
            (
                min_length,
                max_length,
                "minLength cannot be greater than maxLength",
            ),
            (
                min_items,
                max_items,
                "minItems cannot be greater than maxItems",
            ),
            (
                min_properties,
                max_properties,
                "minProperties cannot be greater than maxProperties",
            ),
        ] {
            if let (Some(lower), Some(upper)) = (lower, upper) {
                if lower > upper {
                    return Err(SchemaError::invalid_schema(message));
                }
            }
        }

        let schema = self.arena.get_mut(node);
        schema.min_length = min_length;
        schema.max_length = max_length;
        schema.min_items = min_items;
        schema.max_items = max_items;
        schema.min_properties = min_properties;
        schema.max_properties = max_properties;
        Ok(())
    }
}

fn parse_count(object: &Map<String, Value>, keyword: &str) -> Result<Option<u64>, SchemaError> {
    let number = match object.get(keyword) {
        None => return Ok(None),
        Some(Value::Number(number)) => number,
        Some(_) => return Err(SchemaError::must_be(keyword, "integer")),
    };
    match numbers::as_nonneg_integer(number) {
        Some(count) => Ok(Some(count)),
        None if numbers::is_integer(number) => Err(SchemaError::invalid_schema(format!(
            "{} must be greater than or equal to 0",
            keyword
        ))),
        None => Err(SchemaError::invalid_schema(format!(
            "{} must be an integer",
            keyword
        ))),
    }
}
