//! Recursive insertion of declared `default` values into an instance.
use crate::error::SchemaError;
use crate::schema::Schema;
use crate::subschema::NodeId;
use serde_json::{Map, Value};

impl Schema {
    /// Insert any missing `default` values declared by the schema into
    /// `target`, non-destructively. A `None` target starts from an empty
    /// map. Existing values are never overwritten, so the operation is
    /// idempotent.
    pub fn insert_defaults(&self, target: Option<Value>) -> Result<Value, SchemaError> {
        let mut target = target.unwrap_or_else(|| Value::Object(Map::new()));
        let root = self.deref_node(self.root);
        let mut guard = Vec::new();
        match &mut target {
            Value::Object(map) => self.insert_object_defaults(root, map, &mut guard)?,
            Value::Array(items) => {
                let element = self.array_element_node(root);
                for item in items {
                    if let Value::Object(map) = item {
                        self.insert_object_defaults(element, map, &mut guard)?;
                    }
                }
            }
            _ => {
                return Err(SchemaError::invalid_schema(
                    "defaults target must be an object or an array of objects",
                ))
            }
        }
        Ok(target)
    }

    fn deref_node(&self, mut node_id: NodeId) -> NodeId {
        // Follow `$ref` links; the compiler guarantees chains are finite
        // because targets are memoised, but a degenerate self-link would not
        // be, hence the bounded walk
        for _ in 0..self.arena.len() {
            match self.arena.get(node_id).ref_schema {
                Some(target) if target != node_id => node_id = target,
                _ => break,
            }
        }
        node_id
    }

    fn array_element_node(&self, node_id: NodeId) -> NodeId {
        let node = self.arena.get(node_id);
        if node.items_single {
            if let Some(&single) = node.items_children.first() {
                return self.deref_node(single);
            }
        }
        node_id
    }

    fn insert_object_defaults(
        &self,
        node_id: NodeId,
        target: &mut Map<String, Value>,
        guard: &mut Vec<NodeId>,
    ) -> Result<(), SchemaError> {
        let node_id = self.deref_node(node_id);
        if guard.contains(&node_id) {
            return Ok(());
        }
        guard.push(node_id);

        let node = self.arena.get(node_id);
        for &child_id in &node.properties_children {
            // The property name lives on the child itself; its contents may
            // sit behind a `$ref`
            let key = self.arena.get(child_id).property.clone();
            let child_id = self.deref_node(child_id);
            let child = self.arena.get(child_id);

            if let Some(existing) = target.get_mut(&key) {
                // Never overwrite; step into maps and array elements only
                match existing {
                    Value::Object(inner) => {
                        self.insert_object_defaults(child_id, inner, guard)?;
                    }
                    Value::Array(items) => {
                        let element = self.array_element_node(child_id);
                        for item in items {
                            if let Value::Object(map) = item {
                                self.insert_object_defaults(element, map, guard)?;
                            }
                        }
                    }
                    _ => {}
                }
                continue;
            }

            if let Some(default) = &child.default {
                target.insert(key, default.clone());
                continue;
            }

            // An object schema with defaults somewhere inside contributes a
            // fresh map, but only if the recursion produced at least one key
            if !child.properties_children.is_empty() {
                let mut fresh = Map::new();
                self.insert_object_defaults(child_id, &mut fresh, guard)?;
                if !fresh.is_empty() {
                    target.insert(key, Value::Object(fresh));
                }
            }
        }

        guard.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::loaders::StringLoader;
    use crate::schema::SchemaLoader;
    use serde_json::json;

    fn compile(schema: &str) -> crate::schema::Schema {
        SchemaLoader::new()
            .compile(&StringLoader::new(schema))
            .expect("valid schema")
    }

    #[test]
    fn inserts_missing_defaults() {
        let schema = compile(r#"{"properties": {"foo": {"default": 5}}}"#);
        let result = schema.insert_defaults(Some(json!({}))).unwrap();
        assert_eq!(result, json!({"foo": 5}));
    }

    #[test]
    fn existing_values_win() {
        let schema = compile(r#"{"properties": {"foo": {"default": 5}}}"#);
        let result = schema.insert_defaults(Some(json!({"foo": 8}))).unwrap();
        assert_eq!(result, json!({"foo": 8}));
    }

    #[test]
    fn nil_target_becomes_a_map() {
        let schema = compile(r#"{"properties": {"foo": {"default": 5}}}"#);
        let result = schema.insert_defaults(None).unwrap();
        assert_eq!(result, json!({"foo": 5}));
    }

    #[test]
    fn nested_defaults_materialise_only_when_non_empty() {
        let schema = compile(
            r#"{
                "properties": {
                    "outer": {"properties": {"inner": {"default": 1}}},
                    "empty": {"properties": {"nothing": {"type": "string"}}}
                }
            }"#,
        );
        let result = schema.insert_defaults(Some(json!({}))).unwrap();
        assert_eq!(result, json!({"outer": {"inner": 1}}));
    }

    #[test]
    fn idempotent() {
        let schema = compile(
            r#"{
                "properties": {
                    "a": {"default": [1, 2]},
                    "b": {"properties": {"c": {"default": "x"}}}
                }
            }"#,
        );
        let once = schema.insert_defaults(Some(json!({}))).unwrap();
        let twice = schema.insert_defaults(Some(once.clone())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn scalar_target_is_an_error() {
        let schema = compile(r#"{"properties": {"foo": {"default": 5}}}"#);
        assert!(schema.insert_defaults(Some(json!(42))).is_err());
    }

    #[test]
    fn array_of_maps_target() {
        let schema = compile(r#"{"items": {"properties": {"foo": {"default": 5}}}}"#);
        let result = schema
            .insert_defaults(Some(json!([{}, {"foo": 8}])))
            .unwrap();
        assert_eq!(result, json!([{"foo": 5}, {"foo": 8}]));
    }

    #[test]
    fn cyclic_schemas_terminate() {
        let schema = compile(
            r##"{
                "properties": {
                    "next": {"$ref": "#"},
                    "value": {"default": 0}
                }
            }"##,
        );
        let result = schema.insert_defaults(Some(json!({}))).unwrap();
        assert_eq!(result, json!({"value": 0}));
    }
}
