//! Resource pooling: one decoded document per canonical URL, plus the
//! reference-rewriting pass that makes every `$ref` in a document absolute.
use crate::drafts::{self, Draft};
use crate::error::SchemaError;
use crate::loaders::{DefaultLoaderFactory, LoaderFactory};
use crate::reference::JsonReference;
use ahash::AHashMap;
use serde_json::Value;

/// Caches decoded documents by canonical URL and avoids fetching the same
/// resource twice. Constructed and consumed inside a single compile.
pub(crate) struct SchemaPool {
    documents: AHashMap<String, Value>,
    factory: Box<dyn LoaderFactory>,
}

impl SchemaPool {
    pub(crate) fn new() -> SchemaPool {
        SchemaPool {
            documents: AHashMap::new(),
            factory: Box::new(DefaultLoaderFactory),
        }
    }

    pub(crate) fn set_factory(&mut self, factory: Box<dyn LoaderFactory>) {
        self.factory = factory;
    }

    /// One-pass walk over a freshly loaded document: every `$id` is resolved
    /// against the local base and registered under its canonical URL, and
    /// every `$ref` string is overwritten with its absolute form. After this
    /// pass the compiler never sees a relative reference.
    pub(crate) fn parse_references(
        &mut self,
        document: &mut Value,
        base: &JsonReference,
        draft: Draft,
    ) -> Result<(), SchemaError> {
        self.parse_references_recursive(document, base, draft)?;
        self.documents
            .insert(base.canonical().to_string(), document.clone());
        Ok(())
    }

    fn parse_references_recursive(
        &mut self,
        document: &mut Value,
        base: &JsonReference,
        draft: Draft,
    ) -> Result<(), SchemaError> {
        match document {
            Value::Array(items) => {
                for item in items {
                    self.parse_references_recursive(item, base, draft)?;
                }
            }
            Value::Object(_) => {
                let mut local = base.clone();
                let mut registered = None;
                if let Some(id) = drafts::id_of(draft, document).map(str::to_string) {
                    // A malformed `$id` is left alone; the meta-schema pass
                    // reports it with better context
                    if let Ok(resolved) = base.inherit(&id) {
                        let key = resolved.to_string();
                        if self.documents.contains_key(&key) {
                            return Err(SchemaError::DuplicateId(key));
                        }
                        // Reserve the key now so sibling walks see the
                        // collision; the final document lands after the walk
                        self.documents.insert(key.clone(), Value::Null);
                        registered = Some(key);
                        local = resolved;
                    }
                }

                let rewritten = document
                    .get("$ref")
                    .and_then(Value::as_str)
                    .and_then(|target| local.inherit(target).ok())
                    .map(|resolved| resolved.to_string());
                if let Some(absolute) = rewritten {
                    document["$ref"] = Value::String(absolute);
                }

                if let Value::Object(object) = document {
                    for (key, value) in object.iter_mut() {
                        // `enum`/`const` contents are opaque values, not schemas
                        if key == "enum" || key == "const" {
                            continue;
                        }
                        self.parse_references_recursive(value, &local, draft)?;
                    }
                }

                if let Some(key) = registered {
                    self.documents.insert(key, document.clone());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Resolve `reference` to the sub-tree it denotes, fetching and parsing
    /// the owning document on a cache miss. Location-independent `$id`
    /// registrations win over the fragment-stripped lookup.
    pub(crate) fn resolve(
        &mut self,
        reference: &JsonReference,
        draft: Draft,
    ) -> Result<Value, SchemaError> {
        if let Some(document) = self.documents.get(&reference.to_string()) {
            return Ok(document.clone());
        }
        let canonical = reference.canonical().to_string();
        if !self.documents.contains_key(&canonical) {
            if reference.is_fragment_only() {
                return Err(SchemaError::InvalidReference(reference.to_string()));
            }
            let loader = self.factory.new_loader(&canonical);
            let mut document = loader.load_json()?;
            let base = JsonReference::parse(&canonical)?;
            self.parse_references(&mut document, &base, draft)?;
        }
        let document = self.documents.get(&canonical).ok_or_else(|| {
            SchemaError::Internal(format!("document {} missing from the pool", canonical))
        })?;
        Ok(reference.pointer_get(document)?.clone())
    }
}

impl std::fmt::Debug for SchemaPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.documents.keys().collect();
        keys.sort_unstable();
        f.debug_struct("SchemaPool").field("documents", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaPool;
    use crate::drafts::Draft;
    use crate::reference::JsonReference;
    use serde_json::json;

    #[test]
    fn refs_are_rewritten_to_absolute() {
        let mut pool = SchemaPool::new();
        let mut document = json!({
            "$id": "http://localhost:1234/root.json",
            "properties": {
                "foo": {"$ref": "other.json"},
                "bar": {"$ref": "#/definitions/baz"}
            },
            "definitions": {"baz": {"type": "integer"}}
        });
        let base = JsonReference::parse("http://localhost:1234/root.json").unwrap();
        pool.parse_references(&mut document, &base, Draft::Hybrid)
            .unwrap();
        assert_eq!(
            document["properties"]["foo"]["$ref"],
            json!("http://localhost:1234/other.json")
        );
        assert_eq!(
            document["properties"]["bar"]["$ref"],
            json!("http://localhost:1234/root.json#/definitions/baz")
        );
    }

    #[test]
    fn nested_id_changes_the_base() {
        let mut pool = SchemaPool::new();
        let mut document = json!({
            "$id": "http://localhost:1234/root.json",
            "definitions": {
                "folder": {
                    "$id": "folder/",
                    "items": {"$ref": "item.json"}
                }
            }
        });
        let base = JsonReference::parse("http://localhost:1234/root.json").unwrap();
        pool.parse_references(&mut document, &base, Draft::Hybrid)
            .unwrap();
        assert_eq!(
            document["definitions"]["folder"]["items"]["$ref"],
            json!("http://localhost:1234/folder/item.json")
        );
    }

    #[test]
    fn duplicated_id_is_rejected() {
        let mut pool = SchemaPool::new();
        let base = JsonReference::parse("#").unwrap();
        let mut first = json!({"$id": "http://example.com/one.json", "type": "integer"});
        pool.parse_references(&mut first, &base, Draft::Hybrid)
            .unwrap();
        let mut second = json!({"$id": "http://example.com/one.json", "type": "string"});
        let error = pool
            .parse_references(&mut second, &base, Draft::Hybrid)
            .unwrap_err();
        assert!(error.to_string().contains("duplicated id"));
    }

    #[test]
    fn location_independent_id_resolves_first() {
        let mut pool = SchemaPool::new();
        let mut document = json!({
            "$id": "http://localhost:1234/root.json",
            "definitions": {
                "A": {"$id": "#foo", "type": "integer"}
            }
        });
        let base = JsonReference::parse("http://localhost:1234/root.json").unwrap();
        pool.parse_references(&mut document, &base, Draft::Hybrid)
            .unwrap();
        let reference = JsonReference::parse("http://localhost:1234/root.json#foo").unwrap();
        let resolved = pool.resolve(&reference, Draft::Hybrid).unwrap();
        assert_eq!(resolved, json!({"$id": "#foo", "type": "integer"}));
    }
}
