//! The compiled `Schema` and the `SchemaLoader` entry point.
use crate::compiler::Compiler;
use crate::drafts::{self, Draft};
use crate::error::SchemaError;
use crate::loaders::{JsonLoader, RawLoader};
use crate::pool::SchemaPool;
use crate::reference::JsonReference;
use crate::result::ValidationResult;
use crate::subschema::{NodeId, SchemaArena};
use ahash::AHashMap;
use once_cell::sync::Lazy;
use serde_json::Value;

const EXPECT_MESSAGE: &str = "Valid meta-schema!";

static META_VALIDATORS: Lazy<AHashMap<Draft, Schema>> = Lazy::new(|| {
    let mut validators = AHashMap::with_capacity(3);
    for draft in [Draft::Draft4, Draft::Draft6, Draft::Draft7] {
        let url = draft.schema_url().expect(EXPECT_MESSAGE);
        let document = drafts::meta_schema_document(url).expect(EXPECT_MESSAGE).clone();
        let compiled = SchemaLoader::new()
            .with_draft(draft)
            // No meta-validation while compiling the meta-schema itself,
            // otherwise the process diverges
            .with_validation(false)
            .compile(&RawLoader::new(document))
            .expect(EXPECT_MESSAGE);
        validators.insert(draft, compiled);
    }
    validators
});

/// A compiled schema: the arena holding every [`SubSchema`] plus the root
/// node. Immutable once compiled; safe to share across threads, and
/// validation uses only local state.
///
/// [`SubSchema`]: crate::subschema::SubSchema
#[derive(Debug)]
pub struct Schema {
    pub(crate) arena: SchemaArena,
    pub(crate) root: NodeId,
    draft: Draft,
    document_reference: JsonReference,
}

impl Schema {
    /// The draft this schema was compiled under.
    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// The reference the root document was loaded from.
    pub fn document_reference(&self) -> &JsonReference {
        &self.document_reference
    }

    /// Load a candidate document and validate it against this schema.
    pub fn validate(&self, loader: &dyn JsonLoader) -> Result<ValidationResult, SchemaError> {
        let document = loader.load_json()?;
        Ok(self.validate_value(&document))
    }
}

/// Configures and performs schema compilation: draft selection, meta-schema
/// validation, and the pool of additional documents referenced by the main
/// schema.
pub struct SchemaLoader {
    pool: SchemaPool,
    draft: Draft,
    auto_detect: bool,
    validate: bool,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        SchemaLoader::new()
    }
}

impl SchemaLoader {
    /// A loader with auto-detection and meta-schema validation enabled.
    pub fn new() -> SchemaLoader {
        SchemaLoader {
            pool: SchemaPool::new(),
            draft: Draft::Hybrid,
            auto_detect: true,
            validate: true,
        }
    }

    /// Compile under a fixed draft. A recognised `$schema` keyword still
    /// wins while auto-detection is on.
    pub fn with_draft(&mut self, draft: Draft) -> &mut Self {
        self.draft = draft;
        self
    }

    /// Control whether `$schema` is used to pick the draft.
    pub fn with_auto_detect(&mut self, auto_detect: bool) -> &mut Self {
        self.auto_detect = auto_detect;
        self
    }

    /// Control whether schemas are validated against their meta-schema
    /// before compilation.
    pub fn with_validation(&mut self, validate: bool) -> &mut Self {
        self.validate = validate;
        self
    }

    fn draft_for(&self, document: &Value) -> Draft {
        if self.auto_detect {
            if let Some(detected) = drafts::draft_from_schema(document) {
                return detected;
            }
        }
        self.draft
    }

    /// Add a schema document to the pool under an explicit URL, so `$ref`s
    /// to it resolve without fetching.
    pub fn add_schema(&mut self, url: &str, loader: &dyn JsonLoader) -> Result<(), SchemaError> {
        let reference = JsonReference::parse(url)?;
        let mut document = loader.load_json()?;
        if self.validate {
            self.validate_metaschema(&document)?;
        }
        let draft = self.draft_for(&document);
        self.pool.parse_references(&mut document, &reference, draft)
    }

    /// Add schema documents to the pool. Each document should carry an `$id`
    /// so the main schema can reference it.
    pub fn add_schemas(&mut self, loaders: &[&dyn JsonLoader]) -> Result<(), SchemaError> {
        for loader in loaders {
            let mut document = loader.load_json()?;
            if self.validate {
                self.validate_metaschema(&document)?;
            }
            let draft = self.draft_for(&document);
            let reference = JsonReference::parse("#")?;
            self.pool
                .parse_references(&mut document, &reference, draft)?;
        }
        Ok(())
    }

    /// Compile the document produced by `loader` into a [`Schema`].
    pub fn compile(&mut self, loader: &dyn JsonLoader) -> Result<Schema, SchemaError> {
        let reference = loader.json_reference()?;
        self.pool.set_factory(loader.loader_factory());

        let root_raw = if reference.is_fragment_only() {
            let mut document = loader.load_json()?;
            let draft = self.draft_for(&document);
            self.pool
                .parse_references(&mut document, &reference, draft)?;
            if reference.fragment().is_empty() {
                document
            } else {
                reference.pointer_get(&document)?.clone()
            }
        } else {
            // Fetching by reference parses the whole document into the pool
            // and resolves the fragment, if any
            self.pool.resolve(&reference, Draft::Hybrid)?
        };

        if self.validate {
            self.validate_metaschema(&root_raw)?;
        }
        let draft = self.draft_for(&root_raw);

        let compiler = Compiler::new(&mut self.pool, draft);
        let (arena, root) = compiler.compile(&root_raw, reference.clone())?;
        Ok(Schema {
            arena,
            root,
            draft,
            document_reference: reference,
        })
    }

    fn validate_metaschema(&self, document: &Value) -> Result<(), SchemaError> {
        // Boolean schemas are trivially well-formed; non-objects are left
        // for the compiler to reject with a precise message
        if !document.is_object() {
            return Ok(());
        }
        if let Some(declared) = document.get("$schema") {
            if !declared.is_string() {
                return Err(SchemaError::must_be("$schema", "string"));
            }
        }
        let draft = self.draft_for(document);
        if draft == Draft::Hybrid {
            return Ok(());
        }
        let meta = META_VALIDATORS
            .get(&draft)
            .ok_or_else(|| SchemaError::Internal(format!("no meta-schema for {:?}", draft)))?;
        let result = meta.validate_value(document);
        if !result.valid() {
            let findings = result
                .errors()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>()
                .join("\n");
            return Err(SchemaError::MetaValidation(findings));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaLoader")
            .field("draft", &self.draft)
            .field("auto_detect", &self.auto_detect)
            .field("validate", &self.validate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaLoader;
    use crate::drafts::Draft;
    use crate::loaders::StringLoader;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(r#"{"$schema": "http://json-schema.org/draft-07/schema#"}"#, Draft::Draft7)]
    #[test_case(r#"{"$schema": "http://json-schema.org/draft-06/schema#"}"#, Draft::Draft6)]
    #[test_case(r#"{"$schema": "http://json-schema.org/draft-04/schema#"}"#, Draft::Draft4)]
    #[test_case(r#"{}"#, Draft::Hybrid)]
    fn draft_auto_detection(schema: &str, expected: Draft) {
        let compiled = SchemaLoader::new()
            .compile(&StringLoader::new(schema))
            .unwrap();
        assert_eq!(compiled.draft(), expected);
    }

    #[test]
    fn meta_validation_rejects_malformed_schemas() {
        let schema = r#"{
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": 1
        }"#;
        let error = SchemaLoader::new()
            .compile(&StringLoader::new(schema))
            .expect_err("must fail meta-validation");
        assert!(
            error.to_string().contains("meta-schema"),
            "unexpected error: {}",
            error
        );
    }

    #[test]
    fn meta_validation_can_be_disabled() {
        let schema = r#"{
            "$schema": "http://json-schema.org/draft-07/schema#",
            "minLength": 1
        }"#;
        let compiled = SchemaLoader::new()
            .with_validation(false)
            .compile(&StringLoader::new(schema))
            .unwrap();
        assert!(compiled.validate_value(&json!("x")).valid());
    }

    #[test]
    fn explicit_draft_without_auto_detect() {
        let schema = r#"{"$schema": "http://json-schema.org/draft-07/schema#"}"#;
        let compiled = SchemaLoader::new()
            .with_auto_detect(false)
            .with_draft(Draft::Draft4)
            .compile(&StringLoader::new(schema))
            .unwrap();
        assert_eq!(compiled.draft(), Draft::Draft4);
    }

    #[test]
    fn schemas_are_shareable_across_threads() {
        let compiled = SchemaLoader::new()
            .compile(&StringLoader::new(r#"{"type": "integer"}"#))
            .unwrap();
        let shared = std::sync::Arc::new(compiled);
        let mut handles = Vec::new();
        for value in 0..4 {
            let schema = std::sync::Arc::clone(&shared);
            handles.push(std::thread::spawn(move || {
                schema.validate_value(&json!(value)).valid()
            }));
        }
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
