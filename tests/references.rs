use schemawalk::{
    ErrorKind, InMemoryFileSystem, JsonLoader, ReferenceLoader, SchemaLoader, StringLoader,
};
use serde_json::json;
use std::sync::Arc;

#[test]
fn local_ref_behaves_like_its_target() {
    let mut loader = SchemaLoader::new();
    let direct = loader
        .compile(&StringLoader::new(r#"{"type": "integer"}"#))
        .unwrap();
    let mut loader = SchemaLoader::new();
    let via_ref = loader
        .compile(&StringLoader::new(
            r##"{
                "$ref": "#/definitions/foo",
                "definitions": {"foo": {"type": "integer"}}
            }"##,
        ))
        .unwrap();

    for instance in [json!(1), json!("x"), json!(2.5), json!(null)] {
        assert_eq!(
            direct.validate_value(&instance).valid(),
            via_ref.validate_value(&instance).valid(),
            "instance {}",
            instance
        );
    }
}

#[test]
fn chained_refs_resolve() {
    let schema = SchemaLoader::new()
        .compile(&StringLoader::new(
            r##"{
                "$ref": "#/definitions/c",
                "definitions": {
                    "a": {"type": "integer"},
                    "b": {"$ref": "#/definitions/a"},
                    "c": {"$ref": "#/definitions/b"}
                }
            }"##,
        ))
        .unwrap();
    assert!(schema.validate_value(&json!(3)).valid());
    assert!(!schema.validate_value(&json!("3")).valid());
}

#[test]
fn circular_references_terminate() {
    let schema = SchemaLoader::new()
        .compile(&StringLoader::new(
            r##"{
                "$ref": "#/definitions/user",
                "definitions": {
                    "user": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "won": {"items": {"$ref": "#/definitions/game"}}
                        }
                    },
                    "game": {
                        "type": "object",
                        "properties": {
                            "winner": {"$ref": "#/definitions/user"},
                            "loser": {"$ref": "#/definitions/user"}
                        }
                    }
                }
            }"##,
        ))
        .unwrap();

    let instance = json!({
        "name": "alice",
        "won": [{
            "winner": {"name": "alice"},
            "loser": {"name": "bob", "won": []}
        }]
    });
    assert!(schema.validate_value(&instance).valid());

    let bad = json!({
        "name": "alice",
        "won": [{"loser": {"name": 42}}]
    });
    let result = schema.validate_value(&bad);
    assert!(!result.valid());
    assert_eq!(
        result.errors()[0].context().to_string(),
        "(root).won.0.loser.name"
    );
}

#[test]
fn id_collision_is_a_compile_error() {
    let mut loader = SchemaLoader::new();
    let first = StringLoader::new(r#"{"$id": "http://example.com/a.json", "type": "integer"}"#);
    let second = StringLoader::new(r#"{"$id": "http://example.com/a.json", "type": "string"}"#);
    let error = loader
        .add_schemas(&[&first, &second])
        .expect_err("duplicate $id must fail");
    assert!(error.to_string().contains("duplicated id"));
}

#[test]
fn external_schema_by_id() {
    let mut loader = SchemaLoader::new();
    loader
        .add_schemas(&[&StringLoader::new(
            r#"{"$id": "http://localhost:1234/test1.json", "type": "integer"}"#,
        ) as &dyn JsonLoader])
        .unwrap();
    let schema = loader
        .compile(&ReferenceLoader::new("http://localhost:1234/test1.json"))
        .unwrap();
    let result = schema.validate_value(&json!("hello"));
    assert!(!result.valid());
    assert_eq!(result.errors()[0].kind(), ErrorKind::InvalidType);
}

#[test]
fn external_ref_via_pool() {
    let mut loader = SchemaLoader::new();
    loader
        .add_schema(
            "http://localhost:1234/string.json",
            &StringLoader::new(r#"{"type": "string", "minLength": 2}"#),
        )
        .unwrap();
    let schema = loader
        .compile(&StringLoader::new(
            r#"{"properties": {"name": {"$ref": "http://localhost:1234/string.json"}}}"#,
        ))
        .unwrap();
    assert!(schema.validate_value(&json!({"name": "ok"})).valid());
    assert!(!schema.validate_value(&json!({"name": "x"})).valid());
}

#[test]
fn file_references_resolve_through_the_same_filesystem() {
    let mut fs = InMemoryFileSystem::new();
    fs.add(
        "/schemas/root.json",
        r#"{"properties": {"child": {"$ref": "child.json"}}}"#,
    );
    fs.add("/schemas/child.json", r#"{"type": "boolean"}"#);
    let root = ReferenceLoader::with_filesystem("file:///schemas/root.json", Arc::new(fs));
    let schema = SchemaLoader::new().compile(&root).unwrap();
    assert!(schema.validate_value(&json!({"child": true})).valid());
    assert!(!schema.validate_value(&json!({"child": 1})).valid());
}

#[test]
fn missing_ref_target_is_a_compile_error() {
    let error = SchemaLoader::new()
        .compile(&StringLoader::new(r##"{"$ref": "#/definitions/missing"}"##))
        .expect_err("dangling pointer must fail");
    assert!(error.to_string().contains("invalid reference"));
}

#[test]
fn meta_schema_urls_compile_offline() {
    for url in [
        "http://json-schema.org/draft-04/schema#",
        "http://json-schema.org/draft-06/schema#",
        "http://json-schema.org/draft-07/schema#",
    ] {
        let schema = SchemaLoader::new()
            .compile(&ReferenceLoader::new(url))
            .unwrap_or_else(|err| panic!("{} failed to compile: {}", url, err));
        // Every meta-schema accepts itself
        let document = ReferenceLoader::new(url).load_json().unwrap();
        assert!(schema.validate_value(&document).valid(), "{}", url);
    }
}

#[test]
fn nested_id_changes_resolution_scope() {
    let schema = SchemaLoader::new()
        .compile(&StringLoader::new(
            r##"{
                "$id": "http://localhost:1234/scope_change_defs1.json",
                "type": "object",
                "properties": {
                    "list": {"$ref": "#/definitions/baz"}
                },
                "definitions": {
                    "baz": {
                        "$id": "baseUriChangeFolder/",
                        "type": "array",
                        "items": {"$ref": "folderInteger.json"},
                        "definitions": {
                            "int": {"$id": "folderInteger.json", "type": "integer"}
                        }
                    }
                }
            }"##,
        ))
        .unwrap();
    assert!(schema.validate_value(&json!({"list": [1, 2]})).valid());
    assert!(!schema.validate_value(&json!({"list": ["x"]})).valid());
}
