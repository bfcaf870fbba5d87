//! # schemawalk
//!
//! A JSON Schema validator for drafts 4, 6 and 7 that compiles schema
//! documents into an in-memory graph and checks candidate documents against
//! it, reporting every violation with its path into the instance.
//!
//! Numbers are handled as exact rationals end to end: decoding preserves the
//! full decimal text, so `1` and `1.0` compare equal under `enum`/`const`
//! and `multipleOf: 0.0001` behaves exactly.
//!
//! ## Validating a document
//!
//! ```rust
//! use schemawalk::{SchemaLoader, StringLoader};
//!
//! # fn main() -> Result<(), schemawalk::SchemaError> {
//! let mut loader = SchemaLoader::new();
//! let schema = loader.compile(&StringLoader::new(
//!     r#"{"type": "object", "required": ["name"]}"#,
//! ))?;
//!
//! let result = schema.validate(&StringLoader::new(r#"{"age": 40}"#))?;
//! assert!(!result.valid());
//! for error in result.errors() {
//!     println!("{}", error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Referenced documents
//!
//! Additional documents are registered up front and found by their `$id`;
//! the three standard meta-schema URLs are embedded and never fetched.
//!
//! ```rust
//! use schemawalk::{SchemaLoader, StringLoader};
//!
//! # fn main() -> Result<(), schemawalk::SchemaError> {
//! let mut loader = SchemaLoader::new();
//! loader.add_schemas(&[&StringLoader::new(
//!     r#"{"$id": "http://example.com/int.json", "type": "integer"}"#,
//! )])?;
//! let schema = loader.compile(&StringLoader::new(
//!     r#"{"$ref": "http://example.com/int.json"}"#,
//! ))?;
//! assert!(schema.validate_value(&serde_json::json!(7)).valid());
//! # Ok(())
//! # }
//! ```
#![warn(
    clippy::doc_markdown,
    clippy::explicit_iter_loop,
    clippy::map_unwrap_or,
    clippy::match_same_arms,
    clippy::needless_borrow,
    clippy::print_stdout,
    clippy::redundant_closure,
    clippy::trivially_copy_pass_by_ref,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unreachable_pub
)]
mod compiler;
mod context;
mod defaults;
mod drafts;
mod error;
mod formats;
mod loaders;
mod locales;
mod numbers;
mod pool;
mod reference;
mod result;
mod schema;
mod subschema;
mod validation;

pub use context::ContextPath;
pub use drafts::{Draft, DRAFT4_SCHEMA_URL, DRAFT6_SCHEMA_URL, DRAFT7_SCHEMA_URL};
pub use error::SchemaError;
pub use formats::{FormatChecker, FormatCheckerChain, FORMAT_CHECKERS};
pub use loaders::{
    BytesLoader, DefaultLoaderFactory, FileSystemLoaderFactory, InMemoryFileSystem, JsonLoader,
    LoaderFactory, OsFileSystem, RawLoader, ReaderLoader, ReferenceLoader, SchemaFileSystem,
    StringLoader, TapWriter, TeeReader, ValueLoader, WriterLoader,
};
pub use reference::JsonReference;
pub use result::{ErrorKind, ResultError, ValidationResult};
pub use schema::{Schema, SchemaLoader};

/// Compile the schema produced by `schema` and validate the document
/// produced by `document` against it, in one call.
pub fn validate(
    schema: &dyn JsonLoader,
    document: &dyn JsonLoader,
) -> Result<ValidationResult, SchemaError> {
    let compiled = SchemaLoader::new().compile(schema)?;
    compiled.validate(document)
}

#[cfg(test)]
mod tests {
    use super::{validate, StringLoader};

    #[test]
    fn one_shot_validation() {
        let schema = StringLoader::new(r#"{"maxLength": 5}"#);
        assert!(validate(&schema, &StringLoader::new(r#""foo""#))
            .unwrap()
            .valid());
        assert!(!validate(&schema, &StringLoader::new(r#""foobar""#))
            .unwrap()
            .valid());
    }
}
