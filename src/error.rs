//! Error types for the loading/compilation channel.
//!
//! Validation findings never travel through this channel; they are
//! accumulated in [`ValidationResult`](crate::ValidationResult) and returned
//! from a successful validation call.
use std::io;
use thiserror::Error;

/// An error raised while loading, resolving or compiling a schema document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// The source is not valid JSON.
    #[error("{0}")]
    JsonParse(#[from] serde_json::Error),
    /// A reference could not be parsed as a URL.
    #[error("{0}")]
    UrlParse(#[from] url::ParseError),
    /// The referenced file could not be read.
    #[error("{0}")]
    Io(#[from] io::Error),
    /// Any error raised by the HTTP transport.
    #[cfg(feature = "resolve-http")]
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// The remote server answered with a non-200 status.
    #[error("could not read schema from {url}, response status is {status}")]
    HttpBadStatus {
        /// HTTP status code of the response.
        status: u16,
        /// The URL that was fetched.
        url: String,
    },
    /// A keyword argument has the wrong shape, or bounds are inconsistent.
    #[error("{0}")]
    InvalidSchema(String),
    /// A `pattern` or `patternProperties` key is not a valid regular expression.
    #[error("invalid regex pattern '{0}'")]
    InvalidRegex(String),
    /// A `$ref` could not be resolved to an existing schema location.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    /// Two schema documents claim the same `$id`.
    #[error("duplicated id: {0}")]
    DuplicateId(String),
    /// The schema does not validate against its meta-schema. The message
    /// concatenates every finding.
    #[error("schema failed meta-schema validation:\n{0}")]
    MetaValidation(String),
    /// A `$ref` points at a scheme the loader cannot fetch.
    #[error("unknown reference scheme: {0}")]
    UnknownScheme(String),
    /// An invariant that should be unreachable was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchemaError {
    pub(crate) fn invalid_schema(message: impl Into<String>) -> SchemaError {
        SchemaError::InvalidSchema(message.into())
    }

    /// Shortcut for the ubiquitous "X must be of type Y" compile error.
    pub(crate) fn must_be(keyword: &str, expected: &str) -> SchemaError {
        SchemaError::InvalidSchema(format!("{} must be of type {}", keyword, expected))
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaError;

    #[test]
    fn must_be_message() {
        let error = SchemaError::must_be("required", "array of strings");
        assert_eq!(error.to_string(), "required must be of type array of strings");
    }
}
