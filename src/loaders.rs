//! Different strategies to load JSON documents: in-memory text and bytes,
//! native values, tee'd readers and writers, and file/HTTP references.
//!
//! Every loader decodes through `serde_json` with arbitrary precision
//! enabled, so numbers keep their exact decimal text all the way into the
//! compiler and the validator.
use crate::drafts;
use crate::error::SchemaError;
use crate::reference::JsonReference;
use ahash::AHashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// A source of one JSON document plus the base reference that relative
/// `$ref`s inside it resolve against.
pub trait JsonLoader {
    /// The origin of this loader, for diagnostics.
    fn json_source(&self) -> String;
    /// Produce the decoded JSON tree, numbers preserved with full precision.
    fn load_json(&self) -> Result<Value, SchemaError>;
    /// The absolute reference that relative refs resolve against.
    fn json_reference(&self) -> Result<JsonReference, SchemaError>;
    /// The factory used to build sub-loaders while resolving references, so
    /// a reference loader's transport choice propagates to them.
    fn loader_factory(&self) -> Box<dyn LoaderFactory>;
}

/// Builds sub-loaders for references discovered during compilation.
pub trait LoaderFactory: Send + Sync {
    /// A loader for `source`.
    fn new_loader(&self, source: &str) -> Box<dyn JsonLoader>;
}

/// Factory producing [`ReferenceLoader`]s backed by the OS filesystem.
#[derive(Debug, Clone, Default)]
pub struct DefaultLoaderFactory;

impl LoaderFactory for DefaultLoaderFactory {
    fn new_loader(&self, source: &str) -> Box<dyn JsonLoader> {
        Box::new(ReferenceLoader::new(source))
    }
}

/// Factory that pins sub-loaders to a specific filesystem.
pub struct FileSystemLoaderFactory {
    fs: Arc<dyn SchemaFileSystem>,
}

impl LoaderFactory for FileSystemLoaderFactory {
    fn new_loader(&self, source: &str) -> Box<dyn JsonLoader> {
        Box::new(ReferenceLoader::with_filesystem(source, Arc::clone(&self.fs)))
    }
}

impl std::fmt::Debug for FileSystemLoaderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemLoaderFactory").finish()
    }
}

/// Read access to schema files. Swap in an [`InMemoryFileSystem`] to isolate
/// tests from the OS filesystem.
pub trait SchemaFileSystem: Send + Sync {
    /// The contents of the file at `path`.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// The OS filesystem.
#[derive(Debug, Clone, Default)]
pub struct OsFileSystem;

impl SchemaFileSystem for OsFileSystem {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// An in-memory path → document map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileSystem {
    files: AHashMap<String, String>,
}

impl InMemoryFileSystem {
    /// An empty filesystem.
    pub fn new() -> InMemoryFileSystem {
        InMemoryFileSystem::default()
    }

    /// Store `contents` under `path`.
    pub fn add(&mut self, path: impl Into<String>, contents: impl Into<String>) -> &mut Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl SchemaFileSystem for InMemoryFileSystem {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|contents| contents.clone().into_bytes())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// Loads a JSON document from an in-memory string.
#[derive(Debug, Clone)]
pub struct StringLoader {
    source: String,
}

impl StringLoader {
    /// A loader over `source`.
    pub fn new(source: impl Into<String>) -> StringLoader {
        StringLoader {
            source: source.into(),
        }
    }
}

impl JsonLoader for StringLoader {
    fn json_source(&self) -> String {
        self.source.clone()
    }

    fn load_json(&self) -> Result<Value, SchemaError> {
        Ok(serde_json::from_str(&self.source)?)
    }

    fn json_reference(&self) -> Result<JsonReference, SchemaError> {
        JsonReference::parse("#")
    }

    fn loader_factory(&self) -> Box<dyn LoaderFactory> {
        Box::new(DefaultLoaderFactory)
    }
}

/// Loads a JSON document from an in-memory byte sequence.
#[derive(Debug, Clone)]
pub struct BytesLoader {
    source: Vec<u8>,
}

impl BytesLoader {
    /// A loader over `source`.
    pub fn new(source: impl Into<Vec<u8>>) -> BytesLoader {
        BytesLoader {
            source: source.into(),
        }
    }
}

impl JsonLoader for BytesLoader {
    fn json_source(&self) -> String {
        String::from_utf8_lossy(&self.source).into_owned()
    }

    fn load_json(&self) -> Result<Value, SchemaError> {
        Ok(serde_json::from_slice(&self.source)?)
    }

    fn json_reference(&self) -> Result<JsonReference, SchemaError> {
        JsonReference::parse("#")
    }

    fn loader_factory(&self) -> Box<dyn LoaderFactory> {
        Box::new(DefaultLoaderFactory)
    }
}

/// Loads a native [`Value`]. The value is re-serialised and re-parsed so its
/// numbers are normalised through the arbitrary-precision decoder.
#[derive(Debug, Clone)]
pub struct ValueLoader {
    source: Value,
}

impl ValueLoader {
    /// A loader over `source`.
    pub fn new(source: Value) -> ValueLoader {
        ValueLoader { source }
    }
}

impl JsonLoader for ValueLoader {
    fn json_source(&self) -> String {
        self.source.to_string()
    }

    fn load_json(&self) -> Result<Value, SchemaError> {
        let serialised = serde_json::to_string(&self.source)?;
        Ok(serde_json::from_str(&serialised)?)
    }

    fn json_reference(&self) -> Result<JsonReference, SchemaError> {
        JsonReference::parse("#")
    }

    fn loader_factory(&self) -> Box<dyn LoaderFactory> {
        Box::new(DefaultLoaderFactory)
    }
}

/// Loads an already-decoded [`Value`] untouched. Only useful when numeric
/// normalisation is known to be unnecessary, e.g. for documents that were
/// decoded by this crate in the first place.
#[derive(Debug, Clone)]
pub struct RawLoader {
    source: Value,
}

impl RawLoader {
    /// A loader over `source`.
    pub fn new(source: Value) -> RawLoader {
        RawLoader { source }
    }
}

impl JsonLoader for RawLoader {
    fn json_source(&self) -> String {
        self.source.to_string()
    }

    fn load_json(&self) -> Result<Value, SchemaError> {
        Ok(self.source.clone())
    }

    fn json_reference(&self) -> Result<JsonReference, SchemaError> {
        JsonReference::parse("#")
    }

    fn loader_factory(&self) -> Box<dyn LoaderFactory> {
        Box::new(DefaultLoaderFactory)
    }
}

/// Records everything read through the returned [`TeeReader`], so the caller
/// may keep observing the raw bytes while the loader decodes them later.
#[derive(Debug)]
pub struct ReaderLoader {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl ReaderLoader {
    /// Wrap `source`; read the returned reader to completion before calling
    /// [`JsonLoader::load_json`].
    pub fn new<R: Read>(source: R) -> (ReaderLoader, TeeReader<R>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (
            ReaderLoader {
                buffer: Arc::clone(&buffer),
            },
            TeeReader {
                inner: source,
                buffer,
            },
        )
    }
}

impl JsonLoader for ReaderLoader {
    fn json_source(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    fn load_json(&self) -> Result<Value, SchemaError> {
        Ok(serde_json::from_slice(&self.buffer.lock())?)
    }

    fn json_reference(&self) -> Result<JsonReference, SchemaError> {
        JsonReference::parse("#")
    }

    fn loader_factory(&self) -> Box<dyn LoaderFactory> {
        Box::new(DefaultLoaderFactory)
    }
}

/// A reader that copies everything it yields into the loader's buffer.
#[derive(Debug)]
pub struct TeeReader<R> {
    inner: R,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl<R: Read> Read for TeeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.buffer.lock().extend_from_slice(&buf[..read]);
        Ok(read)
    }
}

/// Records everything written through the returned [`TapWriter`].
#[derive(Debug)]
pub struct WriterLoader {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl WriterLoader {
    /// Tap `sink`; anything written to the returned writer is also retained
    /// for [`JsonLoader::load_json`].
    pub fn new<W: Write>(sink: W) -> (WriterLoader, TapWriter<W>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (
            WriterLoader {
                buffer: Arc::clone(&buffer),
            },
            TapWriter {
                inner: sink,
                buffer,
            },
        )
    }
}

impl JsonLoader for WriterLoader {
    fn json_source(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    fn load_json(&self) -> Result<Value, SchemaError> {
        Ok(serde_json::from_slice(&self.buffer.lock())?)
    }

    fn json_reference(&self) -> Result<JsonReference, SchemaError> {
        JsonReference::parse("#")
    }

    fn loader_factory(&self) -> Box<dyn LoaderFactory> {
        Box::new(DefaultLoaderFactory)
    }
}

/// A writer that copies everything it forwards into the loader's buffer.
#[derive(Debug)]
pub struct TapWriter<W> {
    inner: W,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl<W: Write> Write for TapWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.buffer.lock().extend_from_slice(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Loads a document from a `file://` or `http(s)://` URL.
///
/// The three well-known meta-schema URLs are answered from the embedded
/// constants without touching the network.
pub struct ReferenceLoader {
    source: String,
    fs: Arc<dyn SchemaFileSystem>,
}

impl ReferenceLoader {
    /// A loader for `source` on the OS filesystem.
    pub fn new(source: impl Into<String>) -> ReferenceLoader {
        ReferenceLoader {
            source: source.into(),
            fs: Arc::new(OsFileSystem),
        }
    }

    /// A loader for `source` on the given filesystem.
    pub fn with_filesystem(
        source: impl Into<String>,
        fs: Arc<dyn SchemaFileSystem>,
    ) -> ReferenceLoader {
        ReferenceLoader {
            source: source.into(),
            fs,
        }
    }

    fn load_from_file(&self, canonical: &str) -> Result<Value, SchemaError> {
        let filename = canonical.trim_start_matches("file://");
        let bytes = self.fs.read(filename)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[cfg(feature = "resolve-http")]
    fn load_from_http(&self, url: &str) -> Result<Value, SchemaError> {
        let response = reqwest::blocking::get(url)?;
        let status = response.status();
        if status.as_u16() != 200 {
            return Err(SchemaError::HttpBadStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    #[cfg(not(feature = "resolve-http"))]
    fn load_from_http(&self, url: &str) -> Result<Value, SchemaError> {
        Err(SchemaError::UnknownScheme(format!(
            "{} (http support is not enabled)",
            url
        )))
    }
}

impl std::fmt::Debug for ReferenceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceLoader")
            .field("source", &self.source)
            .finish()
    }
}

impl JsonLoader for ReferenceLoader {
    fn json_source(&self) -> String {
        self.source.clone()
    }

    fn load_json(&self) -> Result<Value, SchemaError> {
        let reference = self.json_reference()?;
        let canonical = reference.canonical();
        if let Some(document) = drafts::meta_schema_document(canonical) {
            return Ok(document.clone());
        }
        if reference.is_file_scheme() {
            self.load_from_file(canonical)
        } else if reference.is_http_scheme() {
            self.load_from_http(canonical)
        } else {
            Err(SchemaError::UnknownScheme(
                reference.url().scheme().to_string(),
            ))
        }
    }

    fn json_reference(&self) -> Result<JsonReference, SchemaError> {
        JsonReference::parse(&self.source)
    }

    fn loader_factory(&self) -> Box<dyn LoaderFactory> {
        Box::new(FileSystemLoaderFactory {
            fs: Arc::clone(&self.fs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_loader_preserves_numbers() {
        let loader = StringLoader::new(r#"{"a": 1.0, "b": 0.0001}"#);
        let document = loader.load_json().unwrap();
        assert_eq!(document["a"].to_string(), "1.0");
        assert_eq!(document["b"].to_string(), "0.0001");
    }

    #[test]
    fn bytes_loader() {
        let loader = BytesLoader::new(br#"[1, 2, 3]"#.to_vec());
        assert_eq!(loader.load_json().unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn reader_loader_tees() {
        let source = br#"{"answer": 42}"#;
        let (loader, mut reader) = ReaderLoader::new(&source[..]);
        let mut observed = String::new();
        reader.read_to_string(&mut observed).unwrap();
        // the caller still sees the raw bytes
        assert_eq!(observed.as_bytes(), source);
        assert_eq!(loader.load_json().unwrap(), json!({"answer": 42}));
    }

    #[test]
    fn writer_loader_taps() {
        let mut sink = Vec::new();
        let (loader, mut writer) = WriterLoader::new(&mut sink);
        writer.write_all(br#"{"answer": 42}"#).unwrap();
        writer.flush().unwrap();
        assert_eq!(loader.load_json().unwrap(), json!({"answer": 42}));
        assert_eq!(sink, br#"{"answer": 42}"#);
    }

    #[test]
    fn meta_schema_urls_are_embedded() {
        let loader = ReferenceLoader::new("http://json-schema.org/draft-07/schema#");
        let document = loader.load_json().unwrap();
        assert_eq!(
            document["$id"],
            json!("http://json-schema.org/draft-07/schema#")
        );
    }

    #[test]
    fn virtual_filesystem() {
        let mut fs = InMemoryFileSystem::new();
        fs.add("/schemas/test.json", r#"{"type": "integer"}"#);
        let loader = ReferenceLoader::with_filesystem("file:///schemas/test.json", Arc::new(fs));
        assert_eq!(loader.load_json().unwrap(), json!({"type": "integer"}));
    }

    #[test]
    fn missing_file_is_an_error() {
        let loader =
            ReferenceLoader::with_filesystem("file:///nope.json", Arc::new(InMemoryFileSystem::new()));
        assert!(loader.load_json().is_err());
    }
}
