//! Paths through the instance under validation.
use std::fmt;

pub(crate) const ROOT_CONTEXT: &str = "(root)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathChunk {
    Name(String),
    Index(usize),
}

impl From<String> for PathChunk {
    #[inline]
    fn from(value: String) -> Self {
        PathChunk::Name(value)
    }
}

impl From<&str> for PathChunk {
    #[inline]
    fn from(value: &str) -> Self {
        PathChunk::Name(value.to_string())
    }
}

impl From<usize> for PathChunk {
    #[inline]
    fn from(value: usize) -> Self {
        PathChunk::Index(value)
    }
}

/// Cons-style context: a head chunk plus a non-owning pointer to the parent.
/// Pushing is O(1) and allocation-free for indices; the full path is only
/// materialised when a finding is recorded.
#[derive(Debug)]
pub(crate) struct JsonContext<'a> {
    chunk: Option<PathChunk>,
    parent: Option<&'a JsonContext<'a>>,
}

impl<'a> JsonContext<'a> {
    pub(crate) const fn new() -> Self {
        JsonContext {
            chunk: None,
            parent: None,
        }
    }

    pub(crate) fn push(&'a self, chunk: impl Into<PathChunk>) -> Self {
        JsonContext {
            chunk: Some(chunk.into()),
            parent: Some(self),
        }
    }

    fn to_vec(&self) -> Vec<PathChunk> {
        // The capacity is the average instance depth, to avoid extra allocations
        let mut result = Vec::with_capacity(6);
        let mut current = self;
        if let Some(chunk) = &current.chunk {
            result.push(chunk.clone());
        }
        while let Some(next) = current.parent {
            current = next;
            if let Some(chunk) = &current.chunk {
                result.push(chunk.clone());
            }
        }
        result.reverse();
        result
    }
}

/// Owned rendering of the instance path stored on every finding.
///
/// Displays as `(root).a.0.b`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextPath(Vec<PathChunk>);

impl ContextPath {
    /// Path segments as strings, without the root literal.
    pub fn into_vec(self) -> Vec<String> {
        self.0
            .into_iter()
            .map(|chunk| match chunk {
                PathChunk::Name(value) => value,
                PathChunk::Index(idx) => idx.to_string(),
            })
            .collect()
    }

    /// Dotted path without the root literal, or `(root)` for the root itself.
    pub fn field(&self) -> String {
        if self.0.is_empty() {
            return ROOT_CONTEXT.to_string();
        }
        let mut rendered = String::new();
        for (position, chunk) in self.0.iter().enumerate() {
            if position > 0 {
                rendered.push('.');
            }
            match chunk {
                PathChunk::Name(value) => rendered.push_str(value),
                PathChunk::Index(idx) => rendered.push_str(&idx.to_string()),
            }
        }
        rendered
    }

    pub(crate) fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT_CONTEXT)?;
        for chunk in &self.0 {
            match chunk {
                PathChunk::Name(value) => write!(f, ".{}", value)?,
                PathChunk::Index(idx) => write!(f, ".{}", idx)?,
            }
        }
        Ok(())
    }
}

impl From<&JsonContext<'_>> for ContextPath {
    #[inline]
    fn from(context: &JsonContext<'_>) -> Self {
        ContextPath(context.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextPath, JsonContext};

    #[test]
    fn rendering() {
        let root = JsonContext::new();
        let first = root.push("a");
        let second = first.push(0_usize);
        let third = second.push("b");
        let path = ContextPath::from(&third);
        assert_eq!(path.to_string(), "(root).a.0.b");
        assert_eq!(path.field(), "a.0.b");
        assert_eq!(path.into_vec(), vec!["a", "0", "b"]);
    }

    #[test]
    fn root_field() {
        let root = JsonContext::new();
        let path = ContextPath::from(&root);
        assert_eq!(path.to_string(), "(root)");
        assert_eq!(path.field(), "(root)");
    }
}
