//! The compiled schema graph.
//!
//! Nodes live in an arena owned by the `Schema`; cross-references (`$ref`
//! targets, parent back-links) are arena indices, so the graph may be cyclic
//! without shared ownership and no node outlives its `Schema`.
use crate::drafts::Draft;
use crate::reference::JsonReference;
use ahash::AHashMap;
use fraction::BigFraction;
use serde_json::Value;
use std::fmt;

pub(crate) const ROOT_PROPERTY: &str = "(root)";

/// Index of a [`SubSchema`] inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

#[derive(Debug, Default)]
pub(crate) struct SchemaArena {
    nodes: Vec<SubSchema>,
}

impl SchemaArena {
    pub(crate) fn new() -> SchemaArena {
        SchemaArena::default()
    }

    pub(crate) fn alloc(&mut self, node: SubSchema) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn get(&self, id: NodeId) -> &SubSchema {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut SubSchema {
        &mut self.nodes[id.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// One of the seven JSON type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrimitiveType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl PrimitiveType {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            PrimitiveType::Array => "array",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Null => "null",
            PrimitiveType::Number => "number",
            PrimitiveType::Object => "object",
            PrimitiveType::String => "string",
        }
    }

    pub(crate) fn from_str(value: &str) -> Option<PrimitiveType> {
        match value {
            "array" => Some(PrimitiveType::Array),
            "boolean" => Some(PrimitiveType::Boolean),
            "integer" => Some(PrimitiveType::Integer),
            "null" => Some(PrimitiveType::Null),
            "number" => Some(PrimitiveType::Number),
            "object" => Some(PrimitiveType::Object),
            "string" => Some(PrimitiveType::String),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            PrimitiveType::Array => 1,
            PrimitiveType::Boolean => 1 << 1,
            PrimitiveType::Integer => 1 << 2,
            PrimitiveType::Null => 1 << 3,
            PrimitiveType::Number => 1 << 4,
            PrimitiveType::Object => 1 << 5,
            PrimitiveType::String => 1 << 6,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ALL_TYPES: [PrimitiveType; 7] = [
    PrimitiveType::Array,
    PrimitiveType::Boolean,
    PrimitiveType::Integer,
    PrimitiveType::Null,
    PrimitiveType::Number,
    PrimitiveType::Object,
    PrimitiveType::String,
];

/// The set of declared `type` keywords, as a bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TypeSet(u8);

impl TypeSet {
    pub(crate) fn add(&mut self, kind: PrimitiveType) -> bool {
        let bit = kind.bit();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub(crate) const fn contains(self, kind: PrimitiveType) -> bool {
        self.0 & kind.bit() != 0
    }

    pub(crate) const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for kind in ALL_TYPES {
            if self.contains(kind) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(kind.as_str())?;
                first = false;
            }
        }
        Ok(())
    }
}

/// `additionalProperties` / `additionalItems`: a boolean or a schema.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SchemaOrBool {
    AllowAll,
    DenyAll,
    Node(NodeId),
}

/// A `dependencies` entry: required sibling names, or a dependent schema.
#[derive(Debug, Clone)]
pub(crate) enum Dependency {
    Properties(Vec<String>),
    Node(NodeId),
}

/// A compiled `patternProperties` entry.
#[derive(Debug)]
pub(crate) struct PatternProperty {
    pub(crate) source: String,
    pub(crate) regex: fancy_regex::Regex,
    pub(crate) node: NodeId,
}

/// One node of the compiled schema graph.
#[derive(Debug)]
pub(crate) struct SubSchema {
    pub(crate) draft: Draft,
    pub(crate) parent: Option<NodeId>,
    /// Base reference that descendants resolve against; re-rooted by `$id`.
    pub(crate) reference: JsonReference,
    pub(crate) id: Option<JsonReference>,
    /// The keyword or property name this node was compiled under.
    pub(crate) property: String,
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,

    /// Set for bare `true`/`false` schemas; short-circuits validation.
    pub(crate) pass: Option<bool>,

    pub(crate) types: TypeSet,

    /// Resolved `$ref` target. A node with a reference keeps no sibling
    /// keywords; drafts 4-7 ignore them.
    pub(crate) ref_schema: Option<NodeId>,

    pub(crate) properties_children: Vec<NodeId>,
    pub(crate) pattern_properties: Vec<PatternProperty>,
    pub(crate) items_children: Vec<NodeId>,
    /// `items` held a single schema rather than a tuple of positions.
    pub(crate) items_single: bool,
    pub(crate) additional_properties: Option<SchemaOrBool>,
    pub(crate) additional_items: Option<SchemaOrBool>,
    pub(crate) property_names: Option<NodeId>,
    pub(crate) contains: Option<NodeId>,
    pub(crate) not: Option<NodeId>,
    pub(crate) if_schema: Option<NodeId>,
    pub(crate) then_schema: Option<NodeId>,
    pub(crate) else_schema: Option<NodeId>,
    pub(crate) definitions: Vec<NodeId>,
    pub(crate) all_of: Vec<NodeId>,
    pub(crate) any_of: Vec<NodeId>,
    pub(crate) one_of: Vec<NodeId>,
    pub(crate) dependencies: AHashMap<String, Dependency>,

    pub(crate) multiple_of: Option<BigFraction>,
    pub(crate) minimum: Option<BigFraction>,
    pub(crate) maximum: Option<BigFraction>,
    pub(crate) exclusive_minimum: Option<BigFraction>,
    pub(crate) exclusive_maximum: Option<BigFraction>,

    pub(crate) min_length: Option<u64>,
    pub(crate) max_length: Option<u64>,
    pub(crate) pattern: Option<(String, fancy_regex::Regex)>,
    pub(crate) format: Option<String>,

    pub(crate) min_items: Option<u64>,
    pub(crate) max_items: Option<u64>,
    pub(crate) unique_items: bool,

    pub(crate) min_properties: Option<u64>,
    pub(crate) max_properties: Option<u64>,
    pub(crate) required: Vec<String>,

    /// Canonical stringifications, so `1` and `1.0` compare equal.
    pub(crate) const_value: Option<String>,
    pub(crate) enum_values: Vec<String>,

    pub(crate) default: Option<Value>,
}

impl SubSchema {
    pub(crate) fn new(
        draft: Draft,
        reference: JsonReference,
        property: String,
        parent: Option<NodeId>,
    ) -> SubSchema {
        SubSchema {
            draft,
            parent,
            reference,
            id: None,
            property,
            title: None,
            description: None,
            pass: None,
            types: TypeSet::default(),
            ref_schema: None,
            properties_children: Vec::new(),
            pattern_properties: Vec::new(),
            items_children: Vec::new(),
            items_single: false,
            additional_properties: None,
            additional_items: None,
            property_names: None,
            contains: None,
            not: None,
            if_schema: None,
            then_schema: None,
            else_schema: None,
            definitions: Vec::new(),
            all_of: Vec::new(),
            any_of: Vec::new(),
            one_of: Vec::new(),
            dependencies: AHashMap::new(),
            multiple_of: None,
            minimum: None,
            maximum: None,
            exclusive_minimum: None,
            exclusive_maximum: None,
            min_length: None,
            max_length: None,
            pattern: None,
            format: None,
            min_items: None,
            max_items: None,
            unique_items: false,
            min_properties: None,
            max_properties: None,
            required: Vec::new(),
            const_value: None,
            enum_values: Vec::new(),
            default: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PrimitiveType, TypeSet};

    #[test]
    fn type_set() {
        let mut types = TypeSet::default();
        assert!(types.is_empty());
        assert!(types.add(PrimitiveType::Integer));
        assert!(types.add(PrimitiveType::String));
        // a second add reports the duplicate
        assert!(!types.add(PrimitiveType::Integer));
        assert!(types.contains(PrimitiveType::Integer));
        assert!(!types.contains(PrimitiveType::Null));
        assert_eq!(types.to_string(), "integer,string");
    }
}
