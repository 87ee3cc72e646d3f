//! Field path and attribute model: the primitive types every schema layer
//! builds on.

mod attribute;
mod util;

pub use attribute::{parse_schema_attribute, SchemaAttribute};
pub use util::{check_field_name, parse_field_path, strip};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered sequence of field-name segments identifying a (possibly nested)
/// field. Structural equality and ordering make it usable as a map key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new(segments: Vec<String>) -> Self {
        FieldPath(segments)
    }

    pub fn root() -> Self {
        FieldPath(Vec::new())
    }

    /// Number of segments; depth in the schema define is `len() - 1`.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns a new path with `segment` appended.
    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        FieldPath(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

impl From<Vec<&str>> for FieldPath {
    fn from(segments: Vec<&str>) -> Self {
        FieldPath(segments.into_iter().map(String::from).collect())
    }
}

/// Closed set of field types a document schema can declare or a value can
/// carry.
///
/// `LeafObject` and `InternalObject` both represent JSON objects; the latter
/// has declared sub-fields. An object gaining substructure across schema
/// versions (`LeafObject` -> `InternalObject`) is a compatible change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
    Null,
    Bool,
    Integer,
    Long,
    Double,
    String,
    Array,
    LeafObject,
    InternalObject,
}

impl FieldType {
    /// Type name used in log and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Null => "NULL",
            FieldType::Bool => "BOOL",
            FieldType::Integer => "INTEGER",
            FieldType::Long => "LONG",
            FieldType::Double => "DOUBLE",
            FieldType::String => "STRING",
            FieldType::Array => "ARRAY",
            FieldType::LeafObject => "LEAF_OBJECT",
            FieldType::InternalObject => "INTERNAL_OBJECT",
        }
    }

    /// Only primitive leaf types are indexable and carry not-null/default
    /// semantics.
    pub fn is_indexable(&self) -> bool {
        matches!(
            self,
            FieldType::Bool
                | FieldType::Integer
                | FieldType::Long
                | FieldType::Double
                | FieldType::String
        )
    }

    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::LeafObject | FieldType::InternalObject)
    }
}

/// A parsed default value (or a value type observed in a document).
///
/// Equality on `Double` is bit-exact: two defaults compare equal only when
/// their 64-bit representations match. Two textually identical literals
/// always parse to the same bits, and tolerance-based comparison would let
/// genuinely different defaults slip through as "equal".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Null => FieldType::Null,
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Integer(_) => FieldType::Integer,
            FieldValue::Long(_) => FieldType::Long,
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::String(_) => FieldType::String,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Long(a), FieldValue::Long(b)) => a == b,
            (FieldValue::Double(a), FieldValue::Double(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}
