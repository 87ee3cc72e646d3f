//! Core types of the document schema model.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::fields::{FieldPath, FieldType, SchemaAttribute};

/// Kind tag of a schema, also exchanged on the wire during negotiation.
///
/// `None` marks a pure key-value store with no schema at all. `Relative` is
/// the relational kind and never appears inside a document `SchemaObject`;
/// it exists so the one wire tag covers every store kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaType {
    None,
    Json,
    Flatbuffer,
    Relative,
    Unrecognized,
}

impl SchemaType {
    /// Decodes the one-byte wire tag a peer sends alongside its schema
    /// string. Unknown values (including ones newer builds may add) read as
    /// `Unrecognized`.
    pub fn from_wire_tag(tag: u8) -> Self {
        match tag {
            0 => SchemaType::None,
            1 => SchemaType::Json,
            2 => SchemaType::Flatbuffer,
            3 => SchemaType::Relative,
            _ => SchemaType::Unrecognized,
        }
    }

    pub fn wire_tag(&self) -> u8 {
        match self {
            SchemaType::None => 0,
            SchemaType::Json => 1,
            SchemaType::Flatbuffer => 2,
            SchemaType::Relative => 3,
            SchemaType::Unrecognized => 4,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaType::None => "NONE",
            SchemaType::Json => "JSON",
            SchemaType::Flatbuffer => "FLATBUFFER",
            SchemaType::Relative => "RELATIVE",
            SchemaType::Unrecognized => "UNRECOGNIZED",
        }
    }
}

/// Document schema policy for field growth across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaMode {
    /// A newer schema may not declare fields the older one lacked.
    Strict,
    /// Additive field growth is permitted (and demotes equality to upgrade).
    Compatible,
}

/// Field definitions keyed by 0-based depth, then by field path.
pub type SchemaDefine = BTreeMap<u32, BTreeMap<FieldPath, SchemaAttribute>>;

/// An index is named, by convention, after its first field path.
pub type IndexName = FieldPath;

/// Ordered `(path, type)` pairs of a composite index. Two indexes are
/// exactly equal only when the full ordered sequence matches; reordering
/// members is a change.
pub type IndexInfo = Vec<(FieldPath, FieldType)>;

/// The delta needed to evolve an old index set into a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDifference {
    /// Present in both, but with a different member sequence.
    pub change: BTreeMap<IndexName, IndexInfo>,
    /// Present only in the new schema.
    pub increase: BTreeMap<IndexName, IndexInfo>,
    /// Present only in the old schema.
    pub decrease: BTreeSet<IndexName>,
}

impl IndexDifference {
    pub fn is_empty(&self) -> bool {
        self.change.is_empty() && self.increase.is_empty() && self.decrease.is_empty()
    }
}

/// Decodes FlatBuffer-encoded document schemas into their JSON-equivalent
/// meta form.
///
/// Decoding is the business of the embedding store, not of this engine; the
/// parser only needs a seam to (a) detect that a raw string is a
/// FlatBuffer-encoded schema and (b) obtain the decoded text. Registration
/// is explicit and caller-owned; there is no process-wide decoder.
pub trait FlatbufferSchemaDecoder {
    /// Returns the decoded schema text if `raw` is a FlatBuffer-encoded
    /// schema, `None` if it is not (the parser then treats it as plain
    /// JSON).
    fn decode(&self, raw: &str) -> Option<String>;
}

/// Parsed, immutable representation of a document schema string.
///
/// Constructed empty and populated by exactly one successful
/// [`parse_from_schema_string`](SchemaObject::parse_from_schema_string)
/// call; every accessor answers conservatively until then. Once valid the
/// object never changes and may be shared freely across concurrent sync
/// sessions.
#[derive(Debug, Clone, Default)]
pub struct SchemaObject {
    pub(crate) is_valid: bool,
    pub(crate) schema_type: Option<SchemaType>,
    pub(crate) schema_version: String,
    pub(crate) schema_mode: Option<SchemaMode>,
    pub(crate) schema_skip_size: u32,
    pub(crate) schema_define: SchemaDefine,
    pub(crate) schema_indexes: BTreeMap<IndexName, IndexInfo>,
    pub(crate) schema_string: String,
}

impl SchemaObject {
    pub fn new() -> Self {
        SchemaObject::default()
    }

    pub fn is_schema_valid(&self) -> bool {
        self.is_valid
    }

    /// An invalid schema object reports `SchemaType::None`, the same as a
    /// schemaless key-value store.
    pub fn schema_type(&self) -> SchemaType {
        self.schema_type.unwrap_or(SchemaType::None)
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn schema_mode(&self) -> Option<SchemaMode> {
        self.schema_mode
    }

    pub fn skip_size(&self) -> u32 {
        self.schema_skip_size
    }

    /// Canonical minified schema string; empty until a successful parse.
    pub fn to_schema_string(&self) -> &str {
        &self.schema_string
    }

    /// Index map; empty for an invalid object even if a failed parse left
    /// partial state behind.
    pub fn index_info(&self) -> BTreeMap<IndexName, IndexInfo> {
        if !self.is_valid {
            return BTreeMap::new();
        }
        self.schema_indexes.clone()
    }

    pub fn is_index_exist(&self, index_name: &IndexName) -> bool {
        self.is_valid && self.schema_indexes.contains_key(index_name)
    }

    /// Looks a path up in the define and returns its type when the field is
    /// usable as a query/index target. `None` when the path is unknown or
    /// the field is not indexable.
    pub fn queryable_field_type(&self, path: &FieldPath) -> Option<FieldType> {
        if path.is_empty() {
            return None;
        }
        let depth = (path.len() - 1) as u32;
        let attr = self.schema_define.get(&depth)?.get(path)?;
        if attr.is_indexable {
            Some(attr.field_type)
        } else {
            None
        }
    }
}
