//! Document schema string parser.
//!
//! Turns a raw schema string (plain JSON, or FlatBuffer-encoded via a
//! caller-supplied decoder) into a valid [`SchemaObject`]. The define tree is
//! walked breadth-first with an explicit worklist so the depth bound is
//! enforced structurally rather than by recursion depth.

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::constants::{
    KEYWORD_MODE_COMPATIBLE, KEYWORD_MODE_STRICT, KEYWORD_SCHEMA_DEFINE, KEYWORD_SCHEMA_INDEXES,
    KEYWORD_SCHEMA_MODE, KEYWORD_SCHEMA_SKIPSIZE, KEYWORD_SCHEMA_VERSION,
    SCHEMA_FIELD_NAME_COUNT_MAX, SCHEMA_FIELD_PATH_DEPTH_MAX, SCHEMA_INDEX_COUNT_MAX,
    SCHEMA_META_FIELD_COUNT_MAX, SCHEMA_META_FIELD_COUNT_MIN, SCHEMA_SKIPSIZE_MAX,
    SCHEMA_STRING_SIZE_LIMIT, SCHEMA_SUPPORT_VERSION,
};
use crate::errors::{ParseError, ParseResult};
use crate::fields::{check_field_name, parse_field_path, parse_schema_attribute, strip, FieldPath,
    FieldType, SchemaAttribute};

use super::types::{FlatbufferSchemaDecoder, IndexInfo, SchemaMode, SchemaObject, SchemaType};

impl SchemaObject {
    /// Parses a plain-JSON document schema string into this object.
    ///
    /// Callable only while the object is still invalid; a second call after
    /// a successful parse returns [`ParseError::NotPermit`].
    pub fn parse_from_schema_string(&mut self, raw: &str) -> ParseResult<()> {
        self.parse_internal(raw, None)
    }

    /// Like [`parse_from_schema_string`](Self::parse_from_schema_string) but
    /// first offers the raw string to `decoder`; when the decoder recognizes
    /// it as FlatBuffer-encoded, the decoded text is parsed and the object
    /// is tagged [`SchemaType::Flatbuffer`].
    pub fn parse_from_schema_string_with(
        &mut self,
        raw: &str,
        decoder: &dyn FlatbufferSchemaDecoder,
    ) -> ParseResult<()> {
        self.parse_internal(raw, Some(decoder))
    }

    fn parse_internal(
        &mut self,
        raw: &str,
        decoder: Option<&dyn FlatbufferSchemaDecoder>,
    ) -> ParseResult<()> {
        if self.is_valid {
            return Err(ParseError::NotPermit);
        }

        // Estimate the kind first: a registered decoder claiming the string
        // makes it a FlatBuffer schema, everything else is treated as JSON.
        let decoded = decoder.and_then(|d| d.decode(raw));
        let estimate = if decoded.is_some() {
            SchemaType::Flatbuffer
        } else {
            SchemaType::Json
        };
        let text = decoded.as_deref().unwrap_or(raw);
        if text.len() > SCHEMA_STRING_SIZE_LIMIT {
            error!(size = text.len(), "schema string over size limit");
            return Err(ParseError::InvalidArgs(format!(
                "schema size {} over limit",
                text.len()
            )));
        }

        let tree: Value = serde_json::from_str(text).map_err(|e| {
            error!(error = %e, "schema string is not valid json");
            ParseError::SchemaParseFail(format!("json parse: {}", e))
        })?;
        let root = tree.as_object().ok_or_else(|| {
            ParseError::SchemaParseFail("schema root is not an object".to_string())
        })?;

        check_meta_fields(root)?;
        self.parse_check_version_mode(root)?;
        self.parse_check_define(root)?;
        self.parse_check_indexes(root)?;
        self.parse_check_skip_size(root)?;

        self.schema_type = Some(estimate);
        // Canonical form is the minified serialization of the parsed tree.
        self.schema_string = serde_json::to_string(&tree)
            .map_err(|e| ParseError::SchemaParseFail(format!("reserialize: {}", e)))?;
        self.is_valid = true;
        debug!(
            schema_type = estimate.type_name(),
            fields = self.schema_define.values().map(|d| d.len()).sum::<usize>(),
            indexes = self.schema_indexes.len(),
            "document schema parsed"
        );
        Ok(())
    }

    fn parse_check_version_mode(&mut self, root: &Map<String, Value>) -> ParseResult<()> {
        // Presence and string-ness were established by the meta-field check.
        let version = root[KEYWORD_SCHEMA_VERSION].as_str().unwrap_or_default();
        if strip(version) != SCHEMA_SUPPORT_VERSION {
            error!(version, "unsupported document schema version");
            return Err(ParseError::SchemaParseFail(format!(
                "unsupported SCHEMA_VERSION '{}'",
                version
            )));
        }
        self.schema_version = SCHEMA_SUPPORT_VERSION.to_string();

        let mode = root[KEYWORD_SCHEMA_MODE].as_str().unwrap_or_default();
        self.schema_mode = match strip(mode) {
            KEYWORD_MODE_STRICT => Some(SchemaMode::Strict),
            KEYWORD_MODE_COMPATIBLE => Some(SchemaMode::Compatible),
            other => {
                error!(mode = other, "unsupported schema mode");
                return Err(ParseError::SchemaParseFail(format!(
                    "unsupported SCHEMA_MODE '{}'",
                    other
                )));
            }
        };
        Ok(())
    }

    fn parse_check_define(&mut self, root: &Map<String, Value>) -> ParseResult<()> {
        // Clear to recover from an earlier failed parse.
        self.schema_define.clear();

        let define = root[KEYWORD_SCHEMA_DEFINE]
            .as_object()
            .ok_or_else(|| ParseError::SchemaParseFail("define is not an object".to_string()))?;

        // Worklist of internal-object nodes of the current depth; the root
        // define object is the single node of depth 0.
        let mut worklist: Vec<(FieldPath, &Map<String, Value>)> =
            vec![(FieldPath::root(), define)];
        let mut field_name_count = 0usize;
        for depth in 0..SCHEMA_FIELD_PATH_DEPTH_MAX {
            let mut next: Vec<(FieldPath, &Map<String, Value>)> = Vec::new();
            for (base_path, node) in &worklist {
                for (name, value) in node.iter() {
                    check_field_name(name)?;
                    field_name_count += 1;
                    let path = base_path.join(name);
                    let attribute = decide_attribute(value)?;
                    if let Value::Object(children) = value {
                        if !children.is_empty() {
                            if depth == SCHEMA_FIELD_PATH_DEPTH_MAX - 1 {
                                error!(%path, "schema define over depth limit");
                                return Err(ParseError::SchemaParseFail(
                                    "define depth over limit".to_string(),
                                ));
                            }
                            next.push((path.clone(), children));
                        }
                    }
                    self.schema_define.entry(depth).or_default().insert(path, attribute);
                }
            }
            if next.is_empty() {
                break;
            }
            worklist = next;
        }
        if field_name_count > SCHEMA_FIELD_NAME_COUNT_MAX {
            error!(count = field_name_count, "too many field names");
            return Err(ParseError::SchemaParseFail(format!(
                "field name count {} over limit",
                field_name_count
            )));
        }
        Ok(())
    }

    fn parse_check_indexes(&mut self, root: &Map<String, Value>) -> ParseResult<()> {
        self.schema_indexes.clear();
        let indexes = match root.get(KEYWORD_SCHEMA_INDEXES) {
            None => return Ok(()),
            Some(value) => value.as_array().ok_or_else(|| {
                ParseError::SchemaParseFail("indexes is not an array".to_string())
            })?,
        };
        if indexes.len() > SCHEMA_INDEX_COUNT_MAX {
            error!(count = indexes.len(), "too many indexes");
            return Err(ParseError::SchemaParseFail(format!(
                "index count {} over limit",
                indexes.len()
            )));
        }
        for entry in indexes {
            let path_strings = index_entry_paths(entry)?;
            self.parse_check_one_index(&path_strings)?;
        }
        Ok(())
    }

    fn parse_check_one_index(&mut self, path_strings: &[String]) -> ParseResult<()> {
        let mut paths: Vec<FieldPath> = Vec::with_capacity(path_strings.len());
        for path_str in path_strings {
            let path = parse_field_path(path_str)?;
            if paths.contains(&path) {
                error!(%path, "duplicated path inside one index");
                return Err(ParseError::SchemaParseFail(
                    "duplicated index member path".to_string(),
                ));
            }
            paths.push(path);
        }
        // The first field path of the index is, by convention, its name.
        let index_name = paths[0].clone();
        if self.schema_indexes.contains_key(&index_name) {
            error!(index = %index_name, "index name already defined");
            return Err(ParseError::SchemaParseFail(format!(
                "duplicated index name '{}'",
                index_name
            )));
        }
        let mut info: IndexInfo = Vec::with_capacity(paths.len());
        for path in paths {
            let field_type = self.indexable_type_of(&path)?;
            info.push((path, field_type));
        }
        self.schema_indexes.insert(index_name, info);
        Ok(())
    }

    fn indexable_type_of(&self, path: &FieldPath) -> ParseResult<FieldType> {
        let depth = (path.len() - 1) as u32;
        let attr = self
            .schema_define
            .get(&depth)
            .and_then(|fields| fields.get(path))
            .ok_or_else(|| {
                error!(%path, "index path not present in define");
                ParseError::SchemaParseFail(format!("index path '{}' not in define", path))
            })?;
        if !attr.is_indexable {
            error!(%path, "index path is not indexable");
            return Err(ParseError::SchemaParseFail(format!(
                "index path '{}' is not indexable",
                path
            )));
        }
        Ok(attr.field_type)
    }

    fn parse_check_skip_size(&mut self, root: &Map<String, Value>) -> ParseResult<()> {
        let value = match root.get(KEYWORD_SCHEMA_SKIPSIZE) {
            None => return Ok(()),
            Some(value) => value,
        };
        // Integer-ness was established by the meta-field check.
        let skip = value.as_u64().unwrap_or(u64::MAX);
        if skip > SCHEMA_SKIPSIZE_MAX {
            error!(skip, "skip size out of range");
            return Err(ParseError::SchemaParseFail(format!(
                "SCHEMA_SKIPSIZE {} out of range",
                skip
            )));
        }
        self.schema_skip_size = skip as u32;
        Ok(())
    }
}

/// Validates the top-level meta-field set: the three mandatory keywords with
/// their types, the two optional ones, and nothing else.
fn check_meta_fields(root: &Map<String, Value>) -> ParseResult<()> {
    if root.len() < SCHEMA_META_FIELD_COUNT_MIN || root.len() > SCHEMA_META_FIELD_COUNT_MAX {
        error!(count = root.len(), "unexpected meta field count");
        return Err(ParseError::SchemaParseFail(format!(
            "meta field count {} out of range",
            root.len()
        )));
    }
    let version = root.get(KEYWORD_SCHEMA_VERSION);
    if !matches!(version, Some(Value::String(_))) {
        return Err(meta_fail(KEYWORD_SCHEMA_VERSION, "string"));
    }
    let mode = root.get(KEYWORD_SCHEMA_MODE);
    if !matches!(mode, Some(Value::String(_))) {
        return Err(meta_fail(KEYWORD_SCHEMA_MODE, "string"));
    }
    // An empty define object declares nothing and is rejected.
    match root.get(KEYWORD_SCHEMA_DEFINE) {
        Some(Value::Object(define)) if !define.is_empty() => {}
        _ => return Err(meta_fail(KEYWORD_SCHEMA_DEFINE, "non-empty object")),
    }

    let mut recognized = SCHEMA_META_FIELD_COUNT_MIN;
    if let Some(indexes) = root.get(KEYWORD_SCHEMA_INDEXES) {
        if !indexes.is_array() {
            return Err(meta_fail(KEYWORD_SCHEMA_INDEXES, "array"));
        }
        recognized += 1;
    }
    if let Some(skip) = root.get(KEYWORD_SCHEMA_SKIPSIZE) {
        if !skip.is_u64() && !skip.is_i64() {
            return Err(meta_fail(KEYWORD_SCHEMA_SKIPSIZE, "integer"));
        }
        recognized += 1;
    }
    if root.len() != recognized {
        error!(total = root.len(), recognized, "unrecognized meta field present");
        return Err(ParseError::SchemaParseFail(
            "unrecognized top-level field".to_string(),
        ));
    }
    Ok(())
}

fn meta_fail(keyword: &str, expected: &str) -> ParseError {
    error!(keyword, expected, "mandatory meta field missing or mistyped");
    ParseError::SchemaParseFail(format!("expected {} of type {}", keyword, expected))
}

/// Classifies one define node value and produces its attribute.
fn decide_attribute(value: &Value) -> ParseResult<SchemaAttribute> {
    match value {
        Value::String(expression) => {
            let mut attr = parse_schema_attribute(expression)?;
            // Leaf string expressions always describe indexable primitives.
            attr.is_indexable = true;
            Ok(attr)
        }
        Value::Array(items) => {
            if !items.is_empty() {
                error!(size = items.len(), "array placeholder must be empty");
                return Err(ParseError::SchemaParseFail(
                    "array field must be an empty placeholder".to_string(),
                ));
            }
            Ok(SchemaAttribute::placeholder(FieldType::Array))
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                Ok(SchemaAttribute::placeholder(FieldType::LeafObject))
            } else {
                Ok(SchemaAttribute::placeholder(FieldType::InternalObject))
            }
        }
        other => {
            error!(kind = ?other, "unexpected define node kind");
            Err(ParseError::SchemaParseFail(
                "define leaf must be a string, array or object".to_string(),
            ))
        }
    }
}

/// An index entry is a single path string or a non-empty array of them.
fn index_entry_paths(entry: &Value) -> ParseResult<Vec<String>> {
    match entry {
        Value::String(path) => Ok(vec![path.clone()]),
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    ParseError::SchemaParseFail("index member must be a string".to_string())
                })
            })
            .collect(),
        _ => Err(ParseError::SchemaParseFail(
            "index entry must be a string or non-empty string array".to_string(),
        )),
    }
}
