//! Checking stored values against a document schema, and amending them with
//! declared defaults.

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ValueMatchError;
use crate::fields::{FieldPath, FieldType, FieldValue};

use super::types::{SchemaMode, SchemaObject};

impl SchemaObject {
    /// Checks `value` against this schema.
    ///
    /// On success returns the paths of declared fields the value lacks (in
    /// schema order); callers feed those into
    /// [`check_value_and_amend`](Self::check_value_and_amend) or treat them
    /// as absent-but-legal. Violations surface as errors.
    pub fn check_value(&self, value: &Value) -> Result<Vec<FieldPath>, ValueMatchError> {
        if !self.is_valid {
            return Err(ValueMatchError::ConstraintViolation(
                "schema object not valid".to_string(),
            ));
        }
        let root = value.as_object().ok_or_else(|| {
            ValueMatchError::FieldTypeMismatch("value root is not an object".to_string())
        })?;

        // Declared internal objects the value lacks are still walked (with
        // no value node) so that nested defaults get reported as lacking.
        let mut lacking: Vec<FieldPath> = Vec::new();
        let mut worklist: Vec<(FieldPath, Option<&Map<String, Value>>)> =
            vec![(FieldPath::root(), Some(root))];
        while let Some((base_path, node)) = worklist.pop() {
            let depth = base_path.len() as u32;
            if self.schema_mode == Some(SchemaMode::Strict) {
                for name in node.map(Map::keys).into_iter().flatten() {
                    let path = base_path.join(name);
                    let declared = self
                        .schema_define
                        .get(&depth)
                        .map(|fields| fields.contains_key(&path))
                        .unwrap_or(false);
                    if !declared {
                        return Err(ValueMatchError::FieldCountMismatch(path.to_string()));
                    }
                }
            }
            let declared_here = match self.schema_define.get(&depth) {
                None => continue,
                Some(fields) => fields
                    .iter()
                    .filter(|(path, _)| path.segments()[..depth as usize] == *base_path.segments()),
            };
            for (path, attr) in declared_here {
                let name = path.last().unwrap_or_default();
                match node.and_then(|map| map.get(name)) {
                    None => {
                        if attr.has_not_null_constraint && !attr.has_default_value {
                            return Err(ValueMatchError::ConstraintViolation(format!(
                                "field '{}' absent but NOT NULL without default",
                                path
                            )));
                        }
                        lacking.push(path.clone());
                        if attr.field_type == FieldType::InternalObject {
                            worklist.push((path.clone(), None));
                        }
                    }
                    Some(Value::Null) => {
                        if attr.has_not_null_constraint {
                            return Err(ValueMatchError::ConstraintViolation(format!(
                                "field '{}' is null but NOT NULL",
                                path
                            )));
                        }
                    }
                    Some(field_value) => {
                        check_field_type(path, attr.field_type, field_value)?;
                        if attr.field_type == FieldType::InternalObject {
                            if let Value::Object(children) = field_value {
                                worklist.push((path.clone(), Some(children)));
                            }
                        }
                    }
                }
            }
        }
        debug!(lacking = lacking.len(), "value checked against schema");
        Ok(lacking)
    }

    /// Checks `value` and fills in declared defaults for the fields it
    /// lacks, creating intermediate objects as needed. Returns whether the
    /// value was modified.
    pub fn check_value_and_amend(&self, value: &mut Value) -> Result<bool, ValueMatchError> {
        let lacking = self.check_value(value)?;
        let mut amended = false;
        for path in &lacking {
            let depth = (path.len() - 1) as u32;
            let attr = match self.schema_define.get(&depth).and_then(|f| f.get(path)) {
                Some(attr) if attr.has_default_value => attr,
                _ => continue,
            };
            insert_at_path(value, path, field_value_to_json(&attr.default_value));
            amended = true;
        }
        Ok(amended)
    }
}

fn check_field_type(
    path: &FieldPath,
    expected: FieldType,
    value: &Value,
) -> Result<(), ValueMatchError> {
    let actual = json_value_type(value);
    let matches = match expected {
        FieldType::Bool => actual == FieldType::Bool,
        FieldType::String => actual == FieldType::String,
        FieldType::Array => actual == FieldType::Array,
        // Any object satisfies an object field; substructure of declared
        // internal objects is checked by the walk itself.
        FieldType::LeafObject | FieldType::InternalObject => actual.is_object(),
        // Numeric values widen toward the schema type, never narrow.
        FieldType::Double => matches!(
            actual,
            FieldType::Integer | FieldType::Long | FieldType::Double
        ),
        FieldType::Long => matches!(actual, FieldType::Integer | FieldType::Long),
        FieldType::Integer => actual == FieldType::Integer,
        FieldType::Null => false,
    };
    if matches {
        Ok(())
    } else {
        Err(ValueMatchError::FieldTypeMismatch(format!(
            "field '{}' expects {} but value is {}",
            path,
            expected.type_name(),
            actual.type_name()
        )))
    }
}

fn json_value_type(value: &Value) -> FieldType {
    match value {
        Value::Null => FieldType::Null,
        Value::Bool(_) => FieldType::Bool,
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                if i32::try_from(integer).is_ok() {
                    FieldType::Integer
                } else {
                    FieldType::Long
                }
            } else {
                FieldType::Double
            }
        }
        Value::String(_) => FieldType::String,
        Value::Array(_) => FieldType::Array,
        Value::Object(_) => FieldType::LeafObject,
    }
}

fn field_value_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Long(l) => Value::from(*l),
        // NaN defaults are rejected at parse time, so from_f64 always
        // succeeds here.
        FieldValue::Double(d) => serde_json::Number::from_f64(*d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::String(s) => Value::String(s.clone()),
    }
}

/// Inserts `default` at `path`, creating intermediate objects along the way.
fn insert_at_path(value: &mut Value, path: &FieldPath, default: Value) {
    let mut node = value;
    let segments = path.segments();
    for segment in &segments[..segments.len() - 1] {
        let map = match node {
            Value::Object(map) => map,
            _ => return,
        };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if let Value::Object(map) = node {
        if let Some(last) = segments.last() {
            map.insert(last.clone(), default);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(mode: &str) -> SchemaObject {
        let raw = json!({
            "SCHEMA_VERSION": "1.0",
            "SCHEMA_MODE": mode,
            "SCHEMA_DEFINE": {
                "name": "STRING, NOT NULL",
                "age": "INTEGER, DEFAULT 20",
                "score": "DOUBLE",
                "profile": {
                    "nickname": "STRING, DEFAULT 'anon'"
                }
            }
        })
        .to_string();
        let mut schema = SchemaObject::new();
        schema.parse_from_schema_string(&raw).unwrap();
        schema
    }

    #[test]
    fn test_complete_value_passes() {
        let value = json!({
            "name": "alice", "age": 30, "score": 1.5,
            "profile": {"nickname": "al"}
        });
        let lacking = schema("STRICT").check_value(&value).unwrap();
        assert!(lacking.is_empty());
    }

    #[test]
    fn test_lacking_fields_reported() {
        let value = json!({"name": "alice", "profile": {}});
        let lacking = schema("COMPATIBLE").check_value(&value).unwrap();
        assert_eq!(lacking.len(), 3); // age, score, profile.nickname
    }

    #[test]
    fn test_missing_not_null_without_default_rejected() {
        let value = json!({"age": 30});
        assert!(matches!(
            schema("COMPATIBLE").check_value(&value),
            Err(ValueMatchError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_null_in_not_null_field_rejected() {
        let value = json!({"name": null});
        assert!(matches!(
            schema("COMPATIBLE").check_value(&value),
            Err(ValueMatchError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_strict_mode_rejects_undeclared_fields() {
        let value = json!({"name": "alice", "undeclared": 1});
        assert_eq!(
            schema("STRICT").check_value(&value),
            Err(ValueMatchError::FieldCountMismatch(".undeclared".to_string()))
        );
        // The same value is fine under COMPATIBLE mode.
        assert!(schema("COMPATIBLE").check_value(&value).is_ok());
    }

    #[test]
    fn test_numeric_widening() {
        // An integer value satisfies a DOUBLE field.
        let value = json!({"name": "a", "score": 7});
        assert!(schema("COMPATIBLE").check_value(&value).is_ok());
        // A fractional value does not satisfy an INTEGER field.
        let value = json!({"name": "a", "age": 1.5});
        assert!(matches!(
            schema("COMPATIBLE").check_value(&value),
            Err(ValueMatchError::FieldTypeMismatch(_))
        ));
        // Nor does an out-of-range integer.
        let value = json!({"name": "a", "age": 4_294_967_296i64});
        assert!(schema("COMPATIBLE").check_value(&value).is_err());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let value = json!({"name": 42});
        assert!(matches!(
            schema("COMPATIBLE").check_value(&value),
            Err(ValueMatchError::FieldTypeMismatch(_))
        ));
        let value = json!({"name": "a", "profile": []});
        assert!(schema("COMPATIBLE").check_value(&value).is_err());
    }

    #[test]
    fn test_amend_fills_defaults() {
        let mut value = json!({"name": "alice"});
        let amended = schema("COMPATIBLE").check_value_and_amend(&mut value).unwrap();
        assert!(amended);
        assert_eq!(value["age"], json!(20));
        // Intermediate object is created for the nested default.
        assert_eq!(value["profile"]["nickname"], json!("anon"));
        // score has no default and stays absent.
        assert!(value.get("score").is_none());
    }

    #[test]
    fn test_amend_noop_on_complete_value() {
        let mut value = json!({
            "name": "alice", "age": 1, "score": 0.5,
            "profile": {"nickname": "al"}
        });
        let amended = schema("STRICT").check_value_and_amend(&mut value).unwrap();
        assert!(!amended);
    }
}
