//! Relational schema string parser.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::constants::{
    KEYWORD_COLUMN_DEFAULT, KEYWORD_COLUMN_ID, KEYWORD_COLUMN_NOT_NULL, KEYWORD_COLUMN_TYPE,
    KEYWORD_SCHEMA_TABLES, KEYWORD_SCHEMA_TYPE, KEYWORD_SCHEMA_VERSION, KEYWORD_TABLE_AUTOINCREMENT,
    KEYWORD_TABLE_DEFINE, KEYWORD_TABLE_INDEX, KEYWORD_TABLE_MODE, KEYWORD_TABLE_NAME,
    KEYWORD_TABLE_PRIMARY_KEY, KEYWORD_TABLE_UNIQUE, KEYWORD_TYPE_RELATIVE,
    SCHEMA_STRING_SIZE_LIMIT, SCHEMA_SUPPORT_VERSION_V2, SCHEMA_SUPPORT_VERSION_V2_1,
};
use crate::errors::{ParseError, ParseResult};
use crate::fields::{check_field_name, strip};

use super::types::{
    CompositeFields, FieldInfo, RelationalSchemaObject, StorageType, TableInfo, TableMode,
};

impl RelationalSchemaObject {
    /// Parses a relational schema string into this object. Callable only
    /// while the object is still invalid.
    pub fn parse_from_schema_string(&mut self, raw: &str) -> ParseResult<()> {
        if self.is_valid {
            return Err(ParseError::NotPermit);
        }
        if raw.is_empty() || raw.len() > SCHEMA_STRING_SIZE_LIMIT {
            error!(size = raw.len(), "relational schema size out of range");
            return Err(ParseError::InvalidArgs(format!(
                "schema size {} out of range",
                raw.len()
            )));
        }
        let tree: Value = serde_json::from_str(raw).map_err(|e| {
            error!(error = %e, "relational schema is not valid json");
            ParseError::SchemaParseFail(format!("json parse: {}", e))
        })?;
        let root = tree.as_object().ok_or_else(|| {
            ParseError::SchemaParseFail("schema root is not an object".to_string())
        })?;

        self.parse_check_version_type_mode(root)?;
        self.parse_check_tables(root)?;

        self.is_valid = true;
        self.generate_schema_string();
        debug!(
            version = %self.schema_version,
            tables = self.tables.len(),
            "relational schema parsed"
        );
        Ok(())
    }

    fn parse_check_version_type_mode(&mut self, root: &Map<String, Value>) -> ParseResult<()> {
        let version = expect_string(root, KEYWORD_SCHEMA_VERSION)?;
        let version = strip(&version);
        if version != SCHEMA_SUPPORT_VERSION_V2 && version != SCHEMA_SUPPORT_VERSION_V2_1 {
            error!(version, "unsupported relational schema version");
            return Err(ParseError::SchemaParseFail(format!(
                "unsupported SCHEMA_VERSION '{}'",
                version
            )));
        }
        self.schema_version = version.to_string();

        let schema_type = expect_string(root, KEYWORD_SCHEMA_TYPE)?;
        if strip(&schema_type) != KEYWORD_TYPE_RELATIVE {
            error!(schema_type, "schema type is not relational");
            return Err(ParseError::SchemaParseFail(format!(
                "unsupported SCHEMA_TYPE '{}'",
                schema_type
            )));
        }

        // The table mode exists from version 2.1 on, where it is mandatory.
        match root.get(KEYWORD_TABLE_MODE) {
            Some(value) if self.schema_version == SCHEMA_SUPPORT_VERSION_V2_1 => {
                let keyword = value.as_str().map(strip).unwrap_or_default();
                self.table_mode = TableMode::from_keyword(keyword).ok_or_else(|| {
                    error!(mode = keyword, "unknown table mode");
                    ParseError::SchemaParseFail(format!("unknown TABLE_MODE '{}'", keyword))
                })?;
            }
            Some(_) => {
                return Err(ParseError::SchemaParseFail(
                    "TABLE_MODE requires schema version 2.1".to_string(),
                ));
            }
            None if self.schema_version == SCHEMA_SUPPORT_VERSION_V2_1 => {
                return Err(ParseError::SchemaParseFail(
                    "TABLE_MODE is mandatory for schema version 2.1".to_string(),
                ));
            }
            None => {}
        }
        Ok(())
    }

    fn parse_check_tables(&mut self, root: &Map<String, Value>) -> ParseResult<()> {
        self.tables.clear();
        let tables = root
            .get(KEYWORD_SCHEMA_TABLES)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                error!("schema has no TABLES array");
                ParseError::SchemaParseFail("expected TABLES array".to_string())
            })?;
        if tables.is_empty() {
            return Err(ParseError::SchemaParseFail(
                "TABLES must not be empty".to_string(),
            ));
        }
        for entry in tables {
            let table_object = entry.as_object().ok_or_else(|| {
                ParseError::SchemaParseFail("table entry is not an object".to_string())
            })?;
            let table = self.parse_one_table(table_object)?;
            if self.tables.contains_key(&table.table_name) {
                error!(table = %table.table_name, "duplicated table name");
                return Err(ParseError::SchemaParseFail(format!(
                    "duplicated table '{}'",
                    table.table_name
                )));
            }
            self.tables.insert(table.table_name.clone(), table);
        }
        Ok(())
    }

    fn parse_one_table(&self, table_object: &Map<String, Value>) -> ParseResult<TableInfo> {
        let name = expect_string(table_object, KEYWORD_TABLE_NAME)?;
        check_field_name(&name)
            .map_err(|_| ParseError::SchemaParseFail(format!("illegal table name '{}'", name)))?;
        let mut table = TableInfo::new(name);

        let define = table_object
            .get(KEYWORD_TABLE_DEFINE)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ParseError::SchemaParseFail("table has no DEFINE object".to_string())
            })?;
        for (column_name, column) in define {
            check_field_name(column_name).map_err(|_| {
                ParseError::SchemaParseFail(format!("illegal column name '{}'", column_name))
            })?;
            table.add_field(parse_column(column_name, column)?);
        }

        if let Some(auto_increment) = table_object.get(KEYWORD_TABLE_AUTOINCREMENT) {
            table.auto_increment = auto_increment.as_bool().ok_or_else(|| {
                ParseError::SchemaParseFail("AUTOINCREMENT must be a boolean".to_string())
            })?;
        }
        if let Some(primary_key) = table_object.get(KEYWORD_TABLE_PRIMARY_KEY) {
            table.primary_key = parse_primary_key(&table, primary_key)?;
            if table.is_composite_primary_key()
                && self.schema_version == SCHEMA_SUPPORT_VERSION_V2
            {
                return Err(ParseError::SchemaParseFail(
                    "composite primary key requires schema version 2.1".to_string(),
                ));
            }
        }
        if let Some(indexes) = table_object.get(KEYWORD_TABLE_INDEX) {
            table.index_defines = parse_index_defines(&table, indexes)?;
        }
        if let Some(uniques) = table_object.get(KEYWORD_TABLE_UNIQUE) {
            table.set_unique_defines(parse_unique_defines(&table, uniques)?);
        }
        Ok(table)
    }
}

fn expect_string(object: &Map<String, Value>, keyword: &str) -> ParseResult<String> {
    object
        .get(keyword)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| {
            error!(keyword, "mandatory string field missing or mistyped");
            ParseError::SchemaParseFail(format!("expected string field '{}'", keyword))
        })
}

fn parse_column(column_name: &str, column: &Value) -> ParseResult<FieldInfo> {
    let attributes = column.as_object().ok_or_else(|| {
        ParseError::SchemaParseFail(format!("column '{}' is not an object", column_name))
    })?;
    let column_id = attributes
        .get(KEYWORD_COLUMN_ID)
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            ParseError::SchemaParseFail(format!("column '{}' needs integer COLUMN_ID", column_name))
        })?;
    let data_type = attributes
        .get(KEYWORD_COLUMN_TYPE)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ParseError::SchemaParseFail(format!("column '{}' needs string TYPE", column_name))
        })?
        .to_ascii_lowercase();
    let is_not_null = attributes
        .get(KEYWORD_COLUMN_NOT_NULL)
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            ParseError::SchemaParseFail(format!("column '{}' needs boolean NOT_NULL", column_name))
        })?;
    let default_value = match attributes.get(KEYWORD_COLUMN_DEFAULT) {
        None => None,
        Some(Value::String(default)) => Some(default.clone()),
        Some(_) => {
            return Err(ParseError::SchemaParseFail(format!(
                "column '{}' DEFAULT must be a string",
                column_name
            )));
        }
    };
    Ok(FieldInfo {
        field_name: column_name.to_string(),
        storage_type: StorageType::from_declared_type(&data_type),
        data_type,
        is_not_null,
        default_value,
        column_id,
    })
}

/// A primary key is a single column name or an array of them; positions are
/// 1-based in declaration order. Every named column must exist.
fn parse_primary_key(
    table: &TableInfo,
    primary_key: &Value,
) -> ParseResult<BTreeMap<u32, String>> {
    let columns: Vec<String> = match primary_key {
        Value::String(column) => vec![column.clone()],
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    ParseError::SchemaParseFail("PRIMARY_KEY member must be a string".to_string())
                })
            })
            .collect::<ParseResult<_>>()?,
        _ => {
            return Err(ParseError::SchemaParseFail(
                "PRIMARY_KEY must be a string or non-empty string array".to_string(),
            ));
        }
    };
    let mut key = BTreeMap::new();
    for (position, column) in columns.iter().enumerate() {
        check_known_column(table, column, "PRIMARY_KEY")?;
        if key.values().any(|existing| existing == column) {
            return Err(ParseError::SchemaParseFail(format!(
                "duplicated PRIMARY_KEY column '{}'",
                column
            )));
        }
        key.insert(position as u32 + 1, column.clone());
    }
    Ok(key)
}

fn parse_index_defines(
    table: &TableInfo,
    indexes: &Value,
) -> ParseResult<BTreeMap<String, CompositeFields>> {
    let entries = indexes.as_object().ok_or_else(|| {
        ParseError::SchemaParseFail("INDEX must be an object".to_string())
    })?;
    let mut defines = BTreeMap::new();
    for (index_name, members) in entries {
        let columns = string_array(members, "INDEX")?;
        for column in &columns {
            check_known_column(table, column, "INDEX")?;
        }
        defines.insert(index_name.clone(), columns);
    }
    Ok(defines)
}

/// A unique entry is one column name or an array of them.
fn parse_unique_defines(table: &TableInfo, uniques: &Value) -> ParseResult<Vec<CompositeFields>> {
    let entries = uniques.as_array().ok_or_else(|| {
        ParseError::SchemaParseFail("UNIQUE must be an array".to_string())
    })?;
    let mut defines = Vec::with_capacity(entries.len());
    for entry in entries {
        let columns = match entry {
            Value::String(column) => vec![column.clone()],
            other => string_array(other, "UNIQUE")?,
        };
        for column in &columns {
            check_known_column(table, column, "UNIQUE")?;
        }
        defines.push(columns);
    }
    Ok(defines)
}

fn string_array(value: &Value, context: &str) -> ParseResult<CompositeFields> {
    match value {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    ParseError::SchemaParseFail(format!("{} member must be a string", context))
                })
            })
            .collect(),
        _ => Err(ParseError::SchemaParseFail(format!(
            "{} must be a non-empty string array",
            context
        ))),
    }
}

fn check_known_column(table: &TableInfo, column: &str, context: &str) -> ParseResult<()> {
    if table.fields.contains_key(column) {
        Ok(())
    } else {
        error!(table = %table.table_name, column, context, "unknown column referenced");
        Err(ParseError::SchemaParseFail(format!(
            "{} references unknown column '{}'",
            context, column
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table_json() -> serde_json::Value {
        json!({
            "NAME": "student",
            "DEFINE": {
                "id": {"COLUMN_ID": 1, "TYPE": "INTEGER", "NOT_NULL": true},
                "name": {"COLUMN_ID": 2, "TYPE": "TEXT", "NOT_NULL": false, "DEFAULT": "unknown"},
                "score": {"COLUMN_ID": 3, "TYPE": "DOUBLE", "NOT_NULL": false}
            },
            "AUTOINCREMENT": true,
            "PRIMARY_KEY": "id",
            "INDEX": {"idx_name": ["name"]}
        })
    }

    #[test]
    fn test_parse_valid_v2_schema() {
        let raw = json!({
            "SCHEMA_VERSION": "2.0",
            "SCHEMA_TYPE": "RELATIVE",
            "TABLES": [table_json()]
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        schema.parse_from_schema_string(&raw).unwrap();
        assert!(schema.is_schema_valid());
        assert_eq!(schema.schema_version(), "2.0");
        let table = schema.get_table("student").unwrap();
        assert!(table.auto_increment);
        assert_eq!(table.primary_key[&1], "id");
        // Declared types are lowercased on the way in.
        assert_eq!(table.fields["id"].data_type, "integer");
        assert_eq!(table.fields["id"].storage_type, StorageType::Integer);
        assert_eq!(table.fields["name"].default_value.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_composite_primary_key_needs_v21() {
        let mut table = table_json();
        table["PRIMARY_KEY"] = json!(["id", "name"]);
        let raw = json!({
            "SCHEMA_VERSION": "2.0",
            "SCHEMA_TYPE": "RELATIVE",
            "TABLES": [table.clone()]
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        assert!(schema.parse_from_schema_string(&raw).is_err());

        let raw = json!({
            "SCHEMA_VERSION": "2.1",
            "SCHEMA_TYPE": "RELATIVE",
            "TABLE_MODE": "COLLABORATION",
            "TABLES": [table]
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        schema.parse_from_schema_string(&raw).unwrap();
        let parsed = schema.get_table("student").unwrap();
        assert_eq!(parsed.primary_key[&1], "id");
        assert_eq!(parsed.primary_key[&2], "name");
        assert_eq!(schema.table_mode(), TableMode::Collaboration);
    }

    #[test]
    fn test_v21_requires_table_mode() {
        let raw = json!({
            "SCHEMA_VERSION": "2.1",
            "SCHEMA_TYPE": "RELATIVE",
            "TABLES": [table_json()]
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        assert!(schema.parse_from_schema_string(&raw).is_err());
    }

    #[test]
    fn test_table_mode_rejected_under_v2() {
        let raw = json!({
            "SCHEMA_VERSION": "2.0",
            "SCHEMA_TYPE": "RELATIVE",
            "TABLE_MODE": "SPLIT_BY_DEVICE",
            "TABLES": [table_json()]
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        assert!(schema.parse_from_schema_string(&raw).is_err());
    }

    #[test]
    fn test_wrong_schema_type_rejected() {
        let raw = json!({
            "SCHEMA_VERSION": "2.0",
            "SCHEMA_TYPE": "JSON",
            "TABLES": [table_json()]
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        assert!(schema.parse_from_schema_string(&raw).is_err());
    }

    #[test]
    fn test_unknown_index_column_rejected() {
        let mut table = table_json();
        table["INDEX"] = json!({"idx_bad": ["missing"]});
        let raw = json!({
            "SCHEMA_VERSION": "2.0",
            "SCHEMA_TYPE": "RELATIVE",
            "TABLES": [table]
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        assert!(schema.parse_from_schema_string(&raw).is_err());
    }

    #[test]
    fn test_empty_tables_rejected() {
        let raw = json!({
            "SCHEMA_VERSION": "2.0",
            "SCHEMA_TYPE": "RELATIVE",
            "TABLES": []
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        assert!(schema.parse_from_schema_string(&raw).is_err());
    }

    #[test]
    fn test_empty_string_is_invalid_args() {
        let mut schema = RelationalSchemaObject::new();
        assert!(matches!(
            schema.parse_from_schema_string(""),
            Err(ParseError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_regenerated_string_reparses_equal() {
        let raw = json!({
            "SCHEMA_VERSION": "2.1",
            "SCHEMA_TYPE": "RELATIVE",
            "TABLE_MODE": "SPLIT_BY_DEVICE",
            "TABLES": [{
                "NAME": "t1",
                "DEFINE": {
                    "a": {"COLUMN_ID": 1, "TYPE": "integer", "NOT_NULL": true},
                    "b": {"COLUMN_ID": 2, "TYPE": "text", "NOT_NULL": false}
                },
                "PRIMARY_KEY": ["a", "b"],
                "UNIQUE": ["b", ["a", "b"]]
            }]
        })
        .to_string();
        let mut schema = RelationalSchemaObject::new();
        schema.parse_from_schema_string(&raw).unwrap();
        let regenerated = schema.to_schema_string().to_string();

        let mut again = RelationalSchemaObject::new();
        again.parse_from_schema_string(&regenerated).unwrap();
        assert_eq!(again.to_schema_string(), regenerated);
        let table = again.get_table("t1").unwrap();
        assert_eq!(table.primary_key[&1], "a");
        assert_eq!(table.primary_key[&2], "b");
        assert_eq!(table.unique_defines.len(), 2);
    }
}
