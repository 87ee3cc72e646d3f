//! Core types of the relational schema model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    KEYWORD_TABLE_COLLABORATION, KEYWORD_TABLE_SPLIT_DEVICE, SCHEMA_SUPPORT_VERSION_V2,
    SCHEMA_SUPPORT_VERSION_V2_1,
};

/// SQLite column affinity derived from the declared column type, per the
/// "Determination Of Column Affinity" rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    #[default]
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageType {
    /// Derives the affinity from a (lowercased) declared type string.
    pub fn from_declared_type(data_type: &str) -> Self {
        // "int" anywhere wins last; the text patterns win outright; blob and
        // the real patterns only apply while no stronger match was seen.
        let mut affinity = StorageType::Null;
        for window_end in 1..=data_type.len() {
            let seen = &data_type[..window_end];
            if seen.ends_with("char") || seen.ends_with("clob") || seen.ends_with("text") {
                affinity = StorageType::Text;
            } else if seen.ends_with("blob")
                && (affinity == StorageType::Null || affinity == StorageType::Real)
            {
                affinity = StorageType::Blob;
            } else if (seen.ends_with("real") || seen.ends_with("floa") || seen.ends_with("doub"))
                && affinity == StorageType::Null
            {
                affinity = StorageType::Real;
            } else if seen.ends_with("int") {
                affinity = StorageType::Integer;
            }
        }
        affinity
    }
}

/// Sharing granularity of a relational store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableMode {
    /// Each device owns its rows; peers hold per-device copies.
    #[default]
    SplitByDevice,
    /// All devices edit one shared dataset.
    Collaboration,
}

impl TableMode {
    pub fn keyword(&self) -> &'static str {
        match self {
            TableMode::SplitByDevice => KEYWORD_TABLE_SPLIT_DEVICE,
            TableMode::Collaboration => KEYWORD_TABLE_COLLABORATION,
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            KEYWORD_TABLE_SPLIT_DEVICE => Some(TableMode::SplitByDevice),
            KEYWORD_TABLE_COLLABORATION => Some(TableMode::Collaboration),
            _ => None,
        }
    }
}

/// One column of a relational table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldInfo {
    pub field_name: String,
    /// Declared type, lowercased at parse time.
    pub data_type: String,
    pub is_not_null: bool,
    pub default_value: Option<String>,
    pub storage_type: StorageType,
    pub column_id: i64,
}

impl FieldInfo {
    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }

    /// Column-level equality as sync sees it: name, nullability, declared
    /// type text and default must all agree. Column ids are local ordering
    /// detail and do not participate.
    pub fn compare_with_field(&self, other: &FieldInfo) -> bool {
        if self.field_name != other.field_name
            || self.is_not_null != other.is_not_null
            || self.data_type != other.data_type
        {
            return false;
        }
        match (&self.default_value, &other.default_value) {
            (Some(a), Some(b)) => a == b,
            (None, None) => true,
            _ => false,
        }
    }

    /// The column's fragment of a table define string, fields in the fixed
    /// order COLUMN_ID, TYPE, NOT_NULL, DEFAULT.
    pub(crate) fn to_attribute_string(&self) -> String {
        let mut attr = format!(
            "{}: {{\"COLUMN_ID\":{},\"TYPE\":{},\"NOT_NULL\":{}",
            json_quote(&self.field_name),
            self.column_id,
            json_quote(&self.data_type),
            self.is_not_null
        );
        if let Some(default) = &self.default_value {
            attr.push_str(&format!(",\"DEFAULT\":{}", json_quote(default)));
        }
        attr.push('}');
        attr
    }
}

/// An ordered list of column names (a composite index, unique or key).
pub type CompositeFields = Vec<String>;

/// One relational table: columns, keys and indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableInfo {
    pub table_name: String,
    pub auto_increment: bool,
    /// Primary key columns keyed by 1-based position.
    pub primary_key: BTreeMap<u32, String>,
    /// Columns keyed by name; map order is the canonical field order.
    pub fields: BTreeMap<String, FieldInfo>,
    pub index_defines: BTreeMap<String, CompositeFields>,
    /// Unique constraints, each inner list sorted, the outer list sorted.
    pub unique_defines: Vec<CompositeFields>,
}

impl TableInfo {
    pub fn new(table_name: impl Into<String>) -> Self {
        TableInfo {
            table_name: table_name.into(),
            ..TableInfo::default()
        }
    }

    pub fn add_field(&mut self, field: FieldInfo) {
        self.fields.insert(field.field_name.clone(), field);
    }

    /// Stores unique constraints in canonical order so that comparison and
    /// string generation are deterministic.
    pub fn set_unique_defines(&mut self, mut uniques: Vec<CompositeFields>) {
        for unique in &mut uniques {
            unique.sort();
        }
        uniques.sort();
        self.unique_defines = uniques;
    }

    pub fn is_composite_primary_key(&self) -> bool {
        self.primary_key.len() > 1
    }

    /// The table's fragment of the schema string, fields in the fixed order
    /// NAME, DEFINE, AUTOINCREMENT, UNIQUE, PRIMARY_KEY, INDEX. Single-column
    /// primary keys render as a plain string only under version 2.0. The
    /// optional sections are dropped when empty; NAME, DEFINE and
    /// AUTOINCREMENT always appear so every fragment re-parses.
    pub fn to_table_info_string(&self, schema_version: &str) -> String {
        let mut sections = vec![format!("\"NAME\": {}", json_quote(&self.table_name))];
        let columns: Vec<String> = self
            .fields
            .values()
            .map(FieldInfo::to_attribute_string)
            .collect();
        sections.push(format!("\"DEFINE\": {{{}}}", columns.join(",")));
        sections.push(format!("\"AUTOINCREMENT\": {}", self.auto_increment));
        if !self.unique_defines.is_empty() {
            let uniques: Vec<String> = self
                .unique_defines
                .iter()
                .map(|unique| quote_list(unique))
                .collect();
            sections.push(format!("\"UNIQUE\":[{}]", uniques.join(",")));
        }
        if self.primary_key.len() == 1 && schema_version == SCHEMA_SUPPORT_VERSION_V2 {
            let single = self.primary_key.values().next().map(String::as_str).unwrap_or("");
            sections.push(format!("\"PRIMARY_KEY\": {}", json_quote(single)));
        } else if !self.primary_key.is_empty() {
            let columns: Vec<String> = self.primary_key.values().cloned().collect();
            sections.push(format!("\"PRIMARY_KEY\": {}", quote_list(&columns)));
        }
        if !self.index_defines.is_empty() {
            let indexes: Vec<String> = self
                .index_defines
                .iter()
                .map(|(name, columns)| format!("{}: {}", json_quote(name), quote_list(columns)))
                .collect();
            sections.push(format!("\"INDEX\": {{{}}}", indexes.join(",")));
        }
        format!("{{{}}}", sections.join(","))
    }
}

fn json_quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn quote_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| json_quote(item)).collect();
    format!("[{}]", quoted.join(","))
}

/// Parsed, regenerable representation of a relational schema string.
#[derive(Debug, Clone, Default)]
pub struct RelationalSchemaObject {
    pub(crate) is_valid: bool,
    pub(crate) schema_version: String,
    pub(crate) table_mode: TableMode,
    pub(crate) tables: BTreeMap<String, TableInfo>,
    pub(crate) schema_string: String,
}

impl RelationalSchemaObject {
    pub fn new() -> Self {
        RelationalSchemaObject::default()
    }

    pub fn is_schema_valid(&self) -> bool {
        self.is_valid
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn table_mode(&self) -> TableMode {
        self.table_mode
    }

    /// Canonical regenerated schema string; empty until valid.
    pub fn to_schema_string(&self) -> &str {
        &self.schema_string
    }

    pub fn get_table(&self, table_name: &str) -> Option<&TableInfo> {
        self.tables.get(table_name)
    }

    pub fn tables(&self) -> &BTreeMap<String, TableInfo> {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Adds (or replaces) a table and regenerates the schema string. A
    /// composite primary key forces the schema up to version 2.1.
    pub fn add_table(&mut self, table: TableInfo) {
        if self.schema_version.is_empty() {
            self.schema_version = SCHEMA_SUPPORT_VERSION_V2.to_string();
        }
        if table.is_composite_primary_key() {
            self.schema_version = SCHEMA_SUPPORT_VERSION_V2_1.to_string();
        }
        self.tables.insert(table.table_name.clone(), table);
        self.is_valid = true;
        self.generate_schema_string();
    }

    /// Removes a table by name; a no-op for unknown names.
    pub fn remove_table(&mut self, table_name: &str) {
        if self.tables.remove(table_name).is_some() {
            self.generate_schema_string();
        }
    }

    /// Collaboration mode is a version 2.1 feature and upgrades the schema
    /// version on its way in.
    pub fn set_table_mode(&mut self, mode: TableMode) {
        self.table_mode = mode;
        if mode == TableMode::Collaboration {
            self.schema_version = SCHEMA_SUPPORT_VERSION_V2_1.to_string();
        }
        self.generate_schema_string();
    }

    pub(crate) fn generate_schema_string(&mut self) {
        let mut text = format!(
            "{{\"SCHEMA_VERSION\":\"{}\",\"SCHEMA_TYPE\":\"RELATIVE\"",
            self.schema_version
        );
        if self.schema_version == SCHEMA_SUPPORT_VERSION_V2_1 {
            text.push_str(&format!(",\"TABLE_MODE\":\"{}\"", self.table_mode.keyword()));
        }
        let tables: Vec<String> = self
            .tables
            .values()
            .map(|table| table.to_table_info_string(&self.schema_version))
            .collect();
        text.push_str(&format!(",\"TABLES\":[{}]", tables.join(",")));
        text.push('}');
        self.schema_string = text;
    }
}
