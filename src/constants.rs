//! Protocol constants shared by the schema parsers, comparators and the
//! negotiation codec.
//!
//! Every limit here is part of the sync protocol: two peers must enforce the
//! same bounds or a schema accepted on one side could be rejected on the
//! other after transfer.

/// Upper bound on a schema string (after FlatBuffer decoding, if any).
pub const SCHEMA_STRING_SIZE_LIMIT: usize = 524_288;

/// Maximum nesting depth of a document schema define (0-based depths 0..4).
pub const SCHEMA_FIELD_PATH_DEPTH_MAX: u32 = 4;

/// Maximum total number of field names across all depths.
pub const SCHEMA_FIELD_NAME_COUNT_MAX: usize = 256;

/// Maximum length of a single field name.
pub const SCHEMA_FIELD_NAME_LENGTH_MAX: usize = 64;

/// Maximum number of indexes a document schema may declare.
pub const SCHEMA_INDEX_COUNT_MAX: usize = 32;

/// Maximum value of `SCHEMA_SKIPSIZE` (4 MiB minus two bytes).
pub const SCHEMA_SKIPSIZE_MAX: u64 = 4_194_302;

/// A document schema has 3 mandatory meta fields and up to 2 optional ones.
pub const SCHEMA_META_FIELD_COUNT_MIN: usize = 3;
pub const SCHEMA_META_FIELD_COUNT_MAX: usize = 5;

/// The only supported document schema version literal.
pub const SCHEMA_SUPPORT_VERSION: &str = "1.0";

/// Relational schema version without composite-primary-key support.
pub const SCHEMA_SUPPORT_VERSION_V2: &str = "2.0";

/// Relational schema version with composite primary keys and table modes.
pub const SCHEMA_SUPPORT_VERSION_V2_1: &str = "2.1";

// Top-level schema keywords.
pub const KEYWORD_SCHEMA_VERSION: &str = "SCHEMA_VERSION";
pub const KEYWORD_SCHEMA_MODE: &str = "SCHEMA_MODE";
pub const KEYWORD_SCHEMA_DEFINE: &str = "SCHEMA_DEFINE";
pub const KEYWORD_SCHEMA_INDEXES: &str = "SCHEMA_INDEXES";
pub const KEYWORD_SCHEMA_SKIPSIZE: &str = "SCHEMA_SKIPSIZE";
pub const KEYWORD_SCHEMA_TYPE: &str = "SCHEMA_TYPE";
pub const KEYWORD_TABLE_MODE: &str = "TABLE_MODE";
pub const KEYWORD_SCHEMA_TABLES: &str = "TABLES";

// Keyword values.
pub const KEYWORD_MODE_STRICT: &str = "STRICT";
pub const KEYWORD_MODE_COMPATIBLE: &str = "COMPATIBLE";
pub const KEYWORD_TYPE_RELATIVE: &str = "RELATIVE";
pub const KEYWORD_TABLE_SPLIT_DEVICE: &str = "SPLIT_BY_DEVICE";
pub const KEYWORD_TABLE_COLLABORATION: &str = "COLLABORATION";

// Table object keywords.
pub const KEYWORD_TABLE_NAME: &str = "NAME";
pub const KEYWORD_TABLE_DEFINE: &str = "DEFINE";
pub const KEYWORD_TABLE_AUTOINCREMENT: &str = "AUTOINCREMENT";
pub const KEYWORD_TABLE_PRIMARY_KEY: &str = "PRIMARY_KEY";
pub const KEYWORD_TABLE_INDEX: &str = "INDEX";
pub const KEYWORD_TABLE_UNIQUE: &str = "UNIQUE";

// Column attribute keywords.
pub const KEYWORD_COLUMN_ID: &str = "COLUMN_ID";
pub const KEYWORD_COLUMN_TYPE: &str = "TYPE";
pub const KEYWORD_COLUMN_NOT_NULL: &str = "NOT_NULL";
pub const KEYWORD_COLUMN_DEFAULT: &str = "DEFAULT";

// Attribute-expression keywords.
pub const KEYWORD_ATTR_NOT_NULL: &str = "NOT NULL";
pub const KEYWORD_ATTR_DEFAULT: &str = "DEFAULT";
pub const KEYWORD_ATTR_VALUE_NULL: &str = "null";
pub const KEYWORD_ATTR_VALUE_TRUE: &str = "true";
pub const KEYWORD_ATTR_VALUE_FALSE: &str = "false";
