//! The attribute-expression grammar: the mini-language inside a document
//! schema's leaf strings.
//!
//! An expression is a comma-separated sequence of up to three clauses:
//!
//! ```text
//! TYPE [, NOT NULL] [, DEFAULT <value>]
//! ```
//!
//! where `TYPE` is one of `BOOL INTEGER LONG DOUBLE STRING`, string defaults
//! are single-quoted, and `DEFAULT null` is only legal without `NOT NULL`.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::constants::{
    KEYWORD_ATTR_DEFAULT, KEYWORD_ATTR_NOT_NULL, KEYWORD_ATTR_VALUE_FALSE, KEYWORD_ATTR_VALUE_NULL,
    KEYWORD_ATTR_VALUE_TRUE,
};
use crate::errors::{ParseError, ParseResult};

use super::{strip, FieldType, FieldValue};

/// Declared attributes of a single schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAttribute {
    pub field_type: FieldType,
    pub is_indexable: bool,
    pub has_not_null_constraint: bool,
    pub has_default_value: bool,
    pub default_value: FieldValue,
}

impl SchemaAttribute {
    /// Attribute for a non-indexable placeholder node (array, object).
    pub fn placeholder(field_type: FieldType) -> Self {
        SchemaAttribute {
            field_type,
            is_indexable: false,
            has_not_null_constraint: false,
            has_default_value: false,
            default_value: FieldValue::Null,
        }
    }
}

/// Parses and validates one attribute expression.
pub fn parse_schema_attribute(expression: &str) -> ParseResult<SchemaAttribute> {
    let clauses: Vec<&str> = expression.split(',').map(strip).collect();
    if clauses.is_empty() || clauses.len() > 3 {
        return Err(attr_fail(expression, "clause count out of range"));
    }

    let field_type = parse_type_clause(clauses[0])
        .ok_or_else(|| attr_fail(expression, "unknown type keyword"))?;

    let mut has_not_null = false;
    let mut default_clause: Option<&str> = None;
    for clause in &clauses[1..] {
        if normalize_spaces(clause) == KEYWORD_ATTR_NOT_NULL {
            // NOT NULL must precede DEFAULT and appear at most once.
            if has_not_null || default_clause.is_some() {
                return Err(attr_fail(expression, "misplaced NOT NULL clause"));
            }
            has_not_null = true;
        } else if let Some(rest) = clause.strip_prefix(KEYWORD_ATTR_DEFAULT) {
            if default_clause.is_some() || !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
                return Err(attr_fail(expression, "malformed DEFAULT clause"));
            }
            default_clause = Some(strip(rest));
        } else {
            return Err(attr_fail(expression, "unrecognized clause"));
        }
    }

    let (has_default, default_value) = match default_clause {
        None => (false, FieldValue::Null),
        Some(literal) => (
            true,
            parse_default_literal(field_type, literal, has_not_null)
                .ok_or_else(|| attr_fail(expression, "invalid DEFAULT literal"))?,
        ),
    };

    Ok(SchemaAttribute {
        field_type,
        // The caller flips this on for leaf string expressions; the grammar
        // itself only ever produces indexable primitive types.
        is_indexable: false,
        has_not_null_constraint: has_not_null,
        has_default_value: has_default,
        default_value,
    })
}

fn parse_type_clause(clause: &str) -> Option<FieldType> {
    match clause {
        "BOOL" => Some(FieldType::Bool),
        "INTEGER" => Some(FieldType::Integer),
        "LONG" => Some(FieldType::Long),
        "DOUBLE" => Some(FieldType::Double),
        "STRING" => Some(FieldType::String),
        _ => None,
    }
}

fn parse_default_literal(field_type: FieldType, literal: &str, has_not_null: bool) -> Option<FieldValue> {
    if literal == KEYWORD_ATTR_VALUE_NULL {
        // A null default makes no sense on a NOT NULL field.
        if has_not_null {
            return None;
        }
        return Some(FieldValue::Null);
    }
    match field_type {
        FieldType::Bool => match literal {
            KEYWORD_ATTR_VALUE_TRUE => Some(FieldValue::Bool(true)),
            KEYWORD_ATTR_VALUE_FALSE => Some(FieldValue::Bool(false)),
            _ => None,
        },
        FieldType::Integer => literal.parse::<i32>().ok().map(FieldValue::Integer),
        FieldType::Long => literal.parse::<i64>().ok().map(FieldValue::Long),
        FieldType::Double => {
            if literal.parse::<f64>().is_ok() && !literal.eq_ignore_ascii_case("nan") {
                literal.parse::<f64>().ok().map(FieldValue::Double)
            } else {
                None
            }
        }
        FieldType::String => {
            let body = literal.strip_prefix('\'')?.strip_suffix('\'')?;
            if body.contains('\'') {
                return None;
            }
            Some(FieldValue::String(body.to_string()))
        }
        _ => None,
    }
}

fn normalize_spaces(clause: &str) -> String {
    clause.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

fn attr_fail(expression: &str, reason: &str) -> ParseError {
    error!(expression, reason, "invalid attribute expression");
    ParseError::SchemaParseFail(format!("attribute '{}': {}", expression, reason))
}
