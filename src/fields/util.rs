//! Lexical helpers shared by both schema parsers: whitespace stripping, the
//! field-name charset rule, and `$.`-prefixed field-path strings.

use tracing::error;

use crate::constants::{SCHEMA_FIELD_NAME_LENGTH_MAX, SCHEMA_FIELD_PATH_DEPTH_MAX};
use crate::errors::{ParseError, ParseResult};

use super::FieldPath;

/// Removes leading and trailing ASCII whitespace.
pub fn strip(input: &str) -> &str {
    input.trim_matches(|c: char| c.is_ascii_whitespace())
}

/// Validates a single field (or column) name.
///
/// Legal names are 1..=64 characters of `[A-Za-z0-9_]` and must not begin
/// with a digit.
pub fn check_field_name(name: &str) -> ParseResult<()> {
    if name.is_empty() || name.len() > SCHEMA_FIELD_NAME_LENGTH_MAX {
        return Err(ParseError::SchemaParseFail(format!(
            "field name length {} out of range",
            name.len()
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('0');
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(ParseError::SchemaParseFail(format!(
            "field name '{}' begins with illegal character",
            name
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ParseError::SchemaParseFail(format!(
            "field name '{}' contains illegal character",
            name
        )));
    }
    Ok(())
}

/// Parses an index field-path string of the form `$.field1.field2`.
///
/// The leading `$` designates the document root and carries no segment. The
/// resulting path is bounded by the schema depth limit and every segment
/// passes the field-name check.
pub fn parse_field_path(path_str: &str) -> ParseResult<FieldPath> {
    let stripped = strip(path_str);
    let body = stripped.strip_prefix("$.").ok_or_else(|| {
        error!(path = %stripped, "index path missing '$.' prefix");
        ParseError::SchemaParseFail(format!("field path '{}' must begin with '$.'", stripped))
    })?;

    let mut segments = Vec::new();
    for segment in body.split('.') {
        check_field_name(segment)?;
        segments.push(segment.to_string());
    }
    if segments.is_empty() || segments.len() > SCHEMA_FIELD_PATH_DEPTH_MAX as usize {
        return Err(ParseError::SchemaParseFail(format!(
            "field path depth {} out of range",
            segments.len()
        )));
    }
    Ok(FieldPath::new(segments))
}
