//! Document schema comparison.
//!
//! `self` is the schema already in effect; the argument is the candidate
//! (typically a peer's or an upgrade's) schema. The candidate may declare
//! more fields than `self` under `COMPATIBLE` mode, never fewer.

use std::collections::BTreeMap;

use tracing::debug;

use crate::constants::SCHEMA_FIELD_PATH_DEPTH_MAX;
use crate::errors::{ParseError, ParseResult};
use crate::fields::{FieldPath, FieldType, SchemaAttribute};

use super::types::{IndexDifference, SchemaMode, SchemaObject, SchemaType};

/// Outcome of comparing a candidate schema against an established one.
///
/// Only `Incompatible` blocks anything; the other three tiers tell the
/// caller how much migration work the candidate implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityVerdict {
    /// Same define, same indexes.
    EqualExactly,
    /// Same define, different indexes. Data needs no migration.
    Compatible,
    /// The candidate declares additional fields. Data needs amendment on
    /// upgrade but nothing is lost.
    CompatibleUpgrade,
    Incompatible,
}

impl CompatibilityVerdict {
    pub fn is_incompatible(&self) -> bool {
        matches!(self, CompatibilityVerdict::Incompatible)
    }
}

/// Result of comparing two attributes of a shared field.
enum AttributeCompare {
    Equal,
    Upgrade,
    Incompatible,
}

impl SchemaObject {
    /// Compares a candidate schema string against this (valid) object.
    ///
    /// A byte-identical string short-circuits to `EqualExactly` without a
    /// parse. Errors only signal that the comparison could not be carried
    /// out; incompatibility is a verdict, not an error.
    pub fn compare_against_schema_string(
        &self,
        candidate: &str,
    ) -> ParseResult<(CompatibilityVerdict, IndexDifference)> {
        if !self.is_valid {
            return Err(ParseError::NotPermit);
        }
        if candidate == self.schema_string {
            return Ok((CompatibilityVerdict::EqualExactly, IndexDifference::default()));
        }
        let mut other = SchemaObject::new();
        other.parse_from_schema_string(candidate)?;
        self.compare_against_schema_object(&other)
    }

    /// Compares an already-parsed candidate against this object.
    pub fn compare_against_schema_object(
        &self,
        other: &SchemaObject,
    ) -> ParseResult<(CompatibilityVerdict, IndexDifference)> {
        if !self.is_valid || !other.is_valid {
            return Err(ParseError::NotPermit);
        }
        if self.schema_type() != other.schema_type() {
            return Ok((CompatibilityVerdict::Incompatible, IndexDifference::default()));
        }
        if self.schema_version != other.schema_version {
            return Ok((CompatibilityVerdict::Incompatible, IndexDifference::default()));
        }
        // Mode is part of the contract for JSON schemas. FlatBuffer schemas
        // carry their growth policy in the binary schema itself, so the meta
        // mode is not compared for them.
        if self.schema_type() == SchemaType::Json && self.schema_mode != other.schema_mode {
            return Ok((CompatibilityVerdict::Incompatible, IndexDifference::default()));
        }
        if self.schema_skip_size != other.schema_skip_size {
            return Ok((CompatibilityVerdict::Incompatible, IndexDifference::default()));
        }

        let define_verdict = self.compare_define(other);
        if define_verdict.is_incompatible() {
            return Ok((CompatibilityVerdict::Incompatible, IndexDifference::default()));
        }
        let index_diff = self.compare_indexes(other);
        let verdict = match define_verdict {
            CompatibilityVerdict::EqualExactly if index_diff.is_empty() => {
                CompatibilityVerdict::EqualExactly
            }
            CompatibilityVerdict::EqualExactly => CompatibilityVerdict::Compatible,
            _ => CompatibilityVerdict::CompatibleUpgrade,
        };
        debug!(verdict = ?verdict, "document schema compared");
        Ok((verdict, index_diff))
    }

    /// Walks the defines depth by depth. The candidate must declare every
    /// field of `self` with matching attributes; extra candidate fields are
    /// tolerated only under `COMPATIBLE` mode and only when absent values
    /// can be filled in (nullable or defaulted).
    fn compare_define(&self, other: &SchemaObject) -> CompatibilityVerdict {
        static EMPTY: BTreeMap<FieldPath, SchemaAttribute> = BTreeMap::new();
        let mut verdict = CompatibilityVerdict::EqualExactly;
        for depth in 0..SCHEMA_FIELD_PATH_DEPTH_MAX {
            let old_fields = self.schema_define.get(&depth).unwrap_or(&EMPTY);
            let new_fields = other.schema_define.get(&depth).unwrap_or(&EMPTY);
            for (path, old_attr) in old_fields {
                match new_fields.get(path) {
                    // A field the candidate dropped makes it unusable.
                    None => return CompatibilityVerdict::Incompatible,
                    Some(new_attr) => match compare_attribute(old_attr, new_attr) {
                        AttributeCompare::Equal => {}
                        AttributeCompare::Upgrade => {
                            verdict = CompatibilityVerdict::CompatibleUpgrade;
                        }
                        AttributeCompare::Incompatible => {
                            return CompatibilityVerdict::Incompatible;
                        }
                    },
                }
            }
            for (path, new_attr) in new_fields {
                if old_fields.contains_key(path) {
                    continue;
                }
                if self.schema_mode == Some(SchemaMode::Strict) {
                    return CompatibilityVerdict::Incompatible;
                }
                // Existing documents lack this field; it must be fillable.
                if new_attr.has_not_null_constraint && !new_attr.has_default_value {
                    return CompatibilityVerdict::Incompatible;
                }
                verdict = CompatibilityVerdict::CompatibleUpgrade;
            }
        }
        verdict
    }

    fn compare_indexes(&self, other: &SchemaObject) -> IndexDifference {
        let mut diff = IndexDifference::default();
        for (name, old_info) in &self.schema_indexes {
            match other.schema_indexes.get(name) {
                None => {
                    diff.decrease.insert(name.clone());
                }
                Some(new_info) if new_info != old_info => {
                    diff.change.insert(name.clone(), new_info.clone());
                }
                Some(_) => {}
            }
        }
        for (name, new_info) in &other.schema_indexes {
            if !self.schema_indexes.contains_key(name) {
                diff.increase.insert(name.clone(), new_info.clone());
            }
        }
        diff
    }
}

fn compare_attribute(old: &SchemaAttribute, new: &SchemaAttribute) -> AttributeCompare {
    let mut result = AttributeCompare::Equal;
    if old.field_type != new.field_type {
        // An empty object gaining declared sub-fields is the one legal type
        // change across schema versions.
        if old.field_type == FieldType::LeafObject && new.field_type == FieldType::InternalObject {
            result = AttributeCompare::Upgrade;
        } else {
            return AttributeCompare::Incompatible;
        }
    }
    if old.has_not_null_constraint != new.has_not_null_constraint {
        return AttributeCompare::Incompatible;
    }
    if old.has_default_value != new.has_default_value {
        return AttributeCompare::Incompatible;
    }
    // FieldValue equality is bit-exact for doubles.
    if old.has_default_value && old.default_value != new.default_value {
        return AttributeCompare::Incompatible;
    }
    result
}
