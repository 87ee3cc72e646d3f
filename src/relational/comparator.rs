//! Table-level compatibility comparison.
//!
//! `self` is the local table; the argument is the peer's (or upgrade's)
//! candidate table, which may carry extra fillable columns.

use tracing::warn;

use crate::constants::SCHEMA_SUPPORT_VERSION_V2_1;

use super::types::TableInfo;

/// Outcome of comparing a candidate table against the local one. Index
/// differences never affect the verdict; indexes are local access detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableVerdict {
    Equal,
    /// The candidate has extra columns that are nullable or defaulted.
    CompatibleUpgrade,
    Incompatible,
}

impl TableVerdict {
    pub fn is_incompatible(&self) -> bool {
        matches!(self, TableVerdict::Incompatible)
    }
}

impl TableInfo {
    /// Compares a candidate table against this one under the given schema
    /// version. Uniqueness and autoincrement became part of the sync
    /// contract in version 2.1.
    pub fn compare_with_table(&self, other: &TableInfo, schema_version: &str) -> TableVerdict {
        if self.table_name != other.table_name {
            warn!(local = %self.table_name, remote = %other.table_name, "table name differs");
            return TableVerdict::Incompatible;
        }
        if self.primary_key != other.primary_key {
            warn!(table = %self.table_name, "table primary key differs");
            return TableVerdict::Incompatible;
        }
        let field_verdict = self.compare_with_table_fields(other);
        if field_verdict.is_incompatible() {
            return TableVerdict::Incompatible;
        }
        if schema_version == SCHEMA_SUPPORT_VERSION_V2_1 {
            if self.unique_defines != other.unique_defines {
                warn!(table = %self.table_name, "table unique constraints differ");
                return TableVerdict::Incompatible;
            }
            if self.auto_increment != other.auto_increment {
                warn!(table = %self.table_name, "table autoincrement differs");
                return TableVerdict::Incompatible;
            }
        }
        field_verdict
    }

    /// The local columns must be a subset of the candidate's, with matching
    /// attributes; candidate-only columns must be fillable on rows that
    /// predate them.
    fn compare_with_table_fields(&self, other: &TableInfo) -> TableVerdict {
        let mut verdict = TableVerdict::Equal;
        for (name, local_field) in &self.fields {
            match other.fields.get(name) {
                None => {
                    warn!(table = %self.table_name, column = %name, "column missing on peer");
                    return TableVerdict::Incompatible;
                }
                Some(other_field) => {
                    if !local_field.compare_with_field(other_field) {
                        warn!(table = %self.table_name, column = %name, "column differs");
                        return TableVerdict::Incompatible;
                    }
                }
            }
        }
        for (name, other_field) in &other.fields {
            if self.fields.contains_key(name) {
                continue;
            }
            if other_field.is_not_null && !other_field.has_default_value() {
                warn!(
                    table = %self.table_name,
                    column = %name,
                    "upgrade column must be nullable or defaulted"
                );
                return TableVerdict::Incompatible;
            }
            verdict = TableVerdict::CompatibleUpgrade;
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::types::{FieldInfo, StorageType};

    fn column(name: &str, data_type: &str, not_null: bool, default: Option<&str>) -> FieldInfo {
        FieldInfo {
            field_name: name.to_string(),
            data_type: data_type.to_string(),
            is_not_null: not_null,
            default_value: default.map(String::from),
            storage_type: StorageType::from_declared_type(data_type),
            column_id: 0,
        }
    }

    fn base_table() -> TableInfo {
        let mut table = TableInfo::new("t1");
        table.add_field(column("id", "integer", true, None));
        table.add_field(column("name", "text", false, None));
        table.primary_key.insert(1, "id".to_string());
        table
    }

    #[test]
    fn test_identical_tables_equal() {
        assert_eq!(
            base_table().compare_with_table(&base_table(), "2.0"),
            TableVerdict::Equal
        );
    }

    #[test]
    fn test_extra_nullable_column_is_upgrade() {
        let mut other = base_table();
        other.add_field(column("age", "integer", false, None));
        assert_eq!(
            base_table().compare_with_table(&other, "2.0"),
            TableVerdict::CompatibleUpgrade
        );
        // The opposite direction loses a column.
        assert_eq!(
            other.compare_with_table(&base_table(), "2.0"),
            TableVerdict::Incompatible
        );
    }

    #[test]
    fn test_extra_not_null_column_needs_default() {
        let mut other = base_table();
        other.add_field(column("age", "integer", true, None));
        assert_eq!(
            base_table().compare_with_table(&other, "2.0"),
            TableVerdict::Incompatible
        );
        let mut other = base_table();
        other.add_field(column("age", "integer", true, Some("0")));
        assert_eq!(
            base_table().compare_with_table(&other, "2.0"),
            TableVerdict::CompatibleUpgrade
        );
    }

    #[test]
    fn test_primary_key_difference_incompatible() {
        let mut other = base_table();
        other.primary_key.insert(2, "name".to_string());
        assert_eq!(
            base_table().compare_with_table(&other, "2.0"),
            TableVerdict::Incompatible
        );
        assert_eq!(
            base_table().compare_with_table(&other, "2.1"),
            TableVerdict::Incompatible
        );
    }

    #[test]
    fn test_type_text_difference_incompatible() {
        let mut other = base_table();
        other.add_field(column("name", "varchar(20)", false, None));
        assert_eq!(
            base_table().compare_with_table(&other, "2.0"),
            TableVerdict::Incompatible
        );
    }

    #[test]
    fn test_unique_and_autoincrement_only_bind_v21() {
        let mut other = base_table();
        other.auto_increment = true;
        other.set_unique_defines(vec![vec!["name".to_string()]]);
        assert_eq!(
            base_table().compare_with_table(&other, "2.0"),
            TableVerdict::Equal
        );
        assert_eq!(
            base_table().compare_with_table(&other, "2.1"),
            TableVerdict::Incompatible
        );
    }

    #[test]
    fn test_index_difference_does_not_affect_verdict() {
        let mut other = base_table();
        other
            .index_defines
            .insert("idx_name".to_string(), vec!["name".to_string()]);
        assert_eq!(
            base_table().compare_with_table(&other, "2.0"),
            TableVerdict::Equal
        );
    }
}
