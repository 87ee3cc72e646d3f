//! Relational schema layer: parsing, regeneration and table compatibility.

mod comparator;
mod parser;
mod types;

pub use comparator::TableVerdict;
pub use types::{CompositeFields, FieldInfo, RelationalSchemaObject, StorageType, TableInfo, TableMode};
