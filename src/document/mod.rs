//! Document (key-value) schema layer: parsing, compatibility comparison and
//! value checking.

mod comparator;
mod parser;
mod types;
mod value_check;

pub use comparator::CompatibilityVerdict;
pub use types::{
    FlatbufferSchemaDecoder, IndexDifference, IndexInfo, IndexName, SchemaDefine, SchemaMode,
    SchemaObject, SchemaType,
};
