//! syncschema - schema compatibility and sync negotiation for replicated
//! stores
//!
//! Parses document and relational schema strings, classifies how two schema
//! versions relate, and lets two peers negotiate whether and how to sync.

pub mod constants;
pub mod document;
pub mod errors;
pub mod fields;
pub mod negotiate;
pub mod relational;

pub use document::{
    CompatibilityVerdict, FlatbufferSchemaDecoder, IndexDifference, SchemaMode, SchemaObject,
    SchemaType,
};
pub use errors::{CodecError, ParseError, ParseResult, ValueMatchError};
pub use fields::{FieldPath, FieldType, FieldValue, SchemaAttribute};
pub use negotiate::{
    conclude_relational_sync_strategy, conclude_sync_strategy, make_local_sync_opinion,
    make_relational_sync_opinion, RelationalSyncOpinion, RelationalSyncStrategy, SyncOpinion,
    SyncStrategy,
};
pub use relational::{FieldInfo, RelationalSchemaObject, StorageType, TableInfo, TableMode, TableVerdict};
