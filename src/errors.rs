//! Error types for schema parsing, value matching and the opinion codec.
//!
//! Compatibility verdicts are deliberately *not* errors: a comparison always
//! completes and returns a classification. Only parsing and wire decoding
//! can fail.

use thiserror::Error;

/// Result type for schema parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Failure to turn a schema string into a schema object.
///
/// All of these are local and recoverable: the caller refuses the schema and
/// carries on. `NotPermit` guards the parse-once discipline of schema
/// objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Argument-level violation (oversized input, empty string, bad buffer).
    #[error("invalid argument: {0}")]
    InvalidArgs(String),

    /// The schema string is structurally or semantically invalid.
    #[error("schema parse failed: {0}")]
    SchemaParseFail(String),

    /// The schema object was already parsed successfully; re-parse rejected.
    #[error("schema object already parsed")]
    NotPermit,
}

/// Failure to encode or decode the relational opinion parcel.
///
/// Unlike parse errors these indicate protocol-version skew between peers
/// and should abort the negotiation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Corrupt or truncated parcel, bad magic, or entry count over the cap.
    #[error("invalid opinion parcel: {0}")]
    InvalidArgs(String),

    /// The peer serialized with an opinion version this build cannot read.
    #[error("unsupported opinion version {0}")]
    NotSupport(u32),
}

/// Result of checking a decoded value against a document schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueMatchError {
    /// A field's value type does not match its schema attribute.
    #[error("value type mismatch at field '{0}'")]
    FieldTypeMismatch(String),

    /// A NOT NULL field is null or absent without a default.
    #[error("not-null constraint violated at field '{0}'")]
    ConstraintViolation(String),

    /// The value declares fields the schema does not, in STRICT mode.
    #[error("undeclared field '{0}' in strict mode")]
    FieldCountMismatch(String),
}
