//! Error types for key manifest parsing and merging.

use crate::parser::LineError;

/// Key manifest errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeysError {
    #[error("line {line_number}: unrecognized manifest record ({reason:?}): {line}")]
    Malformed {
        line_number: usize,
        line: String,
        reason: LineError,
    },

    #[error("line {line_number}: duplicate record for {name}")]
    DuplicateRecord { line_number: usize, name: String },

    /// Both sides declare the same package with different values.
    #[error("conflicting records for {name}: `{first}` vs `{second}`")]
    Conflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("record for {name} has no partition tag")]
    MissingPartition { name: String },
}
