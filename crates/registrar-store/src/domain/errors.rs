//! Error types for the persistence layer.

use registrar_types::{RecordId, RecordKind};
use thiserror::Error;

/// Errors from the record store and the persistence cache.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No record of this kind with this id.
    #[error("no {kind} record with id {id}")]
    NotFound { kind: RecordKind, id: RecordId },

    /// The kind does not declare an association with this name.
    #[error("{kind} has no association named {name:?}")]
    UnknownAssociation { kind: RecordKind, name: String },

    /// The named association is not the expected shape for the operation
    /// (e.g. replacing links on a belongs-to edge).
    #[error("association {name:?} on {kind} does not support this operation")]
    UnsupportedAssociation { kind: RecordKind, name: String },

    /// An id can only be assigned once and must be positive.
    #[error("id already assigned on {kind} record")]
    IdAlreadyAssigned { kind: RecordKind },

    /// Ids must be greater than zero.
    #[error("ids must be greater than 0, got {id}")]
    InvalidId { id: RecordId },

    /// Record (de)serialization to a row failed.
    #[error("row serialization failed: {0}")]
    Serialization(String),

    /// commit/rollback called without a matching begin.
    #[error("no open transaction")]
    TransactionClosed,
}
