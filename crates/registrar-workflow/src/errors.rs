//! Error types for the approval workflow.

use registrar_crypto::CryptoError;
use registrar_store::StoreError;
use registrar_types::{RecordId, RecordKind};
use thiserror::Error;

/// Export projection failures.
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    /// Objects without a positive id cannot be exported.
    #[error("id not set")]
    IdNotSet,

    /// Lone revisions have nothing to diff against.
    #[error("cannot diff a single revision")]
    UndiffableObject,

    #[error("export serialization failed: {0}")]
    Json(String),
}

/// Errors from workflow operations.
///
/// Mutating operations fail closed: any of these aborts the transition and
/// rolls back everything the operation wrote.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// The object has no revision in new or pendingapproval state.
    #[error("no pending revision for {kind} {id}")]
    NoPendingRevision { kind: RecordKind, id: RecordId },

    /// The pending revision never entered the approval process.
    #[error("no change request for pending {kind} revision {revision_id}")]
    NoChangeRequest {
        kind: RecordKind,
        revision_id: RecordId,
    },

    /// The operation is not legal from the record's current state.
    #[error("cannot {operation} {kind} {id} in state {state:?}")]
    InvalidStateTransition {
        kind: RecordKind,
        id: RecordId,
        state: String,
        operation: &'static str,
    },

    /// Promote requires an approved change request.
    #[error("change request {id} has not been approved")]
    NotApproved { id: RecordId },

    /// Decline requires a declined change request.
    #[error("change request {id} has not been declined")]
    NotDeclined { id: RecordId },

    /// Every mutating operation records who acted.
    #[error("caller identity is required")]
    MissingActor,

    /// The proposed revision does not differ from the current one.
    #[error("revision {revision_id} proposes no change")]
    NoopProposal { revision_id: RecordId },

    /// The signed payload is not a well-formed attestation.
    #[error("malformed attestation payload: {0}")]
    MalformedAttestation(String),

    /// Cross-reference mismatch found by the consistency checker.
    #[error("consistency check failed: {0}")]
    Consistency(String),

    /// Signature or keyring failure.
    #[error("verification failed: {0}")]
    Verification(#[from] CryptoError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
