//! The two narrow traits every revisioned registry object pair implements.
//!
//! The workflow operations are written once against these traits; the
//! concrete types (approver, approver set, api user, contact, domain, host)
//! only supply accessors. Presentation concerns live outside this workspace
//! entirely.

use crate::errors::WorkflowError;
use registrar_store::{Persist, PersistenceCache, RecordStore};
use registrar_types::{DesiredState, EntityState, RecordId, RecordKind, RevisionState};
use serde_json::Value;

/// Idempotent hydration. `prepare` loads a record's associations once;
/// repeated calls are no-ops. Freshly constructed records are born prepared.
pub trait Prepare {
    fn prepared(&self) -> bool;

    fn prepare<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
    ) -> Result<(), WorkflowError>;
}

/// The revision side of a registry object pair.
pub trait RegistryRevision: Persist + Prepare {
    /// Kind of the parent object.
    const PARENT_KIND: RecordKind;

    fn parent_id(&self) -> RecordId;

    fn revision_state(&self) -> RevisionState;
    fn set_revision_state(&mut self, state: RevisionState);

    fn desired_state(&self) -> DesiredState;

    fn change_request_id(&self) -> Option<RecordId>;
    fn set_change_request_id(&mut self, id: RecordId);

    /// Approver sets whose sign-off this revision demands once it enters
    /// approval. Hydrated by `prepare`.
    fn required_approver_set_ids(&self) -> &[RecordId];
    fn informed_approver_set_ids(&self) -> &[RecordId];

    fn promoted_at(&self) -> Option<u64>;

    fn record_approval_start(&mut self, at: u64, by: &str);
    fn record_promotion(&mut self, at: u64);
    fn record_supersession(&mut self, at: u64);
    fn record_approval_failure(&mut self, at: u64);

    fn touch(&mut self, at: u64, by: &str);

    /// Scalar snapshot of this revision, as embedded in exports and signed
    /// attestations.
    fn export(&self) -> Result<Value, WorkflowError>;

    /// True while this revision is the operating truth for its parent.
    fn is_active(&self) -> bool {
        matches!(
            self.revision_state(),
            RevisionState::Active | RevisionState::Bootstrap
        )
    }
}

/// The object side of a registry object pair.
pub trait RegistryObject: Persist + Prepare {
    type Revision: RegistryRevision;

    fn state(&self) -> EntityState;
    fn set_state(&mut self, state: EntityState);

    fn current_revision_id(&self) -> Option<RecordId>;
    fn set_current_revision_id(&mut self, id: Option<RecordId>);

    /// The first revision in new or pendingapproval state, hydrated by
    /// `prepare`; never stored as a column.
    fn pending_revision(&self) -> Option<&Self::Revision>;

    fn touch(&mut self, at: u64, by: &str);
}
