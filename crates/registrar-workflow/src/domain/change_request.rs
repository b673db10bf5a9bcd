//! Change requests: the approval-tracking record created when a revision
//! enters the approval workflow.

use crate::domain::approval::Approval;
use crate::domain::traits::Prepare;
use crate::errors::WorkflowError;
use registrar_store::{Persist, PersistenceCache, RecordStore, SaveGuard, StoreError, StoredRecord};
use registrar_types::{ApprovalState, ChangeRequestState, RecordId, RecordKind};
use serde::{Deserialize, Serialize};

/// The artifact of one approval cycle. The snapshot columns (`change_json`,
/// `change_diff`) are fixed at creation and never rewritten.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: RecordId,

    pub object_kind: RecordKind,
    pub object_id: RecordId,

    pub state: ChangeRequestState,

    /// The object's current revision at proposal time; none for a first
    /// revision.
    pub initial_revision_id: Option<RecordId>,
    pub proposed_revision_id: RecordId,

    /// Full object export at proposal time.
    pub change_json: String,
    /// Line diff of current vs proposed revision at proposal time.
    pub change_diff: String,

    pub created_at: u64,
    pub created_by: String,
    pub updated_at: u64,
    pub updated_by: String,

    /// One approval per required approver set, hydrated by `prepare`.
    #[serde(skip)]
    pub approvals: Vec<Approval>,

    #[serde(skip)]
    prepared: bool,
}

impl ChangeRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        object_kind: RecordKind,
        object_id: RecordId,
        initial_revision_id: Option<RecordId>,
        proposed_revision_id: RecordId,
        change_json: String,
        change_diff: String,
        at: u64,
        by: &str,
    ) -> Self {
        Self {
            id: 0,
            object_kind,
            object_id,
            state: ChangeRequestState::New,
            initial_revision_id,
            proposed_revision_id,
            change_json,
            change_diff,
            created_at: at,
            created_by: by.to_string(),
            updated_at: at,
            updated_by: by.to_string(),
            approvals: Vec::new(),
            prepared: true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == ChangeRequestState::Cancelled
    }

    pub fn has_approval_for(&self, approver_set_id: RecordId) -> bool {
        self.approvals
            .iter()
            .any(|approval| approval.approver_set_id == approver_set_id)
    }

    /// All approvals other than the final one have resolved, and a final
    /// approval exists to release.
    pub fn ready_for_final_approval(&self) -> bool {
        let mut final_found = false;

        for approval in &self.approvals {
            if approval.is_final_approval {
                final_found = true;
            } else if !approval.state.is_resolved() {
                return false;
            }
        }

        final_found
    }

    /// The change request state implied by its approvals. Pure: no storage,
    /// no side effects.
    ///
    /// One declined approval declines the whole request. Approval requires
    /// at least one actual approval and every approval resolved (approved or
    /// skipped for set-validity reasons).
    pub fn derive_state(approvals: &[Approval]) -> ChangeRequestState {
        if approvals.is_empty() {
            return ChangeRequestState::New;
        }

        if approvals
            .iter()
            .any(|approval| approval.state == ApprovalState::Declined)
        {
            return ChangeRequestState::Declined;
        }

        let approved = approvals
            .iter()
            .filter(|approval| approval.state == ApprovalState::Approved)
            .count();
        let resolved = approvals
            .iter()
            .filter(|approval| approval.state.is_resolved())
            .count();

        if approved >= 1 && resolved == approvals.len() {
            ChangeRequestState::Approved
        } else {
            ChangeRequestState::PendingApproval
        }
    }

    pub fn touch(&mut self, at: u64, by: &str) {
        self.updated_at = at;
        self.updated_by = by.to_string();
    }
}

impl StoredRecord for ChangeRequest {
    const KIND: RecordKind = RecordKind::ChangeRequest;

    fn id(&self) -> RecordId {
        self.id
    }

    fn assign_id(&mut self, id: RecordId) -> Result<(), StoreError> {
        if self.id != 0 {
            return Err(StoreError::IdAlreadyAssigned { kind: Self::KIND });
        }
        if id <= 0 {
            return Err(StoreError::InvalidId { id });
        }

        self.id = id;
        Ok(())
    }
}

impl Persist for ChangeRequest {
    fn save_children<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        for approval in &mut self.approvals {
            approval.change_request_id = self.id;
            cache.save_node(approval, guard)?;
        }

        Ok(())
    }
}

impl Prepare for ChangeRequest {
    fn prepared(&self) -> bool {
        self.prepared
    }

    fn prepare<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
    ) -> Result<(), WorkflowError> {
        if self.prepared {
            return Ok(());
        }

        self.approvals = cache.related(Self::KIND, self.id, "approvals")?;
        self.prepared = true;

        Ok(())
    }
}
