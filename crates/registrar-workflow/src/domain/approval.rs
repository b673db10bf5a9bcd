//! Approvals: one required sign-off on a change request.

use crate::domain::change_request::ChangeRequest;
use crate::domain::traits::Prepare;
use crate::errors::WorkflowError;
use registrar_store::{Persist, PersistenceCache, RecordStore, SaveGuard, StoreError, StoredRecord};
use registrar_types::{ApprovalState, RecordId, RecordKind};
use serde::{Deserialize, Serialize};

/// One approval, scoped to an approver set, carrying the clearsigned
/// attestation once an approver has acted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Approval {
    pub id: RecordId,
    pub change_request_id: RecordId,
    pub approver_set_id: RecordId,
    pub state: ApprovalState,

    /// The default approver set's approval is sequenced after every other
    /// approval has resolved.
    pub is_final_approval: bool,

    /// Clearsigned attestation text; empty until an approver signs.
    pub signature: String,

    pub created_at: u64,
    pub created_by: String,
    pub updated_at: u64,
    pub updated_by: String,

    #[serde(skip)]
    prepared: bool,
}

impl Approval {
    pub fn new(change_request_id: RecordId, approver_set_id: RecordId, at: u64, by: &str) -> Self {
        Self {
            id: 0,
            change_request_id,
            approver_set_id,
            state: ApprovalState::New,
            is_final_approval: false,
            signature: String::new(),
            created_at: at,
            created_by: by.to_string(),
            updated_at: at,
            updated_by: by.to_string(),
            prepared: true,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    pub fn touch(&mut self, at: u64, by: &str) {
        self.updated_at = at;
        self.updated_by = by.to_string();
    }
}

impl StoredRecord for Approval {
    const KIND: RecordKind = RecordKind::Approval;

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

impl Persist for Approval {
    fn save_parents<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if self.change_request_id != 0 {
            cache.save_resident::<ChangeRequest>(self.change_request_id, guard)?;
        }
        Ok(())
    }
}

impl Prepare for Approval {
    fn prepared(&self) -> bool {
        self.prepared
    }

    fn prepare<S: RecordStore>(
        &mut self,
        _cache: &mut PersistenceCache<S>,
    ) -> Result<(), WorkflowError> {
        // Approvals have no associations to hydrate.
        self.prepared = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_approval_is_unsigned() {
        let approval = Approval::new(3, 1, 100, "ops");

        assert_eq!(approval.state, ApprovalState::New);
        assert!(!approval.is_signed());
        assert!(!approval.is_final_approval);
    }

    #[test]
    fn test_assign_id_once() {
        let mut approval = Approval::new(3, 1, 100, "ops");
        approval.assign_id(9).unwrap();
        assert_eq!(approval.id, 9);

        assert!(matches!(
            approval.assign_id(10),
            Err(StoreError::IdAlreadyAssigned { .. })
        ));
    }
}
