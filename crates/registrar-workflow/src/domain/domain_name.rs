//! Registered domains.

use crate::domain::approver_set::ApproverSet;
use crate::domain::lifecycle;
use crate::domain::traits::{Prepare, RegistryObject, RegistryRevision};
use crate::errors::WorkflowError;
use registrar_store::{
    LinkSet, Persist, PersistenceCache, RecordStore, SaveGuard, StoreError, StoredRecord,
};
use registrar_types::{DesiredState, EntityState, RecordId, RecordKind, RevisionState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A registered domain name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Domain {
    pub id: RecordId,
    pub state: EntityState,
    pub current_revision_id: Option<RecordId>,

    /// The name itself never changes across revisions.
    pub domain_name: String,

    pub created_at: u64,
    pub created_by: String,
    pub updated_at: u64,
    pub updated_by: String,

    #[serde(skip)]
    pub pending_revision: Option<DomainRevision>,
    #[serde(skip)]
    prepared: bool,
}

impl Domain {
    pub fn new(domain_name: &str, at: u64, by: &str) -> Self {
        Self {
            id: 0,
            state: EntityState::New,
            current_revision_id: None,
            domain_name: domain_name.to_string(),
            created_at: at,
            created_by: by.to_string(),
            updated_at: at,
            updated_by: by.to_string(),
            pending_revision: None,
            prepared: true,
        }
    }
}

impl StoredRecord for Domain {
    const KIND: RecordKind = RecordKind::Domain;

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

impl Persist for Domain {
    fn save_parents<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if let Some(id) = self.current_revision_id {
            cache.save_resident::<DomainRevision>(id, guard)?;
        }
        Ok(())
    }

    fn save_children<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if let Some(revision) = self.pending_revision.as_mut() {
            if revision.domain_id == 0 {
                revision.domain_id = self.id;
            }
            cache.save_node(revision, guard)?;
        }

        Ok(())
    }
}

impl Prepare for Domain {
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

        self.pending_revision = lifecycle::pending_revision_of::<DomainRevision, S>(cache, self.id)?;
        if let Some(revision) = self.pending_revision.as_mut() {
            revision.prepare(cache)?;
        }

        self.prepared = true;
        Ok(())
    }
}

impl RegistryObject for Domain {
    type Revision = DomainRevision;

    fn state(&self) -> EntityState {
        self.state
    }

    fn set_state(&mut self, state: EntityState) {
        self.state = state;
    }

    fn current_revision_id(&self) -> Option<RecordId> {
        self.current_revision_id
    }

    fn set_current_revision_id(&mut self, id: Option<RecordId>) {
        self.current_revision_id = id;
    }

    fn pending_revision(&self) -> Option<&Self::Revision> {
        self.pending_revision.as_ref()
    }

    fn touch(&mut self, at: u64, by: &str) {
        self.updated_at = at;
        self.updated_by = by.to_string();
    }
}

/// A proposed version of a domain's registry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainRevision {
    pub id: RecordId,
    pub domain_id: RecordId,

    pub revision_state: RevisionState,
    pub desired_state: DesiredState,

    pub owners: String,
    pub class: String,

    pub client_delete_prohibited: bool,
    pub server_delete_prohibited: bool,
    pub client_transfer_prohibited: bool,
    pub server_transfer_prohibited: bool,
    pub client_update_prohibited: bool,
    pub server_update_prohibited: bool,

    pub change_request_id: Option<RecordId>,
    pub approval_started_at: Option<u64>,
    pub approval_started_by: String,
    pub promoted_at: Option<u64>,
    pub superseded_at: Option<u64>,
    pub approval_failed_at: Option<u64>,

    pub created_at: u64,
    pub created_by: String,
    pub updated_at: u64,
    pub updated_by: String,

    #[serde(skip)]
    pub required_approver_set_ids: Vec<RecordId>,
    #[serde(skip)]
    pub informed_approver_set_ids: Vec<RecordId>,
    #[serde(skip)]
    prepared: bool,
}

impl DomainRevision {
    pub fn new(domain_id: RecordId, desired_state: DesiredState, at: u64, by: &str) -> Self {
        Self {
            id: 0,
            domain_id,
            revision_state: RevisionState::New,
            desired_state,
            owners: String::new(),
            class: String::new(),
            client_delete_prohibited: false,
            server_delete_prohibited: false,
            client_transfer_prohibited: false,
            server_transfer_prohibited: false,
            client_update_prohibited: false,
            server_update_prohibited: false,
            change_request_id: None,
            approval_started_at: None,
            approval_started_by: String::new(),
            promoted_at: None,
            superseded_at: None,
            approval_failed_at: None,
            created_at: at,
            created_by: by.to_string(),
            updated_at: at,
            updated_by: by.to_string(),
            required_approver_set_ids: Vec::new(),
            informed_approver_set_ids: Vec::new(),
            prepared: true,
        }
    }
}

impl StoredRecord for DomainRevision {
    const KIND: RecordKind = RecordKind::DomainRevision;

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

impl Persist for DomainRevision {
    fn save_parents<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if self.domain_id != 0 {
            cache.save_resident::<Domain>(self.domain_id, guard)?;
        }
        Ok(())
    }

    fn save_children<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        for set_id in self
            .required_approver_set_ids
            .iter()
            .chain(self.informed_approver_set_ids.iter())
            .copied()
            .collect::<Vec<_>>()
        {
            cache.save_resident::<ApproverSet>(set_id, guard)?;
        }

        Ok(())
    }

    fn links(&self) -> Option<Vec<LinkSet>> {
        if !self.prepared {
            return None;
        }

        Some(vec![
            LinkSet::new(
                "required_approver_sets",
                self.required_approver_set_ids.clone(),
            ),
            LinkSet::new(
                "informed_approver_sets",
                self.informed_approver_set_ids.clone(),
            ),
        ])
    }
}

impl Prepare for DomainRevision {
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

        self.required_approver_set_ids =
            cache.related_ids(Self::KIND, self.id, "required_approver_sets")?;
        self.informed_approver_set_ids =
            cache.related_ids(Self::KIND, self.id, "informed_approver_sets")?;

        self.prepared = true;
        Ok(())
    }
}

impl RegistryRevision for DomainRevision {
    const PARENT_KIND: RecordKind = RecordKind::Domain;

    fn parent_id(&self) -> RecordId {
        self.domain_id
    }

    fn revision_state(&self) -> RevisionState {
        self.revision_state
    }

    fn set_revision_state(&mut self, state: RevisionState) {
        self.revision_state = state;
    }

    fn desired_state(&self) -> DesiredState {
        self.desired_state
    }

    fn change_request_id(&self) -> Option<RecordId> {
        self.change_request_id
    }

    fn set_change_request_id(&mut self, id: RecordId) {
        self.change_request_id = Some(id);
    }

    fn required_approver_set_ids(&self) -> &[RecordId] {
        &self.required_approver_set_ids
    }

    fn informed_approver_set_ids(&self) -> &[RecordId] {
        &self.informed_approver_set_ids
    }

    fn promoted_at(&self) -> Option<u64> {
        self.promoted_at
    }

    fn record_approval_start(&mut self, at: u64, by: &str) {
        self.approval_started_at = Some(at);
        self.approval_started_by = by.to_string();
    }

    fn record_promotion(&mut self, at: u64) {
        self.promoted_at = Some(at);
    }

    fn record_supersession(&mut self, at: u64) {
        self.superseded_at = Some(at);
    }

    fn record_approval_failure(&mut self, at: u64) {
        self.approval_failed_at = Some(at);
    }

    fn touch(&mut self, at: u64, by: &str) {
        self.updated_at = at;
        self.updated_by = by.to_string();
    }

    fn export(&self) -> Result<Value, WorkflowError> {
        lifecycle::export_revision_value(
            self,
            &self.required_approver_set_ids,
            &self.informed_approver_set_ids,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_keeps_name_on_entity() {
        let domain = Domain::new("example.org", 9, "ops");
        assert_eq!(domain.domain_name, "example.org");
        assert_eq!(domain.state, EntityState::New);
    }

    #[test]
    fn test_revision_flags_default_off() {
        let revision = DomainRevision::new(1, DesiredState::Active, 9, "ops");
        assert!(!revision.client_delete_prohibited);
        assert!(!revision.server_transfer_prohibited);
    }
}
