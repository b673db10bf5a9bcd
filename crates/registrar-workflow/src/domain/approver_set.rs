//! Approver sets: named groups of approvers whose keys form a trust anchor.

use crate::domain::approver::{Approver, ApproverRevision};
use crate::domain::lifecycle;
use crate::domain::traits::{Prepare, RegistryObject, RegistryRevision};
use crate::errors::WorkflowError;
use registrar_crypto::Keyring;
use registrar_store::{
    LinkSet, Persist, PersistenceCache, RecordStore, SaveGuard, StoreError, StoredRecord,
};
use registrar_types::{DesiredState, EntityState, RecordId, RecordKind, RevisionState};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A named group of approvers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApproverSet {
    pub id: RecordId,
    pub state: EntityState,
    pub current_revision_id: Option<RecordId>,

    pub created_at: u64,
    pub created_by: String,
    pub updated_at: u64,
    pub updated_by: String,

    #[serde(skip)]
    pub current_revision: Option<ApproverSetRevision>,
    #[serde(skip)]
    pub pending_revision: Option<ApproverSetRevision>,
    #[serde(skip)]
    prepared: bool,
}

impl ApproverSet {
    pub fn new(at: u64, by: &str) -> Self {
        Self {
            id: 0,
            state: EntityState::New,
            current_revision_id: None,
            created_at: at,
            created_by: by.to_string(),
            updated_at: at,
            updated_by: by.to_string(),
            current_revision: None,
            pending_revision: None,
            prepared: true,
        }
    }

    /// Display value of a current-revision field, or the empty sentinel when
    /// the set is unprepared or has no current revision.
    pub fn current_value(&self, field: &str) -> String {
        let Some(revision) = self.current_revision.as_ref() else {
            return String::new();
        };

        match field {
            "title" => revision.title.clone(),
            "description" => revision.description.clone(),
            _ => String::new(),
        }
    }

    /// Build the trust-anchor keyring for this set: one key block per member
    /// of the live current revision whose own registered key is live.
    /// Members without a usable key are skipped, not fatal.
    pub fn keyring<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
    ) -> Result<Keyring, WorkflowError> {
        self.prepare(cache)?;

        let Some(revision) = self.current_revision.as_ref() else {
            return Err(WorkflowError::Consistency(format!(
                "approver set {} has no current revision",
                self.id
            )));
        };

        if !revision.is_active() {
            return Err(WorkflowError::Consistency(format!(
                "approver set {} has no live revision to anchor trust",
                self.id
            )));
        }

        let member_ids = revision.member_ids.clone();
        let mut keyring = Keyring::default();

        for member_id in member_ids {
            let mut approver: Approver = cache.find_by_id(member_id)?;
            approver.prepare(cache)?;

            match approver.key_block() {
                Ok(block) => keyring.push(block),
                Err(err) => {
                    tracing::warn!(
                        subsystem = "workflow",
                        approver_set_id = self.id,
                        approver_id = member_id,
                        error = %err,
                        "skipping approver without usable key"
                    );
                }
            }
        }

        Ok(keyring)
    }
}

impl StoredRecord for ApproverSet {
    const KIND: RecordKind = RecordKind::ApproverSet;

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

impl Persist for ApproverSet {
    fn save_parents<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if let Some(revision) = self.current_revision.as_mut() {
            cache.save_node(revision, guard)?;
        } else if let Some(id) = self.current_revision_id {
            cache.save_resident::<ApproverSetRevision>(id, guard)?;
        }

        Ok(())
    }

    fn save_children<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if let Some(revision) = self.pending_revision.as_mut() {
            if revision.approver_set_id == 0 {
                revision.approver_set_id = self.id;
            }
            cache.save_node(revision, guard)?;
        }

        Ok(())
    }
}

impl Prepare for ApproverSet {
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

        self.current_revision = match self.current_revision_id {
            Some(id) => {
                let mut revision: ApproverSetRevision = cache.find_by_id(id)?;
                revision.prepare(cache)?;
                Some(revision)
            }
            None => None,
        };

        self.pending_revision =
            lifecycle::pending_revision_of::<ApproverSetRevision, S>(cache, self.id)?;
        if let Some(revision) = self.pending_revision.as_mut() {
            revision.prepare(cache)?;
        }

        self.prepared = true;
        Ok(())
    }
}

impl RegistryObject for ApproverSet {
    type Revision = ApproverSetRevision;

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

/// A proposed version of an approver set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApproverSetRevision {
    pub id: RecordId,
    pub approver_set_id: RecordId,

    pub revision_state: RevisionState,
    pub desired_state: DesiredState,

    pub title: String,
    pub description: String,

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

    /// Approvers who belong to the set in this version.
    #[serde(skip)]
    pub member_ids: Vec<RecordId>,
    #[serde(skip)]
    pub required_approver_set_ids: Vec<RecordId>,
    #[serde(skip)]
    pub informed_approver_set_ids: Vec<RecordId>,
    #[serde(skip)]
    prepared: bool,
}

impl ApproverSetRevision {
    pub fn new(approver_set_id: RecordId, desired_state: DesiredState, at: u64, by: &str) -> Self {
        Self {
            id: 0,
            approver_set_id,
            revision_state: RevisionState::New,
            desired_state,
            title: String::new(),
            description: String::new(),
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
            member_ids: Vec::new(),
            required_approver_set_ids: Vec::new(),
            informed_approver_set_ids: Vec::new(),
            prepared: true,
        }
    }
}

impl StoredRecord for ApproverSetRevision {
    const KIND: RecordKind = RecordKind::ApproverSetRevision;

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

impl Persist for ApproverSetRevision {
    fn save_parents<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        if self.approver_set_id != 0 {
            cache.save_resident::<ApproverSet>(self.approver_set_id, guard)?;
        }
        Ok(())
    }

    fn save_children<S: RecordStore>(
        &mut self,
        cache: &mut PersistenceCache<S>,
        guard: &mut SaveGuard,
    ) -> Result<(), StoreError> {
        for member_id in self.member_ids.clone() {
            cache.save_resident::<Approver>(member_id, guard)?;
        }

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
            LinkSet::new("members", self.member_ids.clone()),
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

impl Prepare for ApproverSetRevision {
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

        self.member_ids = cache.related_ids(Self::KIND, self.id, "members")?;
        self.required_approver_set_ids =
            cache.related_ids(Self::KIND, self.id, "required_approver_sets")?;
        self.informed_approver_set_ids =
            cache.related_ids(Self::KIND, self.id, "informed_approver_sets")?;

        self.prepared = true;
        Ok(())
    }
}

impl RegistryRevision for ApproverSetRevision {
    const PARENT_KIND: RecordKind = RecordKind::ApproverSet;

    fn parent_id(&self) -> RecordId {
        self.approver_set_id
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
        let mut value = lifecycle::export_revision_value(
            self,
            &self.required_approver_set_ids,
            &self.informed_approver_set_ids,
        )?;

        if let Value::Object(map) = &mut value {
            map.insert("member_ids".to_string(), json!(self.member_ids));
        }

        Ok(value)
    }
}
