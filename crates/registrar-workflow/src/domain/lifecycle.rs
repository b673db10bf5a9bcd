//! Lifecycle helpers shared by every registry object pair: pending/current
//! revision resolution, the revision state machine transitions, entity state
//! derivation and the export plumbing.

use crate::domain::change_request::ChangeRequest;
use crate::domain::export::ObjectExport;
use crate::domain::traits::{Prepare, RegistryObject, RegistryRevision};
use crate::errors::{ExportError, WorkflowError};
use registrar_store::{PersistenceCache, RecordStore, StoredRecord};
use registrar_types::{
    ChangeRequestState, DesiredState, EntityState, RecordId, RevisionState,
};
use serde::Serialize;
use serde_json::{json, Value};

/// The first revision of a parent in new or pendingapproval state, by id
/// order. This is the derived "pending revision"; it is never stored.
pub fn pending_revision_of<R: RegistryRevision, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    parent_id: RecordId,
) -> Result<Option<R>, WorkflowError> {
    if parent_id == 0 {
        return Ok(None);
    }

    let revisions: Vec<R> = cache.related(R::PARENT_KIND, parent_id, "revisions")?;

    Ok(revisions.into_iter().find(|revision| {
        matches!(
            revision.revision_state(),
            RevisionState::New | RevisionState::PendingApproval
        )
    }))
}

/// The entity's current revision, hydrated.
pub fn current_revision_of<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    entity: &E,
) -> Result<Option<E::Revision>, WorkflowError> {
    match entity.current_revision_id() {
        Some(id) => {
            let mut revision: E::Revision = cache.find_by_id(id)?;
            revision.prepare(cache)?;
            Ok(Some(revision))
        }
        None => Ok(None),
    }
}

/// The revision that was current at `timestamp`: the latest revision whose
/// promotion happened at or before that instant.
pub fn revision_at_time<R: RegistryRevision, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    parent_id: RecordId,
    timestamp: u64,
) -> Result<Option<R>, WorkflowError> {
    let revisions: Vec<R> = cache.related(R::PARENT_KIND, parent_id, "revisions")?;

    Ok(revisions
        .into_iter()
        .filter(|revision| matches!(revision.promoted_at(), Some(at) if at <= timestamp))
        .max_by_key(|revision| revision.promoted_at()))
}

/// Derive a parent object's state from its current and pending revisions.
///
/// With a current revision the object reports that revision's operational
/// state, shifting to the matching `*pendingapproval` form while a pending
/// revision is in approval. Without one, the object is new until a pending
/// revision enters approval, at which point it reports the pending-approval
/// state of that revision's target.
pub fn derive_entity_state(
    current: Option<(RevisionState, DesiredState)>,
    pending: Option<(RevisionState, DesiredState)>,
) -> EntityState {
    let pending_in_approval = matches!(pending, Some((RevisionState::PendingApproval, _)));

    match current {
        Some((state, desired)) => {
            if pending_in_approval {
                desired.pending_entity_state()
            } else {
                match state {
                    RevisionState::Active => EntityState::Active,
                    RevisionState::Inactive => EntityState::Inactive,
                    RevisionState::External => EntityState::External,
                    RevisionState::Bootstrap => EntityState::Bootstrap,
                    _ => desired.settled_entity_state(),
                }
            }
        }
        None => match pending {
            Some((RevisionState::PendingApproval, desired)) => desired.pending_entity_state(),
            _ => EntityState::New,
        },
    }
}

/// PendingApproval → DesiredState. Errors on terminal revisions and on a
/// change request that is anything but approved.
pub fn promote_revision<R: RegistryRevision, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    revision: &mut R,
    now: u64,
) -> Result<(), WorkflowError> {
    revision.prepare(cache)?;

    let state = revision.revision_state();
    if state.is_terminal() {
        return Err(WorkflowError::InvalidStateTransition {
            kind: R::KIND,
            id: revision.id(),
            state: state.to_string(),
            operation: "promote",
        });
    }

    let Some(cr_id) = revision.change_request_id() else {
        return Err(WorkflowError::NoChangeRequest {
            kind: R::PARENT_KIND,
            revision_id: revision.id(),
        });
    };

    let change_request: ChangeRequest = cache.find_by_id(cr_id)?;
    if change_request.state != ChangeRequestState::Approved {
        return Err(WorkflowError::NotApproved { id: cr_id });
    }

    revision.set_revision_state(revision.desired_state().revision_state());
    revision.record_promotion(now);
    cache.save(revision)?;

    tracing::info!(
        subsystem = "workflow",
        kind = %R::KIND,
        revision_id = revision.id(),
        state = %revision.revision_state(),
        "revision promoted"
    );

    Ok(())
}

/// {Active, Inactive, External, Bootstrap} → Superseded. Invoked on the old
/// current revision at the moment a new one is promoted.
pub fn supersede_revision<R: RegistryRevision, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    revision: &mut R,
    now: u64,
) -> Result<(), WorkflowError> {
    revision.prepare(cache)?;

    let state = revision.revision_state();
    if !state.is_live() {
        return Err(WorkflowError::InvalidStateTransition {
            kind: R::KIND,
            id: revision.id(),
            state: state.to_string(),
            operation: "supersede",
        });
    }

    revision.set_revision_state(RevisionState::Superseded);
    revision.record_supersession(now);
    cache.save(revision)?;

    Ok(())
}

/// PendingApproval → ApprovalFailed, legal only once the change request has
/// been declined.
pub fn decline_revision<R: RegistryRevision, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    revision: &mut R,
    now: u64,
) -> Result<(), WorkflowError> {
    revision.prepare(cache)?;

    let state = revision.revision_state();
    if state != RevisionState::PendingApproval {
        return Err(WorkflowError::InvalidStateTransition {
            kind: R::KIND,
            id: revision.id(),
            state: state.to_string(),
            operation: "decline",
        });
    }

    let Some(cr_id) = revision.change_request_id() else {
        return Err(WorkflowError::NoChangeRequest {
            kind: R::PARENT_KIND,
            revision_id: revision.id(),
        });
    };

    let change_request: ChangeRequest = cache.find_by_id(cr_id)?;
    if change_request.state != ChangeRequestState::Declined {
        return Err(WorkflowError::NotDeclined { id: cr_id });
    }

    revision.set_revision_state(RevisionState::ApprovalFailed);
    revision.record_approval_failure(now);
    cache.save(revision)?;

    Ok(())
}

/// Serialize a revision's scalar columns plus its approver-set id lists into
/// the snapshot form used by exports and attestations.
pub fn export_revision_value<R: Serialize>(
    revision: &R,
    required_set_ids: &[RecordId],
    informed_set_ids: &[RecordId],
) -> Result<Value, WorkflowError> {
    let mut value = serde_json::to_value(revision)
        .map_err(|err| WorkflowError::Export(ExportError::Json(err.to_string())))?;

    if let Value::Object(map) = &mut value {
        map.insert(
            "required_approver_set_ids".to_string(),
            json!(required_set_ids),
        );
        map.insert(
            "informed_approver_set_ids".to_string(),
            json!(informed_set_ids),
        );
    }

    Ok(value)
}

/// Full export of an entity: identity plus current/pending revision
/// snapshots.
pub fn export_object<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    entity: &mut E,
) -> Result<ObjectExport, WorkflowError> {
    entity.prepare(cache)?;

    let current = match current_revision_of(cache, entity)? {
        Some(revision) => Some(revision.export()?),
        None => None,
    };

    let pending = match entity.pending_revision() {
        Some(revision) => Some(revision.export()?),
        None => None,
    };

    Ok(ObjectExport {
        id: entity.id(),
        kind: E::KIND,
        state: entity.state(),
        current_revision: current,
        pending_revision: pending,
    })
}

/// Export the revision snapshot that was operative at `timestamp`, or `None`
/// when nothing had been promoted yet — the documented sentinel for
/// display paths.
pub fn export_object_at<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    entity_id: RecordId,
    timestamp: u64,
) -> Result<Option<Value>, WorkflowError> {
    let revision: Option<E::Revision> = revision_at_time(cache, entity_id, timestamp)?;

    match revision {
        Some(mut revision) => {
            revision.prepare(cache)?;
            Ok(Some(revision.export()?))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_state_no_revisions() {
        assert_eq!(derive_entity_state(None, None), EntityState::New);
    }

    #[test]
    fn test_derive_state_first_revision_in_approval() {
        let state = derive_entity_state(
            None,
            Some((RevisionState::PendingApproval, DesiredState::Active)),
        );
        assert_eq!(state, EntityState::ActivePendingApproval);

        let state = derive_entity_state(
            None,
            Some((RevisionState::PendingApproval, DesiredState::Bootstrap)),
        );
        assert_eq!(state, EntityState::PendingBootstrap);
    }

    #[test]
    fn test_derive_state_new_revision_not_submitted() {
        // A drafted but unsubmitted revision leaves the object new.
        let state = derive_entity_state(None, Some((RevisionState::New, DesiredState::Active)));
        assert_eq!(state, EntityState::New);
    }

    #[test]
    fn test_derive_state_settled_current() {
        let state = derive_entity_state(
            Some((RevisionState::Active, DesiredState::Active)),
            None,
        );
        assert_eq!(state, EntityState::Active);

        let state = derive_entity_state(
            Some((RevisionState::Inactive, DesiredState::Inactive)),
            None,
        );
        assert_eq!(state, EntityState::Inactive);
    }

    #[test]
    fn test_derive_state_current_with_pending() {
        let state = derive_entity_state(
            Some((RevisionState::Active, DesiredState::Active)),
            Some((RevisionState::PendingApproval, DesiredState::Inactive)),
        );
        // The current revision's target names the pending-approval form.
        assert_eq!(state, EntityState::ActivePendingApproval);
    }
}
