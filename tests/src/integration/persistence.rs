//! Persistence properties across the workflow object graph.

use crate::integration::support::{booted_service, T0};
use registrar_store::{RecordStore, SaveGuard, StoreError};
use registrar_types::{DesiredState, RevisionState};
use registrar_workflow::{
    Approver, ApproverRevision, ApproverSet, Contact, ContactRevision, Prepare, RegistryObject,
    WorkflowError,
};

#[test]
fn test_cyclic_graph_save_terminates_with_zero_writes() {
    let (mut service, _) = booted_service();
    let cache = service.cache();

    // Close the loop: the root approver's revision now requires the default
    // approver set, whose revision already lists the approver as a member.
    let mut revision: ApproverRevision = cache.find_by_id(1).unwrap();
    revision.prepare(cache).unwrap();
    revision.required_approver_set_ids = vec![1];
    cache.save(&mut revision).unwrap();

    // Hydrate both sides of the cycle into the request cache.
    let mut set: ApproverSet = cache.find_by_id(1).unwrap();
    set.prepare(cache).unwrap();

    let mut approver: Approver = cache.find_by_id(1).unwrap();
    approver.prepare(cache).unwrap();

    let writes_before = cache.store().row_writes();

    let mut guard = SaveGuard::new();
    cache
        .transaction::<_, StoreError, _>(|c| c.save_node(&mut set, &mut guard))
        .unwrap();

    // The cascade reached every node of the cycle exactly once and, since
    // nothing changed, wrote no rows at all.
    assert_eq!(guard.len(), 4, "set, set revision, approver, approver revision");
    assert_eq!(cache.store().row_writes(), writes_before);
}

#[test]
fn test_changed_node_in_cycle_writes_only_itself() {
    let (mut service, _) = booted_service();
    let cache = service.cache();

    let mut revision: ApproverRevision = cache.find_by_id(1).unwrap();
    revision.prepare(cache).unwrap();
    revision.required_approver_set_ids = vec![1];
    cache.save(&mut revision).unwrap();

    let mut set: ApproverSet = cache.find_by_id(1).unwrap();
    set.prepare(cache).unwrap();
    let _approver: Approver = cache.find_by_id(1).unwrap();

    // Mutate only the set revision's scalar columns.
    set.current_revision.as_mut().unwrap().description = "rotated on-call".to_string();

    let writes_before = cache.store().row_writes();
    cache.save(&mut set).unwrap();

    assert_eq!(cache.store().row_writes(), writes_before + 1);

    let reloaded: registrar_workflow::ApproverSetRevision = cache
        .find_by_id(set.current_revision_id.unwrap())
        .unwrap();
    assert_eq!(reloaded.description, "rotated on-call");
}

#[test]
fn test_cache_wipes_after_write_and_counts_hits() {
    let (mut service, _) = booted_service();
    let cache = service.cache();

    let before = cache.stats_log();

    let first: Approver = cache.find_by_id(1).unwrap();
    let _again: Approver = cache.find_by_id(1).unwrap();

    let after_reads = cache.stats_log();
    assert_ne!(before, after_reads);

    // A write invalidates everything; the next read misses again.
    let mut approver = first;
    approver.touch(T0 + 10, "ops");
    cache.save(&mut approver).unwrap();

    let misses_before: String = cache.stats_log();
    let _reload: Approver = cache.find_by_id(1).unwrap();
    assert_ne!(cache.stats_log(), misses_before);
}

#[test]
fn test_failed_operation_persists_nothing() {
    let (mut service, _) = booted_service();

    // A drafted revision whose parent contact does not exist.
    let mut orphan = ContactRevision::new(9876, DesiredState::Active, T0, "ops");
    service.cache().save(&mut orphan).unwrap();

    let err = service
        .start_approval_process::<Contact>(orphan.id, "ops")
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Store(StoreError::NotFound { .. })
    ));

    // The operation rolled back: the revision never entered approval.
    let reloaded: ContactRevision = service.cache().find_by_id(orphan.id).unwrap();
    assert_eq!(reloaded.revision_state, RevisionState::New);
    assert!(reloaded.change_request_id.is_none());
    assert!(reloaded.approval_started_at.is_none());
}

#[test]
fn test_purged_revision_rereads_from_store() {
    let (mut service, _) = booted_service();
    let cache = service.cache();

    let revision: ApproverRevision = cache.find_by_id(1).unwrap();
    assert_eq!(revision.revision_state, RevisionState::Bootstrap);

    cache.purge::<ApproverRevision>(1);

    let again: ApproverRevision = cache.find_by_id(1).unwrap();
    assert_eq!(again.revision_state, RevisionState::Bootstrap);
}
