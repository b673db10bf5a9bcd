//! # Workflow Service
//!
//! The entry point callers use to drive the approval workflow. One service
//! instance owns a request-scoped [`PersistenceCache`], the configuration
//! value and the clock; every mutating operation runs inside a single
//! transaction and fails closed.
//!
//! The operations are generic over [`RegistryObject`], so the same
//! implementation serves approvers, approver sets, api users, contacts,
//! domains and hosts.

use crate::bootstrap::{bootstrap_registry, BootstrapResult, BootstrapSeed};
use crate::config::RegistrarConfig;
use crate::domain::approval::Approval;
use crate::domain::approver_set::ApproverSet;
use crate::domain::attestation::{Attestation, AttestationVerifier};
use crate::domain::change_request::ChangeRequest;
use crate::domain::export::{compare_values, ObjectExport};
use crate::domain::lifecycle::{
    self, decline_revision, derive_entity_state, promote_revision, supersede_revision,
};
use crate::domain::traits::{Prepare, RegistryObject, RegistryRevision};
use crate::errors::WorkflowError;
use registrar_crypto::Keyring;
use registrar_store::{PersistenceCache, RecordStore, Row, StoredRecord, TimeSource};
use registrar_types::{
    ApprovalAction, ApprovalState, ChangeRequestState, RecordId, RecordKind, RevisionState,
};
use serde_json::{json, Value};

/// The workflow service.
pub struct WorkflowService<S: RecordStore, T: TimeSource> {
    cache: PersistenceCache<S>,
    clock: T,
    config: RegistrarConfig,
}

impl<S: RecordStore, T: TimeSource> WorkflowService<S, T> {
    /// Wrap a store, running schema-ensure for every record kind.
    pub fn new(store: S, clock: T, config: RegistrarConfig) -> Result<Self, WorkflowError> {
        Ok(Self {
            cache: PersistenceCache::new(store)?,
            clock,
            config,
        })
    }

    pub fn cache(&mut self) -> &mut PersistenceCache<S> {
        &mut self.cache
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    /// Seed the default approver and approver set on a fresh store.
    pub fn bootstrap(
        &mut self,
        seed: &BootstrapSeed,
        actor: &str,
    ) -> Result<BootstrapResult, WorkflowError> {
        require_actor(actor)?;
        let now = self.clock.now();
        bootstrap_registry(&mut self.cache, &self.config, now, actor, seed)
    }

    /// Move a drafted revision into the approval workflow.
    pub fn start_approval_process<E: RegistryObject>(
        &mut self,
        revision_id: RecordId,
        actor: &str,
    ) -> Result<RecordId, WorkflowError> {
        require_actor(actor)?;
        let now = self.clock.now();
        let config = self.config.clone();
        self.cache
            .transaction(|cache| start_approval::<E, S>(cache, &config, now, actor, revision_id))
    }

    /// Store a clearsigned attestation on an approval, after validating it
    /// against the approver set keyring, then cascade state updates.
    pub fn submit_signature<E: RegistryObject>(
        &mut self,
        approval_id: RecordId,
        signature: &str,
        actor: &str,
    ) -> Result<(), WorkflowError> {
        require_actor(actor)?;
        let now = self.clock.now();
        let config = self.config.clone();
        self.cache.transaction(|cache| {
            accept_signature::<E, S>(cache, &config, now, actor, approval_id, signature)
        })
    }

    /// Promote the pending revision: consistency-checked, then the revision
    /// state change, the supersession of the old current revision and the
    /// repoint of the object, all in one transaction.
    pub fn promote_pending<E: RegistryObject>(
        &mut self,
        entity_id: RecordId,
        actor: &str,
    ) -> Result<(), WorkflowError> {
        require_actor(actor)?;
        let now = self.clock.now();
        let config = self.config.clone();
        self.cache
            .transaction(|cache| promote_object::<E, S>(cache, &config, now, actor, entity_id))
    }

    /// Mark the pending revision as failed after its change request was
    /// declined.
    pub fn decline_pending<E: RegistryObject>(
        &mut self,
        entity_id: RecordId,
        actor: &str,
    ) -> Result<(), WorkflowError> {
        require_actor(actor)?;
        let now = self.clock.now();
        let config = self.config.clone();
        self.cache
            .transaction(|cache| decline_object::<E, S>(cache, &config, now, actor, entity_id))
    }

    /// Cancel a revision in new or pendingapproval state.
    pub fn cancel_revision<E: RegistryObject>(
        &mut self,
        revision_id: RecordId,
        actor: &str,
    ) -> Result<(), WorkflowError> {
        require_actor(actor)?;
        let now = self.clock.now();
        let config = self.config.clone();
        self.cache
            .transaction(|cache| cancel_revision_of::<E, S>(cache, &config, now, actor, revision_id))
    }

    /// Supersede a live revision directly. Normally driven by promotion.
    pub fn supersede_revision<E: RegistryObject>(
        &mut self,
        revision_id: RecordId,
        actor: &str,
    ) -> Result<(), WorkflowError> {
        require_actor(actor)?;
        let now = self.clock.now();
        self.cache.transaction(|cache| {
            let mut revision: E::Revision = cache.find_by_id(revision_id)?;
            supersede_revision(cache, &mut revision, now)
        })
    }

    /// The consistency gate: cross-check the object, its pending revision,
    /// the change request and every approval's attestation. Fails closed
    /// and accumulates every violation found.
    pub fn verify_change_request<E: RegistryObject>(
        &mut self,
        entity_id: RecordId,
    ) -> (bool, Vec<WorkflowError>) {
        verify_cr::<E, S>(&mut self.cache, &self.config, entity_id)
    }

    /// The canonical attestation body an approver must sign for an
    /// approval.
    pub fn attestation_for<E: RegistryObject>(
        &mut self,
        approval_id: RecordId,
        action: ApprovalAction,
    ) -> Result<String, WorkflowError> {
        attestation_body::<E, S>(&mut self.cache, approval_id, action)
    }

    /// Recompute a parent object's derived state.
    pub fn update_object_state<E: RegistryObject>(
        &mut self,
        entity_id: RecordId,
        actor: &str,
    ) -> Result<bool, WorkflowError> {
        require_actor(actor)?;
        let now = self.clock.now();
        self.cache
            .transaction(|cache| update_object_state::<E, S>(cache, now, actor, entity_id))
    }

    /// Full export of an object.
    pub fn export<E: RegistryObject>(
        &mut self,
        entity_id: RecordId,
    ) -> Result<ObjectExport, WorkflowError> {
        let mut entity: E = self.cache.find_by_id(entity_id)?;
        lifecycle::export_object(&mut self.cache, &mut entity)
    }

    /// The revision snapshot operative at `timestamp`, or `None` when
    /// nothing had been promoted yet.
    pub fn export_at<E: RegistryObject>(
        &mut self,
        entity_id: RecordId,
        timestamp: u64,
    ) -> Result<Option<Value>, WorkflowError> {
        lifecycle::export_object_at::<E, S>(&mut self.cache, entity_id, timestamp)
    }

    /// Cache hit/miss line for request logs.
    pub fn cache_stats(&self) -> String {
        self.cache.stats_log()
    }
}

fn require_actor(actor: &str) -> Result<(), WorkflowError> {
    if actor.trim().is_empty() {
        return Err(WorkflowError::MissingActor);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Operations. Free functions so they can call each other inside one
// transaction frame.
// ---------------------------------------------------------------------------

fn start_approval<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    config: &RegistrarConfig,
    now: u64,
    actor: &str,
    revision_id: RecordId,
) -> Result<RecordId, WorkflowError> {
    let mut revision: E::Revision = cache.find_by_id(revision_id)?;

    if revision.revision_state() != RevisionState::New {
        return Err(WorkflowError::InvalidStateTransition {
            kind: <E::Revision as StoredRecord>::KIND,
            id: revision_id,
            state: revision.revision_state().to_string(),
            operation: "start approval for",
        });
    }

    revision.prepare(cache)?;
    let entity_id = revision.parent_id();

    let mut entity: E = cache.find_by_id(entity_id)?;
    let export = lifecycle::export_object(cache, &mut entity)?;

    let change_json = export.to_json()?;
    let change_diff = export.diff()?;

    if export.is_noop_proposal() {
        return Err(WorkflowError::NoopProposal { revision_id });
    }

    let required = required_sets_for::<E, S>(cache, config, entity_id)?;

    let mut change_request = ChangeRequest::new(
        E::KIND,
        entity_id,
        entity.current_revision_id(),
        revision_id,
        change_json,
        change_diff,
        now,
        actor,
    );

    for set_id in &required {
        let mut approval = Approval::new(0, *set_id, now, actor);
        if *set_id == config.default_approver_set_id {
            approval.is_final_approval = true;
        }
        change_request.approvals.push(approval);
    }

    cache.save(&mut change_request)?;

    tracing::info!(
        subsystem = "workflow",
        kind = %E::KIND,
        entity_id,
        revision_id,
        change_request_id = change_request.id,
        approvals = change_request.approvals.len(),
        "approval process started"
    );

    revision.set_change_request_id(change_request.id);
    revision.set_revision_state(RevisionState::PendingApproval);
    revision.record_approval_start(now, actor);
    revision.touch(now, actor);
    cache.save(&mut revision)?;

    update_object_state::<E, S>(cache, now, actor, entity_id)?;
    update_change_request_state::<E, S>(cache, config, now, actor, change_request.id)?;

    Ok(change_request.id)
}

fn accept_signature<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    config: &RegistrarConfig,
    now: u64,
    actor: &str,
    approval_id: RecordId,
    signature: &str,
) -> Result<(), WorkflowError> {
    let approval: Approval = cache.find_by_id(approval_id)?;

    // Bring the surrounding state current before judging the upload.
    update_change_request_state::<E, S>(cache, config, now, actor, approval.change_request_id)?;

    let mut approval: Approval = cache.find_by_id(approval_id)?;
    if approval.state != ApprovalState::PendingApproval {
        return Err(WorkflowError::InvalidStateTransition {
            kind: RecordKind::Approval,
            id: approval_id,
            state: approval.state.to_string(),
            operation: "sign",
        });
    }

    // The document must verify against the set's keyring before it is
    // stored at all.
    let keyring = keyring_for_set_id(cache, approval.approver_set_id)?;
    let attestation = AttestationVerifier::verify(&keyring, signature)?;

    tracing::info!(
        subsystem = "workflow",
        approval_id,
        action = %attestation.action,
        "signature accepted"
    );

    approval.signature = signature.to_string();
    approval.touch(now, actor);
    cache.save(&mut approval)?;

    update_approval_state::<E, S>(cache, config, now, actor, approval_id)?;

    Ok(())
}

fn promote_object<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    config: &RegistrarConfig,
    now: u64,
    actor: &str,
    entity_id: RecordId,
) -> Result<(), WorkflowError> {
    let (checks_out, errors) = verify_cr::<E, S>(cache, config, entity_id);
    if !checks_out {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(WorkflowError::Consistency(joined));
    }

    let mut entity: E = cache.find_by_id(entity_id)?;
    entity.prepare(cache)?;

    let pending_id = entity
        .pending_revision()
        .map(StoredRecord::id)
        .ok_or(WorkflowError::NoPendingRevision {
            kind: E::KIND,
            id: entity_id,
        })?;
    let old_current = entity.current_revision_id();

    let mut revision: E::Revision = cache.find_by_id(pending_id)?;
    promote_revision(cache, &mut revision, now)?;

    // The previously current revision is superseded exactly once.
    if let Some(old_id) = old_current {
        if old_id != pending_id {
            let mut old: E::Revision = cache.find_by_id(old_id)?;
            supersede_revision(cache, &mut old, now)?;
        }
    }

    let mut entity: E = cache.find_by_id(entity_id)?;
    entity.set_current_revision_id(Some(pending_id));
    entity.touch(now, actor);
    cache.save(&mut entity)?;

    update_object_state::<E, S>(cache, now, actor, entity_id)?;

    Ok(())
}

fn decline_object<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    _config: &RegistrarConfig,
    now: u64,
    actor: &str,
    entity_id: RecordId,
) -> Result<(), WorkflowError> {
    let mut entity: E = cache.find_by_id(entity_id)?;
    entity.prepare(cache)?;

    let pending_id = entity
        .pending_revision()
        .map(StoredRecord::id)
        .ok_or(WorkflowError::NoPendingRevision {
            kind: E::KIND,
            id: entity_id,
        })?;

    let mut revision: E::Revision = cache.find_by_id(pending_id)?;
    decline_revision(cache, &mut revision, now)?;

    update_object_state::<E, S>(cache, now, actor, entity_id)?;

    Ok(())
}

fn cancel_revision_of<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    config: &RegistrarConfig,
    now: u64,
    actor: &str,
    revision_id: RecordId,
) -> Result<(), WorkflowError> {
    let revision: E::Revision = cache.find_by_id(revision_id)?;

    let state = revision.revision_state();
    if !matches!(state, RevisionState::New | RevisionState::PendingApproval) {
        return Err(WorkflowError::InvalidStateTransition {
            kind: <E::Revision as StoredRecord>::KIND,
            id: revision_id,
            state: state.to_string(),
            operation: "cancel",
        });
    }

    let mut columns = Row::new();
    columns.insert(
        "revision_state".to_string(),
        json!(RevisionState::Cancelled),
    );
    columns.insert("updated_at".to_string(), json!(now));
    columns.insert("updated_by".to_string(), json!(actor));
    cache.update_columns::<E::Revision>(revision_id, columns)?;

    tracing::info!(
        subsystem = "workflow",
        kind = %<E::Revision as StoredRecord>::KIND,
        revision_id,
        "revision cancelled"
    );

    update_object_state::<E, S>(cache, now, actor, revision.parent_id())?;

    if let Some(cr_id) = revision.change_request_id() {
        update_change_request_state::<E, S>(cache, config, now, actor, cr_id)?;
    }

    Ok(())
}

/// The consistency gate. Collects every violation; a single failure anywhere
/// makes the whole check fail.
fn verify_cr<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    _config: &RegistrarConfig,
    entity_id: RecordId,
) -> (bool, Vec<WorkflowError>) {
    let mut errors = Vec::new();

    let (pending_id, current_revision_id, pending_export, cr_id) =
        match pending_snapshot::<E, S>(cache, entity_id) {
            Ok(snapshot) => snapshot,
            Err(err) => return (false, vec![err]),
        };

    let Some(cr_id) = cr_id else {
        return (
            false,
            vec![WorkflowError::NoChangeRequest {
                kind: E::KIND,
                revision_id: pending_id,
            }],
        );
    };

    let mut change_request: ChangeRequest = match cache.find_by_id(cr_id) {
        Ok(change_request) => change_request,
        Err(err) => return (false, vec![err.into()]),
    };
    if let Err(err) = change_request.prepare(cache) {
        return (false, vec![err]);
    }

    let mut checks_out = true;

    let structure = change_request_structure_errors(
        &change_request,
        E::KIND,
        entity_id,
        current_revision_id,
        pending_id,
    );
    if !structure.is_empty() {
        checks_out = false;
        errors.extend(structure);
    }

    if checks_out {
        for approval in change_request.approvals.clone() {
            match approval_attestation(cache, &approval) {
                Ok(attestation) => {
                    let binding = attestation_binding_errors(
                        &attestation,
                        &approval,
                        E::KIND,
                        &pending_export,
                    );
                    if !binding.is_empty() {
                        checks_out = false;
                        errors.extend(binding.into_iter().map(WorkflowError::Consistency));
                    }
                }
                Err(err) => {
                    checks_out = false;
                    errors.push(err);
                }
            }
        }
    }

    (checks_out && errors.is_empty(), errors)
}

fn attestation_body<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    approval_id: RecordId,
    action: ApprovalAction,
) -> Result<String, WorkflowError> {
    let approval: Approval = cache.find_by_id(approval_id)?;
    let change_request: ChangeRequest = cache.find_by_id(approval.change_request_id)?;

    let mut entity: E = cache.find_by_id(change_request.object_id)?;
    entity.prepare(cache)?;

    let pending = entity
        .pending_revision()
        .ok_or(WorkflowError::NoPendingRevision {
            kind: E::KIND,
            id: change_request.object_id,
        })?;

    let attestation = Attestation {
        object_kind: E::KIND,
        approval_id,
        action,
        exported_revision: pending.export()?,
    };

    attestation.canonical_json()
}

fn update_object_state<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    now: u64,
    actor: &str,
    entity_id: RecordId,
) -> Result<bool, WorkflowError> {
    let mut entity: E = cache.find_by_id(entity_id)?;
    entity.prepare(cache)?;

    let current = lifecycle::current_revision_of(cache, &entity)?
        .map(|revision| (revision.revision_state(), revision.desired_state()));
    let pending = entity
        .pending_revision()
        .map(|revision| (revision.revision_state(), revision.desired_state()));

    let derived = derive_entity_state(current, pending);
    if derived == entity.state() {
        return Ok(false);
    }

    tracing::debug!(
        subsystem = "workflow",
        kind = %E::KIND,
        entity_id,
        from = %entity.state(),
        to = %derived,
        "object state recomputed"
    );

    entity.set_state(derived);
    entity.touch(now, actor);
    cache.save(&mut entity)?;

    Ok(true)
}

fn update_change_request_state<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    config: &RegistrarConfig,
    now: u64,
    actor: &str,
    cr_id: RecordId,
) -> Result<bool, WorkflowError> {
    let mut change_request: ChangeRequest = cache.find_by_id(cr_id)?;
    change_request.prepare(cache)?;

    let mut changed = false;
    let mut cascade = false;

    let has_pending = object_has_pending::<E, S>(cache, change_request.object_id)?;

    match change_request.state {
        ChangeRequestState::New => {
            if !has_pending {
                change_request.state = ChangeRequestState::Cancelled;
                changed = true;
                cascade = true;
            } else {
                let required = required_sets_for::<E, S>(cache, config, change_request.object_id)?;
                let all_found = required
                    .iter()
                    .all(|set_id| change_request.has_approval_for(*set_id));

                if !all_found {
                    return Err(WorkflowError::Consistency(format!(
                        "change request {cr_id} is missing approvals for required approver sets"
                    )));
                }

                for approval in &mut change_request.approvals {
                    if approval.approver_set_id == config.default_approver_set_id
                        && !approval.is_final_approval
                    {
                        approval.is_final_approval = true;
                        approval.touch(now, actor);
                    }
                }

                change_request.state = ChangeRequestState::PendingApproval;
                changed = true;
                cascade = true;
            }
        }
        ChangeRequestState::PendingApproval => {
            if !has_pending {
                change_request.state = ChangeRequestState::Cancelled;
                changed = true;
                cascade = true;
            } else {
                let derived = ChangeRequest::derive_state(&change_request.approvals);
                if derived != change_request.state {
                    tracing::info!(
                        subsystem = "workflow",
                        change_request_id = cr_id,
                        from = %change_request.state,
                        to = %derived,
                        "change request state derived"
                    );

                    change_request.state = derived;
                    changed = true;
                    cascade = true;
                } else if change_request.ready_for_final_approval()
                    && change_request
                        .approvals
                        .iter()
                        .any(|approval| approval.is_final_approval && approval.state == ApprovalState::New)
                {
                    // Everything but the held-back final approval has
                    // resolved; cascade so it gets released.
                    cascade = true;
                }
            }
        }
        // Approved, Declined and Cancelled are terminal.
        _ => {}
    }

    if changed {
        change_request.touch(now, actor);
        cache.save(&mut change_request)?;
    }

    if cascade {
        let approval_ids: Vec<RecordId> = change_request
            .approvals
            .iter()
            .map(|approval| approval.id)
            .collect();

        for approval_id in approval_ids {
            update_approval_state::<E, S>(cache, config, now, actor, approval_id)?;
        }

        update_object_state::<E, S>(cache, now, actor, change_request.object_id)?;
    }

    Ok(changed)
}

fn update_approval_state<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    config: &RegistrarConfig,
    now: u64,
    actor: &str,
    approval_id: RecordId,
) -> Result<bool, WorkflowError> {
    let mut approval: Approval = cache.find_by_id(approval_id)?;

    let mut change_request: ChangeRequest = cache.find_by_id(approval.change_request_id)?;
    change_request.prepare(cache)?;

    let mut changed = false;
    let mut cascade = false;

    match approval.state {
        ApprovalState::New => {
            if change_request.is_cancelled() {
                approval.state = ApprovalState::Cancelled;
                changed = true;
                cascade = true;
            } else if change_request.state == ChangeRequestState::PendingApproval {
                // The final approval is held back until everything else has
                // resolved.
                if !approval.is_final_approval || change_request.ready_for_final_approval() {
                    let validity = approver_set_validity(cache, approval.approver_set_id)?;
                    if validity != approval.state {
                        approval.state = validity;
                        changed = true;
                        cascade = true;
                    }
                }
            }
        }
        ApprovalState::PendingApproval => {
            if change_request.is_cancelled() {
                approval.state = ApprovalState::Cancelled;
                changed = true;
                cascade = true;
            } else if approval.is_signed() {
                match judge_signed_approval::<E, S>(cache, &change_request, &approval) {
                    Ok(JudgedSignature::Decided(state)) => {
                        approval.state = state;
                        changed = true;
                        cascade = true;
                    }
                    Ok(JudgedSignature::SignatureRejected) => {
                        approval.signature.clear();
                        changed = true;
                    }
                    Ok(JudgedSignature::Hold) => {}
                    Err(err) => return Err(err),
                }
            } else {
                let validity = approver_set_validity(cache, approval.approver_set_id)?;
                if validity != approval.state {
                    approval.state = validity;
                    changed = true;
                    cascade = true;
                }
            }
        }
        ApprovalState::NoValidApprovers | ApprovalState::InactiveApproverSet => {
            if change_request.state == ChangeRequestState::Approved {
                // Parked approvals become their terminal skipped form once
                // the request is through.
                approval.state = match approval.state {
                    ApprovalState::NoValidApprovers => ApprovalState::SkippedNoValidApprovers,
                    _ => ApprovalState::SkippedInactiveApproverSet,
                };
                changed = true;
            } else {
                let validity = approver_set_validity(cache, approval.approver_set_id)?;
                if validity != approval.state {
                    approval.state = validity;
                    changed = true;
                    cascade = true;
                }
            }
        }
        // Approved, Declined, Cancelled and the skipped forms are terminal.
        _ => {}
    }

    if changed {
        approval.touch(now, actor);
        cache.save(&mut approval)?;
    }

    if cascade {
        update_change_request_state::<E, S>(cache, config, now, actor, approval.change_request_id)?;
    }

    Ok(changed)
}

enum JudgedSignature {
    /// Attestation verified and bound: the approval takes this state.
    Decided(ApprovalState),
    /// The attestation is bound to the wrong approval or snapshot; drop it.
    SignatureRejected,
    /// Cannot be judged right now; leave the approval waiting.
    Hold,
}

fn judge_signed_approval<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    change_request: &ChangeRequest,
    approval: &Approval,
) -> Result<JudgedSignature, WorkflowError> {
    let attestation = match approval_attestation(cache, approval) {
        Ok(attestation) => attestation,
        Err(err) => {
            tracing::warn!(
                subsystem = "workflow",
                approval_id = approval.id,
                error = %err,
                "stored signature no longer verifies"
            );
            return Ok(JudgedSignature::Hold);
        }
    };

    let (pending_id, current_revision_id, pending_export, _) =
        match pending_snapshot::<E, S>(cache, change_request.object_id) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    subsystem = "workflow",
                    approval_id = approval.id,
                    error = %err,
                    "no pending snapshot to judge the signature against"
                );
                return Ok(JudgedSignature::Hold);
            }
        };

    let structure = change_request_structure_errors(
        change_request,
        E::KIND,
        change_request.object_id,
        current_revision_id,
        pending_id,
    );
    if !structure.is_empty() {
        for err in &structure {
            tracing::warn!(subsystem = "workflow", approval_id = approval.id, error = %err, "inconsistent change request");
        }
        return Ok(JudgedSignature::Hold);
    }

    let binding = attestation_binding_errors(&attestation, approval, E::KIND, &pending_export);
    if !binding.is_empty() {
        for problem in &binding {
            tracing::warn!(
                subsystem = "workflow",
                approval_id = approval.id,
                problem = %problem,
                "attestation rejected"
            );
        }
        return Ok(JudgedSignature::SignatureRejected);
    }

    Ok(JudgedSignature::Decided(match attestation.action {
        ApprovalAction::Approve => ApprovalState::Approved,
        ApprovalAction::Decline => ApprovalState::Declined,
    }))
}

// ---------------------------------------------------------------------------
// Shared lookups and checks.
// ---------------------------------------------------------------------------

/// `(pending_id, current_revision_id, pending_export, change_request_id)`
/// for an object's pending revision.
fn pending_snapshot<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    entity_id: RecordId,
) -> Result<(RecordId, Option<RecordId>, Value, Option<RecordId>), WorkflowError> {
    let mut entity: E = cache.find_by_id(entity_id)?;
    entity.prepare(cache)?;

    let current_revision_id = entity.current_revision_id();

    let Some(pending) = entity.pending_revision() else {
        return Err(WorkflowError::NoPendingRevision {
            kind: E::KIND,
            id: entity_id,
        });
    };

    Ok((
        pending.id(),
        current_revision_id,
        pending.export()?,
        pending.change_request_id(),
    ))
}

fn object_has_pending<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    entity_id: RecordId,
) -> Result<bool, WorkflowError> {
    let mut entity: E = cache.find_by_id(entity_id)?;
    entity.prepare(cache)?;
    Ok(entity.pending_revision().is_some())
}

/// The approver sets whose sign-off the object's current revision demands,
/// falling back to the configured default set when none are declared.
fn required_sets_for<E: RegistryObject, S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    config: &RegistrarConfig,
    entity_id: RecordId,
) -> Result<Vec<RecordId>, WorkflowError> {
    let mut entity: E = cache.find_by_id(entity_id)?;
    entity.prepare(cache)?;

    let declared = match lifecycle::current_revision_of(cache, &entity)? {
        Some(revision) => revision.required_approver_set_ids().to_vec(),
        None => Vec::new(),
    };

    if declared.is_empty() {
        Ok(vec![config.default_approver_set_id])
    } else {
        Ok(declared)
    }
}

fn keyring_for_set_id<S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    set_id: RecordId,
) -> Result<Keyring, WorkflowError> {
    let mut set: ApproverSet = cache.find_by_id(set_id)?;
    set.keyring(cache)
}

/// The validity of an approver set, as an approval state: a live set with
/// usable keys can approve, a live set without keys parks the approval, and
/// a set without a live revision parks it differently.
fn approver_set_validity<S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    set_id: RecordId,
) -> Result<ApprovalState, WorkflowError> {
    let Some(mut set) = cache.try_find_by_id::<ApproverSet>(set_id)? else {
        return Ok(ApprovalState::InactiveApproverSet);
    };

    match set.keyring(cache) {
        Ok(keyring) if !keyring.is_empty() => Ok(ApprovalState::PendingApproval),
        Ok(_) => Ok(ApprovalState::NoValidApprovers),
        Err(_) => Ok(ApprovalState::InactiveApproverSet),
    }
}

/// Verify and parse an approval's stored attestation against its approver
/// set keyring. An unsigned approval is an error, not a skip.
fn approval_attestation<S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    approval: &Approval,
) -> Result<Attestation, WorkflowError> {
    if !approval.is_signed() {
        return Err(WorkflowError::Consistency(format!(
            "approval {} carries no attestation",
            approval.id
        )));
    }

    let keyring = keyring_for_set_id(cache, approval.approver_set_id)?;
    AttestationVerifier::verify(&keyring, &approval.signature)
}

/// Cross-reference checks between a change request and the live object.
fn change_request_structure_errors(
    change_request: &ChangeRequest,
    kind: RecordKind,
    entity_id: RecordId,
    current_revision_id: Option<RecordId>,
    pending_id: RecordId,
) -> Vec<WorkflowError> {
    let mut errors = Vec::new();
    let cr_id = change_request.id;

    if change_request.object_kind != kind {
        errors.push(WorkflowError::Consistency(format!(
            "change request {cr_id} names object kind {}, expected {}",
            change_request.object_kind, kind
        )));
    }

    if change_request.object_id != entity_id {
        errors.push(WorkflowError::Consistency(format!(
            "change request {cr_id} names object {}, expected {}",
            change_request.object_id, entity_id
        )));
    }

    if change_request.initial_revision_id != current_revision_id {
        errors.push(WorkflowError::Consistency(format!(
            "change request {cr_id} initial revision {:?} does not match current revision {:?}",
            change_request.initial_revision_id, current_revision_id
        )));
    }

    if change_request.proposed_revision_id != pending_id {
        errors.push(WorkflowError::Consistency(format!(
            "change request {cr_id} proposes revision {}, pending is {}",
            change_request.proposed_revision_id, pending_id
        )));
    }

    errors
}

/// Attestation binding checks: the signed document must name this approval,
/// this object kind, and the exact pending snapshot.
fn attestation_binding_errors(
    attestation: &Attestation,
    approval: &Approval,
    kind: RecordKind,
    pending_export: &Value,
) -> Vec<String> {
    let mut problems = Vec::new();

    if attestation.object_kind != kind {
        problems.push(format!(
            "attestation on approval {} names object kind {}, expected {}",
            approval.id, attestation.object_kind, kind
        ));
    }

    if attestation.approval_id != approval.id {
        problems.push(format!(
            "attestation names approval {}, carried by approval {}",
            attestation.approval_id, approval.id
        ));
    }

    let mut diffs = Vec::new();
    compare_values("", &attestation.exported_revision, pending_export, &mut diffs);
    for diff in diffs {
        problems.push(format!(
            "attestation snapshot mismatch on approval {}: {diff}",
            approval.id
        ));
    }

    problems
}
