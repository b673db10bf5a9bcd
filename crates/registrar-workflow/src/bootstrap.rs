//! First-run seeding.
//!
//! A fresh store has no approver sets, so nothing could ever be approved.
//! Bootstrap creates the initial approver and the default approver set
//! (conventionally id 1) with revisions already in bootstrap state, skipping
//! the approval workflow exactly once.

use crate::config::RegistrarConfig;
use crate::domain::approver::{Approver, ApproverRevision};
use crate::domain::approver_set::{ApproverSet, ApproverSetRevision};
use crate::domain::traits::RegistryObject;
use crate::errors::WorkflowError;
use registrar_store::{PersistenceCache, RecordStore};
use registrar_types::{DesiredState, EntityState, RecordId, RevisionState};

/// What the first approver looks like.
#[derive(Debug, Clone)]
pub struct BootstrapSeed {
    pub approver_name: String,
    pub approver_email: String,
    /// Armored public key block for the first approver.
    pub armored_key: String,
}

/// Ids of the seeded records.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapResult {
    pub approver_id: RecordId,
    pub approver_set_id: RecordId,
}

/// Seed the default approver and approver set inside one transaction.
pub fn bootstrap_registry<S: RecordStore>(
    cache: &mut PersistenceCache<S>,
    config: &RegistrarConfig,
    now: u64,
    actor: &str,
    seed: &BootstrapSeed,
) -> Result<BootstrapResult, WorkflowError> {
    cache.transaction(|cache| {
        let mut approver = Approver::new(now, actor);
        cache.save(&mut approver)?;

        let mut revision = ApproverRevision::new(approver.id, DesiredState::Bootstrap, now, actor);
        revision.revision_state = RevisionState::Bootstrap;
        revision.name = seed.approver_name.clone();
        revision.email_address = seed.approver_email.clone();
        revision.public_key = seed.armored_key.clone();
        revision.promoted_at = Some(now);
        cache.save(&mut revision)?;

        let mut approver: Approver = cache.find_by_id(approver.id)?;
        approver.current_revision_id = Some(revision.id);
        approver.state = EntityState::Bootstrap;
        approver.touch(now, actor);
        cache.save(&mut approver)?;

        let mut set = ApproverSet::new(now, actor);
        cache.save(&mut set)?;

        let mut set_revision = ApproverSetRevision::new(set.id, DesiredState::Bootstrap, now, actor);
        set_revision.revision_state = RevisionState::Bootstrap;
        set_revision.title = "Default approvers".to_string();
        set_revision.description = "Seeded by bootstrap".to_string();
        set_revision.member_ids = vec![approver.id];
        set_revision.promoted_at = Some(now);
        cache.save(&mut set_revision)?;

        let mut set: ApproverSet = cache.find_by_id(set.id)?;
        set.current_revision_id = Some(set_revision.id);
        set.state = EntityState::Bootstrap;
        set.touch(now, actor);
        cache.save(&mut set)?;

        if set.id != config.default_approver_set_id {
            tracing::warn!(
                subsystem = "workflow",
                seeded_set_id = set.id,
                configured_default = config.default_approver_set_id,
                "seeded approver set id does not match the configured default"
            );
        }

        tracing::info!(
            subsystem = "workflow",
            approver_id = approver.id,
            approver_set_id = set.id,
            "registry bootstrapped"
        );

        Ok(BootstrapResult {
            approver_id: approver.id,
            approver_set_id: set.id,
        })
    })
}
