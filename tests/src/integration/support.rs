//! Shared fixtures for the integration tests.

use registrar_crypto::{encode_key_block, SigningKeyPair};
use registrar_store::{FixedTimeSource, MemoryStore, PersistenceCache};
use registrar_types::{ApprovalAction, DesiredState, EntityState, RecordId, RevisionState};
use registrar_workflow::{
    Approver, ApproverRevision, ApproverSet, ApproverSetRevision, BootstrapSeed, ChangeRequest,
    Prepare, RegistrarConfig, RegistryObject, WorkflowService,
};

pub type TestService = WorkflowService<MemoryStore, FixedTimeSource>;

pub const T0: u64 = 1_700_000_000;

/// A service over a fresh in-memory store, bootstrapped with the default
/// approver set (id 1) anchored on the returned root key.
pub fn booted_service() -> (TestService, SigningKeyPair) {
    let mut service = WorkflowService::new(
        MemoryStore::new(),
        FixedTimeSource(T0),
        RegistrarConfig::default(),
    )
    .expect("service construction");

    let root = SigningKeyPair::from_seed([1u8; 32]);
    let seed = BootstrapSeed {
        approver_name: "Root Approver".to_string(),
        approver_email: "root@example.com".to_string(),
        armored_key: encode_key_block(&root.key_block("Root <root@example.com>")).unwrap(),
    };

    service.bootstrap(&seed, "boot").expect("bootstrap");

    (service, root)
}

/// Create an approver with a live (active) revision carrying the given key,
/// the way bootstrap does for the root approver.
pub fn live_approver(
    cache: &mut PersistenceCache<MemoryStore>,
    seed: u8,
    identity: &str,
) -> (RecordId, SigningKeyPair) {
    let pair = SigningKeyPair::from_seed([seed; 32]);
    let armored = encode_key_block(&pair.key_block(identity)).unwrap();

    let mut approver = Approver::new(T0, "fixture");
    cache.save(&mut approver).unwrap();

    let mut revision = ApproverRevision::new(approver.id, DesiredState::Active, T0, "fixture");
    revision.revision_state = RevisionState::Active;
    revision.name = identity.to_string();
    revision.public_key = armored;
    revision.promoted_at = Some(T0);
    cache.save(&mut revision).unwrap();

    let mut approver: Approver = cache.find_by_id(approver.id).unwrap();
    approver.current_revision_id = Some(revision.id);
    approver.state = EntityState::Active;
    cache.save(&mut approver).unwrap();

    (approver.id, pair)
}

/// Create an approver set with a live revision whose members are the given
/// approvers.
pub fn live_approver_set(
    cache: &mut PersistenceCache<MemoryStore>,
    title: &str,
    member_ids: &[RecordId],
) -> RecordId {
    let mut set = ApproverSet::new(T0, "fixture");
    cache.save(&mut set).unwrap();

    let mut revision = ApproverSetRevision::new(set.id, DesiredState::Active, T0, "fixture");
    revision.revision_state = RevisionState::Active;
    revision.title = title.to_string();
    revision.member_ids = member_ids.to_vec();
    revision.promoted_at = Some(T0);
    cache.save(&mut revision).unwrap();

    let mut set: ApproverSet = cache.find_by_id(set.id).unwrap();
    set.current_revision_id = Some(revision.id);
    set.state = EntityState::Active;
    cache.save(&mut set).unwrap();

    set.id
}

/// The approval ids on a change request, in creation order.
pub fn approval_ids(service: &mut TestService, cr_id: RecordId) -> Vec<RecordId> {
    let mut change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    change_request.prepare(service.cache()).unwrap();

    change_request
        .approvals
        .iter()
        .map(|approval| approval.id)
        .collect()
}

/// Download the attestation body for an approval, sign it with `pair` and
/// submit the clearsigned document.
pub fn sign_and_submit<E: RegistryObject>(
    service: &mut TestService,
    approval_id: RecordId,
    action: ApprovalAction,
    pair: &SigningKeyPair,
    actor: &str,
) {
    let body = service
        .attestation_for::<E>(approval_id, action)
        .expect("attestation body");
    let signed = pair.clearsign(body.as_bytes()).expect("clearsign");

    service
        .submit_signature::<E>(approval_id, &signed, actor)
        .expect("signature accepted");
}
