//! End-to-end approval workflow scenarios.

use crate::integration::support::{
    approval_ids, booted_service, live_approver, live_approver_set, sign_and_submit, T0,
};
use registrar_crypto::SigningKeyPair;
use registrar_types::{
    ApprovalAction, ApprovalState, ChangeRequestState, DesiredState, EntityState, RevisionState,
};
use registrar_workflow::{
    ApiUser, ApiUserRevision, ChangeRequest, Contact, ContactRevision, Domain, DomainRevision,
    ObjectExport, Prepare, WorkflowError,
};

#[test]
fn test_approve_path_promotes_first_revision() {
    let (mut service, root) = booted_service();

    let mut contact = Contact::new(T0, "ops");
    service.cache().save(&mut contact).unwrap();

    let mut revision = ContactRevision::new(contact.id, DesiredState::Active, T0, "ops");
    revision.name = "Hostmaster".to_string();
    revision.email = "hostmaster@example.org".to_string();
    service.cache().save(&mut revision).unwrap();

    let cr_id = service
        .start_approval_process::<Contact>(revision.id, "ops")
        .unwrap();

    // One approval, falling back to the default approver set.
    let approvals = approval_ids(&mut service, cr_id);
    assert_eq!(approvals.len(), 1);

    let contact_reloaded: Contact = service.cache().find_by_id(contact.id).unwrap();
    assert_eq!(contact_reloaded.state, EntityState::ActivePendingApproval);

    sign_and_submit::<Contact>(
        &mut service,
        approvals[0],
        ApprovalAction::Approve,
        &root,
        "root",
    );

    let change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    assert_eq!(change_request.state, ChangeRequestState::Approved);

    service.promote_pending::<Contact>(contact.id, "ops").unwrap();

    let contact_reloaded: Contact = service.cache().find_by_id(contact.id).unwrap();
    assert_eq!(contact_reloaded.state, EntityState::Active);
    assert_eq!(contact_reloaded.current_revision_id, Some(revision.id));

    let revision_reloaded: ContactRevision = service.cache().find_by_id(revision.id).unwrap();
    assert_eq!(revision_reloaded.revision_state, RevisionState::Active);
    assert_eq!(revision_reloaded.promoted_at, Some(T0));
}

#[test]
fn test_decline_path_fails_revision() {
    let (mut service, root) = booted_service();

    let mut api_user = ApiUser::new(T0, "ops");
    service.cache().save(&mut api_user).unwrap();

    let mut revision = ApiUserRevision::new(api_user.id, DesiredState::Active, T0, "ops");
    revision.name = "provisioner".to_string();
    service.cache().save(&mut revision).unwrap();

    let cr_id = service
        .start_approval_process::<ApiUser>(revision.id, "ops")
        .unwrap();
    let approvals = approval_ids(&mut service, cr_id);

    sign_and_submit::<ApiUser>(
        &mut service,
        approvals[0],
        ApprovalAction::Decline,
        &root,
        "root",
    );

    let change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    assert_eq!(change_request.state, ChangeRequestState::Declined);

    // Promotion is gated shut on a declined request.
    let err = service
        .promote_pending::<ApiUser>(api_user.id, "ops")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotApproved { .. }));

    service
        .decline_pending::<ApiUser>(api_user.id, "ops")
        .unwrap();

    let revision_reloaded: ApiUserRevision = service.cache().find_by_id(revision.id).unwrap();
    assert_eq!(revision_reloaded.revision_state, RevisionState::ApprovalFailed);
    assert_eq!(revision_reloaded.approval_failed_at, Some(T0));

    // No current revision ever existed: the object reverts to new.
    let api_user_reloaded: ApiUser = service.cache().find_by_id(api_user.id).unwrap();
    assert_eq!(api_user_reloaded.state, EntityState::New);
}

#[test]
fn test_cancel_path_recomputes_states() {
    let (mut service, _) = booted_service();

    let mut domain = Domain::new("example.org", T0, "ops");
    service.cache().save(&mut domain).unwrap();

    let mut revision = DomainRevision::new(domain.id, DesiredState::Active, T0, "ops");
    revision.owners = "Operations".to_string();
    service.cache().save(&mut revision).unwrap();

    let cr_id = service
        .start_approval_process::<Domain>(revision.id, "ops")
        .unwrap();

    service
        .cancel_revision::<Domain>(revision.id, "ops")
        .unwrap();

    let revision_reloaded: DomainRevision = service.cache().find_by_id(revision.id).unwrap();
    assert_eq!(revision_reloaded.revision_state, RevisionState::Cancelled);

    let domain_reloaded: Domain = service.cache().find_by_id(domain.id).unwrap();
    assert_eq!(domain_reloaded.state, EntityState::New);

    let mut change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    change_request.prepare(service.cache()).unwrap();
    assert_eq!(change_request.state, ChangeRequestState::Cancelled);
    assert!(change_request
        .approvals
        .iter()
        .all(|approval| approval.state == ApprovalState::Cancelled));

    // A cancelled revision cannot be resubmitted.
    let err = service
        .start_approval_process::<Domain>(revision.id, "ops")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidStateTransition { .. }));
}

#[test]
fn test_multi_set_flow_sequences_final_approval() {
    let (mut service, root) = booted_service();

    // A second approver set anchored on alice's key.
    let (alice_id, alice) = live_approver(service.cache(), 33, "alice <alice@example.org>");
    let ops_set = live_approver_set(service.cache(), "Operations", &[alice_id]);

    // A domain whose current revision requires both sets.
    let mut domain = Domain::new("example.net", T0, "ops");
    service.cache().save(&mut domain).unwrap();

    let mut current = DomainRevision::new(domain.id, DesiredState::Active, T0, "ops");
    current.revision_state = RevisionState::Active;
    current.owners = "Operations".to_string();
    current.promoted_at = Some(T0);
    current.required_approver_set_ids = vec![1, ops_set];
    service.cache().save(&mut current).unwrap();

    let mut domain_record: Domain = service.cache().find_by_id(domain.id).unwrap();
    domain_record.current_revision_id = Some(current.id);
    domain_record.state = EntityState::Active;
    service.cache().save(&mut domain_record).unwrap();

    // Propose a change.
    let mut proposed = DomainRevision::new(domain.id, DesiredState::Active, T0, "ops");
    proposed.owners = "Operations and Registry".to_string();
    service.cache().save(&mut proposed).unwrap();

    let cr_id = service
        .start_approval_process::<Domain>(proposed.id, "ops")
        .unwrap();

    let mut change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    change_request.prepare(service.cache()).unwrap();
    assert_eq!(change_request.approvals.len(), 2);

    let final_approval = change_request
        .approvals
        .iter()
        .find(|approval| approval.approver_set_id == 1)
        .unwrap();
    let ops_approval = change_request
        .approvals
        .iter()
        .find(|approval| approval.approver_set_id == ops_set)
        .unwrap();

    // The default set's approval is held back while the other is open.
    assert!(final_approval.is_final_approval);
    assert_eq!(final_approval.state, ApprovalState::New);
    assert_eq!(ops_approval.state, ApprovalState::PendingApproval);
    let (final_id, ops_id) = (final_approval.id, ops_approval.id);

    sign_and_submit::<Domain>(&mut service, ops_id, ApprovalAction::Approve, &alice, "alice");

    // With the other approval resolved, the final approval is released.
    let mut change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    change_request.prepare(service.cache()).unwrap();
    let final_approval = change_request
        .approvals
        .iter()
        .find(|approval| approval.id == final_id)
        .unwrap();
    assert_eq!(final_approval.state, ApprovalState::PendingApproval);
    assert_eq!(change_request.state, ChangeRequestState::PendingApproval);

    sign_and_submit::<Domain>(&mut service, final_id, ApprovalAction::Approve, &root, "root");

    let change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    assert_eq!(change_request.state, ChangeRequestState::Approved);

    service.promote_pending::<Domain>(domain.id, "ops").unwrap();

    // The old current revision is superseded exactly once.
    let old: DomainRevision = service.cache().find_by_id(current.id).unwrap();
    assert_eq!(old.revision_state, RevisionState::Superseded);
    assert_eq!(old.superseded_at, Some(T0));

    let err = service
        .supersede_revision::<Domain>(current.id, "ops")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidStateTransition { .. }));

    let domain_reloaded: Domain = service.cache().find_by_id(domain.id).unwrap();
    assert_eq!(domain_reloaded.current_revision_id, Some(proposed.id));
    assert_eq!(domain_reloaded.state, EntityState::Active);
}

#[test]
fn test_tampered_attestation_never_approves() {
    let (mut service, root) = booted_service();

    let mut contact = Contact::new(T0, "ops");
    service.cache().save(&mut contact).unwrap();

    let mut revision = ContactRevision::new(contact.id, DesiredState::Active, T0, "ops");
    revision.name = "Hostmaster".to_string();
    service.cache().save(&mut revision).unwrap();

    let cr_id = service
        .start_approval_process::<Contact>(revision.id, "ops")
        .unwrap();
    let approvals = approval_ids(&mut service, cr_id);

    // Signature by a key outside the set is rejected at upload.
    let outsider = SigningKeyPair::from_seed([66u8; 32]);
    let body = service
        .attestation_for::<Contact>(approvals[0], ApprovalAction::Approve)
        .unwrap();
    let forged = outsider.clearsign(body.as_bytes()).unwrap();
    assert!(service
        .submit_signature::<Contact>(approvals[0], &forged, "mallory")
        .is_err());

    // A validly signed attestation for a different approval id does not
    // move the approval either.
    let mut wrong: serde_json::Value = serde_json::from_str(&body).unwrap();
    wrong["approval_id"] = serde_json::json!(approvals[0] + 1000);
    let wrong_body = serde_json::to_string_pretty(&wrong).unwrap();
    let signed = root.clearsign(wrong_body.as_bytes()).unwrap();

    service
        .submit_signature::<Contact>(approvals[0], &signed, "root")
        .unwrap();

    let change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    assert_eq!(change_request.state, ChangeRequestState::PendingApproval);

    let (checks_out, errors) = service.verify_change_request::<Contact>(contact.id);
    assert!(!checks_out);
    assert!(!errors.is_empty());
}

#[test]
fn test_noop_proposal_rejected() {
    let (mut service, root) = booted_service();

    let mut contact = Contact::new(T0, "ops");
    service.cache().save(&mut contact).unwrap();

    let mut revision = ContactRevision::new(contact.id, DesiredState::Active, T0, "ops");
    revision.name = "Stable".to_string();
    service.cache().save(&mut revision).unwrap();

    let cr_id = service
        .start_approval_process::<Contact>(revision.id, "ops")
        .unwrap();
    let approvals = approval_ids(&mut service, cr_id);
    sign_and_submit::<Contact>(
        &mut service,
        approvals[0],
        ApprovalAction::Approve,
        &root,
        "root",
    );
    service.promote_pending::<Contact>(contact.id, "ops").unwrap();

    // Propose exactly the same content again.
    let mut identical = ContactRevision::new(contact.id, DesiredState::Active, T0, "ops");
    identical.name = "Stable".to_string();
    service.cache().save(&mut identical).unwrap();

    let err = service
        .start_approval_process::<Contact>(identical.id, "ops")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NoopProposal { .. }));
}

#[test]
fn test_export_round_trip_and_diff() {
    let (mut service, root) = booted_service();

    let mut contact = Contact::new(T0, "ops");
    service.cache().save(&mut contact).unwrap();

    let mut revision = ContactRevision::new(contact.id, DesiredState::Active, T0, "ops");
    revision.name = "First".to_string();
    service.cache().save(&mut revision).unwrap();

    let cr_id = service
        .start_approval_process::<Contact>(revision.id, "ops")
        .unwrap();
    let approvals = approval_ids(&mut service, cr_id);
    sign_and_submit::<Contact>(
        &mut service,
        approvals[0],
        ApprovalAction::Approve,
        &root,
        "root",
    );
    service.promote_pending::<Contact>(contact.id, "ops").unwrap();

    // Round trip: export, serialize, parse, compare.
    let export = service.export::<Contact>(contact.id).unwrap();
    let json = export.to_json().unwrap();
    let parsed = ObjectExport::from_json(&json).unwrap();
    let (pass, errs) = export.compare(&parsed);
    assert!(pass, "round trip drifted: {errs:?}");

    // A second draft produces a readable diff against the current revision.
    let mut second = ContactRevision::new(contact.id, DesiredState::Active, T0, "ops");
    second.name = "Second".to_string();
    service.cache().save(&mut second).unwrap();

    let export = service.export::<Contact>(contact.id).unwrap();
    let diff = export.diff().unwrap();
    assert!(diff.contains("- "));
    assert!(diff.contains("+ "));
    assert!(diff.contains("Second"));

    // The change request recorded the snapshot and diff at proposal time.
    let change_request: ChangeRequest = service.cache().find_by_id(cr_id).unwrap();
    assert!(!change_request.change_json.is_empty());
    assert!(!change_request.change_diff.is_empty());
}

#[test]
fn test_export_at_timestamp() {
    let (mut service, root) = booted_service();

    let mut contact = Contact::new(T0, "ops");
    service.cache().save(&mut contact).unwrap();

    let mut revision = ContactRevision::new(contact.id, DesiredState::Active, T0, "ops");
    revision.name = "Versioned".to_string();
    service.cache().save(&mut revision).unwrap();

    let cr_id = service
        .start_approval_process::<Contact>(revision.id, "ops")
        .unwrap();
    let approvals = approval_ids(&mut service, cr_id);
    sign_and_submit::<Contact>(
        &mut service,
        approvals[0],
        ApprovalAction::Approve,
        &root,
        "root",
    );
    service.promote_pending::<Contact>(contact.id, "ops").unwrap();

    // Before anything was promoted: the documented empty sentinel.
    let before = service.export_at::<Contact>(contact.id, T0 - 1).unwrap();
    assert!(before.is_none());

    let after = service.export_at::<Contact>(contact.id, T0).unwrap().unwrap();
    assert_eq!(after["name"], "Versioned");
}

#[test]
fn test_attestation_body_names_the_approval() {
    let (mut service, _) = booted_service();

    let mut contact = Contact::new(T0, "ops");
    service.cache().save(&mut contact).unwrap();

    let mut revision = ContactRevision::new(contact.id, DesiredState::Active, T0, "ops");
    service.cache().save(&mut revision).unwrap();

    let cr_id = service
        .start_approval_process::<Contact>(revision.id, "ops")
        .unwrap();
    let approvals = approval_ids(&mut service, cr_id);

    let body = service
        .attestation_for::<Contact>(approvals[0], ApprovalAction::Approve)
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();

    assert_eq!(value["approval_id"], serde_json::json!(approvals[0]));
    assert_eq!(value["action"], "approve");
    assert_eq!(value["exported_revision"]["id"], serde_json::json!(revision.id));
}
