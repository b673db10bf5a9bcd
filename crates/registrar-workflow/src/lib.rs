//! # registrar-workflow
//!
//! The revision / change-request / approval state machine of the registrar
//! core, shared by every registry object type.
//!
//! ## Model
//!
//! Every registry object (approver, approver set, api user, contact, domain,
//! host) carries one accepted current revision and at most one pending
//! revision. A pending revision enters approval through
//! [`WorkflowService::start_approval_process`], which snapshots the object
//! into a [`domain::change_request::ChangeRequest`] with one
//! [`domain::approval::Approval`] per required approver set. Approvers
//! submit clearsigned [`domain::attestation::Attestation`]s binding their
//! decision to the exact proposed snapshot; the change request state is
//! derived from its approvals; and
//! [`WorkflowService::verify_change_request`] gates promotion.
//!
//! State transitions fail closed and run inside one transaction each; the
//! revision lifecycle is:
//!
//! ```text
//! new ──start──→ pendingapproval ──promote──→ active/inactive/external
//!   │                  │    │                        │
//!   └──cancel──┐       │    └──decline──→ approvalfailed
//!              ▼       ▼                             ▼
//!          cancelled cancelled              superseded (next promote)
//! ```

pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod errors;
pub mod service;

pub use bootstrap::{bootstrap_registry, BootstrapResult, BootstrapSeed};
pub use config::RegistrarConfig;
pub use domain::api_user::{ApiUser, ApiUserRevision};
pub use domain::approval::Approval;
pub use domain::approver::{Approver, ApproverRevision};
pub use domain::approver_set::{ApproverSet, ApproverSetRevision};
pub use domain::attestation::{Attestation, AttestationVerifier};
pub use domain::change_request::ChangeRequest;
pub use domain::contact::{Contact, ContactRevision};
pub use domain::domain_name::{Domain, DomainRevision};
pub use domain::export::{ObjectExport, RevisionExport};
pub use domain::host::{Host, HostRevision};
pub use domain::lifecycle::{
    decline_revision, derive_entity_state, promote_revision, supersede_revision,
};
pub use domain::traits::{Prepare, RegistryObject, RegistryRevision};
pub use errors::{ExportError, WorkflowError};
pub use service::WorkflowService;
