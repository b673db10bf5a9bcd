//! # registrar-types
//!
//! Shared vocabulary for the registrar core. Every other crate in the
//! workspace speaks in terms of these types:
//!
//! - [`RecordId`] / [`RecordKind`]: integer primary keys and the closed set of
//!   persisted tables, together with the static association catalog the
//!   persistence layer consults for related-record lookups and join-table
//!   maintenance.
//! - State enums ([`RevisionState`], [`EntityState`], [`ChangeRequestState`],
//!   [`ApprovalState`], [`DesiredState`]) and the [`ApprovalAction`] verbs.
//!
//! The enums serialize to the lowercase wire names the registrar has always
//! used (`pendingapproval`, `activependingapproval`, ...), so exported
//! documents and attestations stay readable by existing tooling.

pub mod records;
pub mod states;

pub use records::{AssociationDecl, AssociationKind, RecordId, RecordKind};
pub use states::{
    ApprovalAction, ApprovalState, ChangeRequestState, DesiredState, EntityState, RevisionState,
};
