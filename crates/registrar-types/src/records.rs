//! Record identity and the association catalog.
//!
//! Every persisted record is addressed by `(RecordKind, RecordId)`. The
//! association catalog below is the single source of truth the store consults
//! to resolve `find_related` calls and to maintain join tables; the cascade
//! logic in the persistence layer never hard-codes a table or column name.

use serde::{Deserialize, Serialize};

/// Integer primary key. Zero means "not yet persisted".
pub type RecordId = i64;

/// The closed set of persisted record types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Approver,
    ApproverRevision,
    ApproverSet,
    ApproverSetRevision,
    ApiUser,
    ApiUserRevision,
    Contact,
    ContactRevision,
    Domain,
    DomainRevision,
    Host,
    HostRevision,
    ChangeRequest,
    Approval,
}

/// How an association is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssociationKind {
    /// Foreign key lives on our own row.
    BelongsTo { fk_column: &'static str },
    /// Foreign key lives on the child row.
    HasMany { fk_column: &'static str },
    /// Link rows live in a dedicated join table.
    ManyToMany {
        join_table: &'static str,
        left_column: &'static str,
        right_column: &'static str,
    },
}

/// One declared association edge of a record kind.
#[derive(Clone, Copy, Debug)]
pub struct AssociationDecl {
    pub name: &'static str,
    pub target: RecordKind,
    pub kind: AssociationKind,
}

const fn belongs_to(
    name: &'static str,
    target: RecordKind,
    fk_column: &'static str,
) -> AssociationDecl {
    AssociationDecl {
        name,
        target,
        kind: AssociationKind::BelongsTo { fk_column },
    }
}

const fn has_many(
    name: &'static str,
    target: RecordKind,
    fk_column: &'static str,
) -> AssociationDecl {
    AssociationDecl {
        name,
        target,
        kind: AssociationKind::HasMany { fk_column },
    }
}

const fn many_to_many(
    name: &'static str,
    target: RecordKind,
    join_table: &'static str,
    left_column: &'static str,
    right_column: &'static str,
) -> AssociationDecl {
    AssociationDecl {
        name,
        target,
        kind: AssociationKind::ManyToMany {
            join_table,
            left_column,
            right_column,
        },
    }
}

const APPROVER_ASSOCS: &[AssociationDecl] = &[has_many(
    "revisions",
    RecordKind::ApproverRevision,
    "approver_id",
)];

const APPROVER_REVISION_ASSOCS: &[AssociationDecl] = &[
    belongs_to("approver", RecordKind::Approver, "approver_id"),
    many_to_many(
        "required_approver_sets",
        RecordKind::ApproverSet,
        "approver_revision_required_sets",
        "revision_id",
        "approver_set_id",
    ),
    many_to_many(
        "informed_approver_sets",
        RecordKind::ApproverSet,
        "approver_revision_informed_sets",
        "revision_id",
        "approver_set_id",
    ),
];

const APPROVER_SET_ASSOCS: &[AssociationDecl] = &[has_many(
    "revisions",
    RecordKind::ApproverSetRevision,
    "approver_set_id",
)];

const APPROVER_SET_REVISION_ASSOCS: &[AssociationDecl] = &[
    belongs_to("approver_set", RecordKind::ApproverSet, "approver_set_id"),
    many_to_many(
        "members",
        RecordKind::Approver,
        "approver_set_revision_members",
        "revision_id",
        "approver_id",
    ),
    many_to_many(
        "required_approver_sets",
        RecordKind::ApproverSet,
        "approver_set_revision_required_sets",
        "revision_id",
        "approver_set_id",
    ),
    many_to_many(
        "informed_approver_sets",
        RecordKind::ApproverSet,
        "approver_set_revision_informed_sets",
        "revision_id",
        "approver_set_id",
    ),
];

const API_USER_ASSOCS: &[AssociationDecl] = &[has_many(
    "revisions",
    RecordKind::ApiUserRevision,
    "api_user_id",
)];

const API_USER_REVISION_ASSOCS: &[AssociationDecl] = &[
    belongs_to("api_user", RecordKind::ApiUser, "api_user_id"),
    many_to_many(
        "required_approver_sets",
        RecordKind::ApproverSet,
        "api_user_revision_required_sets",
        "revision_id",
        "approver_set_id",
    ),
    many_to_many(
        "informed_approver_sets",
        RecordKind::ApproverSet,
        "api_user_revision_informed_sets",
        "revision_id",
        "approver_set_id",
    ),
];

const CONTACT_ASSOCS: &[AssociationDecl] = &[has_many(
    "revisions",
    RecordKind::ContactRevision,
    "contact_id",
)];

const CONTACT_REVISION_ASSOCS: &[AssociationDecl] = &[
    belongs_to("contact", RecordKind::Contact, "contact_id"),
    many_to_many(
        "required_approver_sets",
        RecordKind::ApproverSet,
        "contact_revision_required_sets",
        "revision_id",
        "approver_set_id",
    ),
    many_to_many(
        "informed_approver_sets",
        RecordKind::ApproverSet,
        "contact_revision_informed_sets",
        "revision_id",
        "approver_set_id",
    ),
];

const DOMAIN_ASSOCS: &[AssociationDecl] = &[has_many(
    "revisions",
    RecordKind::DomainRevision,
    "domain_id",
)];

const DOMAIN_REVISION_ASSOCS: &[AssociationDecl] = &[
    belongs_to("domain", RecordKind::Domain, "domain_id"),
    many_to_many(
        "required_approver_sets",
        RecordKind::ApproverSet,
        "domain_revision_required_sets",
        "revision_id",
        "approver_set_id",
    ),
    many_to_many(
        "informed_approver_sets",
        RecordKind::ApproverSet,
        "domain_revision_informed_sets",
        "revision_id",
        "approver_set_id",
    ),
];

const HOST_ASSOCS: &[AssociationDecl] =
    &[has_many("revisions", RecordKind::HostRevision, "host_id")];

const HOST_REVISION_ASSOCS: &[AssociationDecl] = &[
    belongs_to("host", RecordKind::Host, "host_id"),
    many_to_many(
        "required_approver_sets",
        RecordKind::ApproverSet,
        "host_revision_required_sets",
        "revision_id",
        "approver_set_id",
    ),
    many_to_many(
        "informed_approver_sets",
        RecordKind::ApproverSet,
        "host_revision_informed_sets",
        "revision_id",
        "approver_set_id",
    ),
];

const CHANGE_REQUEST_ASSOCS: &[AssociationDecl] = &[has_many(
    "approvals",
    RecordKind::Approval,
    "change_request_id",
)];

const APPROVAL_ASSOCS: &[AssociationDecl] = &[belongs_to(
    "change_request",
    RecordKind::ChangeRequest,
    "change_request_id",
)];

impl RecordKind {
    /// Every persisted kind, in schema-ensure order.
    pub const ALL: [RecordKind; 14] = [
        RecordKind::Approver,
        RecordKind::ApproverRevision,
        RecordKind::ApproverSet,
        RecordKind::ApproverSetRevision,
        RecordKind::ApiUser,
        RecordKind::ApiUserRevision,
        RecordKind::Contact,
        RecordKind::ContactRevision,
        RecordKind::Domain,
        RecordKind::DomainRevision,
        RecordKind::Host,
        RecordKind::HostRevision,
        RecordKind::ChangeRequest,
        RecordKind::Approval,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Approver => "approvers",
            RecordKind::ApproverRevision => "approver_revisions",
            RecordKind::ApproverSet => "approver_sets",
            RecordKind::ApproverSetRevision => "approver_set_revisions",
            RecordKind::ApiUser => "api_users",
            RecordKind::ApiUserRevision => "api_user_revisions",
            RecordKind::Contact => "contacts",
            RecordKind::ContactRevision => "contact_revisions",
            RecordKind::Domain => "domains",
            RecordKind::DomainRevision => "domain_revisions",
            RecordKind::Host => "hosts",
            RecordKind::HostRevision => "host_revisions",
            RecordKind::ChangeRequest => "change_requests",
            RecordKind::Approval => "approvals",
        }
    }

    /// The declared association edges of this kind.
    pub fn associations(&self) -> &'static [AssociationDecl] {
        match self {
            RecordKind::Approver => APPROVER_ASSOCS,
            RecordKind::ApproverRevision => APPROVER_REVISION_ASSOCS,
            RecordKind::ApproverSet => APPROVER_SET_ASSOCS,
            RecordKind::ApproverSetRevision => APPROVER_SET_REVISION_ASSOCS,
            RecordKind::ApiUser => API_USER_ASSOCS,
            RecordKind::ApiUserRevision => API_USER_REVISION_ASSOCS,
            RecordKind::Contact => CONTACT_ASSOCS,
            RecordKind::ContactRevision => CONTACT_REVISION_ASSOCS,
            RecordKind::Domain => DOMAIN_ASSOCS,
            RecordKind::DomainRevision => DOMAIN_REVISION_ASSOCS,
            RecordKind::Host => HOST_ASSOCS,
            RecordKind::HostRevision => HOST_REVISION_ASSOCS,
            RecordKind::ChangeRequest => CHANGE_REQUEST_ASSOCS,
            RecordKind::Approval => APPROVAL_ASSOCS,
        }
    }

    /// Look up one association edge by name.
    pub fn association(&self, name: &str) -> Option<&'static AssociationDecl> {
        self.associations().iter().find(|decl| decl.name == name)
    }

    /// True for the revision kinds (as opposed to top-level objects).
    pub fn is_revision(&self) -> bool {
        matches!(
            self,
            RecordKind::ApproverRevision
                | RecordKind::ApproverSetRevision
                | RecordKind::ApiUserRevision
                | RecordKind::ContactRevision
                | RecordKind::DomainRevision
                | RecordKind::HostRevision
        )
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}
