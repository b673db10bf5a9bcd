//! State enums for revisions, objects, change requests and approvals.
//!
//! Serialized names match the lowercase wire names the registrar has always
//! exported; attestations signed against old exports keep verifying.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevisionState {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "pendingapproval")]
    PendingApproval,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "inactive")]
    Inactive,
    #[serde(rename = "external")]
    External,
    #[serde(rename = "bootstrap")]
    Bootstrap,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "approvalfailed")]
    ApprovalFailed,
    #[serde(rename = "superseded")]
    Superseded,
}

impl RevisionState {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RevisionState::Cancelled | RevisionState::ApprovalFailed | RevisionState::Superseded
        )
    }

    /// States in which a revision is the operating truth for its parent.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            RevisionState::Active
                | RevisionState::Inactive
                | RevisionState::External
                | RevisionState::Bootstrap
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionState::New => "new",
            RevisionState::PendingApproval => "pendingapproval",
            RevisionState::Active => "active",
            RevisionState::Inactive => "inactive",
            RevisionState::External => "external",
            RevisionState::Bootstrap => "bootstrap",
            RevisionState::Cancelled => "cancelled",
            RevisionState::ApprovalFailed => "approvalfailed",
            RevisionState::Superseded => "superseded",
        }
    }
}

impl std::fmt::Display for RevisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operational state a revision pushes its parent into once promoted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesiredState {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "inactive")]
    Inactive,
    #[serde(rename = "external")]
    External,
    #[serde(rename = "bootstrap")]
    Bootstrap,
}

impl DesiredState {
    /// The revision state a promotion lands in.
    pub fn revision_state(&self) -> RevisionState {
        match self {
            DesiredState::Active => RevisionState::Active,
            DesiredState::Inactive => RevisionState::Inactive,
            DesiredState::External => RevisionState::External,
            DesiredState::Bootstrap => RevisionState::Bootstrap,
        }
    }

    /// The parent-object state while a revision with this target is in
    /// approval.
    pub fn pending_entity_state(&self) -> EntityState {
        match self {
            DesiredState::Active => EntityState::ActivePendingApproval,
            DesiredState::Inactive => EntityState::InactivePendingApproval,
            DesiredState::External => EntityState::ExternalPendingApproval,
            DesiredState::Bootstrap => EntityState::PendingBootstrap,
        }
    }

    /// The parent-object state once a revision with this target is current.
    pub fn settled_entity_state(&self) -> EntityState {
        match self {
            DesiredState::Active => EntityState::Active,
            DesiredState::Inactive => EntityState::Inactive,
            DesiredState::External => EntityState::External,
            DesiredState::Bootstrap => EntityState::Bootstrap,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredState::Active => "active",
            DesiredState::Inactive => "inactive",
            DesiredState::External => "external",
            DesiredState::Bootstrap => "bootstrap",
        }
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived state of a top-level registry object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "inactive")]
    Inactive,
    #[serde(rename = "external")]
    External,
    #[serde(rename = "bootstrap")]
    Bootstrap,
    #[serde(rename = "activependingapproval")]
    ActivePendingApproval,
    #[serde(rename = "inactivependingapproval")]
    InactivePendingApproval,
    #[serde(rename = "externalpendingapproval")]
    ExternalPendingApproval,
    #[serde(rename = "pendingbootstrap")]
    PendingBootstrap,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityState::New => "new",
            EntityState::Active => "active",
            EntityState::Inactive => "inactive",
            EntityState::External => "external",
            EntityState::Bootstrap => "bootstrap",
            EntityState::ActivePendingApproval => "activependingapproval",
            EntityState::InactivePendingApproval => "inactivependingapproval",
            EntityState::ExternalPendingApproval => "externalpendingapproval",
            EntityState::PendingBootstrap => "pendingbootstrap",
        }
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a change request, derived from its approvals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeRequestState {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "pendingapproval")]
    PendingApproval,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "declined")]
    Declined,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl ChangeRequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChangeRequestState::Approved
                | ChangeRequestState::Declined
                | ChangeRequestState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeRequestState::New => "new",
            ChangeRequestState::PendingApproval => "pendingapproval",
            ChangeRequestState::Approved => "approved",
            ChangeRequestState::Declined => "declined",
            ChangeRequestState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ChangeRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one approval on a change request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "pendingapproval")]
    PendingApproval,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "declined")]
    Declined,
    #[serde(rename = "cancelled")]
    Cancelled,
    /// The approver set has no usable signer keys right now.
    #[serde(rename = "novalidapprovers")]
    NoValidApprovers,
    /// The approver set itself has no live revision.
    #[serde(rename = "inactiveapproverset")]
    InactiveApproverSet,
    #[serde(rename = "skippednovalidapprovers")]
    SkippedNoValidApprovers,
    #[serde(rename = "skippedinactiveapproverset")]
    SkippedInactiveApproverSet,
}

impl ApprovalState {
    /// An approval that no longer blocks the change request.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            ApprovalState::Approved
                | ApprovalState::NoValidApprovers
                | ApprovalState::InactiveApproverSet
                | ApprovalState::SkippedNoValidApprovers
                | ApprovalState::SkippedInactiveApproverSet
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApprovalState::Approved
                | ApprovalState::Declined
                | ApprovalState::Cancelled
                | ApprovalState::SkippedNoValidApprovers
                | ApprovalState::SkippedInactiveApproverSet
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::New => "new",
            ApprovalState::PendingApproval => "pendingapproval",
            ApprovalState::Approved => "approved",
            ApprovalState::Declined => "declined",
            ApprovalState::Cancelled => "cancelled",
            ApprovalState::NoValidApprovers => "novalidapprovers",
            ApprovalState::InactiveApproverSet => "inactiveapproverset",
            ApprovalState::SkippedNoValidApprovers => "skippednovalidapprovers",
            ApprovalState::SkippedInactiveApproverSet => "skippedinactiveapproverset",
        }
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verb an approver attests to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalAction {
    #[serde(rename = "approve")]
    Approve,
    #[serde(rename = "decline")]
    Decline,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Approve => "approve",
            ApprovalAction::Decline => "decline",
        }
    }
}

impl std::fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_state_wire_names() {
        let json = serde_json::to_string(&RevisionState::PendingApproval).unwrap();
        assert_eq!(json, "\"pendingapproval\"");

        let parsed: RevisionState = serde_json::from_str("\"approvalfailed\"").unwrap();
        assert_eq!(parsed, RevisionState::ApprovalFailed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(RevisionState::Cancelled.is_terminal());
        assert!(RevisionState::Superseded.is_terminal());
        assert!(RevisionState::ApprovalFailed.is_terminal());
        assert!(!RevisionState::PendingApproval.is_terminal());
        assert!(!RevisionState::Active.is_terminal());
    }

    #[test]
    fn test_desired_state_mappings() {
        assert_eq!(
            DesiredState::Active.pending_entity_state(),
            EntityState::ActivePendingApproval
        );
        assert_eq!(
            DesiredState::Bootstrap.pending_entity_state(),
            EntityState::PendingBootstrap
        );
        assert_eq!(
            DesiredState::Inactive.revision_state(),
            RevisionState::Inactive
        );
    }

    #[test]
    fn test_approval_resolution() {
        assert!(ApprovalState::Approved.is_resolved());
        assert!(ApprovalState::SkippedInactiveApproverSet.is_resolved());
        assert!(!ApprovalState::Declined.is_resolved());
        assert!(!ApprovalState::PendingApproval.is_resolved());
    }

    #[test]
    fn test_entity_state_wire_names() {
        assert_eq!(
            EntityState::ActivePendingApproval.as_str(),
            "activependingapproval"
        );
        let parsed: EntityState = serde_json::from_str("\"pendingbootstrap\"").unwrap();
        assert_eq!(parsed, EntityState::PendingBootstrap);
    }

    #[test]
    fn test_action_round_trip() {
        let json = serde_json::to_string(&ApprovalAction::Decline).unwrap();
        assert_eq!(json, "\"decline\"");
        let parsed: ApprovalAction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ApprovalAction::Decline);
    }
}
