//! Shared vocabulary for the CCR clinical coding review client.
//!
//! This crate defines the small, dependency-light types every other crate
//! agrees on:
//! - [`EpisodeStatus`] with its numeric wire form
//! - [`Role`] claims carried by a signed-in account
//! - [`WorkflowAction`] and the pure [`permitted_actions`] gating table
//!
//! Workflow execution, HTTP, and token handling live elsewhere; nothing in
//! this crate performs I/O.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Errors that can occur when translating status values from the wire.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// The numeric status value is outside the defined range.
    #[error("unknown episode status value: {0}")]
    Unknown(u8),
}

/// Lifecycle state of a coding episode.
///
/// The backend encodes this as a bare number, so the wire form is numeric
/// on both serialize and deserialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EpisodeStatus {
    #[default]
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl EpisodeStatus {
    /// Human-readable label for display output.
    pub fn label(&self) -> &'static str {
        match self {
            EpisodeStatus::Draft => "Draft",
            EpisodeStatus::Submitted => "Submitted",
            EpisodeStatus::Approved => "Approved",
            EpisodeStatus::Rejected => "Rejected",
        }
    }

    /// Whether any workflow transition is defined out of this status.
    ///
    /// Approved and Rejected are terminal: nothing moves an episode out of
    /// them (reverting codes does not change status).
    pub fn is_terminal(&self) -> bool {
        matches!(self, EpisodeStatus::Approved | EpisodeStatus::Rejected)
    }
}

impl From<EpisodeStatus> for u8 {
    fn from(status: EpisodeStatus) -> u8 {
        match status {
            EpisodeStatus::Draft => 0,
            EpisodeStatus::Submitted => 1,
            EpisodeStatus::Approved => 2,
            EpisodeStatus::Rejected => 3,
        }
    }
}

impl TryFrom<u8> for EpisodeStatus {
    type Error = StatusError;

    fn try_from(value: u8) -> Result<Self, StatusError> {
        match value {
            0 => Ok(EpisodeStatus::Draft),
            1 => Ok(EpisodeStatus::Submitted),
            2 => Ok(EpisodeStatus::Approved),
            3 => Ok(EpisodeStatus::Rejected),
            other => Err(StatusError::Unknown(other)),
        }
    }
}

impl std::fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Authorization claim carried by a signed-in account.
///
/// Claims arrive as free strings from the identity provider; unrecognized
/// claims are ignored rather than rejected so new backend roles do not
/// break older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Coder,
    Reviewer,
}

impl Role {
    /// Parse a role claim string, returning `None` for unknown claims.
    pub fn from_claim(claim: &str) -> Option<Self> {
        match claim {
            "Coder" => Some(Role::Coder),
            "Reviewer" => Some(Role::Reviewer),
            _ => None,
        }
    }

    /// The claim string used on the wire.
    pub fn as_claim(&self) -> &'static str {
        match self {
            Role::Coder => "Coder",
            Role::Reviewer => "Reviewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_claim())
    }
}

/// Workflow intents a user can issue against an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkflowAction {
    /// Move a Draft episode to Submitted.
    Submit,
    /// Move a Submitted episode to Approved.
    Approve,
    /// Move a Submitted episode to Rejected.
    Reject,
    /// Draft a clinician query for the episode.
    Query,
    /// Load the live code diff for the episode.
    Diff,
    /// Restore the episode's codes to the "old" snapshot of a loaded diff.
    Revert,
}

/// The role × status gating table, as a pure function.
///
/// - `Submit` requires `Coder` and status Draft.
/// - `Approve`/`Reject` require `Reviewer` and status Submitted.
/// - `Query` requires `Coder` at any status.
/// - `Revert` requires `Reviewer` at any status.
/// - `Diff` requires no role (the session requirement is enforced at the
///   transport layer, not here).
///
/// No transition is offered out of Approved or Rejected.
pub fn permitted_actions(roles: &[Role], status: EpisodeStatus) -> BTreeSet<WorkflowAction> {
    let mut actions = BTreeSet::new();
    actions.insert(WorkflowAction::Diff);

    if roles.contains(&Role::Coder) {
        actions.insert(WorkflowAction::Query);
        if status == EpisodeStatus::Draft {
            actions.insert(WorkflowAction::Submit);
        }
    }

    if roles.contains(&Role::Reviewer) {
        actions.insert(WorkflowAction::Revert);
        if status == EpisodeStatus::Submitted {
            actions.insert(WorkflowAction::Approve);
            actions.insert(WorkflowAction::Reject);
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_values_round_trip() {
        for status in [
            EpisodeStatus::Draft,
            EpisodeStatus::Submitted,
            EpisodeStatus::Approved,
            EpisodeStatus::Rejected,
        ] {
            let wire = u8::from(status);
            assert_eq!(EpisodeStatus::try_from(wire).expect("known value"), status);
        }
    }

    #[test]
    fn status_rejects_unknown_wire_value() {
        let err = EpisodeStatus::try_from(7).expect_err("should reject 7");
        assert!(matches!(err, StatusError::Unknown(7)));
    }

    #[test]
    fn status_deserializes_from_bare_number() {
        let status: EpisodeStatus = serde_json::from_str("1").expect("parse");
        assert_eq!(status, EpisodeStatus::Submitted);
        assert_eq!(serde_json::to_string(&status).expect("render"), "1");
    }

    #[test]
    fn terminal_statuses() {
        assert!(!EpisodeStatus::Draft.is_terminal());
        assert!(!EpisodeStatus::Submitted.is_terminal());
        assert!(EpisodeStatus::Approved.is_terminal());
        assert!(EpisodeStatus::Rejected.is_terminal());
    }

    #[test]
    fn role_claims_parse_and_ignore_unknown() {
        assert_eq!(Role::from_claim("Coder"), Some(Role::Coder));
        assert_eq!(Role::from_claim("Reviewer"), Some(Role::Reviewer));
        assert_eq!(Role::from_claim("Auditor"), None);
        assert_eq!(Role::from_claim(""), None);
    }

    #[test]
    fn coder_can_submit_only_from_draft() {
        let coder = [Role::Coder];
        assert!(permitted_actions(&coder, EpisodeStatus::Draft).contains(&WorkflowAction::Submit));
        for status in [
            EpisodeStatus::Submitted,
            EpisodeStatus::Approved,
            EpisodeStatus::Rejected,
        ] {
            assert!(!permitted_actions(&coder, status).contains(&WorkflowAction::Submit));
        }
    }

    #[test]
    fn reviewer_can_approve_or_reject_only_from_submitted() {
        let reviewer = [Role::Reviewer];
        let submitted = permitted_actions(&reviewer, EpisodeStatus::Submitted);
        assert!(submitted.contains(&WorkflowAction::Approve));
        assert!(submitted.contains(&WorkflowAction::Reject));

        for status in [
            EpisodeStatus::Draft,
            EpisodeStatus::Approved,
            EpisodeStatus::Rejected,
        ] {
            let actions = permitted_actions(&reviewer, status);
            assert!(!actions.contains(&WorkflowAction::Approve));
            assert!(!actions.contains(&WorkflowAction::Reject));
        }
    }

    #[test]
    fn query_requires_coder_regardless_of_status() {
        for status in [
            EpisodeStatus::Draft,
            EpisodeStatus::Submitted,
            EpisodeStatus::Approved,
            EpisodeStatus::Rejected,
        ] {
            assert!(permitted_actions(&[Role::Coder], status).contains(&WorkflowAction::Query));
            assert!(!permitted_actions(&[Role::Reviewer], status).contains(&WorkflowAction::Query));
        }
    }

    #[test]
    fn no_transitions_out_of_terminal_statuses() {
        let both = [Role::Coder, Role::Reviewer];
        for status in [EpisodeStatus::Approved, EpisodeStatus::Rejected] {
            let actions = permitted_actions(&both, status);
            assert!(!actions.contains(&WorkflowAction::Submit));
            assert!(!actions.contains(&WorkflowAction::Approve));
            assert!(!actions.contains(&WorkflowAction::Reject));
        }
    }

    #[test]
    fn diff_needs_no_role() {
        assert!(permitted_actions(&[], EpisodeStatus::Draft).contains(&WorkflowAction::Diff));
    }
}
