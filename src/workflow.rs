//! Shared status vocabulary and the per-module transition tables.
//!
//! Every module instantiates the same machine shape: an initial status, a
//! static `(from, action, to)` table, and the subsets of actions that are
//! admin-only or e-signature-gated. [`WorkflowSpec::apply`] is pure state
//! computation; the repository layer pairs each successful transition with
//! its audit entry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    InProgress,
    Approved,
    Completed,
    Closed,
    Ongoing,
    Stopped,
    Logged,
    Testing,
    Review,
    Released,
    Rejected,
    Quarantine,
    Draft,
    Issued,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Approved => "Approved",
            Status::Completed => "Completed",
            Status::Closed => "Closed",
            Status::Ongoing => "Ongoing",
            Status::Stopped => "Stopped",
            Status::Logged => "Logged",
            Status::Testing => "Testing",
            Status::Review => "Review",
            Status::Released => "Released",
            Status::Rejected => "Rejected",
            Status::Quarantine => "Quarantine",
            Status::Draft => "Draft",
            Status::Issued => "Issued",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Start,
    Approve,
    Complete,
    Close,
    Stop,
    Advance,
    Release,
    Reject,
    Issue,
}

impl Action {
    /// Past-tense label used when composing audit actions, e.g.
    /// "Approved Deviation".
    pub fn past_tense(self) -> &'static str {
        match self {
            Action::Start => "Started",
            Action::Approve => "Approved",
            Action::Complete => "Completed",
            Action::Close => "Closed",
            Action::Stop => "Stopped",
            Action::Advance => "Advanced",
            Action::Release => "Released",
            Action::Reject => "Rejected",
            Action::Issue => "Issued",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Start => "Start",
            Action::Approve => "Approve",
            Action::Complete => "Complete",
            Action::Close => "Close",
            Action::Stop => "Stop",
            Action::Advance => "Advance",
            Action::Release => "Release",
            Action::Reject => "Reject",
            Action::Issue => "Issue",
        };
        f.write_str(label)
    }
}

/// One module's status machine, declared as static data.
pub struct WorkflowSpec {
    pub initial: Status,
    pub transitions: &'static [(Status, Action, Status)],
    pub admin_actions: &'static [Action],
    pub signed_actions: &'static [Action],
}

impl WorkflowSpec {
    pub fn next(&self, from: Status, action: Action) -> Option<Status> {
        self.transitions
            .iter()
            .find(|(f, a, _)| *f == from && *a == action)
            .map(|(_, _, to)| *to)
    }

    pub fn requires_admin(&self, action: Action) -> bool {
        self.admin_actions.contains(&action)
    }

    pub fn requires_signature(&self, action: Action) -> bool {
        self.signed_actions.contains(&action)
    }

    /// A status with no outgoing transitions is terminal for this module.
    pub fn is_terminal(&self, status: Status) -> bool {
        !self.transitions.iter().any(|(from, _, _)| *from == status)
    }

    /// Compute the successor status. Authorization is checked before
    /// legality so an unauthorized caller learns nothing about the table.
    pub fn apply(&self, from: Status, action: Action, user: &User) -> Result<Status> {
        if self.requires_admin(action) && !user.role.is_admin() {
            return Err(Error::Unauthorized {
                user: user.username.clone(),
                action: action.to_string(),
            });
        }
        self.next(from, action)
            .ok_or(Error::InvalidTransition { from, action })
    }
}
