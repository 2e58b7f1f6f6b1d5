//! Electronic-signature gate required ahead of committing transitions.
//!
//! One gate instance serves one signing interaction: it opens awaiting
//! input, then ends Confirmed or Cancelled and is never reused. A bad
//! credential keeps the gate open for retry. Only a confirmed gate can mint
//! a [`SignatureGrant`], which is what repositories demand for
//! signature-gated actions, so an unsigned commit is unrepresentable.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::user::User;

/// Declared legal intent of a signature (21 CFR Part 11 style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureMeaning {
    Authorship,
    Review,
    Approval,
    Verification,
    Witnessing,
    TechnicalRelease,
    LineClearance,
}

impl fmt::Display for SignatureMeaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignatureMeaning::Authorship => "Authorship",
            SignatureMeaning::Review => "Review",
            SignatureMeaning::Approval => "Approval",
            SignatureMeaning::Verification => "Verification",
            SignatureMeaning::Witnessing => "Witnessing",
            SignatureMeaning::TechnicalRelease => "Technical Release",
            SignatureMeaning::LineClearance => "Line Clearance",
        };
        f.write_str(label)
    }
}

/// Contemporaneous remark pre-filled for the signer.
pub const DEFAULT_REMARK: &str =
    "I certify that I have reviewed this record and found it to be accurate and compliant with site SOPs.";

/// Credential check behind the gate. The in-repo implementation is a shared
/// static secret; a production deployment swaps in a real identity backend
/// without touching the gate's state machine.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, user: &User, secret: &str) -> bool;
}

pub struct StaticSecret {
    secret: String,
}

impl StaticSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

impl CredentialVerifier for StaticSecret {
    fn verify(&self, _user: &User, secret: &str) -> bool {
        secret == self.secret
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    AwaitingInput,
    Confirmed,
    Cancelled,
}

/// Proof of a confirmed signature. Constructed only by
/// [`SignatureGate::confirm`]. Not serializable: a grant must come from a
/// live gate, never from stored data.
#[derive(Debug, Clone)]
pub struct SignatureGrant {
    signed_by: String,
    signed_at: DateTime<Utc>,
    meaning: SignatureMeaning,
    reason: String,
    action: String,
}

impl SignatureGrant {
    pub fn signed_by(&self) -> &str {
        &self.signed_by
    }

    pub fn signed_at(&self) -> DateTime<Utc> {
        self.signed_at
    }

    pub fn meaning(&self) -> SignatureMeaning {
        self.meaning
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The action description the signer saw when confirming.
    pub fn action(&self) -> &str {
        &self.action
    }
}

pub struct SignatureGate {
    action: String,
    default_meaning: SignatureMeaning,
    state: GateState,
    verifier: Arc<dyn CredentialVerifier>,
}

impl SignatureGate {
    pub fn open(
        action: impl Into<String>,
        default_meaning: SignatureMeaning,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            action: action.into(),
            default_meaning,
            state: GateState::AwaitingInput,
            verifier,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn default_meaning(&self) -> SignatureMeaning {
        self.default_meaning
    }

    pub fn is_open(&self) -> bool {
        self.state == GateState::AwaitingInput
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == GateState::Cancelled
    }

    /// Check the credential and close the gate. A mismatch reports
    /// [`Error::CredentialMismatch`] and leaves the gate open for retry; a
    /// gate that already ended refuses further input.
    pub fn confirm(
        &mut self,
        user: &User,
        credential: &str,
        reason: impl Into<String>,
        meaning: SignatureMeaning,
    ) -> Result<SignatureGrant> {
        if self.state != GateState::AwaitingInput {
            return Err(Error::validation("signature gate already closed"));
        }
        if !self.verifier.verify(user, credential) {
            return Err(Error::CredentialMismatch);
        }
        self.state = GateState::Confirmed;
        Ok(SignatureGrant {
            signed_by: user.username.clone(),
            signed_at: Utc::now(),
            meaning,
            reason: reason.into(),
            action: self.action.clone(),
        })
    }

    /// Abort the interaction. Idempotent; cancelling twice is a no-op, and a
    /// cancelled gate can never confirm.
    pub fn cancel(&mut self) {
        if self.state == GateState::AwaitingInput {
            self.state = GateState::Cancelled;
        }
    }
}
