//! Generic record repository: persistence, status transitions and audit
//! pairing shared by every module.
//!
//! Each module supplies a record type implementing [`ManagedRecord`] and a
//! static [`WorkflowSpec`]; the repository supplies the uniform operations
//! (insert, list, find, transition, update, delete) and guarantees that
//! every successful mutation is paired with exactly one audit entry. The
//! collection is re-read from the store on every call; the persisted
//! collection is the source of truth, never an in-memory cache.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditMeta, AuditTrail};
use crate::error::{Error, Result};
use crate::signature::SignatureGrant;
use crate::store::KvStore;
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

/// Module kinds a weak reference can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    Deviation,
    Capa,
    AuditRecord,
    RiskEntry,
    Oos,
    Recall,
    ChangeRequest,
    StabilityStudy,
    InventoryItem,
    LimsSample,
    Coa,
    Mfr,
    Bmr,
}

/// Weak cross-module reference by display code. The referenced record may
/// have been deleted since; dereferencing is allowed to fail and a dangling
/// reference is legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: RefKind,
    pub code: String,
}

impl RecordRef {
    pub fn new(kind: RefKind, code: impl Into<String>) -> Self {
        Self { kind, code: code.into() }
    }
}

/// Record shape the generic repository can manage.
pub trait ManagedRecord: Serialize + DeserializeOwned + Clone {
    /// Module name written into the audit ledger, e.g. "Deviations".
    const MODULE: &'static str;
    /// Singular display noun, e.g. "Deviation".
    const NOUN: &'static str;
    /// Store key of this module's collection.
    const COLLECTION: &'static str;

    fn workflow() -> &'static WorkflowSpec;

    fn id(&self) -> &str;
    fn number(&self) -> &str;
    fn status(&self) -> Status;
    fn set_status(&mut self, status: Status);

    /// Stamp record-specific dates after a status change (closure date,
    /// verification date). Default: nothing to stamp.
    fn on_transition(&mut self, _to: Status, _date: NaiveDate, _user: &User) {}

    /// Fields scanned by the free-text filter.
    fn search_text(&self) -> Vec<&str>;
}

/// List filter: free text over a module's searchable fields plus status
/// equality. Both optional; an empty filter matches everything.
#[derive(Debug, Default, Clone)]
pub struct Filter {
    pub text: Option<String>,
    pub status: Option<Status>,
}

impl Filter {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), status: None }
    }

    pub fn status(status: Status) -> Self {
        Self { text: None, status: Some(status) }
    }

    pub fn matches<R: ManagedRecord>(&self, record: &R) -> bool {
        if let Some(status) = self.status {
            if record.status() != status {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !record
                .search_text()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }
}

pub struct Repository<R: ManagedRecord> {
    store: Arc<dyn KvStore>,
    audit: AuditTrail,
    _record: PhantomData<R>,
}

impl<R: ManagedRecord> Repository<R> {
    pub fn new(store: Arc<dyn KvStore>, audit: AuditTrail) -> Self {
        Self { store, audit, _record: PhantomData }
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// The whole collection, insertion order, newest first.
    pub fn list(&self) -> Result<Vec<R>> {
        match self.store.get(R::COLLECTION)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::Storage(format!("collection '{}' corrupt: {e}", R::COLLECTION))
            }),
            None => Ok(Vec::new()),
        }
    }

    pub fn list_filtered(&self, filter: &Filter) -> Result<Vec<R>> {
        Ok(self.list()?.into_iter().filter(|r| filter.matches(r)).collect())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    pub fn find(&self, id: &str) -> Result<R> {
        self.list()?
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| Error::NotFound { entity: R::NOUN, id: id.to_string() })
    }

    /// Look a record up by its display number (weak-reference dereference).
    pub fn find_by_number(&self, number: &str) -> Result<R> {
        self.list()?
            .into_iter()
            .find(|r| r.number() == number)
            .ok_or_else(|| Error::NotFound { entity: R::NOUN, id: number.to_string() })
    }

    /// Persist a freshly created record and write its creation audit entry.
    pub fn insert(&self, record: R, user: &User, action: &str, details: String) -> Result<R> {
        let mut all = self.list()?;
        all.insert(0, record.clone());
        self.save(&all)?;
        self.audit.record(
            user,
            action,
            R::MODULE,
            details,
            AuditMeta {
                record_id: Some(record.id().to_string()),
                new_value: serde_json::to_value(&record).ok(),
                ..Default::default()
            },
        )?;
        tracing::info!(
            target: "pharmaqualify",
            module = R::MODULE,
            id = record.id(),
            number = record.number(),
            "record created"
        );
        Ok(record)
    }

    /// Apply a status action. Guard order: authorization, then signature
    /// capture, then table legality, so the caller can tell refusals apart.
    /// Signature-gated actions demand a grant minted by a confirmed gate;
    /// the grant's remark flows into the audit entry as the reason.
    pub fn transition(
        &self,
        id: &str,
        action: Action,
        user: &User,
        signature: Option<&SignatureGrant>,
    ) -> Result<R> {
        let spec = R::workflow();
        if spec.requires_admin(action) && !user.role.is_admin() {
            return Err(Error::Unauthorized {
                user: user.username.clone(),
                action: format!("{action} {}", R::NOUN),
            });
        }
        if spec.requires_signature(action) && signature.is_none() {
            return Err(Error::SignatureRequired { action });
        }

        let mut all = self.list()?;
        let slot = all
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| Error::NotFound { entity: R::NOUN, id: id.to_string() })?;
        let previous = serde_json::to_value(&*slot).ok();

        let next = spec.apply(slot.status(), action, user)?;
        slot.set_status(next);
        slot.on_transition(next, Utc::now().date_naive(), user);
        let updated = slot.clone();

        self.save(&all)?;
        self.audit.record(
            user,
            &format!("{} {}", action.past_tense(), R::NOUN),
            R::MODULE,
            format!("{} {} moved to {}", R::NOUN, updated.number(), next),
            AuditMeta {
                record_id: Some(id.to_string()),
                previous_value: previous,
                new_value: serde_json::to_value(&updated).ok(),
                reason: signature.map(|grant| grant.reason().to_string()),
            },
        )?;
        tracing::info!(
            target: "pharmaqualify",
            module = R::MODULE,
            id,
            %action,
            status = %next,
            "status transition"
        );
        Ok(updated)
    }

    /// Field-level mutation outside the status machine (weak links,
    /// re-assessment, step sign-offs). Replaces the stored record by id and
    /// writes before/after snapshots.
    pub fn update(
        &self,
        record: R,
        user: &User,
        action: &str,
        details: String,
        reason: Option<String>,
    ) -> Result<R> {
        let mut all = self.list()?;
        let slot = all
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| Error::NotFound { entity: R::NOUN, id: record.id().to_string() })?;
        let previous = serde_json::to_value(&*slot).ok();
        *slot = record.clone();

        self.save(&all)?;
        self.audit.record(
            user,
            action,
            R::MODULE,
            details,
            AuditMeta {
                record_id: Some(record.id().to_string()),
                previous_value: previous,
                new_value: serde_json::to_value(&record).ok(),
                reason,
            },
        )?;
        Ok(record)
    }

    /// Remove a record. Admin-only in every module; the full previous value
    /// goes into the ledger so proof of existence survives the removal.
    pub fn delete(&self, id: &str, user: &User) -> Result<()> {
        if !user.role.is_admin() {
            return Err(Error::Unauthorized {
                user: user.username.clone(),
                action: format!("Delete {}", R::NOUN),
            });
        }
        let mut all = self.list()?;
        let position = all
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| Error::NotFound { entity: R::NOUN, id: id.to_string() })?;
        let removed = all.remove(position);

        self.save(&all)?;
        self.audit.record(
            user,
            &format!("Deleted {}", R::NOUN),
            R::MODULE,
            format!("{} {} deleted", R::NOUN, removed.number()),
            AuditMeta {
                record_id: Some(id.to_string()),
                previous_value: serde_json::to_value(&removed).ok(),
                ..Default::default()
            },
        )?;
        tracing::info!(target: "pharmaqualify", module = R::MODULE, id, "record deleted");
        Ok(())
    }

    fn save(&self, all: &[R]) -> Result<()> {
        self.store.set(R::COLLECTION, &serde_json::to_string(all)?)
    }
}
