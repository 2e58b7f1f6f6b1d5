//! Append-only audit ledger: who did what, when, to which record.
//!
//! Every state-changing operation routed through a repository writes exactly
//! one entry here. Entries are never edited or removed; the ledger is capped
//! and evicts oldest-first once the cap is reached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::store::KvStore;
use crate::user::User;

pub const LEDGER_KEY: &str = "pharma_master_audit_trail_v6";

const DEFAULT_CAPACITY: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub action: String,
    pub module: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Serialized JSON snapshot of the record before the mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
    /// Serialized JSON snapshot of the record after the mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_for_change: Option<String>,
}

/// Optional context attached to a ledger entry.
#[derive(Debug, Default, Clone)]
pub struct AuditMeta {
    pub record_id: Option<String>,
    pub previous_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn KvStore>,
    capacity: usize,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn KvStore>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// Append one entry, newest first, trimming past the cap.
    pub fn record(
        &self,
        user: &User,
        action: &str,
        module: &str,
        details: impl Into<String>,
        meta: AuditMeta,
    ) -> Result<()> {
        let entry = AuditEntry {
            id: ident::record_id("log")?,
            timestamp: Utc::now(),
            user: user.username.clone(),
            action: action.to_string(),
            module: module.to_string(),
            details: details.into(),
            record_id: meta.record_id,
            previous_value: meta.previous_value.map(|v| v.to_string()),
            new_value: meta.new_value.map(|v| v.to_string()),
            reason_for_change: meta.reason,
        };
        tracing::debug!(
            target: "pharmaqualify::audit",
            module,
            action,
            record = entry.record_id.as_deref().unwrap_or("-"),
            "ledger append"
        );

        let mut trail = self.load()?;
        trail.insert(0, entry);
        trail.truncate(self.capacity);
        self.save(&trail)
    }

    /// Full ledger, newest first.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        self.load()
    }

    /// Traceability lookup: every entry referencing one record identifier.
    pub fn entries_for_record(&self, record_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|entry| entry.record_id.as_deref() == Some(record_id))
            .collect())
    }

    fn load(&self) -> Result<Vec<AuditEntry>> {
        match self.store.get(LEDGER_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| Error::Storage(format!("audit ledger corrupt: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, trail: &[AuditEntry]) -> Result<()> {
        self.store.set(LEDGER_KEY, &serde_json::to_string(trail)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::user::Role;

    fn trail_with_capacity(capacity: usize) -> AuditTrail {
        AuditTrail::with_capacity(Arc::new(MemoryStore::new()), capacity)
    }

    fn analyst() -> User {
        User::new("schen", "S. Chen", Role::Operator, "QC Lab", "schen@example.com")
    }

    #[test]
    fn entries_come_back_newest_first() {
        let trail = trail_with_capacity(10);
        let user = analyst();
        for n in 0..3 {
            trail
                .record(&user, &format!("Action {n}"), "Deviations", "details", AuditMeta::default())
                .unwrap();
        }

        let entries = trail.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, "Action 2");
        assert_eq!(entries[2].action, "Action 0");
    }

    #[test]
    fn cap_evicts_only_the_oldest() {
        let trail = trail_with_capacity(3);
        let user = analyst();
        for n in 0..4 {
            trail
                .record(&user, &format!("Action {n}"), "CAPA", "details", AuditMeta::default())
                .unwrap();
        }

        let entries = trail.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, "Action 3");
        assert_eq!(entries[2].action, "Action 1");
    }

    #[test]
    fn record_filter_matches_only_referenced_entries() {
        let trail = trail_with_capacity(10);
        let user = analyst();
        trail
            .record(
                &user,
                "Logged Deviation",
                "Deviations",
                "details",
                AuditMeta { record_id: Some("dev1abc".into()), ..Default::default() },
            )
            .unwrap();
        trail
            .record(&user, "Created CAPA", "CAPA", "details", AuditMeta::default())
            .unwrap();

        let hits = trail.entries_for_record("dev1abc").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].action, "Logged Deviation");
        assert!(trail.entries_for_record("missing").unwrap().is_empty());
    }

    #[test]
    fn snapshots_are_serialized_verbatim() {
        let trail = trail_with_capacity(10);
        let user = analyst();
        trail
            .record(
                &user,
                "Linked CAPA",
                "Deviations",
                "details",
                AuditMeta {
                    previous_value: Some(serde_json::json!({"capa": null})),
                    new_value: Some(serde_json::json!({"capa": "CAPA-25-101"})),
                    reason: Some("cross-reference".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let entry = &trail.entries().unwrap()[0];
        assert_eq!(entry.previous_value.as_deref(), Some(r#"{"capa":null}"#));
        assert_eq!(entry.new_value.as_deref(), Some(r#"{"capa":"CAPA-25-101"}"#));
        assert_eq!(entry.reason_for_change.as_deref(), Some("cross-reference"));
    }
}
