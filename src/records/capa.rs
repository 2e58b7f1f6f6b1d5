//! Corrective and preventive actions, sourced from deviations, audits or
//! OOS investigations.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditTrail;
use crate::error::{Error, Result};
use crate::ident;
use crate::notify::{Category, NotificationCenter, Priority};
use crate::repository::{Filter, ManagedRecord, RecordRef, Repository};
use crate::signature::SignatureGrant;
use crate::store::KvStore;
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_capa_v4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapaType {
    Corrective,
    Preventive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capa {
    pub id: String,
    pub number: String,
    /// Weak reference to the originating record (Deviation, Audit or OOS).
    pub source: RecordRef,
    pub description: String,
    pub capa_type: CapaType,
    pub owner: String,
    pub due_date: NaiveDate,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_date: Option<NaiveDate>,
}

static WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Pending,
    transitions: &[
        (Status::Pending, Action::Start, Status::InProgress),
        (Status::Pending, Action::Approve, Status::Approved),
        (Status::InProgress, Action::Approve, Status::Approved),
        (Status::InProgress, Action::Complete, Status::Completed),
        (Status::Approved, Action::Complete, Status::Completed),
        (Status::Approved, Action::Close, Status::Closed),
        (Status::Completed, Action::Close, Status::Closed),
    ],
    admin_actions: &[Action::Approve, Action::Close],
    signed_actions: &[Action::Approve, Action::Close],
};

impl ManagedRecord for Capa {
    const MODULE: &'static str = "CAPA";
    const NOUN: &'static str = "CAPA";
    const COLLECTION: &'static str = COLLECTION;

    fn workflow() -> &'static WorkflowSpec {
        &WORKFLOW
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn number(&self) -> &str {
        &self.number
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn on_transition(&mut self, to: Status, date: NaiveDate, _user: &User) {
        if to == Status::Completed {
            self.verification_date = Some(date);
        }
    }

    fn search_text(&self) -> Vec<&str> {
        vec![&self.number, &self.description, &self.owner]
    }
}

pub struct NewCapa {
    pub source: RecordRef,
    pub description: String,
    pub capa_type: CapaType,
    pub owner: String,
    pub due_date: NaiveDate,
}

pub struct CapaRepository {
    repo: Repository<Capa>,
    notifier: NotificationCenter,
}

impl CapaRepository {
    pub fn new(store: Arc<dyn KvStore>, audit: AuditTrail, notifier: NotificationCenter) -> Self {
        Self { repo: Repository::new(store, audit), notifier }
    }

    /// Open a new CAPA and notify the assignee. The notification is
    /// fire-and-forget relative to the creation itself.
    pub fn open(&self, input: NewCapa, user: &User) -> Result<Capa> {
        if input.description.trim().is_empty() {
            return Err(Error::validation("CAPA description is required"));
        }
        if input.owner.trim().is_empty() {
            return Err(Error::validation("CAPA owner is required"));
        }

        let count = self.repo.count()?;
        let record = Capa {
            id: ident::record_id("capa")?,
            number: ident::display_number("CAPA", count + 101),
            source: input.source,
            description: input.description,
            capa_type: input.capa_type,
            owner: input.owner,
            due_date: input.due_date,
            status: WORKFLOW.initial,
            verification_date: None,
        };
        let details = format!(
            "CAPA {} opened against {} ({})",
            record.number, record.source.code, record.owner
        );
        let record = self.repo.insert(record, user, "Created CAPA", details)?;

        let outcome = self.notifier.notify(
            user,
            Category::Capa,
            Priority::Medium,
            format!("CAPA Assigned: {}", record.number),
            format!("Owner {}, due {}.", record.owner, record.due_date),
        );
        if let Err(err) = outcome {
            tracing::warn!(target: "pharmaqualify", %err, "CAPA notification dropped");
        }
        Ok(record)
    }

    pub fn list(&self) -> Result<Vec<Capa>> {
        self.repo.list()
    }

    pub fn list_filtered(&self, filter: &Filter) -> Result<Vec<Capa>> {
        self.repo.list_filtered(filter)
    }

    pub fn find(&self, id: &str) -> Result<Capa> {
        self.repo.find(id)
    }

    pub fn find_by_number(&self, number: &str) -> Result<Capa> {
        self.repo.find_by_number(number)
    }

    pub fn transition(
        &self,
        id: &str,
        action: Action,
        user: &User,
        signature: Option<&SignatureGrant>,
    ) -> Result<Capa> {
        self.repo.transition(id, action, user, signature)
    }

    pub fn delete(&self, id: &str, user: &User) -> Result<()> {
        self.repo.delete(id, user)
    }
}
