//! Deviation log: non-conformity events and their CAPA linkage.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditTrail;
use crate::error::{Error, Result};
use crate::ident;
use crate::notify::{Category, NotificationCenter, Priority};
use crate::repository::{Filter, ManagedRecord, RecordRef, RefKind, Repository};
use crate::signature::SignatureGrant;
use crate::store::KvStore;
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_deviations_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    fn priority(self) -> Priority {
        match self {
            Severity::Low => Priority::Low,
            Severity::Medium => Priority::Medium,
            Severity::High => Priority::High,
            Severity::Critical => Priority::Critical,
        }
    }
}

/// Root-cause scoping, either advisor-suggested or entered manually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationAnalysis {
    pub root_cause: String,
    pub corrective_action: String,
    pub preventive_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deviation {
    pub id: String,
    pub number: String,
    pub date: NaiveDate,
    pub department: String,
    pub description: String,
    pub severity: Severity,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capa_ref: Option<RecordRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<DeviationAnalysis>,
}

static WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Pending,
    transitions: &[
        (Status::Pending, Action::Start, Status::InProgress),
        (Status::Pending, Action::Approve, Status::Approved),
        (Status::InProgress, Action::Approve, Status::Approved),
        (Status::Pending, Action::Close, Status::Closed),
        (Status::InProgress, Action::Close, Status::Closed),
        (Status::Approved, Action::Close, Status::Closed),
    ],
    admin_actions: &[Action::Approve, Action::Close],
    signed_actions: &[Action::Approve, Action::Close],
};

impl ManagedRecord for Deviation {
    const MODULE: &'static str = "Deviations";
    const NOUN: &'static str = "Deviation";
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
        if to == Status::Closed {
            self.closed_date = Some(date);
        }
    }

    fn search_text(&self) -> Vec<&str> {
        vec![&self.number, &self.description, &self.department]
    }
}

pub struct NewDeviation {
    pub department: String,
    pub description: String,
    pub severity: Severity,
    pub analysis: Option<DeviationAnalysis>,
}

pub struct DeviationRepository {
    repo: Repository<Deviation>,
    notifier: NotificationCenter,
}

impl DeviationRepository {
    pub fn new(store: Arc<dyn KvStore>, audit: AuditTrail, notifier: NotificationCenter) -> Self {
        Self { repo: Repository::new(store, audit), notifier }
    }

    /// Log a new deviation. High and Critical severities raise a
    /// notification; a notification failure never blocks the log entry.
    pub fn log(&self, input: NewDeviation, user: &User) -> Result<Deviation> {
        if input.description.trim().is_empty() {
            return Err(Error::validation("deviation description is required"));
        }
        if input.department.trim().is_empty() {
            return Err(Error::validation("deviation department is required"));
        }

        let count = self.repo.count()?;
        let record = Deviation {
            id: ident::record_id("dev")?,
            number: ident::display_number("D", count + 501),
            date: Utc::now().date_naive(),
            department: input.department,
            description: input.description,
            severity: input.severity,
            status: WORKFLOW.initial,
            capa_ref: None,
            closed_date: None,
            analysis: input.analysis,
        };
        let details = format!("New deviation {} logged in {}", record.number, record.department);
        let record = self.repo.insert(record, user, "Logged Deviation", details)?;

        if record.severity >= Severity::High {
            let outcome = self.notifier.notify(
                user,
                Category::Deviation,
                record.severity.priority(),
                format!("Critical Event: {}", record.number),
                format!("Logged in {}.", record.department),
            );
            if let Err(err) = outcome {
                tracing::warn!(target: "pharmaqualify", %err, "deviation notification dropped");
            }
        }
        Ok(record)
    }

    /// Store the CAPA's display code as a weak reference. The CAPA may be
    /// deleted later without invalidating this record.
    pub fn link_capa(&self, id: &str, capa_number: &str, user: &User) -> Result<Deviation> {
        let mut record = self.repo.find(id)?;
        record.capa_ref = Some(RecordRef::new(RefKind::Capa, capa_number));
        let details = format!("Deviation {} linked to CAPA {}", record.number, capa_number);
        self.repo.update(record, user, "Linked CAPA", details, None)
    }

    pub fn list(&self) -> Result<Vec<Deviation>> {
        self.repo.list()
    }

    pub fn list_filtered(&self, filter: &Filter) -> Result<Vec<Deviation>> {
        self.repo.list_filtered(filter)
    }

    pub fn find(&self, id: &str) -> Result<Deviation> {
        self.repo.find(id)
    }

    pub fn transition(
        &self,
        id: &str,
        action: Action,
        user: &User,
        signature: Option<&SignatureGrant>,
    ) -> Result<Deviation> {
        self.repo.transition(id, action, user, signature)
    }

    pub fn delete(&self, id: &str, user: &User) -> Result<()> {
        self.repo.delete(id, user)
    }
}
