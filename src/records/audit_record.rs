//! Internal audit records with their regulatory checklists.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_audit_records_v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub check_item: String,
    pub regulatory_ref: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub number: String,
    pub department: String,
    pub date: NaiveDate,
    pub auditor: String,
    pub checklist: Vec<ChecklistItem>,
    pub status: Status,
}

static WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Pending,
    transitions: &[
        (Status::Pending, Action::Approve, Status::Approved),
        (Status::Pending, Action::Close, Status::Closed),
        (Status::Approved, Action::Close, Status::Closed),
    ],
    admin_actions: &[Action::Approve, Action::Close],
    signed_actions: &[Action::Approve, Action::Close],
};

impl ManagedRecord for AuditRecord {
    const MODULE: &'static str = "Audits";
    const NOUN: &'static str = "Audit Record";
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

    fn search_text(&self) -> Vec<&str> {
        vec![&self.number, &self.department, &self.auditor]
    }
}

pub struct NewAuditRecord {
    pub department: String,
    pub auditor: String,
    pub checklist: Vec<ChecklistItem>,
}

pub type AuditRecordRepository = Repository<AuditRecord>;

impl Repository<AuditRecord> {
    pub fn schedule(&self, input: NewAuditRecord, user: &User) -> Result<AuditRecord> {
        if input.department.trim().is_empty() {
            return Err(Error::validation("audit department is required"));
        }
        if input.auditor.trim().is_empty() {
            return Err(Error::validation("auditor is required"));
        }

        let count = self.count()?;
        let record = AuditRecord {
            id: ident::record_id("ia")?,
            number: ident::display_number("IA", count + 1),
            department: input.department,
            date: Utc::now().date_naive(),
            auditor: input.auditor,
            checklist: input.checklist,
            status: WORKFLOW.initial,
        };
        let details = format!("Audit {} scheduled for {}", record.number, record.department);
        self.insert(record, user, "Scheduled Audit", details)
    }

    /// Tick or untick one checklist line.
    pub fn set_checklist_item(
        &self,
        id: &str,
        index: usize,
        completed: bool,
        user: &User,
    ) -> Result<AuditRecord> {
        let mut record = self.find(id)?;
        let item = record.checklist.get_mut(index).ok_or_else(|| Error::NotFound {
            entity: "Checklist item",
            id: format!("{id}#{index}"),
        })?;
        item.completed = completed;
        let details = format!(
            "Audit {} checklist item {} marked {}",
            record.number,
            index + 1,
            if completed { "complete" } else { "open" }
        );
        self.update(record, user, "Updated Audit Checklist", details, None)
    }
}
