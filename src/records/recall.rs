//! Market recalls and mock recall drills.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_recalls_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecallClass {
    /// Reasonable probability of serious harm.
    ClassI,
    /// Temporary or reversible harm.
    ClassII,
    /// Unlikely to cause harm.
    ClassIII,
    /// Drill only, no market action.
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecallRisk {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recall {
    pub id: String,
    pub number: String,
    pub batch_number: String,
    pub reason: String,
    pub classification: RecallClass,
    pub risk: RecallRisk,
    pub date: NaiveDate,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_date: Option<NaiveDate>,
}

static WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Pending,
    transitions: &[
        (Status::Pending, Action::Start, Status::InProgress),
        (Status::Pending, Action::Close, Status::Closed),
        (Status::InProgress, Action::Close, Status::Closed),
    ],
    admin_actions: &[Action::Close],
    signed_actions: &[Action::Close],
};

impl ManagedRecord for Recall {
    const MODULE: &'static str = "Recall";
    const NOUN: &'static str = "Recall";
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
        vec![&self.number, &self.batch_number, &self.reason]
    }
}

pub struct NewRecall {
    pub batch_number: String,
    pub reason: String,
    pub classification: RecallClass,
    pub risk: RecallRisk,
}

pub type RecallRepository = Repository<Recall>;

impl Repository<Recall> {
    pub fn initiate(&self, input: NewRecall, user: &User) -> Result<Recall> {
        if input.batch_number.trim().is_empty() {
            return Err(Error::validation("batch number is required"));
        }
        if input.reason.trim().is_empty() {
            return Err(Error::validation("recall reason is required"));
        }

        let count = self.count()?;
        let record = Recall {
            id: ident::record_id("rc")?,
            number: ident::display_number("RC", count + 1),
            batch_number: input.batch_number,
            reason: input.reason,
            classification: input.classification,
            risk: input.risk,
            date: Utc::now().date_naive(),
            status: WORKFLOW.initial,
            closed_date: None,
        };
        let details = format!(
            "Recall {} initiated for batch {}",
            record.number, record.batch_number
        );
        self.insert(record, user, "Initiated Recall", details)
    }
}
