//! Out-of-specification lab results and their investigations.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_oos_records_v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OosRecord {
    pub id: String,
    pub number: String,
    pub batch_number: String,
    pub test_name: String,
    pub specification: String,
    pub result: String,
    pub analyst: String,
    pub date: NaiveDate,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_date: Option<NaiveDate>,
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

impl ManagedRecord for OosRecord {
    const MODULE: &'static str = "OOS";
    const NOUN: &'static str = "OOS Record";
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
        vec![&self.number, &self.batch_number, &self.test_name]
    }
}

pub struct NewOosRecord {
    pub batch_number: String,
    pub test_name: String,
    pub specification: String,
    pub result: String,
    pub analyst: String,
}

pub type OosRepository = Repository<OosRecord>;

impl Repository<OosRecord> {
    pub fn log(&self, input: NewOosRecord, user: &User) -> Result<OosRecord> {
        if input.batch_number.trim().is_empty() {
            return Err(Error::validation("batch number is required"));
        }
        if input.test_name.trim().is_empty() {
            return Err(Error::validation("test name is required"));
        }
        if input.result.trim().is_empty() {
            return Err(Error::validation("observed result is required"));
        }

        let count = self.count()?;
        let record = OosRecord {
            id: ident::record_id("oos")?,
            number: ident::display_number("OOS", count + 1),
            batch_number: input.batch_number,
            test_name: input.test_name,
            specification: input.specification,
            result: input.result,
            analyst: input.analyst,
            date: Utc::now().date_naive(),
            status: WORKFLOW.initial,
            closed_date: None,
        };
        let details = format!(
            "OOS {} logged for batch {} ({})",
            record.number, record.batch_number, record.test_name
        );
        self.insert(record, user, "Logged OOS Result", details)
    }
}
