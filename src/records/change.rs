//! Change control: requests, impact lists and their task breakdown.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_change_requests_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeCategory {
    Process,
    Equipment,
    Facility,
    It,
    Document,
    Analytical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangePriority {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Open,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTask {
    pub description: String,
    pub owner: String,
    pub state: TaskState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: String,
    pub number: String,
    pub title: String,
    pub description: String,
    pub category: ChangeCategory,
    pub priority: ChangePriority,
    pub impacts: Vec<String>,
    pub date_initiated: NaiveDate,
    pub initiated_by: String,
    pub tasks: Vec<ChangeTask>,
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
        (Status::Approved, Action::Close, Status::Closed),
    ],
    admin_actions: &[Action::Approve, Action::Close],
    signed_actions: &[Action::Approve, Action::Close],
};

impl ManagedRecord for ChangeRequest {
    const MODULE: &'static str = "Change Control";
    const NOUN: &'static str = "Change Request";
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
        vec![&self.number, &self.title, &self.description]
    }
}

pub struct NewChangeRequest {
    pub title: String,
    pub description: String,
    pub category: ChangeCategory,
    pub priority: ChangePriority,
    pub impacts: Vec<String>,
    pub tasks: Vec<ChangeTask>,
}

pub type ChangeRepository = Repository<ChangeRequest>;

impl Repository<ChangeRequest> {
    pub fn raise(&self, input: NewChangeRequest, user: &User) -> Result<ChangeRequest> {
        if input.title.trim().is_empty() {
            return Err(Error::validation("change title is required"));
        }
        if input.description.trim().is_empty() {
            return Err(Error::validation("change description is required"));
        }

        let count = self.count()?;
        let record = ChangeRequest {
            id: ident::record_id("ccr")?,
            number: ident::display_number("CCR", count + 1),
            title: input.title,
            description: input.description,
            category: input.category,
            priority: input.priority,
            impacts: input.impacts,
            date_initiated: Utc::now().date_naive(),
            initiated_by: user.full_name.clone(),
            tasks: input.tasks,
            status: WORKFLOW.initial,
            closed_date: None,
        };
        let details = format!("Change request {} raised: {}", record.number, record.title);
        self.insert(record, user, "Raised Change Request", details)
    }

    pub fn complete_task(&self, id: &str, index: usize, user: &User) -> Result<ChangeRequest> {
        let mut record = self.find(id)?;
        let task = record.tasks.get_mut(index).ok_or_else(|| Error::NotFound {
            entity: "Change task",
            id: format!("{id}#{index}"),
        })?;
        task.state = TaskState::Completed;
        let details = format!(
            "Change request {} task {} completed",
            record.number,
            index + 1
        );
        self.update(record, user, "Completed Change Task", details, None)
    }
}
