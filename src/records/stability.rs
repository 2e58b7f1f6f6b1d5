//! Stability studies: long-term and accelerated storage programs.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_stability_v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityStudy {
    pub id: String,
    pub number: String,
    pub product: String,
    pub batch_number: String,
    /// Storage condition, e.g. "25C/60%RH".
    pub condition: String,
    pub start_date: NaiveDate,
    pub next_time_point: String,
    pub protocol_id: String,
    pub intervals: Vec<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_date: Option<NaiveDate>,
}

static WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Ongoing,
    transitions: &[
        (Status::Ongoing, Action::Complete, Status::Completed),
        (Status::Ongoing, Action::Stop, Status::Stopped),
    ],
    admin_actions: &[Action::Complete, Action::Stop],
    signed_actions: &[Action::Complete, Action::Stop],
};

impl ManagedRecord for StabilityStudy {
    const MODULE: &'static str = "Stability";
    const NOUN: &'static str = "Stability Study";
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
        if matches!(to, Status::Completed | Status::Stopped) {
            self.ended_date = Some(date);
        }
    }

    fn search_text(&self) -> Vec<&str> {
        vec![&self.number, &self.product, &self.batch_number]
    }
}

pub struct NewStabilityStudy {
    pub product: String,
    pub batch_number: String,
    pub condition: String,
    pub intervals: Vec<String>,
}

pub type StabilityRepository = Repository<StabilityStudy>;

impl Repository<StabilityStudy> {
    pub fn enroll(&self, input: NewStabilityStudy, user: &User) -> Result<StabilityStudy> {
        if input.product.trim().is_empty() {
            return Err(Error::validation("product is required"));
        }
        if input.batch_number.trim().is_empty() {
            return Err(Error::validation("batch number is required"));
        }
        if input.intervals.is_empty() {
            return Err(Error::validation("at least one pull interval is required"));
        }

        let count = self.count()?;
        let number = ident::display_number("STB", count + 1);
        let protocol_id = format!(
            "P-{}-{:03}",
            input
                .product
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(3)
                .collect::<String>()
                .to_uppercase(),
            count + 1
        );
        let next_time_point = input.intervals[0].clone();
        let record = StabilityStudy {
            id: ident::record_id("stb")?,
            number,
            product: input.product,
            batch_number: input.batch_number,
            condition: input.condition,
            start_date: Utc::now().date_naive(),
            next_time_point,
            protocol_id,
            intervals: input.intervals,
            status: WORKFLOW.initial,
            ended_date: None,
        };
        let details = format!(
            "Stability study {} enrolled for {} batch {}",
            record.number, record.product, record.batch_number
        );
        self.insert(record, user, "Enrolled Stability Study", details)
    }

    /// Move the schedule pointer to the next pull interval.
    pub fn advance_time_point(&self, id: &str, user: &User) -> Result<StabilityStudy> {
        let mut record = self.find(id)?;
        let current = record
            .intervals
            .iter()
            .position(|i| *i == record.next_time_point);
        let next = match current {
            Some(at) if at + 1 < record.intervals.len() => record.intervals[at + 1].clone(),
            _ => {
                return Err(Error::validation(format!(
                    "study {} has no remaining time points",
                    record.number
                )));
            }
        };
        record.next_time_point = next;
        let details = format!(
            "Stability study {} advanced to {}",
            record.number, record.next_time_point
        );
        self.update(record, user, "Advanced Stability Time Point", details, None)
    }
}
