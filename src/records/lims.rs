//! LIMS sample tracking: log, test, review, disposition.
//!
//! The one module whose pipeline carries no role gating: any analyst moves
//! a sample along, matching lab practice where the act is recorded rather
//! than pre-authorized.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_lims_samples_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    RawMaterial,
    InProcess,
    FinishedProduct,
    Stability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimsSample {
    pub id: String,
    pub sample_no: String,
    pub product_name: String,
    pub batch_no: String,
    pub sample_type: SampleType,
    pub analyst: String,
    pub date_logged: NaiveDate,
    pub status: Status,
}

static WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Logged,
    transitions: &[
        (Status::Logged, Action::Advance, Status::Testing),
        (Status::Testing, Action::Advance, Status::Review),
        (Status::Review, Action::Release, Status::Released),
        (Status::Review, Action::Reject, Status::Rejected),
    ],
    admin_actions: &[],
    signed_actions: &[],
};

impl ManagedRecord for LimsSample {
    const MODULE: &'static str = "LIMS";
    const NOUN: &'static str = "Sample";
    const COLLECTION: &'static str = COLLECTION;

    fn workflow() -> &'static WorkflowSpec {
        &WORKFLOW
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn number(&self) -> &str {
        &self.sample_no
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn search_text(&self) -> Vec<&str> {
        vec![&self.sample_no, &self.product_name, &self.batch_no]
    }
}

pub struct NewLimsSample {
    pub product_name: String,
    pub batch_no: String,
    pub sample_type: SampleType,
    pub analyst: String,
}

pub type LimsRepository = Repository<LimsSample>;

impl Repository<LimsSample> {
    pub fn log_sample(&self, input: NewLimsSample, user: &User) -> Result<LimsSample> {
        if input.product_name.trim().is_empty() {
            return Err(Error::validation("product name is required"));
        }
        if input.batch_no.trim().is_empty() {
            return Err(Error::validation("batch number is required"));
        }

        let count = self.count()?;
        let record = LimsSample {
            id: ident::record_id("smp")?,
            sample_no: ident::display_number("S", count + 1),
            product_name: input.product_name,
            batch_no: input.batch_no,
            sample_type: input.sample_type,
            analyst: input.analyst,
            date_logged: Utc::now().date_naive(),
            status: WORKFLOW.initial,
        };
        let details = format!(
            "Sample {} logged for {} batch {}",
            record.sample_no, record.product_name, record.batch_no
        );
        self.insert(record, user, "Logged Sample", details)
    }
}
