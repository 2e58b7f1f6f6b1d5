//! Certificates of analysis: per-test spec lines and the aggregated
//! compliance statement.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_coa_records_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoaCategory {
    FinishedProduct,
    RawMaterial,
    WaterAnalysis,
    Microbiology,
    Utilities,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStatus {
    Pass,
    Fail,
    Pending,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecCategory {
    Descriptive,
    Physical,
    Chemical,
    Microbiological,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecLine {
    pub test: String,
    pub specification: String,
    pub result: String,
    pub status: LineStatus,
    pub category: SpecCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoaRecord {
    pub id: String,
    pub coa_number: String,
    pub product_name: String,
    pub dosage_form: String,
    pub batch_number: String,
    pub batch_size: String,
    pub category: CoaCategory,
    pub specs: Vec<SpecLine>,
    pub manufacturer: String,
    pub storage_condition: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
}

impl CoaRecord {
    /// A lot complies iff every spec line reports a pass. Any other line
    /// status flips the whole certificate.
    pub fn is_complying(&self) -> bool {
        self.specs.iter().all(|line| line.status == LineStatus::Pass)
    }

    pub fn compliance_statement(&self) -> &'static str {
        if self.is_complying() {
            "COMPLYING"
        } else {
            "NOT COMPLYING"
        }
    }
}

static WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Draft,
    transitions: &[(Status::Draft, Action::Issue, Status::Issued)],
    admin_actions: &[Action::Issue],
    signed_actions: &[Action::Issue],
};

impl ManagedRecord for CoaRecord {
    const MODULE: &'static str = "COA";
    const NOUN: &'static str = "COA";
    const COLLECTION: &'static str = COLLECTION;

    fn workflow() -> &'static WorkflowSpec {
        &WORKFLOW
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn number(&self) -> &str {
        &self.coa_number
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn on_transition(&mut self, to: Status, date: NaiveDate, user: &User) {
        if to == Status::Issued {
            self.released_by = Some(user.full_name.clone());
            self.release_date = Some(date);
        }
    }

    fn search_text(&self) -> Vec<&str> {
        vec![&self.coa_number, &self.product_name, &self.batch_number]
    }
}

pub struct NewCoaRecord {
    pub product_name: String,
    pub dosage_form: String,
    pub batch_number: String,
    pub batch_size: String,
    pub category: CoaCategory,
    pub specs: Vec<SpecLine>,
    pub manufacturer: String,
    pub storage_condition: String,
}

pub type CoaRepository = Repository<CoaRecord>;

impl Repository<CoaRecord> {
    pub fn draft(&self, input: NewCoaRecord, user: &User) -> Result<CoaRecord> {
        if input.product_name.trim().is_empty() {
            return Err(Error::validation("product name is required"));
        }
        if input.batch_number.trim().is_empty() {
            return Err(Error::validation("batch number is required"));
        }
        if input.specs.is_empty() {
            return Err(Error::validation("at least one spec line is required"));
        }

        let count = self.count()?;
        let record = CoaRecord {
            id: ident::record_id("coa")?,
            coa_number: ident::display_number("COA", count + 1),
            product_name: input.product_name,
            dosage_form: input.dosage_form,
            batch_number: input.batch_number,
            batch_size: input.batch_size,
            category: input.category,
            specs: input.specs,
            manufacturer: input.manufacturer,
            storage_condition: input.storage_condition,
            status: WORKFLOW.initial,
            released_by: None,
            release_date: None,
        };
        let details = format!(
            "COA {} drafted for {} batch {}",
            record.coa_number, record.product_name, record.batch_number
        );
        self.insert(record, user, "Drafted COA", details)
    }

    /// Record a test result on one spec line. Only drafts accept results.
    pub fn record_result(
        &self,
        id: &str,
        index: usize,
        result: String,
        status: LineStatus,
        user: &User,
    ) -> Result<CoaRecord> {
        let mut record = self.find(id)?;
        if record.status != Status::Draft {
            return Err(Error::validation(format!(
                "COA {} is already issued",
                record.coa_number
            )));
        }
        let line = record.specs.get_mut(index).ok_or_else(|| Error::NotFound {
            entity: "Spec line",
            id: format!("{id}#{index}"),
        })?;
        line.result = result;
        line.status = status;
        let test = line.test.clone();
        let details = format!("COA {} result recorded for '{}'", record.coa_number, test);
        self.update(record, user, "Recorded COA Result", details, None)
    }
}
