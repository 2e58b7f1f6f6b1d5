//! Master and batch manufacturing records.
//!
//! An MFR is the approved template; a BMR is one executed batch issued from
//! it. Step execution is double-signed: the performer signs completion,
//! then a second signer verifies, and verification of a step is refused
//! until that same step carries its completion signature. Line clearance is
//! its own gated sign-off.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, RecordRef, RefKind, Repository};
use crate::signature::{SignatureGrant, SignatureMeaning};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const MFR_COLLECTION: &str = "pharma_mfr_vault_v1";
pub const BMR_COLLECTION: &str = "pharma_bmr_vault_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepCategory {
    Preparation,
    Processing,
    Qc,
    Packaging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmrStep {
    pub id: String,
    pub operation: String,
    pub instruction: String,
    pub category: StepCategory,
    pub is_critical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_off_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_off_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}

impl BmrStep {
    pub fn new(
        operation: impl Into<String>,
        instruction: impl Into<String>,
        category: StepCategory,
        is_critical: bool,
    ) -> Result<Self> {
        Ok(Self {
            id: ident::record_id("step")?,
            operation: operation.into(),
            instruction: instruction.into(),
            category,
            is_critical,
            limit: None,
            sign_off_by: None,
            sign_off_at: None,
            checked_by: None,
            checked_at: None,
            observation: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub material_name: String,
    pub qty_per_unit: String,
    pub theoretical_qty: String,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub name: String,
    pub designation: String,
    pub meaning: SignatureMeaning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mfr {
    pub id: String,
    pub document_no: String,
    pub product_name: String,
    pub product_code: String,
    pub revision: String,
    pub dosage_form: String,
    pub shelf_life: String,
    pub batch_size: String,
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<BmrStep>,
    pub approvals: Vec<Approval>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
}

static MFR_WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Draft,
    transitions: &[(Status::Draft, Action::Approve, Status::Approved)],
    admin_actions: &[Action::Approve],
    signed_actions: &[Action::Approve],
};

impl ManagedRecord for Mfr {
    const MODULE: &'static str = "Batch Records";
    const NOUN: &'static str = "MFR";
    const COLLECTION: &'static str = MFR_COLLECTION;

    fn workflow() -> &'static WorkflowSpec {
        &MFR_WORKFLOW
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn number(&self) -> &str {
        &self.document_no
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn on_transition(&mut self, to: Status, date: NaiveDate, _user: &User) {
        if to == Status::Approved {
            self.effective_date = Some(date);
        }
    }

    fn search_text(&self) -> Vec<&str> {
        vec![&self.document_no, &self.product_name, &self.product_code]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineClearance {
    pub cleared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bmr {
    pub id: String,
    /// Weak reference to the issuing MFR by document number.
    pub mfr_ref: RecordRef,
    pub batch_number: String,
    pub product_name: String,
    pub issued_by: String,
    pub issuance_date: NaiveDate,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<BmrStep>,
    pub line_clearance: LineClearance,
    pub status: Status,
}

static BMR_WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Issued,
    transitions: &[
        (Status::Issued, Action::Start, Status::InProgress),
        (Status::InProgress, Action::Complete, Status::Completed),
    ],
    admin_actions: &[Action::Complete],
    signed_actions: &[Action::Complete],
};

impl ManagedRecord for Bmr {
    const MODULE: &'static str = "Production";
    const NOUN: &'static str = "BMR";
    const COLLECTION: &'static str = BMR_COLLECTION;

    fn workflow() -> &'static WorkflowSpec {
        &BMR_WORKFLOW
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn number(&self) -> &str {
        &self.batch_number
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn search_text(&self) -> Vec<&str> {
        vec![&self.batch_number, &self.product_name]
    }
}

pub struct NewMfr {
    pub document_no: String,
    pub product_name: String,
    pub product_code: String,
    pub revision: String,
    pub dosage_form: String,
    pub shelf_life: String,
    pub batch_size: String,
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<BmrStep>,
}

pub type MfrRepository = Repository<Mfr>;
pub type BmrRepository = Repository<Bmr>;

impl Repository<Mfr> {
    /// Draft a new master record, seeded with the author's approval line.
    pub fn draft(&self, input: NewMfr, user: &User) -> Result<Mfr> {
        if input.product_name.trim().is_empty() {
            return Err(Error::validation("product name is required"));
        }
        if input.document_no.trim().is_empty() {
            return Err(Error::validation("document number is required"));
        }
        if input.steps.is_empty() {
            return Err(Error::validation("at least one manufacturing step is required"));
        }

        let record = Mfr {
            id: ident::record_id("mfr")?,
            document_no: input.document_no,
            product_name: input.product_name,
            product_code: input.product_code,
            revision: input.revision,
            dosage_form: input.dosage_form,
            shelf_life: input.shelf_life,
            batch_size: input.batch_size,
            description: input.description,
            ingredients: input.ingredients,
            steps: input.steps,
            approvals: vec![Approval {
                name: user.full_name.clone(),
                designation: user.department.clone(),
                meaning: SignatureMeaning::Authorship,
            }],
            status: MFR_WORKFLOW.initial,
            effective_date: None,
        };
        let details = format!(
            "MFR {} drafted for {}",
            record.document_no, record.product_name
        );
        self.insert(record, user, "Drafted MFR", details)
    }
}

impl Repository<Bmr> {
    /// Issue an executable batch record from an approved master. The copy
    /// is deep: the batch executes its own steps and ingredient lots.
    pub fn issue(&self, mfr: &Mfr, batch_number: String, user: &User) -> Result<Bmr> {
        if mfr.status != Status::Approved {
            return Err(Error::validation(format!(
                "MFR {} must be approved before issuance",
                mfr.document_no
            )));
        }
        if batch_number.trim().is_empty() {
            return Err(Error::validation("batch number is required"));
        }

        let record = Bmr {
            id: ident::record_id("bmr")?,
            mfr_ref: RecordRef::new(RefKind::Mfr, &mfr.document_no),
            batch_number,
            product_name: mfr.product_name.clone(),
            issued_by: user.full_name.clone(),
            issuance_date: Utc::now().date_naive(),
            ingredients: mfr.ingredients.clone(),
            steps: mfr.steps.clone(),
            line_clearance: LineClearance::default(),
            status: BMR_WORKFLOW.initial,
        };
        let details = format!(
            "BMR issued for lot {} from MFR {}",
            record.batch_number, mfr.document_no
        );
        self.insert(record, user, "Issued BMR", details)
    }

    /// Performer sign-off on a step. Refused when the step already carries
    /// one.
    pub fn sign_step(
        &self,
        id: &str,
        step_id: &str,
        grant: &SignatureGrant,
        user: &User,
    ) -> Result<Bmr> {
        let mut record = self.find(id)?;
        let batch = record.batch_number.clone();
        let step = step_mut(&mut record.steps, id, step_id)?;
        if step.sign_off_by.is_some() {
            return Err(Error::validation(format!(
                "step '{}' is already signed",
                step.operation
            )));
        }
        step.sign_off_by = Some(grant.signed_by().to_string());
        step.sign_off_at = Some(grant.signed_at());
        let operation = step.operation.clone();

        let details = format!("Step '{operation}' signed in lot {batch}");
        self.update(
            record,
            user,
            "Signed Batch Step",
            details,
            Some(grant.reason().to_string()),
        )
    }

    /// Second-person verification of a step. Refused until the step's
    /// completion sign-off exists; verification witnesses a recorded act.
    pub fn verify_step(
        &self,
        id: &str,
        step_id: &str,
        grant: &SignatureGrant,
        user: &User,
    ) -> Result<Bmr> {
        let mut record = self.find(id)?;
        let batch = record.batch_number.clone();
        let step = step_mut(&mut record.steps, id, step_id)?;
        if step.sign_off_by.is_none() {
            return Err(Error::validation(format!(
                "step '{}' must be signed before verification",
                step.operation
            )));
        }
        if step.checked_by.is_some() {
            return Err(Error::validation(format!(
                "step '{}' is already verified",
                step.operation
            )));
        }
        step.checked_by = Some(grant.signed_by().to_string());
        step.checked_at = Some(grant.signed_at());
        let operation = step.operation.clone();

        let details = format!("Step '{operation}' verified in lot {batch}");
        self.update(
            record,
            user,
            "Verified Batch Step",
            details,
            Some(grant.reason().to_string()),
        )
    }

    /// Gated line-clearance sign-off ahead of processing.
    pub fn clear_line(&self, id: &str, grant: &SignatureGrant, user: &User) -> Result<Bmr> {
        let mut record = self.find(id)?;
        if record.line_clearance.cleared {
            return Err(Error::validation(format!(
                "line already cleared for lot {}",
                record.batch_number
            )));
        }
        record.line_clearance = LineClearance {
            cleared: true,
            verified_by: Some(grant.signed_by().to_string()),
            verified_at: Some(grant.signed_at()),
        };
        let details = format!("Line clearance granted for lot {}", record.batch_number);
        self.update(
            record,
            user,
            "Cleared Line",
            details,
            Some(grant.reason().to_string()),
        )
    }

    /// Attach an execution observation to a step.
    pub fn record_observation(
        &self,
        id: &str,
        step_id: &str,
        observation: String,
        user: &User,
    ) -> Result<Bmr> {
        let mut record = self.find(id)?;
        let batch = record.batch_number.clone();
        let step = step_mut(&mut record.steps, id, step_id)?;
        step.observation = Some(observation);
        let operation = step.operation.clone();

        let details = format!("Observation recorded on step '{operation}' in lot {batch}");
        self.update(record, user, "Recorded Observation", details, None)
    }
}

fn step_mut<'a>(steps: &'a mut [BmrStep], id: &str, step_id: &str) -> Result<&'a mut BmrStep> {
    steps
        .iter_mut()
        .find(|s| s.id == step_id)
        .ok_or_else(|| Error::NotFound {
            entity: "BMR step",
            id: format!("{id}/{step_id}"),
        })
}
