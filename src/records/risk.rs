//! Risk register: FMEA-style entries with RPN scoring and re-assessment
//! history.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_risk_register_v1";

/// Risk Priority Number: severity x occurrence x detection, each scored
/// 1-10. Pure and deterministic.
pub fn rpn(severity: u8, occurrence: u8, detection: u8) -> u16 {
    severity as u16 * occurrence as u16 * detection as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskClass {
    Low,
    Medium,
    High,
    Critical,
}

/// Residual-risk classification by fixed thresholds.
pub fn classify(rpn: u16) -> RiskClass {
    if rpn > 125 {
        RiskClass::Critical
    } else if rpn > 64 {
        RiskClass::High
    } else if rpn > 27 {
        RiskClass::Medium
    } else {
        RiskClass::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScores {
    pub severity: u8,
    pub occurrence: u8,
    pub detection: u8,
}

impl RiskScores {
    pub fn validate(self) -> Result<()> {
        for (name, score) in [
            ("severity", self.severity),
            ("occurrence", self.occurrence),
            ("detection", self.detection),
        ] {
            if !(1..=10).contains(&score) {
                return Err(Error::validation(format!(
                    "{name} score {score} outside 1-10"
                )));
            }
        }
        Ok(())
    }

    pub fn rpn(self) -> u16 {
        rpn(self.severity, self.occurrence, self.detection)
    }
}

/// Archived prior values of an entry, captured on re-assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub date: NaiveDate,
    pub severity: u8,
    pub occurrence: u8,
    pub detection: u8,
    pub rpn: u16,
    pub mitigation: String,
    pub residual_risk: RiskClass,
}

impl RiskSnapshot {
    fn of(entry: &RiskEntry) -> Self {
        Self {
            date: entry.date,
            severity: entry.severity,
            occurrence: entry.occurrence,
            detection: entry.detection,
            rpn: entry.rpn,
            mitigation: entry.mitigation.clone(),
            residual_risk: entry.residual_risk,
        }
    }

    fn restore_into(&self, entry: &mut RiskEntry) {
        entry.date = self.date;
        entry.severity = self.severity;
        entry.occurrence = self.occurrence;
        entry.detection = self.detection;
        entry.rpn = self.rpn;
        entry.mitigation = self.mitigation.clone();
        entry.residual_risk = self.residual_risk;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEntry {
    pub id: String,
    pub number: String,
    pub process_step: String,
    pub hazard: String,
    pub severity: u8,
    pub occurrence: u8,
    pub detection: u8,
    pub rpn: u16,
    pub mitigation: String,
    pub residual_risk: RiskClass,
    pub status: Status,
    pub date: NaiveDate,
    /// Prior assessments, newest first. Grows by one per re-assessment,
    /// shrinks by one per revert.
    #[serde(default)]
    pub history: Vec<RiskSnapshot>,
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

impl ManagedRecord for RiskEntry {
    const MODULE: &'static str = "Risk Assessment";
    const NOUN: &'static str = "Risk Entry";
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
        vec![&self.number, &self.process_step, &self.hazard]
    }
}

pub struct NewRiskEntry {
    pub process_step: String,
    pub hazard: String,
    pub scores: RiskScores,
    pub mitigation: String,
}

pub type RiskRepository = Repository<RiskEntry>;

impl Repository<RiskEntry> {
    pub fn assess(&self, input: NewRiskEntry, user: &User) -> Result<RiskEntry> {
        if input.process_step.trim().is_empty() {
            return Err(Error::validation("process step is required"));
        }
        if input.hazard.trim().is_empty() {
            return Err(Error::validation("hazard is required"));
        }
        input.scores.validate()?;

        let rpn = input.scores.rpn();
        let count = self.count()?;
        let entry = RiskEntry {
            id: ident::record_id("risk")?,
            number: ident::display_number("RA", count + 1),
            process_step: input.process_step,
            hazard: input.hazard,
            severity: input.scores.severity,
            occurrence: input.scores.occurrence,
            detection: input.scores.detection,
            rpn,
            mitigation: input.mitigation,
            residual_risk: classify(rpn),
            status: WORKFLOW.initial,
            date: Utc::now().date_naive(),
            history: Vec::new(),
        };
        let details = format!(
            "Risk {} assessed for '{}' (RPN {})",
            entry.number, entry.process_step, entry.rpn
        );
        self.insert(entry, user, "Assessed Risk", details)
    }

    /// Re-assess an existing entry in place: the prior values are archived
    /// as exactly one new history entry, then the scores, mitigation and
    /// classification update on the same record.
    pub fn reassess(
        &self,
        id: &str,
        scores: RiskScores,
        mitigation: String,
        user: &User,
    ) -> Result<RiskEntry> {
        scores.validate()?;
        let mut entry = self.find(id)?;
        let snapshot = RiskSnapshot::of(&entry);
        entry.history.insert(0, snapshot);

        let rpn = scores.rpn();
        entry.severity = scores.severity;
        entry.occurrence = scores.occurrence;
        entry.detection = scores.detection;
        entry.rpn = rpn;
        entry.residual_risk = classify(rpn);
        entry.mitigation = mitigation;
        entry.date = Utc::now().date_naive();

        let details = format!(
            "Risk {} re-assessed (RPN {} -> {})",
            entry.number, entry.history[0].rpn, entry.rpn
        );
        self.update(entry, user, "Re-assessed Risk", details, None)
    }

    /// Undo to an archived assessment: the snapshot at `index` becomes
    /// current again and leaves the history, so each revert removes exactly
    /// one history entry.
    pub fn revert(&self, id: &str, index: usize, user: &User) -> Result<RiskEntry> {
        let mut entry = self.find(id)?;
        if index >= entry.history.len() {
            return Err(Error::NotFound {
                entity: "Risk snapshot",
                id: format!("{id}#{index}"),
            });
        }
        let restored = entry.history.remove(index);
        let superseded = entry.rpn;
        restored.restore_into(&mut entry);

        let details = format!(
            "Risk {} reverted to prior assessment (RPN {} -> {})",
            entry.number, superseded, entry.rpn
        );
        self.update(entry, user, "Reverted Risk Assessment", details, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpn_is_the_product_of_scores() {
        assert_eq!(rpn(5, 5, 6), 150);
        assert_eq!(rpn(1, 1, 1), 1);
        assert_eq!(rpn(10, 10, 10), 1000);
    }

    #[test]
    fn classification_thresholds_are_exclusive_bounds() {
        assert_eq!(classify(126), RiskClass::Critical);
        assert_eq!(classify(125), RiskClass::High);
        assert_eq!(classify(65), RiskClass::High);
        assert_eq!(classify(64), RiskClass::Medium);
        assert_eq!(classify(28), RiskClass::Medium);
        assert_eq!(classify(27), RiskClass::Low);
        assert_eq!(classify(1), RiskClass::Low);
    }

    #[test]
    fn score_validation_bounds() {
        assert!(RiskScores { severity: 0, occurrence: 5, detection: 5 }.validate().is_err());
        assert!(RiskScores { severity: 5, occurrence: 11, detection: 5 }.validate().is_err());
        assert!(RiskScores { severity: 1, occurrence: 10, detection: 3 }.validate().is_ok());
    }
}
