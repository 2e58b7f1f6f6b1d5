//! Material inventory: quarantine-to-release of APIs, excipients and
//! packaging stock.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::repository::{ManagedRecord, Repository};
use crate::user::User;
use crate::workflow::{Action, Status, WorkflowSpec};

pub const COLLECTION: &str = "pharma_inventory_v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialCategory {
    Api,
    Excipient,
    Packaging,
    Consumable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub number: String,
    pub name: String,
    pub category: MaterialCategory,
    pub lot_number: String,
    pub stock: f64,
    pub unit: String,
    pub reorder_level: f64,
    pub expiry_date: NaiveDate,
    pub manufacturer_name: String,
    pub storage_condition: String,
    pub status: Status,
}

static WORKFLOW: WorkflowSpec = WorkflowSpec {
    initial: Status::Quarantine,
    transitions: &[
        (Status::Quarantine, Action::Approve, Status::Approved),
        (Status::Quarantine, Action::Reject, Status::Rejected),
    ],
    admin_actions: &[Action::Approve, Action::Reject],
    signed_actions: &[Action::Approve],
};

impl ManagedRecord for InventoryItem {
    const MODULE: &'static str = "Inventory";
    const NOUN: &'static str = "Inventory Item";
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
        vec![&self.number, &self.name, &self.lot_number]
    }
}

pub struct NewInventoryItem {
    pub name: String,
    pub category: MaterialCategory,
    pub lot_number: String,
    pub stock: f64,
    pub unit: String,
    pub reorder_level: f64,
    pub expiry_date: NaiveDate,
    pub manufacturer_name: String,
    pub storage_condition: String,
}

pub type InventoryRepository = Repository<InventoryItem>;

impl Repository<InventoryItem> {
    /// Receive a lot into quarantine.
    pub fn receive(&self, input: NewInventoryItem, user: &User) -> Result<InventoryItem> {
        if input.name.trim().is_empty() {
            return Err(Error::validation("material name is required"));
        }
        if input.lot_number.trim().is_empty() {
            return Err(Error::validation("lot number is required"));
        }

        let count = self.count()?;
        let record = InventoryItem {
            id: ident::record_id("mat")?,
            number: ident::display_number("MAT", count + 1),
            name: input.name,
            category: input.category,
            lot_number: input.lot_number,
            stock: input.stock,
            unit: input.unit,
            reorder_level: input.reorder_level,
            expiry_date: input.expiry_date,
            manufacturer_name: input.manufacturer_name,
            storage_condition: input.storage_condition,
            status: WORKFLOW.initial,
        };
        let details = format!(
            "Material {} lot {} received into quarantine",
            record.name, record.lot_number
        );
        self.insert(record, user, "Received Material", details)
    }

    /// Record a stock draw-down; refuses to go negative.
    pub fn consume(&self, id: &str, quantity: f64, user: &User) -> Result<InventoryItem> {
        if quantity <= 0.0 {
            return Err(Error::validation("consumed quantity must be positive"));
        }
        let mut record = self.find(id)?;
        if record.status != Status::Approved {
            return Err(Error::validation(format!(
                "lot {} is not released for use",
                record.lot_number
            )));
        }
        if quantity > record.stock {
            return Err(Error::validation(format!(
                "insufficient stock: {} {} on hand",
                record.stock, record.unit
            )));
        }
        record.stock -= quantity;
        let details = format!(
            "Material {} lot {} stock reduced by {} {}",
            record.name, record.lot_number, quantity, record.unit
        );
        self.update(record, user, "Consumed Material", details, None)
    }
}
