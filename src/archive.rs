//! Bulk archive: export every named collection as one JSON document and
//! import one back, overwriting collections verbatim.
//!
//! Import is destructive and irreversible without a prior export.

use serde_json::{Map, Value};

use crate::audit;
use crate::error::{Error, Result};
use crate::notify;
use crate::records::{
    audit_record, batch, capa, change, coa, deviation, inventory, lims, oos, recall, risk,
    stability,
};
use crate::store::KvStore;

/// Every persisted collection, the audit ledger and notification state
/// included.
pub const COLLECTION_KEYS: &[&str] = &[
    deviation::COLLECTION,
    capa::COLLECTION,
    audit_record::COLLECTION,
    risk::COLLECTION,
    oos::COLLECTION,
    recall::COLLECTION,
    change::COLLECTION,
    stability::COLLECTION,
    inventory::COLLECTION,
    lims::COLLECTION,
    coa::COLLECTION,
    batch::MFR_COLLECTION,
    batch::BMR_COLLECTION,
    audit::LEDGER_KEY,
    notify::HISTORY_KEY,
    notify::PREFS_KEY,
];

/// Bundle every present collection into one document keyed by collection
/// name. Missing collections are omitted rather than exported empty.
pub fn export(store: &dyn KvStore) -> Result<String> {
    let mut document = Map::new();
    for key in COLLECTION_KEYS {
        if let Some(raw) = store.get(key)? {
            let value: Value = serde_json::from_str(&raw)
                .map_err(|e| Error::Storage(format!("collection '{key}' corrupt: {e}")))?;
            document.insert((*key).to_string(), value);
        }
    }
    Ok(serde_json::to_string_pretty(&Value::Object(document))?)
}

/// Overwrite every collection named in the document. Returns the keys that
/// were restored, in document order.
pub fn import(store: &dyn KvStore, document: &str) -> Result<Vec<String>> {
    let parsed: Value = serde_json::from_str(document)
        .map_err(|e| Error::validation(format!("archive document is not valid JSON: {e}")))?;
    let Value::Object(entries) = parsed else {
        return Err(Error::validation("archive document must be a JSON object"));
    };

    let mut restored = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        store.set(&key, &serde_json::to_string(&value)?)?;
        restored.push(key);
    }
    Ok(restored)
}
