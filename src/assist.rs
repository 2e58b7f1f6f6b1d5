//! Optional generative-assist collaborator.
//!
//! Treated as unreliable by contract: it may fail, time out, or simply not
//! be configured. Every caller keeps a manual path, so a failed call
//! degrades to "no suggestion available" and never touches a record.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

pub trait Advisor: Send + Sync {
    /// Ask the collaborator for structured JSON matching `schema`.
    fn generate(&self, prompt: &str, schema: &Value) -> Result<Value>;
}

/// Advisor used when no collaborator is configured or the link is down.
pub struct OfflineAdvisor;

impl Advisor for OfflineAdvisor {
    fn generate(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
        Err(Error::CollaboratorUnavailable("no advisor configured".into()))
    }
}

/// Fetch a typed suggestion, swallowing every failure into `None`.
pub fn suggest<T: DeserializeOwned>(advisor: &dyn Advisor, prompt: &str, schema: &Value) -> Option<T> {
    match advisor.generate(prompt, schema) {
        Ok(value) => serde_json::from_value(value).ok(),
        Err(err) => {
            tracing::warn!(
                target: "pharmaqualify::assist",
                %err,
                "suggestion unavailable, falling back to manual entry"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Scoping {
        root_cause: String,
    }

    struct CannedAdvisor(Value);

    impl Advisor for CannedAdvisor {
        fn generate(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn offline_advisor_degrades_to_none() {
        let got: Option<Scoping> = suggest(&OfflineAdvisor, "why", &Value::Null);
        assert_eq!(got, None);
    }

    #[test]
    fn canned_advisor_yields_typed_suggestion() {
        let advisor = CannedAdvisor(serde_json::json!({"root_cause": "column degradation"}));
        let got: Option<Scoping> = suggest(&advisor, "why", &Value::Null);
        assert_eq!(got, Some(Scoping { root_cause: "column degradation".into() }));
    }

    #[test]
    fn shape_mismatch_degrades_to_none() {
        let advisor = CannedAdvisor(serde_json::json!({"unexpected": true}));
        let got: Option<Scoping> = suggest(&advisor, "why", &Value::Null);
        assert_eq!(got, None);
    }
}
