//! The decision contract: what one model turn must produce.
//!
//! Parsing goes through [`Decision::from_json`], which runs serde
//! deserialization *and* the invariants serde cannot express (plan length,
//! non-empty reasoning). A `Decision` value that exists has passed both.

use crate::action::Action;
use crate::error::DecodingFailure;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maximum number of entries in [`Decision::plan`].
pub const MAX_PLAN_STEPS: usize = 5;

/// One schema-valid output of a single reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Decision {
    /// Detailed reasoning about the current situation.
    pub reasoning: String,

    /// Access-level verification based on the current caller's permissions.
    pub security_check: String,

    /// Short summary of where the task currently stands.
    pub current_state: String,

    /// Remaining steps, 1 to 5 entries; the first one is executed now.
    #[schemars(length(min = 1, max = 5))]
    pub plan: Vec<String>,

    /// Advisory completion flag. Only the action kind ends the task.
    pub completed: bool,

    /// The single action to execute for the first plan step.
    pub action: Action,
}

impl Decision {
    /// Parse and validate a decision from a JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DecodingFailure> {
        let decision: Self = serde_json::from_value(value)
            .map_err(|e| DecodingFailure::SchemaViolation(e.to_string()))?;
        decision.validate()?;
        Ok(decision)
    }

    /// Parse and validate a decision from raw JSON text.
    pub fn from_json(text: &str) -> Result<Self, DecodingFailure> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| DecodingFailure::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Check the invariants serde cannot enforce on its own.
    pub fn validate(&self) -> Result<(), DecodingFailure> {
        if self.reasoning.trim().is_empty() {
            return Err(DecodingFailure::SchemaViolation("reasoning is empty".into()));
        }
        if self.security_check.trim().is_empty() {
            return Err(DecodingFailure::SchemaViolation(
                "security_check is empty".into(),
            ));
        }
        if self.plan.is_empty() {
            return Err(DecodingFailure::SchemaViolation("plan is empty".into()));
        }
        if self.plan.len() > MAX_PLAN_STEPS {
            return Err(DecodingFailure::SchemaViolation(format!(
                "plan has {} entries, at most {MAX_PLAN_STEPS} allowed",
                self.plan.len()
            )));
        }
        Ok(())
    }

    /// The plan step being executed right now.
    pub fn next_step(&self) -> &str {
        self.plan.first().map(String::as_str).unwrap_or_default()
    }

    /// The text body of the transcript turn that records this decision.
    pub fn summary(&self) -> String {
        format!("{}\n\nNext step: {}", self.reasoning, self.next_step())
    }

    /// JSON Schema of a decision, with every subschema inlined.
    pub fn json_schema() -> serde_json::Value {
        let settings = schemars::r#gen::SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
        });
        let schema = settings.into_generator().into_root_schema_for::<Self>();
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}
