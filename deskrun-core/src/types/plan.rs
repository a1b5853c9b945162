use serde::{Deserialize, Deserializer, Serialize};

use super::common::Extensions;

/// Declarative plan handed over by the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Explicit predecessors. `None` means "the previous step".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    /// Overrides the default compensating action for `action`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<String>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Plan {
    pub fn new(task: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            task: task.into(),
            steps,
            ..Default::default()
        }
    }
}

impl PlanStep {
    pub fn new(action: impl Into<String>, value: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            value: value.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = Some(deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rollback(mut self, action: impl Into<String>) -> Self {
        self.rollback = Some(action.into());
        self
    }
}

fn default_method() -> String {
    "auto".to_string()
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}
