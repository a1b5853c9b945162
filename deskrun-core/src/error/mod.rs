use thiserror::Error;

use crate::state::TaskState;

#[derive(Debug, Error)]
pub enum DeskrunError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    GraphBuild(#[from] GraphBuildError),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse plan as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse plan as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unable to auto-detect plan format (neither valid JSON nor valid YAML)")]
    UnknownFormat,
}

#[derive(Debug, Error)]
#[error("plan failed validation ({violations_len} violations)")]
pub struct ValidationError {
    pub violations: Vec<Violation>,
    violations_len: usize,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        let violations_len = violations.len();
        Self {
            violations,
            violations_len,
        }
    }

    /// One line per violation, `path: message`.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Raised while turning a step list into a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphBuildError {
    #[error("plan has no steps")]
    EmptyPlan,
    #[error("duplicate step id '{0}'")]
    DuplicateId(String),
    #[error("step '{node}' depends on unknown id '{dependency}'")]
    UnknownDependency { node: String, dependency: String },
    #[error("circular dependency detected at step '{0}'")]
    Cycle(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphMutationError {
    #[error("graph is frozen; structural edits are not allowed")]
    Frozen,
    #[error("unknown step id '{0}'")]
    UnknownNode(String),
    #[error(transparent)]
    Build(#[from] GraphBuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal task transition {from} -> {to}")]
pub struct IllegalTransitionError {
    pub from: TaskState,
    pub to: TaskState,
}
