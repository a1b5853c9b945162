use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ValidationError, Violation};
use crate::types::{Extensions, Plan};

use super::rules;

pub(crate) static COORD_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\d+,\s*\d+\)$").expect("valid"));
pub(crate) static COORD_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+,\s*\d+$").expect("valid"));
pub(crate) static COORD_XY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^x\s*=\s*\d+.*y\s*=\s*\d+").expect("valid"));

pub(crate) const FORBIDDEN_KEYS: &[&str] =
    &["x", "y", "coordinates", "pixels", "pixel", "pos", "position"];

/// Non-fatal findings from a successful validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValidationReport {
    pub warnings: Vec<Violation>,
}

pub struct Validator {
    violations: Vec<Violation>,
    warnings: Vec<Violation>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn finish(self) -> Result<ValidationReport, ValidationError> {
        if self.violations.is_empty() {
            Ok(ValidationReport {
                warnings: self.warnings,
            })
        } else {
            Err(ValidationError::new(self.violations))
        }
    }

    pub fn validate_plan(&mut self, plan: &Plan) {
        rules::plan::validate_plan(self, plan);
    }

    pub(crate) fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let w = Violation::new(path, message);
        tracing::warn!(path = %w.path, "{}", w.message);
        self.warnings.push(w);
    }

    pub(crate) fn validate_extensions(&mut self, path: &str, ext: &Extensions) {
        for key in ext.keys() {
            if FORBIDDEN_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                self.push(
                    format!("{path}.{key}"),
                    "raw pixel coordinates are not allowed in a plan",
                );
            }
        }
    }

    pub(crate) fn looks_like_coordinates(value: &str) -> bool {
        let v = value.trim();
        COORD_PAREN_RE.is_match(v) || COORD_PAIR_RE.is_match(v) || COORD_XY_RE.is_match(v)
    }
}
