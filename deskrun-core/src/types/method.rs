use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Execution backend a step should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Accessibility,
    Browser,
    System,
    Cv,
    Auto,
}

impl Method {
    pub const CONCRETE: [Method; 4] = [
        Method::Accessibility,
        Method::Browser,
        Method::System,
        Method::Cv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Accessibility => "accessibility",
            Method::Browser => "browser",
            Method::System => "system",
            Method::Cv => "cv",
            Method::Auto => "auto",
        }
    }

    /// Lenient parse used for planner input: unknown names become `Auto`.
    pub fn parse_lenient(s: &str) -> Method {
        s.parse().unwrap_or(Method::Auto)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accessibility" => Ok(Method::Accessibility),
            "browser" => Ok(Method::Browser),
            "system" => Ok(Method::System),
            "cv" => Ok(Method::Cv),
            "auto" | "" => Ok(Method::Auto),
            other => Err(format!("unknown method '{other}'")),
        }
    }
}
