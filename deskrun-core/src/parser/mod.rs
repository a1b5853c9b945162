use crate::error::ParseError;
use crate::types::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ParsedPlan {
    pub plan: Plan,
    pub format: PlanFormat,
}

pub fn parse_plan_str(input: &str, format: PlanFormat) -> Result<ParsedPlan, ParseError> {
    match format {
        PlanFormat::Json => Ok(ParsedPlan {
            plan: serde_json::from_str::<Plan>(input)?,
            format,
        }),
        PlanFormat::Yaml => Ok(ParsedPlan {
            plan: serde_yaml::from_str::<Plan>(input)?,
            format,
        }),
        PlanFormat::Auto => parse_plan_auto(input),
    }
}

fn parse_plan_auto(input: &str) -> Result<ParsedPlan, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::UnknownFormat);
    }

    // JSON always starts with `{` or `[` after trimming.
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return match serde_json::from_str::<Plan>(input) {
            Ok(plan) => Ok(ParsedPlan {
                plan,
                format: PlanFormat::Json,
            }),
            Err(e) => match serde_yaml::from_str::<Plan>(input) {
                Ok(plan) => Ok(ParsedPlan {
                    plan,
                    format: PlanFormat::Yaml,
                }),
                Err(_) => Err(ParseError::Json(e)),
            },
        };
    }

    match serde_yaml::from_str::<Plan>(input) {
        Ok(plan) => Ok(ParsedPlan {
            plan,
            format: PlanFormat::Yaml,
        }),
        Err(e) => {
            if let Ok(plan) = serde_json::from_str::<Plan>(input) {
                return Ok(ParsedPlan {
                    plan,
                    format: PlanFormat::Json,
                });
            }
            Err(ParseError::Yaml(e))
        }
    }
}
