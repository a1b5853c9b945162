#![forbid(unsafe_code)]

pub mod error;
pub mod graph;
pub mod parser;
pub mod state;
pub mod types;
pub mod validate;

pub use crate::error::{
    DeskrunError, GraphBuildError, GraphMutationError, IllegalTransitionError, ParseError,
    ValidationError, Violation,
};
pub use crate::graph::{GraphSummary, StepGraph, StepNode, StepStatus};
pub use crate::parser::{parse_plan_str, ParsedPlan, PlanFormat};
pub use crate::state::{MachineStatus, TaskState, TaskStateMachine, TransitionRecord};
pub use crate::types::{ActionResult, ErrorClass, Method, Plan, PlanStep, RecoveryStrategy};
pub use crate::validate::{validate_plan, Validate, ValidationReport};
