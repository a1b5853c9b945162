mod action;
mod common;
mod method;
mod plan;

pub use action::{ActionResult, ErrorClass, RecoveryStrategy};
pub use common::{Extensions, Metadata};
pub use method::Method;
pub use plan::{Plan, PlanStep};
