use async_trait::async_trait;
use deskrun_core::{Plan, PlanStep, StepNode};

use super::types::TaskResult;
use crate::classify::ClassifiedError;

/// External plan cache / learning collaborator.
#[async_trait]
pub trait PlanFeedback: Send + Sync {
    /// The plan worked; keep it.
    async fn reinforce(&self, plan: &Plan, result: &TaskResult);

    /// The plan failed; drop any cached copy.
    async fn invalidate(&self, plan: &Plan, error: &str);
}

pub struct NoOpPlanFeedback;

#[async_trait]
impl PlanFeedback for NoOpPlanFeedback {
    async fn reinforce(&self, _plan: &Plan, _result: &TaskResult) {}

    async fn invalidate(&self, _plan: &Plan, _error: &str) {}
}

/// Produces a replacement for the remainder of a plan after a failure classified as `replan`.
#[async_trait]
pub trait Replanner: Send + Sync {
    async fn replan(
        &self,
        plan: &Plan,
        failed: &StepNode,
        error: &ClassifiedError,
    ) -> Option<Vec<PlanStep>>;
}
