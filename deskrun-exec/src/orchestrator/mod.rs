//! Drives one plan from INIT through a terminal state and back to INIT.

mod config;
mod feedback;
mod types;

use std::sync::Arc;
use std::time::Instant;

use deskrun_core::{
    validate_plan, ActionResult, ErrorClass, IllegalTransitionError, Plan, RecoveryStrategy,
    StepGraph, StepNode, StepStatus, TaskState, TaskStateMachine,
};
use deskrun_store::AuditStore;
use uuid::Uuid;

use crate::audit::{AuditReport, ExecutionAudit};
use crate::classify::{ClassifiedError, ErrorClassifier};
use crate::context::{DryRunIntent, ExecGate, ExecMode, ExecutionContext};
use crate::events::{Event, EventSink, NoOpEventSink};
use crate::executor::{BackendRegistry, ResourceLocks, StepExecutor, StepRequest};
use crate::recovery::Recovery;
use crate::retry::{RetryPolicy, SessionStats};
use crate::rollback::RollbackManager;
use crate::verify::{Verifier, WorldProbe};
use crate::watchdog::{NullProbe, PressureReading, SystemProbe, Watchdog};

pub use config::EngineConfig;
pub use feedback::{NoOpPlanFeedback, PlanFeedback, Replanner};
pub use types::{EngineError, TaskResult};

struct Failure {
    error: String,
    class: ErrorClass,
}

impl Failure {
    fn new(error: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            error: error.into(),
            class,
        }
    }
}

enum NodeOutcome {
    Succeeded,
    Skipped,
    Replanned,
    Failed(Failure),
}

enum Recovered {
    Result(ActionResult),
    Replanned,
    No,
}

/// State owned by a single run.
struct RunScope {
    run_id: Uuid,
    task_name: String,
    mode: ExecMode,
    ctx: ExecutionContext,
    watchdog: Watchdog,
    audit: ExecutionAudit,
    replanned: bool,
}

pub struct Orchestrator {
    config: EngineConfig,
    registry: Arc<BackendRegistry>,
    executor: StepExecutor,
    classifier: ErrorClassifier,
    retry: RetryPolicy,
    verifier: Verifier,
    recovery: Recovery,
    rollback: RollbackManager,
    state: TaskStateMachine,
    events: Arc<dyn EventSink>,
    store: Option<Arc<dyn AuditStore>>,
    feedback: Arc<dyn PlanFeedback>,
    replanner: Option<Arc<dyn Replanner>>,
    probe: Arc<dyn SystemProbe>,
    watched: Vec<String>,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, registry: Arc<BackendRegistry>) -> Self {
        Self {
            executor: StepExecutor::new(Arc::clone(&registry))
                .with_locks(ResourceLocks::new(config.shared_methods.iter().copied())),
            classifier: ErrorClassifier::new(),
            retry: RetryPolicy::new(config.retry.clone()),
            verifier: Verifier::new(config.verify.clone()),
            recovery: Recovery::new(config.recovery.clone()),
            rollback: RollbackManager::new(Arc::clone(&registry))
                .with_timeout(config.rollback_timeout),
            state: TaskStateMachine::new(),
            events: Arc::new(NoOpEventSink),
            store: None,
            feedback: Arc::new(NoOpPlanFeedback),
            replanner: None,
            probe: Arc::new(NullProbe),
            watched: Vec::new(),
            registry,
            config,
        }
    }

    pub fn with_world_probe(mut self, probe: Arc<dyn WorldProbe>) -> Self {
        self.verifier = self.verifier.with_probe(probe);
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn with_audit_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_plan_feedback(mut self, feedback: Arc<dyn PlanFeedback>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_replanner(mut self, replanner: Arc<dyn Replanner>) -> Self {
        self.replanner = Some(replanner);
        self
    }

    pub fn with_system_probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Process the watchdog should keep an eye on during every run.
    pub fn with_watched_process(mut self, name: impl Into<String>) -> Self {
        self.watched.push(name.into());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn state_machine(&self) -> &TaskStateMachine {
        &self.state
    }

    pub fn session_stats(&self) -> SessionStats {
        self.retry.session_stats()
    }

    pub async fn run(&self, plan: &Plan) -> TaskResult {
        self.run_in_mode(plan, self.config.mode).await
    }

    /// Executes `plan` end to end. Never panics and never leaves the engine outside INIT,
    /// except when it refuses to start because another run is active.
    pub async fn run_in_mode(&self, plan: &Plan, mode: ExecMode) -> TaskResult {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let task_name = match plan.task.trim() {
            "" => "unknown".to_string(),
            t => t.to_string(),
        };

        if let Err(e) = self
            .state
            .transition_from(TaskState::Init, TaskState::Planned)
            .await
        {
            let err = EngineError::Busy(e.from);
            tracing::warn!(%run_id, task = %task_name, error = %err, "run rejected");
            return TaskResult::rejected(run_id, &task_name, mode, &err, started.elapsed());
        }

        let mut scope = RunScope {
            run_id,
            ctx: ExecutionContext::new(mode),
            watchdog: Watchdog::new(self.config.watchdog.clone(), Arc::clone(&self.probe)),
            audit: ExecutionAudit::new(&task_name, run_id, self.store.clone()),
            task_name,
            mode,
            replanned: false,
        };
        for name in &self.watched {
            scope.watchdog.watch_process(name.clone());
        }
        self.retry.reset_session();
        self.rollback.clear().await;
        scope.watchdog.start();

        tracing::info!(%run_id, task = %scope.task_name, %mode, steps = plan.steps.len(), "run started");
        self.emit(
            &scope,
            Event::TaskStarted {
                run_id,
                task: scope.task_name.clone(),
                mode,
                steps: plan.steps.len(),
            },
        )
        .await;

        let mut graph = None;
        let failure = match self.drive(&mut scope, plan, &mut graph).await {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(%run_id, error = %e, "run aborted by engine error");
                Some(Failure::new(e.to_string(), ErrorClass::Unknown))
            }
        };
        self.finish(scope, plan, graph, failure, started).await
    }

    async fn drive(
        &self,
        scope: &mut RunScope,
        plan: &Plan,
        slot: &mut Option<StepGraph>,
    ) -> Result<Option<Failure>, EngineError> {
        if let Err(e) = validate_plan(plan) {
            let error = format!("invalid plan: {}", e.messages().join("; "));
            return Ok(Some(Failure::new(error, ErrorClass::SchemaInvalid)));
        }
        let mut built = match StepGraph::from_plan(plan) {
            Ok(g) => g,
            Err(e) => {
                return Ok(Some(Failure::new(
                    format!("invalid plan: {e}"),
                    ErrorClass::SchemaInvalid,
                )))
            }
        };
        built.freeze();
        let graph = slot.insert(built);
        tracing::debug!(steps = graph.len(), "graph built and frozen");

        loop {
            let ready: Vec<String> = graph.pending_nodes().iter().map(|n| n.id.clone()).collect();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                match self.exec_node(scope, plan, graph, &id).await? {
                    NodeOutcome::Succeeded | NodeOutcome::Skipped => {}
                    // The frontier changed shape.
                    NodeOutcome::Replanned => break,
                    NodeOutcome::Failed(f) => return Ok(Some(f)),
                }
            }
        }

        if !graph.is_complete() {
            let stuck = graph.count(StepStatus::Pending);
            return Ok(Some(Failure::new(
                format!("incomplete: {stuck} steps never became ready"),
                ErrorClass::Unknown,
            )));
        }
        Ok(None)
    }

    async fn exec_node(
        &self,
        scope: &mut RunScope,
        plan: &Plan,
        graph: &mut StepGraph,
        id: &str,
    ) -> Result<NodeOutcome, EngineError> {
        let total = graph.len();
        let (label, request) = {
            let node = graph
                .get(id)
                .ok_or_else(|| EngineError::UnknownStep(id.to_string()))?;
            (node.label(total), StepRequest::from_node(node))
        };

        if scope.watchdog.abort_requested() {
            self.forward_alerts(scope).await;
            let reason = scope
                .watchdog
                .abort_reason()
                .unwrap_or_else(|| "watchdog abort".to_string());
            let failure = Failure::new(reason, ErrorClass::Timeout);
            node_mut(graph, id)?.mark_failed(failure.error.clone());
            tracing::error!(step = %label, reason = %failure.error, "run halted by watchdog");
            self.emit(
                scope,
                Event::StepFailed {
                    run_id: scope.run_id,
                    step_id: id.to_string(),
                    error: failure.error.clone(),
                    error_class: failure.class,
                },
            )
            .await;
            return Ok(NodeOutcome::Failed(failure));
        }
        self.forward_alerts(scope).await;

        match scope.ctx.can_execute(&request.action) {
            ExecGate::Allowed => {}
            ExecGate::Blocked(reason) => {
                tracing::info!(step = %label, mode = %scope.mode, %reason, "step skipped");
                node_mut(graph, id)?.mark_skipped(reason.clone());
                scope.ctx.record_blocked(id, &reason);
                self.emit(
                    scope,
                    Event::StepSkipped {
                        run_id: scope.run_id,
                        step_id: id.to_string(),
                        reason,
                    },
                )
                .await;
                return Ok(NodeOutcome::Skipped);
            }
            ExecGate::Simulated => {
                let node = node_mut(graph, id)?;
                node.mark_skipped("dry run");
                let node = node.clone();
                self.record_intent(scope, &node).await;
                return Ok(NodeOutcome::Skipped);
            }
        }

        self.state
            .transition_at(TaskState::Executing, Some(label.clone()))
            .await?;
        node_mut(graph, id)?.mark_running();
        scope.watchdog.heartbeat(label.clone());
        scope
            .ctx
            .record_step_start(id, &request.action, &request.value);
        tracing::info!(step = %label, value = %request.value, method = %request.method, "step started");
        self.emit(
            scope,
            Event::StepStarted {
                run_id: scope.run_id,
                step_id: id.to_string(),
                label: label.clone(),
                action: request.action.clone(),
                value: request.value.clone(),
                method: request.method,
            },
        )
        .await;

        self.pressure_delay(scope).await;

        let outcome = self.retry.execute_with_retry(&self.executor, &request).await;
        scope.watchdog.heartbeat(label.clone());
        node_mut(graph, id)?.attempts = outcome.attempts;
        if outcome.attempts > 1 {
            scope.ctx.increment_retry();
            self.emit(
                scope,
                Event::StepRetried {
                    run_id: scope.run_id,
                    step_id: id.to_string(),
                    attempts: outcome.attempts,
                    retries: outcome.retries,
                    methods_tried: outcome.methods_tried.clone(),
                },
            )
            .await;
        }

        let mut result = outcome.result;
        if !result.success {
            let classified = outcome
                .classified
                .unwrap_or_else(|| self.classifier.classify_result(&result));
            tracing::warn!(step = %label, class = %classified.error_class, error = %result.error, "step exhausted retries");
            match self
                .recover(scope, plan, graph, id, &label, &request, &classified)
                .await?
            {
                Recovered::Result(r) => result = r,
                Recovered::Replanned => return Ok(NodeOutcome::Replanned),
                Recovered::No => {
                    let error = format!(
                        "{}: all retries exhausted ({})",
                        classified.error_class, result.error
                    );
                    let failure = self
                        .fail_node(scope, graph, id, &result, error, classified.error_class)
                        .await?;
                    return Ok(NodeOutcome::Failed(failure));
                }
            }
        }

        self.state
            .transition_at(TaskState::Verifying, Some(label.clone()))
            .await?;
        let verify_request = request.with_method(result.method);
        if !self.verifier.verify(&verify_request).await {
            self.emit(
                scope,
                Event::VerifyFailed {
                    run_id: scope.run_id,
                    step_id: id.to_string(),
                    action: request.action.clone(),
                },
            )
            .await;
            self.state
                .transition_at(TaskState::Recovering, Some(label.clone()))
                .await?;
            let recovered = self
                .recovery
                .recover_verify_failure(&self.verifier, &self.executor, &verify_request)
                .await;
            if !recovered {
                let error = "verification failed after recovery".to_string();
                let class = self
                    .classifier
                    .classify(&error, &request.action, result.method)
                    .error_class;
                let failure = self.fail_node(scope, graph, id, &result, error, class).await?;
                return Ok(NodeOutcome::Failed(failure));
            }
            self.state
                .transition_at(TaskState::Verifying, Some(label.clone()))
                .await?;
        }

        let node = {
            let node = node_mut(graph, id)?;
            node.mark_success(result.method);
            node.clone()
        };
        scope.ctx.record_step_end(id, true, result.method, None);
        tracing::info!(step = %label, method = %result.method, elapsed_ms = result.execution_time_ms, "step succeeded");
        self.emit(
            scope,
            Event::StepSucceeded {
                run_id: scope.run_id,
                step_id: id.to_string(),
                method: result.method,
                attempts: outcome.attempts,
                elapsed_ms: result.execution_time_ms,
            },
        )
        .await;
        self.rollback.push(&node).await;
        Ok(NodeOutcome::Succeeded)
    }

    #[allow(clippy::too_many_arguments)]
    async fn recover(
        &self,
        scope: &mut RunScope,
        plan: &Plan,
        graph: &mut StepGraph,
        id: &str,
        label: &str,
        request: &StepRequest,
        classified: &ClassifiedError,
    ) -> Result<Recovered, EngineError> {
        self.state
            .transition_at(TaskState::Recovering, Some(label.to_string()))
            .await?;
        let strategy = classified.strategy;
        self.emit(
            scope,
            Event::RecoveryStarted {
                run_id: scope.run_id,
                step_id: id.to_string(),
                strategy,
            },
        )
        .await;

        if strategy == RecoveryStrategy::Replan && !scope.replanned {
            if let Some(replanner) = &self.replanner {
                let failed = graph
                    .get(id)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownStep(id.to_string()))?;
                if let Some(steps) = replanner.replan(plan, &failed, classified).await {
                    match graph.splice_from(id, &steps) {
                        Ok(added) => {
                            scope.replanned = true;
                            tracing::info!(step = %label, added = added.len(), "remaining steps replanned");
                            self.emit(
                                scope,
                                Event::RecoveryFinished {
                                    run_id: scope.run_id,
                                    step_id: id.to_string(),
                                    strategy,
                                    success: true,
                                },
                            )
                            .await;
                            self.state.transition(TaskState::Planned).await?;
                            return Ok(Recovered::Replanned);
                        }
                        Err(e) => tracing::warn!(step = %label, error = %e, "replan rejected"),
                    }
                }
            }
        }

        let recovered = if classified.is_fatal() {
            None
        } else {
            self.recovery
                .full_reset(&self.registry, &self.executor, request, classified.error_class)
                .await
        };
        let success = recovered.as_ref().is_some_and(|r| r.success);
        self.emit(
            scope,
            Event::RecoveryFinished {
                run_id: scope.run_id,
                step_id: id.to_string(),
                strategy,
                success,
            },
        )
        .await;
        Ok(match recovered {
            Some(r) if r.success => Recovered::Result(r),
            _ => Recovered::No,
        })
    }

    async fn fail_node(
        &self,
        scope: &RunScope,
        graph: &mut StepGraph,
        id: &str,
        result: &ActionResult,
        error: String,
        class: ErrorClass,
    ) -> Result<Failure, EngineError> {
        node_mut(graph, id)?.mark_failed(error.clone());
        scope
            .ctx
            .record_step_end(id, false, result.method, Some(&error));
        tracing::error!(step_id = id, %class, %error, "step failed");
        self.emit(
            scope,
            Event::StepFailed {
                run_id: scope.run_id,
                step_id: id.to_string(),
                error: error.clone(),
                error_class: class,
            },
        )
        .await;
        Ok(Failure::new(error, class))
    }

    async fn record_intent(&self, scope: &RunScope, node: &StepNode) {
        let intent = DryRunIntent {
            step_id: node.id.clone(),
            action: node.action.clone(),
            value: node.value.clone(),
            method: node.method,
        };
        scope.ctx.record_dry_run(intent.clone());
        self.emit(
            scope,
            Event::DryRunIntent {
                run_id: scope.run_id,
                step_id: intent.step_id,
                action: intent.action,
                value: intent.value,
                method: intent.method,
            },
        )
        .await;
    }

    async fn forward_alerts(&self, scope: &RunScope) {
        for alert in scope.watchdog.drain_alerts() {
            self.emit(
                scope,
                Event::WatchdogAlert {
                    run_id: scope.run_id,
                    kind: alert.kind,
                    message: alert.message,
                },
            )
            .await;
        }
    }

    async fn pressure_delay(&self, scope: &RunScope) {
        let Some(reading) = PressureReading::measure(self.probe.as_ref()) else {
            return;
        };
        scope.ctx.set_system_load(reading.score);
        let delay = reading.recommended_delay();
        if delay.is_zero() {
            return;
        }
        if reading.is_high() {
            tracing::warn!(score = reading.score, delay_ms = delay.as_millis() as u64, "system under pressure");
        } else {
            tracing::debug!(score = reading.score, delay_ms = delay.as_millis() as u64, "pressure delay");
        }
        tokio::time::sleep(delay).await;
    }

    /// Walks the legal path from wherever the run stopped to SUCCESS.
    async fn advance_to_success(&self) -> Result<(), EngineError> {
        loop {
            let next = match self.state.current().await {
                TaskState::Planned => TaskState::Executing,
                TaskState::Executing | TaskState::Recovering => TaskState::Verifying,
                TaskState::Verifying => TaskState::Success,
                TaskState::Success => return Ok(()),
                from => {
                    return Err(IllegalTransitionError {
                        from,
                        to: TaskState::Success,
                    }
                    .into())
                }
            };
            self.state.transition(next).await?;
        }
    }

    async fn finish(
        &self,
        scope: RunScope,
        plan: &Plan,
        mut graph: Option<StepGraph>,
        mut failure: Option<Failure>,
        started: Instant,
    ) -> TaskResult {
        if failure.is_none() {
            if let Err(e) = self.advance_to_success().await {
                failure = Some(Failure::new(e.to_string(), ErrorClass::Unknown));
            }
        }
        if failure.is_some() {
            if let Err(e) = self.state.transition(TaskState::Failed).await {
                tracing::warn!(error = %e, "could not record FAILED state");
            }
        }
        let success = failure.is_none();

        let (steps_done, steps_skipped, steps_total) = graph
            .as_ref()
            .map(|g| {
                let s = g.summary();
                (s.success, s.skipped, s.total)
            })
            .unwrap_or((0, 0, plan.steps.len()));

        let rollbacks = if success {
            Vec::new()
        } else {
            self.rollback.rollback_all().await
        };
        for rb in &rollbacks {
            if rb.success {
                if let Some(node) = graph.as_mut().and_then(|g| g.get_mut(&rb.source_step)) {
                    node.mark_rolled_back();
                }
            }
            self.emit(
                &scope,
                Event::RollbackExecuted {
                    run_id: scope.run_id,
                    source_step: rb.source_step.clone(),
                    action: rb.action.clone(),
                    success: rb.success,
                    error: rb.error.clone(),
                },
            )
            .await;
        }

        self.forward_alerts(&scope).await;
        let snapshot = scope.ctx.snapshot();
        self.emit(
            &scope,
            Event::ContextSnapshot {
                run_id: scope.run_id,
                snapshot: snapshot.clone(),
            },
        )
        .await;

        let (error, error_class) = match failure {
            Some(f) => (Some(f.error), Some(f.class)),
            None => (None, None),
        };
        let duration = started.elapsed();
        self.emit(
            &scope,
            Event::TaskFinished {
                run_id: scope.run_id,
                success,
                steps_done,
                steps_total,
                duration_ms: duration.as_millis() as u64,
                error: error.clone(),
            },
        )
        .await;

        let context = serde_json::to_value(&snapshot).unwrap_or_default();
        let report = match scope.audit.finish(success, error.as_deref(), context).await {
            Ok(r) => r,
            Err(e) => {
                let err = EngineError::from(e);
                tracing::warn!(error = %err, "audit trail not persisted");
                AuditReport::default()
            }
        };

        let result = TaskResult {
            run_id: scope.run_id,
            success,
            task_name: scope.task_name.clone(),
            mode: scope.mode,
            steps_done,
            steps_skipped,
            steps_total,
            duration_ms: duration.as_millis() as u64,
            error,
            error_class,
            crash_dump: report.crash_dump,
            audit_log: report.log_location,
            rollbacks,
            dry_run: scope.ctx.dry_run_intents(),
            graph,
        };

        match &result.error {
            None => self.feedback.reinforce(plan, &result).await,
            Some(err) => self.feedback.invalidate(plan, err).await,
        }

        scope.watchdog.stop();
        if self.state.transition(TaskState::Init).await.is_err() {
            self.state.force_reset().await;
        }
        tracing::info!(run_id = %result.run_id, %result, "run finished");
        result
    }

    async fn emit(&self, scope: &RunScope, event: Event) {
        scope.audit.record(&event).await;
        self.events.emit(event).await;
    }
}

fn node_mut<'g>(graph: &'g mut StepGraph, id: &str) -> Result<&'g mut StepNode, EngineError> {
    graph
        .get_mut(id)
        .ok_or_else(|| EngineError::UnknownStep(id.to_string()))
}
