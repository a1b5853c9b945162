#![forbid(unsafe_code)]

pub mod audit;
pub mod classify;
pub mod context;
pub mod events;
pub mod executor;
pub mod metrics;
pub mod orchestrator;
pub mod recovery;
pub mod retry;
pub mod rollback;
pub mod verify;
pub mod watchdog;

pub use audit::{AuditReport, ExecutionAudit, ReplayStep};
pub use classify::{fallback_method, ClassifiedError, ErrorClassifier};
pub use context::{ContextSnapshot, DryRunIntent, ExecGate, ExecMode, ExecutionContext};
pub use events::{
    CompositeEventSink, Event, EventSink, NoOpEventSink, StdoutEventSink, TracingEventSink,
};
pub use executor::{
    ActionBackend, AttemptRunner, BackendError, BackendRegistry, BackendReply, ResourceLocks,
    StepExecutor, StepRequest,
};
pub use metrics::{MetricsCollector, MetricsEventSink, RunMetrics};
pub use orchestrator::{
    EngineConfig, EngineError, NoOpPlanFeedback, Orchestrator, PlanFeedback, Replanner,
    TaskResult,
};
pub use recovery::{Recovery, RecoveryConfig};
pub use retry::{RetryConfig, RetryOutcome, RetryPolicy, SessionStats};
pub use rollback::{RollbackEntry, RollbackManager, RollbackOutcome};
pub use verify::{Verifier, VerifyConfig, WorldProbe};
pub use watchdog::{
    AlertKind, NullProbe, PressureReading, ProcProbe, SystemProbe, Watchdog, WatchdogAlert,
    WatchdogConfig,
};
