mod backend;
pub mod concurrency;
mod registry;
mod step;

pub use backend::{ActionBackend, BackendError, BackendReply, StepRequest};
pub use concurrency::{ResourceLocks, ResourcePermit};
pub use registry::{static_method, BackendRegistry, BROWSER_NATIVE, SYSTEM_NATIVE};
pub use step::{AttemptRunner, StepExecutor};
