mod trait_store;
mod types;

pub use trait_store::{AuditStore, StoreError};
pub use types::{AuditEntry, AuditLog, CrashDump, RunOutcome};
