#![forbid(unsafe_code)]

pub mod fs;
pub mod memory;
pub mod store;

pub use crate::fs::FileAuditStore;
pub use crate::memory::MemoryAuditStore;
pub use crate::store::{AuditEntry, AuditLog, AuditStore, CrashDump, RunOutcome, StoreError};
