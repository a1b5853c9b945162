mod atomic;
mod store;

pub use store::FileAuditStore;
