use std::path::PathBuf;

use async_trait::async_trait;

use crate::store::types::*;

/// Durable sink for per-run audit logs and crash dumps.
///
/// Save methods return a location string (a file path for the file store) that callers
/// surface to users.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn save_log(&self, log: &AuditLog) -> Result<String, StoreError>;

    async fn save_crash_dump(&self, dump: &CrashDump) -> Result<String, StoreError>;

    /// Task ids with a stored crash dump, newest first.
    async fn list_crash_dumps(&self) -> Result<Vec<String>, StoreError>;

    async fn load_crash_dump(&self, task_id: &str) -> Result<Option<CrashDump>, StoreError>;

    async fn load_log(&self, task_id: &str) -> Result<Option<AuditLog>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("audit record encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
