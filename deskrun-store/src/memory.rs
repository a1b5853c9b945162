use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::{AuditLog, AuditStore, CrashDump, StoreError};

/// Keeps audit records in memory. Handy for tests and embedding.
#[derive(Default)]
pub struct MemoryAuditStore {
    logs: Mutex<BTreeMap<String, AuditLog>>,
    crashes: Mutex<Vec<CrashDump>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn logs(&self) -> Vec<AuditLog> {
        self.logs.lock().await.values().cloned().collect()
    }

    pub async fn crash_dumps(&self) -> Vec<CrashDump> {
        self.crashes.lock().await.clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn save_log(&self, log: &AuditLog) -> Result<String, StoreError> {
        let key = format!("{}_{}", log.task_id, log.outcome.as_str());
        self.logs.lock().await.insert(key.clone(), log.clone());
        Ok(format!("memory://{key}"))
    }

    async fn save_crash_dump(&self, dump: &CrashDump) -> Result<String, StoreError> {
        let mut crashes = self.crashes.lock().await;
        crashes.retain(|d| d.task_id != dump.task_id);
        crashes.push(dump.clone());
        Ok(format!("memory://CRASH_{}", dump.task_id))
    }

    async fn list_crash_dumps(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .crashes
            .lock()
            .await
            .iter()
            .rev()
            .map(|d| d.task_id.clone())
            .collect())
    }

    async fn load_crash_dump(&self, task_id: &str) -> Result<Option<CrashDump>, StoreError> {
        Ok(self
            .crashes
            .lock()
            .await
            .iter()
            .find(|d| d.task_id == task_id)
            .cloned())
    }

    async fn load_log(&self, task_id: &str) -> Result<Option<AuditLog>, StoreError> {
        Ok(self
            .logs
            .lock()
            .await
            .values()
            .find(|l| l.task_id == task_id)
            .cloned())
    }
}
