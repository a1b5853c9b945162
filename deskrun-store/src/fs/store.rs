use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::{AuditLog, AuditStore, CrashDump, RunOutcome, StoreError};

use super::atomic::atomic_write_file;

const CRASH_PREFIX: &str = "CRASH_";

/// Stores audit logs as `{task_id}_{ok|fail}.json` and crash dumps as
/// `CRASH_{task_id}.json` inside one directory.
pub struct FileAuditStore {
    dir: PathBuf,
}

impl FileAuditStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(&self, task_id: &str, outcome: RunOutcome) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", sanitize(task_id), outcome.as_str()))
    }

    fn crash_path(&self, task_id: &str) -> PathBuf {
        self.dir
            .join(format!("{CRASH_PREFIX}{}.json", sanitize(task_id)))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<String, StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;
        let body = serde_json::to_vec_pretty(value)?;
        atomic_write_file(path, &body).await?;
        Ok(path.display().to_string())
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn save_log(&self, log: &AuditLog) -> Result<String, StoreError> {
        let path = self.log_path(&log.task_id, log.outcome);
        let location = self.write_json(&path, log).await?;
        tracing::debug!(path = %location, events = log.events.len(), "audit log saved");
        Ok(location)
    }

    async fn save_crash_dump(&self, dump: &CrashDump) -> Result<String, StoreError> {
        let path = self.crash_path(&dump.task_id);
        let location = self.write_json(&path, dump).await?;
        tracing::warn!(path = %location, "crash dump written");
        Ok(location)
    }

    async fn list_crash_dumps(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(task_id) = name
                .strip_prefix(CRASH_PREFIX)
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .ok();
            found.push((modified, task_id.to_string()));
        }
        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(found.into_iter().map(|(_, id)| id).collect())
    }

    async fn load_crash_dump(&self, task_id: &str) -> Result<Option<CrashDump>, StoreError> {
        self.read_json(&self.crash_path(task_id)).await
    }

    async fn load_log(&self, task_id: &str) -> Result<Option<AuditLog>, StoreError> {
        for outcome in [RunOutcome::Fail, RunOutcome::Ok] {
            if let Some(log) = self.read_json(&self.log_path(task_id, outcome)).await? {
                return Ok(Some(log));
            }
        }
        Ok(None)
    }
}

fn sanitize(task_id: &str) -> String {
    task_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
