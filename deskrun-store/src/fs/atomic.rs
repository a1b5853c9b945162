use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;

use crate::store::StoreError;

/// Writes `content` next to `path` under a temporary name, then renames it into place.
pub(crate) async fn atomic_write_file(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::Other(format!("{} has no parent", path.display())))?;
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name().and_then(|v| v.to_str()).unwrap_or("audit"),
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    let tmp_path = parent.join(tmp_name);

    {
        let mut file = tokio::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(content)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}
