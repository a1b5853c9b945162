use std::collections::HashMap;
use std::sync::Arc;

use deskrun_core::Method;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::registry::BROWSER_NATIVE;

/// Actions that drive the browser even when planned under another method.
const BROWSER_BOUND: &[&str] = &["wait_for_element", "find_and_click"];

/// One single-permit semaphore per method that targets a shared external resource.
pub struct ResourceLocks {
    per_method: Arc<HashMap<Method, Arc<Semaphore>>>,
}

impl ResourceLocks {
    pub fn new(shared: impl IntoIterator<Item = Method>) -> Self {
        Self {
            per_method: Arc::new(
                shared
                    .into_iter()
                    .map(|m| (m, Arc::new(Semaphore::new(1))))
                    .collect(),
            ),
        }
    }

    /// The shared resource a step would touch, if it is lock-managed.
    pub fn key_for(&self, action: &str, method: Method) -> Option<Method> {
        if self.per_method.contains_key(&method) {
            return Some(method);
        }
        let browserish = BROWSER_NATIVE.contains(&action) || BROWSER_BOUND.contains(&action);
        if browserish && self.per_method.contains_key(&Method::Browser) {
            return Some(Method::Browser);
        }
        None
    }

    pub async fn acquire(&self, action: &str, method: Method) -> Option<ResourcePermit> {
        let key = self.key_for(action, method)?;
        let sem = self.per_method.get(&key)?.clone();
        match sem.acquire_owned().await {
            Ok(permit) => Some(ResourcePermit {
                resource: key,
                _permit: permit,
            }),
            Err(_) => {
                tracing::warn!(resource = %key, "resource lock closed; continuing unlocked");
                None
            }
        }
    }
}

impl Clone for ResourceLocks {
    fn clone(&self) -> Self {
        Self {
            per_method: self.per_method.clone(),
        }
    }
}

pub struct ResourcePermit {
    pub resource: Method,
    _permit: OwnedSemaphorePermit,
}
