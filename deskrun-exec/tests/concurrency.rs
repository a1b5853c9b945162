mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ScriptedBackend;
use deskrun_core::Method;
use deskrun_exec::executor::{
    ActionBackend, AttemptRunner, BackendError, BackendRegistry, BackendReply, ResourceLocks,
    StepExecutor, StepRequest,
};

/// Counts how many holders are inside a critical section at once.
#[derive(Default)]
struct Overlap {
    inside: AtomicUsize,
    peak: AtomicUsize,
}

impl Overlap {
    async fn hold(&self, span: Duration) {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(span).await;
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn browser_permits_do_not_overlap() {
    let locks = ResourceLocks::new([Method::Browser]);
    let overlap = Arc::new(Overlap::default());

    let run = |locks: ResourceLocks, overlap: Arc<Overlap>| async move {
        let permit = locks.acquire("navigate", Method::Browser).await;
        assert_eq!(permit.as_ref().map(|p| p.resource), Some(Method::Browser));
        overlap.hold(Duration::from_millis(30)).await;
        drop(permit);
    };
    let a = tokio::spawn(run(locks.clone(), overlap.clone()));
    let b = tokio::spawn(run(locks.clone(), overlap.clone()));
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(overlap.peak(), 1);
}

#[tokio::test]
async fn second_holder_waits_for_release() {
    let locks = ResourceLocks::new([Method::Browser]);

    let first = locks.acquire("search", Method::Browser).await;
    let start = std::time::Instant::now();
    let waiter = tokio::spawn({
        let locks = locks.clone();
        async move { locks.acquire("navigate", Method::Browser).await.is_some() }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    drop(first);

    assert!(waiter.await.unwrap());
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn unshared_methods_get_no_permit() {
    let locks = ResourceLocks::new([Method::Browser]);

    let held = locks.acquire("navigate", Method::Browser).await;
    assert!(held.is_some());
    // Would block forever if it shared the browser semaphore.
    assert!(locks.acquire("get_text", Method::Accessibility).await.is_none());
    assert!(locks.acquire("open_app", Method::System).await.is_none());
    assert_eq!(locks.key_for("type_text", Method::Cv), None);
}

#[tokio::test]
async fn browser_actions_lock_the_browser_under_any_method() {
    let locks = ResourceLocks::new([Method::Browser]);

    assert_eq!(locks.key_for("find_and_click", Method::Cv), Some(Method::Browser));
    assert_eq!(locks.key_for("navigate", Method::Auto), Some(Method::Browser));
    assert_eq!(locks.key_for("get_text", Method::Browser), Some(Method::Browser));

    let none = ResourceLocks::new(std::iter::empty());
    assert_eq!(none.key_for("navigate", Method::Browser), None);
    assert!(none.acquire("navigate", Method::Browser).await.is_none());
}

/// Browser backend that reports how many calls it is serving at once.
struct BusyBrowser {
    overlap: Arc<Overlap>,
}

#[async_trait]
impl ActionBackend for BusyBrowser {
    fn method(&self) -> Method {
        Method::Browser
    }

    async fn execute(&self, _step: &StepRequest) -> Result<BackendReply, BackendError> {
        self.overlap.hold(Duration::from_millis(30)).await;
        Ok(BackendReply::Done(true))
    }
}

#[tokio::test]
async fn steps_resolved_onto_the_browser_are_serialized() {
    let overlap = Arc::new(Overlap::default());
    let registry = BackendRegistry::new()
        .with(Arc::new(ScriptedBackend::ok(Method::Accessibility).unavailable()))
        .with(Arc::new(BusyBrowser {
            overlap: overlap.clone(),
        }));
    let exec = Arc::new(StepExecutor::new(Arc::new(registry)));

    // Planned for accessibility, which is down; both attempts land on the browser.
    let attempt = |exec: Arc<StepExecutor>| async move {
        exec.run_attempt(
            &StepRequest::new("get_text", "Title", Method::Accessibility)
                .with_timeout(Duration::from_secs(1)),
        )
        .await
    };
    let (a, b) = tokio::join!(
        tokio::spawn(attempt(exec.clone())),
        tokio::spawn(attempt(exec.clone()))
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.success && b.success);
    assert_eq!(a.method, Method::Browser);
    assert_eq!(b.method, Method::Browser);
    assert_eq!(overlap.peak(), 1);
}

#[tokio::test]
async fn configured_locks_replace_the_default() {
    let overlap = Arc::new(Overlap::default());
    let registry = BackendRegistry::new().with(Arc::new(BusyBrowser {
        overlap: overlap.clone(),
    }));
    let exec = Arc::new(
        StepExecutor::new(Arc::new(registry)).with_locks(ResourceLocks::new(std::iter::empty())),
    );

    let attempt = |exec: Arc<StepExecutor>| async move {
        exec.run_attempt(&StepRequest::new("navigate", "https://example.com", Method::Browser))
            .await
    };
    let (a, b) = tokio::join!(
        tokio::spawn(attempt(exec.clone())),
        tokio::spawn(attempt(exec.clone()))
    );
    assert!(a.unwrap().success && b.unwrap().success);
    assert_eq!(overlap.peak(), 2);
}
