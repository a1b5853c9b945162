mod common;

use std::sync::Arc;

use common::{step, ScriptedBackend};
use deskrun_core::{Method, StepGraph};
use deskrun_exec::executor::{BackendError, BackendReply, BackendRegistry};
use deskrun_exec::RollbackManager;

fn three_step_graph() -> StepGraph {
    StepGraph::from_steps(&[
        step("open_app", "gedit", "system").with_id("a"),
        step("open_terminal", "", "system").with_id("b"),
        step("type_text", "hello", "accessibility")
            .with_id("c")
            .with_rollback("close_window"),
    ])
    .unwrap()
}

fn manager(system: Arc<ScriptedBackend>) -> RollbackManager {
    RollbackManager::new(Arc::new(BackendRegistry::new().with(system)))
}

#[tokio::test]
async fn nodes_without_compensation_are_not_pushed() {
    let mgr = manager(Arc::new(ScriptedBackend::ok(Method::System)));
    let graph = StepGraph::from_steps(&[step("click_button", "OK", "accessibility")]).unwrap();
    assert!(!mgr.push(&graph.nodes()[0]).await);
    assert!(mgr.is_empty().await);
}

#[tokio::test]
async fn rollback_all_runs_in_reverse_order_on_system() {
    let system = Arc::new(ScriptedBackend::ok(Method::System));
    let mgr = manager(system.clone());
    let graph = three_step_graph();
    for node in graph.nodes() {
        assert!(mgr.push(node).await);
    }
    assert_eq!(mgr.len().await, 3);

    let outcomes = mgr.rollback_all().await;
    let sources: Vec<_> = outcomes.iter().map(|o| o.source_step.as_str()).collect();
    assert_eq!(sources, vec!["c", "b", "a"]);
    assert!(outcomes.iter().all(|o| o.success && o.method == Method::System));
    assert!(mgr.is_empty().await);

    let calls = system.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].step_id, "rollback:c");
    assert_eq!(calls[0].value, "hello");
    assert_eq!(calls[2].action, "close_window");
    assert_eq!(calls[2].value, "gedit");
}

#[tokio::test]
async fn failing_compensation_does_not_stop_the_rest() {
    let system = Arc::new(ScriptedBackend::new(Method::System, |req| {
        if req.value == "hello" {
            Err(BackendError::Failed("window does not exist".into()))
        } else {
            Ok(BackendReply::Done(true))
        }
    }));
    let mgr = manager(system.clone());
    let graph = three_step_graph();
    for node in graph.nodes() {
        mgr.push(node).await;
    }

    let outcomes = mgr.rollback_all().await;
    assert_eq!(outcomes.len(), 3);
    assert!(!outcomes[0].success);
    assert!(outcomes[0].error.as_deref().unwrap().contains("window does not exist"));
    assert!(outcomes[1].success && outcomes[2].success);
    assert_eq!(system.call_count(), 3);
}

#[tokio::test]
async fn rollback_from_only_compensates_later_steps() {
    let system = Arc::new(ScriptedBackend::ok(Method::System));
    let mgr = manager(system.clone());
    let graph = three_step_graph();
    for node in graph.nodes() {
        mgr.push(node).await;
    }

    let outcomes = mgr.rollback_from("a", &graph).await;
    let sources: Vec<_> = outcomes.iter().map(|o| o.source_step.as_str()).collect();
    assert_eq!(sources, vec!["c", "b"]);

    let left = mgr.entries().await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].source_step, "a");

    assert!(mgr.rollback_from("missing", &graph).await.is_empty());
    assert_eq!(mgr.len().await, 1);
}

#[tokio::test]
async fn empty_stack_is_a_noop() {
    let system = Arc::new(ScriptedBackend::ok(Method::System));
    let mgr = manager(system.clone());
    assert!(mgr.rollback_all().await.is_empty());
    assert_eq!(system.call_count(), 0);
}
