use deskrun_core::{TaskState, TaskStateMachine};

#[tokio::test]
async fn happy_path_transitions_are_recorded() {
    let sm = TaskStateMachine::new();
    assert_eq!(sm.current().await, TaskState::Init);

    for s in [
        TaskState::Planned,
        TaskState::Executing,
        TaskState::Verifying,
        TaskState::Executing,
        TaskState::Verifying,
        TaskState::Success,
        TaskState::Init,
    ] {
        sm.transition(s).await.unwrap();
    }

    let history = sm.history().await;
    assert_eq!(history.len(), 7);
    assert_eq!(history[0].from, TaskState::Init);
    assert_eq!(history[0].to, TaskState::Planned);
    assert!(history.iter().all(|h| !h.forced));
}

#[tokio::test]
async fn illegal_transition_is_rejected_and_state_kept() {
    let sm = TaskStateMachine::new();
    let err = sm.transition(TaskState::Executing).await.unwrap_err();
    assert_eq!(err.from, TaskState::Init);
    assert_eq!(err.to, TaskState::Executing);
    assert_eq!(sm.current().await, TaskState::Init);
    assert!(sm.history().await.is_empty());
}

#[tokio::test]
async fn terminal_states_only_return_to_init() {
    for terminal in [TaskState::Success, TaskState::Failed, TaskState::Cancelled] {
        assert!(terminal.is_terminal());
        assert_eq!(terminal.allowed_targets(), &[TaskState::Init]);
    }

    let sm = TaskStateMachine::new();
    sm.transition(TaskState::Planned).await.unwrap();
    sm.transition(TaskState::Failed).await.unwrap();
    assert!(sm.transition(TaskState::Executing).await.is_err());
    assert!(sm.transition(TaskState::Planned).await.is_err());
    sm.transition(TaskState::Init).await.unwrap();
}

#[tokio::test]
async fn force_reset_bypasses_the_table() {
    let sm = TaskStateMachine::new();
    sm.transition(TaskState::Planned).await.unwrap();
    sm.transition(TaskState::Executing).await.unwrap();
    assert!(sm.is_active().await);

    sm.force_reset().await;
    assert_eq!(sm.current().await, TaskState::Init);
    let last = sm.history().await.pop().unwrap();
    assert!(last.forced);
    assert_eq!(last.from, TaskState::Executing);
}

#[tokio::test]
async fn step_label_is_tracked() {
    let sm = TaskStateMachine::new();
    sm.transition(TaskState::Planned).await.unwrap();
    sm.transition_at(TaskState::Executing, Some("1/2:open_app".to_string()))
        .await
        .unwrap();
    let status = sm.status().await;
    assert_eq!(status.state, TaskState::Executing);
    assert_eq!(status.previous, Some(TaskState::Planned));
    assert_eq!(status.current_step.as_deref(), Some("1/2:open_app"));
}

#[tokio::test]
async fn concurrent_transitions_are_serialized() {
    let sm = std::sync::Arc::new(TaskStateMachine::new());
    let a = {
        let sm = sm.clone();
        tokio::spawn(async move { sm.transition(TaskState::Planned).await })
    };
    let b = {
        let sm = sm.clone();
        tokio::spawn(async move { sm.transition(TaskState::Planned).await })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    // Exactly one wins; PLANNED -> PLANNED is not in the table.
    assert!(a.is_ok() ^ b.is_ok());
}
