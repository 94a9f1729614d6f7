mod support;

use chrono::{Duration, Utc};
use taskgate::dependency::EntityKind;
use taskgate::error::{exit_codes, Error};
use taskgate::task::{TaskField, TaskPriority, TaskStatus, TaskUpdate};

use support::{Harness, ANA};

#[tokio::test]
async fn blocked_until_dependency_is_done() {
    let h = Harness::new().await;
    let t1 = h.task("T1").await;
    let t2 = h.task("T2").await;
    h.service
        .dependencies()
        .create_dependency(&t2.id, &t1.id, None, EntityKind::Task)
        .await
        .expect("t2 -> t1");
    h.service
        .attempt_status_transition(&t2.id, TaskStatus::InProgress, ANA)
        .await
        .expect("t2 in progress");

    let err = h
        .service
        .attempt_status_transition(&t1.id, TaskStatus::Done, ANA)
        .await
        .expect_err("blocked");
    assert_eq!(err.exit_code(), exit_codes::BLOCKED);
    assert!(err.is_user_correctable());
    match &err {
        Error::BlockedByDependency {
            task_id,
            task,
            blockers,
        } => {
            assert_eq!(task_id, &t1.id);
            assert_eq!(task, "T1");
            assert_eq!(blockers, &vec!["T2".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("T2"));
    let details = err.details().expect("details");
    assert_eq!(details["blocking_tasks"][0], "T2");

    let unchanged = h.service.get_task(&t1.id).await.expect("t1");
    assert_eq!(unchanged.status, TaskStatus::Todo);
    assert!(unchanged.completed_at.is_none());

    h.service
        .attempt_status_transition(&t2.id, TaskStatus::Done, ANA)
        .await
        .expect("t2 done");
    let change = h
        .service
        .attempt_status_transition(&t1.id, TaskStatus::Done, ANA)
        .await
        .expect("t1 done");
    assert_eq!(change.outcome.task.status, TaskStatus::Done);
    assert!(change.outcome.task.completed_at.is_some());
}

#[tokio::test]
async fn blocked_until_every_subtask_is_done() {
    let h = Harness::new().await;
    let parent = h.task("Release").await;
    let first = h.subtask(&parent, "Changelog").await;
    let second = h.subtask(&parent, "Tag").await;
    assert_eq!((first.position, second.position), (0, 1));

    h.service
        .attempt_status_transition(&first.id, TaskStatus::Done, ANA)
        .await
        .expect("first done");
    let err = h
        .service
        .attempt_status_transition(&parent.id, TaskStatus::Done, ANA)
        .await
        .expect_err("second pending");
    match err {
        Error::BlockedBySubtask { pending, .. } => assert_eq!(pending, vec!["Tag".to_string()]),
        other => panic!("unexpected error: {other:?}"),
    }

    h.service
        .attempt_status_transition(&second.id, TaskStatus::Done, ANA)
        .await
        .expect("second done");
    h.service
        .attempt_status_transition(&parent.id, TaskStatus::Done, ANA)
        .await
        .expect("parent done");
}

#[tokio::test]
async fn dependency_block_is_reported_before_subtask_block() {
    let h = Harness::new().await;
    let parent = h.task("Parent").await;
    h.subtask(&parent, "Child").await;
    let upstream = h.task("Upstream").await;
    h.service
        .dependencies()
        .create_dependency(&upstream.id, &parent.id, None, EntityKind::Task)
        .await
        .expect("edge");

    let err = h
        .service
        .attempt_status_transition(&parent.id, TaskStatus::Done, ANA)
        .await
        .expect_err("blocked twice over");
    assert!(matches!(err, Error::BlockedByDependency { .. }));
}

#[tokio::test]
async fn non_done_transitions_are_never_gated() {
    let h = Harness::new().await;
    let t1 = h.task("T1").await;
    let t2 = h.task("T2").await;
    h.service
        .dependencies()
        .create_dependency(&t2.id, &t1.id, None, EntityKind::Task)
        .await
        .expect("edge");

    for status in [
        TaskStatus::InProgress,
        TaskStatus::InReview,
        TaskStatus::Blocked,
        TaskStatus::Todo,
    ] {
        h.service
            .attempt_status_transition(&t1.id, status, ANA)
            .await
            .expect("free transition");
    }
}

#[tokio::test]
async fn completed_at_follows_done() {
    let h = Harness::new().await;
    let task = h.task("Solo").await;

    let done = h
        .service
        .attempt_status_transition(&task.id, TaskStatus::Done, ANA)
        .await
        .expect("done");
    let stamp = done.outcome.task.completed_at.expect("stamped");

    let again = h
        .service
        .attempt_status_transition(&task.id, TaskStatus::Done, ANA)
        .await
        .expect("done again");
    assert_eq!(again.outcome.task.completed_at, Some(stamp));
    assert!(again.outcome.activity.is_empty());
    assert!(!again.outcome.status_changed());

    let reopened = h
        .service
        .attempt_status_transition(&task.id, TaskStatus::InProgress, ANA)
        .await
        .expect("reopen");
    assert!(reopened.outcome.task.completed_at.is_none());
    assert_eq!(
        h.service
            .get_task(&task.id)
            .await
            .expect("stored")
            .completed_at,
        None
    );
}

#[tokio::test]
async fn explicit_completed_at_overrides_the_stamp() {
    let h = Harness::new().await;
    let task = h.task("Backdated").await;
    let yesterday = Utc::now() - Duration::days(1);

    let mut update = TaskUpdate::status(TaskStatus::Done);
    update.completed_at = Some(Some(yesterday));
    let change = h
        .service
        .update_task(&task.id, update, ANA)
        .await
        .expect("done");
    assert_eq!(change.outcome.task.completed_at, Some(yesterday));
}

#[tokio::test]
async fn each_changed_field_gets_one_activity_entry() {
    let h = Harness::new().await;
    let task = h.task("Draft").await;
    let due = Utc::now() + Duration::days(7);

    let update = TaskUpdate {
        title: Some("Final draft".to_string()),
        status: Some(TaskStatus::InProgress),
        priority: Some(TaskPriority::High),
        due_date: Some(Some(due)),
        completed_at: None,
    };
    let change = h
        .service
        .update_task(&task.id, update, ANA)
        .await
        .expect("update");
    let fields: Vec<TaskField> = change.outcome.activity.iter().map(|e| e.field).collect();
    assert_eq!(
        fields,
        vec![
            TaskField::Title,
            TaskField::Status,
            TaskField::Priority,
            TaskField::DueDate
        ]
    );
    assert!(change
        .outcome
        .activity
        .iter()
        .all(|entry| entry.actor_id.as_deref() == Some(ANA)));

    let view = h.service.task_view(&task.id).await.expect("view");
    assert_eq!(view.activity.len(), 4);
    assert_eq!(view.task.title, "Final draft");

    let noop = h
        .service
        .update_task(
            &task.id,
            TaskUpdate {
                priority: Some(TaskPriority::High),
                ..TaskUpdate::default()
            },
            ANA,
        )
        .await
        .expect("same priority");
    assert!(noop.outcome.activity.is_empty());
}

#[tokio::test]
async fn empty_title_and_missing_task_are_rejected() {
    let h = Harness::new().await;
    let task = h.task("Named").await;

    let err = h
        .service
        .update_task(
            &task.id,
            TaskUpdate {
                title: Some("   ".to_string()),
                ..TaskUpdate::default()
            },
            ANA,
        )
        .await
        .expect_err("blank title");
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = h
        .service
        .attempt_status_transition("ghost", TaskStatus::Done, ANA)
        .await
        .expect_err("missing");
    assert!(matches!(err, Error::NotFound { kind: "task", .. }));
}
