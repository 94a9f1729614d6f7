mod support;

use std::path::Path;
use std::sync::Arc;

use taskgate::config::Config;
use taskgate::dependency::EntityKind;
use taskgate::error::Error;
use taskgate::notification::email::NoopEmailSink;
use taskgate::notification::push::NoopPush;
use taskgate::notification::NotificationType;
use taskgate::service::{NewTask, TaskService};
use taskgate::storage::Storage;
use taskgate::store::FileStore;
use taskgate::task::TaskStatus;

use support::{seed, ANA, CAROL, PROJECT};

fn open(root: &Path) -> TaskService {
    let store = Arc::new(FileStore::new(Storage::new(root.to_path_buf())));
    TaskService::new(store, &Config::default(), Arc::new(NoopPush), Arc::new(NoopEmailSink))
        .expect("service")
}

#[tokio::test]
async fn state_survives_across_service_instances() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = open(dir.path());
    seed(first.store().as_ref()).await;

    let upstream = first
        .create_task(NewTask::new(PROJECT, "Schema"), ANA)
        .await
        .expect("upstream");
    let downstream = first
        .create_task(NewTask::new(PROJECT, "Migration"), ANA)
        .await
        .expect("downstream");
    first
        .dependencies()
        .create_dependency(&upstream.id, &downstream.id, None, EntityKind::Task)
        .await
        .expect("edge");
    first
        .assign_task(&downstream.id, CAROL, ANA)
        .await
        .expect("assign");
    first
        .add_comment(&downstream.id, "over to you @[Carol](u-9)", None, ANA)
        .await
        .expect("comment");
    drop(first);

    let second = open(dir.path());
    let view = second.task_view(&downstream.id).await.expect("view");
    assert_eq!(view.task.title, "Migration");
    assert_eq!(view.assignees, vec![CAROL.to_string()]);
    assert_eq!(view.dependencies.len(), 1);

    let kinds: Vec<NotificationType> = second
        .list_notifications(CAROL, false)
        .await
        .expect("rows")
        .into_iter()
        .map(|row| row.kind)
        .collect();
    assert!(kinds.contains(&NotificationType::TaskAssigned));
    assert!(kinds.contains(&NotificationType::Mentioned));

    let err = second
        .attempt_status_transition(&downstream.id, TaskStatus::Done, ANA)
        .await
        .expect_err("still blocked");
    assert!(matches!(err, Error::BlockedByDependency { .. }));

    assert!(dir.path().join(".taskgate").join("store.json").exists());
}

#[tokio::test]
async fn rejected_write_leaves_the_document_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = open(dir.path());
    seed(service.store().as_ref()).await;
    let a = service
        .create_task(NewTask::new(PROJECT, "A"), ANA)
        .await
        .expect("a");
    let b = service
        .create_task(NewTask::new(PROJECT, "B"), ANA)
        .await
        .expect("b");
    service
        .dependencies()
        .create_dependency(&a.id, &b.id, None, EntityKind::Task)
        .await
        .expect("a -> b");

    let path = dir.path().join(".taskgate").join("store.json");
    let before = std::fs::read_to_string(&path).expect("read");
    service
        .dependencies()
        .create_dependency(&b.id, &a.id, None, EntityKind::Task)
        .await
        .expect_err("cycle");
    service
        .attempt_status_transition(&b.id, TaskStatus::Done, ANA)
        .await
        .expect_err("blocked");
    let after = std::fs::read_to_string(&path).expect("read");
    assert_eq!(before, after);
}
