#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use assert_cmd::Command;
use async_trait::async_trait;
use taskgate::config::Config;
use taskgate::events::Event;
use taskgate::notification::email::{EmailMessage, EmailSink};
use taskgate::notification::push::PushChannel;
use taskgate::notification::Notification;
use taskgate::service::{NewTask, TaskService};
use taskgate::store::{EntityStore, MemoryStore, Project, User};
use taskgate::task::TaskRecord;

pub const PROJECT: &str = "p1";
pub const WORKSPACE: &str = "w1";
pub const ANA: &str = "u-1";
pub const CAROL: &str = "u-9";
pub const DAVE: &str = "u-42";

/// Push channel that keeps every event it is handed.
#[derive(Default)]
pub struct RecordingPush {
    events: Mutex<Vec<Event>>,
}

impl RecordingPush {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("push lock").clone()
    }

    pub fn on_channel(&self, channel: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| event.channel.to_string() == channel)
            .collect()
    }
}

#[async_trait]
impl PushChannel for RecordingPush {
    async fn publish(&self, event: Event) -> anyhow::Result<()> {
        self.events.lock().expect("push lock").push(event);
        Ok(())
    }
}

/// Push channel whose every publish fails.
#[derive(Default)]
pub struct FailingPush;

#[async_trait]
impl PushChannel for FailingPush {
    async fn publish(&self, _event: Event) -> anyhow::Result<()> {
        Err(anyhow!("socket server unreachable"))
    }
}

/// Email sink that keeps every message it is handed.
#[derive(Default)]
pub struct RecordingEmail {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmail {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("email lock").clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter(|message| message.to == address)
            .collect()
    }
}

#[async_trait]
impl EmailSink for RecordingEmail {
    async fn send_email(&self, message: EmailMessage) -> anyhow::Result<()> {
        self.sent.lock().expect("email lock").push(message);
        Ok(())
    }
}

/// Email sink whose every send fails.
#[derive(Default)]
pub struct FailingEmail;

#[async_trait]
impl EmailSink for FailingEmail {
    async fn send_email(&self, _message: EmailMessage) -> anyhow::Result<()> {
        Err(anyhow!("smtp relay refused connection"))
    }
}

/// A service over a seeded in-memory store with recording sinks.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub push: Arc<RecordingPush>,
    pub email: Arc<RecordingEmail>,
    pub service: TaskService,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        seed(store.as_ref()).await;
        let push = Arc::new(RecordingPush::default());
        let email = Arc::new(RecordingEmail::default());
        let service = TaskService::new(store.clone(), &config, push.clone(), email.clone())
            .expect("service");
        Self {
            store,
            push,
            email,
            service,
        }
    }

    pub async fn task(&self, title: &str) -> TaskRecord {
        self.service
            .create_task(NewTask::new(PROJECT, title), ANA)
            .await
            .expect("create task")
    }

    pub async fn subtask(&self, parent: &TaskRecord, title: &str) -> TaskRecord {
        let mut new = NewTask::new(PROJECT, title);
        new.parent_id = Some(parent.id.clone());
        self.service
            .create_task(new, ANA)
            .await
            .expect("create subtask")
    }

    pub async fn notifications(&self, user: &str) -> Vec<Notification> {
        self.service
            .list_notifications(user, false)
            .await
            .expect("notifications")
    }
}

/// One project in one workspace and three users with email addresses.
pub async fn seed(store: &dyn EntityStore) {
    store
        .put_project(Project {
            id: PROJECT.to_string(),
            name: "Launch".to_string(),
            workspace_id: WORKSPACE.to_string(),
            is_archived: false,
        })
        .await
        .expect("project");
    for (id, name) in [(ANA, "Ana"), (CAROL, "Carol"), (DAVE, "Dave")] {
        store
            .put_user(User {
                id: id.to_string(),
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
            })
            .await
            .expect("user");
    }
}

pub fn taskgate_cmd(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("taskgate").expect("binary");
    cmd.arg("--root")
        .arg(root)
        .env_remove("TASKGATE_ROOT")
        .env_remove("TASKGATE_ACTOR")
        .env_remove("RUST_LOG");
    cmd
}

/// Run a command with `--json` and return the `data` member of the envelope.
pub fn json_data(root: &Path, args: &[&str]) -> serde_json::Value {
    let output = taskgate_cmd(root)
        .arg("--json")
        .args(args)
        .output()
        .expect("run taskgate");
    assert!(
        output.status.success(),
        "taskgate {args:?} failed: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    let envelope: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json envelope");
    envelope["data"].clone()
}
