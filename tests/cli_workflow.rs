mod support;

use predicates::str::contains;
use serde_json::Value;

use support::{json_data, taskgate_cmd};

fn bootstrap(root: &std::path::Path) -> String {
    json_data(root, &["init"]);
    json_data(
        root,
        &["user", "add", "u-1", "--name", "Ana", "--email", "ana@example.com"],
    );
    json_data(
        root,
        &["user", "add", "u-9", "--name", "Carol", "--email", "carol@example.com"],
    );
    json_data(root, &["actor", "set", "u-1"]);
    let project = json_data(root, &["project", "add", "Launch", "--workspace", "w1"]);
    project["id"].as_str().expect("project id").to_string()
}

#[test]
fn init_reports_created_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = json_data(dir.path(), &["init"]);
    assert_eq!(data["created"]["data_dir"], true);
    assert!(dir.path().join(".taskgate").join("store.json").exists());
    assert!(dir.path().join(".taskgate.toml").exists());

    let again = json_data(dir.path(), &["init"]);
    assert_eq!(again["created"]["store"], false);
}

#[test]
fn blocked_completion_exits_with_code_three() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let project = bootstrap(root);

    let upstream = json_data(root, &["task", "new", &project, "Write design doc"]);
    let downstream = json_data(root, &["task", "new", &project, "Ship it"]);
    let upstream_id = upstream["id"].as_str().expect("id").to_string();
    let downstream_id = downstream["id"].as_str().expect("id").to_string();
    json_data(root, &["dep", "add", &upstream_id, &downstream_id]);

    let output = taskgate_cmd(root)
        .args(["--json", "task", "status", &downstream_id, "done"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(3));
    let envelope: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["command"], "task status");
    assert_eq!(envelope["error"]["kind"], "blocked");
    assert_eq!(envelope["error"]["details"]["blocking_tasks"][0], "Write design doc");
    assert_eq!(envelope["error"]["details"]["task_id"], downstream_id.as_str());
    assert_eq!(
        envelope["next_steps"][0],
        format!("taskgate dep ls {downstream_id}")
    );

    json_data(root, &["task", "status", &upstream_id, "done"]);
    let done = json_data(root, &["task", "status", &downstream_id, "done"]);
    assert_eq!(done["task"]["status"], "DONE");
    assert!(done["task"]["completed_at"].is_string());

    let listed = json_data(root, &["dep", "ls", &downstream_id]);
    assert_eq!(listed["blocked"], false);
}

#[test]
fn cycle_is_a_user_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let project = bootstrap(root);
    let a = json_data(root, &["task", "new", &project, "A"]);
    let b = json_data(root, &["task", "new", &project, "B"]);
    let (a, b) = (
        a["id"].as_str().expect("id").to_string(),
        b["id"].as_str().expect("id").to_string(),
    );
    json_data(root, &["dep", "add", &a, &b]);

    taskgate_cmd(root)
        .args(["dep", "add", &b, &a])
        .assert()
        .code(2)
        .stderr(contains("cycle"));
}

#[test]
fn comment_mentions_reach_the_inbox() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let project = bootstrap(root);
    let task = json_data(root, &["task", "new", &project, "Review"]);
    let task_id = task["id"].as_str().expect("id").to_string();

    let comment = json_data(
        root,
        &["comment", "add", &task_id, "@[Carol](u-9) can you look?"],
    );
    assert_eq!(comment["mentions"][0]["user_id"], "u-9");

    let inbox = json_data(root, &["--actor", "u-9", "notify", "ls"]);
    assert_eq!(inbox["unread"], 1);
    assert_eq!(inbox["notifications"][0]["type"], "MENTIONED");
    let id = inbox["notifications"][0]["id"]
        .as_str()
        .expect("notification id")
        .to_string();

    taskgate_cmd(root)
        .args(["--actor", "u-1", "notify", "read", &id])
        .assert()
        .code(2);

    let read = json_data(root, &["--actor", "u-9", "notify", "read", &id]);
    assert_eq!(read["is_read"], true);
}

#[test]
fn preference_switches_persist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    bootstrap(root);

    let updated = json_data(root, &["prefs", "set", "task_due", "email", "off"]);
    assert_eq!(updated["task_due_email"], false);
    assert_eq!(updated["task_due_in_app"], true);

    let shown = json_data(root, &["prefs", "show"]);
    assert_eq!(shown["user_id"], "u-1");
    assert_eq!(shown["task_due_email"], false);

    taskgate_cmd(root)
        .args(["prefs", "set", "task_due", "pager", "off"])
        .assert()
        .code(2);
}
