use serde_json::Value;
use taskgate::error::{exit_codes, Error};

#[test]
fn exit_code_user_error() {
    for err in [
        Error::InvalidArgument("bad input".to_string()),
        Error::InvalidDependency("self loop".to_string()),
        Error::not_found("task", "t-1"),
        Error::CycleDetected {
            source_id: "a".to_string(),
            target_id: "b".to_string(),
        },
    ] {
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR, "{err}");
    }
}

#[test]
fn exit_code_blocked() {
    let err = Error::BlockedBySubtask {
        task_id: "t-1".to_string(),
        task: "Release".to_string(),
        pending: vec!["Tag".to_string(), "Notes".to_string()],
    };
    assert_eq!(err.exit_code(), exit_codes::BLOCKED);
    assert_eq!(
        err.to_string(),
        "Cannot complete 'Release': unfinished subtasks: Tag, Notes"
    );
}

#[test]
fn exit_code_operation_failed() {
    let err = Error::OperationFailed("boom".to_string());
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
    assert!(!err.is_user_correctable());
}

#[test]
fn details_include_cycle_endpoints() {
    let err = Error::CycleDetected {
        source_id: "b".to_string(),
        target_id: "a".to_string(),
    };
    let details = err.details().expect("details");
    assert_eq!(details["source_id"], Value::String("b".to_string()));
    assert_eq!(details["target_id"], Value::String("a".to_string()));
    assert!(Error::InvalidConfig("bad".to_string()).details().is_none());
}
