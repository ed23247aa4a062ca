use tabular_ingest::store::{TaskStateStore, TaskStatus, TaskUpdate};
use tabular_ingest::validation::{ValidationCheck, ValidationIssue};
use tabular_ingest::StoreError;

fn store() -> TaskStateStore {
    TaskStateStore::open_in_memory().unwrap()
}

#[test]
fn created_task_starts_accepted() {
    let store = store();
    let task = store
        .create("sales", "q1.csv", "file:///uploads/q1.csv", Some(512))
        .unwrap();

    assert_eq!(task.status, TaskStatus::Accepted);
    assert_eq!(task.file_size, Some(512));

    let loaded = store.get(&task.task_id).unwrap().unwrap();
    assert_eq!(loaded.status, TaskStatus::Accepted);
    assert_eq!(loaded.datasource_name, "sales");
    assert_eq!(loaded.original_filename, "q1.csv");
    assert_eq!(loaded.started_at, None);
    assert_eq!(loaded.completed_at, None);
    assert_eq!(loaded.error_message, None);
}

#[test]
fn happy_path_stamps_times_and_merges_fields() {
    let store = store();
    let id = store.create("sales", "q1.csv", "file:///q1.csv", None).unwrap().task_id;

    store
        .update_status(&id, TaskStatus::Processing, TaskUpdate::default())
        .unwrap();
    let started = store.get(&id).unwrap().unwrap().started_at.expect("started_at stamped");

    store
        .update_status(
            &id,
            TaskStatus::Submitted,
            TaskUpdate::default().with_job_id("job-7").with_row_count(8),
        )
        .unwrap();
    let done = store
        .update_status(&id, TaskStatus::Completed, TaskUpdate::default())
        .unwrap()
        .unwrap();

    assert_eq!(done.external_job_id.as_deref(), Some("job-7"));
    assert_eq!(done.row_count, Some(8));
    assert_eq!(done.started_at, Some(started));
    assert!(done.completed_at.unwrap() >= started);
    assert_eq!(done.error_message, None);

    let loaded = store.get(&id).unwrap().unwrap();
    assert_eq!(loaded.status, TaskStatus::Completed);
    assert_eq!(loaded.external_job_id.as_deref(), Some("job-7"));
}

#[test]
fn terminal_states_reject_further_transitions() {
    let store = store();
    let id = store.create("sales", "q1.csv", "file:///q1.csv", None).unwrap().task_id;
    store
        .update_status(&id, TaskStatus::Failed, TaskUpdate::failed("boom"))
        .unwrap();
    let before = store.get(&id).unwrap().unwrap();

    let err = store
        .update_status(&id, TaskStatus::Processing, TaskUpdate::default())
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidTransition {
            from: TaskStatus::Failed,
            to: TaskStatus::Processing,
            ..
        }
    ));

    let err = store
        .update_status(&id, TaskStatus::Failed, TaskUpdate::failed("second"))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));

    assert_eq!(store.get(&id).unwrap().unwrap(), before);
}

#[test]
fn statuses_never_move_backward() {
    let store = store();
    let id = store.create("sales", "q1.csv", "file:///q1.csv", None).unwrap().task_id;
    store
        .update_status(&id, TaskStatus::Processing, TaskUpdate::default())
        .unwrap();
    store
        .update_status(&id, TaskStatus::Submitted, TaskUpdate::default().with_job_id("j"))
        .unwrap();

    assert!(store
        .update_status(&id, TaskStatus::Processing, TaskUpdate::default())
        .is_err());
    assert!(store
        .update_status(&id, TaskStatus::Accepted, TaskUpdate::default())
        .is_err());
    assert_eq!(store.get(&id).unwrap().unwrap().status, TaskStatus::Submitted);
}

#[test]
fn failure_message_only_lives_on_failed_tasks() {
    let store = store();
    let id = store.create("sales", "q1.csv", "file:///q1.csv", None).unwrap().task_id;

    // A message passed with a non-failure status is dropped.
    let task = store
        .update_status(&id, TaskStatus::Processing, TaskUpdate::failed("ignored"))
        .unwrap()
        .unwrap();
    assert_eq!(task.error_message, None);

    let task = store
        .update_status(&id, TaskStatus::Failed, TaskUpdate::default())
        .unwrap()
        .unwrap();
    assert_eq!(task.error_message.as_deref(), Some("unknown error"));
    assert!(task.completed_at.is_some());
}

#[test]
fn validation_errors_are_persisted() {
    let store = store();
    let id = store.create("sales", "empty.csv", "file:///empty.csv", Some(0)).unwrap().task_id;
    let issues = vec![ValidationIssue {
        column: None,
        check: ValidationCheck::Size,
        detail: "file size 0 bytes is outside the allowed range".into(),
    }];

    store
        .update_status(
            &id,
            TaskStatus::Failed,
            TaskUpdate::failed("file size check failed").with_validation_errors(issues.clone()),
        )
        .unwrap();

    let loaded = store.get(&id).unwrap().unwrap();
    assert_eq!(loaded.validation_errors, Some(issues));
    assert_eq!(loaded.error_message.as_deref(), Some("file size check failed"));
}

#[test]
fn unknown_tasks_are_absent_not_errors() {
    let store = store();
    assert!(store.get("nope").unwrap().is_none());
    assert!(store
        .update_status("nope", TaskStatus::Processing, TaskUpdate::default())
        .unwrap()
        .is_none());
}

#[test]
fn list_is_newest_first_and_paged() {
    let store = store();
    let ids: Vec<String> = (0..5)
        .map(|i| {
            store
                .create("sales", &format!("f{i}.csv"), "file:///f.csv", None)
                .unwrap()
                .task_id
        })
        .collect();

    let page: Vec<String> = store.list(2, 0).unwrap().into_iter().map(|t| t.task_id).collect();
    assert_eq!(page, vec![ids[4].clone(), ids[3].clone()]);

    let page: Vec<String> = store.list(2, 4).unwrap().into_iter().map(|t| t.task_id).collect();
    assert_eq!(page, vec![ids[0].clone()]);
}

#[test]
fn counts_are_grouped_by_status() {
    let store = store();
    for _ in 0..3 {
        store.create("sales", "a.csv", "file:///a.csv", None).unwrap();
    }
    let id = store.create("sales", "b.csv", "file:///b.csv", None).unwrap().task_id;
    store
        .update_status(&id, TaskStatus::Failed, TaskUpdate::failed("x"))
        .unwrap();

    let counts = store.count_by_status().unwrap();
    assert_eq!(counts.get(&TaskStatus::Accepted), Some(&3));
    assert_eq!(counts.get(&TaskStatus::Failed), Some(&1));
    assert_eq!(counts.get(&TaskStatus::Completed), None);
}

#[test]
fn records_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tasks.db");

    let id = {
        let store = TaskStateStore::open(&db).unwrap();
        let id = store.create("sales", "q1.csv", "file:///q1.csv", Some(10)).unwrap().task_id;
        store
            .update_status(&id, TaskStatus::Processing, TaskUpdate::default())
            .unwrap();
        id
    };

    let reopened = TaskStateStore::open(&db).unwrap();
    let task = reopened.get(&id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Processing);
    assert_eq!(task.file_size, Some(10));
    assert!(task.started_at.is_some());
}
