//! End-to-end cycle tests against the in-memory sheet.
//!
//! These exercise the full load, update, merge, commit path:
//! - Rows are classified once and the outputs land in the sheet.
//! - Failures never stop the loop and never persist partial output.
//! - Edits made to the sheet during a cycle survive the commit.

use std::time::Duration;

use triage_core::{
    ClassifierAdapter, ModelError, PollLoop, RowOutputs, Schema, SchemaConfig, Table, TriageError,
    UpdateEngine,
};
use triage_test_utils::{
    incident_sheet, MemoryStore, ScriptedModel, FIRE_REPLY, NO_DEPARTMENT_REPLY, PUBLIC_WORKS_REPLY,
};

fn poll_loop(store: &MemoryStore, model: &ScriptedModel) -> PollLoop {
    let engine = UpdateEngine::new(ClassifierAdapter::new(model.clone().into_model()));
    PollLoop::new(
        store.clone().into_store(),
        engine,
        SchemaConfig::default(),
        Duration::from_millis(1),
    )
}

fn resolved(mut table: Table) -> (Table, Schema) {
    let schema = Schema::resolve(&mut table, &SchemaConfig::default()).unwrap();
    (table, schema)
}

/// Scenario A through the whole loop: the classified row is persisted with
/// flattened list fields and the identity is tracked.
#[tokio::test]
async fn cycle_persists_classification() {
    let store = MemoryStore::new(incident_sheet(&[("pothole on Main St", "r1")]));
    let model = ScriptedModel::new().reply(PUBLIC_WORKS_REPLY);
    let mut poll = poll_loop(&store, &model);

    let report = poll.run_cycle().await.unwrap();

    assert_eq!(report.update.classified, 1);
    assert_eq!(report.merge.rows_written, 1);
    assert_eq!(store.commits(), 1);

    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.created, 0, "output columns were committed");
    let out = schema.outputs(&sheet, 0);
    assert_eq!(out.place, "Main St");
    assert_eq!(out.keywords, "pothole");
    assert_eq!(out.urgency, "4");
    assert_eq!(out.department, "Public Works");
    assert!(poll.engine().tracker().has_processed("r1"));
}

/// List fields with several items are joined with ", ".
#[tokio::test]
async fn list_fields_are_comma_joined_in_sheet() {
    let store = MemoryStore::new(incident_sheet(&[("smoke near the pier", "f1")]));
    let model = ScriptedModel::new().reply(FIRE_REPLY);
    let mut poll = poll_loop(&store, &model);

    poll.run_cycle().await.unwrap();

    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0).keywords, "smoke, fire");
    assert_eq!(schema.outputs(&sheet, 0).urgency, "9");
}

/// Scenario D across cycles: once persisted, a row costs no further calls.
#[tokio::test]
async fn second_cycle_makes_no_calls() {
    let store = MemoryStore::new(incident_sheet(&[("pothole on Main St", "r1")]));
    let model = ScriptedModel::new().reply(PUBLIC_WORKS_REPLY);
    let mut poll = poll_loop(&store, &model);

    poll.run_cycle().await.unwrap();
    let after_first = store.snapshot();
    let second = poll.run_cycle().await.unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(second.update.already_processed, 1);
    assert_eq!(store.snapshot(), after_first);
}

/// Scenario B through the loop: a failed call writes nothing and the row is
/// retried on the next cycle.
#[tokio::test]
async fn failed_call_is_retried_next_cycle() {
    let store = MemoryStore::new(incident_sheet(&[("pothole on Main St", "r1")]));
    let model = ScriptedModel::new()
        .fail(ModelError::Transport("connection refused".into()))
        .reply(PUBLIC_WORKS_REPLY);
    let mut poll = poll_loop(&store, &model);

    let first = poll.run_cycle().await.unwrap();
    assert_eq!(first.update.failed, 1);
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0).department, "");
    assert!(!poll.engine().tracker().has_processed("r1"));

    poll.run_cycle().await.unwrap();
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0).department, "Public Works");
    assert_eq!(model.calls(), 2);
}

/// Malformed replies are never persisted.
#[tokio::test]
async fn malformed_reply_is_not_persisted() {
    let store = MemoryStore::new(incident_sheet(&[("pothole on Main St", "r1")]));
    let model = ScriptedModel::new().reply("The department is Public Works.");
    let mut poll = poll_loop(&store, &model);

    let report = poll.run_cycle().await.unwrap();

    assert_eq!(report.update.malformed, 1);
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0), RowOutputs::default());
    assert!(poll.engine().tracker().is_empty());
}

/// Scenario C: rows without identity are skipped, the rest still proceed.
#[tokio::test]
async fn unkeyed_rows_are_skipped() {
    let store = MemoryStore::new(incident_sheet(&[("no id here", ""), ("pothole on Main St", "r1")]));
    let model = ScriptedModel::new().on_message("pothole", Ok(PUBLIC_WORKS_REPLY.to_string()));
    let mut poll = poll_loop(&store, &model);

    let report = poll.run_cycle().await.unwrap();

    assert_eq!(report.update.missing_identity, 1);
    assert_eq!(model.calls_mentioning("no id here"), 0);
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0).department, "");
    assert_eq!(schema.outputs(&sheet, 1).department, "Public Works");
}

/// A model saying "no department" is recorded in the tracker, so this
/// process does not ask again even though the sheet still reads as empty.
#[tokio::test]
async fn no_department_answer_is_asked_once_per_process() {
    let store = MemoryStore::new(incident_sheet(&[("thanks for fixing the lights", "k1")]));
    let model = ScriptedModel::new().otherwise(Ok(NO_DEPARTMENT_REPLY.to_string()));
    let mut poll = poll_loop(&store, &model);

    poll.run_cycle().await.unwrap();
    let second = poll.run_cycle().await.unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(second.update.tracked, 1);
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0).keywords, "compliment");
}

/// Edits landing between the first load and the writer's re-read survive:
/// a new row appended and a note edited on the classified row.
#[tokio::test]
async fn concurrent_edits_survive_merge() {
    let store = MemoryStore::new(incident_sheet(&[("pothole on Main St", "r1")]));
    store.edit_before_load(2, |table| {
        table.set_cell(0, 0, "edited by dispatcher");
        table.push_row(vec!["2024-05-09 10:00".into(), "streetlight out".into(), "r2".into()]);
    });
    let model = ScriptedModel::new().on_message("pothole", Ok(PUBLIC_WORKS_REPLY.to_string()));
    let mut poll = poll_loop(&store, &model);

    let report = poll.run_cycle().await.unwrap();

    assert_eq!(store.loads(), 2);
    assert_eq!(report.merge.rows_written, 1);
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(sheet.len(), 2);
    assert_eq!(sheet.cell(0, 0), "edited by dispatcher");
    assert_eq!(schema.outputs(&sheet, 0).department, "Public Works");
    assert_eq!(schema.outputs(&sheet, 1).department, "");
    assert_eq!(model.calls_mentioning("streetlight"), 0);
}

/// A failed commit ends the cycle with a non-fatal error and releases the
/// row, so the very next cycle classifies it again and persists it.
#[tokio::test]
async fn commit_failure_is_retried_next_cycle() {
    let store = MemoryStore::new(incident_sheet(&[("pothole on Main St", "r1")]));
    store.fail_next_commits(1);
    let model = ScriptedModel::new().otherwise(Ok(PUBLIC_WORKS_REPLY.to_string()));
    let mut poll = poll_loop(&store, &model);

    let err = poll.run_cycle().await.unwrap_err();
    assert!(matches!(err, TriageError::Store(_)));
    assert!(!err.is_fatal());
    assert_eq!(store.commits(), 0);
    assert!(!poll.engine().tracker().has_processed("r1"));

    let report = poll.run_cycle().await.unwrap();
    assert_eq!(report.update.classified, 1);
    assert_eq!(model.calls(), 2);
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0).department, "Public Works");

    // Later cycles find it persisted and stay quiet.
    for _ in 0..3 {
        poll.run_cycle().await.unwrap();
    }
    assert_eq!(model.calls(), 2);
    assert!(poll.engine().tracker().has_processed("r1"));
}

/// A dispatcher's correction to an already-processed row survives later
/// cycles untouched.
#[tokio::test]
async fn dispatcher_corrections_are_not_overwritten() {
    let store = MemoryStore::new(incident_sheet(&[
        ("loud music downstairs", "n1"),
        ("pothole on Main St", "r1"),
    ]));
    let model = ScriptedModel::new()
        .on_message("pothole", Ok(PUBLIC_WORKS_REPLY.to_string()))
        .on_message("loud music", Ok(FIRE_REPLY.to_string()));
    let mut poll = poll_loop(&store, &model);
    poll.run_cycle().await.unwrap();

    // The second cycle's first load sees "Fire Department"; the correction
    // lands before the writer re-reads the sheet.
    store.edit_before_load(4, |table| {
        let department = table.column_index("department").unwrap();
        table.set_cell(0, department, "Police");
    });
    let report = poll.run_cycle().await.unwrap();

    assert_eq!(report.merge.rows_written, 0);
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0).department, "Police");
    assert_eq!(schema.outputs(&sheet, 1).department, "Public Works");
}

/// The loop survives transient load failures and stops on shutdown.
#[tokio::test]
async fn run_survives_load_failures_until_shutdown() {
    let store = MemoryStore::new(incident_sheet(&[("pothole on Main St", "r1")]));
    store.fail_next_loads(2);
    let model = ScriptedModel::new().otherwise(Ok(PUBLIC_WORKS_REPLY.to_string()));
    let mut poll = poll_loop(&store, &model);

    let watcher = store.clone();
    let shutdown = async move {
        while watcher.commits() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll.run(shutdown))
        .await
        .expect("loop should stop once a commit landed")
        .unwrap();

    assert!(poll.cycles() >= 3);
    let (sheet, schema) = resolved(store.snapshot());
    assert_eq!(schema.outputs(&sheet, 0).department, "Public Works");
}

/// A sheet that loses its identity column stops the loop.
#[tokio::test]
async fn missing_identity_column_is_fatal() {
    let store = MemoryStore::new(Table::new(["Message"]).with_row(["pothole"]));
    let model = ScriptedModel::new();
    let mut poll = poll_loop(&store, &model);

    let err = poll.run(std::future::pending()).await.unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(model.calls(), 0);
    assert_eq!(store.commits(), 0);
}
