// commit_flow.rs — End-to-end staging and commit through a session.
//
// Each test drives a StagingSession the way an editing UI would:
//
//   1. Stage drafts for a few day slots against a provider
//   2. Read the overlays (status tags, counts, merged views)
//   3. Commit the batch through an adapter that accepts or rejects it
//
// VERIFY:
//   - The adapter receives exactly the pending slots, grouped by entity
//   - A successful commit empties the store
//   - A rejected commit leaves the store deep-equal to its pre-commit state
//   - Overlapping commits follow the configured single-flight policy

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use ds_changeset::Record;
use ds_session::{MemorySink, SessionError, StagingConfig, StagingSession};
use ds_submit::{ApplyError, BatchPayload, CommitOutcome, FnAdapter, MemoryBackend};
use ds_workspace::{MapBaseProvider, StatusTag};

fn recording_adapter(
    name: &str,
    verdict: Result<(), String>,
) -> (
    Arc<Mutex<Vec<BatchPayload>>>,
    impl ds_submit::ApplyAdapter,
) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();
    let adapter = FnAdapter::new(name, move |payload: BatchPayload| {
        seen.lock().unwrap().push(payload);
        let verdict = verdict.clone().map_err(ApplyError::Rejected);
        async move { verdict }
    });
    (calls, adapter)
}

#[tokio::test]
async fn staged_insert_is_committed_with_a_minimal_payload() {
    let session = StagingSession::new(MapBaseProvider::new());
    session.upsert("e1", "2025-01-05", Some(vec![]), Some(vec![Record::new("A", 4.0)]));
    assert_eq!(
        session.status_tag("e1", "2025-01-05"),
        Some(StatusTag::StagedInsert)
    );

    let (calls, adapter) = recording_adapter("recording", Ok(()));
    let outcome = session.confirm_all(&adapter).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Applied(_)));
    assert_eq!(session.count(), 0);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        serde_json::to_value(&calls[0]).unwrap(),
        serde_json::json!([
            {
                "entity_id": "e1",
                "updates": [
                    {"date_key": "2025-01-05", "records": [{"code": "A", "amount": 4.0}]}
                ]
            }
        ])
    );
}

#[tokio::test]
async fn rejected_commit_restores_the_staged_insert() {
    let session = StagingSession::new(MapBaseProvider::new());
    session.upsert("e1", "2025-01-05", Some(vec![]), Some(vec![Record::new("A", 4.0)]));

    let (calls, adapter) = recording_adapter("recording", Err("server said no".into()));
    let err = session.confirm_all(&adapter).await.unwrap_err();

    assert!(matches!(err, SessionError::Commit(_)));
    assert!(err.to_string().contains("server said no"));
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(
        session.status_tag("e1", "2025-01-05"),
        Some(StatusTag::StagedInsert)
    );
    assert_eq!(session.count(), 1);
}

#[tokio::test]
async fn rejection_restores_entries_and_order_exactly() {
    let backend = MemoryBackend::new()
        .with_day("e1", "2025-01-06", vec![Record::new("A", 8.0)])
        .with_day("e2", "2025-01-06", vec![Record::new("B", 2.0)]);
    let session = StagingSession::new(backend.clone());

    session.stage_draft("e2", "2025-01-07", Some(vec![Record::new("C", 1.0)]));
    session.stage_draft("e1", "2025-01-06", Some(vec![Record::new("A", 6.0)]));
    session.stage_draft("e2", "2025-01-06", None);
    // Edited, then settled back onto its base: kept as a noop.
    session.stage_draft("e1", "2025-01-06", Some(vec![Record::new("A", 8.0)]));
    session.reset_entry("e2", "2025-01-06");
    let before = session.snapshot();

    backend.fail_next("write conflict");
    let err = session.confirm_all(&backend).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Commit(ds_submit::CommitError::Apply { restored_slots: 3, .. })
    ));

    assert_eq!(session.snapshot(), before);
    assert_eq!(session.order(), before.order());
    assert_eq!(backend.applied_batches(), 0);
    assert_eq!(
        backend.day("e1", "2025-01-06"),
        vec![Record::new("A", 8.0)]
    );

    // The caller retries; the identical state goes out again. The reset
    // slot re-sends its base, the noop slot stays out.
    let payload = session.build_batch_payload();
    let sent: Vec<(&str, &str)> = payload
        .iter_updates()
        .map(|(entity, update)| (entity, update.date_key.as_str()))
        .collect();
    assert_eq!(sent, [("e2", "2025-01-07"), ("e2", "2025-01-06")]);

    let outcome = session.confirm_all(&backend).await.unwrap();
    let CommitOutcome::Applied(receipt) = outcome else {
        panic!("expected an applied commit");
    };
    assert_eq!(receipt.slots, 2);
    assert_eq!(receipt.summary.inserted, 1);
    assert_eq!(receipt.summary.updated, 1);
    assert_eq!(backend.day("e2", "2025-01-07"), vec![Record::new("C", 1.0)]);
    assert_eq!(backend.day("e2", "2025-01-06"), vec![Record::new("B", 2.0)]);
    assert!(session.snapshot().is_empty());
}

#[tokio::test]
async fn noop_edits_never_reach_the_adapter() {
    let backend = MemoryBackend::new().with_day("e1", "2025-01-05", vec![Record::new("A", 4.0)]);
    let session = StagingSession::new(backend.clone());

    // Equal to base on first staging: never created.
    session.stage_draft("e1", "2025-01-05", Some(vec![Record::new("A", 4.0)]));
    assert_eq!(session.count(), 0);
    assert!(session.snapshot().is_empty());

    // Changed, then changed back: retained as noop, still not counted.
    session.stage_draft("e1", "2025-01-05", Some(vec![Record::new("A", 5.0)]));
    session.stage_draft("e1", "2025-01-05", Some(vec![Record::new("A", 4.0)]));
    assert_eq!(session.count(), 0);
    assert_eq!(session.order().len(), 1);
    assert!(session.build_batch_payload().is_empty());

    let (calls, adapter) = recording_adapter("recording", Ok(()));
    session.confirm_all(&adapter).await.unwrap();
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].is_empty());
}

#[tokio::test]
async fn deletions_and_updates_land_in_the_backend() {
    let backend = MemoryBackend::new()
        .with_day("e1", "2025-01-05", vec![Record::new("A", 4.0)])
        .with_day("e1", "2025-01-06", vec![Record::new("B", 2.0)]);
    let sink = MemorySink::new();
    let session = StagingSession::new(backend.clone()).with_sink(sink.clone());

    session.stage_draft("e1", "2025-01-05", None);
    session.stage_draft(
        "e1",
        "2025-01-06",
        Some(vec![Record::new("B", 2.0), Record::new("C", 1.0)]),
    );
    let expected: BTreeMap<String, Vec<Record>> = [
        ("2025-01-05".to_string(), vec![]),
        (
            "2025-01-06".to_string(),
            vec![Record::new("B", 2.0), Record::new("C", 1.0)],
        ),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        session.merged_entity_view("e1", &backend.entity_days("e1")),
        expected
    );

    let outcome = session.confirm_all(&backend).await.unwrap();
    let CommitOutcome::Applied(receipt) = outcome else {
        panic!("expected an applied commit");
    };
    assert_eq!(receipt.summary.deleted, 1);
    assert_eq!(receipt.summary.inserted, 1);
    assert!(backend.day("e1", "2025-01-05").is_empty());
    assert_eq!(backend.day("e1", "2025-01-06").len(), 2);
    assert_eq!(
        sink.event_types().last().map(String::as_str),
        Some("commit_applied")
    );
}

#[tokio::test]
async fn empty_store_commit_is_a_noop() {
    let session = StagingSession::new(MapBaseProvider::new());
    let (calls, adapter) = recording_adapter("recording", Ok(()));
    assert_eq!(
        session.confirm_all(&adapter).await.unwrap(),
        CommitOutcome::Empty
    );
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn skip_policy_rejects_overlapping_commits() {
    let config = StagingConfig::from_toml_str("[commit]\nconcurrent = \"skip\"\n").unwrap();
    let session = Arc::new(StagingSession::with_config(MapBaseProvider::new(), config));
    session.stage_draft("e1", "2025-01-05", Some(vec![Record::new("A", 4.0)]));

    let (release, gate) = tokio::sync::oneshot::channel::<()>();
    let gate = Arc::new(tokio::sync::Mutex::new(Some(gate)));
    let adapter = FnAdapter::new("gated", move |_payload: BatchPayload| {
        let gate = gate.clone();
        async move {
            if let Some(rx) = gate.lock().await.take() {
                let _ = rx.await;
            }
            Ok::<(), ApplyError>(())
        }
    });

    let (first, second, ()) = tokio::join!(
        session.confirm_all(&adapter),
        async {
            tokio::task::yield_now().await;
            assert!(session.is_commit_in_flight());
            // Readers see the optimistic clear while the batch is in flight.
            assert_eq!(session.count(), 0);
            session.confirm_all(&adapter).await
        },
        async {
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            let _ = release.send(());
        }
    );
    assert!(matches!(first.unwrap(), CommitOutcome::Applied(_)));
    assert_eq!(second.unwrap(), CommitOutcome::Skipped);
}
