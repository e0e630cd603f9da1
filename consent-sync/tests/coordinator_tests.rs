//! Coordinator behavior against stub collaborators: local writes, remote
//! acknowledgment, failure taxonomy, startup decisions, retry and races.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use consent_core::{ConsentRecord, ConsentStatus, ConsentStore, ConsentTransmission, MemoryStore};
use consent_sync::{
    ConsentCoordinator, ConsentSink, DeviceIdProvider, IdentifierError, PromptRequest,
    RetryPolicy, SinkResponse, Startup, SyncError, SyncOutcome, TransportError,
};

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

struct StubIds {
    result: Result<String, IdentifierError>,
    calls: AtomicUsize,
}

impl StubIds {
    fn ok(id: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(id.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: IdentifierError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DeviceIdProvider for StubIds {
    async fn fetch(&self) -> Result<String, IdentifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Answers from a script, then with `fallback`. Optionally blocks each
/// submission until a permit is added to `gate`.
struct ScriptedSink {
    script: Mutex<VecDeque<Result<SinkResponse, TransportError>>>,
    fallback: Result<SinkResponse, TransportError>,
    submitted: Mutex<Vec<ConsentTransmission>>,
    gate: Option<Semaphore>,
}

impl ScriptedSink {
    fn always(code: u16) -> Arc<Self> {
        Self::scripted(vec![], Ok(SinkResponse { status_code: code }))
    }

    fn scripted(
        script: Vec<Result<SinkResponse, TransportError>>,
        fallback: Result<SinkResponse, TransportError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            submitted: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    fn gated(code: u16) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(SinkResponse { status_code: code }),
            submitted: Mutex::new(Vec::new()),
            gate: Some(Semaphore::new(0)),
        })
    }

    fn submitted(&self) -> Vec<ConsentTransmission> {
        self.submitted.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl ConsentSink for ScriptedSink {
    async fn submit(&self, payload: &ConsentTransmission) -> Result<SinkResponse, TransportError> {
        self.submitted.lock().unwrap().push(payload.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    ids: Arc<StubIds>,
    sink: Arc<ScriptedSink>,
    coordinator: ConsentCoordinator,
}

fn harness_with(
    store: MemoryStore,
    ids: Arc<StubIds>,
    sink: Arc<ScriptedSink>,
    retry: RetryPolicy,
) -> Harness {
    let store = Arc::new(store);
    let coordinator = ConsentCoordinator::builder(store.clone(), ids.clone(), sink.clone())
        .retry(retry)
        .build();
    Harness {
        store,
        ids,
        sink,
        coordinator,
    }
}

fn harness(sink: Arc<ScriptedSink>) -> Harness {
    harness_with(MemoryStore::new(), StubIds::ok("test_id"), sink, RetryPolicy::once())
}

fn unsynced(status: ConsentStatus, updated_at_ms: i64) -> MemoryStore {
    MemoryStore::with_record(ConsentRecord {
        status,
        updated_at_ms,
        remotely_synced: false,
        revision: 1,
    })
}

static NOW_MS: AtomicI64 = AtomicI64::new(0);

fn settable_clock() -> i64 {
    NOW_MS.load(Ordering::SeqCst)
}

fn never_prompt(_: &PromptRequest) -> Option<ConsentStatus> {
    panic!("prompt must not be shown")
}

// ---------------------------------------------------------------------------
// 1. Local reads and writes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn set_status_is_visible_before_the_send_finishes() {
    let h = harness(ScriptedSink::gated(204));
    for status in [ConsentStatus::Accepted, ConsentStatus::Denied] {
        let task = h.coordinator.set_status(status).expect("set_status");
        assert_eq!(h.coordinator.status(), status);
        assert!(!h.coordinator.is_synced());
        h.sink.gate.as_ref().unwrap().add_permits(1);
        task.wait().await.expect("sync");
    }
}

#[tokio::test]
async fn clear_resets_everything() {
    let h = harness(ScriptedSink::always(204));
    h.coordinator.update(ConsentStatus::Accepted).await.expect("update");
    h.coordinator.clear().expect("clear");

    assert_eq!(h.coordinator.status(), ConsentStatus::Undefined);
    assert!(!h.coordinator.is_synced());
    assert_eq!(h.store.updated_at_ms().unwrap(), 0);
}

#[tokio::test]
async fn repeating_a_decision_stays_synced() {
    let h = harness(ScriptedSink::always(204));
    for _ in 0..2 {
        let outcome = h
            .coordinator
            .set_status(ConsentStatus::Denied)
            .expect("set_status")
            .wait()
            .await
            .expect("sync");
        assert_eq!(outcome, SyncOutcome::Synced);
    }
    assert_eq!(h.coordinator.status(), ConsentStatus::Denied);
    assert!(h.coordinator.is_synced());
    assert_eq!(h.sink.count(), 2);
}

// ---------------------------------------------------------------------------
// 2. Remote outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn denied_decision_ends_synced_with_its_timestamp() {
    let h = harness(ScriptedSink::always(204));
    let before = Utc::now().timestamp_millis();
    let task = h.coordinator.set_status(ConsentStatus::Denied).expect("set_status");
    let after = Utc::now().timestamp_millis();

    let stored = h.store.load().unwrap();
    assert_eq!(stored.status, ConsentStatus::Denied);
    assert!(stored.updated_at_ms >= before && stored.updated_at_ms <= after);

    assert_eq!(task.wait().await.expect("sync"), SyncOutcome::Synced);
    let final_state = h.store.load().unwrap();
    assert_eq!(final_state.status, ConsentStatus::Denied);
    assert_eq!(final_state.updated_at_ms, stored.updated_at_ms);
    assert!(final_state.remotely_synced);
}

#[tokio::test]
async fn http_400_leaves_unsynced_and_reports_code() {
    let h = harness(ScriptedSink::always(400));
    let err = h
        .coordinator
        .set_status(ConsentStatus::Accepted)
        .expect("set_status")
        .wait()
        .await
        .unwrap_err();
    assert!(
        matches!(err, SyncError::RemoteRejected { status_code: 400 }),
        "got: {err}"
    );
    assert_eq!(h.coordinator.status(), ConsentStatus::Accepted);
    assert!(!h.coordinator.is_synced());
}

#[tokio::test]
async fn identifier_failure_submits_nothing() {
    let h = harness_with(
        MemoryStore::new(),
        StubIds::failing(IdentifierError::PlatformUnavailable("no service".into())),
        ScriptedSink::always(204),
        RetryPolicy::once(),
    );
    let err = h.coordinator.update(ConsentStatus::Accepted).await.unwrap_err();
    assert!(
        matches!(
            err,
            SyncError::IdentifierUnavailable(IdentifierError::PlatformUnavailable(_))
        ),
        "got: {err}"
    );
    assert_eq!(h.sink.count(), 0);
    assert!(!h.coordinator.is_synced());
}

#[tokio::test]
async fn transport_failure_is_distinct_from_rejection() {
    let h = harness(ScriptedSink::scripted(
        vec![],
        Err(TransportError("unknown host".into())),
    ));
    let err = h.coordinator.update(ConsentStatus::Denied).await.unwrap_err();
    assert!(matches!(err, SyncError::TransportUnavailable(_)), "got: {err}");
    assert!(!h.coordinator.is_synced());
}

// ---------------------------------------------------------------------------
// 3. Startup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_store_prompts_once_without_network() {
    let h = harness(ScriptedSink::always(204));
    let shown = AtomicUsize::new(0);
    let trigger = |_: &PromptRequest| -> Option<ConsentStatus> {
        shown.fetch_add(1, Ordering::SeqCst);
        None
    };

    let startup = h.coordinator.initialize_and_reconcile(&trigger).expect("startup");
    assert!(matches!(startup, Startup::Prompted(None)));
    assert_eq!(shown.load(Ordering::SeqCst), 1);
    assert_eq!(h.ids.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.sink.count(), 0);
}

#[tokio::test]
async fn prompt_answer_flows_into_set_status() {
    let h = harness(ScriptedSink::always(204));
    let trigger = |_: &PromptRequest| -> Option<ConsentStatus> { Some(ConsentStatus::Accepted) };

    let Startup::Prompted(Some(task)) = h.coordinator.initialize_and_reconcile(&trigger).unwrap()
    else {
        panic!("expected a sync started by the prompt answer");
    };
    assert_eq!(task.wait().await.unwrap(), SyncOutcome::Synced);
    assert_eq!(h.coordinator.status(), ConsentStatus::Accepted);
    assert!(h.coordinator.is_synced());
}

#[tokio::test]
async fn unsynced_decision_is_resent_with_stored_timestamp() {
    let h = harness_with(
        unsynced(ConsentStatus::Accepted, 1000),
        StubIds::ok("test_id"),
        ScriptedSink::always(204),
        RetryPolicy::once(),
    );

    let Startup::Reconciling(task) = h.coordinator.initialize_and_reconcile(&never_prompt).unwrap()
    else {
        panic!("expected background reconciliation");
    };
    assert_eq!(task.wait().await.unwrap(), SyncOutcome::Synced);

    let sent = h.sink.submitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].to_json().unwrap(),
        r#"{"status":"accept","device_id":"test_id","date":"1970-01-01T00:00:01Z"}"#
    );
    assert_eq!(h.store.load().unwrap().updated_at_ms, 1000);
    assert!(h.coordinator.is_synced());
}

#[tokio::test]
async fn synced_decision_needs_nothing() {
    let h = harness_with(
        MemoryStore::with_record(ConsentRecord {
            status: ConsentStatus::Denied,
            updated_at_ms: 5,
            remotely_synced: true,
            revision: 3,
        }),
        StubIds::ok("test_id"),
        ScriptedSink::always(204),
        RetryPolicy::once(),
    );
    let startup = h.coordinator.initialize_and_reconcile(&never_prompt).unwrap();
    assert!(matches!(startup, Startup::UpToDate));
    assert_eq!(h.sink.count(), 0);
}

#[tokio::test]
async fn custom_prompt_text_overrides_defaults() {
    let h = harness(ScriptedSink::always(204));
    let seen = Mutex::new(None);
    let trigger = |req: &PromptRequest| -> Option<ConsentStatus> {
        *seen.lock().unwrap() = Some(req.clone());
        None
    };

    let task = h
        .coordinator
        .show_prompt(&trigger, Some("Cookies?"), None)
        .unwrap();
    assert!(task.is_none());

    let req = seen.lock().unwrap().clone().expect("prompt shown");
    assert_eq!(req.title, "Cookies?");
    assert_eq!(req.message, PromptRequest::default().message);
}

// ---------------------------------------------------------------------------
// 4. Retry policy
// ---------------------------------------------------------------------------

fn backoff_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(500),
        max_backoff: Duration::from_secs(30),
    }
}

#[tokio::test(start_paused = true)]
async fn reconciliation_retries_server_errors() {
    let h = harness_with(
        unsynced(ConsentStatus::Denied, 2000),
        StubIds::ok("test_id"),
        ScriptedSink::scripted(
            vec![
                Ok(SinkResponse { status_code: 503 }),
                Err(TransportError("reset".into())),
            ],
            Ok(SinkResponse { status_code: 204 }),
        ),
        backoff_policy(),
    );

    let started = tokio::time::Instant::now();
    assert_eq!(h.coordinator.reconcile().await.unwrap(), SyncOutcome::Synced);
    assert_eq!(h.sink.count(), 3);
    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert!(h.coordinator.is_synced());
}

#[tokio::test(start_paused = true)]
async fn reconciliation_gives_up_after_max_attempts() {
    let h = harness_with(
        unsynced(ConsentStatus::Denied, 2000),
        StubIds::ok("test_id"),
        ScriptedSink::always(500),
        backoff_policy(),
    );
    let err = h.coordinator.reconcile().await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteRejected { status_code: 500 }));
    assert_eq!(h.sink.count(), 3);
    assert!(!h.coordinator.is_synced());
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_not_retried() {
    let h = harness_with(
        unsynced(ConsentStatus::Accepted, 1000),
        StubIds::ok("test_id"),
        ScriptedSink::always(400),
        backoff_policy(),
    );
    let err = h.coordinator.reconcile().await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteRejected { status_code: 400 }));
    assert_eq!(h.sink.count(), 1);
}

// ---------------------------------------------------------------------------
// 5. Overlapping decisions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn later_decision_wins_over_in_flight_send() {
    let h = harness(ScriptedSink::gated(204));
    let gate = h.sink.gate.as_ref().unwrap();

    let first = h.coordinator.set_status(ConsentStatus::Accepted).unwrap();
    while h.sink.count() < 1 {
        tokio::task::yield_now().await;
    }
    let second = h.coordinator.set_status(ConsentStatus::Denied).unwrap();
    gate.add_permits(2);

    assert_eq!(first.wait().await.unwrap(), SyncOutcome::Superseded);
    assert_eq!(second.wait().await.unwrap(), SyncOutcome::Synced);

    let sent: Vec<_> = h.sink.submitted().iter().map(|t| t.status).collect();
    assert_eq!(
        sent,
        vec![consent_core::WireStatus::Accept, consent_core::WireStatus::Deny]
    );
    assert_eq!(h.coordinator.status(), ConsentStatus::Denied);
    assert!(h.coordinator.is_synced());
}

#[tokio::test]
async fn aborted_task_reports_and_leaves_unsynced() {
    let h = harness(ScriptedSink::gated(204));
    let task = h.coordinator.set_status(ConsentStatus::Accepted).unwrap();
    while h.sink.count() < 1 {
        tokio::task::yield_now().await;
    }
    task.abort();
    let err = task.wait().await.unwrap_err();
    assert!(matches!(err, SyncError::Task(_)), "got: {err}");
    assert_eq!(h.coordinator.status(), ConsentStatus::Accepted);
    assert!(!h.coordinator.is_synced());
}

#[tokio::test]
async fn clear_during_send_keeps_the_next_decision_unsynced() {
    let store = Arc::new(MemoryStore::new());
    let sink = ScriptedSink::gated(204);
    let coordinator =
        ConsentCoordinator::builder(store.clone(), StubIds::ok("test_id"), sink.clone())
            .retry(RetryPolicy::once())
            .clock(settable_clock)
            .build();
    let gate = sink.gate.as_ref().unwrap();

    NOW_MS.store(1000, Ordering::SeqCst);
    let first = coordinator.set_status(ConsentStatus::Accepted).unwrap();
    while sink.count() < 1 {
        tokio::task::yield_now().await;
    }

    coordinator.clear().unwrap();
    let cleared = store.load().unwrap();
    assert_eq!(cleared.status, ConsentStatus::Undefined);
    assert_eq!(cleared.updated_at_ms, 0);
    assert_eq!(cleared.revision, 2);

    NOW_MS.store(5_000_000, Ordering::SeqCst);
    let second = coordinator.set_status(ConsentStatus::Accepted).unwrap();
    gate.add_permits(1);

    assert_eq!(first.wait().await.unwrap(), SyncOutcome::Superseded);
    assert_eq!(
        store.load().unwrap(),
        ConsentRecord {
            status: ConsentStatus::Accepted,
            updated_at_ms: 5_000_000,
            remotely_synced: false,
            revision: 3,
        }
    );

    // The second send never gets a response.
    second.abort();
    assert!(matches!(second.wait().await, Err(SyncError::Task(_))));
    assert!(!coordinator.is_synced());
    assert_eq!(
        sink.submitted()[0].to_json().unwrap(),
        r#"{"status":"accept","device_id":"test_id","date":"1970-01-01T00:00:01Z"}"#
    );
}
