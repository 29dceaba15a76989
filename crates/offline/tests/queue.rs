use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use offline::{
    EntityRef, EntityType, HttpBackend, JsonFileStore, MemoryStore, NewOperation, OfflineError, OfflineQueue,
    OperationKind, OperationStatus, QueueFile, QueuePolicy, QueueState, QueuedOperation,
    SyncBackend, SyncEvent, SyncFailure, SyncOutcome, SyncReport, SyncRequest, TempId,
    watch_connectivity,
};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{Notify, watch},
};
use uuid::Uuid;

/// Records every request; fails while `down` is set or when the payload
/// carries `"fail": true`. Creates get ids 100, 101, …
struct ScriptedBackend {
    calls: Mutex<Vec<SyncRequest>>,
    down: AtomicBool,
    next_id: AtomicU64,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            down: AtomicBool::new(false),
            next_id: AtomicU64::new(100),
        })
    }

    fn calls(&self) -> Vec<SyncRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncBackend for ScriptedBackend {
    async fn send(&self, request: &SyncRequest) -> Result<SyncOutcome, SyncFailure> {
        self.calls.lock().unwrap().push(request.clone());
        if self.down.load(Ordering::SeqCst) || request.payload["fail"] == json!(true) {
            return Err(SyncFailure::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        let server_id = (request.kind == OperationKind::Create)
            .then(|| self.next_id.fetch_add(1, Ordering::SeqCst).to_string());
        Ok(SyncOutcome { server_id })
    }
}

fn queue_with(backend: Arc<ScriptedBackend>) -> OfflineQueue {
    OfflineQueue::builder()
        .store(Arc::new(MemoryStore::new()))
        .backend(backend)
        .build()
        .unwrap()
}

fn trip(title: &str) -> NewOperation {
    NewOperation::create(EntityType::Trip, json!({ "title": title }))
}

fn status_of(queue: &OfflineQueue, id: Uuid) -> QueuedOperation {
    queue
        .operations()
        .unwrap()
        .into_iter()
        .find(|op| op.id == id)
        .unwrap()
}

#[tokio::test]
async fn every_pending_operation_completes_in_order() {
    let backend = ScriptedBackend::new();
    let queue = queue_with(backend.clone());

    for i in 0..5 {
        queue.enqueue(trip(&format!("trip {i}"))).unwrap();
    }

    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(
        report,
        SyncReport {
            succeeded: 5,
            failed: 0,
            retried: 0
        }
    );

    let counts = queue.counts().unwrap();
    assert_eq!(counts.completed, 5);
    assert_eq!(counts.pending + counts.syncing + counts.failed, 0);
    assert_eq!(queue.queue_state().unwrap(), QueueState::Idle);

    let titles: Vec<Value> = backend
        .calls()
        .into_iter()
        .map(|req| req.payload["title"].clone())
        .collect();
    let expected: Vec<Value> = (0..5).map(|i| json!(format!("trip {i}"))).collect();
    assert_eq!(titles, expected);
}

#[tokio::test]
async fn always_failing_operation_is_parked_after_three_attempts() {
    let backend = ScriptedBackend::new();
    backend.down.store(true, Ordering::SeqCst);
    let queue = queue_with(backend.clone());
    let op = queue.enqueue(trip("Kyoto")).unwrap();

    for attempt in 1..=2 {
        let report = queue.process_queue().await.unwrap().unwrap();
        assert_eq!(report.retried, 1);
        let stored = status_of(&queue, op.id);
        assert_eq!(stored.status, OperationStatus::Pending);
        assert_eq!(stored.retry_count, attempt);
        assert!(stored.last_error.unwrap().contains("503"));
    }

    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(status_of(&queue, op.id).status, OperationStatus::Failed);
    assert_eq!(backend.calls().len(), 3);

    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report, SyncReport::default());
    assert_eq!(backend.calls().len(), 3);

    backend.down.store(false, Ordering::SeqCst);
    let report = queue.retry_failed().await.unwrap().unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(backend.calls().len(), 4);
    let stored = status_of(&queue, op.id);
    assert_eq!(stored.status, OperationStatus::Completed);
    assert_eq!(stored.retry_count, 0);
}

#[tokio::test]
async fn one_failure_does_not_stop_the_run() {
    let backend = ScriptedBackend::new();
    let queue = queue_with(backend.clone());

    queue.enqueue(trip("first")).unwrap();
    let bad = queue
        .enqueue(NewOperation::create(
            EntityType::Trip,
            json!({ "title": "bad", "fail": true }),
        ))
        .unwrap();
    queue.enqueue(trip("third")).unwrap();

    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.retried, 1);
    assert_eq!(backend.calls().len(), 3);
    assert_eq!(status_of(&queue, bad.id).status, OperationStatus::Pending);
}

#[tokio::test]
async fn offline_diary_entry_gets_its_server_id_once() {
    let backend = ScriptedBackend::new();
    let queue = OfflineQueue::builder()
        .store(Arc::new(MemoryStore::new()))
        .backend(backend.clone())
        .online(false)
        .build()
        .unwrap();

    let trip_op = queue.enqueue(trip("Lisbon")).unwrap();
    let trip_ref = trip_op.target.clone();
    let entry = queue
        .enqueue(
            NewOperation::create(EntityType::DiaryEntry, json!({ "title": "Day 1" }))
                .parent(trip_ref.clone()),
        )
        .unwrap();

    assert_eq!(queue.process_queue().await.unwrap(), None);
    assert!(backend.calls().is_empty());

    queue.set_online(true);
    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report.succeeded, 2);

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].entity, EntityType::DiaryEntry);
    assert_eq!(calls[1].parent.as_deref(), Some("100"));

    let entry_temp = entry.target.local().unwrap();
    let cached = queue.entity(entry_temp).unwrap().unwrap();
    assert_eq!(cached.server_id.as_deref(), Some("101"));
    assert_eq!(cached.payload["title"], "Day 1");
    let cached_trip = queue.entity(trip_ref.local().unwrap()).unwrap().unwrap();
    assert_eq!(cached_trip.server_id.as_deref(), Some("100"));

    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report, SyncReport::default());
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test]
async fn pending_operations_are_remapped_to_the_server_id() {
    let backend = ScriptedBackend::new();
    backend.down.store(true, Ordering::SeqCst);
    let queue = queue_with(backend.clone());

    let create = queue.enqueue(trip("Oslo")).unwrap();
    let temp = create.target.local().unwrap().clone();
    let update = queue
        .enqueue(NewOperation::update(
            EntityType::Trip,
            EntityRef::Local(temp.clone()),
            json!({ "title": "Oslo & Bergen" }),
        ))
        .unwrap();
    assert_eq!(
        queue.entity(&temp).unwrap().unwrap().payload["title"],
        "Oslo & Bergen"
    );

    // The create fails, so the update cannot be sent yet.
    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report.retried, 2);
    assert_eq!(backend.calls().len(), 1);
    assert!(
        status_of(&queue, update.id)
            .last_error
            .unwrap()
            .contains("no server id")
    );

    backend.down.store(false, Ordering::SeqCst);
    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report.succeeded, 2);

    let calls = backend.calls();
    assert_eq!(calls[2].kind, OperationKind::Update);
    assert_eq!(calls[2].target.as_deref(), Some("100"));
    assert_eq!(
        status_of(&queue, update.id).target,
        EntityRef::Server("100".to_string())
    );

    // Later mutations of the same entity go straight to the server id.
    let delete = queue
        .enqueue(NewOperation::delete(EntityType::Trip, EntityRef::Local(temp)))
        .unwrap();
    assert_eq!(delete.target, EntityRef::Server("100".to_string()));
}

/// A store left behind by a process that died during a run.
fn crashed_store() -> (MemoryStore, QueuedOperation) {
    let now = Utc::now();
    let stuck = QueuedOperation {
        id: Uuid::new_v4(),
        seq: 1,
        kind: OperationKind::Update,
        entity: EntityType::Place,
        target: EntityRef::Server("9".to_string()),
        parent: None,
        payload: json!({ "name": "Castle" }),
        status: OperationStatus::Syncing,
        retry_count: 1,
        created_at: now,
        updated_at: now,
        completed_at: None,
        last_error: Some("timeout".to_string()),
    };
    let mut file = QueueFile {
        state: QueueState::Syncing { started_at: now },
        next_seq: 1,
        ..Default::default()
    };
    file.operations.insert(stuck.id, stuck.clone());
    (MemoryStore::with_state(file), stuck)
}

#[tokio::test]
async fn interrupted_run_is_recovered() {
    let (store, stuck) = crashed_store();
    let backend = ScriptedBackend::new();
    let queue = OfflineQueue::builder()
        .store(Arc::new(store))
        .backend(backend.clone())
        .build()
        .unwrap();

    assert_eq!(queue.recover().unwrap(), 1);
    assert_eq!(queue.queue_state().unwrap(), QueueState::Idle);
    let recovered = status_of(&queue, stuck.id);
    assert_eq!(recovered.status, OperationStatus::Pending);
    assert_eq!(recovered.retry_count, 1);

    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(backend.calls()[0].target.as_deref(), Some("9"));
    assert_eq!(queue.recover().unwrap(), 0);
}

#[tokio::test]
async fn next_run_picks_up_an_interrupted_one() {
    let (store, stuck) = crashed_store();
    let backend = ScriptedBackend::new();
    let queue = OfflineQueue::builder()
        .store(Arc::new(store))
        .backend(backend.clone())
        .build()
        .unwrap();

    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(status_of(&queue, stuck.id).status, OperationStatus::Completed);
    assert_eq!(queue.queue_state().unwrap(), QueueState::Idle);
    assert_eq!(backend.calls().len(), 1);
}

/// Blocks inside `send` until released, then answers with `outcome`.
struct GateBackend {
    entered: Notify,
    release: Notify,
    outcome: Result<SyncOutcome, SyncFailure>,
}

impl GateBackend {
    fn new(outcome: Result<SyncOutcome, SyncFailure>) -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
            outcome,
        })
    }
}

#[async_trait]
impl SyncBackend for GateBackend {
    async fn send(&self, _request: &SyncRequest) -> Result<SyncOutcome, SyncFailure> {
        self.entered.notify_one();
        self.release.notified().await;
        self.outcome.clone()
    }
}

fn gated_queue(backend: Arc<GateBackend>) -> Arc<OfflineQueue> {
    Arc::new(
        OfflineQueue::builder()
            .store(Arc::new(MemoryStore::new()))
            .backend(backend)
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn second_run_while_one_is_in_flight_is_a_noop() {
    let backend = GateBackend::new(Ok(SyncOutcome::default()));
    let queue = gated_queue(backend.clone());
    queue
        .enqueue(NewOperation::delete(
            EntityType::DiaryEntry,
            EntityRef::Server("12".to_string()),
        ))
        .unwrap();

    let running = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.process_queue().await })
    };
    backend.entered.notified().await;

    assert!(queue.is_running());
    assert!(matches!(
        queue.queue_state().unwrap(),
        QueueState::Syncing { .. }
    ));
    assert_eq!(queue.process_queue().await.unwrap(), None);
    assert_eq!(queue.recover().unwrap(), 0);

    backend.release.notify_one();
    let report = running.await.unwrap().unwrap().unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(!queue.is_running());
}

#[tokio::test]
async fn operations_cleared_while_in_flight_stay_cleared() {
    let outcomes = [
        Ok(SyncOutcome {
            server_id: Some("31".to_string()),
        }),
        Err(SyncFailure::Transport("connection reset".to_string())),
    ];
    for outcome in outcomes {
        let backend = GateBackend::new(outcome.clone());
        let queue = gated_queue(backend.clone());
        let op = queue.enqueue(trip("Riga")).unwrap();

        let running = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.process_queue().await })
        };
        backend.entered.notified().await;
        assert_eq!(queue.clear_all().unwrap(), 1);

        backend.release.notify_one();
        let report = running.await.unwrap().unwrap().unwrap();
        assert_eq!(report.failed + report.retried, 0);
        assert!(queue.operations().unwrap().is_empty());

        // The server id of a create that went through is still recorded.
        let cached = queue.entity(op.target.local().unwrap()).unwrap().unwrap();
        assert_eq!(cached.server_id.is_some(), outcome.is_ok());
    }
}

/// Answers every HTTP request with `response`; returns the base URL and a
/// request counter.
async fn serve_raw(response: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            read_request(&mut socket).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{addr}"), hits)
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }
}

#[tokio::test]
async fn accepted_create_with_empty_body_is_not_sent_again() {
    let (base_url, hits) =
        serve_raw("HTTP/1.1 201 Created\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await;
    let queue = OfflineQueue::builder()
        .store(Arc::new(MemoryStore::new()))
        .backend(Arc::new(HttpBackend::new(&base_url).unwrap()))
        .build()
        .unwrap();
    let op = queue.enqueue(trip("Tallinn")).unwrap();

    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report.succeeded, 1);
    let report = queue.process_queue().await.unwrap().unwrap();
    assert_eq!(report, SyncReport::default());

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(status_of(&queue, op.id).status, OperationStatus::Completed);
    let cached = queue.entity(op.target.local().unwrap()).unwrap().unwrap();
    assert_eq!(cached.server_id, None);
}

#[tokio::test]
async fn going_online_triggers_a_run() {
    let backend = ScriptedBackend::new();
    let queue = Arc::new(
        OfflineQueue::builder()
            .store(Arc::new(MemoryStore::new()))
            .backend(backend.clone())
            .online(false)
            .build()
            .unwrap(),
    );
    queue.enqueue(trip("Seville")).unwrap();
    let mut events = queue.subscribe();

    let (tx, rx) = watch::channel(false);
    let watcher = watch_connectivity(queue.clone(), rx);
    tx.send(true).unwrap();

    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.unwrap();
            seen.push(event.clone());
            if let SyncEvent::Finished(report) = event {
                return (report, seen);
            }
        }
    })
    .await
    .unwrap();

    let (report, seen) = finished;
    assert_eq!(report.succeeded, 1);
    assert_eq!(
        seen,
        vec![
            SyncEvent::Started { total: 1 },
            SyncEvent::Progress {
                processed: 1,
                total: 1
            },
            SyncEvent::Finished(report),
        ]
    );
    assert!(queue.is_online());

    tx.send(false).unwrap();
    drop(tx);
    watcher.await.unwrap();
    assert!(!queue.is_online());
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn completed_operations_are_pruned_and_cleared() {
    let backend = ScriptedBackend::new();
    let queue = OfflineQueue::builder()
        .store(Arc::new(MemoryStore::new()))
        .backend(backend.clone())
        .policy(QueuePolicy {
            max_retries: 3,
            completed_grace: Duration::ZERO,
        })
        .build()
        .unwrap();
    queue.enqueue(trip("gone")).unwrap();
    queue.process_queue().await.unwrap();
    assert!(queue.operations().unwrap().is_empty());

    let queue = queue_with(backend);
    queue.enqueue(trip("kept")).unwrap();
    queue
        .enqueue(NewOperation::create(
            EntityType::Trip,
            json!({ "fail": true }),
        ))
        .unwrap();
    queue.process_queue().await.unwrap();

    assert_eq!(queue.clear_completed().unwrap(), 1);
    assert_eq!(queue.counts().unwrap().pending, 1);
    assert_eq!(queue.clear_all().unwrap(), 1);
    assert!(queue.operations().unwrap().is_empty());
    assert_eq!(queue.entities().unwrap().len(), 2);
}

#[tokio::test]
async fn queue_file_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.json");
    let backend = ScriptedBackend::new();

    let open = |backend: Arc<ScriptedBackend>| {
        OfflineQueue::builder()
            .store(Arc::new(JsonFileStore::open(&path).unwrap()))
            .backend(backend)
            .build()
            .unwrap()
    };

    {
        let queue = open(backend.clone());
        queue.enqueue(trip("Porto")).unwrap();
        queue.enqueue(trip("Braga")).unwrap();
    }

    let queue = open(backend.clone());
    let seqs: Vec<u64> = queue.operations().unwrap().iter().map(|op| op.seq).collect();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(queue.process_queue().await.unwrap().unwrap().succeeded, 2);
    drop(queue);

    let queue = open(backend);
    assert_eq!(queue.counts().unwrap().completed, 2);
    assert_eq!(queue.queue_state().unwrap(), QueueState::Idle);
    assert!(
        queue
            .entities()
            .unwrap()
            .iter()
            .all(|entity| entity.server_id.is_some())
    );
}

#[test]
fn invalid_operations_are_rejected_at_enqueue() {
    let queue = queue_with(ScriptedBackend::new());

    let err = queue
        .enqueue(NewOperation::create(EntityType::Place, json!({})))
        .unwrap_err();
    assert!(matches!(err, OfflineError::InvalidArgument(_)));

    let err = queue
        .enqueue(NewOperation {
            kind: OperationKind::Update,
            entity: EntityType::Trip,
            target: None,
            parent: None,
            payload: json!({}),
        })
        .unwrap_err();
    assert!(matches!(err, OfflineError::InvalidArgument(_)));

    let err = queue
        .enqueue(NewOperation {
            kind: OperationKind::Create,
            entity: EntityType::Trip,
            target: Some(EntityRef::Server("5".to_string())),
            parent: None,
            payload: json!({}),
        })
        .unwrap_err();
    assert!(matches!(err, OfflineError::InvalidArgument(_)));

    let temp = TempId::generate();
    let op = queue.enqueue(trip("named").temp_id(temp.clone())).unwrap();
    assert_eq!(op.target, EntityRef::Local(temp));
    assert_eq!(queue.operations().unwrap().len(), 1);
}
