//! Worker task and pool behaviour: inbox ingestion, re-queued documents,
//! fault recovery and backpressure.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use paperflow::alert::{AlertSink, Alerting};
use paperflow::db::job_repo;
use paperflow::models::{
    ActionKind, ConditionKind, JobStatus, Metadata, ProcessStep, Rule, RuleAction, RuleCondition,
    RuleMode,
};
use paperflow::pipeline::NO_HASH_CHANGE;
use paperflow::worker::{WorkItem, WorkerPool};
use paperflow::PaperflowError;

use common::{
    hash_bytes, BlockingExtractor, PanickingAlerts, PanickingExtractor, TestHarness, PANIC_MARKER,
};

fn steps(jobs: &[paperflow::Job]) -> Vec<ProcessStep> {
    jobs.iter().map(|j| j.step).collect()
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_inbox_file_creates_document() {
    let harness = TestHarness::new();
    let alice = harness.add_user("alice");
    let contents = b"%PDF-1.4 not really a pdf";
    let path = harness.inbox_file("alice", "report.pdf", contents);

    harness.run_items(harness.pipeline(), vec![WorkItem::file(&path)]);

    assert_eq!(harness.document_count(), 1);
    let hash = hash_bytes(contents);
    let doc = harness
        .stores
        .documents
        .get_by_hash(Some(alice.id), &hash)
        .unwrap();
    assert_eq!(doc.filename, "report.pdf");
    assert_eq!(doc.name, "report.pdf");
    assert_eq!(doc.size, contents.len() as u64);
    assert_eq!(doc.mimetype.as_deref(), Some("application/pdf"));

    assert!(!path.exists());
    assert!(harness.documents_dir.join(&hash).exists());

    let jobs = harness.jobs(&doc.id);
    assert_eq!(
        steps(&jobs),
        vec![ProcessStep::Hash, ProcessStep::Thumbnail, ProcessStep::ParseContent]
    );
    assert_eq!(jobs[0].status, JobStatus::Finished);
    assert_eq!(jobs[0].message, NO_HASH_CHANGE);
    assert!(jobs.iter().all(|j| j.status.is_terminal() && j.stopped_at.is_some()));
    assert!(!doc.name.starts_with("(Error)"));
}

#[test]
fn test_inbox_text_file_gets_content() {
    let harness = TestHarness::new();
    harness.add_user("alice");
    let path = harness.inbox_file("alice", "notes.txt", b"Electricity bill for March");

    harness.run_items(harness.pipeline(), vec![WorkItem::file(&path)]);

    let doc = harness
        .stores
        .documents
        .get_by_hash(None, &hash_bytes(b"Electricity bill for March"))
        .unwrap();
    assert_eq!(doc.content, "Electricity bill for March");
    let jobs = harness.jobs(&doc.id);
    assert_eq!(jobs[2].step, ProcessStep::ParseContent);
    assert_eq!(jobs[2].status, JobStatus::Finished);
}

#[test]
fn test_duplicate_file_is_ignored() {
    let harness = TestHarness::new();
    harness.add_user("alice");
    let first = harness.inbox_file("alice", "scan.txt", b"same bytes");
    let second = harness.inbox_file("alice", "scan-copy.txt", b"same bytes");

    harness.run_items(harness.pipeline(), vec![WorkItem::file(&first)]);
    let jobs_before = job_repo::count(&harness.db).unwrap();

    harness.run_items(harness.pipeline(), vec![WorkItem::file(&second)]);

    assert_eq!(harness.document_count(), 1);
    assert_eq!(job_repo::count(&harness.db).unwrap(), jobs_before);
    assert!(second.exists());
}

#[test]
fn test_unknown_user_creates_nothing() {
    let harness = TestHarness::new();
    harness.add_user("alice");
    let path = harness.inbox_file("unknownuser", "scan.txt", b"who owns this");

    harness.run_items(harness.pipeline(), vec![WorkItem::file(&path)]);

    assert_eq!(harness.document_count(), 0);
    assert_eq!(job_repo::count(&harness.db).unwrap(), 0);
    assert!(path.exists());
}

#[test]
fn test_requeued_document_runs_rules_and_indexes() {
    let harness = TestHarness::new();
    let alice = harness.add_user("alice");
    harness.add_rule(&Rule {
        id: 0,
        user_id: alice.id,
        name: "invoices".to_string(),
        enabled: true,
        mode: RuleMode::MatchAll,
        conditions: vec![RuleCondition::text(0, ConditionKind::NameContains, "invoice")],
        actions: vec![RuleAction {
            id: 0,
            kind: ActionKind::AddMetadata,
            value: String::new(),
            metadata_key: 3,
            metadata_value: 7,
        }],
    });
    let doc = harness.stored_document(&alice, "March invoice.pdf", b"%PDF-1.4 fake");
    let source = harness.document_path(&doc);

    harness.run_items(harness.pipeline(), vec![WorkItem::document(doc.clone(), source)]);

    let metadata = harness
        .stores
        .metadata
        .get_document_metadata(alice.id, &doc.id)
        .unwrap();
    assert_eq!(metadata, vec![Metadata::new(3, 7)]);

    let jobs = harness.jobs(&doc.id);
    assert_eq!(
        steps(&jobs),
        vec![
            ProcessStep::Hash,
            ProcessStep::Thumbnail,
            ProcessStep::ParseContent,
            ProcessStep::Rules,
            ProcessStep::Fts,
        ]
    );
    assert_eq!(jobs[3].status, JobStatus::Finished);
    assert!(jobs[3].message.contains("1 of 1 rules matched"));
    assert_eq!(jobs[4].status, JobStatus::Finished);
    assert_eq!(harness.search.indexed_ids(), vec![doc.id.clone()]);
    assert_eq!(harness.search.indexed.lock().unwrap()[0].1, alice.id);
}

#[test]
fn test_panic_cancels_document_and_worker_continues() {
    let harness = TestHarness::new();
    let alice = harness.add_user("alice");
    let broken = harness.stored_document(&alice, "broken.txt", format!("{} here", PANIC_MARKER).as_bytes());
    let healthy = harness.stored_document(&alice, "healthy.txt", b"hello");

    harness.run_items(
        harness.pipeline_with(Arc::new(PanickingExtractor)),
        vec![
            WorkItem::document(broken.clone(), harness.document_path(&broken)),
            WorkItem::document(healthy.clone(), harness.document_path(&healthy)),
        ],
    );

    let broken_now = harness.reload(&broken);
    assert_eq!(broken_now.name, "(Error) broken.txt");
    assert!(broken_now.description.starts_with("(Processing error at "));
    assert!(broken_now.description.ends_with(": server error)"));

    let broken_jobs = harness.jobs(&broken.id);
    assert_eq!(
        steps(&broken_jobs),
        vec![ProcessStep::Hash, ProcessStep::Thumbnail, ProcessStep::ParseContent]
    );
    let parse = &broken_jobs[2];
    assert_eq!(parse.status, JobStatus::Failure);
    assert!(parse.message.contains("step aborted"));
    assert!(broken_jobs.iter().all(|j| j.status.is_terminal()));

    let healthy_now = harness.reload(&healthy);
    assert_eq!(healthy_now.name, "healthy.txt");
    assert_eq!(healthy_now.content, "hello");
    let healthy_jobs = harness.jobs(&healthy.id);
    assert_eq!(healthy_jobs.len(), 5);
    assert_eq!(healthy_jobs[4].status, JobStatus::Finished);

    let alerts = harness.alerts.sent.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0]
        .message
        .starts_with("fatal error in processing task 0: panic: extractor exploded"));
    assert_eq!(alerts[0].document_id.as_deref(), Some(broken.id.as_str()));
}

#[test]
fn test_panicking_alert_sink_does_not_stop_worker() {
    let harness = TestHarness::new();
    let alice = harness.add_user("alice");
    let broken = harness.stored_document(&alice, "broken.txt", format!("{} here", PANIC_MARKER).as_bytes());
    let healthy = harness.stored_document(&alice, "healthy.txt", b"hello");

    let sink: Arc<dyn AlertSink> = Arc::new(PanickingAlerts);
    let pool = WorkerPool::new(
        harness.pipeline_with(Arc::new(PanickingExtractor)),
        Alerting::new(true, Some(sink)),
        1,
        2,
    )
    .unwrap();

    pool.submit(WorkItem::document(broken.clone(), harness.document_path(&broken)))
        .unwrap();
    pool.submit(WorkItem::document(healthy.clone(), harness.document_path(&healthy)))
        .unwrap();

    wait_until("healthy document to finish", || {
        let jobs = harness.jobs(&healthy.id);
        jobs.len() == 5 && jobs.iter().all(|j| j.status.is_terminal())
    });
    wait_until("worker to become idle", || {
        let stats = pool.stats();
        stats.busy() == 0 && stats.queued() == 0
    });
    assert!(pool.stats().workers[0].document_id.is_none());
    pool.wait();

    let broken_now = harness.reload(&broken);
    assert_eq!(broken_now.name, "(Error) broken.txt");
    assert!(harness.jobs(&broken.id).iter().all(|j| j.status.is_terminal()));

    let healthy_jobs = harness.jobs(&healthy.id);
    assert_eq!(healthy_jobs.len(), 5);
    assert_eq!(harness.reload(&healthy).name, "healthy.txt");
}

#[test]
fn test_missing_source_file_cancels_document() {
    let harness = TestHarness::new();
    let alice = harness.add_user("alice");
    let doc = harness.stored_document(&alice, "gone.txt", b"soon deleted");
    let source = harness.document_path(&doc);
    std::fs::remove_file(&source).unwrap();

    harness.run_items(harness.pipeline(), vec![WorkItem::document(doc.clone(), source)]);

    let jobs = harness.jobs(&doc.id);
    assert_eq!(steps(&jobs), vec![ProcessStep::Hash]);
    assert_eq!(jobs[0].status, JobStatus::Failure);

    let now = harness.reload(&doc);
    assert_eq!(now.name, "(Error) gone.txt");
    assert!(now.description.contains("Failed to open file"));
    assert!(harness.alerts.sent.lock().unwrap().is_empty());
}

#[test]
fn test_pool_reports_queue_full() {
    let harness = TestHarness::new();
    let alice = harness.add_user("alice");
    let (release, blocked) = crossbeam_channel::unbounded::<()>();
    let pipeline = harness.pipeline_with(Arc::new(BlockingExtractor { release: blocked }));
    let pool = WorkerPool::new(pipeline, harness.alerting(), 1, 1).unwrap();

    let docs: Vec<_> = ["a.txt", "b.txt", "c.txt"]
        .iter()
        .map(|name| harness.stored_document(&alice, name, name.as_bytes()))
        .collect();
    let item = |i: usize| WorkItem::document(docs[i].clone(), harness.document_path(&docs[i]));

    assert_eq!(pool.submit(item(0)).unwrap(), 0);
    wait_until("worker to pick up the first item", || pool.stats().busy() == 1);

    assert_eq!(pool.submit(item(1)).unwrap(), 0);
    match pool.submit(item(2)) {
        Err(PaperflowError::QueueFull { capacity }) => assert_eq!(capacity, 1),
        other => panic!("expected QueueFull, got {:?}", other.map(|_| ())),
    }

    let stats = pool.stats();
    assert_eq!(stats.queued(), 1);
    assert_eq!(stats.workers[0].document_id.as_deref(), Some(docs[0].id.as_str()));

    drop(release);
    pool.wait();

    for doc in &docs[..2] {
        let jobs = harness.jobs(&doc.id);
        assert_eq!(jobs.len(), 5, "document {} was not fully processed", doc.filename);
    }
    assert!(harness.jobs(&docs[2].id).is_empty());
}

#[test]
fn test_pool_prefers_idle_workers() {
    let harness = TestHarness::new();
    let alice = harness.add_user("alice");
    let (release, blocked) = crossbeam_channel::unbounded::<()>();
    let pipeline = harness.pipeline_with(Arc::new(BlockingExtractor { release: blocked }));
    let pool = WorkerPool::new(pipeline, harness.alerting(), 2, 2).unwrap();

    let first = harness.stored_document(&alice, "first.txt", b"first");
    let second = harness.stored_document(&alice, "second.txt", b"second");

    assert_eq!(
        pool.submit(WorkItem::document(first.clone(), harness.document_path(&first)))
            .unwrap(),
        0
    );
    wait_until("worker 0 to become busy", || !pool.stats().workers[0].idle);
    assert_eq!(
        pool.submit(WorkItem::document(second.clone(), harness.document_path(&second)))
            .unwrap(),
        1
    );

    let json = serde_json::to_value(pool.stats()).unwrap();
    assert_eq!(json["workers"].as_array().unwrap().len(), 2);
    assert_eq!(json["workers"][0]["queue_capacity"], 2);

    drop(release);
    pool.wait();
}

#[test]
fn test_pool_rejects_zero_workers() {
    let harness = TestHarness::new();
    let result = WorkerPool::new(harness.pipeline(), harness.alerting(), 0, 1);
    assert!(matches!(result, Err(PaperflowError::InvalidValue(_))));
}

#[test]
fn test_pool_refuses_work_after_shutdown() {
    let harness = TestHarness::new();
    let pool = WorkerPool::new(harness.pipeline(), harness.alerting(), 1, 1).unwrap();
    pool.shutdown();
    assert!(pool.is_shutdown());
    assert!(pool.submit(WorkItem::file("/nowhere/alice/a.txt")).is_err());
    pool.wait();
}
