use docfinder_indexer::{
    IndexingEvent, JobCollaborators, JobOrchestrator, JobState, OrchestratorConfig,
    SubmitOutcome, ThreadedExecutor,
};
use docfinder_pipeline::memory::MemoryIndex;
use docfinder_pipeline::{Document, ExtractError, Extractor, FileTypeRegistry};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Extractor that parks every call until released, letting tests hold jobs
/// in the running state deterministically.
struct GateExtractor {
    entered: AtomicUsize,
    release: AtomicBool,
}

impl GateExtractor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: AtomicUsize::new(0),
            release: AtomicBool::new(false),
        })
    }

    fn release(&self) {
        self.release.store(true, Ordering::SeqCst);
    }

    fn wait_entered(&self, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if self.entered.load(Ordering::SeqCst) >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl Extractor for GateExtractor {
    fn extract(&self, path: &Path) -> Result<Document, ExtractError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        // Bounded park so a failing test cannot hang the suite.
        let deadline = Instant::now() + Duration::from_secs(30);
        while !self.release.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        Document::new(path, "gated".to_string()).map_err(|source| ExtractError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn collaborators(extractor: Arc<dyn Extractor>) -> JobCollaborators {
    JobCollaborators {
        extractor,
        index: Arc::new(MemoryIndex::new()),
        registry: Arc::new(FileTypeRegistry::default()),
        detector: None,
    }
}

fn orchestrator(max: usize, grace: Duration) -> JobOrchestrator {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = OrchestratorConfig {
        max_concurrent_jobs: max,
        grace_period: grace,
        ..OrchestratorConfig::default()
    };
    JobOrchestrator::new(config, Arc::new(ThreadedExecutor))
}

fn folder_with_one_file() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("doc.txt"), "body").unwrap();
    dir
}

async fn wait_for_state(
    orchestrator: &JobOrchestrator,
    job_id: docfinder_indexer::JobId,
    state: JobState,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if orchestrator.job_state(job_id) == Some(state) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread")]
async fn ceiling_refuses_the_third_job_and_frees_after_cleanup() {
    let gate = GateExtractor::new();
    let orchestrator = orchestrator(2, Duration::from_secs(5));
    let collab = collaborators(gate.clone());

    let dir_a = folder_with_one_file();
    let dir_b = folder_with_one_file();
    let dir_c = folder_with_one_file();

    let a = orchestrator.submit(dir_a.path(), &collab);
    let b = orchestrator.submit(dir_b.path(), &collab);
    assert!(a.is_accepted() && b.is_accepted());
    assert!(gate.wait_entered(2), "both jobs should reach extraction");

    let c = orchestrator.submit(dir_c.path(), &collab);
    assert_eq!(
        c,
        SubmitOutcome::AtCapacity {
            active: 2,
            ceiling: 2
        }
    );

    gate.release();
    assert!(wait_for_state(&orchestrator, a.job_id().unwrap(), JobState::Finished).await);
    assert!(wait_for_state(&orchestrator, b.job_id().unwrap(), JobState::Finished).await);

    assert_eq!(orchestrator.cleanup_finished(), 2);
    let c_again = orchestrator.submit(dir_c.path(), &collab);
    assert!(c_again.is_accepted(), "capacity must be free after cleanup");
    assert!(wait_for_state(&orchestrator, c_again.job_id().unwrap(), JobState::Finished).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_folder_is_refused_only_while_active() {
    let gate = GateExtractor::new();
    let orchestrator = orchestrator(2, Duration::from_secs(5));
    let collab = collaborators(gate.clone());
    let dir = folder_with_one_file();

    let first = orchestrator.submit(dir.path(), &collab);
    assert!(first.is_accepted());
    assert!(gate.wait_entered(1));

    match orchestrator.submit(dir.path(), &collab) {
        SubmitOutcome::AlreadyIndexing { folder } => assert_eq!(folder, dir.path()),
        other => panic!("expected duplicate refusal, got {other:?}"),
    }

    gate.release();
    assert!(wait_for_state(&orchestrator, first.job_id().unwrap(), JobState::Finished).await);
    orchestrator.cleanup_finished();

    let second = orchestrator.submit(dir.path(), &collab);
    assert!(second.is_accepted(), "finished folder must be resubmittable");
}

#[tokio::test(flavor = "multi_thread")]
async fn forced_cancel_of_a_stuck_job_terminates_within_grace() {
    let gate = GateExtractor::new(); // never released
    let orchestrator = orchestrator(1, Duration::from_millis(200));
    let collab = collaborators(gate.clone());
    let dir = folder_with_one_file();

    let outcome = orchestrator.submit(dir.path(), &collab);
    let job_id = outcome.job_id().unwrap();
    assert!(gate.wait_entered(1), "job should be stuck in extraction");

    let started = Instant::now();
    assert!(orchestrator.cancel(job_id, true).await);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "forced cancel must not wait past the grace period"
    );

    assert_eq!(orchestrator.job_state(job_id), Some(JobState::Finished));
    let summary = orchestrator.status_summary();
    let detail = summary.jobs.iter().find(|d| d.job_id == job_id).unwrap();
    assert_eq!(detail.last_error.as_deref(), Some("forced stop"));
    assert_eq!(summary.active_jobs, 0);

    gate.release(); // let the abandoned thread drain
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_all_forces_every_stuck_job_to_terminal() {
    let gate = GateExtractor::new();
    let orchestrator = orchestrator(2, Duration::from_millis(200));
    let collab = collaborators(gate.clone());

    let dir_a = folder_with_one_file();
    let dir_b = folder_with_one_file();
    let a = orchestrator.submit(dir_a.path(), &collab);
    let b = orchestrator.submit(dir_b.path(), &collab);
    assert!(gate.wait_entered(2));

    assert_eq!(orchestrator.cancel_all(true).await, 2);
    for outcome in [a, b] {
        let state = orchestrator.job_state(outcome.job_id().unwrap()).unwrap();
        assert!(state.is_terminal(), "job left in {state:?}");
    }

    gate.release();
}

#[tokio::test(flavor = "multi_thread")]
async fn cooperative_cancel_stops_a_multi_file_job_early() {
    let gate = GateExtractor::new();
    let orchestrator = orchestrator(1, Duration::from_secs(5));
    let collab = collaborators(gate.clone());

    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        std::fs::write(dir.path().join(format!("doc{i:02}.txt")), "body").unwrap();
    }

    let outcome = orchestrator.submit(dir.path(), &collab);
    let job_id = outcome.job_id().unwrap();
    assert!(gate.wait_entered(1));

    assert!(orchestrator.cancel(job_id, false).await);
    gate.release();
    assert!(wait_for_state(&orchestrator, job_id, JobState::Finished).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_event_carries_failure_statistics() {
    let orchestrator = orchestrator(1, Duration::from_secs(5));
    let mut events = orchestrator.subscribe();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ok.txt"), "fine").unwrap();
    std::fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();

    let collab = JobCollaborators {
        extractor: Arc::new(docfinder_pipeline::memory::TextExtractor::new()),
        index: Arc::new(MemoryIndex::new()),
        registry: Arc::new(FileTypeRegistry::default()),
        detector: None,
    };
    let outcome = orchestrator.submit(dir.path(), &collab);
    let job_id = outcome.job_id().unwrap();
    assert!(wait_for_state(&orchestrator, job_id, JobState::Finished).await);

    let deadline = Instant::now() + Duration::from_secs(10);
    let stats = loop {
        assert!(Instant::now() < deadline, "no completion event arrived");
        match events.recv().await {
            Ok(IndexingEvent::JobCompleted { stats, .. }) => break stats,
            Ok(_) => {}
            Err(err) => panic!("event stream ended: {err}"),
        }
    };
    assert_eq!(stats.total_files_found, 2);
    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.errors.len(), 1);
}
