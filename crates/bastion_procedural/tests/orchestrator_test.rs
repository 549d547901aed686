//! # Orchestrator Tests
//!
//! Exercises the worker pool through its public surface: duplicate
//! requests, failures, cancellation and the per-call drain cap.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bastion_procedural::{
    Catalog, ChunkOrchestrator, Completion, GenerationError, GenerationSeed, GeneratorConfig, GridSize, JobId,
    JobSpec, JobState, OrchestratorConfig,
};

fn orchestrator(catalog: Arc<Catalog>, workers: usize, size: GridSize) -> ChunkOrchestrator {
    let generator = GeneratorConfig {
        grid_size: size,
        ..GeneratorConfig::default()
    };
    let config = OrchestratorConfig {
        max_concurrent: workers,
        drain_per_tick: 2,
        seed: GenerationSeed::new(11),
    };
    ChunkOrchestrator::new(catalog, generator, config).unwrap()
}

/// Polls `done` until it holds or ten seconds pass.
fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

fn drain_all(orch: &ChunkOrchestrator, expected: usize) -> Vec<Completion> {
    let mut out = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    while out.len() < expected && Instant::now() < deadline {
        orch.drain_timeout(expected, Duration::from_millis(50), |c| out.push(c));
    }
    out
}

/// Test: a second request for an active id never queues a duplicate.
#[test]
fn test_duplicate_request_is_noop() {
    let orch = orchestrator(common::permissive(&["a", "b"]), 1, GridSize::new(4, 2, 4));
    let id = JobId::from_chunk(3, -7);

    assert!(orch.request_generation(id, 0));
    // Queued, generating or awaiting handoff: all of them refuse.
    assert!(!orch.request_generation(id, 0));
    assert!(!orch.request_generation(id, 10));

    let done = drain_all(&orch, 1);
    assert_eq!(done.len(), 1);
    assert!(wait_for(|| orch.is_idle()));

    let mut extra = 0;
    orch.drain_timeout(8, Duration::from_millis(100), |_| extra += 1);
    assert_eq!(extra, 0, "duplicate request produced a second result");
    assert_eq!(orch.state(id), Some(JobState::Complete));
}

/// Test: a contradicting job is delivered as a failure, not as a structure.
#[test]
fn test_contradiction_is_delivered_as_failure() {
    let orch = orchestrator(common::dead_end(), 1, GridSize::new(2, 2, 2));
    let id = JobId(1);
    assert!(orch.request_generation(id, 0));

    let done = drain_all(&orch, 1);
    assert_eq!(done.len(), 1);
    assert!(!done[0].is_success());
    assert!(matches!(done[0].outcome, Err(GenerationError::Contradiction { .. })));
    assert_eq!(orch.state(id), Some(JobState::Failed));
    assert_eq!(orch.stats().failed, 1);
}

/// Test: after cancel, nothing from before the cancel is ever drained.
#[test]
fn test_cancel_never_delivers_results() {
    let orch = orchestrator(common::permissive(&["a", "b", "c"]), 2, GridSize::new(12, 4, 12));
    let ids: Vec<JobId> = (0..24).map(JobId).collect();
    for &id in &ids {
        assert!(orch.request_generation(id, 0));
    }

    orch.cancel();
    assert!(wait_for(|| orch.stats().generating == 0));

    let mut delivered = 0;
    orch.drain_timeout(64, Duration::from_millis(100), |_| delivered += 1);
    assert_eq!(delivered, 0);

    let stats = orch.stats();
    assert_eq!(stats.cancelled, ids.len());
    assert_eq!(stats.completed + stats.ready + stats.queued, 0);

    // Cancelled ids can be requested again and complete normally.
    assert!(orch.request_generation(ids[0], 0));
    let done = drain_all(&orch, 1);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].job, ids[0]);
    assert!(done[0].is_success());
}

/// Test: a single drain call never hands over more than its cap.
#[test]
fn test_drain_respects_cap() {
    let orch = orchestrator(common::permissive(&["a", "b"]), 3, GridSize::new(3, 2, 3));
    for i in 0..6 {
        assert!(orch.request_generation(JobId(i), 0));
    }
    assert!(wait_for(|| orch.stats().ready == 6));

    let mut per_call = Vec::new();
    for _ in 0..4 {
        per_call.push(orch.drain(2, |_| {}));
    }
    assert_eq!(per_call, vec![2, 2, 2, 0]);
    assert_eq!(orch.stats().completed, 6);
}

/// Test: explicit specs carry their own size and seed.
#[test]
fn test_explicit_spec_controls_size_and_seed() {
    let catalog = common::permissive(&["a", "b", "c"]);
    let orch = orchestrator(Arc::clone(&catalog), 2, GridSize::new(3, 2, 3));
    let size = GridSize::new(5, 1, 2);
    let spec = |id| JobSpec {
        id: JobId(id),
        priority: 0,
        size,
        seed: GenerationSeed::new(404),
    };
    assert!(orch.request(spec(1)));
    assert!(orch.request(spec(2)));

    let mut done = drain_all(&orch, 2);
    done.sort_by_key(|c| c.job);
    let first = done[0].outcome.as_ref().unwrap();
    let second = done[1].outcome.as_ref().unwrap();
    assert_eq!(first.size(), size);
    assert_eq!(first, second, "same seed must give the same structure");
}
