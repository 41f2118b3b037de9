//! Benchmark execution engine
//!
//! Runs a load generator on the blocking pool, times it, judges the elapsed
//! time against [`EXPECTED_DURATION`](super::EXPECTED_DURATION) and writes the
//! outcome to the diagnostic log. Faults, including panics inside the load
//! generator, end the run in the `Failed` state and are only reported through
//! the log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::workloads::WorkloadProfile;
use super::{BenchmarkError, BenchmarkKind, BenchmarkResult, BenchmarkState};
use crate::diagnostic_log::DiagnosticLog;

#[derive(Clone)]
pub struct BenchmarkEngine {
    log: Arc<DiagnosticLog>,
    profile: Arc<WorkloadProfile>,
    /// Present when runs are serialized
    run_lock: Option<Arc<tokio::sync::Mutex<()>>>,
    states: Arc<Mutex<HashMap<BenchmarkKind, BenchmarkState>>>,
}

impl BenchmarkEngine {
    pub fn new(log: Arc<DiagnosticLog>, profile: WorkloadProfile, serialize_runs: bool) -> Self {
        Self {
            log,
            profile: Arc::new(profile),
            run_lock: serialize_runs.then(|| Arc::new(tokio::sync::Mutex::new(()))),
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<BenchmarkKind, BenchmarkState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, kind: BenchmarkKind, state: BenchmarkState) {
        self.states().insert(kind, state);
    }

    /// Current state of a benchmark kind
    pub fn state(&self, kind: BenchmarkKind) -> BenchmarkState {
        self.states().get(&kind).cloned().unwrap_or_default()
    }

    fn log_line(&self, message: &str) {
        tracing::info!(target: "heartpc::benchmark", "{message}");
        self.log.record(message);
    }

    /// Run one benchmark to completion
    pub async fn run(&self, kind: BenchmarkKind) -> BenchmarkResult {
        let _guard = match &self.run_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        self.set_state(kind, BenchmarkState::Running);
        self.log_line(&format!("Starting {} stress test...", kind.label()));

        let profile = Arc::clone(&self.profile);
        let start = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || profile.run(kind))
            .await
            .unwrap_or_else(|join_err| Err(BenchmarkError::RuntimeFault(panic_message(join_err))));
        let elapsed = start.elapsed();

        let result = match outcome {
            Ok(()) => BenchmarkResult::completed(kind, elapsed),
            Err(err) => {
                tracing::warn!(%kind, "benchmark failed: {err}");
                BenchmarkResult::failed(kind, elapsed, err.to_string())
            }
        };

        for line in result.log_lines() {
            self.log_line(&line);
        }
        tracing::debug!(
            %kind,
            elapsed_secs = elapsed.as_secs_f64(),
            verdict = ?result.verdict,
            "benchmark finished"
        );

        let state = if result.is_failure() {
            BenchmarkState::Failed(result.clone())
        } else {
            BenchmarkState::Completed(result.clone())
        };
        self.set_state(kind, state);

        result
    }

    /// Start a run in the background; its result is sent on `results` when done
    ///
    /// Results from several spawned runs arrive in completion order.
    pub fn spawn(
        &self,
        kind: BenchmarkKind,
        results: mpsc::UnboundedSender<BenchmarkResult>,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.run(kind).await;
            let _ = results.send(result);
        })
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "benchmark task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::Verdict;
    use std::path::Path;
    use tempfile::TempDir;

    fn tiny(dir: &Path) -> WorkloadProfile {
        WorkloadProfile {
            cpu_iterations: 10_000,
            ram_buffers: 4,
            disk_write_buffers: 4,
            disk_read_calls: 32,
            gpu_iterations: 10_000,
            buffer_size: 8192,
            scratch_dir: dir.to_path_buf(),
        }
    }

    fn engine(dir: &TempDir, serialize: bool) -> (BenchmarkEngine, Arc<DiagnosticLog>) {
        let log = Arc::new(DiagnosticLog::new(dir.path().join("test_log.txt")));
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        (
            BenchmarkEngine::new(Arc::clone(&log), tiny(&scratch), serialize),
            log,
        )
    }

    fn messages(log: &DiagnosticLog) -> Vec<String> {
        log.read_all()
            .unwrap()
            .lines()
            .map(|line| line.split_once(": ").unwrap().1.to_string())
            .collect()
    }

    #[tokio::test]
    async fn completed_run_logs_start_summary_and_verdict() {
        let dir = TempDir::new().unwrap();
        let (engine, log) = engine(&dir, true);
        assert_eq!(engine.state(BenchmarkKind::Cpu), BenchmarkState::Idle);

        let result = engine.run(BenchmarkKind::Cpu).await;

        assert_eq!(result.verdict, Verdict::WithinBudget);
        assert!(!result.is_failure());
        let lines = messages(&log);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Starting CPU stress test...");
        assert!(lines[1].starts_with("CPU stress test completed in "));
        assert!(lines[1].ends_with(" seconds."));
        assert_eq!(lines[2], "Test completed successfully within the expected time.");
        assert_eq!(
            engine.state(BenchmarkKind::Cpu),
            BenchmarkState::Completed(result)
        );
    }

    #[tokio::test]
    async fn io_fault_ends_in_failed_state_without_propagating() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(DiagnosticLog::new(dir.path().join("test_log.txt")));
        let engine = BenchmarkEngine::new(
            Arc::clone(&log),
            tiny(&dir.path().join("missing-scratch-dir")),
            true,
        );

        let result = engine.run(BenchmarkKind::DiskWrite).await;

        assert!(result.is_failure());
        assert!(matches!(
            engine.state(BenchmarkKind::DiskWrite),
            BenchmarkState::Failed(_)
        ));
        let lines = messages(&log);
        assert_eq!(lines[0], "Starting Disk Write stress test...");
        assert!(lines[1].starts_with("Disk Write stress test failed: "));
    }

    #[tokio::test]
    async fn ram_exhaustion_is_logged_as_out_of_memory() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(DiagnosticLog::new(dir.path().join("test_log.txt")));
        let profile = WorkloadProfile {
            buffer_size: usize::MAX,
            ..tiny(dir.path())
        };
        let engine = BenchmarkEngine::new(Arc::clone(&log), profile, true);

        let result = engine.run(BenchmarkKind::Ram).await;

        assert!(result.is_failure());
        assert!(messages(&log)[1].starts_with("RAM stress test failed: Out of memory. "));
    }

    #[test]
    fn panic_payload_becomes_failure_reason() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let message = rt.block_on(async {
            let err = tokio::task::spawn_blocking(|| panic!("load generator exploded"))
                .await
                .unwrap_err();
            panic_message(err)
        });
        assert_eq!(message, "load generator exploded");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_runs_write_whole_lines() {
        for serialize in [true, false] {
            let dir = TempDir::new().unwrap();
            let (engine, log) = engine(&dir, serialize);
            let (tx, mut rx) = mpsc::unbounded_channel();

            let handles: Vec<_> = BenchmarkKind::ALL
                .into_iter()
                .map(|kind| engine.spawn(kind, tx.clone()))
                .collect();
            drop(tx);
            for handle in handles {
                handle.await.unwrap();
            }

            let mut finished = Vec::new();
            while let Some(result) = rx.recv().await {
                finished.push(result.kind);
            }
            assert_eq!(finished.len(), BenchmarkKind::ALL.len());

            let lines = messages(&log);
            assert_eq!(lines.len(), 15);
            for kind in BenchmarkKind::ALL {
                let start = format!("Starting {} stress test...", kind.label());
                assert!(lines.contains(&start), "missing {start}");
            }
            for line in &lines {
                assert!(
                    line.starts_with("Starting ")
                        || line.contains(" stress test completed in ")
                        || line.starts_with("Test completed successfully"),
                    "unexpected line {line}"
                );
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn serialized_runs_do_not_overlap() {
        let dir = TempDir::new().unwrap();
        let (engine, log) = engine(&dir, true);
        let (tx, _rx) = mpsc::unbounded_channel();

        let handles: Vec<_> = [BenchmarkKind::Cpu, BenchmarkKind::Gpu, BenchmarkKind::DiskRead]
            .into_iter()
            .map(|kind| engine.spawn(kind, tx.clone()))
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // With the run lock held, every start is followed by its own summary.
        let lines = messages(&log);
        for chunk in lines.chunks(3) {
            let label = chunk[0]
                .strip_prefix("Starting ")
                .and_then(|rest| rest.strip_suffix(" stress test..."))
                .unwrap();
            assert!(chunk[1].starts_with(&format!("{label} stress test completed in ")));
        }
    }
}
