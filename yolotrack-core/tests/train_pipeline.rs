//! Integration tests for the tracked training pipeline, driven with
//! in-process tracker, GPU probe and trainer fakes.

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use yolotrack_core::config::TrainConfig;
use yolotrack_core::error::{GpuError, TrackingError, TrainingError, YoloTrackError};
use yolotrack_core::gpu::{GpuDevice, GpuInventory, GpuProbe};
use yolotrack_core::pipeline::train::{self, TrainCollaborators};
use yolotrack_core::tracking::{RunHandle, RunStatus, Tracker};
use yolotrack_core::training::{RunIdentifier, Trainer, TrainingJob};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    ResolveExperiment(String),
    CreateRun(String),
    LogParam(String, String),
    EndRun(RunStatus),
}

#[derive(Default)]
struct RecordingTracker {
    calls: Mutex<Vec<Call>>,
}

impl RecordingTracker {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn params(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::LogParam(k, v) => Some((k, v)),
                _ => None,
            })
            .collect()
    }

    fn end_calls(&self) -> Vec<RunStatus> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::EndRun(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Tracker for RecordingTracker {
    fn tracking_uri(&self) -> &str {
        "http://tracker.test:5000"
    }

    async fn resolve_experiment(&self, name: &str) -> Result<String, TrackingError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::ResolveExperiment(name.to_string()));
        Ok("42".to_string())
    }

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<RunHandle, TrackingError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::CreateRun(run_name.to_string()));
        Ok(RunHandle {
            run_id: "run-1".to_string(),
            experiment_id: experiment_id.to_string(),
            run_name: run_name.to_string(),
        })
    }

    async fn log_param(
        &self,
        _run: &RunHandle,
        key: &str,
        value: &str,
    ) -> Result<(), TrackingError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::LogParam(key.to_string(), value.to_string()));
        Ok(())
    }

    async fn end_run(&self, _run: &RunHandle, status: RunStatus) -> Result<(), TrackingError> {
        self.calls.lock().unwrap().push(Call::EndRun(status));
        Ok(())
    }
}

struct FixedGpus(Vec<GpuDevice>);

#[async_trait]
impl GpuProbe for FixedGpus {
    async fn inventory(&self) -> Result<GpuInventory, GpuError> {
        Ok(GpuInventory {
            devices: self.0.clone(),
        })
    }
}

struct BrokenGpuProbe;

#[async_trait]
impl GpuProbe for BrokenGpuProbe {
    async fn inventory(&self) -> Result<GpuInventory, GpuError> {
        Err(GpuError::Parse {
            line: "???".to_string(),
            message: "garbled".to_string(),
        })
    }
}

enum Behavior {
    Succeed,
    Fail,
}

struct FakeTrainer {
    behavior: Behavior,
    jobs: Mutex<Vec<TrainingJob>>,
}

impl FakeTrainer {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            jobs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Trainer for FakeTrainer {
    async fn train(&self, job: &TrainingJob) -> Result<(), TrainingError> {
        self.jobs.lock().unwrap().push(job.clone());
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(TrainingError::Failed {
                status: "exit status: 1".to_string(),
            }),
        }
    }
}

fn config(data_config: PathBuf) -> TrainConfig {
    TrainConfig {
        tracking_uri: "http://tracker.test:5000".to_string(),
        experiment_name: "Monster Jam Detection".to_string(),
        data_config,
        model_name: "yolo11l.pt".to_string(),
        epochs: 100,
        img_size: 640,
        batch_size: None,
        trainer_bin: PathBuf::from("yolo"),
    }
}

fn identifier() -> RunIdentifier {
    RunIdentifier::new(
        "yolo11l.pt",
        100,
        Local.with_ymd_and_hms(2025, 3, 1, 14, 25, 30).unwrap(),
    )
}

fn descriptor(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("data.yaml");
    std::fs::write(&path, body).unwrap();
    path
}

fn gib(n: u64) -> u64 {
    n * 1024 * 1024 * 1024
}

#[tokio::test]
async fn test_no_gpus_logs_only_gpu_count() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = RecordingTracker::default();
    let gpus = FixedGpus(vec![]);
    let trainer = FakeTrainer::new(Behavior::Succeed);

    train::run_as(
        &config(dir.path().join("missing.yaml")),
        TrainCollaborators {
            tracker: &tracker,
            gpu: &gpus,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap();

    assert_eq!(
        tracker.params(),
        vec![("gpu_count".to_string(), "0".to_string())]
    );
}

#[tokio::test]
async fn test_two_gpus_log_two_device_sets() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = RecordingTracker::default();
    let gpus = FixedGpus(vec![
        GpuDevice {
            index: 0,
            name: "NVIDIA RTX A4000".to_string(),
            memory_bytes: gib(8),
        },
        GpuDevice {
            index: 1,
            name: "Tesla T4".to_string(),
            memory_bytes: gib(16),
        },
    ]);
    let trainer = FakeTrainer::new(Behavior::Succeed);

    train::run_as(
        &config(dir.path().join("missing.yaml")),
        TrainCollaborators {
            tracker: &tracker,
            gpu: &gpus,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap();

    let params = tracker.params();
    assert_eq!(
        params,
        vec![
            ("gpu_count".to_string(), "2".to_string()),
            ("gpu_0_name".to_string(), "NVIDIA RTX A4000".to_string()),
            ("gpu_0_memory_gb".to_string(), "8.00".to_string()),
            ("gpu_1_name".to_string(), "Tesla T4".to_string()),
            ("gpu_1_memory_gb".to_string(), "16.00".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_provenance_url_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = descriptor(
        dir.path(),
        "nc: 1\nnames: [truck]\nroboflow:\n  url: \"https://example.test/x\"\n",
    );
    let tracker = RecordingTracker::default();
    let gpus = FixedGpus(vec![]);
    let trainer = FakeTrainer::new(Behavior::Succeed);

    train::run_as(
        &config(path),
        TrainCollaborators {
            tracker: &tracker,
            gpu: &gpus,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap();

    assert!(
        tracker
            .params()
            .contains(&("dataset_url".to_string(), "https://example.test/x".to_string()))
    );
}

#[tokio::test]
async fn test_descriptor_without_roboflow_key_still_trains() {
    let dir = tempfile::tempdir().unwrap();
    let path = descriptor(dir.path(), "nc: 1\nnames: [truck]\n");
    let tracker = RecordingTracker::default();
    let gpus = FixedGpus(vec![]);
    let trainer = FakeTrainer::new(Behavior::Succeed);

    train::run_as(
        &config(path),
        TrainCollaborators {
            tracker: &tracker,
            gpu: &gpus,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap();

    assert!(tracker.params().iter().all(|(k, _)| k != "dataset_url"));
    assert_eq!(trainer.jobs.lock().unwrap().len(), 1);
    assert_eq!(tracker.end_calls(), vec![RunStatus::Finished]);
}

/// Counts WARN events emitted while installed as the default subscriber.
struct WarnCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

async fn warnings_while_training(body: &str) -> usize {
    let dir = tempfile::tempdir().unwrap();
    let path = descriptor(dir.path(), body);
    let tracker = RecordingTracker::default();
    let gpus = FixedGpus(vec![]);
    let trainer = FakeTrainer::new(Behavior::Succeed);

    let count = Arc::new(AtomicUsize::new(0));
    let _guard = tracing::subscriber::set_default(
        tracing_subscriber::registry().with(WarnCounter(count.clone())),
    );

    train::run_as(
        &config(path),
        TrainCollaborators {
            tracker: &tracker,
            gpu: &gpus,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap();

    count.load(Ordering::SeqCst)
}

#[tokio::test]
async fn test_missing_provenance_warns_once() {
    assert_eq!(warnings_while_training("nc: 1\nnames: [truck]\n").await, 1);
}

#[tokio::test]
async fn test_present_provenance_does_not_warn() {
    let body = "nc: 1\nnames: [truck]\nroboflow:\n  url: \"https://example.test/x\"\n";
    assert_eq!(warnings_while_training(body).await, 0);
}

#[tokio::test]
async fn test_run_lifecycle_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = RecordingTracker::default();
    let gpus = FixedGpus(vec![]);
    let trainer = FakeTrainer::new(Behavior::Succeed);

    let outcome = train::run_as(
        &config(dir.path().join("missing.yaml")),
        TrainCollaborators {
            tracker: &tracker,
            gpu: &gpus,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.run.run_id, "run-1");
    assert_eq!(outcome.output_name, "yolo11l.pt-e100");

    let calls = tracker.calls();
    assert_eq!(
        calls.first(),
        Some(&Call::ResolveExperiment("Monster Jam Detection".to_string()))
    );
    assert_eq!(
        calls.get(1),
        Some(&Call::CreateRun("yolo11l.pt-e100-20250301-142530".to_string()))
    );
    assert_eq!(calls.last(), Some(&Call::EndRun(RunStatus::Finished)));
    assert_eq!(tracker.end_calls().len(), 1);
}

#[tokio::test]
async fn test_run_closed_once_when_training_fails() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = RecordingTracker::default();
    let gpus = FixedGpus(vec![]);
    let trainer = FakeTrainer::new(Behavior::Fail);

    let err = train::run_as(
        &config(dir.path().join("missing.yaml")),
        TrainCollaborators {
            tracker: &tracker,
            gpu: &gpus,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, YoloTrackError::Training(_)));
    assert_eq!(tracker.end_calls(), vec![RunStatus::Failed]);
}

#[tokio::test]
async fn test_gpu_failure_is_fatal_and_closes_run() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = RecordingTracker::default();
    let trainer = FakeTrainer::new(Behavior::Succeed);

    let err = train::run_as(
        &config(dir.path().join("missing.yaml")),
        TrainCollaborators {
            tracker: &tracker,
            gpu: &BrokenGpuProbe,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, YoloTrackError::Gpu(_)));
    assert!(trainer.jobs.lock().unwrap().is_empty());
    assert_eq!(tracker.end_calls(), vec![RunStatus::Failed]);
}

#[tokio::test]
async fn test_trainer_receives_tracking_context() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = RecordingTracker::default();
    let gpus = FixedGpus(vec![]);
    let trainer = FakeTrainer::new(Behavior::Succeed);
    let mut cfg = config(dir.path().join("data.yaml"));
    cfg.batch_size = Some(8);

    train::run_as(
        &cfg,
        TrainCollaborators {
            tracker: &tracker,
            gpu: &gpus,
            trainer: &trainer,
        },
        identifier(),
    )
    .await
    .unwrap();

    let jobs = trainer.jobs.lock().unwrap();
    let job = &jobs[0];
    assert_eq!(job.tracking.run_id, "run-1");
    assert_eq!(job.tracking.experiment_name, "Monster Jam Detection");
    assert_eq!(job.tracking.tracking_uri, "http://tracker.test:5000");
    assert_eq!(job.batch_size, Some(8));
    assert_eq!(job.output_name, "yolo11l.pt-e100");
    assert_eq!(job.data_config, dir.path().join("data.yaml"));
}
