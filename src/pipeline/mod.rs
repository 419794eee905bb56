mod error;
mod stages;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dataset::DatasetDispatcher;
use crate::executor::FeatureDetector;
use crate::orbit::{OrbitConfig, OrbitWindow};
use crate::photo::Extractor;
use crate::storage::PhotoUploader;

pub use error::{IngestError, PipelineError};

/// Collaborators used by the two stages.
pub struct Services {
    pub extractor: Arc<dyn Extractor>,
    pub detector: Arc<dyn FeatureDetector>,
    pub uploader: PhotoUploader,
    pub dispatcher: DatasetDispatcher,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub queue_capacity: usize,
    pub ingest_workers: usize,
    pub extensions: Vec<String>,
    pub orbit: OrbitConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub submitted: usize,
    pub ingested: usize,
    pub dropped: usize,
    pub closures: usize,
    pub failed_batches: usize,
    pub window_len: usize,
}

struct Workers {
    ingest: JoinHandle<()>,
    aggregate: JoinHandle<()>,
}

/// Two-stage photo pipeline: ingest (parallel) feeding aggregation
/// (single task owning the orbit window) through bounded queues.
pub struct Pipeline {
    input_tx: mpsc::Sender<PathBuf>,
    extensions: Vec<String>,
    shared: Arc<StdMutex<PipelineStatus>>,
    workers: Workers,
}

impl Pipeline {
    /// Spawns both stages on the current tokio runtime.
    pub fn start(settings: PipelineSettings, services: Services) -> Self {
        let (input_tx, input_rx) = mpsc::channel(settings.queue_capacity);
        let (photo_tx, photo_rx) = mpsc::channel(settings.queue_capacity);
        let shared = Arc::new(StdMutex::new(PipelineStatus::default()));
        let services = Arc::new(services);

        let ingest = tokio::spawn(stages::run_ingest(
            input_rx,
            photo_tx,
            services.clone(),
            settings.ingest_workers.max(1),
            shared.clone(),
        ));
        let aggregate = tokio::spawn(stages::run_aggregate(
            photo_rx,
            OrbitWindow::new(settings.orbit),
            services,
            shared.clone(),
        ));

        log::info!(
            "Pipeline started ({} ingest workers, queue capacity {})",
            settings.ingest_workers,
            settings.queue_capacity
        );

        Self {
            input_tx,
            extensions: settings
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            shared,
            workers: Workers { ingest, aggregate },
        }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Queues a fully written photo. Returns `Ok(false)` for files with an
    /// unaccepted extension; waits while the input queue is full.
    pub async fn submit(&self, path: PathBuf) -> Result<bool, PipelineError> {
        if !self.accepts(&path) {
            log::debug!("Ignoring {}", path.display());
            return Ok(false);
        }
        self.input_tx
            .send(path)
            .await
            .map_err(|_| PipelineError::Closed)?;
        self.shared.lock().unwrap().submitted += 1;
        Ok(true)
    }

    pub fn status(&self) -> PipelineStatus {
        self.shared.lock().unwrap().clone()
    }

    /// Stops accepting photos, drains both stages and waits for pending
    /// dataset dispatches. Photos left in the window are discarded.
    pub async fn shutdown(self) -> PipelineStatus {
        let Pipeline {
            input_tx,
            shared,
            workers,
            ..
        } = self;
        drop(input_tx);

        if let Err(e) = workers.ingest.await {
            log::error!("Ingest stage failed: {}", e);
        }
        if let Err(e) = workers.aggregate.await {
            log::error!("Aggregation stage failed: {}", e);
        }

        let status = shared.lock().unwrap().clone();
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::JobRunner;
    use crate::geo::EnVector;
    use crate::photo::PhotoRecord;
    use crate::storage::ObjectStore;
    use crate::testing::{
        circular_orbit, photo_at, scratch_dir, MemoryStore, RecordingDetector,
        RecordingJobRunner, TableExtractor,
    };
    use std::fs;

    struct Harness {
        store: Arc<MemoryStore>,
        jobs: Arc<RecordingJobRunner>,
        detector: Arc<RecordingDetector>,
        pipeline: Pipeline,
    }

    fn start(dir: &Path, records: Vec<PhotoRecord>, workers: usize) -> Harness {
        for r in &records {
            fs::write(&r.filename, b"image").unwrap();
        }
        let store = Arc::new(MemoryStore::default());
        let jobs = Arc::new(RecordingJobRunner::default());
        let detector = Arc::new(RecordingDetector::default());

        let services = Services {
            extractor: Arc::new(TableExtractor::new(records)),
            detector: detector.clone(),
            uploader: PhotoUploader::new(store.clone() as Arc<dyn ObjectStore>, "bucket".into(), 16),
            dispatcher: DatasetDispatcher::new(
                store.clone(),
                jobs.clone() as Arc<dyn JobRunner>,
                "bucket".into(),
                "mosaic".into(),
                dir.join("work"),
                ".npz".into(),
            ),
        };
        let settings = PipelineSettings {
            queue_capacity: 4,
            ingest_workers: workers,
            extensions: vec!["JXL".into()],
            orbit: OrbitConfig::default(),
        };

        Harness {
            store,
            jobs,
            detector,
            pipeline: Pipeline::start(settings, services),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn orbit_flows_through_to_one_dataset() {
        let dir = scratch_dir();
        let records = circular_orbit(&dir);
        let paths: Vec<PathBuf> = records.iter().map(|r| r.filename.clone()).collect();
        let h = start(&dir, records, 1);

        for path in &paths {
            assert!(h.pipeline.submit(path.clone()).await.unwrap());
        }
        assert_eq!(h.pipeline.status().submitted, 10);
        let status = h.pipeline.shutdown().await;

        assert_eq!(
            status,
            PipelineStatus {
                submitted: 10,
                ingested: 10,
                dropped: 0,
                closures: 1,
                failed_batches: 0,
                window_len: 0,
            }
        );
        let runs = h.jobs.runs();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].1["DATASET"].starts_with("datasets/2025/06/01/"));
        assert_eq!(h.detector.seen(), paths);

        let names = h.store.names();
        assert_eq!(names.iter().filter(|n| n.starts_with("images/")).count(), 10);
        assert_eq!(names.iter().filter(|n| n.starts_with("datasets/")).count(), 1);
        assert!(paths
            .iter()
            .all(|p| dir.join(format!("{}.mosaiced", p.file_name().unwrap().to_string_lossy())).exists()));

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn bad_photos_are_dropped_without_stopping_the_stream() {
        let dir = scratch_dir();
        let records: Vec<PhotoRecord> = (0..10)
            .map(|i| {
                let t = 10.0 * i as f64;
                photo_at(
                    dir.join(format!("line_{}.jxl", i)),
                    t,
                    0.0,
                    50.0 * t,
                    Some(EnVector::new(0.0, 50.0)),
                )
            })
            .collect();
        let paths: Vec<PathBuf> = records.iter().map(|r| r.filename.clone()).collect();
        let h = start(&dir, records, 3);

        let unknown = dir.join("no_gps.jxl");
        fs::write(&unknown, b"image").unwrap();
        assert!(h.pipeline.submit(unknown).await.unwrap());
        assert!(!h.pipeline.submit(dir.join("notes.txt")).await.unwrap());
        for path in paths {
            assert!(h.pipeline.submit(path).await.unwrap());
        }
        let status = h.pipeline.shutdown().await;

        assert_eq!(status.submitted, 11);
        assert_eq!(status.dropped, 1);
        assert_eq!(status.ingested, 10);
        assert_eq!(status.closures, 0);
        assert_eq!(status.window_len, 10);
        assert!(h.jobs.runs().is_empty());

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn submit_after_stages_stop_reports_closed() {
        let dir = scratch_dir();
        let mut h = start(&dir, Vec::new(), 1);
        assert!(h.pipeline.accepts(Path::new("/x/a.jxl")));
        assert!(h.pipeline.accepts(Path::new("/x/a.JXL")));
        assert!(!h.pipeline.accepts(Path::new("/x/a")));

        h.pipeline.workers.ingest.abort();
        let _ = (&mut h.pipeline.workers.ingest).await;
        assert!(matches!(
            h.pipeline.submit(dir.join("a.jxl")).await,
            Err(PipelineError::Closed)
        ));
        fs::remove_dir_all(dir).unwrap();
    }
}
