use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::orbit::OrbitWindow;
use crate::photo::PhotoRecord;
use crate::pipeline::{IngestError, PipelineStatus, Services};

/// Stage 1: metadata, features and upload, `workers` photos at a time.
/// Records may reach stage 2 out of submission order.
pub async fn run_ingest(
    mut input_rx: mpsc::Receiver<PathBuf>,
    photo_tx: mpsc::Sender<PhotoRecord>,
    services: Arc<Services>,
    workers: usize,
    shared: Arc<StdMutex<PipelineStatus>>,
) {
    let permits = Arc::new(Semaphore::new(workers));

    while let Some(path) = input_rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let services = services.clone();
        let photo_tx = photo_tx.clone();
        let shared = shared.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let blocking_path = path.clone();
            let result =
                tokio::task::spawn_blocking(move || ingest_photo(&services, &blocking_path)).await;

            match result {
                Ok(Ok(record)) => {
                    shared.lock().unwrap().ingested += 1;
                    if photo_tx.send(record).await.is_err() {
                        log::error!(
                            "Aggregation stage gone, dropping {}",
                            path.display()
                        );
                    }
                }
                Ok(Err(e)) => {
                    log::warn!("Failed to add photo {}: {}", path.display(), e);
                    shared.lock().unwrap().dropped += 1;
                }
                Err(e) => {
                    log::error!("Ingest of {} aborted: {}", path.display(), e);
                    shared.lock().unwrap().dropped += 1;
                }
            }
        });
    }

    // wait for in-flight photos before letting the photo queue close
    let _ = permits.acquire_many(workers as u32).await;
    log::info!("Ingest stage stopped");
}

/// Extracts metadata, then runs feature detection alongside the upload.
/// Detection failures only cost the photo its sidecar.
fn ingest_photo(services: &Services, path: &Path) -> Result<PhotoRecord, IngestError> {
    let record = services.extractor.extract(path)?;

    let uploaded = std::thread::scope(|s| {
        let detection = s.spawn(|| services.detector.detect(path));
        let uploaded = services.uploader.upload(&record);
        match detection.join() {
            Ok(Err(e)) => log::warn!("Feature detection failed for {}: {}", path.display(), e),
            Err(_) => log::error!("Feature detection panicked for {}", path.display()),
            Ok(Ok(())) => {}
        }
        uploaded
    })?;

    log::info!("Ingested {} as {}", path.display(), uploaded);
    Ok(record)
}

/// Stage 2: sole owner of the orbit window.
pub async fn run_aggregate(
    mut photo_rx: mpsc::Receiver<PhotoRecord>,
    mut window: OrbitWindow,
    services: Arc<Services>,
    shared: Arc<StdMutex<PipelineStatus>>,
) {
    let mut dispatches: Vec<JoinHandle<()>> = Vec::new();

    while let Some(record) = photo_rx.recv().await {
        let closed = window.insert(record);
        shared.lock().unwrap().window_len = window.len();

        let Some(batch) = closed else {
            continue;
        };
        shared.lock().unwrap().closures += 1;

        let services = services.clone();
        let shared = shared.clone();
        dispatches.retain(|h| !h.is_finished());
        dispatches.push(tokio::task::spawn_blocking(move || {
            if !services.dispatcher.dispatch_or_record(batch) {
                shared.lock().unwrap().failed_batches += 1;
            }
        }));
    }

    for handle in dispatches {
        if let Err(e) = handle.await {
            log::error!("Dataset dispatch aborted: {}", e);
        }
    }
    if !window.is_empty() {
        log::warn!(
            "Discarding {} photos still in window, oldest {}",
            window.len(),
            window.photos()[0].filename.display()
        );
    }
    log::info!("Aggregation stage stopped");
}
