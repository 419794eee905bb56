//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::executor::{ExecutorError, FeatureDetector, JobRunner};
use crate::geo::{EnVector, DEG_LEN_M};
use crate::photo::{Extractor, GroundVelocity, PhotoError, PhotoRecord};
use crate::storage::{ObjectStore, StoreError};

pub fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("orbit-batcher-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub const LAT0: f64 = 47.0;
pub const LON0: f64 = -122.0;

/// Photo at a local offset in meters from (LAT0, LON0).
pub fn photo_at(
    filename: PathBuf,
    t: f64,
    east: f64,
    north: f64,
    velocity: Option<EnVector>,
) -> PhotoRecord {
    PhotoRecord {
        filename,
        captured_at: t,
        latitude: LAT0 + north / DEG_LEN_M,
        longitude: LON0 + east / (DEG_LEN_M * LAT0.to_radians().cos()),
        velocity: velocity.and_then(GroundVelocity::from_vector),
    }
}

/// Ten photos 2s apart at 15 m/s on a counter-clockwise circle turning
/// 380 degrees in total, so the last photo is just past the first.
pub fn circular_orbit(dir: &Path) -> Vec<PhotoRecord> {
    let omega = 380.0f64.to_radians() / 18.0;
    let speed = 15.0;
    let radius = speed / omega;

    (0..10)
        .map(|i| {
            let t = 1_748_779_200.0 + 2.0 * i as f64;
            let theta = omega * 2.0 * i as f64;
            let dir_vec = EnVector::new(-theta.sin(), theta.cos());
            photo_at(
                dir.join(format!("orbit_{:02}.jxl", i)),
                t,
                radius * theta.cos(),
                radius * theta.sin(),
                Some(dir_vec * speed),
            )
        })
        .collect()
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn insert(&self, bucket: &str, name: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), name.to_string()), bytes.to_vec());
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn upload_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl ObjectStore for MemoryStore {
    fn upload(&self, bucket: &str, local_path: &Path, name: &str) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("backend unavailable")));
        }
        let bytes = std::fs::read(local_path).unwrap_or_default();
        let mut objects = self.objects.lock().unwrap();
        let key = (bucket.to_string(), name.to_string());
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        objects.insert(key, bytes);
        Ok(())
    }

    fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

#[derive(Default)]
pub struct RecordingJobRunner {
    runs: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl RecordingJobRunner {
    pub fn runs(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.runs.lock().unwrap().clone()
    }
}

impl JobRunner for RecordingJobRunner {
    fn run_job(
        &self,
        job_name: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<(), ExecutorError> {
        self.runs
            .lock()
            .unwrap()
            .push((job_name.to_string(), vars.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDetector {
    seen: Mutex<Vec<PathBuf>>,
}

impl RecordingDetector {
    pub fn seen(&self) -> Vec<PathBuf> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort();
        seen
    }
}

impl FeatureDetector for RecordingDetector {
    fn detect(&self, photo: &Path) -> Result<(), ExecutorError> {
        self.seen.lock().unwrap().push(photo.to_path_buf());
        Ok(())
    }
}

/// Serves prepared records by path; unknown paths have no metadata.
#[derive(Default)]
pub struct TableExtractor {
    records: HashMap<PathBuf, PhotoRecord>,
}

impl TableExtractor {
    pub fn new(records: impl IntoIterator<Item = PhotoRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.filename.clone(), r))
                .collect(),
        }
    }
}

impl Extractor for TableExtractor {
    fn extract(&self, path: &Path) -> Result<PhotoRecord, PhotoError> {
        self.records
            .get(path)
            .cloned()
            .ok_or_else(|| PhotoError::missing("GPSLatitude"))
    }
}
