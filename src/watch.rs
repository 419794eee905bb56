use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::sleep;

use crate::dataset::{sidecar_path, CONSUMED_SUFFIX};
use crate::pipeline::{Pipeline, PipelineError};

/// Polls a directory and submits each new photo once its size has stopped
/// changing between two scans.
pub struct DirectoryWatcher {
    dir: PathBuf,
    poll_interval: Duration,
    seen: HashSet<PathBuf>,
    pending: HashMap<PathBuf, u64>,
}

impl DirectoryWatcher {
    pub fn new(dir: PathBuf, poll_interval: Duration) -> Self {
        Self {
            dir,
            poll_interval,
            seen: HashSet::new(),
            pending: HashMap::new(),
        }
    }

    /// Returns the files that became ready since the previous scan.
    pub fn scan(&mut self, accepts: impl Fn(&Path) -> bool) -> io::Result<Vec<PathBuf>> {
        let mut ready = Vec::new();
        let mut present = HashSet::new();

        for entry in self.dir.read_dir()? {
            let entry = entry?;
            let path = entry.path();
            present.insert(path.clone());

            if self.seen.contains(&path) || !accepts(&path) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("Failed to stat {}: {}", path.display(), e);
                    continue;
                }
            };

            if sidecar_path(&path, CONSUMED_SUFFIX).exists() {
                log::debug!("Skipping already mosaiced {}", path.display());
                self.seen.insert(path);
                continue;
            }

            let size = metadata.len();
            if self.pending.get(&path) == Some(&size) {
                self.pending.remove(&path);
                self.seen.insert(path.clone());
                ready.push(path);
            } else {
                self.pending.insert(path, size);
            }
        }

        // forget files removed before their size settled
        self.pending.retain(|path, _| present.contains(path));

        ready.sort();
        Ok(ready)
    }

    pub async fn run(
        mut self,
        pipeline: &Pipeline,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> Result<(), PipelineError> {
        log::info!(
            "Watching {} every {}",
            self.dir.display(),
            humantime::format_duration(self.poll_interval)
        );

        loop {
            match self.scan(|p| pipeline.accepts(p)) {
                Ok(ready) if ready.is_empty() => {}
                Ok(ready) => {
                    let count = ready.len();
                    for path in ready {
                        pipeline.submit(path).await?;
                    }
                    let status = pipeline.status();
                    log::info!(
                        "Submitted {} photos ({} ingested, {} dropped, {} in window, {} closures)",
                        count,
                        status.ingested,
                        status.dropped,
                        status.window_len,
                        status.closures
                    );
                }
                Err(e) => log::error!("Failed to scan {}: {}", self.dir.display(), e),
            }

            let should_stop = tokio::select! {
                _ = sleep(self.poll_interval) => false,
                _ = &mut stop_rx => true,
            };
            if should_stop {
                log::info!("Stopped watching {}", self.dir.display());
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scratch_dir;
    use std::fs;

    fn jxl(p: &Path) -> bool {
        p.extension().is_some_and(|e| e == "jxl")
    }

    #[test]
    fn submits_once_size_is_stable() {
        let dir = scratch_dir();
        let mut watcher = DirectoryWatcher::new(dir.clone(), Duration::from_secs(1));
        fs::write(dir.join("b.jxl"), b"12").unwrap();
        fs::write(dir.join("a.jxl"), b"1").unwrap();
        fs::write(dir.join("notes.txt"), b"1").unwrap();

        assert!(watcher.scan(jxl).unwrap().is_empty());

        fs::write(dir.join("b.jxl"), b"1234").unwrap();
        assert_eq!(watcher.scan(jxl).unwrap(), vec![dir.join("a.jxl")]);
        assert_eq!(watcher.scan(jxl).unwrap(), vec![dir.join("b.jxl")]);
        assert!(watcher.scan(jxl).unwrap().is_empty());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn forgets_files_removed_before_settling() {
        let dir = scratch_dir();
        let mut watcher = DirectoryWatcher::new(dir.clone(), Duration::from_secs(1));
        fs::write(dir.join("gone.jxl"), b"1").unwrap();

        assert!(watcher.scan(jxl).unwrap().is_empty());
        assert_eq!(watcher.pending.len(), 1);

        fs::remove_file(dir.join("gone.jxl")).unwrap();
        assert!(watcher.scan(jxl).unwrap().is_empty());
        assert!(watcher.pending.is_empty());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn skips_mosaiced_photos() {
        let dir = scratch_dir();
        fs::write(dir.join("done.jxl"), b"1").unwrap();
        fs::write(dir.join("done.jxl.mosaiced"), b"").unwrap();
        fs::write(dir.join("new.jxl"), b"1").unwrap();

        let mut watcher = DirectoryWatcher::new(dir.clone(), Duration::from_secs(1));
        watcher.scan(jxl).unwrap();
        assert_eq!(watcher.scan(jxl).unwrap(), vec![dir.join("new.jxl")]);

        fs::remove_dir_all(dir).unwrap();
    }
}
