use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

use crate::storage::{ObjectStore, StoreError};

/// Object store backed by a directory tree: `<base>/<bucket>/<name>`.
pub struct LocalStore {
    base: PathBuf,
}

impl LocalStore {
    pub fn new(base: PathBuf) -> Self {
        LocalStore { base }
    }

    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && !bucket.is_empty()
            && !bucket.contains(['/', '\\'])
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidName(format!("{}/{}", bucket, name)));
        }
        Ok(self.base.join(bucket).join(relative))
    }
}

impl ObjectStore for LocalStore {
    fn upload(&self, bucket: &str, local_path: &Path, name: &str) -> Result<(), StoreError> {
        let dest = self.object_path(bucket, name)?;
        let mut source = File::open(local_path)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        // create_new makes the existence check and the create a single step
        let mut target = match OpenOptions::new().write(true).create_new(true).open(&dest) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = io::copy(&mut source, &mut target) {
            drop(target);
            let _ = fs::remove_file(&dest);
            return Err(e.into());
        }

        log::info!(
            "Uploaded {} to {}/{}",
            local_path.display(),
            bucket,
            name
        );
        Ok(())
    }

    fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
