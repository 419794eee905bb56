//! External collaborators reached through shell commands: the remote
//! mosaicking job and the feature detector.

mod process;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{cmd}' exited with code {code}")]
    Failed { cmd: String, code: i32 },
}

/// Triggers a remote job. Returns once the job is started, not finished.
pub trait JobRunner: Send + Sync {
    fn run_job(&self, job_name: &str, vars: &BTreeMap<String, String>)
        -> Result<(), ExecutorError>;
}

/// Writes the feature sidecar for a photo. Must be safe to repeat.
pub trait FeatureDetector: Send + Sync {
    fn detect(&self, photo: &Path) -> Result<(), ExecutorError>;
}

/// Starts jobs as detached shell commands. The variables and `JOB_NAME`
/// are exported into the command's environment.
pub struct ShellJobRunner {
    command: String,
    log_dir: PathBuf,
}

impl ShellJobRunner {
    pub fn new(command: String, log_dir: PathBuf) -> Self {
        Self { command, log_dir }
    }
}

impl JobRunner for ShellJobRunner {
    fn run_job(
        &self,
        job_name: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<(), ExecutorError> {
        log::info!("Running job {} with vars {:?}", job_name, vars);
        let mut env = vars.clone();
        env.insert("JOB_NAME".to_string(), job_name.to_string());
        let label = format!("{}_{}", job_name, uuid::Uuid::new_v4().simple());
        process::spawn_detached(&self.command, &env, &self.log_dir, &label)?;
        Ok(())
    }
}

/// Used when no job command is configured.
pub struct LogJobRunner;

impl JobRunner for LogJobRunner {
    fn run_job(
        &self,
        job_name: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<(), ExecutorError> {
        log::warn!(
            "No job command configured, not starting {} with vars {:?}",
            job_name,
            vars
        );
        Ok(())
    }
}

/// Runs a command with the photo path as its only argument.
pub struct ShellFeatureDetector {
    command: String,
}

impl ShellFeatureDetector {
    pub fn new(command: String) -> Self {
        Self { command }
    }
}

impl FeatureDetector for ShellFeatureDetector {
    fn detect(&self, photo: &Path) -> Result<(), ExecutorError> {
        process::run_with_arg(&self.command, photo)
    }
}

pub struct NoopFeatureDetector;

impl FeatureDetector for NoopFeatureDetector {
    fn detect(&self, photo: &Path) -> Result<(), ExecutorError> {
        log::debug!("No feature detector configured for {}", photo.display());
        Ok(())
    }
}
