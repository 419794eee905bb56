mod config;
mod dataset;
mod executor;
mod geo;
mod orbit;
mod photo;
mod pipeline;
mod storage;
mod watch;

#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::config::Config;
use crate::dataset::{DatasetDispatcher, FailedBatch};
use crate::executor::{
    FeatureDetector, JobRunner, LogJobRunner, NoopFeatureDetector, ShellFeatureDetector,
    ShellJobRunner,
};
use crate::photo::{ExifExtractor, Extractor, PhotoRecord};
use crate::pipeline::{Pipeline, PipelineSettings, Services};
use crate::storage::{LocalStore, ObjectStore, PhotoUploader};
use crate::watch::DirectoryWatcher;

#[derive(Parser)]
#[command(name = "orbit-batcher")]
#[command(about = "Batch aerial photos into per-orbit mosaicking datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate { config: PathBuf },
    /// Print the record extracted from a photo
    Inspect { photo: PathBuf },
    /// Push the given photos through the pipeline, then stop
    Ingest {
        config: PathBuf,
        photos: Vec<PathBuf>,
    },
    /// Watch the configured directory until interrupted
    Run { config: PathBuf },
    /// Dispatch a batch recorded after a failed dispatch
    Replay { config: PathBuf, manifest: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Inspect { photo } => inspect(&photo),
        Commands::Ingest { config, photos } => ingest(&config, photos).await,
        Commands::Run { config } => run(&config).await,
        Commands::Replay { config, manifest } => replay(&config, &manifest).await,
    }
}

fn load_config(path: &Path) -> Option<Config> {
    match Config::from_file(path) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("Error loading {}: {}", path.display(), e);
            None
        }
    }
}

fn validate(path: &Path) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    println!("Config is valid");
    println!(
        "  storage: bucket {} at {}",
        config.storage.bucket,
        config.storage.root.display()
    );
    println!(
        "  mosaic job: {} ({})",
        config.mosaic.job_name,
        config.mosaic.command.as_deref().unwrap_or("log only")
    );
    println!(
        "  features: {}",
        config.features.command.as_deref().unwrap_or("disabled")
    );
    println!(
        "  orbit: {} closure within {} m",
        config.orbit.closure_policy, config.orbit.closure_radius_m
    );
    match &config.watch.dir {
        Some(dir) => println!(
            "  watch: {} every {}",
            dir.display(),
            humantime::format_duration(config.watch.poll_interval)
        ),
        None => println!("  watch: not configured"),
    }
    ExitCode::SUCCESS
}

fn inspect(path: &Path) -> ExitCode {
    let metadata = match photo::read_metadata(path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    println!("{:#?}", metadata);

    match PhotoRecord::from_metadata(path, &metadata) {
        Ok(record) => {
            match serde_json::to_string_pretty(&record) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Error serializing record: {}", e),
            }
            println!("captured at {}", record.captured_datetime());
            match (record.groundspeed(), record.velocity.map(|v| v.vector())) {
                (Some(speed), Some(v)) => println!(
                    "groundspeed {:.2} m/s (east {:.2}, north {:.2})",
                    speed, v.east, v.north
                ),
                _ => println!("groundspeed unknown"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Unusable photo: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_dispatcher(config: &Config, store: Arc<dyn ObjectStore>) -> DatasetDispatcher {
    let jobs: Arc<dyn JobRunner> = match &config.mosaic.command {
        Some(cmd) => Arc::new(ShellJobRunner::new(
            cmd.clone(),
            config.pipeline.work_dir.join("logs"),
        )),
        None => Arc::new(LogJobRunner),
    };
    DatasetDispatcher::new(
        store,
        jobs,
        config.storage.bucket.clone(),
        config.mosaic.job_name.clone(),
        config.pipeline.work_dir.clone(),
        config.features.sidecar_suffix.clone(),
    )
}

fn start_pipeline(config: &Config) -> Pipeline {
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(config.storage.root.clone()));
    let detector: Arc<dyn FeatureDetector> = match &config.features.command {
        Some(cmd) => Arc::new(ShellFeatureDetector::new(cmd.clone())),
        None => Arc::new(NoopFeatureDetector),
    };

    let services = Services {
        extractor: Arc::new(ExifExtractor),
        detector,
        uploader: PhotoUploader::new(
            store.clone(),
            config.storage.bucket.clone(),
            config.storage.max_name_attempts,
        ),
        dispatcher: build_dispatcher(config, store),
    };
    let settings = PipelineSettings {
        queue_capacity: config.pipeline.queue_capacity,
        ingest_workers: config.pipeline.ingest_workers,
        extensions: config.pipeline.extensions.clone(),
        orbit: config.orbit.clone(),
    };
    Pipeline::start(settings, services)
}

fn report(status: &pipeline::PipelineStatus) {
    match serde_json::to_string(status) {
        Ok(json) => log::info!("Pipeline status: {}", json),
        Err(e) => log::warn!("Failed to serialize status: {}", e),
    }
}

async fn ingest(path: &Path, photos: Vec<PathBuf>) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let pipeline = start_pipeline(&config);

    let mut code = ExitCode::SUCCESS;
    for photo in photos {
        match pipeline.submit(photo.clone()).await {
            Ok(true) => {}
            Ok(false) => log::warn!("Skipping {}: extension not accepted", photo.display()),
            Err(e) => {
                log::error!("Failed to submit {}: {}", photo.display(), e);
                code = ExitCode::FAILURE;
                break;
            }
        }
    }

    let status = pipeline.shutdown().await;
    report(&status);
    code
}

async fn run(path: &Path) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let Some(dir) = config.watch.dir.clone() else {
        eprintln!("watch.dir is not configured");
        return ExitCode::FAILURE;
    };

    let pipeline = start_pipeline(&config);
    let watcher = DirectoryWatcher::new(dir, config.watch.poll_interval);
    let (stop_tx, stop_rx) = oneshot::channel();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Interrupted, shutting down"),
            Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = stop_tx.send(());
    });

    let result = watcher.run(&pipeline, stop_rx).await;
    let status = pipeline.shutdown().await;
    report(&status);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Watcher stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn replay(path: &Path, manifest: &Path) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let failed = match FailedBatch::load(manifest) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error reading {}: {}", manifest.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut batch = Vec::with_capacity(failed.photos.len());
    for photo in &failed.photos {
        match ExifExtractor.extract(photo) {
            Ok(record) => batch.push(record),
            Err(e) => {
                eprintln!("Error reading {}: {}", photo.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }
    batch.sort_by(|a, b| a.captured_at.total_cmp(&b.captured_at));

    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(config.storage.root.clone()));
    let dispatcher = build_dispatcher(&config, store);
    let result = tokio::task::spawn_blocking(move || dispatcher.redispatch(&batch)).await;

    match result {
        Ok(Ok(name)) => {
            println!("Dataset {} dispatched", name);
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            eprintln!("Dispatch failed: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Dispatch aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
