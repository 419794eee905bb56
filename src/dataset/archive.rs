use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::photo::PhotoRecord;

pub const IMAGES_DIR: &str = "images";
pub const FEATURES_DIR: &str = "opensfm/features";
pub const STATS_PATH: &str = "opensfm/stats/stats.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub images: usize,
    pub features: usize,
}

pub fn sidecar_path(photo: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(photo.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// Writes the dataset tarball in the layout the mosaicking job reads:
/// `images/<name>`, `opensfm/features/<name><suffix>` for photos that have
/// a feature sidecar, and an `opensfm/stats/stats.json` holding `{}`.
pub fn write_archive(
    batch: &[PhotoRecord],
    sidecar_suffix: &str,
    dest: &Path,
) -> io::Result<ArchiveSummary> {
    let mut builder = tar::Builder::new(File::create(dest)?);
    let mut summary = ArchiveSummary {
        images: 0,
        features: 0,
    };

    for photo in batch {
        let base = photo.filename.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no file name in {}", photo.filename.display()),
            )
        })?;
        let base = base.to_string_lossy();

        builder.append_path_with_name(&photo.filename, format!("{}/{}", IMAGES_DIR, base))?;
        summary.images += 1;

        let sidecar = sidecar_path(&photo.filename, sidecar_suffix);
        if sidecar.is_file() {
            builder.append_path_with_name(
                &sidecar,
                format!("{}/{}{}", FEATURES_DIR, base, sidecar_suffix),
            )?;
            summary.features += 1;
        } else {
            log::warn!("No features for {}", photo.filename.display());
        }
    }

    let stats = serde_json::to_vec(&serde_json::json!({})).map_err(io::Error::other)?;
    let mut header = tar::Header::new_gnu();
    header.set_size(stats.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(Utc::now().timestamp().max(0) as u64);
    builder.append_data(&mut header, STATS_PATH, stats.as_slice())?;

    builder.into_inner()?.sync_all()?;
    Ok(summary)
}
