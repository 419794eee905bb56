use chrono::{DateTime, Utc};

use crate::photo::{epoch_to_datetime, PhotoRecord};

fn date_path(t: DateTime<Utc>) -> String {
    t.format("%Y/%m/%d").to_string()
}

fn time_label(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// `images/{date}/{time}_{lat}_{lon}[_{attempt}].{ext}`, the suffix only
/// appearing from the second attempt on.
pub fn photo_storage_name(record: &PhotoRecord, attempt: u32) -> String {
    let t = record.captured_datetime();
    let mut name = format!(
        "images/{}/{}_{:.5}_{:.5}",
        date_path(t),
        time_label(t),
        record.latitude,
        record.longitude
    );
    if attempt > 0 {
        name.push_str(&format!("_{}", attempt));
    }
    if let Some(ext) = record.filename.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    name
}

/// Archive name derived from the batch's mean capture time and position.
pub fn dataset_name(batch: &[PhotoRecord]) -> Option<String> {
    if batch.is_empty() {
        return None;
    }
    let n = batch.len() as f64;
    let (t, lat, lon) = batch.iter().fold((0.0, 0.0, 0.0), |(t, lat, lon), p| {
        (t + p.captured_at / n, lat + p.latitude / n, lon + p.longitude / n)
    });
    let t = epoch_to_datetime(t);
    Some(format!(
        "datasets/{}/{}_{:.5}_{:.5}.tar",
        date_path(t),
        time_label(t),
        lat,
        lon
    ))
}
