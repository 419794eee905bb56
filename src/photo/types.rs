use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::geo::{EnVector, GeoPoint};
use crate::photo::PhotoError;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Speed and unit heading over ground. Never built from a zero-length vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroundVelocity {
    pub groundspeed: f64,
    pub direction: EnVector,
}

impl GroundVelocity {
    pub fn from_vector(velocity: EnVector) -> Option<Self> {
        let groundspeed = velocity.norm();
        if !groundspeed.is_finite() || groundspeed <= f64::EPSILON {
            return None;
        }
        Some(Self {
            groundspeed,
            direction: velocity / groundspeed,
        })
    }

    pub fn from_track(groundspeed: f64, track_deg: f64) -> Option<Self> {
        Self::from_vector(EnVector::from_track_deg(track_deg) * groundspeed)
    }

    pub fn vector(&self) -> EnVector {
        self.direction * self.groundspeed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SpeedUnit {
    #[strum(serialize = "km/h")]
    KilometersPerHour,
    #[strum(serialize = "mph")]
    MilesPerHour,
    #[strum(serialize = "kn")]
    Knots,
}

impl SpeedUnit {
    /// Parses the EXIF `GPSSpeedRef` marker.
    pub fn from_ref(marker: &str) -> Option<Self> {
        match marker.trim() {
            "K" | "k" => Some(SpeedUnit::KilometersPerHour),
            "M" | "m" => Some(SpeedUnit::MilesPerHour),
            "N" | "n" => Some(SpeedUnit::Knots),
            _ => None,
        }
    }

    pub fn to_m_s(self, value: f64) -> f64 {
        match self {
            SpeedUnit::KilometersPerHour => value * 1000.0 / 3600.0,
            SpeedUnit::MilesPerHour => value * 1609.344 / 3600.0,
            SpeedUnit::Knots => value * 1852.0 / 3600.0,
        }
    }
}

/// Raw GPS and time tags of one image, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoMetadata {
    pub latitude_dms: Option<[f64; 3]>,
    pub latitude_ref: Option<String>,
    pub longitude_dms: Option<[f64; 3]>,
    pub longitude_ref: Option<String>,
    pub date_time_original: Option<String>,
    pub subsec_time_original: Option<String>,
    pub speed: Option<f64>,
    pub speed_ref: Option<String>,
    pub track_deg: Option<f64>,
    pub track_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    pub filename: PathBuf,
    /// UTC seconds since the Unix epoch.
    pub captured_at: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub velocity: Option<GroundVelocity>,
}

impl PhotoRecord {
    pub fn from_metadata(filename: &Path, metadata: &PhotoMetadata) -> Result<Self, PhotoError> {
        let latitude = dms_to_decimal(
            metadata
                .latitude_dms
                .ok_or_else(|| PhotoError::missing("GPSLatitude"))?,
            metadata
                .latitude_ref
                .as_deref()
                .ok_or_else(|| PhotoError::missing("GPSLatitudeRef"))?,
        );
        let longitude = dms_to_decimal(
            metadata
                .longitude_dms
                .ok_or_else(|| PhotoError::missing("GPSLongitude"))?,
            metadata
                .longitude_ref
                .as_deref()
                .ok_or_else(|| PhotoError::missing("GPSLongitudeRef"))?,
        );
        let captured_at = parse_capture_time(
            metadata
                .date_time_original
                .as_deref()
                .ok_or_else(|| PhotoError::missing("DateTimeOriginal"))?,
            metadata.subsec_time_original.as_deref(),
        )?;

        Ok(PhotoRecord {
            filename: filename.to_path_buf(),
            captured_at,
            latitude,
            longitude,
            velocity: sensor_velocity(filename, metadata),
        })
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn groundspeed(&self) -> Option<f64> {
        self.velocity.map(|v| v.groundspeed)
    }

    pub fn captured_datetime(&self) -> DateTime<Utc> {
        epoch_to_datetime(self.captured_at)
    }
}

pub fn epoch_to_datetime(seconds: f64) -> DateTime<Utc> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).unwrap_or_default()
}

pub fn dms_to_decimal(dms: [f64; 3], hemisphere: &str) -> f64 {
    let [degrees, minutes, seconds] = dms;
    let sign = match hemisphere.trim().chars().next() {
        Some('S' | 's' | 'W' | 'w') => -1.0,
        _ => 1.0,
    };
    sign * (degrees + minutes / 60.0 + seconds / 3600.0)
}

/// Interprets the EXIF original-time tag as UTC.
pub fn parse_capture_time(date_time: &str, subsec: Option<&str>) -> Result<f64, PhotoError> {
    let parsed = NaiveDateTime::parse_from_str(date_time.trim(), EXIF_DATETIME_FORMAT)
        .map_err(|_| PhotoError::InvalidTimestamp(date_time.to_string()))?;
    let fraction = subsec
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .and_then(|s| format!("0.{}", s).parse::<f64>().ok())
        .unwrap_or(0.0);
    Ok(parsed.and_utc().timestamp() as f64 + fraction)
}

fn sensor_velocity(filename: &Path, metadata: &PhotoMetadata) -> Option<GroundVelocity> {
    let (Some(speed), Some(track)) = (metadata.speed, metadata.track_deg) else {
        return None;
    };
    let Some(unit) = metadata.speed_ref.as_deref().and_then(SpeedUnit::from_ref) else {
        log::debug!(
            "{}: unknown GPS speed ref {:?}",
            filename.display(),
            metadata.speed_ref
        );
        return None;
    };
    if metadata.track_ref.as_deref().map(str::trim) != Some("T") {
        log::debug!(
            "{}: unsupported GPS track ref {:?}",
            filename.display(),
            metadata.track_ref
        );
        return None;
    }
    log::debug!(
        "{}: sensor speed {} {} track {}",
        filename.display(),
        speed,
        unit,
        track
    );
    GroundVelocity::from_track(unit.to_m_s(speed), track)
}
