use std::io::Cursor;
use std::path::Path;

use exif::{Exif, In, Reader, Tag, Value};

use crate::photo::jxl;
use crate::photo::{PhotoError, PhotoMetadata};

/// Reads the GPS and capture-time tags of an image file.
pub fn read_metadata(path: &Path) -> Result<PhotoMetadata, PhotoError> {
    let bytes = std::fs::read(path)?;
    let exif = read_exif(bytes)?;
    Ok(metadata_from_exif(&exif))
}

fn read_exif(bytes: Vec<u8>) -> Result<Exif, PhotoError> {
    if jxl::is_container(&bytes) {
        let tiff = jxl::exif_payload(&bytes).ok_or_else(|| PhotoError::missing("Exif box"))?;
        return Ok(Reader::new().read_raw(tiff)?);
    }
    if jxl::is_bare_codestream(&bytes) {
        return Err(PhotoError::missing("Exif box"));
    }
    Ok(Reader::new().read_from_container(&mut Cursor::new(bytes))?)
}

fn metadata_from_exif(exif: &Exif) -> PhotoMetadata {
    PhotoMetadata {
        latitude_dms: dms(exif, Tag::GPSLatitude),
        latitude_ref: ascii(exif, Tag::GPSLatitudeRef),
        longitude_dms: dms(exif, Tag::GPSLongitude),
        longitude_ref: ascii(exif, Tag::GPSLongitudeRef),
        date_time_original: ascii(exif, Tag::DateTimeOriginal),
        subsec_time_original: ascii(exif, Tag::SubSecTimeOriginal),
        speed: rationals(exif, Tag::GPSSpeed).and_then(|v| v.first().copied()),
        speed_ref: ascii(exif, Tag::GPSSpeedRef),
        track_deg: rationals(exif, Tag::GPSTrack).and_then(|v| v.first().copied()),
        track_ref: ascii(exif, Tag::GPSTrackRef),
    }
}

fn dms(exif: &Exif, tag: Tag) -> Option<[f64; 3]> {
    match rationals(exif, tag)?.as_slice() {
        [d, m, s] => Some([*d, *m, *s]),
        _ => None,
    }
}

/// Rational values of a tag; a zero denominator invalidates the whole tag.
fn rationals(exif: &Exif, tag: Tag) -> Option<Vec<f64>> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(values) => values
            .iter()
            .map(|r| (r.denom != 0).then(|| r.num as f64 / r.denom as f64))
            .collect(),
        _ => None,
    }
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values
            .first()
            .map(|v| String::from_utf8_lossy(v).trim_end_matches('\0').trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}
