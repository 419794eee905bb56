//! Minimal ISO-BMFF walker for JPEG XL containers.
//!
//! The EXIF crate does not understand JPEG XL, so the `Exif` box is located
//! here and its TIFF payload is handed over as raw EXIF data.

const SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0c, b'J', b'X', b'L', b' ', 0x0d, 0x0a, 0x87, 0x0a,
];
const BARE_CODESTREAM: [u8; 2] = [0xff, 0x0a];

pub fn is_container(bytes: &[u8]) -> bool {
    bytes.starts_with(&SIGNATURE)
}

/// A codestream without container boxes cannot carry EXIF.
pub fn is_bare_codestream(bytes: &[u8]) -> bool {
    bytes.starts_with(&BARE_CODESTREAM)
}

/// Returns the TIFF-structured payload of the first `Exif` box.
pub fn exif_payload(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut pos = 0usize;

    while pos + 8 <= bytes.len() {
        let size = u32::from_be_bytes(bytes[pos..pos + 4].try_into().ok()?) as u64;
        let kind = &bytes[pos + 4..pos + 8];

        let (header, size) = match size {
            0 => (8usize, (bytes.len() - pos) as u64),
            1 => {
                let large = bytes.get(pos + 8..pos + 16)?;
                (16usize, u64::from_be_bytes(large.try_into().ok()?))
            }
            n => (8usize, n),
        };
        if size < header as u64 {
            return None;
        }
        let end = pos.checked_add(usize::try_from(size).ok()?)?;
        if end > bytes.len() {
            return None;
        }

        let body = &bytes[pos + header..end];
        if kind == b"Exif" {
            let offset = u32::from_be_bytes(body.get(..4)?.try_into().ok()?) as usize;
            let start = offset.checked_add(4)?;
            return body.get(start..).map(<[u8]>::to_vec);
        }
        if kind == b"brob" && body.starts_with(b"Exif") {
            log::debug!("Exif box is Brotli-compressed (brob), skipping it");
        }

        pos = end;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jxl_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn finds_exif_box_after_other_boxes() {
        let mut file = SIGNATURE.to_vec();
        file.extend(jxl_box(b"ftyp", b"jxl \0\0\0\0jxl "));
        file.extend(jxl_box(b"jxlc", &[0xff, 0x0a, 1, 2, 3]));
        let mut exif_body = 0u32.to_be_bytes().to_vec();
        exif_body.extend_from_slice(b"MM\0*tiff");
        file.extend(jxl_box(b"Exif", &exif_body));

        assert!(is_container(&file));
        assert_eq!(exif_payload(&file).unwrap(), b"MM\0*tiff".to_vec());
    }

    #[test]
    fn honours_tiff_header_offset() {
        let mut file = SIGNATURE.to_vec();
        let mut exif_body = 2u32.to_be_bytes().to_vec();
        exif_body.extend_from_slice(b"xxII*\0");
        file.extend(jxl_box(b"Exif", &exif_body));
        assert_eq!(exif_payload(&file).unwrap(), b"II*\0".to_vec());
    }

    #[test]
    fn truncated_or_missing_box_yields_none() {
        let mut file = SIGNATURE.to_vec();
        file.extend(jxl_box(b"jxlc", &[0xff, 0x0a]));
        assert!(exif_payload(&file).is_none());

        let mut truncated = SIGNATURE.to_vec();
        truncated.extend_from_slice(&[0, 0, 0, 64, b'E', b'x', b'i', b'f', 0, 0]);
        assert!(exif_payload(&truncated).is_none());
    }

    #[test]
    fn compressed_exif_box_is_not_read() {
        let mut file = SIGNATURE.to_vec();
        let mut brob_body = b"Exif".to_vec();
        brob_body.extend_from_slice(&[0x1b, 0x03, 0x00]);
        file.extend(jxl_box(b"brob", &brob_body));
        assert!(exif_payload(&file).is_none());
    }

    #[test]
    fn recognises_bare_codestream() {
        assert!(is_bare_codestream(&[0xff, 0x0a, 0x00]));
        assert!(!is_container(&[0xff, 0x0a, 0x00]));
    }
}
