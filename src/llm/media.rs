use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Failed to read image {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed image input: {0}")]
    Malformed(String),
}

pub const SUPPORTED_ASPECT_RATIOS: [(&str, u32, u32); 10] = [
    ("1:1", 1, 1),
    ("2:3", 2, 3),
    ("3:2", 3, 2),
    ("3:4", 3, 4),
    ("4:3", 4, 3),
    ("4:5", 4, 5),
    ("5:4", 5, 4),
    ("9:16", 9, 16),
    ("16:9", 16, 9),
    ("21:9", 21, 9),
];

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heix" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
            if brand == b"heif" || brand == b"mif1" {
                return Some("image/heif".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

pub fn file_extension_for_mime(mime_type: &str) -> &'static str {
    match normalize_image_mime_type(mime_type).as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        "image/heif" => "heif",
        _ => "img",
    }
}

/// Raw image payload plus the mime type it was produced with.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: normalize_image_mime_type(&mime_type.into()),
            data,
        }
    }

    /// Splits `data:<mime>;base64,<payload>` into its parts.
    pub fn from_data_url(value: &str) -> Result<Self, MediaError> {
        let rest = value
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| MediaError::Malformed("missing 'data:' prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| MediaError::Malformed("missing ',' separator".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| MediaError::Malformed("payload is not base64 encoded".to_string()))?;
        if mime_type.trim().is_empty() {
            return Err(MediaError::Malformed("missing mime type".to_string()));
        }
        let data = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|err| MediaError::Malformed(format!("invalid base64 payload: {err}")))?;
        let image = Self::new(mime_type, data);
        image.validate()?;
        Ok(image)
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.data)
        )
    }

    pub fn base64_data(&self) -> String {
        general_purpose::STANDARD.encode(&self.data)
    }

    pub fn validate(&self) -> Result<(), MediaError> {
        if self.data.is_empty() {
            return Err(MediaError::Malformed("image payload is empty".to_string()));
        }
        if !self.mime_type.starts_with("image/") {
            return Err(MediaError::Malformed(format!(
                "unsupported mime type '{}'",
                self.mime_type
            )));
        }
        Ok(())
    }

    pub fn extension(&self) -> &'static str {
        file_extension_for_mime(&self.mime_type)
    }
}

pub fn encoded_image_from_bytes(bytes: Vec<u8>) -> Result<EncodedImage, MediaError> {
    let Some(mime_type) = detect_mime_type(&bytes) else {
        return Err(MediaError::Malformed(
            "could not detect an image type from the file contents".to_string(),
        ));
    };
    let image = EncodedImage::new(mime_type, bytes);
    image.validate()?;
    Ok(image)
}

pub fn load_image_file(path: &Path) -> Result<EncodedImage, MediaError> {
    let bytes = fs::read(path).map_err(|source| MediaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let image = encoded_image_from_bytes(bytes)?;
    debug!(
        "Loaded {} ({}, {} bytes)",
        path.display(),
        image.mime_type,
        image.data.len()
    );
    Ok(image)
}

/// Closest supported aspect ratio for the image, compared on a log scale so
/// that 4:5 and 5:4 are equally far from 1:1.
pub fn aspect_ratio_hint(image: &EncodedImage) -> Option<&'static str> {
    let reader = match image::ImageReader::new(Cursor::new(&image.data)).with_guessed_format() {
        Ok(reader) => reader,
        Err(err) => {
            warn!("Could not inspect image for aspect ratio: {}", err);
            return None;
        }
    };
    let (width, height) = match reader.into_dimensions() {
        Ok(dimensions) => dimensions,
        Err(err) => {
            debug!("Could not read image dimensions ({}): {}", image.mime_type, err);
            return None;
        }
    };
    closest_aspect_ratio(width, height)
}

pub fn closest_aspect_ratio(width: u32, height: u32) -> Option<&'static str> {
    if width == 0 || height == 0 {
        return None;
    }
    let actual = (width as f64 / height as f64).ln();
    SUPPORTED_ASPECT_RATIOS
        .iter()
        .map(|(label, w, h)| {
            let candidate = (*w as f64 / *h as f64).ln();
            (*label, (candidate - actual).abs())
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(label, _)| label)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn parses_data_url_into_mime_and_bytes() {
        let image = EncodedImage::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, b"hello");
        assert_eq!(image.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn normalizes_jpg_alias() {
        let image = EncodedImage::from_data_url("data:image/JPG;base64,aGVsbG8=").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.extension(), "jpg");
    }

    #[test]
    fn rejects_values_that_cannot_be_decomposed() {
        for value in [
            "aGVsbG8=",
            "data:image/png;base64",
            "data:image/png,aGVsbG8=",
            "data:;base64,aGVsbG8=",
            "data:image/png;base64,not base64!!",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png;base64,",
        ] {
            assert!(
                matches!(EncodedImage::from_data_url(value), Err(MediaError::Malformed(_))),
                "expected malformed for {value}"
            );
        }
    }

    #[test]
    fn detects_png_from_magic_bytes() {
        let image = encoded_image_from_bytes(PNG_1X1.to_vec()).unwrap();
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = encoded_image_from_bytes(b"%PDF-1.7 not an image".to_vec()).unwrap_err();
        assert!(matches!(err, MediaError::Malformed(_)));
    }

    #[test]
    fn reads_image_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portrait.bin");
        fs::write(&path, PNG_1X1).unwrap();
        let image = load_image_file(&path).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, PNG_1X1);

        let missing = load_image_file(&dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(missing, MediaError::Read { .. }));
    }

    #[test]
    fn picks_closest_aspect_ratio() {
        assert_eq!(closest_aspect_ratio(1000, 1000), Some("1:1"));
        assert_eq!(closest_aspect_ratio(800, 1000), Some("4:5"));
        assert_eq!(closest_aspect_ratio(1920, 1080), Some("16:9"));
        assert_eq!(closest_aspect_ratio(1080, 1900), Some("9:16"));
        assert_eq!(closest_aspect_ratio(0, 10), None);
    }

    #[test]
    fn aspect_hint_reads_png_dimensions() {
        let image = EncodedImage::new("image/png", PNG_1X1.to_vec());
        assert_eq!(aspect_ratio_hint(&image), Some("1:1"));
        let garbage = EncodedImage::new("image/png", vec![1, 2, 3]);
        assert_eq!(aspect_ratio_hint(&garbage), None);
    }
}
