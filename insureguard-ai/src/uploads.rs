//! Evidence intake: validation and request-scoped storage
//!
//! Every uploaded part is checked before it can reach a collaborator:
//! declared extension, size limit, and (for binary parts) the sniffed content
//! type. Accepted files are written under server-generated names inside a
//! temporary directory owned by the request; dropping [`RequestStorage`]
//! removes it on every exit path.

use insureguard_common::config::{ensure_directory_exists, UploadsSection};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Slack on top of the per-part limits for multipart framing and inline fields
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Per-modality payload limits in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_image_bytes: usize,
    pub max_voice_bytes: usize,
    pub max_text_bytes: usize,
}

impl From<&UploadsSection> for UploadLimits {
    fn from(section: &UploadsSection) -> Self {
        Self {
            max_image_bytes: section.max_image_bytes,
            max_voice_bytes: section.max_voice_bytes,
            max_text_bytes: section.max_text_bytes,
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from(&UploadsSection::default())
    }
}

impl UploadLimits {
    /// Whole-request body limit: image, text, voice sample and voice reference
    pub fn request_body_limit(&self) -> usize {
        self.max_image_bytes
            .saturating_add(self.max_text_bytes)
            .saturating_add(self.max_voice_bytes.saturating_mul(2))
            .saturating_add(BODY_LIMIT_SLACK)
    }

    pub fn for_kind(&self, kind: UploadKind) -> usize {
        match kind {
            UploadKind::Image => self.max_image_bytes,
            UploadKind::Voice => self.max_voice_bytes,
            UploadKind::Text => self.max_text_bytes,
        }
    }
}

/// Kind of uploaded evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Voice,
    Text,
}

impl UploadKind {
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Image => &["png", "jpg", "jpeg", "webp"],
            UploadKind::Voice => &["mp3", "wav", "ogg", "m4a"],
            UploadKind::Text => &["txt"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Voice => "voice",
            UploadKind::Text => "text",
        }
    }

    /// Sniffed MIME type acceptable for this kind
    fn accepts_mime(&self, mime: &str) -> bool {
        match self {
            UploadKind::Image => mime.starts_with("image/"),
            // m4a shares the MP4 container signature
            UploadKind::Voice => mime.starts_with("audio/") || mime == "video/mp4",
            UploadKind::Text => mime.starts_with("text/"),
        }
    }
}

/// Malformed or disallowed evidence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} file has no extension (allowed: {allowed})")]
    MissingExtension { kind: &'static str, allowed: String },

    #[error("{kind} file type '.{extension}' is not allowed (allowed: {allowed})")]
    UnsupportedExtension {
        kind: &'static str,
        extension: String,
        allowed: String,
    },

    #[error("{kind} upload is empty")]
    Empty { kind: &'static str },

    #[error("{kind} upload exceeds the {limit} byte limit")]
    TooLarge { kind: &'static str, limit: usize },

    #[error("{kind} upload content looks like {detected}")]
    ContentMismatch { kind: &'static str, detected: String },

    #[error("text is not valid UTF-8")]
    InvalidUtf8,

    #[error("text contains only whitespace")]
    Blank,

    #[error("{0}")]
    MissingCompanion(String),
}

/// Lower-cased extension of a caller-supplied file name, if allowed for `kind`
pub fn validate_extension(kind: UploadKind, file_name: &str) -> Result<&'static str, ValidationError> {
    let allowed = kind.allowed_extensions();
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .ok_or_else(|| ValidationError::MissingExtension {
            kind: kind.as_str(),
            allowed: allowed.join(", "),
        })?;

    allowed
        .iter()
        .find(|candidate| **candidate == extension)
        .copied()
        .ok_or_else(|| ValidationError::UnsupportedExtension {
            kind: kind.as_str(),
            extension,
            allowed: allowed.join(", "),
        })
}

/// Reject content whose signature contradicts the declared kind
///
/// Undetectable content is let through; the collaborator decides.
pub fn check_content(kind: UploadKind, bytes: &[u8]) -> Result<(), ValidationError> {
    match infer::get(bytes) {
        Some(detected) if !kind.accepts_mime(detected.mime_type()) => {
            Err(ValidationError::ContentMismatch {
                kind: kind.as_str(),
                detected: detected.mime_type().to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Size and content checks shared by every part
pub fn check_payload(kind: UploadKind, bytes: &[u8], limits: &UploadLimits) -> Result<(), ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty { kind: kind.as_str() });
    }
    let limit = limits.for_kind(kind);
    if bytes.len() > limit {
        return Err(ValidationError::TooLarge {
            kind: kind.as_str(),
            limit,
        });
    }
    check_content(kind, bytes)
}

/// Strict UTF-8 claim narrative with at least one non-whitespace character
pub fn decode_text(bytes: Vec<u8>) -> Result<String, ValidationError> {
    let text = String::from_utf8(bytes).map_err(|_| ValidationError::InvalidUtf8)?;
    if text.trim().is_empty() {
        return Err(ValidationError::Blank);
    }
    Ok(text)
}

/// Temporary directory holding one request's uploads
pub struct RequestStorage {
    dir: TempDir,
}

impl RequestStorage {
    /// Create a fresh directory under `root`
    pub fn create(root: &Path) -> insureguard_common::Result<Self> {
        ensure_directory_exists(root)?;
        let dir = tempfile::Builder::new().prefix("request-").tempdir_in(root)?;
        debug!(dir = %dir.path().display(), "Request storage created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an accepted upload under a server-generated name
    pub async fn store(&self, role: &str, extension: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self
            .dir
            .path()
            .join(format!("{}-{}.{}", role, Uuid::new_v4(), extension));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_extension_rules() {
        assert_eq!(validate_extension(UploadKind::Image, "scan.JPG").unwrap(), "jpg");
        assert_eq!(validate_extension(UploadKind::Voice, "call.m4a").unwrap(), "m4a");
        assert_eq!(validate_extension(UploadKind::Text, "notes.txt").unwrap(), "txt");

        assert!(matches!(
            validate_extension(UploadKind::Image, "scan.gif"),
            Err(ValidationError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            validate_extension(UploadKind::Voice, "recording"),
            Err(ValidationError::MissingExtension { .. })
        ));
        // Only the final extension counts
        assert!(validate_extension(UploadKind::Image, "scan.png.exe").is_err());
    }

    #[test]
    fn test_payload_limits() {
        let limits = UploadLimits {
            max_image_bytes: 16,
            max_voice_bytes: 16,
            max_text_bytes: 4,
        };
        assert!(check_payload(UploadKind::Image, PNG_HEADER, &limits).is_ok());
        assert_eq!(
            check_payload(UploadKind::Text, b"", &limits),
            Err(ValidationError::Empty { kind: "text" })
        );
        assert_eq!(
            check_payload(UploadKind::Text, b"too long", &limits),
            Err(ValidationError::TooLarge { kind: "text", limit: 4 })
        );
    }

    #[test]
    fn test_content_sniffing() {
        assert!(check_content(UploadKind::Image, PNG_HEADER).is_ok());
        assert!(matches!(
            check_content(UploadKind::Voice, PNG_HEADER),
            Err(ValidationError::ContentMismatch { .. })
        ));
        // Unrecognised signatures pass
        assert!(check_content(UploadKind::Voice, b"\x00\x01\x02\x03").is_ok());
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"Rear-ended at a light.".to_vec()).unwrap(), "Rear-ended at a light.");
        assert_eq!(decode_text(vec![0xff, 0xfe, 0x41]), Err(ValidationError::InvalidUtf8));
        assert_eq!(decode_text(b" \n\t".to_vec()), Err(ValidationError::Blank));
    }

    #[test]
    fn test_body_limit_covers_all_parts() {
        let limits = UploadLimits::default();
        assert_eq!(
            limits.request_body_limit(),
            (5 + 2 + 20 + 1) * 1024 * 1024
        );
    }

    #[tokio::test]
    async fn test_storage_names_and_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let storage = RequestStorage::create(root.path()).unwrap();
        let dir = storage.path().to_path_buf();

        let a = storage.store("image", "png", PNG_HEADER).await.unwrap();
        let b = storage.store("image", "png", PNG_HEADER).await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(&dir));
        assert!(a.exists());

        drop(storage);
        assert!(!dir.exists());
    }
}
