//! Storage for uploaded hero images and the CV.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::config::UploadConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Image,
    Cv,
}

impl FromStr for UploadKind {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "cv" | "resume" => Ok(Self::Cv),
            other => Err(UploadError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unknown upload kind: {0}")]
    UnknownKind(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("File is empty")]
    Empty,

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an accepted upload ended up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    pub kind: UploadKind,
    /// Path relative to the upload directory.
    pub path: String,
    pub url: String,
    pub content_type: &'static str,
    pub size: usize,
}

struct Format {
    mime: &'static str,
    extension: &'static str,
}

const JPEG: Format = Format {
    mime: "image/jpeg",
    extension: "jpg",
};
const PNG: Format = Format {
    mime: "image/png",
    extension: "png",
};
const WEBP: Format = Format {
    mime: "image/webp",
    extension: "webp",
};
const PDF: Format = Format {
    mime: "application/pdf",
    extension: "pdf",
};

fn normalize_mime(declared: &str) -> String {
    let mime = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime == "image/jpg" || mime == "image/pjpeg" {
        JPEG.mime.to_string()
    } else {
        mime
    }
}

/// Identifies the format from the leading bytes.
fn sniff(bytes: &[u8]) -> Option<&'static Format> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(&JPEG)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(&PNG)
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(&WEBP)
    } else if bytes.starts_with(b"%PDF-") {
        Some(&PDF)
    } else {
        None
    }
}

fn allowed(kind: UploadKind) -> &'static [&'static Format] {
    match kind {
        UploadKind::Image => &[&JPEG, &PNG, &WEBP],
        UploadKind::Cv => &[&PDF],
    }
}

#[derive(Debug, Clone)]
pub struct UploadService {
    root: PathBuf,
    public_prefix: String,
    max_image_bytes: usize,
    max_cv_bytes: usize,
    cv_file_name: String,
}

impl UploadService {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: PathBuf::from(&config.directory),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
            max_image_bytes: config.max_image_bytes,
            max_cv_bytes: config.max_cv_bytes,
            cv_file_name: config.cv_file_name.clone(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn max_bytes(&self, kind: UploadKind) -> usize {
        match kind {
            UploadKind::Image => self.max_image_bytes,
            UploadKind::Cv => self.max_cv_bytes,
        }
    }

    /// Largest body any upload may have.
    #[must_use]
    pub fn max_request_bytes(&self) -> usize {
        self.max_image_bytes.max(self.max_cv_bytes)
    }

    /// Checks size, declared type and content, then writes the file.
    ///
    /// Images get a fresh random name; the CV always lands on the same file
    /// and replaces the previous one.
    pub async fn store(
        &self,
        kind: UploadKind,
        bytes: &[u8],
        declared_mime: &str,
    ) -> Result<StoredUpload, UploadError> {
        let format = self.check(kind, bytes, declared_mime)?;

        let relative = match kind {
            UploadKind::Image => format!("images/{}.{}", uuid::Uuid::new_v4(), format.extension),
            UploadKind::Cv => self.cv_file_name.clone(),
        };
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a partial file.
        let staging = target.with_extension(format!("{}.part", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&staging, bytes).await?;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        info!(
            event = "upload.stored",
            kind = ?kind,
            path = %relative,
            size = bytes.len(),
            "Stored upload"
        );

        Ok(StoredUpload {
            kind,
            url: format!("{}/{}", self.public_prefix, relative),
            path: relative,
            content_type: format.mime,
            size: bytes.len(),
        })
    }

    fn check(
        &self,
        kind: UploadKind,
        bytes: &[u8],
        declared_mime: &str,
    ) -> Result<&'static Format, UploadError> {
        let limit = self.max_bytes(kind);
        if bytes.len() > limit {
            return Err(UploadError::TooLarge { limit });
        }
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        let declared = normalize_mime(declared_mime);
        let Some(format) = allowed(kind).iter().copied().find(|f| f.mime == declared) else {
            return Err(UploadError::UnsupportedType(declared));
        };

        match sniff(bytes) {
            Some(actual) if actual.mime == format.mime => Ok(format),
            _ => Err(UploadError::UnsupportedType(format!(
                "content does not match {declared}"
            ))),
        }
    }
}
