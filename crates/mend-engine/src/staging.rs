//! Writes uploaded screenshots to the staging directory so the provider can
//! read them back by path.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};

use mend_settings::StagingSettings;

const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// One uploaded file as received from the client.
#[derive(Clone, Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedAttachment {
    pub original_name: String,
    pub path: PathBuf,
    pub mime_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("upload has no usable file name")]
    EmptyName,
    #[error("unsupported file type: {0} (expected JPG, JPEG or PNG)")]
    UnsupportedType(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Accepted image MIME type for a file name, by extension.
pub fn image_mime(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    mime_guess::from_ext(&ext).first_raw()
}

/// Final path component of a client-supplied name. Clients may send either
/// separator.
fn base_name(file_name: &str) -> Option<&str> {
    let name = file_name.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}

#[derive(Clone, Debug)]
pub struct AttachmentStager {
    dir: PathBuf,
    prefix: String,
}

impl AttachmentStager {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_settings(settings: &StagingSettings) -> Self {
        Self::new(settings.resolved_dir(), settings.file_prefix.clone())
    }

    /// Staging path for an upload name. Same name, same path.
    pub fn staged_path(&self, file_name: &str) -> Result<PathBuf, StagingError> {
        let name = base_name(file_name).ok_or(StagingError::EmptyName)?;
        Ok(self.dir.join(format!("{}{}", self.prefix, name)))
    }

    /// Write one upload, replacing any earlier file with the same name.
    pub async fn stage(&self, upload: &Upload) -> Result<StagedAttachment, StagingError> {
        let path = self.staged_path(&upload.file_name)?;
        let mime_type = image_mime(&upload.file_name)
            .ok_or_else(|| StagingError::UnsupportedType(upload.file_name.clone()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StagingError::Io {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|source| StagingError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), bytes = upload.bytes.len(), "attachment staged");
        Ok(StagedAttachment {
            original_name: upload.file_name.clone(),
            path,
            mime_type: mime_type.to_string(),
        })
    }

    /// Stage every upload in order. Failures are logged and skipped.
    pub async fn stage_all(&self, uploads: &[Upload]) -> Vec<StagedAttachment> {
        let mut staged = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.stage(upload).await {
                Ok(attachment) => staged.push(attachment),
                Err(e) => warn!(file = %upload.file_name, error = %e, "skipping attachment"),
            }
        }
        staged
    }
}
