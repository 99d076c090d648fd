//! Storing uploaded review media.

use product_reviews_core::error::ReviewError;
use product_reviews_core::external::MediaStorage;
use product_reviews_core::review::{Media, MediaKind};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

/// Largest accepted upload, in bytes.
pub const MAX_MEDIA_BYTES: usize = 10 * 1024 * 1024;

/// A file received with a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-supplied file name; only its extension is used
    pub file_name: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Lower-cased extension of the file name.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Writes uploads to [`MediaStorage`] under the review's prefix.
#[derive(Clone)]
pub struct MediaUploader {
    storage: Arc<dyn MediaStorage>,
}

impl MediaUploader {
    /// Create an uploader.
    #[must_use]
    pub fn new(storage: Arc<dyn MediaStorage>) -> Self {
        Self { storage }
    }

    /// Store one file as `reviews/{review_id}/media-XXXXXXXX.{ext}`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] for an unaccepted extension and
    /// [`ReviewError::Storage`] if the upload fails.
    pub async fn upload(&self, review_id: &str, file: UploadedFile) -> Result<Media, ReviewError> {
        let ext = file.extension().ok_or_else(|| {
            ReviewError::Validation(format!("{} has no file extension", file.file_name))
        })?;
        let kind = MediaKind::from_extension(&ext)
            .ok_or_else(|| ReviewError::Validation(format!("Unsupported media type: {ext}")))?;

        let id = media_id();
        let path = format!("reviews/{review_id}/{id}.{ext}");
        let url = self.storage.put(&path, file.bytes).await?;

        Ok(Media { id, kind, path, url })
    }

    /// Store every file, skipping (and logging) the ones that fail.
    pub async fn upload_all(&self, review_id: &str, files: Vec<UploadedFile>) -> Vec<Media> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let name = file.file_name.clone();
            match self.upload(review_id, file).await {
                Ok(media) => stored.push(media),
                Err(e) => tracing::error!(
                    review_id,
                    file_name = %name,
                    error = %e,
                    "Media upload failed, review saved without it"
                ),
            }
        }
        stored
    }
}

fn media_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("media-{suffix}")
}
