//! Media blob storage over `object_store`.

use crate::config::{MediaConfig, MediaDisk};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use product_reviews_core::error::ReviewError;
use product_reviews_core::external::MediaStorage;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// [`MediaStorage`] writing to any [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStoreMedia {
    store: Arc<dyn ObjectStore>,
    url_prefix: String,
}

impl ObjectStoreMedia {
    /// Wrap a store; URLs are `{url_prefix}/{path}`.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, url_prefix: impl Into<String>) -> Self {
        Self {
            store,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the backend selected by `config.disk`.
    ///
    /// | Disk | Backend | URL |
    /// |---|---|---|
    /// | `local` | filesystem at `root` | `{public_url}/files/{path}` |
    /// | `public` | filesystem at `root` | `{public_url}/storage/{path}` |
    /// | `memory` | in-process | `{public_url}/files/{path}` |
    /// | `s3` | bucket | `{public_url}/{path}` or the bucket's virtual-host URL |
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Configuration`] if the root directory cannot be
    /// created, or the S3 bucket is missing or rejected by the builder.
    pub fn from_config(config: &MediaConfig) -> Result<Self, ReviewError> {
        let base = config.public_url.clone().unwrap_or_default();
        let base = base.trim_end_matches('/');

        match config.disk {
            MediaDisk::Local | MediaDisk::Public => {
                std::fs::create_dir_all(&config.root).map_err(|e| {
                    ReviewError::Configuration(format!(
                        "Cannot create media root {}: {e}",
                        config.root
                    ))
                })?;
                let store = LocalFileSystem::new_with_prefix(&config.root).map_err(|e| {
                    ReviewError::Configuration(format!("Invalid media root {}: {e}", config.root))
                })?;
                let segment = if config.disk == MediaDisk::Public {
                    "storage"
                } else {
                    "files"
                };
                Ok(Self::new(Arc::new(store), format!("{base}/{segment}")))
            }
            MediaDisk::Memory => Ok(Self::new(Arc::new(InMemory::new()), format!("{base}/files"))),
            MediaDisk::S3 => {
                let bucket = config.bucket.as_deref().ok_or_else(|| {
                    ReviewError::Configuration("AWS_BUCKET is required for the s3 media disk".into())
                })?;
                let store = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_region(&config.region)
                    .build()
                    .map_err(|e| {
                        ReviewError::Configuration(format!("Failed to build S3 client: {e}"))
                    })?;
                let prefix = config.public_url.as_deref().map_or_else(
                    || format!("https://{bucket}.s3.{}.amazonaws.com", config.region),
                    |url| url.trim_end_matches('/').to_string(),
                );
                Ok(Self::new(Arc::new(store), prefix))
            }
        }
    }

    /// Public URL of a stored path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path.trim_start_matches('/'))
    }
}

impl MediaStorage for ObjectStoreMedia {
    fn put<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            let location = ObjectPath::parse(path)
                .map_err(|e| ReviewError::Storage(format!("Invalid media path {path}: {e}")))?;
            let size = bytes.len();

            self.store
                .put(&location, bytes.into())
                .await
                .map_err(|e| ReviewError::Storage(format!("Failed to upload {path}: {e}")))?;

            tracing::debug!(path, size, "Media stored");
            Ok(self.url_for(path))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn media_config(disk: MediaDisk, public_url: Option<&str>) -> MediaConfig {
        MediaConfig {
            disk,
            root: std::env::temp_dir()
                .join("product-reviews-media-test")
                .to_string_lossy()
                .into_owned(),
            public_url: public_url.map(str::to_string),
            bucket: Some("reviews-media".into()),
            region: "eu-west-1".into(),
        }
    }

    #[tokio::test]
    async fn test_memory_disk_stores_and_builds_url() {
        let media = ObjectStoreMedia::from_config(&media_config(
            MediaDisk::Memory,
            Some("http://localhost:8080/"),
        ))
        .unwrap();

        let url = media
            .put("reviews/r-1/media-abcd1234.jpg", b"jpeg".to_vec())
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:8080/files/reviews/r-1/media-abcd1234.jpg");
    }

    #[tokio::test]
    async fn test_local_disk_writes_file() {
        let config = media_config(MediaDisk::Local, None);
        let media = ObjectStoreMedia::from_config(&config).unwrap();

        let url = media.put("reviews/r-2/media-x.png", b"png".to_vec()).await.unwrap();

        assert_eq!(url, "/files/reviews/r-2/media-x.png");
        let written = std::fs::read(
            std::path::Path::new(&config.root).join("reviews/r-2/media-x.png"),
        )
        .unwrap();
        assert_eq!(written, b"png");
    }

    #[test]
    fn test_public_disk_url() {
        let media = ObjectStoreMedia::from_config(&media_config(MediaDisk::Public, None)).unwrap();
        assert_eq!(media.url_for("reviews/r-1/a.gif"), "/storage/reviews/r-1/a.gif");
    }

    #[test]
    fn test_s3_requires_bucket() {
        let mut config = media_config(MediaDisk::S3, None);
        config.bucket = None;

        let err = ObjectStoreMedia::from_config(&config).err().unwrap();

        assert!(matches!(err, ReviewError::Configuration(_)));
    }
}
