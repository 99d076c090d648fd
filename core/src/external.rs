//! External collaborators: CDN, translation provider, and media blob storage.
//!
//! These sit at the edge of the system and are specified only by their
//! interface. Production implementations live in `product-reviews-server`;
//! recording and counting doubles live in `product-reviews-testing`.

use crate::error::ReviewError;
use crate::review::Language;
use std::future::Future;
use std::pin::Pin;

/// One batch of paths sent to the CDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnInvalidation {
    /// Path patterns, each starting with `/`
    pub paths: Vec<String>,
    /// Unique tag for this batch, e.g. `cache-invalidation-1735689600`
    pub caller_reference: String,
}

/// CDN invalidation endpoint.
pub trait CdnClient: Send + Sync {
    /// Submit an invalidation batch.
    ///
    /// Returns the CDN's invalidation id, or `None` when the client is not
    /// configured with a distribution and skipped the call.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::ExternalService`] if the CDN rejects the batch
    /// or cannot be reached.
    fn invalidate(
        &self,
        batch: CdnInvalidation,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, ReviewError>> + Send + '_>>;
}

/// Machine translation provider.
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Configuration`] when the provider key or endpoint
    /// is missing, [`ReviewError::ExternalService`] on provider failure.
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Language,
        target: Language,
    ) -> Pin<Box<dyn Future<Output = Result<String, ReviewError>> + Send + 'a>>;
}

/// Blob storage for uploaded review media.
pub trait MediaStorage: Send + Sync {
    /// Store `bytes` under `path` and return the public URL.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the upload fails.
    fn put<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ReviewError>> + Send + 'a>>;
}
