//! Doubles for the CDN, translation provider, and media storage.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use product_reviews_core::error::ReviewError;
use product_reviews_core::external::{CdnClient, CdnInvalidation, MediaStorage, Translator};
use product_reviews_core::review::Language;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// CDN client that records every submitted batch.
#[derive(Clone, Debug)]
pub struct RecordingCdnClient {
    batches: Arc<Mutex<Vec<CdnInvalidation>>>,
    failing: Arc<AtomicBool>,
    failures_left: Arc<AtomicUsize>,
    configured: bool,
}

impl Default for RecordingCdnClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCdnClient {
    /// A configured client that accepts every batch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
            failures_left: Arc::new(AtomicUsize::new(0)),
            configured: true,
        }
    }

    /// A client with no distribution: every call is skipped and returns `None`.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    /// Make subsequent calls fail with an external-service error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `n` calls, then accept again.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Batches accepted so far.
    #[must_use]
    pub fn batches(&self) -> Vec<CdnInvalidation> {
        self.batches.lock().unwrap().clone()
    }

    /// Every path of every accepted batch.
    #[must_use]
    pub fn all_paths(&self) -> Vec<String> {
        self.batches()
            .into_iter()
            .flat_map(|b| b.paths)
            .collect()
    }
}

impl CdnClient for RecordingCdnClient {
    fn invalidate(
        &self,
        batch: CdnInvalidation,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, ReviewError>> + Send + '_>> {
        Box::pin(async move {
            if !self.configured {
                return Ok(None);
            }
            let scripted = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if scripted || self.failing.load(Ordering::SeqCst) {
                return Err(ReviewError::ExternalService(
                    "CDN rejected invalidation".to_string(),
                ));
            }
            let mut batches = self.batches.lock().unwrap();
            batches.push(batch);
            Ok(Some(format!("INV{:04}", batches.len())))
        })
    }
}

/// Translator that prefixes the text with the target language code.
///
/// `"Great"` translated to Arabic becomes `"[ar] Great"`.
#[derive(Clone, Debug)]
pub struct MockTranslator {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    configured: bool,
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranslator {
    /// A working translator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
            configured: true,
        }
    }

    /// A translator with no API key.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    /// Make subsequent calls fail with an external-service error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of translate calls, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Translator for MockTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        _source: Language,
        target: Language,
    ) -> Pin<Box<dyn Future<Output = Result<String, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.configured {
                return Err(ReviewError::Configuration(
                    "translation API key is not set".to_string(),
                ));
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(ReviewError::ExternalService(
                    "translation provider unavailable".to_string(),
                ));
            }
            Ok(format!("[{target}] {text}"))
        })
    }
}

/// Media storage keeping blobs in memory.
#[derive(Clone, Debug)]
pub struct InMemoryMediaStorage {
    blobs: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    base_url: String,
    failing: Arc<AtomicBool>,
}

impl Default for InMemoryMediaStorage {
    fn default() -> Self {
        Self::new("https://media.example.com")
    }
}

impl InMemoryMediaStorage {
    /// Storage whose URLs are `{base_url}/{path}`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            blobs: Arc::new(Mutex::new(BTreeMap::new())),
            base_url: base_url.trim_end_matches('/').to_string(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make subsequent uploads fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Stored paths in lexical order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }

    /// Bytes stored at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(path).cloned()
    }
}

impl MediaStorage for InMemoryMediaStorage {
    fn put<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ReviewError::Storage(format!("Failed to upload {path}")));
            }
            self.blobs.lock().unwrap().insert(path.to_string(), bytes);
            Ok(format!("{}/{path}", self.base_url))
        })
    }
}
