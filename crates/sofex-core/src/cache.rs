//! Content-addressed result cache with single-flight semantics.
//!
//! Keys hash the document bytes together with the options that change
//! the outcome (declared type, mode, timezone, OCR flag). Concurrent
//! submissions of the same document share one in-flight run instead of
//! recomputing; only successful results are retained, so a failed run
//! can be retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::pipeline::{self, ProcessOptions};
use crate::{PipelineError, ProcessingResult};

type CacheKey = [u8; 32];

/// Thread-safe cache of completed pipeline runs.
pub struct DocumentCache {
    entries: DashMap<CacheKey, Arc<OnceCell<Arc<ProcessingResult>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached result for this document, or run the pipeline.
    ///
    /// At most one run per key executes at a time; duplicate concurrent
    /// callers wait on the in-flight run and share its result.
    pub async fn get_or_process(
        &self,
        bytes: Vec<u8>,
        declared_type: &str,
        options: &ProcessOptions,
        config: &PipelineConfig,
        cancel: CancellationToken,
    ) -> Result<Arc<ProcessingResult>, PipelineError> {
        let key = cache_key(&bytes, declared_type, options);
        let cell = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(result) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(result.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let result = cell
            .get_or_try_init(|| async {
                pipeline::process_document(bytes, declared_type, options, config, cancel)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(result.clone())
    }

    /// Number of cache hits since creation.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of cache misses since creation.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of entries, in-flight runs included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for DocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("entries", &self.entries.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

fn cache_key(bytes: &[u8], declared_type: &str, options: &ProcessOptions) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update([0u8]);
    hasher.update(declared_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(options.port_timezone.as_bytes());
    hasher.update([options.mode as u8, options.enable_ocr as u8]);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessingMode;
    use crate::testdoc::sof_docx;

    fn fixture() -> Vec<u8> {
        sof_docx(&[&["Vessel Arrived 2024-01-15T08:30:00Z"]])
    }

    #[tokio::test]
    async fn second_submission_hits_the_cache() {
        let cache = DocumentCache::new();
        let config = PipelineConfig::default();
        let options = ProcessOptions::default();

        let first = cache
            .get_or_process(fixture(), "docx", &options, &config, CancellationToken::new())
            .await
            .unwrap();
        let second = cache
            .get_or_process(fixture(), "docx", &options, &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(first.stats, second.stats);
    }

    #[tokio::test]
    async fn different_options_key_separately() {
        let cache = DocumentCache::new();
        let config = PipelineConfig::default();
        let accuracy = ProcessOptions::default();
        let mut cost_saving = ProcessOptions::default();
        cost_saving.mode = ProcessingMode::CostSaving;

        cache
            .get_or_process(fixture(), "docx", &accuracy, &config, CancellationToken::new())
            .await
            .unwrap();
        cache
            .get_or_process(
                fixture(),
                "docx",
                &cost_saving,
                &config,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 0);
    }

    #[tokio::test]
    async fn concurrent_duplicates_share_one_entry() {
        let cache = Arc::new(DocumentCache::new());
        let config = Arc::new(PipelineConfig::default());
        let options = ProcessOptions::default();

        let (a, b) = tokio::join!(
            cache.get_or_process(
                fixture(),
                "docx",
                &options,
                &config,
                CancellationToken::new()
            ),
            cache.get_or_process(
                fixture(),
                "docx",
                &options,
                &config,
                CancellationToken::new()
            ),
        );

        assert_eq!(a.unwrap().stats, b.unwrap().stats);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_runs_are_not_cached() {
        let cache = DocumentCache::new();
        let config = PipelineConfig::default();
        let options = ProcessOptions::default();

        for _ in 0..2 {
            let err = cache
                .get_or_process(
                    b"not a document".to_vec(),
                    "txt",
                    &options,
                    &config,
                    CancellationToken::new(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::Document(_)));
        }
        assert_eq!(cache.hits(), 0);
    }
}
