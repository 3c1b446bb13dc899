//! Sequential batch import: fetch (when needed), extract, normalize and
//! hand each record to a [`CatalogStore`].
//!
//! One item's failure never stops the batch. It is recorded in
//! [`ImportBatchResult::failed`] and the loop moves on. Cancellation is
//! checked between items only.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ImportError, StoreError};
use crate::estimator::Estimator;
use crate::fetcher::{fetch_first, DocumentFetcher, ProductLookup, UrlResolver};
use crate::normalizer::{ImportedProductRecord, SkuSequence};
use crate::parser::document::SourceDocument;
use crate::parser::process_document;

/// Consumer-side persistence. Called once per successfully normalized
/// record; implementations must tolerate a repeated call for the same SKU.
pub trait CatalogStore {
    fn save_product(&mut self, record: &ImportedProductRecord) -> Result<(), StoreError>;
}

/// Store that accepts everything and keeps nothing. Used for dry runs.
#[derive(Debug, Default)]
pub struct NullStore;

impl CatalogStore for NullStore {
    fn save_product(&mut self, _record: &ImportedProductRecord) -> Result<(), StoreError> {
        Ok(())
    }
}

impl CatalogStore for Vec<ImportedProductRecord> {
    fn save_product(&mut self, record: &ImportedProductRecord) -> Result<(), StoreError> {
        self.push(record.clone());
        Ok(())
    }
}

/// One unit of work: content already in hand, or something to look up.
#[derive(Debug, Clone)]
pub enum ImportItem {
    Document {
        document: SourceDocument,
        name_hint: Option<String>,
    },
    Lookup(ProductLookup),
}

impl ImportItem {
    pub fn identifier(&self) -> String {
        match self {
            ImportItem::Document { document, .. } => document.url.clone(),
            ImportItem::Lookup(lookup) => lookup.identifier(),
        }
    }
}

impl From<ProductLookup> for ImportItem {
    fn from(lookup: ProductLookup) -> Self {
        ImportItem::Lookup(lookup)
    }
}

impl From<SourceDocument> for ImportItem {
    fn from(document: SourceDocument) -> Self {
        ImportItem::Document {
            document,
            name_hint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportBatchResult {
    pub succeeded: Vec<ImportedProductRecord>,
    pub failed: Vec<FailedItem>,
    /// Items never started because the run was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
}

impl ImportBatchResult {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
}

pub struct BatchImporter<F, S> {
    fetcher: F,
    store: S,
    resolver: UrlResolver,
    estimator: Estimator,
    delay: Duration,
    cancel: CancellationToken,
    state: BatchState,
    skus: SkuSequence,
    progress: ProgressBar,
}

impl<F: DocumentFetcher, S: CatalogStore> BatchImporter<F, S> {
    pub fn new(fetcher: F, store: S, resolver: UrlResolver, estimator: Estimator) -> Self {
        Self {
            fetcher,
            store,
            resolver,
            estimator,
            delay: Duration::ZERO,
            cancel: CancellationToken::new(),
            state: BatchState::Idle,
            skus: SkuSequence::from_clock(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Pause inserted between consecutive fetches.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_sku_sequence(mut self, skus: SkuSequence) -> Self {
        self.skus = skus;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Process `items` in order. Fails only for an empty batch, before any
    /// work starts; everything else ends up in the returned result.
    pub async fn run(&mut self, items: Vec<ImportItem>) -> Result<ImportBatchResult, ImportError> {
        if items.is_empty() {
            return Err(ImportError::EmptyBatch);
        }

        let total = items.len();
        self.state = BatchState::Running;
        self.progress.set_length(total as u64);
        self.progress.set_position(0);
        info!(items = total, "import batch started");

        let mut result = ImportBatchResult::default();
        let mut fetched_before = false;

        for (index, item) in items.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                result.cancelled = true;
                result.skipped = total - index;
                break;
            }

            let identifier = item.identifier();
            let (document, name_hint) = match item {
                ImportItem::Document {
                    document,
                    name_hint,
                } => (document, name_hint),
                ImportItem::Lookup(lookup) => {
                    let candidates = self.resolver.candidates(&lookup);
                    if !candidates.is_empty() {
                        if fetched_before && !self.pause().await {
                            result.cancelled = true;
                            result.skipped = total - index;
                            break;
                        }
                        fetched_before = true;
                    }
                    match fetch_first(&self.fetcher, &identifier, &candidates).await {
                        Ok(document) => (document, lookup.name),
                        Err(e) => {
                            record_failure(&mut result, identifier, &e);
                            self.progress.inc(1);
                            continue;
                        }
                    }
                }
            };

            match self.process_one(&document, name_hint.as_deref()) {
                Ok(record) => {
                    info!(%identifier, sku = %record.sku, "imported");
                    result.succeeded.push(record);
                }
                Err(e) => record_failure(&mut result, identifier, &e),
            }
            self.progress.inc(1);
        }

        self.state = BatchState::Completed;
        self.progress.finish_and_clear();
        info!(
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            skipped = result.skipped,
            cancelled = result.cancelled,
            "import batch finished"
        );
        Ok(result)
    }

    /// Extraction, normalization and the store call for one document.
    /// A panic anywhere in here becomes an ordinary failure.
    fn process_one(
        &mut self,
        document: &SourceDocument,
        name_hint: Option<&str>,
    ) -> Result<ImportedProductRecord, ImportError> {
        let estimator = &self.estimator;
        let skus = &mut self.skus;
        let store = &mut self.store;
        catch_unwind(AssertUnwindSafe(|| -> Result<ImportedProductRecord, ImportError> {
            let record = process_document(document, name_hint, estimator, &skus.peek_suffix())?;
            skus.advance();
            store.save_product(&record)?;
            Ok(record)
        }))
        .unwrap_or_else(|payload| Err(ImportError::Panicked(panic_message(payload.as_ref()))))
    }

    /// Wait out the politeness delay. Returns false if cancelled meanwhile.
    async fn pause(&self) -> bool {
        if self.delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}

fn record_failure(result: &mut ImportBatchResult, identifier: String, error: &ImportError) {
    warn!(%identifier, error = %error, "import failed");
    result.failed.push(FailedItem {
        identifier,
        reason: error.to_string(),
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
