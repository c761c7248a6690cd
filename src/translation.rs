//! Lazy, memoized FAQ translation.
//!
//! `TranslationService::resolve` returns an FAQ's question and answer in a
//! requested language, looking in order at:
//!
//! 1. the source text, when the canonical language is requested;
//! 2. the cache store;
//! 3. the FAQ's stored translations (repairing the cache on a hit);
//! 4. the translation provider, whose result is merged into the store and
//!    then cached.
//!
//! Concurrent provider rounds for the same FAQ and language share a single
//! pending result, so each pair is translated at most once at a time.

use crate::cache::{cache_key, CacheStore};
use crate::db::{FaqStore, StoreError};
use crate::i18n::{LanguageRegistry, TranslationMetrics};
use crate::models::{Faq, FaqId, LocalizedText, Translations};
use crate::provider::{ProviderError, TranslationProvider};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("unable to translate FAQ {faq_id} into {language}: {source}")]
    TranslationFailure {
        faq_id: FaqId,
        language: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to store translation: {0}")]
    Storage(Arc<StoreError>),

    /// The background task running the provider round panicked or was aborted
    #[error("translation task for FAQ {faq_id} into {language} did not complete: {reason}")]
    Interrupted {
        faq_id: FaqId,
        language: String,
        reason: String,
    },
}

/// Where a resolved text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The FAQ's own text in the canonical language
    Source,
    Cache,
    /// The FAQ's stored translations
    Stored,
    /// Freshly translated by the provider
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The language actually served
    pub language: String,
    pub text: LocalizedText,
    pub origin: Origin,
    /// The requested language was missing or unsupported
    pub fell_back: bool,
}

type PendingTranslation = Shared<BoxFuture<'static, Result<LocalizedText, ResolveError>>>;

struct InFlight {
    generation: u64,
    pending: PendingTranslation,
}

/// Collaborators needed by a provider round, owned so the round can outlive
/// the request that started it.
#[derive(Clone)]
struct Pipeline {
    store: Arc<dyn FaqStore>,
    cache: Arc<dyn CacheStore>,
    provider: Arc<dyn TranslationProvider>,
    metrics: Arc<TranslationMetrics>,
}

#[derive(Clone)]
pub struct TranslationService {
    pipeline: Pipeline,
    languages: Arc<LanguageRegistry>,
    in_flight: Arc<DashMap<String, InFlight>>,
    next_generation: Arc<AtomicU64>,
}

impl TranslationService {
    pub fn new(
        store: Arc<dyn FaqStore>,
        cache: Arc<dyn CacheStore>,
        provider: Arc<dyn TranslationProvider>,
        languages: Arc<LanguageRegistry>,
    ) -> Self {
        Self {
            pipeline: Pipeline {
                store,
                cache,
                provider,
                metrics: Arc::new(TranslationMetrics::new()),
            },
            languages,
            in_flight: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    pub fn metrics(&self) -> &TranslationMetrics {
        &self.pipeline.metrics
    }

    /// Return `faq`'s question and answer in `language`.
    ///
    /// A missing or unsupported language is served in the canonical language.
    /// When the provider is consulted, `faq.translations` is updated in place.
    pub async fn resolve(
        &self,
        faq: &mut Faq,
        language: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        let selection = self.languages.normalize(language);
        if selection.fell_back() {
            debug!(
                "Language {:?} not supported, serving FAQ {} in {}",
                selection.requested(),
                faq.id,
                selection.code()
            );
        }

        let language = selection.code().to_string();
        let resolution = |text: LocalizedText, origin: Origin| Resolution {
            language: language.clone(),
            text,
            origin,
            fell_back: selection.fell_back(),
        };

        if selection.is_canonical() {
            return Ok(resolution(faq.source_text(), Origin::Source));
        }

        let key = cache_key(faq.id, &language);
        let metrics = &self.pipeline.metrics;

        match self.pipeline.cache.get(&key).await {
            Ok(Some(text)) => {
                metrics.record_cache_hit();
                return Ok(resolution(text, Origin::Cache));
            }
            Ok(None) => metrics.record_cache_miss(),
            Err(e) => {
                metrics.record_cache_miss();
                warn!("Cache read failed for {}, treating as miss: {}", key, e);
            }
        }

        if let Some(text) = faq.translation(&language).cloned() {
            metrics.record_stored_hit();
            cache_quietly(self.pipeline.cache.as_ref(), &key, &text).await;
            return Ok(resolution(text, Origin::Stored));
        }

        let text = self.translate_once(&key, faq, &language).await?;
        faq.translations.insert(language.clone(), text.clone());

        Ok(resolution(text, Origin::Provider))
    }

    /// Translate `faq` into each of `languages`, logging rather than returning failures.
    pub async fn prewarm(&self, mut faq: Faq, languages: &[String]) {
        for language in languages {
            match self.resolve(&mut faq, Some(language)).await {
                Ok(resolution) if resolution.fell_back => {
                    warn!("Skipped prewarming FAQ {} into unsupported {}", faq.id, language);
                }
                Ok(_) => debug!("Prewarmed FAQ {} in {}", faq.id, language),
                Err(e) => warn!("Prewarming FAQ {} into {} failed: {}", faq.id, language, e),
            }
        }
    }

    /// Run one provider round for `key`, or join the round already in flight.
    ///
    /// The round runs as its own task, so it completes (and leaves the map)
    /// even if every caller waiting on it is dropped.
    async fn translate_once(
        &self,
        key: &str,
        faq: &Faq,
        language: &str,
    ) -> Result<LocalizedText, ResolveError> {
        let pending = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                self.pipeline.metrics.record_coalesced();
                debug!("Joining in-flight translation for {}", key);
                entry.get().pending.clone()
            }
            Entry::Vacant(entry) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let in_flight = self.in_flight.clone();
                let round = translate_and_store(
                    self.pipeline.clone(),
                    faq.id,
                    faq.source_text(),
                    language.to_string(),
                    key.to_string(),
                );
                let owned_key = key.to_string();

                // The task cannot remove its entry before it is inserted: the
                // vacant entry holds the shard lock until `insert` returns.
                let handle = tokio::spawn(async move {
                    let result = round.await;
                    in_flight.remove_if(&owned_key, |_, current| current.generation == generation);
                    result
                });

                let faq_id = faq.id;
                let language = language.to_string();
                let in_flight = self.in_flight.clone();
                let owned_key = key.to_string();
                let pending = handle
                    .map(move |joined| {
                        joined.unwrap_or_else(|e| {
                            // A panicked task never reached its own cleanup
                            in_flight.remove_if(&owned_key, |_, current| {
                                current.generation == generation
                            });
                            Err(ResolveError::Interrupted {
                                faq_id,
                                language,
                                reason: e.to_string(),
                            })
                        })
                    })
                    .boxed()
                    .shared();

                entry.insert(InFlight {
                    generation,
                    pending: pending.clone(),
                });
                pending
            }
        };

        pending.await
    }
}

async fn translate_and_store(
    pipeline: Pipeline,
    faq_id: FaqId,
    source: LocalizedText,
    language: String,
    key: String,
) -> Result<LocalizedText, ResolveError> {
    let (question, answer) = futures::try_join!(
        pipeline.translate_field(&source.question, &language),
        pipeline.translate_field(&source.answer, &language),
    )
    .map_err(|source| ResolveError::TranslationFailure {
        faq_id,
        language: language.clone(),
        source,
    })?;

    let text = LocalizedText { question, answer };

    // Both fields go in one merge: readers never see half a pair.
    let partial = Translations::from([(language.clone(), text.clone())]);
    pipeline
        .store
        .merge_translations(faq_id, &partial)
        .await
        .map_err(|e| ResolveError::Storage(Arc::new(e)))?;

    cache_quietly(pipeline.cache.as_ref(), &key, &text).await;

    info!("Translated FAQ {} into {}", faq_id, language);
    Ok(text)
}

impl Pipeline {
    async fn translate_field(&self, text: &str, language: &str) -> Result<String, ProviderError> {
        self.metrics.record_provider_call();
        self.provider.translate(text, language).await.map_err(|e| {
            self.metrics.record_provider_failure();
            e
        })
    }
}

/// Write to the cache, logging and swallowing any failure
async fn cache_quietly(cache: &dyn CacheStore, key: &str, text: &LocalizedText) {
    if let Err(e) = cache.set(key, text).await {
        warn!("Cache write failed for {}: {}", key, e);
    }
}
