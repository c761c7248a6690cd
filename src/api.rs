//! HTTP API for reading and creating FAQs
//!
//! Every read endpoint accepts an optional `lang` query parameter. Unsupported
//! or missing codes are served in English; the response body keeps its shape
//! and the served language is reported in the `Content-Language` header, with
//! `X-Language-Fallback: true` added when the request could not be honored.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::db::{FaqStore, REQUIRED_FIELDS_MESSAGE};
use crate::error::ApiError;
use crate::i18n::{LanguageDescriptor, LanguageSelection, MetricsReport};
use crate::models::{Faq, FaqId, LocalizedText};
use crate::security::api_key_matches;
use crate::translation::TranslationService;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const LANGUAGE_FALLBACK_HEADER: &str = "x-language-fallback";

/// FAQs resolved at once by the list endpoints
const MAX_CONCURRENT_RESOLVES: usize = 8;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FaqStore>,
    pub translator: TranslationService,
    /// Required on create when set
    pub api_key: Option<String>,
    /// Languages translated in the background after a create with `lang`
    pub prewarm_languages: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn FaqStore>,
        translator: TranslationService,
        api_key: Option<String>,
        prewarm_languages: Vec<String>,
    ) -> Self {
        Self {
            store,
            translator,
            api_key,
            prewarm_languages: Arc::new(prewarm_languages),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageQuery {
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFaqRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
    /// Triggers background translation when present
    pub lang: Option<String>,
}

/// Entry of `GET /api/faqs/ids`
#[derive(Debug, Serialize)]
pub struct FaqWithId {
    pub id: FaqId,
    #[serde(rename = "FAQ")]
    pub faq: LocalizedText,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/faqs/all", get(list_faqs))
        .route("/api/faqs/ids", get(list_faqs_with_ids))
        .route("/api/faq-id/:id", get(get_faq))
        .route("/api/faq/create", post(create_faq))
        .route("/api/languages", get(list_languages))
        .route("/api/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// GET /api/faqs/all
async fn list_faqs(
    State(state): State<AppState>,
    Query(query): Query<LanguageQuery>,
) -> Result<(HeaderMap, Json<Vec<LocalizedText>>), ApiError> {
    let selection = select_language(&state, query.lang.as_deref());
    let faqs = state.store.find_all().await?;

    let texts = translate_all(&state.translator, faqs, selection.code()).await?;

    Ok((language_headers(&selection), Json(texts)))
}

/// GET /api/faqs/ids
async fn list_faqs_with_ids(
    State(state): State<AppState>,
    Query(query): Query<LanguageQuery>,
) -> Result<(HeaderMap, Json<Vec<FaqWithId>>), ApiError> {
    let selection = select_language(&state, query.lang.as_deref());
    let faqs = state.store.find_all().await?;
    let ids: Vec<FaqId> = faqs.iter().map(|faq| faq.id).collect();

    let texts = translate_all(&state.translator, faqs, selection.code()).await?;
    let entries = ids
        .into_iter()
        .zip(texts)
        .map(|(id, faq)| FaqWithId { id, faq })
        .collect();

    Ok((language_headers(&selection), Json(entries)))
}

/// GET /api/faq-id/:id
async fn get_faq(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LanguageQuery>,
) -> Result<(HeaderMap, Json<LocalizedText>), ApiError> {
    // An id that cannot exist is indistinguishable from one that does not
    let id: FaqId = id.parse().map_err(|_| ApiError::NotFound)?;

    let selection = select_language(&state, query.lang.as_deref());
    let mut faq = state.store.find_by_id(id).await?;
    let resolution = state
        .translator
        .resolve(&mut faq, Some(selection.code()))
        .await?;

    Ok((language_headers(&selection), Json(resolution.text)))
}

/// POST /api/faq/create
async fn create_faq(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateFaqRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Faq>), ApiError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if !api_key_matches(state.api_key.as_deref(), presented) {
        warn!("Rejected FAQ creation with invalid or missing API key");
        return Err(ApiError::Unauthorized);
    }

    // Unreadable bodies get the same answer as missing fields
    let Json(request) = payload.map_err(|rejection| {
        debug!("Rejected FAQ creation body: {}", rejection.body_text());
        ApiError::Validation(REQUIRED_FIELDS_MESSAGE.to_string())
    })?;

    let (Some(question), Some(answer)) = (request.question, request.answer) else {
        return Err(ApiError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()));
    };

    let faq = state.store.create(&question, &answer).await?;
    info!("Created FAQ {}", faq.id);

    if let Some(lang) = request.lang {
        let languages = prewarm_targets(&state.prewarm_languages, &lang);
        let translator = state.translator.clone();
        let created = faq.clone();
        tokio::spawn(async move {
            translator.prewarm(created, &languages).await;
        });
    }

    Ok((StatusCode::CREATED, Json(faq)))
}

/// GET /api/languages
async fn list_languages(State(state): State<AppState>) -> Json<Vec<LanguageDescriptor>> {
    Json(state.translator.languages().list().to_vec())
}

/// GET /api/metrics
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsReport> {
    Json(state.translator.metrics().report())
}

fn select_language(state: &AppState, requested: Option<&str>) -> LanguageSelection {
    let selection = state.translator.languages().normalize(requested);
    if selection.fell_back() {
        match selection.requested() {
            Some(code) => warn!(
                "Unsupported language {:?} requested, serving {}",
                code,
                selection.code()
            ),
            None => debug!("No language requested, serving {}", selection.code()),
        }
    }
    selection
}

/// Resolve FAQs a few at a time, in order, failing the whole list on the first error
async fn translate_all(
    translator: &TranslationService,
    faqs: Vec<Faq>,
    language: &str,
) -> Result<Vec<LocalizedText>, ApiError> {
    let texts: Vec<LocalizedText> = stream::iter(faqs)
        .map(|mut faq| async move {
            translator
                .resolve(&mut faq, Some(language))
                .await
                .map(|resolution| resolution.text)
        })
        .buffered(MAX_CONCURRENT_RESOLVES)
        .try_collect()
        .await?;

    Ok(texts)
}

fn language_headers(selection: &LanguageSelection) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(selection.code()) {
        headers.insert(header::CONTENT_LANGUAGE, value);
    }
    if selection.fell_back() {
        headers.insert(
            HeaderName::from_static(LANGUAGE_FALLBACK_HEADER),
            HeaderValue::from_static("true"),
        );
    }
    headers
}

/// Configured prewarm languages plus the requested one, without duplicates
fn prewarm_targets(configured: &[String], requested: &str) -> Vec<String> {
    let mut languages = configured.to_vec();
    let requested = requested.trim();
    if !requested.is_empty() && !languages.iter().any(|code| code == requested) {
        languages.push(requested.to_string());
    }
    languages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::MemoryFaqStore;
    use crate::i18n::LanguageRegistry;
    use crate::provider::{ProviderError, TranslationProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Provider that records how many calls overlap
    #[derive(Default)]
    struct PeakProvider {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TranslationProvider for PeakProvider {
        async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("[{}] {}", target_language, text))
        }

        async fn list_languages(&self) -> Result<Vec<LanguageDescriptor>, ProviderError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_translate_all_bounds_provider_concurrency() {
        let store = Arc::new(MemoryFaqStore::new());
        let provider = Arc::new(PeakProvider::default());
        let translator = TranslationService::new(
            store.clone(),
            Arc::new(MemoryCache::new(100, None)),
            provider.clone(),
            Arc::new(LanguageRegistry::new(vec![
                LanguageDescriptor::new("en", "English"),
                LanguageDescriptor::new("hi", "Hindi"),
            ])),
        );
        for i in 0..20 {
            store
                .create(&format!("Q{}", i), &format!("A{}", i))
                .await
                .unwrap();
        }
        let faqs = store.find_all().await.unwrap();

        let texts = translate_all(&translator, faqs, "hi").await.unwrap();

        // Two provider calls (question and answer) per FAQ in flight
        assert!(provider.peak.load(Ordering::SeqCst) <= 2 * MAX_CONCURRENT_RESOLVES);
        assert_eq!(texts.len(), 20);
        assert_eq!(texts[0], LocalizedText::new("[hi] Q0", "[hi] A0"));
        assert_eq!(texts[19], LocalizedText::new("[hi] Q19", "[hi] A19"));
    }

    #[test]
    fn test_language_headers_for_supported_language() {
        let headers = language_headers(&LanguageSelection::supported("hi"));

        assert_eq!(headers.get(header::CONTENT_LANGUAGE).unwrap(), "hi");
        assert!(headers.get(LANGUAGE_FALLBACK_HEADER).is_none());
    }

    #[test]
    fn test_language_headers_for_fallback() {
        let headers = language_headers(&LanguageSelection::fallback(Some("xx")));

        assert_eq!(headers.get(header::CONTENT_LANGUAGE).unwrap(), "en");
        assert_eq!(headers.get(LANGUAGE_FALLBACK_HEADER).unwrap(), "true");
    }

    #[test]
    fn test_prewarm_targets_appends_requested() {
        let configured = vec!["hi".to_string(), "bn".to_string()];

        assert_eq!(prewarm_targets(&configured, "fr"), vec!["hi", "bn", "fr"]);
    }

    #[test]
    fn test_prewarm_targets_skips_duplicates_and_blanks() {
        let configured = vec!["hi".to_string(), "bn".to_string()];

        assert_eq!(prewarm_targets(&configured, "hi"), vec!["hi", "bn"]);
        assert_eq!(prewarm_targets(&configured, "  "), vec!["hi", "bn"]);
    }

    #[test]
    fn test_faq_with_id_serializes_faq_key() {
        let id: FaqId = "6f1c1a52-4a1e-4c47-9d38-1b1a2f0d8e11".parse().unwrap();
        let entry = FaqWithId {
            id,
            faq: LocalizedText::new("Q", "A"),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "6f1c1a52-4a1e-4c47-9d38-1b1a2f0d8e11",
                "FAQ": { "question": "Q", "answer": "A" }
            })
        );
    }
}
