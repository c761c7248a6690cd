use crate::models::{Faq, FaqId, Translations};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

pub const REQUIRED_FIELDS_MESSAGE: &str = "Question and answer are required.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("FAQ {0} not found")]
    NotFound(FaqId),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable storage for FAQs and their accumulated translations
#[async_trait]
pub trait FaqStore: Send + Sync {
    /// Store a new FAQ with no translations
    async fn create(&self, question: &str, answer: &str) -> Result<Faq, StoreError>;

    /// All FAQs, oldest first
    async fn find_all(&self) -> Result<Vec<Faq>, StoreError>;

    async fn find_by_id(&self, id: FaqId) -> Result<Faq, StoreError>;

    /// Merge `partial` into the FAQ's translations.
    ///
    /// Languages not named in `partial` are left untouched; a language that is
    /// named is replaced as a whole. Applying the same merge twice is a no-op.
    async fn merge_translations(&self, id: FaqId, partial: &Translations) -> Result<Faq, StoreError>;
}

fn validate_new_faq(question: &str, answer: &str) -> Result<(), StoreError> {
    if question.trim().is_empty() || answer.trim().is_empty() {
        return Err(StoreError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()));
    }
    Ok(())
}

fn apply_merge(target: &mut Translations, partial: &Translations) {
    for (language, text) in partial {
        target.insert(language.clone(), text.clone());
    }
}

// ==================== PostgreSQL ====================

#[derive(Debug, sqlx::FromRow)]
struct FaqRow {
    id: Uuid,
    question: String,
    answer: String,
    translations: Json<Translations>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FaqRow> for Faq {
    fn from(row: FaqRow) -> Self {
        Faq {
            id: row.id.into(),
            question: row.question,
            answer: row.answer,
            translations: row.translations.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FAQ_COLUMNS: &str = "id, question, answer, translations, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgFaqStore {
    pool: PgPool,
}

impl PgFaqStore {
    /// Connect to PostgreSQL and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        info!("Connected to PostgreSQL FAQ store");
        Ok(store)
    }

    /// Create tables (safe to run always)
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS faqs (
                id UUID PRIMARY KEY,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                translations JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_faqs_created_at ON faqs(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl FaqStore for PgFaqStore {
    async fn create(&self, question: &str, answer: &str) -> Result<Faq, StoreError> {
        validate_new_faq(question, answer)?;

        let row: FaqRow = sqlx::query_as(&format!(
            "INSERT INTO faqs (id, question, answer, translations)
             VALUES ($1, $2, $3, '{{}}'::jsonb)
             RETURNING {}",
            FAQ_COLUMNS
        ))
        .bind(FaqId::new().as_uuid())
        .bind(question)
        .bind(answer)
        .fetch_one(&self.pool)
        .await?;

        debug!("Created FAQ {}", row.id);
        Ok(row.into())
    }

    async fn find_all(&self) -> Result<Vec<Faq>, StoreError> {
        let rows: Vec<FaqRow> = sqlx::query_as(&format!(
            "SELECT {} FROM faqs ORDER BY created_at, id",
            FAQ_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Faq::from).collect())
    }

    async fn find_by_id(&self, id: FaqId) -> Result<Faq, StoreError> {
        let row: Option<FaqRow> =
            sqlx::query_as(&format!("SELECT {} FROM faqs WHERE id = $1", FAQ_COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Faq::from).ok_or(StoreError::NotFound(id))
    }

    async fn merge_translations(&self, id: FaqId, partial: &Translations) -> Result<Faq, StoreError> {
        // `||` merges top-level JSONB keys in a single row update, so languages
        // added concurrently by other writers survive.
        let row: Option<FaqRow> = sqlx::query_as(&format!(
            "UPDATE faqs
             SET translations = translations || $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            FAQ_COLUMNS
        ))
        .bind(id.as_uuid())
        .bind(Json(partial))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Faq::from).ok_or(StoreError::NotFound(id))
    }
}

// ==================== In-memory ====================

/// Process-local store for development and tests
#[derive(Debug, Default)]
pub struct MemoryFaqStore {
    faqs: RwLock<Vec<Faq>>,
}

impl MemoryFaqStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FaqStore for MemoryFaqStore {
    async fn create(&self, question: &str, answer: &str) -> Result<Faq, StoreError> {
        validate_new_faq(question, answer)?;

        let now = Utc::now();
        let faq = Faq {
            id: FaqId::new(),
            question: question.to_string(),
            answer: answer.to_string(),
            translations: Translations::new(),
            created_at: now,
            updated_at: now,
        };

        self.faqs.write().await.push(faq.clone());
        Ok(faq)
    }

    async fn find_all(&self) -> Result<Vec<Faq>, StoreError> {
        Ok(self.faqs.read().await.clone())
    }

    async fn find_by_id(&self, id: FaqId) -> Result<Faq, StoreError> {
        self.faqs
            .read()
            .await
            .iter()
            .find(|faq| faq.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn merge_translations(&self, id: FaqId, partial: &Translations) -> Result<Faq, StoreError> {
        let mut faqs = self.faqs.write().await;
        let faq = faqs
            .iter_mut()
            .find(|faq| faq.id == id)
            .ok_or(StoreError::NotFound(id))?;

        apply_merge(&mut faq.translations, partial);
        faq.updated_at = Utc::now();
        Ok(faq.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalizedText;
    use proptest::prelude::*;

    fn translations(entries: &[(&str, &str, &str)]) -> Translations {
        entries
            .iter()
            .map(|(lang, q, a)| (lang.to_string(), LocalizedText::new(*q, *a)))
            .collect()
    }

    // ==================== Validation Tests ====================

    #[tokio::test]
    async fn test_create_rejects_empty_fields() {
        let store = MemoryFaqStore::new();

        for (question, answer) in [("", "answer"), ("question", ""), ("  ", "answer"), ("", "")] {
            let err = store.create(question, answer).await.expect_err("Should reject");
            assert!(matches!(err, StoreError::Validation(_)));
            assert_eq!(err.to_string(), REQUIRED_FIELDS_MESSAGE);
        }

        assert!(store.find_all().await.expect("list").is_empty());
    }

    // ==================== MemoryFaqStore Tests ====================

    #[tokio::test]
    async fn test_create_starts_without_translations() {
        let store = MemoryFaqStore::new();

        let faq = store.create("What is X?", "X is Y.").await.expect("create");

        assert_eq!(faq.question, "What is X?");
        assert_eq!(faq.answer, "X is Y.");
        assert!(faq.translations.is_empty());
        assert_eq!(faq.created_at, faq.updated_at);
    }

    #[tokio::test]
    async fn test_find_all_keeps_creation_order() {
        let store = MemoryFaqStore::new();

        let first = store.create("Q1", "A1").await.expect("create");
        let second = store.create("Q2", "A2").await.expect("create");

        let all = store.find_all().await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[1].id, second.id);
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let store = MemoryFaqStore::new();
        let created = store.create("Q", "A").await.expect("create");

        let found = store.find_by_id(created.id).await.expect("find");
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_find_by_unknown_id() {
        let store = MemoryFaqStore::new();
        let id = FaqId::new();

        let err = store.find_by_id(id).await.expect_err("Should be missing");
        assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn test_merge_preserves_other_languages() {
        let store = MemoryFaqStore::new();
        let faq = store.create("Q", "A").await.expect("create");

        store
            .merge_translations(faq.id, &translations(&[("hi", "A-hi", "B-hi")]))
            .await
            .expect("merge hi");
        let merged = store
            .merge_translations(faq.id, &translations(&[("bn", "C-bn", "D-bn")]))
            .await
            .expect("merge bn");

        assert_eq!(merged.translations.len(), 2);
        assert_eq!(merged.translations["hi"], LocalizedText::new("A-hi", "B-hi"));
        assert_eq!(merged.translations["bn"], LocalizedText::new("C-bn", "D-bn"));

        let reloaded = store.find_by_id(faq.id).await.expect("find");
        assert_eq!(reloaded.translations, merged.translations);
        assert!(reloaded.updated_at >= reloaded.created_at);
    }

    #[tokio::test]
    async fn test_merge_twice_is_idempotent() {
        let store = MemoryFaqStore::new();
        let faq = store.create("Q", "A").await.expect("create");
        let partial = translations(&[("hi", "X", "Y")]);

        let once = store.merge_translations(faq.id, &partial).await.expect("merge");
        let twice = store.merge_translations(faq.id, &partial).await.expect("merge");

        assert_eq!(once.translations, twice.translations);
    }

    #[tokio::test]
    async fn test_merge_unknown_id() {
        let store = MemoryFaqStore::new();

        let err = store
            .merge_translations(FaqId::new(), &translations(&[("hi", "X", "Y")]))
            .await
            .expect_err("Should be missing");

        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_every_language() {
        let store = std::sync::Arc::new(MemoryFaqStore::new());
        let faq = store.create("Q", "A").await.expect("create");

        let handles: Vec<_> = ["hi", "bn", "fr", "de", "es"]
            .into_iter()
            .map(|lang| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .merge_translations(faq.id, &translations(&[(lang, "q", "a")]))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.expect("join").expect("merge");
        }

        let reloaded = store.find_by_id(faq.id).await.expect("find");
        assert_eq!(reloaded.translations.len(), 5);
    }

    // ==================== Merge Properties ====================

    fn translations_strategy() -> impl Strategy<Value = Translations> {
        prop::collection::btree_map(
            "[a-z]{2}",
            ("[a-z ]{0,8}", "[a-z ]{0,8}").prop_map(|(q, a)| LocalizedText::new(q, a)),
            0..6,
        )
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(base in translations_strategy(), partial in translations_strategy()) {
            let mut once = base.clone();
            apply_merge(&mut once, &partial);

            let mut twice = once.clone();
            apply_merge(&mut twice, &partial);

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_merge_preserves_unrelated_languages(base in translations_strategy(), partial in translations_strategy()) {
            let mut merged = base.clone();
            apply_merge(&mut merged, &partial);

            for (language, text) in &base {
                if !partial.contains_key(language) {
                    prop_assert_eq!(merged.get(language), Some(text));
                }
            }
            for (language, text) in &partial {
                prop_assert_eq!(merged.get(language), Some(text));
            }
        }
    }

    // ==================== PgFaqStore Tests ====================
    // Run only when TEST_DATABASE_URL points at a disposable PostgreSQL database.

    async fn test_pg_store() -> Option<PgFaqStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        Some(PgFaqStore::connect(&url).await.expect("connect"))
    }

    #[tokio::test]
    async fn test_pg_create_and_find() {
        let Some(store) = test_pg_store().await else {
            return;
        };

        let created = store.create("What is X?", "X is Y.").await.expect("create");
        let found = store.find_by_id(created.id).await.expect("find");

        assert_eq!(found.question, "What is X?");
        assert!(found.translations.is_empty());
        assert!(store
            .find_all()
            .await
            .expect("list")
            .iter()
            .any(|faq| faq.id == created.id));
    }

    #[tokio::test]
    async fn test_pg_merge_preserves_other_languages() {
        let Some(store) = test_pg_store().await else {
            return;
        };
        let faq = store.create("Q", "A").await.expect("create");

        store
            .merge_translations(faq.id, &translations(&[("hi", "A-hi", "B-hi")]))
            .await
            .expect("merge hi");
        let partial = translations(&[("bn", "C-bn", "D-bn")]);
        store.merge_translations(faq.id, &partial).await.expect("merge bn");
        let merged = store.merge_translations(faq.id, &partial).await.expect("merge bn again");

        assert_eq!(merged.translations.len(), 2);
        assert_eq!(merged.translations["hi"], LocalizedText::new("A-hi", "B-hi"));
        assert_eq!(merged.translations["bn"], LocalizedText::new("C-bn", "D-bn"));
    }

    #[tokio::test]
    async fn test_pg_unknown_id() {
        let Some(store) = test_pg_store().await else {
            return;
        };

        let err = store.find_by_id(FaqId::new()).await.expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = store
            .merge_translations(FaqId::new(), &Translations::new())
            .await
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
