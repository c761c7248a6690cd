use anyhow::{Context, Result};
use faq_translate::api::{create_router, AppState};
use faq_translate::cache::{CacheStore, MemoryCache, RedisCache};
use faq_translate::config::Config;
use faq_translate::db::{FaqStore, MemoryFaqStore, PgFaqStore};
use faq_translate::google_translate::GoogleTranslate;
use faq_translate::i18n::{LanguageRegistry, RegistrySource};
use faq_translate::retry::{with_retry, RetryConfig};
use faq_translate::translation::TranslationService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("faq_translate=info".parse()?),
        )
        .init();

    info!("Starting FAQ translation service");

    let config = Config::from_env()?;

    let provider = Arc::new(
        GoogleTranslate::from_config(&config).context("Failed to build translation client")?,
    );

    let languages = LanguageRegistry::load(&*provider, &RetryConfig::startup()).await;
    if languages.source() == RegistrySource::Fallback {
        warn!("Serving with the built-in language list only");
    }

    // Durable store
    let pg_store = match &config.database_url {
        Some(url) => Some(
            with_retry(&RetryConfig::database_connect(), "Connect to PostgreSQL", || {
                PgFaqStore::connect(url)
            })
            .await
            .context("Failed to connect to PostgreSQL")?,
        ),
        None => None,
    };
    let store: Arc<dyn FaqStore> = match &pg_store {
        Some(pg) => Arc::new(pg.clone()),
        None => {
            warn!("DATABASE_URL not set, FAQs are kept in memory and lost on restart");
            Arc::new(MemoryFaqStore::new())
        }
    };

    let cache = connect_cache(&config).await;

    let translator = TranslationService::new(store.clone(), cache, provider, Arc::new(languages));
    let state = AppState::new(
        store,
        translator,
        config.api_key.clone(),
        config.prewarm_languages.clone(),
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(pg) = pg_store {
        pg.close().await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Redis when configured and reachable, otherwise an in-process cache
async fn connect_cache(config: &Config) -> Arc<dyn CacheStore> {
    if let Some(url) = &config.redis_url {
        match RedisCache::connect(url, config.cache_ttl_secs).await {
            Ok(cache) => return Arc::new(cache),
            Err(e) => warn!("Redis unavailable, falling back to in-memory cache: {}", e),
        }
    } else {
        info!("REDIS_URL not set, using in-memory translation cache");
    }

    Arc::new(MemoryCache::new(
        config.cache_max_entries,
        config.cache_ttl_secs.map(Duration::from_secs),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
