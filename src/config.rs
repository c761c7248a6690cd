use anyhow::{Context, Result};

pub const DEFAULT_GOOGLE_TRANSLATE_URL: &str =
    "https://translation.googleapis.com/language/translate/v2";

#[derive(Debug, Clone)]
pub struct Config {
    // Google Cloud Translation
    pub google_api_key: String,
    pub google_translate_url: String,
    pub provider_timeout_secs: u64,

    // Storage (in-memory when unset)
    pub database_url: Option<String>,

    // Cache (in-memory when unset)
    pub redis_url: Option<String>,
    pub cache_ttl_secs: Option<u64>,
    pub cache_max_entries: u64,

    // Languages translated in the background when an FAQ is created with `lang`
    pub prewarm_languages: Vec<String>,

    // API key for write endpoints (optional)
    pub api_key: Option<String>,

    // Web server
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            google_api_key: std::env::var("GOOGLE_API_KEY")
                .context("GOOGLE_API_KEY not set")?,
            google_translate_url: std::env::var("GOOGLE_TRANSLATE_URL")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_TRANSLATE_URL.to_string()),
            provider_timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),

            database_url: non_empty_var("DATABASE_URL"),

            redis_url: non_empty_var("REDIS_URL"),
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ttl| *ttl > 0),
            cache_max_entries: std::env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),

            prewarm_languages: std::env::var("PREWARM_LANGUAGES")
                .map(|v| parse_language_list(&v))
                .unwrap_or_else(|_| vec!["hi".to_string(), "bn".to_string()]),

            api_key: non_empty_var("API_KEY"),

            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a comma-separated language list such as "hi, bn,fr"
fn parse_language_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}
