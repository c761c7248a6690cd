use crate::config::Config;
use crate::i18n::{LanguageDescriptor, CANONICAL_LANGUAGE};
use crate::provider::{ProviderError, TranslationProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Google Cloud Translation v2 request body
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct LanguagesResponse {
    data: LanguagesData,
}

#[derive(Debug, Deserialize)]
struct LanguagesData {
    languages: Vec<GoogleLanguage>,
}

#[derive(Debug, Deserialize)]
struct GoogleLanguage {
    language: String,
    #[serde(default)]
    name: Option<String>,
}

/// Client for the Google Cloud Translation v2 REST API
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleTranslate {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Build a client with its own HTTP connection pool from configuration
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::new(
            client,
            &config.google_translate_url,
            &config.google_api_key,
        ))
    }

    async fn read_error(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
        ProviderError::Api { status, body }
    }
}

#[async_trait]
impl TranslationProvider for GoogleTranslate {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        debug!(
            "Requesting translation of {} chars into {}",
            text.len(),
            target_language
        );

        let request = TranslateRequest {
            q: text,
            source: CANONICAL_LANGUAGE,
            target: target_language,
            // Plain text only: markup is never interpreted
            format: "text",
        };

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| ProviderError::Malformed("response contained no translations".to_string()))
    }

    async fn list_languages(&self) -> Result<Vec<LanguageDescriptor>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/languages", self.base_url))
            .query(&[("key", self.api_key.as_str()), ("target", CANONICAL_LANGUAGE)])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: LanguagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(body
            .data
            .languages
            .into_iter()
            .map(|lang| {
                let name = lang.name.unwrap_or_else(|| lang.language.clone());
                LanguageDescriptor::new(lang.language, name)
            })
            .collect())
    }
}
