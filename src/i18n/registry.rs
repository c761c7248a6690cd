//! Language registry: the languages the translation provider supports.
//!
//! The registry is loaded once at startup and then shared read-only through an
//! `Arc`. If the provider cannot be queried, a small built-in list is used so
//! the process can still start. Lookups fail closed: a code that is not in the
//! list is unsupported.

use crate::i18n::language::{is_canonical, LanguageSelection, CANONICAL_LANGUAGE};
use crate::provider::{ProviderError, TranslationProvider};
use crate::retry::{with_retry_if, RetryConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A language the provider can translate into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDescriptor {
    /// Provider language code (e.g., "en", "hi", "zh-CN")
    pub code: String,

    /// English name of the language (e.g., "Hindi")
    pub name: String,
}

impl LanguageDescriptor {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Where the registry's language list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySource {
    Provider,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<LanguageDescriptor>,
    source: RegistrySource,
}

impl LanguageRegistry {
    /// Build a registry from a provider language list.
    ///
    /// The canonical language is always present, even if the provider omits it.
    pub fn new(mut languages: Vec<LanguageDescriptor>) -> Self {
        if !languages.iter().any(|lang| is_canonical(&lang.code)) {
            languages.insert(0, LanguageDescriptor::new(CANONICAL_LANGUAGE, "English"));
        }

        Self {
            languages,
            source: RegistrySource::Provider,
        }
    }

    /// The built-in list used when the provider cannot be queried.
    pub fn fallback() -> Self {
        Self {
            languages: vec![
                LanguageDescriptor::new("en", "English"),
                LanguageDescriptor::new("hi", "Hindi"),
                LanguageDescriptor::new("bn", "Bengali"),
            ],
            source: RegistrySource::Fallback,
        }
    }

    /// Query the provider for its language list, retrying transient failures.
    ///
    /// Never fails: if the provider stays unreachable or rejects the request,
    /// the fallback registry is returned and the error is logged.
    pub async fn load(provider: &dyn TranslationProvider, retry: &RetryConfig) -> Self {
        let result = with_retry_if(
            retry,
            "Language list",
            || provider.list_languages(),
            ProviderError::is_transient,
        )
        .await;

        match result {
            Ok(languages) if !languages.is_empty() => {
                info!("Loaded {} supported languages from provider", languages.len());
                Self::new(languages)
            }
            Ok(_) => {
                warn!("Provider returned an empty language list, using built-in languages");
                Self::fallback()
            }
            Err(e) => {
                warn!("Failed to load supported languages ({}), using built-in languages", e);
                Self::fallback()
            }
        }
    }

    pub fn get_by_code(&self, code: &str) -> Option<&LanguageDescriptor> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    pub fn list(&self) -> &[LanguageDescriptor] {
        &self.languages
    }

    pub fn source(&self) -> RegistrySource {
        self.source
    }

    /// Resolve a requested code to the language that will actually be served.
    ///
    /// Missing, blank, and unsupported codes fall back to the canonical
    /// language; the returned selection records that the fallback happened.
    pub fn normalize(&self, requested: Option<&str>) -> LanguageSelection {
        let trimmed = requested.map(str::trim).filter(|code| !code.is_empty());

        match trimmed {
            Some(code) if is_canonical(code) || self.is_supported(code) => {
                LanguageSelection::supported(code)
            }
            _ => LanguageSelection::fallback(requested),
        }
    }
}
