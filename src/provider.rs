//! Translation provider seam.
//!
//! A provider turns `(text, target language)` into translated text and can
//! list the languages it supports. Implementations never retry and never
//! cache; both are the caller's business.

use crate::i18n::LanguageDescriptor;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The request never produced a response (DNS, connect, timeout)
    #[error("translation provider request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status
    #[error("translation provider error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider answered 2xx but the body was not what we expect
    #[error("malformed translation provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether a caller-side retry has a chance of succeeding.
    ///
    /// Rate limits (429) and server errors (5xx) are transient, as is any
    /// transport failure. Other 4xx responses (bad key, invalid language,
    /// exhausted quota) are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Malformed(_) => false,
        }
    }
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError>;

    async fn list_languages(&self) -> Result<Vec<LanguageDescriptor>, ProviderError>;
}
