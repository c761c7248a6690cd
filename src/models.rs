use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a stored FAQ, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaqId(Uuid);

impl FaqId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FaqId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FaqId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for FaqId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for FaqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A question/answer pair in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub question: String,
    pub answer: String,
}

impl LocalizedText {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Translations keyed by language code.
///
/// One entry holds both fields, so a language can never be half-translated.
pub type Translations = BTreeMap<String, LocalizedText>;

/// A stored FAQ with every translation accumulated so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    pub id: FaqId,
    pub question: String,
    pub answer: String,
    pub translations: Translations,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Faq {
    /// The text in the source language
    pub fn source_text(&self) -> LocalizedText {
        LocalizedText::new(self.question.clone(), self.answer.clone())
    }

    /// Stored translation for `language`, if one has been completed
    pub fn translation(&self, language: &str) -> Option<&LocalizedText> {
        self.translations.get(language)
    }
}
