//! Language selection: the outcome of normalizing a requested language code.

/// The source language every FAQ is written in, and the default for requests
/// that name no supported language.
pub const CANONICAL_LANGUAGE: &str = "en";

/// Check whether a code names the canonical source language.
pub fn is_canonical(code: &str) -> bool {
    code == CANONICAL_LANGUAGE
}

/// A language code validated against the registry.
///
/// `fell_back` is set when the caller asked for nothing, or for something the
/// registry does not support, and got the canonical language instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSelection {
    code: String,
    requested: Option<String>,
    fell_back: bool,
}

impl LanguageSelection {
    /// A supported language the caller asked for explicitly.
    pub fn supported(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            requested: Some(code.clone()),
            code,
            fell_back: false,
        }
    }

    /// The canonical language, substituted for `requested`.
    pub fn fallback(requested: Option<&str>) -> Self {
        Self {
            code: CANONICAL_LANGUAGE.to_string(),
            requested: requested.map(str::to_string),
            fell_back: true,
        }
    }

    /// The effective language code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// What the caller originally asked for, if anything.
    pub fn requested(&self) -> Option<&str> {
        self.requested.as_deref()
    }

    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn is_canonical(&self) -> bool {
        is_canonical(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_is_english() {
        assert_eq!(CANONICAL_LANGUAGE, "en");
        assert!(is_canonical("en"));
        assert!(!is_canonical("hi"));
        assert!(!is_canonical("EN"));
    }

    #[test]
    fn test_supported_selection() {
        let selection = LanguageSelection::supported("hi");
        assert_eq!(selection.code(), "hi");
        assert_eq!(selection.requested(), Some("hi"));
        assert!(!selection.fell_back());
        assert!(!selection.is_canonical());
    }

    #[test]
    fn test_fallback_selection_keeps_requested_code() {
        let selection = LanguageSelection::fallback(Some("xx"));
        assert_eq!(selection.code(), "en");
        assert_eq!(selection.requested(), Some("xx"));
        assert!(selection.fell_back());
        assert!(selection.is_canonical());
    }

    #[test]
    fn test_fallback_selection_without_request() {
        let selection = LanguageSelection::fallback(None);
        assert_eq!(selection.code(), "en");
        assert!(selection.requested().is_none());
        assert!(selection.fell_back());
    }
}
