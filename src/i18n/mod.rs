//! Language support for translated FAQ content.
//!
//! # Architecture
//!
//! - `registry`: the languages the translation provider supports, loaded once at startup
//! - `language`: the canonical language and the result of normalizing a requested code
//! - `metrics`: counters describing how translations were served
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::i18n::LanguageRegistry;
//!
//! let registry = LanguageRegistry::load(&provider, &RetryConfig::startup()).await;
//! let selection = registry.normalize(Some("hi"));
//! assert_eq!(selection.code(), "hi");
//! ```

mod language;
mod metrics;
mod registry;

pub use language::{is_canonical, LanguageSelection, CANONICAL_LANGUAGE};
pub use metrics::{MetricsReport, TranslationMetrics};
pub use registry::{LanguageDescriptor, LanguageRegistry, RegistrySource};
