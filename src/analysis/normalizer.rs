//! Normalizer collaborator.
//!
//! Normalization runs before tokenization. The default
//! [`DiacriticNormalizer`] decomposes the text (NFD), removes combining
//! marks and lowercases, so `"Café"` and `"cafe"` produce the same features.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Trait for text normalizers applied before tokenization.
pub trait Normalizer: Send + Sync {
    /// Normalize the given text.
    fn normalize(&self, text: &str) -> String;

    /// Get the name of this normalizer.
    fn name(&self) -> &'static str;
}

/// Strips diacritics and lowercases.
#[derive(Clone, Debug, Default)]
pub struct DiacriticNormalizer;

impl DiacriticNormalizer {
    /// Create a new diacritic-stripping normalizer.
    pub fn new() -> Self {
        DiacriticNormalizer
    }
}

impl Normalizer for DiacriticNormalizer {
    fn normalize(&self, text: &str) -> String {
        text.nfd()
            .filter(|c| !is_combining_mark(*c))
            .collect::<String>()
            .to_lowercase()
    }

    fn name(&self) -> &'static str {
        "diacritic"
    }
}

/// Lowercases only, keeping accents.
#[derive(Clone, Debug, Default)]
pub struct LowercaseNormalizer;

impl Normalizer for LowercaseNormalizer {
    fn normalize(&self, text: &str) -> String {
        text.to_lowercase()
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}
