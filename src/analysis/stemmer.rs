//! Stemmer collaborator.
//!
//! The stem step rewrites every surviving token through a [`Stemmer`].
//! [`PorterStemmer`] implements the classic five-step Porter algorithm for
//! English; words containing non-ASCII characters are returned lowercased
//! and otherwise untouched. [`IdentityStemmer`] is provided for locales
//! without a stemmer.
//!
//! # Examples
//!
//! ```
//! use parlance::analysis::stemmer::{PorterStemmer, Stemmer};
//!
//! let stemmer = PorterStemmer::new();
//! assert_eq!(stemmer.stem("running"), "run");
//! assert_eq!(stemmer.stem("orders"), "order");
//! ```

/// Trait for stemming algorithms.
pub trait Stemmer: Send + Sync {
    /// Stem a word to its root form.
    fn stem(&self, word: &str) -> String;

    /// Get the name of this stemmer.
    fn name(&self) -> &'static str;
}

/// A stemmer that only lowercases.
#[derive(Debug, Clone, Default)]
pub struct IdentityStemmer;

impl Stemmer for IdentityStemmer {
    fn stem(&self, word: &str) -> String {
        word.to_lowercase()
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Porter stemming algorithm implementation for English.
#[derive(Debug, Clone, Default)]
pub struct PorterStemmer;

impl PorterStemmer {
    /// Create a new Porter stemmer.
    pub fn new() -> Self {
        PorterStemmer
    }

    /// Check if the byte at `pos` is a vowel. `y` is a vowel when it follows a consonant.
    #[allow(clippy::only_used_in_recursion)]
    fn is_vowel(&self, word: &str, pos: usize) -> bool {
        let bytes = word.as_bytes();
        if pos >= bytes.len() {
            return false;
        }

        match bytes[pos] {
            b'a' | b'e' | b'i' | b'o' | b'u' => true,
            b'y' if pos > 0 => !self.is_vowel(word, pos - 1),
            _ => false,
        }
    }

    /// Calculate the measure of a word (number of VC patterns).
    fn measure(&self, word: &str) -> usize {
        let mut m = 0;
        let n = word.len();
        let mut i = 0;

        while i < n && !self.is_vowel(word, i) {
            i += 1;
        }

        while i < n {
            while i < n && self.is_vowel(word, i) {
                i += 1;
            }

            if i >= n {
                break;
            }

            m += 1;

            while i < n && !self.is_vowel(word, i) {
                i += 1;
            }
        }

        m
    }

    fn contains_vowel(&self, word: &str) -> bool {
        (0..word.len()).any(|i| self.is_vowel(word, i))
    }

    fn ends_with_double_consonant(&self, word: &str) -> bool {
        let bytes = word.as_bytes();
        let len = bytes.len();
        len >= 2 && bytes[len - 1] == bytes[len - 2] && !self.is_vowel(word, len - 1)
    }

    /// Consonant-vowel-consonant ending where the last consonant is not w, x or y.
    fn ends_cvc(&self, word: &str) -> bool {
        let len = word.len();
        if len < 3 {
            return false;
        }

        !self.is_vowel(word, len - 3)
            && self.is_vowel(word, len - 2)
            && !self.is_vowel(word, len - 1)
            && !matches!(word.as_bytes()[len - 1], b'w' | b'x' | b'y')
    }

    fn replace_suffix(
        &self,
        word: &str,
        old_suffix: &str,
        new_suffix: &str,
        min_measure: usize,
    ) -> String {
        if let Some(stem) = word.strip_suffix(old_suffix) {
            if self.measure(stem) >= min_measure {
                return format!("{stem}{new_suffix}");
            }
        }
        word.to_string()
    }

    fn step1a(&self, word: &str) -> String {
        if let Some(stem) = word.strip_suffix("sses") {
            format!("{stem}ss")
        } else if let Some(stem) = word.strip_suffix("ies") {
            format!("{stem}i")
        } else if word.ends_with("ss") {
            word.to_string()
        } else if word.len() > 1 && word.ends_with('s') {
            word[..word.len() - 1].to_string()
        } else {
            word.to_string()
        }
    }

    fn step1b(&self, word: &str) -> String {
        let stripped = if word.ends_with("eed") {
            return self.replace_suffix(word, "eed", "ee", 1);
        } else if let Some(stem) = word.strip_suffix("ed") {
            self.contains_vowel(stem).then(|| stem.to_string())
        } else if let Some(stem) = word.strip_suffix("ing") {
            self.contains_vowel(stem).then(|| stem.to_string())
        } else {
            None
        };

        let Some(word) = stripped else {
            return word.to_string();
        };

        if word.ends_with("at") || word.ends_with("bl") || word.ends_with("iz") {
            format!("{word}e")
        } else if self.ends_with_double_consonant(&word)
            && !word.ends_with('l')
            && !word.ends_with('s')
            && !word.ends_with('z')
        {
            word[..word.len() - 1].to_string()
        } else if self.measure(&word) == 1 && self.ends_cvc(&word) {
            format!("{word}e")
        } else {
            word
        }
    }

    fn step1c(&self, word: &str) -> String {
        match word.strip_suffix('y') {
            Some(stem) if self.contains_vowel(stem) => format!("{stem}i"),
            _ => word.to_string(),
        }
    }

    fn step2(&self, word: &str) -> String {
        const SUFFIXES: &[(&str, &str)] = &[
            ("ational", "ate"),
            ("tional", "tion"),
            ("enci", "ence"),
            ("anci", "ance"),
            ("izer", "ize"),
            ("abli", "able"),
            ("alli", "al"),
            ("entli", "ent"),
            ("eli", "e"),
            ("ousli", "ous"),
            ("ization", "ize"),
            ("ation", "ate"),
            ("ator", "ate"),
            ("alism", "al"),
            ("iveness", "ive"),
            ("fulness", "ful"),
            ("ousness", "ous"),
            ("aliti", "al"),
            ("iviti", "ive"),
            ("biliti", "ble"),
        ];

        SUFFIXES
            .iter()
            .find(|(old_suffix, _)| word.ends_with(old_suffix))
            .map(|(old_suffix, new_suffix)| self.replace_suffix(word, old_suffix, new_suffix, 1))
            .unwrap_or_else(|| word.to_string())
    }

    fn step3(&self, word: &str) -> String {
        const SUFFIXES: &[(&str, &str)] = &[
            ("icate", "ic"),
            ("ative", ""),
            ("alize", "al"),
            ("iciti", "ic"),
            ("ical", "ic"),
            ("ful", ""),
            ("ness", ""),
        ];

        SUFFIXES
            .iter()
            .find(|(old_suffix, _)| word.ends_with(old_suffix))
            .map(|(old_suffix, new_suffix)| self.replace_suffix(word, old_suffix, new_suffix, 1))
            .unwrap_or_else(|| word.to_string())
    }

    fn step4(&self, word: &str) -> String {
        const SUFFIXES: &[&str] = &[
            "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "ion",
            "ou", "ism", "ate", "iti", "ous", "ive", "ize",
        ];

        for suffix in SUFFIXES {
            if let Some(stem) = word.strip_suffix(suffix) {
                if self.measure(stem) > 1
                    && (*suffix != "ion" || stem.ends_with('s') || stem.ends_with('t'))
                {
                    return stem.to_string();
                }
            }
        }

        word.to_string()
    }

    fn step5(&self, word: &str) -> String {
        let word = match word.strip_suffix('e') {
            Some(stem) => {
                let m = self.measure(stem);
                if m > 1 || (m == 1 && !self.ends_cvc(stem)) {
                    stem.to_string()
                } else {
                    word.to_string()
                }
            }
            None => word.to_string(),
        };

        if word.ends_with("ll") && self.measure(&word) > 1 {
            word[..word.len() - 1].to_string()
        } else {
            word
        }
    }
}

impl Stemmer for PorterStemmer {
    fn stem(&self, word: &str) -> String {
        let word = word.to_lowercase();
        if word.len() <= 2 || !word.is_ascii() {
            return word;
        }

        let word = self.step1a(&word);
        let word = self.step1b(&word);
        let word = self.step1c(&word);
        let word = self.step2(&word);
        let word = self.step3(&word);
        let word = self.step4(&word);
        self.step5(&word)
    }

    fn name(&self) -> &'static str {
        "porter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_porter_stemmer() {
        let stemmer = PorterStemmer::new();

        assert_eq!(stemmer.stem("running"), "run");
        assert_eq!(stemmer.stem("flies"), "fli");
        assert_eq!(stemmer.stem("agreed"), "agre");
        assert_eq!(stemmer.stem("disabled"), "disabl");
        assert_eq!(stemmer.stem("measuring"), "measur");
        assert_eq!(stemmer.stem("traditional"), "tradit");
        assert_eq!(stemmer.stem("Orders"), "order");
        assert_eq!(stemmer.stem("cart"), "cart");
    }

    #[test]
    fn test_porter_measure() {
        let stemmer = PorterStemmer::new();

        assert_eq!(stemmer.measure("tree"), 0);
        assert_eq!(stemmer.measure("trees"), 1);
        assert_eq!(stemmer.measure("trouble"), 1);
        assert_eq!(stemmer.measure("troubles"), 2);
    }

    #[test]
    fn test_non_ascii_words_pass_through() {
        let stemmer = PorterStemmer::new();
        assert_eq!(stemmer.stem("Niño"), "niño");
        assert_eq!(stemmer.stem("到"), "到");
    }

    #[test]
    fn test_identity_stemmer() {
        assert_eq!(IdentityStemmer.stem("Running"), "running");
    }
}
