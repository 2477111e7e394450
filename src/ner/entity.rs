//! Named entities: enumerated synonyms or regular expressions.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{NluError, Result};
use crate::ner::similarity::{SimilarityScorer, reduce_edges};

/// Locale used when neither the requested locale nor its fallback has
/// rules.
pub const DEFAULT_FALLBACK_LOCALE: &str = "en";

/// An occurrence of an entity inside an utterance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    pub accuracy: f64,
    /// Option of an enumerated entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    /// The synonym or the regex match.
    pub source_text: String,
    /// The matched slice of the utterance.
    pub utterance_text: String,
    pub entity: String,
}

impl EntityMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// One value of an enumerated entity with its synonyms per locale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityOption {
    pub name: String,
    pub texts: BTreeMap<String, Vec<String>>,
}

/// A compiled regex together with its `/source/flags` form.
#[derive(Clone, Debug)]
pub struct EntityRegex {
    source: String,
    flags: String,
    regex: Regex,
}

impl EntityRegex {
    /// Parse `/source/flags`, or a raw pattern without flags.
    ///
    /// Flags `i`, `m`, `s` and `x` configure the regex. `g` is accepted and
    /// ignored since every match is always collected.
    pub fn parse(pattern: &str) -> Result<Self> {
        let (source, flags) = match pattern.rfind('/') {
            Some(index) if pattern.starts_with('/') && index > 0 => {
                (&pattern[1..index], &pattern[index + 1..])
            }
            _ => (pattern, ""),
        };
        Self::new(source, flags)
    }

    pub fn new(source: &str, flags: &str) -> Result<Self> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'g' => &mut builder,
                other => {
                    return Err(NluError::entity(format!(
                        "Unsupported regex flag '{other}' in /{source}/{flags}"
                    )));
                }
            };
        }
        let regex = builder
            .build()
            .map_err(|e| NluError::entity(format!("Invalid regex /{source}/{flags}: {e}")))?;

        Ok(EntityRegex {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl PartialEq for EntityRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl std::fmt::Display for EntityRegex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl Serialize for EntityRegex {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityRegex {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        EntityRegex::parse(&pattern).map_err(serde::de::Error::custom)
    }
}

/// Matching rules of an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityKind {
    Enum { options: Vec<EntityOption> },
    Regex { locales: BTreeMap<String, EntityRegex> },
}

/// A named entity with per-locale rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub name: String,
    #[serde(flatten)]
    pub kind: EntityKind,
    /// Locale to use when a locale has no rules. The `*` key applies to
    /// every locale.
    #[serde(default = "default_locale_fallback")]
    pub locale_fallback: BTreeMap<String, String>,
}

fn default_locale_fallback() -> BTreeMap<String, String> {
    BTreeMap::from([("*".to_string(), DEFAULT_FALLBACK_LOCALE.to_string())])
}

impl NamedEntity {
    /// An enumerated entity without options.
    pub fn new_enum<S: Into<String>>(name: S) -> Self {
        NamedEntity {
            name: name.into(),
            kind: EntityKind::Enum {
                options: Vec::new(),
            },
            locale_fallback: default_locale_fallback(),
        }
    }

    /// A regex entity without rules.
    pub fn new_regex<S: Into<String>>(name: S) -> Self {
        NamedEntity {
            name: name.into(),
            kind: EntityKind::Regex {
                locales: BTreeMap::new(),
            },
            locale_fallback: default_locale_fallback(),
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, EntityKind::Enum { .. })
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.kind, EntityKind::Regex { .. })
    }

    fn has_locale(&self, locale: &str) -> bool {
        match &self.kind {
            EntityKind::Enum { options } => options.iter().any(|o| o.texts.contains_key(locale)),
            EntityKind::Regex { locales } => locales.contains_key(locale),
        }
    }

    /// The locale whose rules apply to `locale`: the locale itself, its
    /// fallback, then the `*` fallback.
    pub fn resolve_locale(&self, locale: &str) -> Option<String> {
        [
            Some(locale),
            self.locale_fallback.get(locale).map(|l| l.as_str()),
            self.locale_fallback.get("*").map(|l| l.as_str()),
        ]
        .into_iter()
        .flatten()
        .find(|candidate| self.has_locale(candidate))
        .map(|l| l.to_string())
    }

    /// Add synonyms to an option, creating it when missing. Texts already
    /// present are skipped.
    pub fn add_text<S: AsRef<str>>(&mut self, option: &str, locales: &[S], texts: &[S]) -> Result<()> {
        let EntityKind::Enum { options } = &mut self.kind else {
            return Err(NluError::entity(format!(
                "Entity {} is a regex entity and has no options",
                self.name
            )));
        };

        let index = match options.iter().position(|o| o.name == option) {
            Some(index) => index,
            None => {
                options.push(EntityOption {
                    name: option.to_string(),
                    texts: BTreeMap::new(),
                });
                options.len() - 1
            }
        };

        let entry = &mut options[index];
        for locale in locales {
            let synonyms = entry.texts.entry(locale.as_ref().to_string()).or_default();
            for text in texts {
                if !synonyms.iter().any(|s| s.as_str() == text.as_ref()) {
                    synonyms.push(text.as_ref().to_string());
                }
            }
        }
        Ok(())
    }

    /// Remove synonyms from an option. Unknown options and texts are
    /// ignored.
    pub fn remove_text<S: AsRef<str>>(&mut self, option: &str, locales: &[S], texts: &[S]) {
        let EntityKind::Enum { options } = &mut self.kind else {
            return;
        };
        let Some(entry) = options.iter_mut().find(|o| o.name == option) else {
            return;
        };
        for locale in locales {
            if let Some(synonyms) = entry.texts.get_mut(locale.as_ref()) {
                synonyms.retain(|s| !texts.iter().any(|t| t.as_ref() == s.as_str()));
            }
        }
    }

    /// Set the regex of each locale.
    pub fn add_regex<S: AsRef<str>>(&mut self, locales: &[S], regex: EntityRegex) -> Result<()> {
        let EntityKind::Regex { locales: rules } = &mut self.kind else {
            return Err(NluError::entity(format!(
                "Entity {} is an enum entity and takes no regex",
                self.name
            )));
        };
        for locale in locales {
            rules.insert(locale.as_ref().to_string(), regex.clone());
        }
        Ok(())
    }

    /// Every non-overlapping match of `regex` from left to right.
    pub fn get_matchs(&self, utterance: &str, regex: &Regex) -> Vec<EntityMatch> {
        regex
            .find_iter(utterance)
            .map(|m| EntityMatch {
                start: m.start(),
                end: m.end(),
                accuracy: 1.0,
                option: None,
                source_text: m.as_str().to_string(),
                utterance_text: m.as_str().to_string(),
                entity: self.name.clone(),
            })
            .collect()
    }

    /// Occurrences of this entity in `utterance`.
    ///
    /// Enum synonyms are matched through `scorer` and kept when their
    /// accuracy reaches `threshold`; overlapping enum matches are reduced to
    /// the best one.
    pub fn extract(
        &self,
        utterance: &str,
        locale: &str,
        scorer: &dyn SimilarityScorer,
        threshold: f64,
    ) -> Vec<EntityMatch> {
        let Some(locale) = self.resolve_locale(locale) else {
            return Vec::new();
        };

        match &self.kind {
            EntityKind::Regex { locales } => match locales.get(&locale) {
                Some(rule) => self.get_matchs(utterance, rule.regex()),
                None => Vec::new(),
            },
            EntityKind::Enum { options } => {
                let mut matches = Vec::new();
                for option in options {
                    let Some(synonyms) = option.texts.get(&locale) else {
                        continue;
                    };
                    for synonym in synonyms {
                        for span in scorer.find(utterance, synonym, threshold) {
                            matches.push(EntityMatch {
                                start: span.start,
                                end: span.end,
                                accuracy: span.accuracy,
                                option: Some(option.name.clone()),
                                source_text: synonym.clone(),
                                utterance_text: utterance[span.start..span.end].to_string(),
                                entity: self.name.clone(),
                            });
                        }
                    }
                }
                reduce_edges(matches)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ner::similarity::LevenshteinScorer;

    #[test]
    fn test_regex_flags() {
        let regex = EntityRegex::parse("/[a-z]+@example\\.com/gi").unwrap();
        assert_eq!(regex.source(), "[a-z]+@example\\.com");
        assert_eq!(regex.flags(), "gi");
        assert!(regex.regex().is_match("JOHN@EXAMPLE.COM"));
        assert_eq!(regex.to_string(), "/[a-z]+@example\\.com/gi");

        let raw = EntityRegex::parse("\\d+").unwrap();
        assert_eq!(raw.flags(), "");

        assert!(matches!(EntityRegex::parse("/a/q"), Err(NluError::Entity(_))));
        assert!(matches!(EntityRegex::parse("/(/g"), Err(NluError::Entity(_))));
    }

    #[test]
    fn test_get_matchs() {
        let mut entity = NamedEntity::new_regex("number");
        entity
            .add_regex(&["en"], EntityRegex::parse("/\\d+/g").unwrap())
            .unwrap();

        let matches = entity.extract("I have 3 cats and 12 dogs", "en", &LevenshteinScorer::new(), 0.5);
        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].start, matches[0].end), (7, 8));
        assert_eq!(matches[0].source_text, "3");
        assert_eq!((matches[1].start, matches[1].end), (18, 20));
        assert_eq!(matches[1].utterance_text, "12");
    }

    #[test]
    fn test_locale_fallback() {
        let mut entity = NamedEntity::new_enum("hero");
        entity.add_text("spiderman", &["en"], &["Spiderman"]).unwrap();
        entity.add_text("ironman", &["es"], &["Hombre de hierro"]).unwrap();
        entity.locale_fallback.insert("ca".to_string(), "es".to_string());

        assert_eq!(entity.resolve_locale("es").as_deref(), Some("es"));
        assert_eq!(entity.resolve_locale("ca").as_deref(), Some("es"));
        assert_eq!(entity.resolve_locale("fr").as_deref(), Some("en"));

        let regex = NamedEntity::new_regex("mail");
        assert_eq!(regex.resolve_locale("en"), None);
    }

    #[test]
    fn test_texts_deduplicated_and_removed() {
        let mut entity = NamedEntity::new_enum("hero");
        entity.add_text("spiderman", &["en"], &["Spiderman", "Spider-man"]).unwrap();
        entity.add_text("spiderman", &["en"], &["Spiderman"]).unwrap();
        entity.remove_text("spiderman", &["en"], &["Spider-man"]);

        let EntityKind::Enum { options } = &entity.kind else {
            panic!("expected enum entity");
        };
        assert_eq!(options[0].texts["en"], vec!["Spiderman".to_string()]);
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let mut entity = NamedEntity::new_regex("mail");
        assert!(entity.add_text("a", &["en"], &["b"]).is_err());

        let mut entity = NamedEntity::new_enum("hero");
        let regex = EntityRegex::parse("/x/").unwrap();
        assert!(entity.add_regex(&["en"], regex).is_err());
    }

    #[test]
    fn test_enum_extract_reduces_overlaps() {
        let mut entity = NamedEntity::new_enum("city");
        entity.add_text("new_york", &["en"], &["New York"]).unwrap();

        let matches = entity.extract("fly me to new york today", "en", &LevenshteinScorer::new(), 0.5);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].utterance_text, "new york");
        assert_eq!(matches[0].option.as_deref(), Some("new_york"));
        assert_eq!(matches[0].accuracy, 1.0);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut entity = NamedEntity::new_regex("mail");
        entity
            .add_regex(&["en"], EntityRegex::parse("/\\w+@\\w+\\.com/gi").unwrap())
            .unwrap();

        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "regex");
        assert_eq!(json["locales"]["en"], "/\\w+@\\w+\\.com/gi");

        let back: NamedEntity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }
}
