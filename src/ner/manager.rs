//! Registry of named entities and entity search.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use ahash::AHashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{NluError, Result};
use crate::ner::entity::{EntityMatch, EntityRegex, NamedEntity};
use crate::ner::similarity::{LevenshteinScorer, SimilarityScorer};

/// Settings of the entity recognizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NerSettings {
    /// Minimum accuracy of an enum match.
    pub threshold: f64,
}

impl Default for NerSettings {
    fn default() -> Self {
        NerSettings { threshold: 0.5 }
    }
}

/// Serialized form of a [`NerManager`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NerModel {
    #[serde(default)]
    pub settings: NerSettings,
    #[serde(default)]
    pub entities: BTreeMap<String, NamedEntity>,
}

/// Drop every `_<digits>` run from an entity reference: `city_1` → `city`.
fn strip_numbering(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                chars.next();
            }
            continue;
        }
        result.push(c);
    }
    result
}

/// Named entity recognizer.
pub struct NerManager {
    settings: NerSettings,
    entities: BTreeMap<String, NamedEntity>,
    scorer: Arc<dyn SimilarityScorer>,
}

impl std::fmt::Debug for NerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NerManager")
            .field("settings", &self.settings)
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .field("scorer", &self.scorer.name())
            .finish()
    }
}

impl Default for NerManager {
    fn default() -> Self {
        Self::new(NerSettings::default())
    }
}

impl NerManager {
    pub fn new(settings: NerSettings) -> Self {
        NerManager {
            settings,
            entities: BTreeMap::new(),
            scorer: Arc::new(LevenshteinScorer::new()),
        }
    }

    /// Use another scorer for enum entities.
    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn settings(&self) -> &NerSettings {
        &self.settings
    }

    pub fn entity(&self, name: &str) -> Option<&NamedEntity> {
        self.entities.get(name)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Register an entity, replacing one with the same name.
    pub fn add_entity(&mut self, entity: NamedEntity) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn remove_entity(&mut self, name: &str) -> bool {
        self.entities.remove(name).is_some()
    }

    /// Add synonyms to an option of an enum entity, creating both when
    /// missing.
    pub fn add_entity_text<S: AsRef<str>>(
        &mut self,
        entity: &str,
        option: &str,
        locales: &[S],
        texts: &[S],
    ) -> Result<()> {
        self.entities
            .entry(entity.to_string())
            .or_insert_with(|| NamedEntity::new_enum(entity))
            .add_text(option, locales, texts)
    }

    pub fn remove_entity_text<S: AsRef<str>>(
        &mut self,
        entity: &str,
        option: &str,
        locales: &[S],
        texts: &[S],
    ) {
        if let Some(named) = self.entities.get_mut(entity) {
            named.remove_text(option, locales, texts);
        }
    }

    /// Set the regex of a regex entity for the given locales, creating the
    /// entity when missing. The pattern is `/source/flags` or a raw regex.
    pub fn add_regex_entity<S: AsRef<str>>(
        &mut self,
        entity: &str,
        locales: &[S],
        pattern: &str,
    ) -> Result<()> {
        let regex = EntityRegex::parse(pattern)?;
        if self.entities.get(entity).is_some_and(|e| e.is_enum()) {
            return Err(NluError::entity(format!(
                "Entity {entity} is an enum entity and takes no regex"
            )));
        }
        self.entities
            .entry(entity.to_string())
            .or_insert_with(|| NamedEntity::new_regex(entity))
            .add_regex(locales, regex)
    }

    /// Entities found in `utterance`.
    ///
    /// Enum matches come first, then regex matches, each group in entity
    /// name order. Matches are neither sorted by position nor reduced across
    /// entities. With an allow-list only the listed entities are searched;
    /// a reference such as `city_1` searches `city`, and its matches take
    /// the references in the order they were listed from left to right.
    pub fn find_entities(
        &self,
        utterance: &str,
        locale: &str,
        allow_list: Option<&[String]>,
    ) -> Vec<EntityMatch> {
        let mut references: Option<AHashMap<String, VecDeque<String>>> = None;
        let names: Vec<String> = match allow_list {
            Some(allow) => {
                let mut map: AHashMap<String, VecDeque<String>> = AHashMap::new();
                let mut names = Vec::new();
                for item in allow {
                    let name = strip_numbering(item);
                    if !map.contains_key(&name) {
                        names.push(name.clone());
                    }
                    map.entry(name).or_default().push_back(item.clone());
                }
                references = Some(map);
                names
            }
            None => self.entities.keys().cloned().collect(),
        };

        let (enums, regexes): (Vec<&NamedEntity>, Vec<&NamedEntity>) = names
            .iter()
            .filter_map(|name| self.entities.get(name))
            .partition(|entity| entity.is_enum());

        let mut matches: Vec<EntityMatch> = enums
            .into_iter()
            .chain(regexes)
            .flat_map(|entity| {
                entity.extract(
                    utterance,
                    locale,
                    self.scorer.as_ref(),
                    self.settings.threshold,
                )
            })
            .collect();

        if let Some(mut references) = references {
            // References go to matches from left to right; the list itself
            // keeps its extraction order.
            let mut by_position: Vec<usize> = (0..matches.len()).collect();
            by_position.sort_by_key(|&index| matches[index].start);
            for index in by_position {
                let found = &mut matches[index];
                if let Some(reference) = references
                    .get_mut(&found.entity)
                    .and_then(|queue| queue.pop_front())
                {
                    found.entity = reference;
                }
            }
        }
        matches
    }

    /// Replace every match by `%entity%`.
    ///
    /// `matches` must be ordered left to right and must not overlap. A match
    /// starting before the end of the previous one contributes only its
    /// placeholder.
    pub fn replace_entities(utterance: &str, matches: &[EntityMatch]) -> String {
        let Some(last) = matches.last() else {
            return utterance.to_string();
        };

        let mut result = String::with_capacity(utterance.len());
        let mut index = 0;
        for found in matches {
            result.push_str(utterance.get(index..found.start).unwrap_or(""));
            result.push('%');
            result.push_str(&found.entity);
            result.push('%');
            index = found.end;
        }
        result.push_str(utterance.get(last.end..).unwrap_or(""));
        result
    }

    /// Find the entities of `utterance` and replace them by `%entity%`.
    pub fn generate_entity_utterance(&self, utterance: &str, locale: &str) -> String {
        Self::replace_entities(utterance, &self.find_entities(utterance, locale, None))
    }

    /// Entity placeholders referenced by `utterance`, such as `city` and
    /// `city_1` in `"from %city% to %city_1%"`.
    pub fn get_entities_from_utterance(&self, utterance: &str) -> Result<Vec<String>> {
        if self.entities.is_empty() {
            return Ok(Vec::new());
        }
        let names = self
            .entities
            .keys()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!("%(({names})(?:_\\d+)?)%"))
            .map_err(|e| NluError::entity(format!("Invalid entity names: {e}")))?;

        Ok(regex
            .captures_iter(utterance)
            .filter_map(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .collect())
    }

    pub fn save(&self) -> NerModel {
        NerModel {
            settings: self.settings.clone(),
            entities: self.entities.clone(),
        }
    }

    pub fn load(&mut self, model: &NerModel) {
        self.settings = model.settings.clone();
        self.entities = model.entities.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> NerManager {
        let mut ner = NerManager::default();
        ner.add_entity_text("hero", "spiderman", &["en"], &["Spiderman", "Spider-man"])
            .unwrap();
        ner.add_entity_text("hero", "wolverine", &["en"], &["Wolverine", "Logan"])
            .unwrap();
        ner.add_entity_text("city", "barcelona", &["en"], &["Barcelona"])
            .unwrap();
        ner.add_entity_text("city", "madrid", &["en"], &["Madrid"])
            .unwrap();
        ner.add_regex_entity("number", &["en"], "/\\d+/g").unwrap();
        ner
    }

    #[test]
    fn test_strip_numbering() {
        assert_eq!(strip_numbering("city_1"), "city");
        assert_eq!(strip_numbering("from_city_12"), "from_city");
        assert_eq!(strip_numbering("city"), "city");
    }

    #[test]
    fn test_find_entities_enum_before_regex() {
        let ner = manager();
        let found = ner.find_entities("I saw 2 times Logan in Barcelona", "en", None);

        let entities: Vec<_> = found.iter().map(|m| m.entity.as_str()).collect();
        assert_eq!(entities, vec!["city", "hero", "number"]);
        assert_eq!(found[1].option.as_deref(), Some("wolverine"));
        assert_eq!(found[2].source_text, "2");
    }

    #[test]
    fn test_threshold_filters_weak_matches() {
        let mut ner = NerManager::new(NerSettings { threshold: 0.9 });
        ner.add_entity_text("city", "barcelona", &["en"], &["Barcelona"])
            .unwrap();
        assert!(ner.find_entities("going to Barclona", "en", None).is_empty());

        let model = NerModel {
            settings: NerSettings { threshold: 0.8 },
            entities: ner.save().entities,
        };
        ner.load(&model);
        assert_eq!(ner.find_entities("going to Barclona", "en", None).len(), 1);
    }

    #[test]
    fn test_allow_list_renames_references() {
        let ner = manager();
        let allow = vec!["city".to_string(), "city_1".to_string()];
        let found = ner.find_entities("from Madrid to Barcelona", "en", Some(&allow));

        assert_eq!(found.len(), 2);
        // Barcelona is declared first, so it is extracted first.
        assert_eq!(found[0].utterance_text, "Barcelona");
        assert_eq!(found[0].start, 15);
        assert_eq!(found[0].entity, "city_1");
        assert_eq!(found[1].utterance_text, "Madrid");
        assert_eq!(found[1].start, 5);
        assert_eq!(found[1].entity, "city");
    }

    #[test]
    fn test_generate_entity_utterance() {
        let ner = manager();
        assert_eq!(
            ner.generate_entity_utterance("I want to go to Madrid with Spiderman", "en"),
            "I want to go to %city% with %hero%"
        );
        assert_eq!(ner.generate_entity_utterance("nothing here", "en"), "nothing here");
    }

    #[test]
    fn test_replace_assumes_ordered_input() {
        let ner = manager();
        let mut found = ner.find_entities("Madrid has 3 museums", "en", None);
        assert_eq!(
            NerManager::replace_entities("Madrid has 3 museums", &found),
            "%city% has %number% museums"
        );

        found.reverse();
        assert_eq!(
            NerManager::replace_entities("Madrid has 3 museums", &found),
            "Madrid has %number%%city% has 3 museums"
        );
    }

    #[test]
    fn test_get_entities_from_utterance() {
        let ner = manager();
        assert_eq!(
            ner.get_entities_from_utterance("from %city% to %city_1% with %unknown%")
                .unwrap(),
            vec!["city".to_string(), "city_1".to_string()]
        );
        assert!(
            NerManager::default()
                .get_entities_from_utterance("%city%")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_regex_entity_rejects_enum_name() {
        let mut ner = manager();
        assert!(ner.add_regex_entity("hero", &["en"], "/x/").is_err());
        assert!(matches!(
            ner.add_regex_entity("email", &["en"], "/[/"),
            Err(NluError::Entity(_))
        ));
        assert!(ner.entity("email").is_none());
    }

    #[test]
    fn test_save_load() {
        let ner = manager();
        let json = serde_json::to_string(&ner.save()).unwrap();
        let model: NerModel = serde_json::from_str(&json).unwrap();

        let mut loaded = NerManager::default();
        loaded.load(&model);
        assert_eq!(loaded.save(), ner.save());
        assert_eq!(
            loaded.find_entities("Logan has 12 claws", "en", None),
            ner.find_entities("Logan has 12 claws", "en", None)
        );
    }
}
