use parlance::error::Result;
use parlance::ner::{NerManager, NerModel};

#[test]
fn test_regex_entity_finds_every_number() -> Result<()> {
    let mut ner = NerManager::default();
    ner.add_regex_entity("number", &["en"], "/\\d+/g")?;

    let utterance = "I have 3 cats and 12 dogs";
    let found = ner.find_entities(utterance, "en", None);

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].source_text, "3");
    assert_eq!((found[0].start, found[0].end), (7, 8));
    assert_eq!(found[1].source_text, "12");
    assert_eq!((found[1].start, found[1].end), (18, 20));
    for m in &found {
        assert_eq!(&utterance[m.start..m.end], m.source_text);
        assert_eq!(m.entity, "number");
        assert_eq!(m.accuracy, 1.0);
    }
    Ok(())
}

#[test]
fn test_invalid_regex_fails_at_registration() {
    let mut ner = NerManager::default();
    assert!(ner.add_regex_entity("broken", &["en"], "/(unclosed/").is_err());
    assert!(ner.add_regex_entity("flags", &["en"], "/abc/q").is_err());
    assert!(ner.is_empty());
}

#[test]
fn test_enum_and_regex_entities_together() -> Result<()> {
    let mut ner = NerManager::default();
    ner.add_entity_text("city", "barcelona", &["en"], &["Barcelona"])?;
    ner.add_entity_text("city", "madrid", &["en"], &["Madrid"])?;
    ner.add_regex_entity("number", &["en"], "/\\d+/")?;

    let utterance = "2 tickets from Madrid to Barcelna";
    let found = ner.find_entities(utterance, "en", None);

    // Enum matches come before regex matches.
    let entities: Vec<&str> = found.iter().map(|m| m.entity.as_str()).collect();
    assert_eq!(entities, vec!["city", "city", "number"]);

    let barcelona = found
        .iter()
        .find(|m| m.option.as_deref() == Some("barcelona"))
        .unwrap();
    assert_eq!(barcelona.utterance_text, "Barcelna");
    assert!(barcelona.accuracy < 1.0 && barcelona.accuracy > 0.8);

    let mut ordered = found.clone();
    ordered.sort_by_key(|m| m.start);
    assert_eq!(
        NerManager::replace_entities(utterance, &ordered),
        "%number% tickets from %city% to %city%"
    );
    Ok(())
}

#[test]
fn test_allow_list_numbered_references() -> Result<()> {
    let mut ner = NerManager::default();
    ner.add_entity_text("city", "madrid", &["en"], &["Madrid"])?;
    ner.add_entity_text("city", "paris", &["en"], &["Paris"])?;
    ner.add_regex_entity("number", &["en"], "/\\d+/")?;

    let allow = vec!["city".to_string(), "city_1".to_string()];
    let found = ner.find_entities("from Madrid to Paris in 2 days", "en", Some(&allow));

    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|m| m.entity.starts_with("city")));
    assert_eq!(found[0].entity, "city");
    assert_eq!(found[1].entity, "city_1");
    Ok(())
}

#[test]
fn test_allow_list_references_follow_utterance_position() -> Result<()> {
    let mut ner = NerManager::default();
    ner.add_entity_text("city", "paris", &["en"], &["Paris"])?;
    ner.add_entity_text("city", "madrid", &["en"], &["Madrid"])?;

    let allow = vec!["city".to_string(), "city_1".to_string()];
    let found = ner.find_entities("from Madrid to Paris", "en", Some(&allow));

    assert_eq!(found.len(), 2);
    let madrid = found.iter().find(|m| m.utterance_text == "Madrid").unwrap();
    let paris = found.iter().find(|m| m.utterance_text == "Paris").unwrap();
    assert_eq!(madrid.entity, "city");
    assert_eq!(paris.entity, "city_1");
    Ok(())
}

#[test]
fn test_model_survives_json() -> Result<()> {
    let mut ner = NerManager::default();
    ner.add_entity_text("hero", "spiderman", &["en", "es"], &["Spiderman", "Spider-man"])?;
    ner.add_regex_entity("email", &["en"], "/\\S+@\\S+\\.\\w+/i")?;

    let json = serde_json::to_string(&ner.save())?;
    assert!(json.contains("/\\\\S+@\\\\S+\\\\.\\\\w+/i"));

    let model: NerModel = serde_json::from_str(&json)?;
    let mut restored = NerManager::default();
    restored.load(&model);

    let utterance = "Spiderman writes to PETER@bugle.com";
    assert_eq!(
        restored.find_entities(utterance, "en", None),
        ner.find_entities(utterance, "en", None)
    );
    assert_eq!(restored.find_entities(utterance, "en", None).len(), 2);
    Ok(())
}
