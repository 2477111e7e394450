use std::sync::Arc;

use parlance::analysis::pipeline::Collaborators;
use parlance::domain::{DEFAULT_DOMAIN, DomainManager, DomainManagerSettings};
use parlance::error::Result;
use parlance::neural::{InProcess, NONE_INTENT};

fn manager(settings: DomainManagerSettings) -> DomainManager {
    DomainManager::new(settings, Collaborators::english()).with_backend(Arc::new(InProcess))
}

#[test]
fn test_exact_match_routes_to_domain() -> Result<()> {
    let mut manager = manager(DomainManagerSettings::default());
    manager.add(Some("food"), "check my cart", "order.check");
    manager.add(Some("food"), "where is my order", "order.check_status");
    manager.train()?;

    let result = manager.classify("check my cart", None)?;
    assert_eq!(result.domain, "food");
    assert_eq!(result.classifications[0].intent, "order.check");
    assert_eq!(result.classifications[0].score, 1.0);
    Ok(())
}

#[test]
fn test_every_unique_sentence_matches_exactly() -> Result<()> {
    let sentences = [
        ("food", "check my cart", "order.check"),
        ("food", "where is my order", "order.check_status"),
        ("food", "I want a pizza", "order.pizza"),
        ("travel", "book a flight", "travel.book"),
        ("travel", "cancel my reservation", "travel.cancel"),
    ];

    for train_by_domain in [false, true] {
        let mut manager = manager(DomainManagerSettings {
            train_by_domain,
            ..Default::default()
        });
        for (domain, utterance, intent) in sentences {
            manager.add(Some(domain), utterance, intent);
        }
        manager.train()?;

        for (domain, utterance, intent) in sentences {
            let result = manager.classify(utterance, None)?;
            assert_eq!(result.domain, domain);
            assert_eq!(result.classifications[0].intent, intent);
            assert_eq!(result.classifications[0].score, 1.0);
        }
    }
    Ok(())
}

#[test]
fn test_train_by_domain_routes_unseen_utterances() -> Result<()> {
    let mut manager = manager(DomainManagerSettings {
        train_by_domain: true,
        ..Default::default()
    });
    for utterance in ["check my cart", "what is in my basket", "show my shopping cart"] {
        manager.add(Some("food"), utterance, "order.check");
    }
    for utterance in ["where is my order", "has my order shipped", "track my order"] {
        manager.add(Some("food"), utterance, "order.status");
    }
    for utterance in ["book a flight", "reserve a plane ticket", "book a flight to Rome"] {
        manager.add(Some("travel"), utterance, "travel.book");
    }
    for utterance in ["cancel my flight", "cancel the plane ticket"] {
        manager.add(Some("travel"), utterance, "travel.cancel");
    }
    let statuses = manager.train()?;
    assert!(statuses.contains_key("food"));
    assert!(statuses.contains_key("travel"));

    let result = manager.classify("I need a flight ticket", None)?;
    assert_eq!(result.domain, "travel");

    let result = manager.classify("did my order ship", None)?;
    assert_eq!(result.domain, "food");
    Ok(())
}

#[test]
fn test_unknown_domain_answers_none() -> Result<()> {
    let mut manager = manager(DomainManagerSettings::default());
    manager.add(Some("food"), "check my cart", "order.check");
    manager.train()?;

    let result = manager.classify("check the weather", Some("weather"))?;
    assert_eq!(result.domain, DEFAULT_DOMAIN);
    assert_eq!(result.classifications.len(), 1);
    assert_eq!(result.classifications[0].intent, NONE_INTENT);
    assert_eq!(result.classifications[0].score, 1.0);
    Ok(())
}
