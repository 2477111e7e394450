//! Domain routing over several feature pipelines.
//!
//! A [`DomainManager`] keeps a log of labeled sentences grouped by domain,
//! an exact-match cache keyed by canonical stem keys, and one [`Nlu`] per
//! domain plus the master domain.
//!
//! [`Nlu`]: crate::nlu::Nlu

pub mod corpus;
pub mod manager;

pub use corpus::{SentenceLog, TrainingExample};
pub use manager::{
    DomainClassification, DomainManager, DomainManagerModel, DomainManagerSettings, StemDictEntry,
};

/// Domain that holds sentences added without a domain, and the router when
/// training by domain.
pub const MASTER_DOMAIN: &str = "master_domain";

/// Domain reported when no domain can be resolved.
pub const DEFAULT_DOMAIN: &str = "default";
