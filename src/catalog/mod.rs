//! Local Wine Catalog
//!
//! Read-only lookup structures over the wine database. Built once before a
//! session starts and only read while scanning.

pub mod index;
pub mod record;

pub use index::WineIndex;
pub use record::{WineColor, WineRecord};

use crate::normalize;

/// Read-only local wine store
pub trait LocalWineStore: Send + Sync {
    /// Look up records indexed under an already normalized key.
    ///
    /// With a vintage, only that vintage (or a non-vintage record) matches.
    /// Without one, the non-vintage record is preferred, then the latest vintage.
    fn find_by_key(&self, key: &str, vintage: Option<u16>) -> Option<&WineRecord>;

    /// Every record scoring at least `min_similarity` against the text, best first.
    ///
    /// Numeric tokens in the query are ignored.
    fn fuzzy_candidates(&self, normalized_text: &str, min_similarity: f32) -> Vec<(&WineRecord, f32)>;

    /// Exact lookup by producer, name and vintage
    fn find_exact(&self, producer: &str, name: &str, vintage: Option<u16>) -> Option<&WineRecord> {
        self.find_by_key(&exact_key(producer, name), vintage)
    }

    /// Best fuzzy match for the text with its similarity
    fn find_fuzzy(&self, normalized_text: &str) -> Option<(&WineRecord, f32)> {
        self.fuzzy_candidates(normalized_text, 0.0).into_iter().next()
    }
}

/// Normalized producer + name, without repeating a producer the name already starts with
pub fn exact_key(producer: &str, name: &str) -> String {
    let producer = normalize::normalize(producer);
    let name = normalize::normalize(name);

    if producer.is_empty() || name == producer || name.starts_with(&format!("{} ", producer)) {
        name
    } else if name.is_empty() {
        producer
    } else {
        format!("{} {}", producer, name)
    }
}
