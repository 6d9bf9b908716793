//! In-memory wine index
//!
//! Exact lookups go through a map of normalized keys; fuzzy lookups score a
//! shortlist of records that share at least one phonetic word key with the
//! query.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::info;

use super::{exact_key, LocalWineStore, WineRecord};
use crate::normalize::{self, phonetic};

/// Keys derived from one record
#[derive(Debug, Clone)]
struct IndexedKeys {
    /// Numeric tokens removed, compared against fuzzy queries
    fuzzy: Vec<String>,
}

/// Read-only index over a wine catalog
#[derive(Debug, Clone)]
pub struct WineIndex {
    records: Vec<WineRecord>,
    keys: Vec<IndexedKeys>,
    exact: HashMap<String, Vec<usize>>,
    phonetic: HashMap<String, Vec<usize>>,
    use_phonetic_shortlist: bool,
}

impl WineIndex {
    pub fn new(records: Vec<WineRecord>) -> Self {
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut phonetic_buckets: HashMap<String, Vec<usize>> = HashMap::new();
        let mut keys = Vec::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            let record_keys = record_keys(record);

            for key in &record_keys {
                let bucket = exact.entry(key.clone()).or_default();
                if !bucket.contains(&idx) {
                    bucket.push(idx);
                }
            }

            let mut fuzzy: Vec<String> = Vec::new();
            for key in &record_keys {
                let stripped = normalize::strip_numeric_tokens(key);
                if !stripped.is_empty() && !fuzzy.contains(&stripped) {
                    fuzzy.push(stripped);
                }
            }

            let word_keys: HashSet<String> = fuzzy
                .iter()
                .flat_map(|k| k.split_whitespace())
                .map(phonetic::encode)
                .filter(|k| k != phonetic::EMPTY_KEY)
                .collect();
            for word_key in word_keys {
                phonetic_buckets.entry(word_key).or_default().push(idx);
            }

            keys.push(IndexedKeys { fuzzy });
        }

        info!(
            "Indexed {} wines under {} exact keys and {} phonetic buckets",
            records.len(),
            exact.len(),
            phonetic_buckets.len()
        );

        Self {
            records,
            keys,
            exact,
            phonetic: phonetic_buckets,
            use_phonetic_shortlist: true,
        }
    }

    /// Score every record instead of a phonetic shortlist when disabled
    pub fn with_phonetic_shortlist(mut self, enabled: bool) -> Self {
        self.use_phonetic_shortlist = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WineRecord] {
        &self.records
    }

    /// Look up a record by database id
    pub fn get(&self, id: &str) -> Option<&WineRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Records sharing a phonetic word key with the query, in catalog order
    fn shortlist(&self, query: &str) -> Vec<usize> {
        let mut indices = BTreeSet::new();
        for word in query.split_whitespace() {
            if let Some(bucket) = self.phonetic.get(&phonetic::encode(word)) {
                indices.extend(bucket.iter().copied());
            }
        }
        indices.into_iter().collect()
    }
}

/// Exact keys for a record: producer + name, and the same followed by the region
fn record_keys(record: &WineRecord) -> Vec<String> {
    let base = exact_key(&record.producer, &record.name);
    let region = normalize::normalize(&record.region);

    let mut keys = vec![base.clone()];
    if !region.is_empty() && !base.ends_with(&region) {
        keys.push(format!("{} {}", base, region));
    }
    keys
}

impl LocalWineStore for WineIndex {
    fn find_by_key(&self, key: &str, vintage: Option<u16>) -> Option<&WineRecord> {
        let candidates: Vec<&WineRecord> = self
            .exact
            .get(key)?
            .iter()
            .map(|&idx| &self.records[idx])
            .collect();

        let non_vintage = || candidates.iter().copied().find(|r| r.vintage.is_none());

        match vintage {
            Some(year) => candidates
                .iter()
                .copied()
                .find(|r| r.vintage == Some(year))
                .or_else(non_vintage),
            None => non_vintage().or_else(|| candidates.iter().copied().max_by_key(|r| r.vintage)),
        }
    }

    fn fuzzy_candidates(&self, normalized_text: &str, min_similarity: f32) -> Vec<(&WineRecord, f32)> {
        let query = normalize::strip_numeric_tokens(normalized_text);
        if query.is_empty() {
            return Vec::new();
        }

        let indices: Vec<usize> = if self.use_phonetic_shortlist {
            self.shortlist(&query)
        } else {
            (0..self.records.len()).collect()
        };

        let mut scored: Vec<(&WineRecord, f32)> = indices
            .into_iter()
            .filter_map(|idx| {
                let best = self.keys[idx]
                    .fuzzy
                    .iter()
                    .map(|key| normalize::similarity_normalized(&query, key))
                    .fold(0.0f32, f32::max);
                (best >= min_similarity).then(|| (&self.records[idx], best))
            })
            .collect();

        // Stable, so equal scores keep catalog order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }
}
