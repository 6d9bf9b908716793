//! Matcher
//!
//! Resolves a wine-text candidate to at most one wine record. Tiers are tried
//! in order and the first one that clears its bar wins:
//!
//! 1. Exact local key lookup (fixed high confidence)
//! 2. Fuzzy local similarity above a floor
//! 3. Remote search collaborator
//!
//! Nothing in here fails; "no match" is the only negative outcome.

pub mod remote;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{LocalWineStore, WineRecord};
use crate::config::MatchingConfig;
use crate::normalize;
use crate::vision::WineTextCandidate;

pub use remote::{HttpWineSearch, RemoteWineSearch};

/// How a match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Precise key hit in the local index
    Exact,
    /// Similarity match against the local index
    FuzzyLocal,
    /// Top result of the remote search
    FuzzyRemote,
}

/// Best match for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Matched record
    pub wine: WineRecord,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
    /// Vintage of the matched record, only when the text showed a vintage
    pub matched_vintage: Option<u16>,
    /// How the match was found
    pub match_type: MatchType,
    /// Vintage read from the text, if any
    #[serde(default)]
    pub requested_vintage: Option<u16>,
}

impl MatchResult {
    /// The text named a vintage but a different one was matched
    pub fn vintage_substituted(&self) -> bool {
        self.requested_vintage.is_some() && self.matched_vintage != self.requested_vintage
    }
}

/// Normalized form of a candidate, shared by all tiers
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    /// Fully normalized candidate text
    pub normalized: String,
    /// Vintage found in the text
    pub vintage: Option<u16>,
}

impl MatchQuery {
    pub fn from_candidate(candidate: &WineTextCandidate) -> Self {
        let normalized = normalize::normalize(&candidate.full_text);
        let vintage = normalize::extract_vintage(&normalized);
        Self { normalized, vintage }
    }

    /// Keys tried against the exact index.
    ///
    /// First the text without its vintage and without trailing numbers
    /// (prices, glass sizes), then the text without any numeric token.
    pub fn exact_keys(&self) -> Vec<String> {
        let vintage = self.vintage.map(|v| v.to_string());
        let mut tokens: Vec<&str> = self
            .normalized
            .split_whitespace()
            .filter(|t| Some(*t) != vintage.as_deref())
            .collect();
        while tokens.last().is_some_and(|t| t.chars().all(|c| c.is_ascii_digit())) {
            tokens.pop();
        }

        let mut keys = Vec::new();
        for key in [tokens.join(" "), normalize::strip_numeric_tokens(&self.normalized)] {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// Tiered wine matcher
pub struct Matcher {
    store: Arc<dyn LocalWineStore>,
    remote: Option<Arc<dyn RemoteWineSearch>>,
    config: MatchingConfig,
}

impl Matcher {
    pub fn new(store: Arc<dyn LocalWineStore>, config: MatchingConfig) -> Self {
        Self {
            store,
            remote: None,
            config,
        }
    }

    /// Enable the remote tier
    pub fn with_remote(mut self, remote: Arc<dyn RemoteWineSearch>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Run every tier for a candidate
    pub async fn match_candidate(&self, candidate: &WineTextCandidate) -> Option<MatchResult> {
        let query = MatchQuery::from_candidate(candidate);
        if let Some(local) = self.match_local(&query) {
            return Some(local);
        }
        self.search_remote(&query).await
    }

    /// Exact then fuzzy local tiers
    pub fn match_local(&self, query: &MatchQuery) -> Option<MatchResult> {
        if query.normalized.is_empty() {
            return None;
        }
        self.match_exact(query).or_else(|| self.match_fuzzy(query))
    }

    fn match_exact(&self, query: &MatchQuery) -> Option<MatchResult> {
        for key in query.exact_keys() {
            if let Some(wine) = self.store.find_by_key(&key, query.vintage) {
                debug!("Exact match for {:?} on key {:?}", query.normalized, key);
                return Some(MatchResult {
                    wine: wine.clone(),
                    confidence: self.config.exact_confidence.clamp(0.0, 1.0),
                    matched_vintage: query.vintage.and(wine.vintage),
                    match_type: MatchType::Exact,
                    requested_vintage: query.vintage,
                });
            }
        }
        None
    }

    fn match_fuzzy(&self, query: &MatchQuery) -> Option<MatchResult> {
        let scored = self
            .store
            .fuzzy_candidates(&query.normalized, self.config.fuzzy_min_similarity);
        let top_score = scored.first()?.1;

        // Among equal scores prefer the vintage closest to what the text says
        let (wine, similarity) = scored
            .into_iter()
            .take_while(|(_, s)| *s == top_score)
            .min_by_key(|(wine, _)| vintage_rank(wine.vintage, query.vintage))?;

        debug!(
            "Fuzzy match for {:?}: {} ({:.3})",
            query.normalized,
            wine.display_name(),
            similarity
        );

        let matched_vintage = query.vintage.and(wine.vintage);
        let substituted = query.vintage.is_some() && matched_vintage != query.vintage;

        Some(MatchResult {
            wine: wine.clone(),
            confidence: self.fuzzy_confidence(similarity, substituted),
            matched_vintage,
            match_type: MatchType::FuzzyLocal,
            requested_vintage: query.vintage,
        })
    }

    /// Similarity scores ignore vintages, so a fuzzy hit is capped below an
    /// exact one and loses more when it matched another vintage
    fn fuzzy_confidence(&self, similarity: f32, vintage_substituted: bool) -> f32 {
        let ceiling = self.config.fuzzy_max_confidence.min(self.config.exact_confidence);
        let mut confidence = similarity.min(ceiling);
        if vintage_substituted {
            confidence -= self.config.vintage_substitution_penalty;
        }
        confidence.clamp(0.0, 1.0)
    }

    /// Remote tier; transport failures count as no match
    pub async fn search_remote(&self, query: &MatchQuery) -> Option<MatchResult> {
        let remote = self.remote.as_ref()?;
        if query.normalized.is_empty() {
            return None;
        }

        match remote.search(&query.normalized).await {
            Ok(Some(found)) => {
                let matched_vintage = found
                    .matched_vintage
                    .or(query.vintage.and(found.wine.vintage));
                Some(MatchResult {
                    confidence: found.confidence.clamp(0.0, 1.0),
                    matched_vintage,
                    match_type: MatchType::FuzzyRemote,
                    requested_vintage: query.vintage,
                    wine: found.wine,
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Remote search for {:?} failed: {}", query.normalized, e);
                None
            }
        }
    }
}

/// Ordering key for records with equal similarity, lower is better
fn vintage_rank(record: Option<u16>, requested: Option<u16>) -> (u8, u16) {
    match (requested, record) {
        (Some(want), Some(have)) if want == have => (0, 0),
        (Some(want), Some(have)) => (1, want.abs_diff(have)),
        (Some(_), None) => (2, 0),
        // No vintage in the text: non-vintage first, then the latest vintage
        (None, None) => (0, 0),
        (None, Some(have)) => (1, u16::MAX - have),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record::tests::record;
    use crate::catalog::WineIndex;
    use crate::error::{Result, ScanError};
    use crate::vision::BoundingBox;
    use async_trait::async_trait;

    struct FixedRemote(Option<MatchResult>);

    #[async_trait]
    impl RemoteWineSearch for FixedRemote {
        async fn search(&self, _normalized_text: &str) -> Result<Option<MatchResult>> {
            Ok(self.0.clone())
        }
    }

    struct FailingRemote;

    #[async_trait]
    impl RemoteWineSearch for FailingRemote {
        async fn search(&self, _normalized_text: &str) -> Result<Option<MatchResult>> {
            Err(ScanError::Timeout(std::time::Duration::from_secs(30)))
        }
    }

    fn candidate(text: &str) -> WineTextCandidate {
        WineTextCandidate {
            full_text: text.to_string(),
            bounding_box: BoundingBox::new(0.1, 0.5, 0.6, 0.05),
            confidence: 0.9,
            line_count: 1,
        }
    }

    fn store() -> Arc<dyn LocalWineStore> {
        let mut opus = record("opus-2019", "Opus One", "Opus One", Some(2019));
        opus.region = "Napa Valley".to_string();
        opus.score = 97;
        let mut opus_2018 = record("opus-2018", "Opus One", "Opus One", Some(2018));
        opus_2018.region = "Napa Valley".to_string();

        Arc::new(WineIndex::new(vec![
            opus_2018,
            opus,
            record("ridge-nv", "Ridge", "Three Valleys", None),
            record("ridge-mb-2016", "Ridge", "Monte Bello", Some(2016)),
            record("ridge-mb-2019", "Ridge", "Monte Bello", Some(2019)),
            record("margaux-2015", "Chateau Margaux", "Chateau Margaux", Some(2015)),
        ]))
    }

    fn remote_hit(confidence: f32) -> MatchResult {
        MatchResult {
            wine: record("remote-1", "Screaming Eagle", "Cabernet Sauvignon", Some(2019)),
            confidence,
            matched_vintage: None,
            match_type: MatchType::FuzzyLocal,
            requested_vintage: None,
        }
    }

    #[test]
    fn test_exact_keys() {
        let query = MatchQuery::from_candidate(&candidate("Opus One Napa Valley 2019 $425"));
        assert_eq!(query.vintage, Some(2019));
        assert_eq!(query.exact_keys(), vec!["opus one napa valley".to_string()]);

        let query = MatchQuery::from_candidate(&candidate("Bin 707 Penfolds 2018 95"));
        assert_eq!(
            query.exact_keys(),
            vec!["bin 707 penfolds".to_string(), "bin penfolds".to_string()]
        );
    }

    #[tokio::test]
    async fn test_exact_tier() {
        let matcher = Matcher::new(store(), MatchingConfig::default());
        let result = matcher
            .match_candidate(&candidate("Opus One Napa Valley 2019"))
            .await
            .unwrap();

        assert_eq!(result.match_type, MatchType::Exact);
        assert_eq!(result.wine.id, "opus-2019");
        assert_eq!(result.matched_vintage, Some(2019));
        assert!((result.confidence - 0.98).abs() < 1e-6);
        assert!(!result.vintage_substituted());
    }

    #[tokio::test]
    async fn test_exact_beats_remote() {
        let matcher = Matcher::new(store(), MatchingConfig::default())
            .with_remote(Arc::new(FixedRemote(Some(remote_hit(1.0)))));
        let result = matcher
            .match_candidate(&candidate("Ch. Margaux '15"))
            .await
            .unwrap();

        assert_eq!(result.match_type, MatchType::Exact);
        assert_eq!(result.wine.id, "margaux-2015");
    }

    #[tokio::test]
    async fn test_no_vintage_in_text() {
        let matcher = Matcher::new(store(), MatchingConfig::default());
        let result = matcher.match_candidate(&candidate("Opus One")).await.unwrap();

        assert_eq!(result.match_type, MatchType::Exact);
        assert_eq!(result.wine.id, "opus-2019");
        // never fabricated
        assert_eq!(result.matched_vintage, None);
        assert!(!result.vintage_substituted());
    }

    #[tokio::test]
    async fn test_fuzzy_tier() {
        let matcher = Matcher::new(store(), MatchingConfig::default());
        let result = matcher
            .match_candidate(&candidate("Ridge Monte Belo 2019"))
            .await
            .unwrap();

        assert_eq!(result.match_type, MatchType::FuzzyLocal);
        assert_eq!(result.wine.id, "ridge-mb-2019");
        assert_eq!(result.matched_vintage, Some(2019));
        assert!(result.confidence >= 0.65 && result.confidence < 0.98);
    }

    #[tokio::test]
    async fn test_substituted_vintage_scores_below_exact() {
        let matcher = Matcher::new(store(), MatchingConfig::default());
        let exact = matcher
            .match_candidate(&candidate("Opus One 2019"))
            .await
            .unwrap();
        let substituted = matcher
            .match_candidate(&candidate("Opus One 2017"))
            .await
            .unwrap();

        assert_eq!(exact.match_type, MatchType::Exact);
        assert_eq!(substituted.match_type, MatchType::FuzzyLocal);
        assert_eq!(substituted.wine.id, "opus-2018");
        assert!(substituted.vintage_substituted());
        assert!(substituted.confidence < exact.confidence);
        // perfect text similarity, capped at 0.95 then penalized
        assert!((substituted.confidence - 0.85).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_fuzzy_never_outranks_exact_confidence() {
        let config = MatchingConfig {
            fuzzy_max_confidence: 1.0,
            vintage_substitution_penalty: 0.0,
            ..Default::default()
        };
        let matcher = Matcher::new(store(), config);
        // no 2017 record, so the exact tier misses and similarity is 1.0
        let result = matcher
            .match_candidate(&candidate("Ridge Monte Bello 2017"))
            .await
            .unwrap();

        assert_eq!(result.match_type, MatchType::FuzzyLocal);
        assert!((result.confidence - 0.98).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_nearest_vintage_is_flagged() {
        let matcher = Matcher::new(store(), MatchingConfig::default());
        let result = matcher
            .match_candidate(&candidate("Ridge Monte Bello 2017"))
            .await
            .unwrap();

        assert_eq!(result.match_type, MatchType::FuzzyLocal);
        assert_eq!(result.wine.id, "ridge-mb-2016");
        assert_eq!(result.matched_vintage, Some(2016));
        assert_eq!(result.requested_vintage, Some(2017));
        assert!(result.vintage_substituted());
    }

    #[tokio::test]
    async fn test_remote_tier_used_last() {
        let matcher = Matcher::new(store(), MatchingConfig::default())
            .with_remote(Arc::new(FixedRemote(Some(remote_hit(1.4)))));
        let result = matcher
            .match_candidate(&candidate("Screaming Eagle Cabernet 2019"))
            .await
            .unwrap();

        assert_eq!(result.match_type, MatchType::FuzzyRemote);
        assert_eq!(result.wine.id, "remote-1");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.matched_vintage, Some(2019));
    }

    #[tokio::test]
    async fn test_remote_failure_is_no_match() {
        let matcher = Matcher::new(store(), MatchingConfig::default())
            .with_remote(Arc::new(FailingRemote));
        assert!(matcher
            .match_candidate(&candidate("Screaming Eagle Cabernet 2019"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_nothing_matches() {
        let matcher = Matcher::new(store(), MatchingConfig::default());
        assert!(matcher.match_candidate(&candidate("Grilled Salmon")).await.is_none());
        assert!(matcher.match_candidate(&candidate("!!!")).await.is_none());
    }

    #[test]
    fn test_vintage_rank() {
        assert!(vintage_rank(Some(2019), Some(2019)) < vintage_rank(Some(2018), Some(2019)));
        assert!(vintage_rank(Some(2018), Some(2019)) < vintage_rank(Some(2015), Some(2019)));
        assert!(vintage_rank(Some(2015), Some(2019)) < vintage_rank(None, Some(2019)));
        assert!(vintage_rank(None, None) < vintage_rank(Some(2019), None));
        assert!(vintage_rank(Some(2019), None) < vintage_rank(Some(2016), None));
    }
}
