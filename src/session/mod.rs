//! Scan Session
//!
//! Accumulates deduplicated matches for one continuous scanning interaction.
//! Only the pipeline that owns the session mutates it.

pub mod pipeline;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::WineRecord;
use crate::matching::{MatchResult, MatchType};
use crate::vision::{BoundingBox, WineTextCandidate};

pub use pipeline::{run_scan_loop, FrameDecision, MatchSnapshot, PassReport, ScanState, SessionPipeline};

/// Where a scan took place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Venue name, if known
    #[serde(default)]
    pub name: Option<String>,
}

/// A recognized wine-list entry, the unit shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedWine {
    /// Session-unique identifier
    pub id: Uuid,
    /// Candidate text as read from the frame
    pub original_text: String,
    /// Where the entry was on screen
    pub bounding_box: BoundingBox,
    /// Matched record; `None` for unresolved candidates
    pub matched_wine: Option<WineRecord>,
    /// Match confidence (0.0 when unresolved)
    pub match_confidence: f32,
    /// Matched vintage, only when the text showed one
    pub matched_vintage: Option<u16>,
    /// How the match was found
    #[serde(default)]
    pub match_type: Option<MatchType>,
}

impl RecognizedWine {
    pub fn from_match(candidate: &WineTextCandidate, result: MatchResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_text: candidate.full_text.clone(),
            bounding_box: candidate.bounding_box,
            match_confidence: result.confidence,
            matched_vintage: result.matched_vintage,
            match_type: Some(result.match_type),
            matched_wine: Some(result.wine),
        }
    }

    /// Candidate that produced no match, kept only for UI feedback
    pub fn unresolved(candidate: &WineTextCandidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_text: candidate.full_text.clone(),
            bounding_box: candidate.bounding_box,
            matched_wine: None,
            match_confidence: 0.0,
            matched_vintage: None,
            match_type: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.matched_wine.is_some()
    }

    /// Identity used for deduplication: wine id and matched vintage
    pub fn dedup_key(&self) -> Option<(&str, Option<u16>)> {
        self.matched_wine
            .as_ref()
            .map(|wine| (wine.id.as_str(), self.matched_vintage))
    }
}

/// One scanning session, also the persisted layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<ScanLocation>,
    /// Resolved entries, no two sharing a dedup key
    #[serde(default)]
    pub wines: Vec<RecognizedWine>,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            location: None,
            wines: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: ScanLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn len(&self) -> usize {
        self.wines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wines.is_empty()
    }

    /// Whether an entry with this wine id and vintage exists
    pub fn contains(&self, wine_id: &str, vintage: Option<u16>) -> bool {
        self.wines
            .iter()
            .any(|w| w.dedup_key() == Some((wine_id, vintage)))
    }

    /// Append entries not seen before and return the ones added.
    ///
    /// First seen wins: existing entries are never overwritten, and
    /// unresolved entries are never merged.
    pub fn merge(&mut self, incoming: Vec<RecognizedWine>) -> Vec<RecognizedWine> {
        let mut added = Vec::new();
        for wine in incoming {
            let is_new = match wine.dedup_key() {
                Some((id, vintage)) => !self.contains(id, vintage),
                None => false,
            };
            if is_new {
                self.wines.push(wine.clone());
                added.push(wine);
            }
        }
        added
    }

    /// Drop all accumulated entries
    pub fn clear(&mut self) {
        self.wines.clear();
    }
}
