//! Candidate Grouper
//!
//! Clusters positioned OCR lines into wine-entry candidates and rejects the
//! ones that are clearly not wine entries before they reach the matcher.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

use crate::config::{AdmissionConfig, GroupingConfig};
use crate::normalize::{self, abbreviations, TermKind};
use crate::vision::ocr::{BoundingBox, TextFragment};

/// One or more adjacent fragments hypothesized to be a single wine entry
#[derive(Debug, Clone, PartialEq)]
pub struct WineTextCandidate {
    /// Fragment texts joined with single spaces, top line first
    pub full_text: String,
    /// Union of the fragment boxes
    pub bounding_box: BoundingBox,
    /// Mean fragment confidence
    pub confidence: f32,
    /// Number of fragments in the group
    pub line_count: usize,
}

/// Full-string patterns for menu chrome that is never a wine entry
static NON_WINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Section headers
        r"^((red|white|rose|sparkling|dessert|sweet|fortified|orange|natural)\s+)?(wines?)?\s*(by the glass|by the bottle|half bottles?|magnums?|large formats?|bubbles|selections?)?$",
        r"^(sparkling|champagne|dessert|port|sherry|sake|beer|beers|cocktails|spirits|digestifs?|aperitifs?)(\s+(and|&)\s+\w+)?$",
        r"\b(wine|drinks?|beverage|cocktail|dessert)\s+(list|menu)\b",
        r"^(our\s+)?(sommelier|house)\s+(selections?|picks?|wines?)$",
        // Pagination
        r"^(page\s*)?\d+(\s*(of|/)\s*\d+)?$",
        r"^continued( on next page)?$",
        // Keyboard and UI noise
        r"qwertyuiop|asdfghjkl|zxcvbnm",
        r"^(cancel|done|search|back|next|share|edit|settings|scan|scanning|tap to scan|retake)$",
        // Bare countries and colors
        r"^(red|white|rose|blush|orange|amber)$",
        r"^(france|italy|spain|portugal|germany|austria|usa|united states|australia|new zealand|argentina|chile|south africa|greece|hungary)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("non-wine pattern is a valid regex"))
    .collect()
});

const GRAPE_TERMS: &[&str] = &[
    "cabernet",
    "cabernet sauvignon",
    "cabernet franc",
    "merlot",
    "pinot noir",
    "pinot grigio",
    "pinot gris",
    "pinot blanc",
    "chardonnay",
    "sauvignon blanc",
    "syrah",
    "shiraz",
    "zinfandel",
    "malbec",
    "grenache",
    "garnacha",
    "tempranillo",
    "sangiovese",
    "nebbiolo",
    "riesling",
    "gewurztraminer",
    "viognier",
    "chenin blanc",
    "semillon",
    "mourvedre",
    "petite sirah",
    "petit verdot",
    "carmenere",
    "barbera",
    "gamay",
    "albarino",
    "gruner veltliner",
    "torrontes",
    "moscato",
    "muscat",
    "verdejo",
    "vermentino",
    "carignan",
    "cinsault",
    "primitivo",
    "aglianico",
    "touriga nacional",
    "pinotage",
    "tannat",
    "meritage",
];

const REGION_TERMS: &[&str] = &[
    "napa",
    "napa valley",
    "sonoma",
    "sonoma coast",
    "alexander valley",
    "paso robles",
    "santa barbara",
    "santa lucia highlands",
    "anderson valley",
    "columbia valley",
    "walla walla",
    "finger lakes",
    "oregon",
    "bordeaux",
    "burgundy",
    "bourgogne",
    "champagne",
    "chablis",
    "margaux",
    "pauillac",
    "saint julien",
    "saint estephe",
    "saint emilion",
    "pomerol",
    "sauternes",
    "pessac leognan",
    "medoc",
    "haut medoc",
    "rhone",
    "hermitage",
    "cote rotie",
    "gigondas",
    "beaujolais",
    "sancerre",
    "vouvray",
    "alsace",
    "provence",
    "barolo",
    "barbaresco",
    "chianti",
    "chianti classico",
    "brunello di montalcino",
    "montalcino",
    "bolgheri",
    "tuscany",
    "toscana",
    "piedmont",
    "piemonte",
    "amarone",
    "valpolicella",
    "prosecco",
    "etna",
    "rioja",
    "ribera del duero",
    "priorat",
    "rias baixas",
    "douro",
    "mosel",
    "rheingau",
    "wachau",
    "tokaji",
    "marlborough",
    "central otago",
    "barossa",
    "barossa valley",
    "mclaren vale",
    "margaret river",
    "yarra valley",
    "coonawarra",
    "mendoza",
    "maipo",
    "colchagua",
    "stellenbosch",
];

const PRODUCER_TERMS: &[&str] = &[
    "chateau",
    "domaine",
    "estate",
    "winery",
    "vineyard",
    "vineyards",
    "cellars",
    "clos",
    "maison",
    "bodega",
    "bodegas",
    "tenuta",
    "castello",
    "cantina",
    "weingut",
    "quinta",
    "reserve",
    "reserva",
    "riserva",
    "grand cru",
    "premier cru",
    "cuvee",
    "grand vin",
];

/// Vocabulary for one indicator category, including every expansion target
/// in the abbreviation table so expanded shorthand always counts.
fn vocabulary(own: &[&'static str], kinds: &[TermKind]) -> Vec<&'static str> {
    let mut terms: Vec<&'static str> = own.to_vec();
    for (_, replacement, kind) in abbreviations::ABBREVIATIONS {
        if kinds.contains(kind) && !terms.contains(replacement) {
            terms.push(*replacement);
        }
    }
    terms
}

static GRAPES: Lazy<Vec<&'static str>> = Lazy::new(|| vocabulary(GRAPE_TERMS, &[TermKind::Grape]));
static REGIONS: Lazy<Vec<&'static str>> = Lazy::new(|| vocabulary(REGION_TERMS, &[TermKind::Region]));
static PRODUCERS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vocabulary(PRODUCER_TERMS, &[TermKind::Quality]));

fn contains_phrase(padded: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| padded.contains(&format!(" {} ", term)))
}

/// Groups fragments into candidates and applies the admission filter
#[derive(Debug, Clone, Default)]
pub struct CandidateGrouper {
    grouping: GroupingConfig,
    admission: AdmissionConfig,
}

impl CandidateGrouper {
    pub fn new(grouping: GroupingConfig, admission: AdmissionConfig) -> Self {
        Self { grouping, admission }
    }

    /// Partition fragments into candidates, top of frame first.
    ///
    /// The result depends only on the set of fragments, not their input
    /// order. Fragments with blank text are ignored.
    pub fn group(&self, fragments: &[TextFragment]) -> Vec<WineTextCandidate> {
        let mut sorted: Vec<&TextFragment> = fragments
            .iter()
            .filter(|f| !f.text.trim().is_empty())
            .collect();
        sorted.sort_by(|a, b| reading_order(a, b));

        let mut candidates = Vec::new();
        let mut current: Vec<&TextFragment> = Vec::new();

        for fragment in sorted {
            if let Some(prev) = current.last() {
                let gap = prev.bounding_box.min_y() - fragment.bounding_box.max_y();
                if gap >= self.grouping.line_gap {
                    candidates.push(build_candidate(&current));
                    current.clear();
                }
            }
            current.push(fragment);
        }
        if !current.is_empty() {
            candidates.push(build_candidate(&current));
        }

        candidates
    }

    /// Group and keep only the candidates that pass the admission filter
    pub fn admitted(&self, fragments: &[TextFragment]) -> Vec<WineTextCandidate> {
        self.group(fragments)
            .into_iter()
            .filter(|c| self.is_likely_wine_entry(c))
            .collect()
    }

    /// Whether a candidate is worth sending to the matcher
    pub fn is_likely_wine_entry(&self, candidate: &WineTextCandidate) -> bool {
        match self.rejection_reason(candidate) {
            Some(reason) => {
                debug!("Rejected candidate {:?}: {}", candidate.full_text, reason);
                false
            }
            None => true,
        }
    }

    fn rejection_reason(&self, candidate: &WineTextCandidate) -> Option<&'static str> {
        let cfg = &self.admission;
        let text = candidate.full_text.trim();

        if text.chars().count() < cfg.min_text_length {
            return Some("too short");
        }
        if candidate.confidence < cfg.min_confidence {
            return Some("low confidence");
        }

        let prepared = normalize::prepare(text);
        if NON_WINE_PATTERNS.iter().any(|re| re.is_match(&prepared)) {
            return Some("non-wine pattern");
        }

        let total = text.chars().count() as f32;
        let special = text
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count() as f32;
        if special / total > cfg.max_special_char_ratio {
            return Some("special character density");
        }

        let visible = text.chars().filter(|c| !c.is_whitespace()).count() as f32;
        let non_letters = text
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_alphabetic())
            .count() as f32;
        if visible > 0.0 && non_letters / visible > cfg.max_numeric_ratio {
            return Some("numeric density");
        }

        let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() > cfg.max_all_caps_letters && letters.iter().all(|c| c.is_uppercase()) {
            return Some("all-caps header");
        }

        if count_indicators(&prepared) < cfg.min_indicators {
            return Some("not enough wine indicators");
        }

        None
    }
}

/// Number of strong wine indicator categories present in prepared text
fn count_indicators(prepared: &str) -> usize {
    let padded = format!(" {} ", prepared);
    [
        contains_phrase(&padded, &GRAPES),
        contains_phrase(&padded, &REGIONS),
        normalize::extract_vintage(prepared).is_some(),
        contains_phrase(&padded, &PRODUCERS),
    ]
    .iter()
    .filter(|present| **present)
    .count()
}

/// Top to bottom, then left to right, with a total tie-break on content
fn reading_order(a: &TextFragment, b: &TextFragment) -> Ordering {
    b.bounding_box
        .max_y()
        .total_cmp(&a.bounding_box.max_y())
        .then_with(|| a.bounding_box.min_x().total_cmp(&b.bounding_box.min_x()))
        .then_with(|| a.text.cmp(&b.text))
        .then_with(|| a.bounding_box.min_y().total_cmp(&b.bounding_box.min_y()))
        .then_with(|| a.bounding_box.width.total_cmp(&b.bounding_box.width))
        .then_with(|| a.confidence.total_cmp(&b.confidence))
}

fn build_candidate(group: &[&TextFragment]) -> WineTextCandidate {
    let full_text = group
        .iter()
        .map(|f| f.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let bounding_box = group
        .iter()
        .skip(1)
        .fold(group[0].bounding_box, |acc, f| acc.union(&f.bounding_box));
    let confidence = group.iter().map(|f| f.confidence).sum::<f32>() / group.len() as f32;

    WineTextCandidate {
        full_text,
        bounding_box,
        confidence,
        line_count: group.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, top: f32, confidence: f32) -> TextFragment {
        // 2% tall lines starting at x=0.1
        TextFragment::new(text, BoundingBox::new(0.1, top - 0.02, 0.6, 0.02), confidence)
    }

    fn candidate(text: &str, confidence: f32) -> WineTextCandidate {
        WineTextCandidate {
            full_text: text.to_string(),
            bounding_box: BoundingBox::new(0.1, 0.5, 0.6, 0.02),
            confidence,
            line_count: 1,
        }
    }

    #[test]
    fn test_adjacent_lines_join() {
        let grouper = CandidateGrouper::default();
        let fragments = vec![
            line("Opus", 0.80, 0.9),
            line("One", 0.77, 0.8),
            line("Napa Valley 2019", 0.74, 0.7),
        ];

        let candidates = grouper.group(&fragments);
        assert_eq!(candidates.len(), 1);

        let c = &candidates[0];
        assert_eq!(c.full_text, "Opus One Napa Valley 2019");
        assert_eq!(c.line_count, 3);
        assert!((c.confidence - 0.8).abs() < 1e-5);
        assert!((c.bounding_box.max_y() - 0.80).abs() < 1e-5);
        assert!((c.bounding_box.min_y() - 0.72).abs() < 1e-5);
    }

    #[test]
    fn test_large_gap_splits() {
        let grouper = CandidateGrouper::default();
        let fragments = vec![
            line("Opus One Napa Valley 2019", 0.80, 0.9),
            line("Caymus Cabernet Sauvignon 2021", 0.70, 0.9),
        ];

        let candidates = grouper.group(&fragments);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].full_text, "Opus One Napa Valley 2019");
        assert_eq!(candidates[1].full_text, "Caymus Cabernet Sauvignon 2021");
    }

    #[test]
    fn test_grouping_is_order_independent() {
        let grouper = CandidateGrouper::default();
        let fragments = vec![
            line("Chateau Margaux", 0.90, 0.9),
            line("Margaux 2015", 0.87, 0.9),
            line("Ridge Monte Bello", 0.70, 0.8),
            line("Santa Cruz Mountains 2018", 0.675, 0.8),
            line("$240", 0.50, 0.99),
        ];
        let expected = grouper.group(&fragments);
        assert_eq!(expected.len(), 3);

        let mut reversed = fragments.clone();
        reversed.reverse();
        assert_eq!(grouper.group(&reversed), expected);

        let rotated: Vec<TextFragment> = fragments[2..]
            .iter()
            .chain(fragments[..2].iter())
            .cloned()
            .collect();
        assert_eq!(grouper.group(&rotated), expected);
    }

    #[test]
    fn test_same_line_fragments_read_left_to_right() {
        let grouper = CandidateGrouper::default();
        let fragments = vec![
            TextFragment::new("One", BoundingBox::new(0.4, 0.78, 0.1, 0.02), 0.9),
            TextFragment::new("Opus", BoundingBox::new(0.1, 0.78, 0.2, 0.02), 0.9),
        ];

        let candidates = grouper.group(&fragments);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].full_text, "Opus One");
    }

    #[test]
    fn test_blank_fragments_ignored() {
        let grouper = CandidateGrouper::default();
        assert!(grouper.group(&[]).is_empty());
        assert!(grouper.group(&[line("   ", 0.5, 0.9)]).is_empty());
    }

    #[test]
    fn test_admission_examples() {
        let grouper = CandidateGrouper::default();
        assert!(!grouper.is_likely_wine_entry(&candidate("Wine List", 0.99)));
        assert!(grouper.is_likely_wine_entry(&candidate(
            "Opus One Cabernet Sauvignon Napa Valley 2019 $425",
            0.9
        )));
    }

    #[test]
    fn test_admission_rejects_noise() {
        let grouper = CandidateGrouper::default();
        // too short
        assert!(!grouper.is_likely_wine_entry(&candidate("Merlot", 0.99)));
        // low confidence
        assert!(!grouper.is_likely_wine_entry(&candidate("Chateau Margaux 2015", 0.3)));
        // section header
        assert!(!grouper.is_likely_wine_entry(&candidate("Red Wines by the Glass", 0.99)));
        assert!(!grouper.is_likely_wine_entry(&candidate("Sparkling Wines", 0.99)));
        // pagination
        assert!(!grouper.is_likely_wine_entry(&candidate("Page 3 of 12", 0.99)));
        // keyboard noise
        assert!(!grouper.is_likely_wine_entry(&candidate("qwertyuiop asdf 2019", 0.99)));
        // symbol soup
        assert!(!grouper.is_likely_wine_entry(&candidate("$$ -- ## // 2019 **", 0.99)));
        assert!(!grouper.is_likely_wine_entry(&candidate("2019 2020 2021 45 60", 0.99)));
        // all-caps header
        assert!(!grouper.is_likely_wine_entry(&candidate("CALIFORNIA CABERNET SAUVIGNON", 0.99)));
        // only one indicator
        assert!(!grouper.is_likely_wine_entry(&candidate("Grilled Salmon 2019", 0.99)));
    }

    #[test]
    fn test_admission_accepts_entries() {
        let grouper = CandidateGrouper::default();
        assert!(grouper.is_likely_wine_entry(&candidate("Opus One Napa Valley 2019", 0.8)));
        assert!(grouper.is_likely_wine_entry(&candidate("Ch. Margaux '15", 0.9)));
        assert!(grouper.is_likely_wine_entry(&candidate("Duckhorn Merlot Napa", 0.9)));
        // short all-caps producer names are fine
        assert!(grouper.is_likely_wine_entry(&candidate("DOMAINE LEROY 2012", 0.9)));
    }

    #[test]
    fn test_admitted_filters_group_output() {
        let grouper = CandidateGrouper::default();
        let fragments = vec![
            line("WINE LIST", 0.95, 0.99),
            line("Opus", 0.80, 0.9),
            line("One", 0.77, 0.9),
            line("Napa Valley 2019", 0.74, 0.9),
            line("12", 0.05, 0.99),
        ];

        let admitted = grouper.admitted(&fragments);
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].full_text, "Opus One Napa Valley 2019");
    }
}
