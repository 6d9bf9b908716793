//! Text Normalizer
//!
//! Pure text transformation shared by the candidate grouper and the matcher.
//! The stages run in a fixed order and each one relies on the cleanup done
//! before it:
//!
//! 1. OCR glyph correction (case sensitive)
//! 2. Lowercasing and diacritic folding
//! 3. Abbreviation and vintage shorthand expansion
//! 4. Producer cleanup: conjunctions, possessives, generic suffixes
//! 5. Punctuation and whitespace collapse
//!
//! Nothing in here fails. Unusable input normalizes to an empty string.

pub mod abbreviations;
pub mod ocr_fix;
pub mod phonetic;

pub use abbreviations::{expand_vintage_shorthand, term_kind, TermKind};

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Weight of token-set Jaccard similarity
pub const JACCARD_WEIGHT: f32 = 0.5;
/// Weight of normalized edit-distance similarity
pub const EDIT_WEIGHT: f32 = 0.4;
/// Flat bonus when phonetic keys agree
pub const PHONETIC_BONUS: f32 = 0.1;

/// Generic producer suffixes dropped from the end of a name
const GENERIC_SUFFIXES: &[&str] = &[
    "estate",
    "estates",
    "vineyard",
    "vineyards",
    "winery",
    "wineries",
    "cellar",
    "cellars",
    "wines",
];

static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\W_]+").expect("valid regex"));

static VINTAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19[5-9]\d|20[0-3]\d)\b").expect("valid regex"));

/// Run the full normalization pipeline
pub fn normalize(text: &str) -> String {
    let corrected = ocr_fix::correct_ocr_errors(text);
    let folded = fold_case_and_diacritics(&corrected);
    let expanded = abbreviations::expand_abbreviations(&folded);
    let cleaned = clean_producer_terms(&expanded);
    collapse(&cleaned)
}

/// Stages 1-3 plus collapse, without producer cleanup.
///
/// Keeps words like "estate" and "winery" that the admission filter counts
/// as producer indicators.
pub fn prepare(text: &str) -> String {
    let corrected = ocr_fix::correct_ocr_errors(text);
    let folded = fold_case_and_diacritics(&corrected);
    collapse(&abbreviations::expand_abbreviations(&folded))
}

/// Strip accents and expand ligatures, keeping case (`Château` -> `Chateau`).
///
/// Compatibility forms decompose too, so `¹` becomes `1`.
pub fn strip_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        match c {
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            'ß' => out.push_str("ss"),
            'ẞ' => out.push_str("SS"),
            'ø' => out.push('o'),
            'Ø' => out.push('O'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            'đ' => out.push('d'),
            'Đ' => out.push('D'),
            _ => out.push(c),
        }
    }

    out
}

/// Lowercase and strip accents (`Château` -> `chateau`)
pub fn fold_case_and_diacritics(text: &str) -> String {
    strip_diacritics(&text.to_lowercase()).to_lowercase()
}

fn bare(token: &str) -> &str {
    token.trim_start_matches(|c| matches!(c, '\'' | '’' | '‘' | '`'))
}

fn is_numeric_token(token: &str) -> bool {
    let token = bare(token);
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn is_generic_suffix(token: &str) -> bool {
    GENERIC_SUFFIXES.contains(&bare(token))
}

/// `&` -> `and`, drop possessive `'s`, strip trailing generic suffixes
fn clean_producer_terms(text: &str) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    for token in text.split_whitespace() {
        match token {
            "&" => tokens.push("and"),
            "'s" | "’s" | "‘s" | "`s" => {}
            _ => tokens.push(token),
        }
    }

    // Suffixes count as trailing even when a vintage or price follows them,
    // and at least one real name word must survive.
    loop {
        let Some(last) = tokens.iter().rposition(|t| !is_numeric_token(t)) else {
            break;
        };
        if !is_generic_suffix(tokens[last]) {
            break;
        }
        let has_name = tokens[..last]
            .iter()
            .any(|t| !is_numeric_token(t) && !is_generic_suffix(t));
        if !has_name {
            break;
        }
        tokens.remove(last);
    }

    tokens.join(" ")
}

fn collapse(text: &str) -> String {
    NON_WORD_RE
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fixed-length phonetic key of the normalized text
pub fn phonetic_key(text: &str) -> String {
    phonetic::encode(&normalize(text))
}

/// Similarity of two raw strings in `[0, 1]`
pub fn similarity(a: &str, b: &str) -> f32 {
    similarity_normalized(&normalize(a), &normalize(b))
}

/// Similarity of two strings that are already normalized.
///
/// Token-set Jaccard (0.5) + edit-distance similarity (0.4) + phonetic bonus
/// (0.1). Equal strings short-circuit to 1.0.
pub fn similarity_normalized(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let jaccard = token_jaccard(a, b);

    let max_len = a.chars().count().max(b.chars().count());
    let edit = 1.0 - strsim::levenshtein(a, b) as f32 / max_len as f32;

    let key_a = phonetic::encode(a);
    let bonus = if key_a != phonetic::EMPTY_KEY && key_a == phonetic::encode(b) {
        PHONETIC_BONUS
    } else {
        0.0
    };

    (JACCARD_WEIGHT * jaccard + EDIT_WEIGHT * edit + bonus).clamp(0.0, 1.0)
}

fn token_jaccard(a: &str, b: &str) -> f32 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f32 / union as f32
}

/// First plausible four-digit vintage (1950-2039) in normalized text
pub fn extract_vintage(normalized: &str) -> Option<u16> {
    VINTAGE_RE
        .captures(normalized)
        .and_then(|caps| caps[1].parse().ok())
}

/// Drop purely numeric tokens (vintages, prices, bin numbers)
pub fn strip_numeric_tokens(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .filter(|t| !is_numeric_token(t))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "Ch. Margaux '15",
        "Château Mouton-Rothschild 1986",
        "Dom. de la Romanée-Conti Grand Cru '99",
        "Cabemet Sauvignon 2O18, Napa Valley",
        "Opus One Cabernet Sauvignon Napa Valley 2019 $425",
        "Joe's Vineyards & Sons",
        "Duckhorn Vineyards Merlot",
        "Ridge Lytton Springs Zin 2017",
        "CAYMUS SPECIAL SELECTION",
        "Kistler Vineyards 2019",
        "St.-Émilion 1er Cru",
        "B0rdeaux Superieur",
        "Estate",
        "foo_bar--baz",
        "",
        "   ",
        "!!!",
        "Cuvéee Prestige",
        "Vvíne Cellars",
        "a¹b Margaux",
        "Nooœ Rosé",
        "ŒUVRE Ståhl",
    ];

    #[test]
    fn test_normalize_is_idempotent() {
        for sample in SAMPLES {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_accented_misreads_fixed_in_one_pass() {
        assert_eq!(normalize("Cuvéee Prestige"), "cuvee prestige");
        assert_eq!(normalize("Vvíne Cellars"), "wine");
        assert_eq!(normalize("a¹b Margaux"), "alb margaux");
    }

    #[test]
    fn test_abbreviation_expansion_equivalence() {
        assert_eq!(normalize("Ch. Margaux '15"), normalize("Chateau Margaux 2015"));
        assert_eq!(normalize("Chateau Margaux 2015"), "chateau margaux 2015");
    }

    #[test]
    fn test_vintage_century_inference() {
        assert_eq!(normalize("'98"), "1998");
        assert_eq!(normalize("'19"), "2019");
        assert_eq!(normalize("Heitz '74 Martha's"), "heitz 1974 martha");
    }

    #[test]
    fn test_diacritics_and_punctuation() {
        assert_eq!(normalize("Château Mouton-Rothschild"), "chateau mouton rothschild");
        assert_eq!(normalize("Gewürztraminer"), "gewurztraminer");
        assert_eq!(normalize("  Cœur   de  Cuvée!! "), "coeur de cuvee");
    }

    #[test]
    fn test_producer_cleanup() {
        assert_eq!(normalize("Duckhorn Vineyards"), "duckhorn");
        assert_eq!(normalize("Duckhorn Vineyards 2019"), "duckhorn 2019");
        assert_eq!(normalize("Stag's Leap Wine Cellars"), "stag leap wine");
        assert_eq!(normalize("Joe's Vineyards & Sons"), "joe vineyards and sons");
        // nothing left to call a name, keep it
        assert_eq!(normalize("Estate"), "estate");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("!!!"), "");
        assert_eq!(similarity("", "opus one"), 0.0);
        assert_eq!(similarity("opus one", "---"), 0.0);
    }

    #[test]
    fn test_similarity_bounds_and_symmetry() {
        let pairs = [
            ("Opus One 2019", "Opus One Napa Valley"),
            ("Ch. Margaux", "Chateau Palmer"),
            ("Ridge Monte Bello", "Ridge Lytton Springs"),
            ("Caymus", "Silver Oak"),
            ("a", "b"),
        ];
        for (a, b) in pairs {
            let ab = similarity(a, b);
            let ba = similarity(b, a);
            assert!((0.0..=1.0).contains(&ab), "{} vs {} = {}", a, b, ab);
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn test_similarity_identity() {
        for sample in SAMPLES {
            assert_eq!(similarity(sample, sample), 1.0);
        }
        assert_eq!(similarity("Ch. Margaux", "CHATEAU MARGAUX"), 1.0);
    }

    #[test]
    fn test_similarity_ordering() {
        let close = similarity("Opus One Napa Valley", "Opus One Napa");
        let far = similarity("Opus One Napa Valley", "Screaming Eagle");
        assert!(close > far);
        assert!(close > 0.6);
        assert!(far < 0.4);
    }

    #[test]
    fn test_phonetic_key_fixed_length() {
        assert_eq!(phonetic_key("Chateau Margaux").len(), 4);
        assert_eq!(phonetic_key("Ch. Margaux"), phonetic_key("Chateau Margaux"));
        assert_eq!(phonetic_key(""), "0000");
        assert_eq!(phonetic_key("2019"), "0000");
        // letterless text gets no phonetic bonus
        assert_eq!(similarity("425", "2019"), 0.0);
    }

    #[test]
    fn test_extract_vintage() {
        assert_eq!(extract_vintage("opus one 2019 425"), Some(2019));
        assert_eq!(extract_vintage("margaux 1949"), None);
        assert_eq!(extract_vintage("bin 12019"), None);
        assert_eq!(extract_vintage("no vintage"), None);
    }

    #[test]
    fn test_strip_numeric_tokens() {
        assert_eq!(strip_numeric_tokens("opus one 2019 425"), "opus one");
        assert_eq!(strip_numeric_tokens("750ml bottle"), "750ml bottle");
    }
}
