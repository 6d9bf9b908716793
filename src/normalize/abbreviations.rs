//! Wine list abbreviation dictionary
//!
//! Ordered pattern -> replacement table. Entries are matched against whole
//! tokens, longest key first, so "cab franc" wins over "cab". Extend the table
//! rather than the matching code. No replacement may itself be a key.

use once_cell::sync::Lazy;
use regex::Regex;

/// Category of an abbreviation entry, also used by the admission filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Producer,
    Grape,
    Quality,
    Region,
}

pub(crate) const ABBREVIATIONS: &[(&str, &str, TermKind)] = &[
    // Producer prefixes
    ("ch", "chateau", TermKind::Producer),
    ("chat", "chateau", TermKind::Producer),
    ("cht", "chateau", TermKind::Producer),
    ("dom", "domaine", TermKind::Producer),
    ("dne", "domaine", TermKind::Producer),
    ("est", "estate", TermKind::Producer),
    ("wnry", "winery", TermKind::Producer),
    ("vyd", "vineyard", TermKind::Producer),
    ("vnyd", "vineyard", TermKind::Producer),
    ("vyds", "vineyards", TermKind::Producer),
    ("bros", "brothers", TermKind::Producer),
    ("mt", "mount", TermKind::Producer),
    ("st", "saint", TermKind::Producer),
    ("ste", "sainte", TermKind::Producer),
    ("sta", "santa", TermKind::Producer),
    // Grape varieties
    ("cab sauv", "cabernet sauvignon", TermKind::Grape),
    ("cab franc", "cabernet franc", TermKind::Grape),
    ("cab", "cabernet sauvignon", TermKind::Grape),
    ("cs", "cabernet sauvignon", TermKind::Grape),
    ("sauv blanc", "sauvignon blanc", TermKind::Grape),
    ("sauv blc", "sauvignon blanc", TermKind::Grape),
    ("sb", "sauvignon blanc", TermKind::Grape),
    ("pn", "pinot noir", TermKind::Grape),
    ("pg", "pinot grigio", TermKind::Grape),
    ("chard", "chardonnay", TermKind::Grape),
    ("zin", "zinfandel", TermKind::Grape),
    ("gsm", "grenache syrah mourvedre", TermKind::Grape),
    ("gewurz", "gewurztraminer", TermKind::Grape),
    // Quality terms
    ("res", "reserve", TermKind::Quality),
    ("rsv", "reserve", TermKind::Quality),
    ("resv", "reserve", TermKind::Quality),
    ("gr cru", "grand cru", TermKind::Quality),
    ("gc", "grand cru", TermKind::Quality),
    ("1er cru", "premier cru", TermKind::Quality),
    ("prem cru", "premier cru", TermKind::Quality),
    ("1er", "premier", TermKind::Quality),
    ("vv", "vieilles vignes", TermKind::Quality),
    ("lbv", "late bottled vintage", TermKind::Quality),
    // Regions
    ("cdp", "chateauneuf du pape", TermKind::Region),
    ("cdr", "cotes du rhone", TermKind::Region),
    ("bdx", "bordeaux", TermKind::Region),
    ("burg", "burgundy", TermKind::Region),
    ("rrv", "russian river valley", TermKind::Region),
    ("wv", "willamette valley", TermKind::Region),
    ("nz", "new zealand", TermKind::Region),
];

struct Abbreviation {
    key: Vec<&'static str>,
    replacement: &'static str,
}

static TABLE: Lazy<Vec<Abbreviation>> = Lazy::new(|| {
    let mut table: Vec<Abbreviation> = ABBREVIATIONS
        .iter()
        .map(|(key, replacement, _)| Abbreviation {
            key: key.split_whitespace().collect(),
            replacement: *replacement,
        })
        .collect();
    // Longest match first; the sort is stable so declared order breaks ties
    table.sort_by(|a, b| {
        b.key
            .len()
            .cmp(&a.key.len())
            .then_with(|| b.char_len().cmp(&a.char_len()))
    });
    table
});

impl Abbreviation {
    fn char_len(&self) -> usize {
        self.key.iter().map(|t| t.len()).sum()
    }
}

/// Word tokens, keeping a leading apostrophe (vintage shorthand) and bare ampersands
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"['’‘`]?[^\W_]+|&").expect("token regex is valid"));

static VINTAGE_SHORTHAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^['’‘`](\d{2})$").expect("vintage shorthand regex is valid"));

/// Split folded text into the tokens the expansion table works on
pub(crate) fn tokenize(text: &str) -> Vec<&str> {
    TOKEN_RE.find_iter(text).map(|m| m.as_str()).collect()
}

fn bare(token: &str) -> &str {
    token.trim_start_matches(|c| matches!(c, '\'' | '’' | '‘' | '`'))
}

/// Expand a two-digit vintage token such as `'98` to its full year.
///
/// Years above 50 land in the 1900s, the rest in the 2000s.
pub fn expand_vintage_shorthand(token: &str) -> Option<u16> {
    let caps = VINTAGE_SHORTHAND_RE.captures(token)?;
    let yy: u16 = caps[1].parse().ok()?;
    Some(if yy > 50 { 1900 + yy } else { 2000 + yy })
}

/// Expand abbreviations and vintage shorthand token by token.
///
/// Input must already be lowercased and diacritic folded.
pub fn expand_abbreviations(text: &str) -> String {
    let tokens = tokenize(text);
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if let Some(year) = expand_vintage_shorthand(tokens[i]) {
            out.push(year.to_string());
            i += 1;
            continue;
        }

        let matched = TABLE.iter().find(|abbr| {
            abbr.key.len() <= tokens.len() - i
                && abbr
                    .key
                    .iter()
                    .zip(&tokens[i..])
                    .all(|(k, t)| bare(t) == *k)
        });

        match matched {
            Some(abbr) => {
                out.push(abbr.replacement.to_string());
                i += abbr.key.len();
            }
            None => {
                out.push(tokens[i].to_string());
                i += 1;
            }
        }
    }

    out.join(" ")
}

/// Look up the category of a fully expanded term
pub fn term_kind(term: &str) -> Option<TermKind> {
    ABBREVIATIONS
        .iter()
        .find(|(_, replacement, _)| *replacement == term)
        .map(|(_, _, kind)| *kind)
}
