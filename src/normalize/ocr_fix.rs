//! OCR glyph confusion correction
//!
//! Runs on the raw recognizer output before case folding, since the digit and
//! letter look-alikes it repairs depend on the surrounding characters. Accents
//! are stripped first so corrections see the same base letters that later
//! stages do.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

use super::strip_diacritics;

/// Whole-word misreads that show up on printed wine lists
const WORD_MISREADS: &[(&str, &str)] = &[
    ("cabemet", "cabernet"),
    ("cabernct", "cabernet"),
    ("cabcrnet", "cabernet"),
    ("sauvlgnon", "sauvignon"),
    ("sauvignom", "sauvignon"),
    ("chardormay", "chardonnay"),
    ("chardomay", "chardonnay"),
    ("rnerlot", "merlot"),
    ("merlol", "merlot"),
    ("pinol", "pinot"),
    ("rnalbec", "malbec"),
    ("charnpagne", "champagne"),
    ("vvine", "wine"),
    ("vvinery", "winery"),
    ("vvines", "wines"),
    ("chatcau", "chateau"),
    ("dornaine", "domaine"),
    ("vintagc", "vintage"),
];

static MISREAD_LOOKUP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| WORD_MISREADS.iter().copied().collect());

static MISREAD_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = WORD_MISREADS
        .iter()
        .map(|(wrong, _)| regex::escape(wrong))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("misread table is a valid regex")
});

/// Letter a confusable digit stands for inside a word
fn letter_for(c: char) -> Option<char> {
    match c {
        '0' => Some('o'),
        '1' => Some('l'),
        '5' => Some('s'),
        '8' => Some('b'),
        _ => None,
    }
}

/// Digit a confusable letter stands for inside a number
fn digit_for(c: char) -> Option<char> {
    match c.to_ascii_lowercase() {
        'o' => Some('0'),
        'l' | 'i' => Some('1'),
        's' => Some('5'),
        'b' => Some('8'),
        _ => None,
    }
}

/// Correct common OCR glyph confusions.
///
/// - vintage-shaped tokens ("2O19", "l998") get look-alike letters mapped to digits
/// - digits sandwiched between letters ("B0rdeaux") become letters
/// - letters tripled by a doubled-glyph misread collapse to two
/// - a small table of whole-word misreads is repaired
/// - accents are dropped, case is kept
pub fn correct_ocr_errors(text: &str) -> String {
    let base = strip_diacritics(text);
    let fixed = fix_confusable_runs(&base);
    let collapsed = collapse_tripled_letters(&fixed);

    MISREAD_RE
        .replace_all(&collapsed, |caps: &Captures| {
            let matched = caps[0].to_lowercase();
            MISREAD_LOOKUP
                .get(matched.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Split into alphanumeric runs and repair each run in place
fn fix_confusable_runs(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let mut start = 0;

    while start < chars.len() {
        if !chars[start].is_alphanumeric() {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < chars.len() && chars[end].is_alphanumeric() {
            end += 1;
        }
        fix_run(&mut chars[start..end]);
        start = end;
    }

    chars.into_iter().collect()
}

fn fix_run(run: &mut [char]) {
    let digits = run.iter().filter(|c| c.is_ascii_digit()).count();
    let letters = run.len() - digits;

    if run.len() == 4 && digits >= 2 {
        let mapped: Option<Vec<char>> = run
            .iter()
            .map(|&c| if c.is_ascii_digit() { Some(c) } else { digit_for(c) })
            .collect();
        if let Some(mapped) = mapped {
            if matches!(mapped.first(), Some('1') | Some('2')) {
                run.copy_from_slice(&mapped);
            }
        }
        return;
    }

    if letters > digits && run.len() >= 3 {
        for i in 1..run.len() - 1 {
            if let Some(letter) = letter_for(run[i]) {
                if run[i - 1].is_alphabetic() && run[i + 1].is_alphabetic() {
                    run[i] = letter;
                }
            }
        }
    }
}

fn collapse_tripled_letters(text: &str) -> String {
    let mut out: Vec<char> = Vec::with_capacity(text.len());
    for c in text.chars() {
        let n = out.len();
        if c.is_alphabetic()
            && n >= 2
            && out[n - 1].to_lowercase().eq(c.to_lowercase())
            && out[n - 2].to_lowercase().eq(c.to_lowercase())
        {
            continue;
        }
        out.push(c);
    }
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vintage_lookalikes() {
        assert_eq!(correct_ocr_errors("Margaux 2O15"), "Margaux 2015");
        assert_eq!(correct_ocr_errors("l998"), "1998");
        assert_eq!(correct_ocr_errors("2OO9"), "2009");
    }

    #[test]
    fn test_non_vintage_numbers_untouched() {
        assert_eq!(correct_ocr_errors("750ml"), "750ml");
        assert_eq!(correct_ocr_errors("90s"), "90s");
        assert_eq!(correct_ocr_errors("SOLD"), "SOLD");
    }

    #[test]
    fn test_digits_inside_words() {
        assert_eq!(correct_ocr_errors("B0rdeaux"), "Bordeaux");
        assert_eq!(correct_ocr_errors("Ca8ernet"), "Cabernet");
        assert_eq!(correct_ocr_errors("Me1ot"), "Melot");
    }

    #[test]
    fn test_leading_digit_kept() {
        assert_eq!(correct_ocr_errors("1er Cru"), "1er Cru");
    }

    #[test]
    fn test_tripled_letters() {
        assert_eq!(correct_ocr_errors("Chardonnnay"), "Chardonnay");
        assert_eq!(correct_ocr_errors("Pinot Noirrr"), "Pinot Noirr");
    }

    #[test]
    fn test_word_misreads() {
        assert_eq!(correct_ocr_errors("Cabemet Sauvlgnon"), "cabernet sauvignon");
        assert_eq!(correct_ocr_errors("rnerlot"), "merlot");
    }

    #[test]
    fn test_accents_do_not_hide_misreads() {
        assert_eq!(correct_ocr_errors("Cuvéee"), "Cuvee");
        assert_eq!(correct_ocr_errors("Vvíne"), "wine");
        assert_eq!(correct_ocr_errors("a¹b"), "alb");
        assert_eq!(correct_ocr_errors("2Ó19"), "2019");
    }

    #[test]
    fn test_stable_on_clean_text() {
        let clean = "chateau margaux 2015 pauillac";
        assert_eq!(correct_ocr_errors(clean), clean);
    }
}
