//! Simplified Soundex-style phonetic keys

/// Length of every phonetic key
pub const KEY_LENGTH: usize = 4;

/// Key for text without letters; never counts as a phonetic agreement
pub const EMPTY_KEY: &str = "0000";

/// Digit class for a consonant; vowels and h/w/y have none
fn consonant_class(c: char) -> Option<char> {
    match c {
        // labials
        'b' | 'f' | 'p' | 'v' => Some('1'),
        // gutturals and sibilants
        'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
        // dentals
        'd' | 't' => Some('3'),
        // liquids
        'l' | 'r' => Some('4'),
        // nasals
        'm' | 'n' => Some('5'),
        _ => None,
    }
}

/// Encode already-normalized text.
///
/// The first ASCII letter is kept uppercased, following consonants become
/// digit classes with adjacent duplicates collapsed (vowels and word breaks
/// separate duplicates, h and w do not), and the result is padded with `0`.
/// Text without ASCII letters encodes to [`EMPTY_KEY`].
pub fn encode(normalized: &str) -> String {
    let mut chars = normalized.chars().skip_while(|c| !c.is_ascii_alphabetic());
    let Some(first) = chars.next() else {
        return EMPTY_KEY.to_string();
    };

    let mut key = String::with_capacity(KEY_LENGTH);
    key.push(first.to_ascii_uppercase());
    let mut last = consonant_class(first.to_ascii_lowercase());

    for c in chars {
        if key.len() == KEY_LENGTH {
            break;
        }
        let c = c.to_ascii_lowercase();
        match c {
            'h' | 'w' => continue,
            _ if !c.is_ascii_alphabetic() => last = None,
            _ => match consonant_class(c) {
                Some(class) if Some(class) != last => {
                    key.push(class);
                    last = Some(class);
                }
                Some(_) => {}
                None => last = None,
            },
        }
    }

    while key.len() < KEY_LENGTH {
        key.push('0');
    }
    key
}
