//! A pared-down emulation of `LCMapStringEx`'s sort-key transform, used by
//! [`crate::esedb::index`] to normalize text before encoding it into an
//! index key.
//!
//! The real Windows collation tables are a ~65536-entry weight table keyed
//! by Unicode codepoint, covering every script Windows ships a locale for.
//! That table is not reproduced here — only Latin, Greek, Cyrillic, ASCII
//! punctuation/symbols, and digits are classified; every other script
//! raises [`EseError::UnsupportedCharacter`]. Within the covered scripts,
//! codepoint order is preserved (case folds to the same primary weight,
//! recorded separately in the case stream; accents on Latin-1 letters fold
//! to the same base-letter primary weight, recorded separately in the
//! diacritic stream), which is sufficient to reproduce the relative
//! ordering secondary indexes rely on but is not byte-identical to a real
//! `LCMapStringEx` sort key (the per-codepoint weight *values* are this
//! module's own invention, not the real NLS sorting table).

use bitflags::bitflags;

use crate::error::{EseError, Result};

const SYMBOL_BASE: u16 = 0x0000;
const DIGIT_BASE: u16 = 0x1000;
const LETTER_BASE: u16 = 0x2000;
const GREEK_BASE: u16 = 0x3000;
const CYRILLIC_BASE: u16 = 0x4000;

/// Baseline ("insignificant") weight for the diacritic/case streams. A
/// trailing run of weights at or below this value carries no information
/// and is trimmed by [`filter_weights`], mirroring `LCMapStringEx`'s own
/// sort-key compression.
const WEIGHT_BASELINE: u8 = 2;

/// Case weight for a character with no case of its own (digits, symbols,
/// lowercase Latin letters — lowercase is the unmarked case in this table,
/// matching the real `CASE_UPPER` bit only being set for uppercase forms).
const CASE_NONE: u8 = 0;
/// Case weight marking an uppercase letter (stands in for the real
/// `CASE.UPPER` bit, 0x10).
const CASE_UPPER: u8 = 0x10;

bitflags! {
    /// The subset of `LCMapStringEx`'s `dwMapFlags` this module understands.
    /// Every other flag (width/kana compression, linguistic casing,
    /// Hiragana/Katakana mapping, ...) has no effect because this table
    /// only classifies scripts that don't carry that distinction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SortFlags: u32 {
        const NORM_IGNORECASE = 0x0000_0001;
        const NORM_IGNORENONSPACE = 0x0000_0002;
        const NORM_IGNOREWIDTH = 0x0002_0000;
        const NORM_IGNOREKANATYPE = 0x0001_0000;
    }
}

/// Build a comparable sort key for `text` under `flags`: primary
/// (case/accent-folded) weights, a `0x01` separator, the diacritic stream,
/// another `0x01`, the case stream, then the container's fixed
/// `0x01 0x00` trailer (the real format's empty "extra"/"special" streams).
pub fn sort_key(text: &str, flags: SortFlags) -> Result<Vec<u8>> {
    let mut primary = Vec::with_capacity(text.len() * 2);
    let mut diacritic = Vec::with_capacity(text.len());
    let mut case = Vec::with_capacity(text.len());

    let mut case_mask = 0xFFu8;
    if flags.contains(SortFlags::NORM_IGNORECASE) {
        case_mask &= !CASE_UPPER;
    }
    // NORM_IGNOREWIDTH / NORM_IGNOREKANATYPE have no effect: this table
    // never assigns width or kana weight bits to begin with.

    for ch in text.chars() {
        let (weight, diacritic_weight, case_weight) = classify(ch)?;
        primary.extend_from_slice(&weight.to_be_bytes());
        diacritic.push(diacritic_weight);
        case.push(case_weight & case_mask);
    }

    let diacritic = if flags.contains(SortFlags::NORM_IGNORENONSPACE) {
        Vec::new()
    } else {
        filter_weights(&diacritic)
    };
    let case = if flags.intersects(SortFlags::NORM_IGNORECASE | SortFlags::NORM_IGNOREWIDTH) {
        Vec::new()
    } else {
        filter_weights(&case)
    };

    let mut key = primary;
    key.push(0x01);
    key.extend(diacritic);
    key.push(0x01);
    key.extend(case);
    key.push(0x01);
    key.push(0x01);
    key.push(0x00);
    Ok(key)
}

/// Drop a trailing run of weights at or below [`WEIGHT_BASELINE`] — they
/// carry no collation information, the same trim `LCMapStringEx` applies
/// before emitting the diacritic/case streams.
fn filter_weights(weights: &[u8]) -> Vec<u8> {
    let mut end = weights.len();
    while end > 0 && weights[end - 1] <= WEIGHT_BASELINE {
        end -= 1;
    }
    weights[..end].to_vec()
}

/// Classify one character into `(primary weight, diacritic weight, case
/// weight)`. Plain letters/digits/symbols get the baseline diacritic
/// weight (trimmed away unless something non-baseline follows); accented
/// Latin-1 letters get a distinct non-baseline diacritic weight so the
/// diacritic stream actually carries their accent.
fn classify(ch: char) -> Result<(u16, u8, u8)> {
    match ch {
        '0'..='9' => Ok((
            DIGIT_BASE + (ch as u16 - '0' as u16),
            WEIGHT_BASELINE,
            CASE_NONE,
        )),
        'A'..='Z' => Ok((
            LETTER_BASE + (ch as u16 - 'A' as u16) * 2,
            WEIGHT_BASELINE,
            CASE_UPPER,
        )),
        'a'..='z' => Ok((
            LETTER_BASE + (ch.to_ascii_uppercase() as u16 - 'A' as u16) * 2,
            WEIGHT_BASELINE,
            CASE_NONE,
        )),
        '\u{00C0}'..='\u{00FF}' if ch != '\u{00D7}' && ch != '\u{00F7}' => {
            classify_latin1_letter(ch)
        }
        '\u{0370}'..='\u{03FF}' => Ok((
            GREEK_BASE + (ch as u16 - 0x0370),
            WEIGHT_BASELINE,
            CASE_NONE,
        )),
        '\u{0400}'..='\u{04FF}' => Ok((
            CYRILLIC_BASE + (ch as u16 - 0x0400),
            WEIGHT_BASELINE,
            CASE_NONE,
        )),
        _ if ch.is_ascii() => classify_ascii_symbol(ch),
        _ => Err(EseError::UnsupportedCharacter(format!(
            "U+{:04X}",
            ch as u32
        ))),
    }
}

/// Fold an accented Latin-1 letter onto its base letter's primary weight,
/// carrying the accent itself as a distinct diacritic weight (above
/// [`WEIGHT_BASELINE`]) so it survives the diacritic stream's trailing
/// trim instead of disappearing into the primary weight.
fn classify_latin1_letter(ch: char) -> Result<(u16, u8, u8)> {
    const UPPER_BASES: &str = "AAAAAAACEEEEIIIIDNOOOOO\u{0}OUUUUYTS";
    const LOWER_BASES: &str = "aaaaaaaceeeeiiiidnooooo\u{0}ouuuuyty";

    let code = ch as u32;
    let (table, case_weight, start) = if (0x00C0..=0x00DE).contains(&code) {
        (UPPER_BASES, CASE_UPPER, 0x00C0u32)
    } else {
        (LOWER_BASES, CASE_NONE, 0x00DFu32)
    };

    let idx = (code - start) as usize;
    let base = table
        .chars()
        .nth(idx)
        .filter(|&b| b != '\u{0}')
        .ok_or_else(|| EseError::UnsupportedCharacter(format!("U+{:04X}", code)))?;

    let (base_weight, _, _) = classify(base.to_ascii_uppercase())?;
    let diacritic_weight = WEIGHT_BASELINE + 1 + (idx as u8 & 0x01);
    Ok((base_weight, diacritic_weight, case_weight))
}

fn classify_ascii_symbol(ch: char) -> Result<(u16, u8, u8)> {
    let class: u16 = match ch {
        '!'..='/' => 1,
        ':'..='@' => 2,
        '['..='`' => 3,
        '{'..='~' => 4,
        ' ' => 0,
        _ => {
            return Err(EseError::UnsupportedCharacter(format!(
                "U+{:04X}",
                ch as u32
            )))
        }
    };
    Ok((
        SYMBOL_BASE + class * 0x100 + ch as u16,
        WEIGHT_BASELINE,
        CASE_NONE,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(key: &[u8], n: usize) -> Vec<u8> {
        let mut parts = key.split(|&b| b == 0x01);
        parts.nth(n).unwrap().to_vec()
    }

    #[test]
    fn emits_the_four_part_container() {
        let key = sort_key("a", SortFlags::empty()).unwrap();
        // primary(2) 0x01 diacritic(0, trimmed) 0x01 case(0, trimmed) 0x01 0x01 0x00
        assert_eq!(key, vec![0x20, 0x00, 0x01, 0x01, 0x01, 0x01, 0x00]);
    }

    #[test]
    fn case_folds_to_same_primary_weight() {
        let upper = sort_key("A", SortFlags::empty()).unwrap();
        let lower = sort_key("a", SortFlags::empty()).unwrap();
        let sep = upper.iter().position(|&b| b == 0x01).unwrap();
        assert_eq!(upper[..sep], lower[..sep]);
        assert_ne!(upper, lower);
    }

    #[test]
    fn ignore_case_flag_drops_the_case_stream() {
        let upper = sort_key("A", SortFlags::NORM_IGNORECASE).unwrap();
        let lower = sort_key("a", SortFlags::NORM_IGNORECASE).unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn accented_letter_carries_a_diacritic_weight() {
        let key = sort_key("e", SortFlags::empty()).unwrap();
        let accented = sort_key("\u{00E9}", SortFlags::empty()).unwrap(); // "é"
        let sep = key.iter().position(|&b| b == 0x01).unwrap();
        // Same base-letter primary weight as plain "e"...
        assert_eq!(key[..sep], accented[..sep]);
        // ...but the diacritic stream is non-empty only for the accented form.
        assert_eq!(stream(&key, 1), Vec::<u8>::new());
        assert_ne!(stream(&accented, 1), Vec::<u8>::new());
    }

    #[test]
    fn preserves_alphabetic_order() {
        assert!(
            sort_key("abc", SortFlags::empty()).unwrap() < sort_key("abd", SortFlags::empty()).unwrap()
        );
        assert!(
            sort_key("ab", SortFlags::empty()).unwrap() < sort_key("abc", SortFlags::empty()).unwrap()
        );
    }

    #[test]
    fn unsupported_script_errors() {
        assert!(matches!(
            sort_key("\u{6F22}", SortFlags::empty()),
            Err(EseError::UnsupportedCharacter(_))
        ));
    }

    #[test]
    fn greek_and_cyrillic_are_classified() {
        assert!(sort_key("\u{03B1}", SortFlags::empty()).is_ok());
        assert!(sort_key("\u{0430}", SortFlags::empty()).is_ok());
    }
}
