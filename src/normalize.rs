//! Deterministic address cleaning and pincode extraction.
//!
//! The same function is applied to both sides of every comparison
//! (canonical dataset and newly scraped dataset). Normalizing only one
//! side is a correctness bug, not a style choice, so callers go through
//! `normalize` and never re-implement pieces of it.

use crate::models::NormalizedAddress;
use regex::Regex;

/// Cleans a free-text address and pulls out its 6-digit pincode.
///
/// The cleaned text is lowercase, stripped of everything but letters,
/// digits and whitespace, with runs of whitespace collapsed to a single
/// space. The pincode is the first run of exactly six digits bounded by a
/// non-digit character or the string edge; a six-digit window inside a
/// longer digit run never matches.
pub fn normalize(address: &str) -> NormalizedAddress {
    if address.trim().is_empty() {
        return NormalizedAddress {
            cleaned_text: String::new(),
            pincode: String::new(),
        };
    }

    let lowered = address.to_lowercase();
    let pincode = extract_pincode(&lowered);

    let stripped = Regex::new(r"[^a-z0-9\s]")
        .unwrap()
        .replace_all(&lowered, "");
    let cleaned_text = Regex::new(r"\s+")
        .unwrap()
        .replace_all(stripped.trim(), " ")
        .into_owned();

    NormalizedAddress {
        cleaned_text,
        pincode,
    }
}

/// First maximal 6-digit run in the text, or empty when none exists.
pub fn extract_pincode(text: &str) -> String {
    // Word boundaries are not enough here: a pincode glued to letters
    // ("pin560001") must still match, while "12345678" must not.
    let re = Regex::new(r"(?:^|[^0-9])([0-9]{6})(?:[^0-9]|$)").unwrap();
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
