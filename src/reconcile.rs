//! Reconciliation of a freshly scraped record set against a canonical one.
//!
//! Two independent strategies over the same inputs: an exact pincode-keyed
//! inner join (a deliberate cross-product within each pincode bucket) and a
//! MatchKey duplicate filter. A token-sort similarity score is attached to
//! joined pairs for manual triage; it never decides duplication on its own.
//!
//! Every invocation is a pure batch transform over two snapshots and is
//! idempotent given identical inputs.

use crate::normalize::{extract_pincode, normalize};
use std::collections::{HashMap, HashSet};

/// One (canonical, scraped) pair sharing a pincode.
#[derive(Debug, Clone, PartialEq)]
pub struct PincodeMatch {
    pub pincode: String,
    pub canonical_address: String,
    pub scraped_address: String,
    /// Token-sort similarity in [0, 100]; advisory only.
    pub similarity: u8,
}

#[derive(Debug, Clone)]
pub struct PincodeComparison {
    pub rows: Vec<PincodeMatch>,
    /// Summary metric: distinct pincodes present in both sets.
    pub distinct_pincodes: usize,
}

/// Inner join on pincode. Records without a pincode cannot contribute and
/// are excluded. Multiple branches sharing a postal code all pair with each
/// other; this is intentionally not a 1:1 match.
pub fn compare_by_pincode(canonical: &[String], scraped: &[String]) -> PincodeComparison {
    let mut canonical_by_pin: HashMap<String, Vec<&str>> = HashMap::new();
    for address in canonical {
        let pincode = extract_pincode(&address.to_lowercase());
        if !pincode.is_empty() {
            canonical_by_pin.entry(pincode).or_default().push(address);
        }
    }

    let mut rows = Vec::new();
    let mut matched_pins: HashSet<String> = HashSet::new();

    for address in scraped {
        let pincode = extract_pincode(&address.to_lowercase());
        if pincode.is_empty() {
            continue;
        }
        if let Some(canonical_addresses) = canonical_by_pin.get(&pincode) {
            matched_pins.insert(pincode.clone());
            for canonical_address in canonical_addresses {
                rows.push(PincodeMatch {
                    pincode: pincode.clone(),
                    canonical_address: canonical_address.to_string(),
                    scraped_address: address.clone(),
                    similarity: token_sort_ratio(canonical_address, address),
                });
            }
        }
    }

    PincodeComparison {
        rows,
        distinct_pincodes: matched_pins.len(),
    }
}

#[derive(Debug, Clone)]
pub struct DuplicateReport {
    /// Parallel to the scraped input: true where the record's MatchKey
    /// exists in the canonical set.
    pub is_duplicate: Vec<bool>,
    pub duplicate_count: usize,
    /// Indices of scraped records with no canonical match.
    pub unique_indices: Vec<usize>,
}

/// Flags scraped records whose MatchKey exactly equals a canonical one.
///
/// The key is built from fuzzy-cleaned text, but the comparison itself is
/// exact; near-misses are left for the similarity report.
pub fn find_duplicates(canonical: &[String], scraped: &[String]) -> DuplicateReport {
    let canonical_keys: HashSet<String> = canonical
        .iter()
        .map(|address| normalize(address).match_key())
        .collect();

    let mut is_duplicate = Vec::with_capacity(scraped.len());
    let mut unique_indices = Vec::new();
    let mut duplicate_count = 0;

    for (idx, address) in scraped.iter().enumerate() {
        let dup = canonical_keys.contains(&normalize(address).match_key());
        if dup {
            duplicate_count += 1;
        } else {
            unique_indices.push(idx);
        }
        is_duplicate.push(dup);
    }

    DuplicateReport {
        is_duplicate,
        duplicate_count,
        unique_indices,
    }
}

/// Token-sort similarity in [0, 100]: both strings are cleaned, their word
/// tokens sorted independently and rejoined, then compared with a
/// normalized edit-distance ratio. Word order does not affect the score.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let sorted_a = sorted_tokens(a);
    let sorted_b = sorted_tokens(b);
    if sorted_a.is_empty() && sorted_b.is_empty() {
        return 0;
    }
    (strsim::normalized_levenshtein(&sorted_a, &sorted_b) * 100.0).round() as u8
}

fn sorted_tokens(s: &str) -> String {
    let cleaned = normalize(s).cleaned_text;
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scenario_from_field_data() {
        let canonical = owned(&["12, MG Road, Pune 411001"]);
        let scraped = owned(&["12 mg road pune 411001", "Unrelated Rd 560001"]);

        let report = find_duplicates(&canonical, &scraped);
        assert_eq!(report.is_duplicate, vec![true, false]);
        assert_eq!(report.duplicate_count, 1);
        assert_eq!(report.unique_indices, vec![1]);
    }

    #[test]
    fn swapping_roles_flags_the_other_set() {
        let canonical = owned(&[
            "12, MG Road, Pune 411001",
            "5 Park St Kolkata 700016",
            "1 Ring Rd Delhi 110001",
            "77 Hill View Shimla 171001",
        ]);
        let scraped = owned(&[
            "12 mg road pune 411001",
            "5 park st kolkata 700016",
            "9 Lake Rd Bhopal 462001",
        ]);

        let forward = find_duplicates(&canonical, &scraped);
        assert_eq!(forward.duplicate_count, 2);
        assert_eq!(forward.unique_indices, vec![2]);

        let reversed = find_duplicates(&scraped, &canonical);
        assert_eq!(reversed.duplicate_count, 2);
        // The two canonical-only records plus the two overlaps swap roles.
        assert_eq!(reversed.unique_indices, vec![2, 3]);
    }

    #[test]
    fn records_without_pincode_are_excluded_from_join() {
        let canonical = owned(&["MG Road Pune 411001", "No Pincode Street"]);
        let scraped = owned(&["FC Road Pune 411001", "Another Missing Pin"]);

        let cmp = compare_by_pincode(&canonical, &scraped);
        assert_eq!(cmp.rows.len(), 1);
        assert_eq!(cmp.rows[0].pincode, "411001");
        assert_eq!(cmp.distinct_pincodes, 1);
    }

    #[test]
    fn join_is_a_cross_product_within_a_bucket() {
        let canonical = owned(&["A 411001", "B 411001"]);
        let scraped = owned(&["C 411001", "D 411001", "E 560001"]);

        let cmp = compare_by_pincode(&canonical, &scraped);
        // 2 canonical x 2 scraped in the 411001 bucket.
        assert_eq!(cmp.rows.len(), 4);
        assert_eq!(cmp.distinct_pincodes, 1);
    }

    #[test]
    fn token_sort_ignores_word_order() {
        let a = "MG Road 12 Pune 411001";
        let b = "12, MG Road, Pune 411001";
        assert_eq!(token_sort_ratio(a, b), 100);
    }

    #[test]
    fn token_sort_scores_dissimilar_addresses_low() {
        let score = token_sort_ratio("12 MG Road Pune", "99 Beach House Goa");
        assert!(score < 50, "expected low score, got {}", score);
    }

    #[test]
    fn token_sort_handles_empty_input() {
        assert_eq!(token_sort_ratio("", ""), 0);
        assert_eq!(token_sort_ratio("something", ""), 0);
    }
}
