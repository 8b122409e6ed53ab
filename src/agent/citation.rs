//! Parsing and validation for `[citation:<chunk_id>]` tokens emitted by the model.

use std::collections::HashSet;

use regex::Regex;
use std::sync::LazyLock;

static CITATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[citation:(\d+)\]").expect("static citation regex"));

/// Every `chunk_id` referenced by a `[citation:id]` token in `text`, in order of first
/// appearance, duplicates removed.
pub fn extract_citations(text: &str) -> Vec<u64> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for capture in CITATION_PATTERN.captures_iter(text) {
        if let Ok(id) = capture[1].parse::<u64>() {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Citations present in `text` that do not correspond to any id in `valid_ids` — the model
/// hallucinated a reference that wasn't in this turn's retrieval context.
pub fn invalid_citations(text: &str, valid_ids: &HashSet<u64>) -> Vec<u64> {
    extract_citations(text)
        .into_iter()
        .filter(|id| !valid_ids.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_unique_ids_in_order() {
        let text = "First [citation:3] then [citation:1] then [citation:3] again.";
        assert_eq!(extract_citations(text), vec![3, 1]);
    }

    #[test]
    fn flags_ids_outside_the_valid_set() {
        let valid: HashSet<u64> = [1, 2].into_iter().collect();
        let text = "[citation:1] and [citation:99]";
        assert_eq!(invalid_citations(text, &valid), vec![99]);
    }

    #[test]
    fn text_without_citations_is_empty() {
        assert!(extract_citations("no citations here").is_empty());
    }
}
