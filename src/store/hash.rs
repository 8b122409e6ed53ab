//! Content and identity hashing for documents.
//!
//! Both functions are pure and allocation-light: given the same inputs they always produce the
//! same digest, independent of process or machine. This is what makes dedupe idempotent across
//! runs.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash of the canonical document text, scoped to a search space. Identity for dedupe: two
/// documents with the same content hash in the same search space are the same document.
pub fn content_hash(canonical: &str, search_space_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(search_space_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of (document type, source-native id, search space). Identity for *updates*: re-ingesting
/// the same source item under a new content hash updates the existing row rather than inserting
/// a duplicate.
pub fn unique_identifier_hash(doc_type: &str, source_id: &str, search_space_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc_type.as_bytes());
    hasher.update(b"\0");
    hasher.update(source_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(search_space_id.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic() {
        let space = Uuid::new_v4();
        let a = content_hash("hello", space);
        let b = content_hash("hello", space);
        assert_eq!(a, b);
    }

    #[test]
    fn content_hash_differs_by_search_space() {
        let canonical = "hello";
        let a = content_hash(canonical, Uuid::new_v4());
        let b = content_hash(canonical, Uuid::new_v4());
        assert_ne!(a, b);
    }

    #[test]
    fn unique_identifier_hash_differs_by_type() {
        let space = Uuid::new_v4();
        let a = unique_identifier_hash("slack", "C123", space);
        let b = unique_identifier_hash("notion", "C123", space);
        assert_ne!(a, b);
    }

    #[test]
    fn unique_identifier_hash_is_stable() {
        let space = Uuid::new_v4();
        let a = unique_identifier_hash("github", "owner/repo#42", space);
        let b = unique_identifier_hash("github", "owner/repo#42", space);
        assert_eq!(a, b);
    }
}
