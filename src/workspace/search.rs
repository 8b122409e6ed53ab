//! Search configuration and result shape for workspace memory hybrid search.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub limit: usize,
    pub dense_weight: f32,
    pub lexical_weight: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            dense_weight: 0.6,
            lexical_weight: 0.4,
        }
    }
}

impl SearchConfig {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub score: f32,
    pub dense_score: Option<f32>,
    pub lexical_score: Option<f32>,
}

impl SearchResult {
    /// True if both the semantic and lexical passes contributed to this hit.
    pub fn is_hybrid(&self) -> bool {
        self.dense_score.is_some() && self.lexical_score.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_hybrid_requires_both_scores() {
        let mut result = SearchResult {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            content: "x".to_string(),
            score: 0.5,
            dense_score: Some(0.5),
            lexical_score: None,
        };
        assert!(!result.is_hybrid());
        result.lexical_score = Some(0.2);
        assert!(result.is_hybrid());
    }
}
