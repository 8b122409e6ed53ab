//! Word-window chunking for memory documents, mirroring `embedding::chunking` but kept
//! independent since workspace documents are prose (MEMORY.md, daily logs) rather than the
//! ingestion pipeline's canonical-wrapped documents.

#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub target_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_size: 300,
            overlap: 40,
        }
    }
}

pub fn chunk_document(content: &str, config: ChunkConfig) -> Vec<String> {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if words.len() <= config.target_size {
        return vec![content.to_string()];
    }

    let stride = config.target_size.saturating_sub(config.overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + config.target_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_a_single_chunk() {
        let chunks = chunk_document("hello world", ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_content_splits_with_overlap() {
        let content = (0..1000).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_document(&content, ChunkConfig::default());
        assert!(chunks.len() > 1);
    }
}
