//! Semantic chunking: splits a document body into token-bounded windows, with a code-aware
//! variant that prefers splitting on top-level item boundaries first.

#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Target chunk size, in whitespace-delimited words (a stand-in for a tokenizer's tokens).
    pub target_size: usize,
    /// Overlap between consecutive chunks, in words.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_size: 400,
            overlap: 50,
        }
    }
}

/// Split `content` into overlapping word-windows of roughly `config.target_size` words.
pub fn chunk_document(content: &str, config: ChunkConfig) -> Vec<String> {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.is_empty() {
        return vec![];
    }
    if words.len() <= config.target_size {
        return vec![content.trim().to_string()];
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

/// Split source code on top-level item boundaries (`fn`, `class`, `def`, `function`, top-level
/// braces at column 0) before falling back to the generic word-window splitter for any
/// resulting piece still larger than `config.target_size`.
pub fn chunk_document_code_aware(content: &str, config: ChunkConfig) -> Vec<String> {
    let boundary_keywords = ["fn ", "pub fn ", "class ", "def ", "function ", "impl ", "struct "];

    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        let is_boundary = !current.trim().is_empty()
            && boundary_keywords.iter().any(|kw| line.starts_with(kw));
        if is_boundary {
            pieces.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }

    if pieces.is_empty() {
        return chunk_document(content, config);
    }

    pieces
        .into_iter()
        .flat_map(|piece| {
            if piece.split_whitespace().count() > config.target_size {
                chunk_document(&piece, config.clone())
            } else {
                vec![piece.trim().to_string()]
            }
        })
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_document_is_a_single_chunk() {
        let chunks = chunk_document("just a few words here", ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_document_splits_with_overlap() {
        let words: Vec<String> = (0..1000).map(|i| format!("word{i}")).collect();
        let content = words.join(" ");
        let config = ChunkConfig {
            target_size: 100,
            overlap: 10,
        };
        let chunks = chunk_document(&content, config);
        assert!(chunks.len() > 1);
        // Consecutive chunks share the overlap region.
        let first_tail: Vec<&str> = chunks[0].split_whitespace().rev().take(10).collect();
        let second_head: Vec<&str> = chunks[1].split_whitespace().take(10).collect();
        assert_eq!(
            first_tail.into_iter().rev().collect::<Vec<_>>(),
            second_head
        );
    }

    #[test]
    fn code_aware_splits_on_function_boundaries() {
        let src = "use std::io;\n\nfn one() {\n    1\n}\n\nfn two() {\n    2\n}\n";
        let chunks = chunk_document_code_aware(src, ChunkConfig::default());
        assert!(chunks.iter().any(|c| c.contains("fn one")));
        assert!(chunks.iter().any(|c| c.contains("fn two")));
    }
}
