//! Canonical document construction: the deterministic wrapper that is both the hash input and
//! the text handed to the summarizer.

use std::collections::BTreeMap;

/// An item ready to be ingested, already normalized by its connector or upload handler.
#[derive(Debug, Clone)]
pub struct CanonicalDocument {
    pub title: String,
    pub document_type: String,
    /// Stable source-native id, when the source has one (absent for e.g. ad-hoc crawled URLs
    /// without a canonical id).
    pub source_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub body_markdown: String,
}

impl CanonicalDocument {
    pub fn new(
        title: impl Into<String>,
        document_type: impl Into<String>,
        body_markdown: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            document_type: document_type.into(),
            source_id: None,
            metadata: BTreeMap::new(),
            body_markdown: body_markdown.into(),
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Render the `<DOCUMENT><METADATA>...</METADATA><CONTENT>...</CONTENT></DOCUMENT>` wrapper.
    /// `BTreeMap` keeps metadata key order sorted so the output is byte-stable regardless of
    /// insertion order — this is what makes the content hash derived from it stable.
    pub fn render(&self) -> String {
        let mut metadata_block = String::new();
        metadata_block.push_str(&format!("TITLE: {}\n", self.title));
        metadata_block.push_str(&format!("TYPE: {}\n", self.document_type));
        if let Some(ref id) = self.source_id {
            metadata_block.push_str(&format!("SOURCE_ID: {}\n", id));
        }
        for (key, value) in &self.metadata {
            metadata_block.push_str(&format!("{}: {}\n", key, value));
        }

        format!(
            "<DOCUMENT><METADATA>\n{}</METADATA><CONTENT>\n{}\n</CONTENT></DOCUMENT>",
            metadata_block, self.body_markdown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_stable_regardless_of_insertion_order() {
        let a = CanonicalDocument::new("Plan", "SLACK_CONNECTOR", "body")
            .with_metadata("channel", "general")
            .with_metadata("author", "alice");
        let b = CanonicalDocument::new("Plan", "SLACK_CONNECTOR", "body")
            .with_metadata("author", "alice")
            .with_metadata("channel", "general");
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn render_wraps_metadata_and_content() {
        let doc = CanonicalDocument::new("Title", "FILE", "hello world");
        let rendered = doc.render();
        assert!(rendered.starts_with("<DOCUMENT><METADATA>"));
        assert!(rendered.contains("<CONTENT>\nhello world\n</CONTENT></DOCUMENT>"));
    }
}
