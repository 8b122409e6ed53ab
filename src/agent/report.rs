//! Markdown report generation: single-shot for new reports, section-level diffing for
//! revisions (falling back to a full rewrite when the plan touches every section).

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AgentError;
use crate::llm::{ChatMessage, CompletionRequest, LlmRouter};
use crate::retrieval::{RetrievalEngine, RetrievalMode, SearchRequest};
use crate::store::{Report, Repository};

const REPORT_FOOTER: &str = "Generated by the research assistant.";

const FORMATTING_RULES: &str = "Output raw Markdown. Do not wrap the whole report in a code \
fence. Use fenced code blocks for embedded code samples only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStrategy {
    Provided,
    Conversation,
    KbSearch,
    Auto,
}

impl SourceStrategy {
    pub fn parse(s: &str) -> Self {
        match s {
            "kb_search" => Self::KbSearch,
            "auto" => Self::Auto,
            "conversation" => Self::Conversation,
            _ => Self::Provided,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStyle {
    Brief,
    Detailed,
    DeepResearch,
}

impl ReportStyle {
    pub fn parse(s: &str) -> Self {
        match s {
            "brief" => Self::Brief,
            "deep_research" => Self::DeepResearch,
            _ => Self::Detailed,
        }
    }

    fn length_instruction(self) -> &'static str {
        match self {
            Self::Brief => "Keep the report to roughly 500 words. Prioritize brevity.",
            Self::Detailed | Self::DeepResearch => "",
        }
    }
}

pub struct GenerateReportRequest {
    pub search_space_id: Uuid,
    pub topic: String,
    pub source_content: String,
    pub source_strategy: SourceStrategy,
    pub search_queries: Vec<String>,
    pub style: ReportStyle,
    pub user_instructions: Option<String>,
    pub parent_report_id: Option<Uuid>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ReportMetadata {
    pub word_count: usize,
    pub char_count: usize,
    pub section_count: usize,
}

pub struct GeneratedReport {
    pub report: Report,
    pub metadata: ReportMetadata,
    pub is_revision: bool,
}

#[derive(Debug, Clone)]
struct Section {
    heading: String,
    body: String,
}

pub struct ReportGenerator {
    repo: Arc<Repository>,
    llm: Arc<LlmRouter>,
    retrieval: Arc<RetrievalEngine>,
}

impl ReportGenerator {
    pub fn new(repo: Arc<Repository>, llm: Arc<LlmRouter>, retrieval: Arc<RetrievalEngine>) -> Self {
        Self { repo, llm, retrieval }
    }

    pub async fn generate(&self, request: GenerateReportRequest) -> Result<GeneratedReport, AgentError> {
        let mut source = request.source_content.clone();

        let needs_kb_search = match request.source_strategy {
            SourceStrategy::KbSearch => true,
            SourceStrategy::Auto => source.split_whitespace().count() < 200,
            SourceStrategy::Provided | SourceStrategy::Conversation => false,
        };

        if needs_kb_search && !request.search_queries.is_empty() {
            let kb_text = self.search_knowledge_base(request.search_space_id, &request.search_queries).await;
            if !kb_text.is_empty() {
                if source.trim().is_empty() {
                    source = kb_text;
                } else {
                    source = format!("{source}\n\n--- Knowledge Base Search Results ---\n\n{kb_text}");
                }
            }
        }
        let source: String = source.chars().take(100_000).collect();

        let parent = match request.parent_report_id {
            Some(id) => Some(self.repo.get_report(id).await?),
            None => None,
        };

        let (content, is_revision) = if let Some(parent) = &parent {
            let revised = self
                .revise_with_sections(&request, &parent.content, &source)
                .await?;
            match revised {
                Some(content) => (content, true),
                None => (self.full_revision(&request, &parent.content, &source).await?, true),
            }
        } else {
            (self.single_shot(&request, &source).await?, false)
        };

        let content = strip_wrapping_code_fences(&content);
        let content = strip_existing_footer(&content);
        let content = format!("{content}\n\n---\n\n{REPORT_FOOTER}");
        let metadata = extract_metadata(&content);

        let report_group_id = parent.as_ref().map(|p| p.report_group_id).unwrap_or_else(Uuid::new_v4);
        let report = Report {
            id: Uuid::new_v4(),
            report_group_id,
            search_space_id: request.search_space_id,
            title: request.topic,
            content,
            created_at: chrono::Utc::now(),
        };
        self.repo.insert_report(&report).await?;

        Ok(GeneratedReport {
            report,
            metadata,
            is_revision,
        })
    }

    async fn search_knowledge_base(&self, search_space_id: Uuid, queries: &[String]) -> String {
        let mut parts = Vec::new();
        for query in queries.iter().take(5) {
            let result = self
                .retrieval
                .search(SearchRequest {
                    user_id: "",
                    search_space_id,
                    query,
                    top_k: 10,
                    mode: RetrievalMode::Chunks,
                    enabled_document_types: None,
                    web_providers: vec![],
                })
                .await;
            if let Ok(result) = result {
                for chunk in &result.citable_chunks {
                    parts.push(chunk.content.clone());
                }
            }
        }
        parts.join("\n\n---\n\n")
    }

    async fn single_shot(&self, request: &GenerateReportRequest, source: &str) -> Result<String, AgentError> {
        let instructions = request
            .user_instructions
            .as_deref()
            .map(|i| format!("Additional instructions: {i}"))
            .unwrap_or_default();

        let prompt = format!(
            "You are an expert report writer. Generate a comprehensive Markdown report.\n\n\
             Topic: {topic}\n{instructions}\n\nSource content:\n{source}\n\n---\n\n{length}\n\n\
             Write a well-structured report with a title, executive summary, organized sections, \
             and conclusion.\n\n{rules}",
            topic = request.topic,
            length = request.style.length_instruction(),
            rules = FORMATTING_RULES,
        );
        self.complete(&request.model, prompt).await
    }

    async fn full_revision(
        &self,
        request: &GenerateReportRequest,
        existing: &str,
        source: &str,
    ) -> Result<String, AgentError> {
        let instructions = request
            .user_instructions
            .clone()
            .unwrap_or_else(|| "Improve and refine the report.".to_string());

        let prompt = format!(
            "You are an expert report editor. Apply only the requested changes, do not rewrite \
             from scratch.\n\nTopic: {topic}\nModification instructions: {instructions}\n\n\
             Source content (use if relevant):\n{source}\n\n---\n\nExisting report:\n\n{existing}\
             \n\n---\n\n{length}\n\nPreserve all structure not affected by the modification.\n\n{rules}",
            topic = request.topic,
            length = request.style.length_instruction(),
            rules = FORMATTING_RULES,
        );
        self.complete(&request.model, prompt).await
    }

    /// Attempts section-level revision; returns `None` to signal the caller should fall back
    /// to a full rewrite (too few sections, the plan touches every section, or the plan LLM
    /// call failed to parse).
    async fn revise_with_sections(
        &self,
        request: &GenerateReportRequest,
        existing: &str,
        source: &str,
    ) -> Result<Option<String>, AgentError> {
        let sections = parse_sections(existing);
        if sections.len() < 2 {
            return Ok(None);
        }

        let instructions = request
            .user_instructions
            .clone()
            .unwrap_or_else(|| "Improve and refine the report.".to_string());

        let listing = sections
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{i}] {}\n    {}", if s.heading.is_empty() { "(preamble)" } else { &s.heading }, preview(&s.body, 200)))
            .collect::<Vec<_>>()
            .join("\n");

        let plan_prompt = format!(
            "Determine which sections of this report need modification, addition, or removal \
             to satisfy the request.\n\nRequest: {instructions}\n\nSections:\n{listing}\n\n\
             Respond with JSON: {{\"modify\": [indices], \"add\": [{{\"after_index\": n, \
             \"heading\": \"...\", \"description\": \"...\"}}], \"remove\": [indices]}}. \
             If the change is global, include every index in modify."
        );

        let plan_response = self.complete(&request.model, plan_prompt).await?;
        let plan: RevisionPlan = match extract_json(&plan_response).and_then(|j| serde_json::from_str(j).ok()) {
            Some(plan) => plan,
            None => return Ok(None),
        };

        if plan.modify.len() + plan.remove.len() >= sections.len() {
            return Ok(None);
        }

        let mut revised = sections.clone();

        for &idx in &plan.modify {
            if idx >= sections.len() {
                continue;
            }
            let section = &sections[idx];
            let context = section_context(&sections, idx);
            let section_text = if section.heading.is_empty() {
                section.body.clone()
            } else {
                format!("{}\n\n{}", section.heading, section.body)
            };

            let revise_prompt = format!(
                "Revise only this section based on the instructions. If they don't apply, \
                 return it unchanged.\n\nInstructions: {instructions}\n\nSection:\n{section_text}\
                 \n\nSurrounding context (for coherence only, do not output it):\n{context}\n\n\
                 Source content:\n{}\n\n---\n\nKeep the same heading and level.\n\n{rules}",
                preview(source, 40_000),
                rules = FORMATTING_RULES,
            );
            let revised_text = self.complete(&request.model, revise_prompt).await?;
            let revised_text = strip_wrapping_code_fences(&revised_text);
            revised[idx] = parse_sections(&revised_text)
                .into_iter()
                .next()
                .unwrap_or(Section {
                    heading: section.heading.clone(),
                    body: revised_text,
                });
        }

        let mut additions = plan.add.clone();
        additions.sort_by(|a, b| b.after_index.cmp(&a.after_index));
        for addition in additions {
            let context = section_context(&revised, addition.after_index);
            let new_prompt = format!(
                "Write a new report section to insert.\n\nTopic: {topic}\nHeading: {heading}\n\
                 Goal: {description}\nInstructions: {instructions}\n\nSurrounding context:\n{context}\
                 \n\nSource content:\n{}\n\n---\n\nWrite only this section, starting with the \
                 heading.\n\n{rules}",
                preview(source, 30_000),
                topic = request.topic,
                heading = addition.heading,
                description = addition.description,
                rules = FORMATTING_RULES,
            );
            let new_text = self.complete(&request.model, new_prompt).await?;
            let new_text = strip_wrapping_code_fences(&new_text);
            let new_section = parse_sections(&new_text).into_iter().next().unwrap_or(Section {
                heading: addition.heading.clone(),
                body: new_text,
            });
            let insert_at = (addition.after_index + 1).min(revised.len());
            revised.insert(insert_at, new_section);
        }

        let mut remove_sorted = plan.remove.clone();
        remove_sorted.sort_unstable_by(|a, b| b.cmp(a));
        for idx in remove_sorted {
            if idx < revised.len() {
                revised.remove(idx);
            }
        }

        Ok(Some(stitch_sections(&revised)))
    }

    async fn complete(&self, model: &str, prompt: String) -> Result<String, AgentError> {
        let request = CompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: Some(0.4),
            max_tokens: Some(4096),
        };
        let response = self.llm.complete(request).await?;
        Ok(response.content)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RevisionPlan {
    #[serde(default)]
    modify: Vec<usize>,
    #[serde(default)]
    add: Vec<SectionAddition>,
    #[serde(default)]
    remove: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct SectionAddition {
    after_index: usize,
    heading: String,
    description: String,
}

fn section_context(sections: &[Section], idx: usize) -> String {
    let mut parts = Vec::new();
    if idx > 0 {
        parts.push(format!("Previous: {}\n{}", sections[idx - 1].heading, preview(&sections[idx - 1].body, 300)));
    }
    if idx + 1 < sections.len() {
        parts.push(format!("Next: {}\n{}", sections[idx + 1].heading, preview(&sections[idx + 1].body, 300)));
    }
    if parts.is_empty() {
        "(no surrounding sections)".to_string()
    } else {
        parts.join("\n\n")
    }
}

fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

/// Split Markdown into sections on `#`/`##` headings, respecting fenced code blocks. `###` and
/// deeper headings stay inside their parent section's body.
fn parse_sections(content: &str) -> Vec<Section> {
    static SECTION_HEADING: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^#{1,2}\s+").expect("static heading regex"));

    let mut sections = Vec::new();
    let mut heading = String::new();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut in_code_block = false;

    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
        }
        let is_heading = !in_code_block && SECTION_HEADING.is_match(line);

        if is_heading {
            if !heading.is_empty() || !body_lines.is_empty() {
                sections.push(Section {
                    heading: heading.clone(),
                    body: body_lines.join("\n").trim().to_string(),
                });
            }
            heading = line.trim().to_string();
            body_lines = Vec::new();
        } else {
            body_lines.push(line);
        }
    }
    if !heading.is_empty() || !body_lines.is_empty() {
        sections.push(Section {
            heading,
            body: body_lines.join("\n").trim().to_string(),
        });
    }
    sections
}

fn stitch_sections(sections: &[Section]) -> String {
    let mut parts = Vec::new();
    for section in sections {
        if !section.heading.is_empty() {
            parts.push(section.heading.clone());
        }
        if !section.body.is_empty() {
            parts.push(section.body.clone());
        }
    }
    parts.join("\n\n")
}

fn strip_wrapping_code_fences(text: &str) -> String {
    static FENCE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(`{3,})(?:markdown|md|json)?\s*\n").expect("static fence regex"));

    let trimmed = text.trim();
    if let Some(captures) = FENCE.captures(trimmed) {
        let fence = &captures[1];
        if trimmed.ends_with(fence) {
            let after_open = &trimmed[captures.get(0).unwrap().end()..];
            let without_close = &after_open[..after_open.len() - fence.len()];
            return without_close.trim_end().to_string();
        }
    }
    trimmed.to_string()
}

fn strip_existing_footer(content: &str) -> String {
    let mut content = content.to_string();
    while content.trim_end().ends_with(REPORT_FOOTER) {
        let trimmed = content.trim_end();
        let idx = trimmed.rfind(REPORT_FOOTER).unwrap();
        content = trimmed[..idx].trim_end().to_string();
        if content.trim_end().ends_with("---") {
            let trimmed = content.trim_end();
            content = trimmed[..trimmed.len() - 3].trim_end().to_string();
        }
    }
    content
}

fn extract_metadata(content: &str) -> ReportMetadata {
    static HEADING: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+.+$").expect("static metadata heading regex"));

    ReportMetadata {
        word_count: content.split_whitespace().count(),
        char_count: content.chars().count(),
        section_count: HEADING.find_iter(content).count(),
    }
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start < end { Some(&text[start..=end]) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sections_splits_on_h1_and_h2() {
        let content = "# Title\n\nIntro text\n\n## Section A\n\nBody A\n\n## Section B\n\nBody B";
        let sections = parse_sections(content);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].heading, "## Section A");
        assert_eq!(sections[1].body, "Body A");
    }

    #[test]
    fn parse_sections_ignores_headings_inside_code_blocks() {
        let content = "## Real\n\n```\n## not a heading\n```\nmore body";
        let sections = parse_sections(content);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].body.contains("not a heading"));
    }

    #[test]
    fn stitch_round_trips_simple_document() {
        let content = "# Title\n\nBody";
        let sections = parse_sections(content);
        assert_eq!(stitch_sections(&sections), content);
    }

    #[test]
    fn strip_wrapping_code_fences_removes_markdown_fence() {
        let wrapped = "```markdown\n# Report\nbody\n```";
        assert_eq!(strip_wrapping_code_fences(wrapped), "# Report\nbody");
    }

    #[test]
    fn strip_existing_footer_removes_trailing_footer_and_divider() {
        let content = format!("# Report\n\nbody\n\n---\n\n{REPORT_FOOTER}");
        assert_eq!(strip_existing_footer(&content), "# Report\n\nbody");
    }

    #[test]
    fn extract_metadata_counts_sections_and_words() {
        let content = "# Title\n\none two three\n\n## Sub\n\nfour five";
        let metadata = extract_metadata(content);
        assert_eq!(metadata.section_count, 2);
        assert_eq!(metadata.word_count, 7);
    }
}
