//! Read-only web tools: scraping a page's main content and fetching link-preview metadata.
//!
//! Neither mutates external state, so neither requires approval; both fetch untrusted HTML and
//! so both require sanitization before their output reaches the model.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::json;
use std::sync::LazyLock;

use crate::context::JobContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput};

const DEFAULT_MAX_LENGTH: usize = 50_000;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; research-assistant/1.0)";

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .unwrap_or_default()
}

/// Strips `<script>`/`<style>` blocks and remaining tags, collapsing whitespace into paragraphs.
fn html_to_text(html: &str) -> String {
    static SCRIPT_OR_STYLE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</\1>").expect("static tag regex"));
    static BLOCK_BREAK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</(p|div|br|h[1-6]|li|tr)>").expect("static break regex"));
    static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static tag strip regex"));
    static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("static blank run regex"));

    let without_scripts = SCRIPT_OR_STYLE.replace_all(html, "");
    let with_breaks = BLOCK_BREAK.replace_all(&without_scripts, "\n\n");
    let text = TAG.replace_all(&with_breaks, "");
    let text = html_escape(&text);
    BLANK_RUN.replace_all(text.trim(), "\n\n").to_string()
}

fn html_escape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

/// Truncates at the latest sentence or paragraph boundary that isn't too far back from the limit.
fn truncate_content(content: &str, max_length: usize) -> (String, bool) {
    if content.len() <= max_length {
        return (content.to_string(), false);
    }

    let window = &content[..max_length];
    let last_period = window.rfind('.');
    let last_paragraph = window.rfind("\n\n");
    let boundary = last_period.into_iter().chain(last_paragraph).max();

    let cut = match boundary {
        Some(b) if b as f64 > max_length as f64 * 0.8 => b + 1,
        _ => max_length,
    };
    (format!("{}\n\n[Content truncated...]", &content[..cut]), true)
}

fn meta_content(html: &str, attr: &str, value: &str) -> Option<String> {
    let forward = Regex::new(&format!(
        r#"(?is)<meta[^>]+{attr}=["']{value}["'][^>]+content=["']([^"']+)["']"#
    ))
    .ok()?;
    if let Some(captures) = forward.captures(html) {
        return Some(captures[1].to_string());
    }
    let backward = Regex::new(&format!(
        r#"(?is)<meta[^>]+content=["']([^"']+)["'][^>]+{attr}=["']{value}["']"#
    ))
    .ok()?;
    backward.captures(html).map(|c| c[1].to_string())
}

fn extract_title(html: &str) -> Option<String> {
    meta_content(html, "property", "og:title")
        .or_else(|| meta_content(html, "name", "twitter:title"))
        .or_else(|| {
            Regex::new(r"(?is)<title[^>]*>([^<]+)</title>")
                .ok()?
                .captures(html)
                .map(|c| c[1].trim().to_string())
        })
}

fn extract_description(html: &str) -> Option<String> {
    meta_content(html, "property", "og:description")
        .or_else(|| meta_content(html, "name", "twitter:description"))
        .or_else(|| meta_content(html, "name", "description"))
}

fn extract_image(url: &str, html: &str) -> Option<String> {
    let image = meta_content(html, "property", "og:image").or_else(|| meta_content(html, "name", "twitter:image"))?;
    if image.starts_with("http://") || image.starts_with("https://") {
        Some(image)
    } else if let Some(rest) = image.strip_prefix("//") {
        Some(format!("https:{rest}"))
    } else if image.starts_with('/') {
        url::Url::parse(url).ok().map(|base| base.join(&image).map(|u| u.to_string()).unwrap_or(image.clone()))
    } else {
        Some(image)
    }
}

pub struct ScrapeWebpageTool {
    client: Client,
}

impl ScrapeWebpageTool {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent(USER_AGENT)
                .build()
                .expect("static client config is valid"),
        }
    }
}

impl Default for ScrapeWebpageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScrapeWebpageTool {
    fn name(&self) -> &str {
        "scrape_webpage"
    }

    fn description(&self) -> &str {
        "Fetch a webpage and extract its main readable content as the user asks to read, \
         summarize, or answer questions about a specific page."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The URL of the webpage to scrape"},
                "max_length": {"type": "integer", "description": "Maximum content length to return (default 50000)"}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let raw_url = params
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'url' parameter".to_string()))?;
        let max_length = params
            .get("max_length")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_LENGTH);

        let url = normalize_url(raw_url);
        let domain = extract_domain(&url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(Duration::from_secs(10))
            } else {
                ToolError::ExternalService(e.to_string())
            }
        })?;

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::ExternalService(format!("failed to read response body: {e}")))?;

        let title = extract_title(&html).unwrap_or_else(|| if domain.is_empty() { "Webpage".to_string() } else { domain.clone() });
        let body = html_to_text(&html);
        let description = extract_description(&html).unwrap_or_else(|| {
            body.split("\n\n").next().map(|p| p.chars().take(300).collect()).unwrap_or_default()
        });
        let (content, was_truncated) = truncate_content(&body, max_length);
        let word_count = content.split_whitespace().count();

        let result = json!({
            "assetId": url,
            "kind": "article",
            "href": url,
            "title": title,
            "description": description,
            "content": content,
            "domain": domain,
            "word_count": word_count,
            "was_truncated": was_truncated,
        });

        Ok(ToolOutput::success(result, start.elapsed()).with_raw(html))
    }

    fn estimated_duration(&self, _params: &serde_json::Value) -> Option<Duration> {
        Some(Duration::from_secs(3))
    }

    fn requires_sanitization(&self) -> bool {
        true
    }
}

pub struct LinkPreviewTool {
    client: Client,
}

impl LinkPreviewTool {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent(USER_AGENT)
                .build()
                .expect("static client config is valid"),
        }
    }
}

impl Default for LinkPreviewTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for LinkPreviewTool {
    fn name(&self) -> &str {
        "link_preview"
    }

    fn description(&self) -> &str {
        "Fetch Open Graph / Twitter Card metadata for a URL to show a rich link preview card."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The URL to fetch metadata for"}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let raw_url = params
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'url' parameter".to_string()))?;

        let url = normalize_url(raw_url);
        let domain = extract_domain(&url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(Duration::from_secs(10))
            } else {
                ToolError::ExternalService(e.to_string())
            }
        })?;

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.to_lowercase().contains("text/html") {
            let result = json!({
                "assetId": url,
                "kind": "link",
                "href": url,
                "title": domain,
                "description": format!("File from {domain}"),
                "domain": domain,
            });
            return Ok(ToolOutput::success(result, start.elapsed()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::ExternalService(format!("failed to read response body: {e}")))?;

        let title = html_escape(&extract_title(&html).unwrap_or_else(|| domain.clone()));
        let description = extract_description(&html).map(|d| {
            let d = html_escape(&d);
            if d.chars().count() > 200 {
                format!("{}...", d.chars().take(197).collect::<String>())
            } else {
                d
            }
        });
        let thumb = extract_image(&url, &html);

        let result = json!({
            "assetId": url,
            "kind": "link",
            "href": url,
            "title": title,
            "description": description,
            "thumb": thumb,
            "domain": domain,
        });

        Ok(ToolOutput::success(result, start.elapsed()).with_raw(html))
    }

    fn estimated_duration(&self, _params: &serde_json::Value) -> Option<Duration> {
        Some(Duration::from_secs(2))
    }

    fn requires_sanitization(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_domain_strips_www() {
        assert_eq!(extract_domain("https://www.example.com/a/b"), "example.com");
    }

    #[test]
    fn normalize_url_adds_https() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn truncate_content_uses_sentence_boundary() {
        let content = format!("{}. {}", "a".repeat(90), "b".repeat(30));
        let (truncated, was_truncated) = truncate_content(&content, 95);
        assert!(was_truncated);
        assert!(truncated.starts_with(&"a".repeat(90)));
    }

    #[test]
    fn html_to_text_strips_script_and_tags() {
        let html = "<html><head><script>evil()</script></head><body><p>Hello <b>world</b></p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Hello"));
        assert!(!text.contains("evil"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn extract_title_prefers_og_title() {
        let html = r#"<meta property="og:title" content="OG Title"><title>Fallback</title>"#;
        assert_eq!(extract_title(html), Some("OG Title".to_string()));
    }
}
