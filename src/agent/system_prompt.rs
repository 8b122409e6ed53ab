//! Deterministic system prompt construction: today's date, per-user instructions, and citation
//! instructions gated by a config flag.

use chrono::Utc;

const CITATION_INSTRUCTIONS: &str = "When you use information from a tool result that carries \
a chunk id, cite it inline as [citation:<chunk_id>] immediately after the claim it supports. \
Only cite ids that were present in the tool results you received this turn; never invent one.";

pub fn build_system_prompt(user_instructions: Option<&str>, citations_enabled: bool) -> String {
    let mut parts = vec![format!(
        "Today's date is {} (UTC).",
        Utc::now().format("%Y-%m-%d")
    )];

    if let Some(instructions) = user_instructions {
        if !instructions.trim().is_empty() {
            parts.push(instructions.to_string());
        }
    }

    if citations_enabled {
        parts.push(CITATION_INSTRUCTIONS.to_string());
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_instructions_are_gated() {
        let with = build_system_prompt(None, true);
        let without = build_system_prompt(None, false);
        assert!(with.contains("citation:"));
        assert!(!without.contains("citation:"));
    }

    #[test]
    fn blank_user_instructions_are_dropped() {
        let prompt = build_system_prompt(Some("   "), false);
        assert!(!prompt.contains("   \n"));
    }
}
