use serde::Serialize;
use tracing::info;

/// Per-section size cap (characters) before truncation kicks in.
const MAX_SECTION_CHARS: usize = 20_000;
/// Total cap for the assembled static tier (characters).
const MAX_TOTAL_CHARS: usize = 100_000;

/// 3-tier system prompt for Anthropic prompt caching.
///
/// TIER 1 (static): the active flow's global instructions + node script —
///   identical for every call running this flow.
///   → cache_control: {type: "ephemeral"} — high hit rate across calls.
/// TIER 2 (per-session): session variables collected so far (name, account
///   status, anything extracted in earlier turns).
///   → cache_control: {type: "ephemeral"} — hits across turns of one call.
/// TIER 3 (volatile): current Eastern time + turn count.
///   → NO cache — always changes, placed LAST so it doesn't break the prefix.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub static_tier: String,
    pub user_tier: String,
    pub volatile_tier: String,
}

impl SystemPrompt {
    /// Flatten all tiers into a single string (for providers without caching).
    pub fn to_plain_text(&self) -> String {
        let mut out = self.static_tier.clone();
        if !self.user_tier.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.user_tier);
        }
        if !self.volatile_tier.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.volatile_tier);
        }
        out
    }

    /// Convert to Anthropic API format with 2 cache breakpoints.
    pub fn to_anthropic_blocks(&self) -> Vec<serde_json::Value> {
        let mut blocks = Vec::with_capacity(3);

        blocks.push(serde_json::json!({
            "type": "text",
            "text": self.static_tier,
            "cache_control": { "type": "ephemeral" }
        }));

        if !self.user_tier.is_empty() {
            blocks.push(serde_json::json!({
                "type": "text",
                "text": self.user_tier,
                "cache_control": { "type": "ephemeral" }
            }));
        }

        if !self.volatile_tier.is_empty() {
            blocks.push(serde_json::json!({
                "type": "text",
                "text": self.volatile_tier,
            }));
        }

        blocks
    }
}

/// Builds the 3-tier system prompt from flow-defined instructions and
/// live session state.
pub struct PromptBuilder {
    global_instructions: String,
    node_script: String,
}

impl PromptBuilder {
    /// `global_instructions` is the flow-level persona/behavior block that
    /// applies to every node; `node_script` is the current node's own
    /// instructions/script text.
    pub fn new(global_instructions: impl Into<String>, node_script: impl Into<String>) -> Self {
        Self {
            global_instructions: truncate_content(&global_instructions.into(), MAX_SECTION_CHARS),
            node_script: truncate_content(&node_script.into(), MAX_SECTION_CHARS),
        }
    }

    /// Build a plain system prompt (no caching tiers).
    pub fn build(&self, session_info: Option<&SessionInfo>) -> String {
        self.build_prompt(&[], session_info).to_plain_text()
    }

    /// Build a 3-tier system prompt for caching.
    ///
    /// `variables` — rendered `(name, value)` pairs collected this call.
    /// `session_info` — volatile per-turn metadata.
    pub fn build_prompt(
        &self,
        variables: &[(String, String)],
        session_info: Option<&SessionInfo>,
    ) -> SystemPrompt {
        // Tier 1: static — same for every call on this flow/node.
        let mut static_tier = format!("{}\n\n{}", self.global_instructions, self.node_script);
        if static_tier.len() > MAX_TOTAL_CHARS {
            static_tier = truncate_content(&static_tier, MAX_TOTAL_CHARS);
        }

        // Tier 2: per-session — changes as variables are extracted.
        let user_tier = if variables.is_empty() {
            String::new()
        } else {
            let mut out = String::from("## Known information\n");
            for (name, value) in variables {
                out.push_str(&format!("- {name}: {value}\n"));
            }
            out
        };

        // Tier 3: volatile — changes every turn.
        let volatile_tier = match session_info {
            Some(info) => format!(
                "[Call: {} | Turn: {} | Time: {}]",
                info.call_id, info.turn_count, info.timestamp,
            ),
            None => String::new(),
        };

        info!(
            static_chars = static_tier.len(),
            user_chars = user_tier.len(),
            "built system prompt"
        );

        SystemPrompt {
            static_tier,
            user_tier,
            volatile_tier,
        }
    }
}

/// Volatile session metadata injected into Tier 3.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub call_id: String,
    pub turn_count: u32,
    pub timestamp: String,
}

/// Truncate content to `max_chars` using 70% head / 20% tail / 10% marker.
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }

    let head_chars = max_chars * 70 / 100;
    let tail_chars = max_chars * 20 / 100;
    let marker = "\n\n[... content truncated ...]\n\n";

    let head_end = content[..head_chars]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(head_chars);
    let tail_start = if content.len() > tail_chars {
        content[(content.len() - tail_chars)..]
            .find('\n')
            .map(|i| content.len() - tail_chars + i + 1)
            .unwrap_or(content.len() - tail_chars)
    } else {
        0
    };

    let mut out = String::with_capacity(head_end + marker.len() + (content.len() - tail_start));
    out.push_str(&content[..head_end]);
    out.push_str(marker);
    out.push_str(&content[tail_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_prompt_includes_variables_tier() {
        let builder = PromptBuilder::new("Be concise.", "Ask for the account number.");
        let prompt = builder.build_prompt(
            &[("account_number".to_string(), "12345".to_string())],
            None,
        );
        assert!(prompt.user_tier.contains("account_number: 12345"));
        assert!(prompt.static_tier.contains("Ask for the account number."));
    }

    #[test]
    fn build_prompt_places_volatile_tier_last_in_plain_text() {
        let builder = PromptBuilder::new("Global.", "Node.");
        let info = SessionInfo {
            call_id: "call-1".to_string(),
            turn_count: 3,
            timestamp: "Tuesday, July 28, 2026, 2:00 PM ET".to_string(),
        };
        let prompt = builder.build_prompt(&[], Some(&info));
        let text = prompt.to_plain_text();
        assert!(text.trim_end().ends_with("ET]"));
    }

    #[test]
    fn anthropic_blocks_mark_static_and_user_tiers_cacheable() {
        let builder = PromptBuilder::new("Global.", "Node.");
        let prompt = builder.build_prompt(&[("name".to_string(), "Alex".to_string())], None);
        let blocks = prompt.to_anthropic_blocks();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0]["cache_control"]["type"] == "ephemeral");
        assert!(blocks[1]["cache_control"]["type"] == "ephemeral");
    }

    #[test]
    fn truncate_preserves_small_content() {
        let content = "Hello, world!\nSecond line.";
        let result = truncate_content(content, MAX_SECTION_CHARS);
        assert_eq!(result, content);
    }

    #[test]
    fn truncate_applies_70_20_split() {
        let content = (0..200).map(|i| format!("Line {i}\n")).collect::<String>();
        let result = truncate_content(&content, 200);
        assert!(result.contains("[... content truncated ...]"));
        assert!(result.len() < content.len());
    }
}
