//! Style generation — natural-language prompt → styling JSON via the LLM.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::GenerationError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Output size bound for a styling config.
const STYLE_MAX_TOKENS: u64 = 4096;
/// Low temperature — we want a stable JSON shape, not creative prose.
const STYLE_TEMPERATURE: f64 = 0.2;

/// Turns a user's natural-language style description into a structured
/// element→CSS mapping.
///
/// Purely a transform: no side effects beyond the LLM call. The returned
/// mapping is stored as-is; no semantic validation of keys or CSS content
/// happens here, so downstream consumers must stay defensive.
pub struct StyleGenerator {
    llm: Arc<dyn LlmProvider>,
    call_timeout: Duration,
}

impl StyleGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, call_timeout: Duration) -> Self {
        Self { llm, call_timeout }
    }

    /// Generate a styling config from the user's prompt.
    ///
    /// The model's raw output is untrusted text. A wrapping code fence
    /// (with optional language tag) is tolerated; anything that still fails
    /// to parse as a JSON object surfaces as `GenerationError::Format` —
    /// no automatic retry, no default style. The caller decides whether to
    /// retry with the same prompt.
    pub async fn generate(&self, user_prompt: &str) -> Result<serde_json::Value, GenerationError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(STYLE_SYSTEM_PROMPT),
            ChatMessage::user(format!("User's request: {user_prompt}")),
        ])
        .with_temperature(STYLE_TEMPERATURE)
        .with_max_tokens(STYLE_MAX_TOKENS);

        let response = tokio::time::timeout(self.call_timeout, self.llm.complete(request))
            .await
            .map_err(|_| GenerationError::Timeout {
                seconds: self.call_timeout.as_secs(),
            })??;

        parse_styling_json(&response.content).inspect_err(|e| {
            warn!(
                model = self.llm.model_name(),
                error = %e,
                "Style generation returned unparseable output"
            );
        })
    }
}

/// Parse LLM output into a styling JSON object, tolerating a code fence.
pub(crate) fn parse_styling_json(raw: &str) -> Result<serde_json::Value, GenerationError> {
    let unwrapped = strip_code_fence(raw);
    let value: serde_json::Value =
        serde_json::from_str(unwrapped).map_err(|e| GenerationError::Format {
            reason: format!("not valid JSON: {e}"),
        })?;
    if !value.is_object() {
        return Err(GenerationError::Format {
            reason: "expected a JSON object at the top level".to_string(),
        });
    }
    Ok(value)
}

/// Strip one wrapping markdown code fence, if present.
///
/// Handles an optional language tag immediately after the opening fence
/// (```json). Input without a fence passes through trimmed. Does not hunt
/// for JSON embedded in surrounding prose — if the model chats instead of
/// answering, that's a format error upstream.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop a language tag on the opening fence line. If the first line is
    // anything other than a bare tag, the content starts right at the fence.
    let rest = match rest.find('\n') {
        Some(idx) if rest[..idx].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[idx + 1..]
        }
        _ => rest,
    };

    let rest = rest.trim();
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}

/// Instruction template for the generation call. Enumerates the exact key
/// set the rest of the system (and the preview UI) expects.
const STYLE_SYSTEM_PROMPT: &str = r##"You are an email CSS style generator for a Gmail-compatible template system.

Convert the user's styling preferences into a JSON configuration with complete inline CSS strings for each email element.

You MUST return a JSON object with these EXACT keys, where each value is a complete CSS string:

{
  "email_body": "font-family: Arial, sans-serif; color: #202124; font-size: 14px;",
  "background_color": "#ffffff",
  "header_section": "margin-bottom: 24px;",
  "header_title": "font-size: 28px; font-weight: 600; color: [color]; margin: 0 0 8px 0;",
  "header_subtitle": "font-size: 16px; color: [color]; margin: 0;",
  "text_section": "margin-bottom: 24px;",
  "paragraph": "font-size: 14px; line-height: 1.6; color: [color]; margin: 12px 0;",
  "bold_text": "font-weight: 600;",
  "italic_text": "font-style: italic;",
  "links_section": "margin-bottom: 24px;",
  "link": "color: [color]; text-decoration: none; margin-right: 16px;",
  "link_button": "display: inline-block; padding: 10px 20px; background: [color]; color: white; text-decoration: none; border-radius: 4px; margin-right: 8px;",
  "list_section": "margin-bottom: 24px;",
  "unordered_list": "margin: 12px 0; padding-left: 20px;",
  "ordered_list": "margin: 12px 0; padding-left: 20px;",
  "list_item": "margin: 6px 0; line-height: 1.5;",
  "table_section": "margin-bottom: 24px;",
  "table": "width: 100%; border-collapse: collapse;",
  "table_header": "background: #f8f9fa; padding: 12px; text-align: left; border: 1px solid #e8eaed; font-weight: 600;",
  "table_cell": "padding: 12px; border: 1px solid #e8eaed;",
  "signature_section": "margin-top: 32px;",
  "signature_text": "color: #5f6368; font-size: 13px; line-height: 1.4;",
  "divider": "border-top: 1px solid #e8eaed; margin-bottom: 16px;"
}

IMPORTANT RULES:
1. Return ONLY valid JSON, no markdown backticks, no explanations
2. background_color must be ONLY a hex color (e.g., "#f0f0f0"), not a CSS string
3. Every other value MUST be a complete CSS string with semicolons
4. Use hex colors (e.g., #333333) for all color values
5. For dark themes: use dark background_color (#1a1a1a, #000000) with light text colors
6. For cyberpunk: neon colors (#00ffff, #ff00ff) with black background
7. For minimal: white background (#ffffff) with gray text (#5f6368)
8. For warm: cream background (#faf9f6) with brown text (#3d2e2e)
9. For corporate: white background with navy/blue accents (#003366, #1a73e8)

Return ONLY the JSON object:"##;
