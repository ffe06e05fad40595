//! Style application — restyle an email body against a styling config.

use std::sync::Arc;
use std::time::Duration;

use crate::error::GenerationError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::styles::generator::strip_code_fence;

/// Output size bound for a restyled document.
const APPLY_MAX_TOKENS: u64 = 4096;

/// Applies a styling config to an email body via the LLM.
///
/// Contract with callers: the output preserves all original textual content
/// and structural layout, altering only presentational attributes, and is a
/// self-contained inline-styled document (delivery channels don't reliably
/// honor external stylesheets or `<style>` blocks).
pub struct StyleApplier {
    llm: Arc<dyn LlmProvider>,
    call_timeout: Duration,
}

impl StyleApplier {
    pub fn new(llm: Arc<dyn LlmProvider>, call_timeout: Duration) -> Self {
        Self { llm, call_timeout }
    }

    /// Restyle `original_body` (HTML or plain text) with `styling_json`.
    pub async fn apply(
        &self,
        original_body: &str,
        styling_json: &serde_json::Value,
    ) -> Result<String, GenerationError> {
        let system_prompt = build_apply_system_prompt(styling_json);

        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(format!(
                "Original email HTML:\n{original_body}\n\nReturn the styled HTML:"
            )),
        ])
        .with_max_tokens(APPLY_MAX_TOKENS);

        let response = tokio::time::timeout(self.call_timeout, self.llm.complete(request))
            .await
            .map_err(|_| GenerationError::Timeout {
                seconds: self.call_timeout.as_secs(),
            })??;

        // Models occasionally wrap the document in a fence despite the
        // instructions; unwrap it the same way the generator does.
        Ok(strip_code_fence(&response.content).to_string())
    }
}

fn build_apply_system_prompt(styling_json: &serde_json::Value) -> String {
    let config = serde_json::to_string_pretty(styling_json)
        .unwrap_or_else(|_| styling_json.to_string());

    format!(
        "You are an email HTML styler.\n\n\
         Take the original email HTML and apply these styling rules:\n\n\
         {config}\n\n\
         IMPORTANT RULES:\n\
         1. Keep ALL original content intact - don't remove or change any text\n\
         2. Only modify the HTML structure and inline styles\n\
         3. Apply the styles from the config to matching elements\n\
         4. Use inline CSS only (style=\"...\") - email clients don't support <style> tags well\n\
         5. Make sure tables, buttons, and images are email-client compatible\n\
         6. Return ONLY the styled HTML, no explanations\n\
         7. Keep the HTML valid and well-formed"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::llm::CompletionResponse;

    struct StubLlm {
        response: String,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, GenerationError> {
            Ok(CompletionResponse {
                content: self.response.clone(),
                input_tokens: 10,
                output_tokens: 10,
            })
        }
    }

    #[test]
    fn apply_prompt_embeds_config() {
        let config = serde_json::json!({"paragraph": "color: #00ffff;"});
        let prompt = build_apply_system_prompt(&config);
        assert!(prompt.contains("color: #00ffff;"));
        assert!(prompt.contains("inline CSS only"));
    }

    #[tokio::test]
    async fn apply_unwraps_fenced_html() {
        let applier = StyleApplier::new(
            Arc::new(StubLlm {
                response: "```html\n<p style=\"color: #0ff\">hi</p>\n```".to_string(),
            }),
            Duration::from_secs(5),
        );
        let styled = applier
            .apply("<p>hi</p>", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(styled, "<p style=\"color: #0ff\">hi</p>");
    }
}
