//! Bridge from rig-core's `CompletionModel` trait to our `LlmProvider`.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message as RigMessage};

use crate::error::GenerationError;
use crate::llm::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Adapter wrapping any rig `CompletionModel`.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split our flat message list into rig's (preamble, history, prompt) shape.
///
/// rig carries the system prompt separately as a preamble, and the final
/// user message as the prompt. Multiple system messages are concatenated.
fn split_messages(
    messages: &[ChatMessage],
) -> Result<(Option<String>, Vec<RigMessage>, RigMessage), GenerationError> {
    let mut preamble: Option<String> = None;
    let mut history: Vec<RigMessage> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => match preamble {
                Some(ref mut p) => {
                    p.push('\n');
                    p.push_str(&msg.content);
                }
                None => preamble = Some(msg.content.clone()),
            },
            Role::User => history.push(RigMessage::user(msg.content.clone())),
            Role::Assistant => history.push(RigMessage::assistant(msg.content.clone())),
        }
    }

    let prompt = history
        .pop()
        .ok_or_else(|| GenerationError::RequestFailed("empty message list".to_string()))?;

    Ok((preamble, history, prompt))
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, GenerationError> {
        let (preamble, history, prompt) = split_messages(&request.messages)?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GenerationError::RequestFailed(format!("{e}")))?;

        let content = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_separates_preamble_and_prompt() {
        let messages = vec![
            ChatMessage::system("You are a styler."),
            ChatMessage::user("make it dark"),
        ];
        let (preamble, history, _prompt) = split_messages(&messages).unwrap();
        assert_eq!(preamble.as_deref(), Some("You are a styler."));
        assert!(history.is_empty());
    }

    #[test]
    fn split_concatenates_system_messages() {
        let messages = vec![
            ChatMessage::system("one"),
            ChatMessage::system("two"),
            ChatMessage::user("go"),
        ];
        let (preamble, _, _) = split_messages(&messages).unwrap();
        assert_eq!(preamble.as_deref(), Some("one\ntwo"));
    }

    #[test]
    fn split_rejects_empty() {
        assert!(split_messages(&[]).is_err());
        // System-only is also an error: there is no prompt to send.
        assert!(split_messages(&[ChatMessage::system("only system")]).is_err());
    }
}
