//! services/api/src/adapters/critique_llm.rs
//!
//! This module contains the adapter for the essay critique LLM.
//! It implements the `CritiqueService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;
use writing_coach_core::ports::{CritiquePrompt, CritiqueService, PortError, PortResult};

const MAX_COMPLETION_TOKENS: u32 = 4000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CritiqueService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiCritiqueAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCritiqueAdapter {
    /// Creates a new `OpenAiCritiqueAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `CritiqueService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CritiqueService for OpenAiCritiqueAdapter {
    /// Sends the critique prompt with deterministic sampling and returns the raw reply.
    async fn complete(&self, prompt: &CritiquePrompt) -> PortResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system_instructions.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user_payload.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(MAX_COMPLETION_TOKENS)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model = %self.model, "Sending critique request");
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        match response.choices.into_iter().next() {
            Some(choice) => choice.message.content.ok_or_else(|| {
                PortError::Unexpected("Critique LLM response contained no text content.".to_string())
            }),
            None => Err(PortError::Unexpected(
                "Critique LLM returned no choices in its response.".to_string(),
            )),
        }
    }
}
