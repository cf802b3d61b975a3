//! Chat model seam.
//!
//! Every generation, bid and director decision goes through [`ChatModel`],
//! so the simulation never talks to a concrete API directly.

use crate::error::AgoraError;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::Duration;

/// A language model that answers a system instruction plus one human message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the persona instruction and the rendered conversation, returning the
    /// raw completion text.
    async fn complete(&self, system: &str, human: &str) -> Result<String, AgoraError>;
}

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// API key for authentication.
    pub api_key: String,
}

impl ApiSettings {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }
}

/// [`ChatModel`] backed by an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAIChatModel {
    pub fn new(settings: &ApiSettings, model: impl Into<String>) -> Result<Self, AgoraError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        let config = OpenAIConfig::new()
            .with_api_key(&settings.api_key)
            .with_api_base(&settings.api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(&self, system: &str, human: &str) -> Result<String, AgoraError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system.to_string().into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: human.to_string().into(),
                name: None,
            }),
        ];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .temperature(self.temperature)
            .messages(messages);
        if let Some(max_tokens) = self.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        let request = args.build()?;

        log::debug!(
            "chat request to {} ({} prompt chars)",
            self.model,
            system.len() + human.len()
        );

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AgoraError::EmptyResponse(self.model.clone()))
    }
}
