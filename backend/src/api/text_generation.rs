use async_trait::async_trait;
use openai_api_rs::v1::{api::OpenAIClient, chat_completion};

use crate::models::site_config::TextSlot;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation is not configured")]
    NotConfigured,
    #[error("text generation client error: {0}")]
    Client(String),
    #[error("text generation returned no text")]
    Empty,
}

/// Black-box copy suggestion service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Prompt asking for a single short line of copy for `slot`, in the brand's voice.
pub fn copywriter_prompt(slot: TextSlot) -> String {
    format!(
        "Atue como um copywriter de elite para uma landing page de um ecossistema de alta performance (business/networking).\n\
         O tom de voz é: Premium, Exclusivo, \"No-nonsense\", Provocativo (estilo \"clube fechado\").\n\
         Gere UMA única opção de texto curta e impactante para o campo: {}.\n\
         NÃO use aspas na resposta. NÃO explique. Apenas o texto.",
        slot.context()
    )
}

/// Trims whitespace and a single pair of wrapping quotes models add despite the prompt.
pub fn clean_suggestion(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured)
    }
}

pub struct OpenRouterGenerator {
    client: OpenAIClient,
    model: String,
}

impl OpenRouterGenerator {
    pub fn new(api_key: String, model: String) -> Result<Self, GenerationError> {
        let client = OpenAIClient::builder()
            .with_endpoint("https://openrouter.ai/api/v1")
            .with_api_key(api_key)
            .build()
            .map_err(|e| GenerationError::Client(e.to_string()))?;
        Ok(Self {
            client,
            model,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenRouterGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let messages = vec![chat_completion::ChatCompletionMessage {
            role: chat_completion::MessageRole::user,
            content: chat_completion::Content::Text(prompt.to_string()),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }];
        let request = chat_completion::ChatCompletionRequest::new(self.model.clone(), messages)
            .max_tokens(120);

        let result = self
            .client
            .chat_completion(request)
            .await
            .map_err(|e| GenerationError::Client(e.to_string()))?;

        result
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(GenerationError::Empty)
    }
}
