// OpenAI-Protocol Generator Adapter
//
// Anti-Corruption Layer for chat-completions-compatible APIs.
// The orchestrator model generates the candidate answer from evidence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderSettings;
use crate::domain::{AnswerGenerator, LlmError, RetrievalResponse};

const SYSTEM_PROMPT: &str = "You are a decision-making AI. Answer the query using ONLY the \
provided evidence. If the evidence is insufficient, say so explicitly. Never hallucinate.";

pub struct OpenAiGenerator {
    client: reqwest::Client,
    settings: ProviderSettings,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl OpenAiGenerator {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    fn evidence_block(evidence: &RetrievalResponse) -> String {
        evidence
            .results
            .iter()
            .map(|r| format!("[{}] (score={}) {}", r.modality, r.score, r.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        query: &str,
        evidence: &RetrievalResponse,
    ) -> Result<String, LlmError> {
        if self.settings.api_key.is_empty() {
            return Err(LlmError::MissingCredential);
        }

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Evidence:\n{}\n\nQuery: {query}",
                        Self::evidence_block(evidence)
                    ),
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LlmError::Authentication(body),
                429 => LlmError::RateLimit,
                _ => LlmError::Provider(format!("HTTP {status}: {body}")),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Provider(format!("Failed to parse response: {e}")))?;

        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::Provider("Response carried no choices".to_string()))
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}
