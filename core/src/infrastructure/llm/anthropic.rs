// Anthropic Reviewer Adapter
//
// Anti-Corruption Layer for the Anthropic Messages API.
// The reviewer model audits the generated answer for grounding; its
// output is advisory only and never alters the policy verdict.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderSettings;
use crate::domain::{AnswerReviewer, LlmError, RetrievalResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_REVIEW_TOKENS: u32 = 256;

pub struct AnthropicReviewer {
    client: reqwest::Client,
    settings: ProviderSettings,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<UserMessage>,
}

#[derive(Serialize)]
struct UserMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

impl AnthropicReviewer {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    fn review_prompt(query: &str, answer: &str, evidence: &RetrievalResponse) -> String {
        let evidence_text = evidence
            .results
            .iter()
            .map(|r| format!("[{}] {}", r.modality, r.text))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Review this answer for hallucinations, accuracy, and completeness.\n\n\
             Query: {query}\n\nAnswer: {answer}\n\nEvidence:\n{evidence_text}\n\n\
             Respond with: PASS (if grounded), FAIL (if hallucinated), or PARTIAL (if incomplete)."
        )
    }
}

#[async_trait]
impl AnswerReviewer for AnthropicReviewer {
    async fn review(
        &self,
        query: &str,
        answer: &str,
        evidence: &RetrievalResponse,
    ) -> Result<String, LlmError> {
        if self.settings.api_key.is_empty() {
            return Err(LlmError::MissingCredential);
        }

        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens: MAX_REVIEW_TOKENS,
            messages: vec![UserMessage {
                role: "user",
                content: Self::review_prompt(query, answer, evidence),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.settings.base_url))
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Provider(format!("Failed to parse response: {e}")))?;

        parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| LlmError::Provider("Response carried no content".to_string()))
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RetrievalStrategy;

    #[tokio::test]
    async fn missing_credential_fails_without_network() {
        let reviewer = AnthropicReviewer::new(ProviderSettings {
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
        });
        let evidence = RetrievalResponse::empty("q", RetrievalStrategy::Hybrid);

        let result = reviewer.review("q", "a", &evidence).await;
        assert!(matches!(result, Err(LlmError::MissingCredential)));
    }
}
