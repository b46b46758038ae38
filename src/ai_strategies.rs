use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::models::{FlashcardSource, ProposedFlashcard};
use crate::response_parser::parse_ai_response;

/// Default timeout budget for one live AI call.
pub const DEFAULT_AI_TIMEOUT_MS: u64 = 60_000;

/// Classified failure from the AI generation pipeline.
///
/// `Parse` and `Validation` describe a structurally bad response; the
/// remaining variants classify transport-level failures from reqwest's
/// structured error predicates rather than message substrings.
#[derive(Debug, thiserror::Error)]
pub enum AiServiceError {
    #[error("AI request timed out: {0}")]
    Timeout(String),

    #[error("network failure reaching AI service: {0}")]
    Network(String),

    #[error("AI service error: {message}")]
    Service { message: String, status: Option<u16> },

    #[error("unrecognized AI response: {0}")]
    Parse(String),

    #[error("AI response failed validation: {0}")]
    Validation(String),

    #[error("unexpected AI failure: {0}")]
    Unknown(String),
}

impl AiServiceError {
    /// Stable wire code for logs and error-log rows.
    pub fn code(&self) -> &'static str {
        match self {
            AiServiceError::Timeout(_) => "TIMEOUT_ERROR",
            AiServiceError::Network(_) => "NETWORK_ERROR",
            AiServiceError::Service { .. } => "AI_SERVICE_ERROR",
            AiServiceError::Parse(_) => "PARSE_ERROR",
            AiServiceError::Validation(_) => "VALIDATION_ERROR",
            AiServiceError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Network faults and rate-limited/5xx service responses are worth
    /// another attempt. Timeouts already consumed the full budget and a
    /// structurally bad response will not improve on retry.
    pub fn is_retriable(&self) -> bool {
        match self {
            AiServiceError::Network(_) => true,
            AiServiceError::Service { status, .. } => {
                matches!(status, Some(code) if *code == 429 || *code >= 500)
            }
            _ => false,
        }
    }
}

fn classify_transport_error(e: reqwest::Error) -> AiServiceError {
    if e.is_timeout() {
        AiServiceError::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        AiServiceError::Network(e.to_string())
    } else {
        AiServiceError::Unknown(e.to_string())
    }
}

/// Result of one strategy invocation.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub flashcards_proposals: Vec<ProposedFlashcard>,
    pub model: String,
    pub duration_ms: i64,
}

/// Retry policy applied around the live strategy. Only retriable errors
/// (see [`AiServiceError::is_retriable`]) trigger another attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            backoff_multiplier: 2,
        }
    }
}

/// Enum-based strategy selection: the mock bypasses the external
/// dependency (and rate limiting) during development and tests, the
/// OpenRouter variant makes the real chat-completion call.
#[derive(Debug, Clone)]
pub enum GenerationStrategy {
    Mock(MockStrategy),
    OpenRouter(OpenRouterStrategy),
}

impl GenerationStrategy {
    pub async fn generate_flashcards(
        &self,
        source_text: &str,
    ) -> Result<GenerationOutcome, AiServiceError> {
        match self {
            GenerationStrategy::Mock(strategy) => strategy.generate_flashcards(source_text).await,
            GenerationStrategy::OpenRouter(strategy) => {
                strategy.generate_flashcards(source_text).await
            }
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        match self {
            GenerationStrategy::Mock(_) => "mock",
            GenerationStrategy::OpenRouter(_) => "openrouter",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            GenerationStrategy::Mock(strategy) => strategy.model_name(),
            GenerationStrategy::OpenRouter(strategy) => strategy.model_name(),
        }
    }
}

/// Runs the strategy under the retry policy with exponential backoff.
pub async fn generate_with_retry(
    strategy: &GenerationStrategy,
    policy: &RetryPolicy,
    source_text: &str,
) -> Result<GenerationOutcome, AiServiceError> {
    let mut backoff = policy.initial_backoff;
    let mut attempt = 0;

    loop {
        match strategy.generate_flashcards(source_text).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retriable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    strategy = strategy.strategy_name(),
                    attempt,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retriable AI failure, backing off before retry"
                );
                tokio::time::sleep(backoff).await;
                backoff *= policy.backoff_multiplier;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Deterministic strategy for development and tests: fixed pedagogical
/// templates built from the start of the source text, behind a simulated
/// call latency.
#[derive(Debug, Clone)]
pub struct MockStrategy {
    delay: Option<Duration>,
}

impl MockStrategy {
    pub fn new() -> Self {
        Self { delay: None }
    }

    /// Fixed delay, used by tests to avoid the simulated latency.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay) }
    }

    pub fn model_name(&self) -> &str {
        "mock-model"
    }

    pub async fn generate_flashcards(
        &self,
        source_text: &str,
    ) -> Result<GenerationOutcome, AiServiceError> {
        let started = Instant::now();
        let delay = self.delay.unwrap_or_else(|| {
            Duration::from_millis(rand::rng().random_range(2000..=3000))
        });
        tokio::time::sleep(delay).await;

        let excerpt: String = source_text.chars().take(50).collect();
        let templates = [
            (
                format!("What is the main topic of the text starting with \"{excerpt}\"?"),
                "The text introduces its central concept in the opening passage.".to_string(),
            ),
            (
                "Which key term does the source text define first?".to_string(),
                format!("The first defined term appears near \"{excerpt}\"."),
            ),
            (
                "How would you summarize the source text in one sentence?".to_string(),
                "It presents a concept, supports it with detail, and draws a conclusion."
                    .to_string(),
            ),
            (
                "What question does the source text set out to answer?".to_string(),
                format!("The question framed by the opening \"{excerpt}\"."),
            ),
            (
                "Name one supporting detail from the source text.".to_string(),
                "A concrete example given in the body of the passage.".to_string(),
            ),
        ];

        let flashcards_proposals = templates
            .into_iter()
            .map(|(front, back)| ProposedFlashcard {
                front,
                back,
                source: FlashcardSource::AiFull,
            })
            .collect();

        Ok(GenerationOutcome {
            flashcards_proposals,
            model: self.model_name().to_string(),
            duration_ms: started.elapsed().as_millis() as i64,
        })
    }
}

impl Default for MockStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Live strategy: one chat-completion request against an OpenRouter-style
/// endpoint, response normalized by the parser chain.
#[derive(Debug, Clone)]
pub struct OpenRouterStrategy {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

const SYSTEM_PROMPT: &str = "You are a flashcard author. Given source text, \
produce between 5 and 8 question/answer flashcards covering its key ideas. \
Respond with strict JSON only, no prose and no markdown fences, in this \
exact shape: {\"flashcards\": [{\"front\": \"...\", \"back\": \"...\"}]}. \
Each front must be at most 200 characters and each back at most 500.";

impl OpenRouterStrategy {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string()),
            model,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub async fn generate_flashcards(
        &self,
        source_text: &str,
    ) -> Result<GenerationOutcome, AiServiceError> {
        let started = Instant::now();

        let request_body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!(
                        "Generate flashcards from the following source text:\n\n{source_text}"
                    ),
                },
            ],
        };

        info!(
            model = %self.model,
            base_url = %self.base_url,
            source_text_length = source_text.len(),
            "Making AI generation request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!(
                model = %self.model,
                status = %status,
                error = %error_text,
                "AI generation request failed"
            );
            return Err(AiServiceError::Service {
                message: format!("completion request failed with {status}: {error_text}"),
                status: Some(status.as_u16()),
            });
        }

        let completion: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AiServiceError::Timeout(e.to_string())
            } else {
                AiServiceError::Service {
                    message: format!("malformed completion payload: {e}"),
                    status: None,
                }
            }
        })?;

        let Some(choice) = completion.choices.first() else {
            return Err(AiServiceError::Service {
                message: "no choices in completion response".to_string(),
                status: None,
            });
        };

        let flashcards_proposals =
            parse_ai_response(&Value::String(choice.message.content.clone()))?;

        info!(
            model = %self.model,
            proposal_count = flashcards_proposals.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "AI generation request succeeded"
        );

        Ok(GenerationOutcome {
            flashcards_proposals,
            model: self.model.clone(),
            duration_ms: started.elapsed().as_millis() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_strategy_returns_five_proposals() {
        let strategy = MockStrategy::with_delay(Duration::ZERO);
        let source = "Rust's ownership model enforces memory safety without a garbage collector.";
        let outcome = strategy.generate_flashcards(source).await.unwrap();

        assert_eq!(outcome.flashcards_proposals.len(), 5);
        assert_eq!(outcome.model, "mock-model");
        assert!(outcome
            .flashcards_proposals
            .iter()
            .all(|p| p.source == FlashcardSource::AiFull));

        // References the first 50 characters of the source text.
        let excerpt: String = source.chars().take(50).collect();
        assert!(outcome.flashcards_proposals[0].front.contains(&excerpt));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AiServiceError::Timeout("t".into()).code(), "TIMEOUT_ERROR");
        assert_eq!(AiServiceError::Network("n".into()).code(), "NETWORK_ERROR");
        assert_eq!(
            AiServiceError::Service { message: "s".into(), status: Some(500) }.code(),
            "AI_SERVICE_ERROR"
        );
        assert_eq!(AiServiceError::Parse("p".into()).code(), "PARSE_ERROR");
        assert_eq!(
            AiServiceError::Validation("v".into()).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(AiServiceError::Unknown("u".into()).code(), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_retry_classification() {
        assert!(AiServiceError::Network("reset".into()).is_retriable());
        assert!(AiServiceError::Service { message: "rate".into(), status: Some(429) }
            .is_retriable());
        assert!(AiServiceError::Service { message: "down".into(), status: Some(503) }
            .is_retriable());

        // Timeouts consumed the full budget; bad shapes will not improve.
        assert!(!AiServiceError::Timeout("slow".into()).is_retriable());
        assert!(!AiServiceError::Parse("shape".into()).is_retriable());
        assert!(!AiServiceError::Validation("count".into()).is_retriable());
        assert!(!AiServiceError::Service { message: "bad key".into(), status: Some(401) }
            .is_retriable());
        assert!(!AiServiceError::Service { message: "opaque".into(), status: None }
            .is_retriable());
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(1000));
        assert_eq!(policy.backoff_multiplier, 2);
    }
}
