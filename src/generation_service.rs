use chrono::{DateTime, Days, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai_strategies::{
    generate_with_retry, AiServiceError, GenerationStrategy, RetryPolicy,
};
use crate::database::Database;
use crate::errors::ApiError;
use crate::models::{
    DAILY_GENERATION_LIMIT, Generation, GenerationErrorLog, GenerationResponse,
    SOURCE_TEXT_MAX_CHARS, SOURCE_TEXT_MIN_CHARS,
};

/// End-to-end handling of one generation request: rate limit, strategy
/// invocation, generation-record persistence, best-effort error logging.
#[derive(Clone)]
pub struct GenerationService {
    db: Database,
    strategy: GenerationStrategy,
    retry_policy: RetryPolicy,
}

impl GenerationService {
    pub fn new(db: Database, strategy: GenerationStrategy) -> Self {
        Self { db, strategy, retry_policy: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    fn is_mock(&self) -> bool {
        matches!(self.strategy, GenerationStrategy::Mock(_))
    }

    pub async fn generate(
        &self,
        user_id: Uuid,
        source_text: &str,
    ) -> Result<GenerationResponse, ApiError> {
        let length = source_text.chars().count();
        if !(SOURCE_TEXT_MIN_CHARS..=SOURCE_TEXT_MAX_CHARS).contains(&length) {
            return Err(ApiError::ValidationError(format!(
                "source_text must be {SOURCE_TEXT_MIN_CHARS}-{SOURCE_TEXT_MAX_CHARS} characters, got {length}"
            )));
        }

        // The mock strategy exists to bypass the external dependency during
        // development, so it bypasses the daily limit as well.
        if !self.is_mock() {
            self.check_rate_limit(user_id).await?;
        }

        let source_text_hash = blake3::hash(source_text.as_bytes()).to_hex().to_string();

        info!(
            user_id = %user_id,
            strategy = self.strategy.strategy_name(),
            model = self.strategy.model_name(),
            source_text_length = length,
            "Starting flashcard generation"
        );

        let outcome =
            match generate_with_retry(&self.strategy, &self.retry_policy, source_text).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.log_generation_error(user_id, &source_text_hash, length, &e).await;
                    return Err(ApiError::AiService(e));
                }
            };

        let generation = Generation {
            id: Uuid::new_v4(),
            user_id,
            model: outcome.model.clone(),
            duration_ms: outcome.duration_ms,
            generated_count: outcome.flashcards_proposals.len() as i32,
            accepted_unedited_count: 0,
            accepted_edited_count: 0,
            source_text_hash,
            source_text_length: length as i32,
            created_at: Utc::now(),
        };
        self.db.insert_generation(&generation).await?;

        info!(
            user_id = %user_id,
            generation_id = %generation.id,
            model = %generation.model,
            duration_ms = generation.duration_ms,
            generated_count = generation.generated_count,
            "Generation persisted"
        );

        Ok(GenerationResponse {
            generation_id: generation.id,
            model: generation.model,
            duration_ms: generation.duration_ms,
            generated_count: generation.generated_count,
            flashcards_proposals: outcome.flashcards_proposals,
        })
    }

    /// Max 10 generations per user per UTC calendar day. The tenth of a
    /// day still succeeds; the eleventh is rejected with the next UTC
    /// midnight as the retry time.
    async fn check_rate_limit(&self, user_id: Uuid) -> Result<(), ApiError> {
        let today = start_of_utc_day(Utc::now());
        let used = self.db.count_generations_since(user_id, today).await?;

        if used >= DAILY_GENERATION_LIMIT {
            let retry_after = next_utc_midnight(Utc::now());
            warn!(
                user_id = %user_id,
                used,
                limit = DAILY_GENERATION_LIMIT,
                retry_after = %retry_after,
                "Daily generation limit reached"
            );
            return Err(ApiError::RateLimitExceeded { retry_after });
        }

        Ok(())
    }

    /// Best effort: a failed log write is traced but never masks or
    /// replaces the original generation error.
    async fn log_generation_error(
        &self,
        user_id: Uuid,
        source_text_hash: &str,
        source_text_length: usize,
        error: &AiServiceError,
    ) {
        let log = GenerationErrorLog {
            id: Uuid::new_v4(),
            user_id,
            model: self.strategy.model_name().to_string(),
            source_text_hash: source_text_hash.to_string(),
            source_text_length: source_text_length as i32,
            error_code: error.code().to_string(),
            error_message: error.to_string(),
            created_at: Utc::now(),
        };

        if let Err(log_err) = self.db.insert_generation_error(&log).await {
            warn!(
                user_id = %user_id,
                error_code = log.error_code,
                error = %log_err,
                "Failed to persist generation error log"
            );
        }
    }
}

pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
}

pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    (now.date_naive() + Days::new(1)).and_hms_opt(0, 0, 0).unwrap().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_utc_day_boundaries() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();

        let start = start_of_utc_day(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap());

        let midnight = next_utc_midnight(now);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_midnight_rolls_over_month_end() {
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap();
        let midnight = next_utc_midnight(now);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
    }
}
