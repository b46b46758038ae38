use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::info;
use uuid::Uuid;

use crate::database::{BulkWriteOutcome, Database};
use crate::errors::{ApiError, CapacityDetails};
use crate::models::*;

/// Flashcard CRUD, the bulk-accept orchestration and the study-set fetch.
#[derive(Clone)]
pub struct FlashcardService {
    db: Database,
}

impl FlashcardService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create_flashcard(
        &self,
        user_id: Uuid,
        request: CreateFlashcardRequest,
    ) -> Result<Flashcard, ApiError> {
        validate_content(&request.front, &request.back)?;

        let source = request.source.unwrap_or(FlashcardSource::Manual);
        let generation_id = match source {
            // Manual cards never reference a generation.
            FlashcardSource::Manual => None,
            FlashcardSource::AiFull | FlashcardSource::AiEdited => {
                let Some(generation_id) = request.generation_id else {
                    return Err(ApiError::ValidationError(
                        "AI-sourced flashcards require a generation_id".to_string(),
                    ));
                };
                if self.db.get_generation(generation_id, user_id).await?.is_none() {
                    return Err(ApiError::NotFound(format!(
                        "Generation '{generation_id}' not found"
                    )));
                }
                Some(generation_id)
            }
        };

        let now = Utc::now();
        let card = Flashcard {
            id: Uuid::new_v4(),
            user_id,
            front: request.front.trim().to_string(),
            back: request.back.trim().to_string(),
            source,
            generation_id,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_flashcard(&card).await?;

        Ok(card)
    }

    pub async fn get_flashcard(&self, user_id: Uuid, id: Uuid) -> Result<Flashcard, ApiError> {
        self.db
            .get_flashcard(id, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Flashcard '{id}' not found")))
    }

    pub async fn list_flashcards(&self, user_id: Uuid) -> Result<Vec<Flashcard>, ApiError> {
        Ok(self.db.list_flashcards(user_id, None).await?)
    }

    /// Updates content, applying the forward-only source transition: an
    /// `ai-full` card whose content actually changes becomes `ai-edited`;
    /// `manual` and `ai-edited` keep their source, and an update that
    /// changes nothing leaves both source and `updated_at` alone.
    pub async fn update_flashcard(
        &self,
        user_id: Uuid,
        id: Uuid,
        request: UpdateFlashcardRequest,
    ) -> Result<Flashcard, ApiError> {
        let mut card = self.get_flashcard(user_id, id).await?;

        let new_front = request.front.as_deref().map(str::trim).unwrap_or(&card.front);
        let new_back = request.back.as_deref().map(str::trim).unwrap_or(&card.back);
        validate_content(new_front, new_back)?;

        let content_changed = new_front != card.front || new_back != card.back;
        if !content_changed {
            return Ok(card);
        }

        card.front = new_front.to_string();
        card.back = new_back.to_string();
        if card.source == FlashcardSource::AiFull {
            card.source = FlashcardSource::AiEdited;
        }
        card.updated_at = Utc::now();

        self.db.update_flashcard(&card).await?;
        Ok(card)
    }

    pub async fn delete_flashcard(&self, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        if !self.db.delete_flashcard(id, user_id).await? {
            return Err(ApiError::NotFound(format!("Flashcard '{id}' not found")));
        }
        Ok(())
    }

    /// Converts a batch of approved proposals into durable flashcards
    /// under the generation's capacity invariant.
    pub async fn bulk_accept(
        &self,
        user_id: Uuid,
        request: BulkAcceptRequest,
    ) -> Result<BulkAcceptResponse, ApiError> {
        let items = &request.flashcards;
        if items.is_empty() || items.len() > BULK_ACCEPT_MAX_ITEMS {
            return Err(ApiError::ValidationError(format!(
                "bulk accept requires 1-{BULK_ACCEPT_MAX_ITEMS} flashcards, got {}",
                items.len()
            )));
        }
        for (index, item) in items.iter().enumerate() {
            if item.source == FlashcardSource::Manual {
                return Err(ApiError::ValidationError(format!(
                    "flashcard {index}: bulk accept only takes ai-full or ai-edited items"
                )));
            }
            validate_content(&item.front, &item.back)
                .map_err(|e| ApiError::ValidationError(format!("flashcard {index}: {e}")))?;
        }

        let generation = self
            .db
            .get_generation(request.generation_id, user_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Generation '{}' not found", request.generation_id))
            })?;

        let requested = items.len() as i32;
        if generation.accepted_count() + requested > generation.generated_count {
            return Err(capacity_error(&generation, requested));
        }

        let now = Utc::now();
        let flashcards: Vec<Flashcard> = items
            .iter()
            .map(|item| Flashcard {
                id: Uuid::new_v4(),
                user_id,
                front: item.front.trim().to_string(),
                back: item.back.trim().to_string(),
                source: item.source,
                generation_id: Some(generation.id),
                created_at: now,
                updated_at: now,
            })
            .collect();

        let unedited_count =
            items.iter().filter(|i| i.source == FlashcardSource::AiFull).count() as i32;
        let edited_count = requested - unedited_count;

        let outcome = self
            .db
            .bulk_accept_flashcards(
                user_id,
                generation.id,
                &flashcards,
                unedited_count,
                edited_count,
            )
            .await
            .map_err(|e| ApiError::InternalError(format!("bulk accept failed: {e}")))?;

        if outcome == BulkWriteOutcome::CapacityExhausted {
            // A concurrent submit won the race; report capacity with fresh
            // counters rather than the stale ones checked above.
            let current = self
                .db
                .get_generation(request.generation_id, user_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!(
                        "Generation '{}' not found",
                        request.generation_id
                    ))
                })?;
            return Err(capacity_error(&current, requested));
        }

        info!(
            user_id = %user_id,
            generation_id = %generation.id,
            created_count = flashcards.len(),
            unedited_count,
            edited_count,
            "Bulk accept persisted"
        );

        Ok(BulkAcceptResponse { created_count: flashcards.len(), flashcards })
    }

    /// Draws a study set: optional source filter, optional shuffle, capped
    /// at `limit`. Reports the user's overall card count separately so the
    /// caller can tell "no flashcards at all" from "none match the filter".
    pub async fn study_set(
        &self,
        user_id: Uuid,
        query: StudySessionQuery,
    ) -> Result<StudySessionResponse, ApiError> {
        if query.limit == 0 || query.limit > STUDY_LIMIT_MAX {
            return Err(ApiError::ValidationError(format!(
                "limit must be 1-{STUDY_LIMIT_MAX}, got {}",
                query.limit
            )));
        }

        let user_total_flashcards = self.db.count_flashcards(user_id).await? as usize;
        if user_total_flashcards == 0 {
            return Err(ApiError::NotFound(
                "You have no flashcards yet. Create or generate some first.".to_string(),
            ));
        }

        let mut cards = self.db.list_flashcards(user_id, query.source).await?;
        if cards.is_empty() {
            return Err(ApiError::NotFound(
                "No flashcards match the requested source filter.".to_string(),
            ));
        }

        let total_count = cards.len();
        if query.shuffle {
            cards.shuffle(&mut rand::rng());
        }
        cards.truncate(query.limit);

        Ok(StudySessionResponse {
            session_id: Uuid::new_v4(),
            flashcards: cards,
            total_count,
            user_total_flashcards,
        })
    }
}

fn validate_content(front: &str, back: &str) -> Result<(), ApiError> {
    let front = front.trim();
    let back = back.trim();

    if front.is_empty() || front.chars().count() > FRONT_MAX_CHARS {
        return Err(ApiError::ValidationError(format!(
            "front must be 1-{FRONT_MAX_CHARS} characters"
        )));
    }
    if back.is_empty() || back.chars().count() > BACK_MAX_CHARS {
        return Err(ApiError::ValidationError(format!(
            "back must be 1-{BACK_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn capacity_error(generation: &Generation, requested: i32) -> ApiError {
    ApiError::CapacityExceeded(CapacityDetails {
        generated_count: generation.generated_count,
        current_accepted_count: generation.accepted_count(),
        requested_count: requested,
        available_slots: generation.available_slots().max(0),
    })
}
