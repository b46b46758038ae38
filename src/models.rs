use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content length limits shared by proposal validation, curation edits and
/// the flashcard CRUD surface.
pub const FRONT_MAX_CHARS: usize = 200;
pub const BACK_MAX_CHARS: usize = 500;

/// Bounds on one AI generation batch.
pub const MIN_PROPOSALS: usize = 5;
pub const MAX_PROPOSALS: usize = 8;

/// Source text submitted for generation must fall in this range.
pub const SOURCE_TEXT_MIN_CHARS: usize = 1000;
pub const SOURCE_TEXT_MAX_CHARS: usize = 10_000;

/// Bulk accept takes between 1 and this many items per call.
pub const BULK_ACCEPT_MAX_ITEMS: usize = 50;

/// Upper bound on the `limit` of one study-set fetch.
pub const STUDY_LIMIT_MAX: usize = 50;

/// Generations allowed per user per UTC calendar day.
pub const DAILY_GENERATION_LIMIT: i64 = 10;

/// Provenance of a flashcard. Transitions only move forward: an `ai-full`
/// card becomes `ai-edited` when its content is changed; `manual` and
/// `ai-edited` never change source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlashcardSource {
    Manual,
    AiFull,
    AiEdited,
}

impl FlashcardSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashcardSource::Manual => "manual",
            FlashcardSource::AiFull => "ai-full",
            FlashcardSource::AiEdited => "ai-edited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(FlashcardSource::Manual),
            "ai-full" => Some(FlashcardSource::AiFull),
            "ai-edited" => Some(FlashcardSource::AiEdited),
            _ => None,
        }
    }
}

/// One AI generation request, persisted after the strategy call succeeds.
///
/// Invariant: `accepted_unedited_count + accepted_edited_count` never
/// exceeds `generated_count`; the database enforces it with a guarded
/// counter update during bulk accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub model: String,
    pub duration_ms: i64,
    pub generated_count: i32,
    pub accepted_unedited_count: i32,
    pub accepted_edited_count: i32,
    pub source_text_hash: String,
    pub source_text_length: i32,
    pub created_at: DateTime<Utc>,
}

impl Generation {
    pub fn accepted_count(&self) -> i32 {
        self.accepted_unedited_count + self.accepted_edited_count
    }

    pub fn available_slots(&self) -> i32 {
        self.generated_count - self.accepted_count()
    }
}

/// Best-effort record of a failed generation attempt. Stores the hash of
/// the source text rather than the text itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationErrorLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub model: String,
    pub source_text_hash: String,
    pub source_text_length: i32,
    pub error_code: String,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

/// A durable study unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub front: String,
    pub back: String,
    pub source: FlashcardSource,
    pub generation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate flashcard produced by a generation strategy, before any
/// curation. Source is always `ai-full` at this stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedFlashcard {
    pub front: String,
    pub back: String,
    pub source: FlashcardSource,
}

// Request / response DTOs

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub source_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub generation_id: Uuid,
    pub model: String,
    pub duration_ms: i64,
    pub generated_count: i32,
    pub flashcards_proposals: Vec<ProposedFlashcard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkFlashcardItem {
    pub front: String,
    pub back: String,
    pub source: FlashcardSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkAcceptRequest {
    pub generation_id: Uuid,
    pub flashcards: Vec<BulkFlashcardItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkAcceptResponse {
    pub created_count: usize,
    pub flashcards: Vec<Flashcard>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFlashcardRequest {
    pub front: String,
    pub back: String,
    pub source: Option<FlashcardSource>,
    pub generation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFlashcardRequest {
    pub front: Option<String>,
    pub back: Option<String>,
}

fn default_study_limit() -> usize {
    20
}

fn default_shuffle() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudySessionQuery {
    #[serde(default = "default_study_limit")]
    pub limit: usize,
    pub source: Option<FlashcardSource>,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
}

impl Default for StudySessionQuery {
    fn default() -> Self {
        Self {
            limit: default_study_limit(),
            source: None,
            shuffle: default_shuffle(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySessionResponse {
    pub session_id: Uuid,
    pub flashcards: Vec<Flashcard>,
    pub total_count: usize,
    pub user_total_flashcards: usize,
}
