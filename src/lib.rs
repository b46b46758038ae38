pub mod ai_strategies;
pub mod api;
pub mod config;
pub mod curation;
pub mod database;
pub mod errors;
pub mod flashcard_service;
pub mod generation_service;
pub mod logging;
pub mod models;
pub mod response_parser;
pub mod study;

pub use ai_strategies::{
    generate_with_retry, AiServiceError, GenerationStrategy, MockStrategy, OpenRouterStrategy,
    RetryPolicy,
};
pub use curation::{CurationBoard, CurationError, CurationProposal, ProposalStatus};
pub use database::{BulkWriteOutcome, Database};
pub use errors::{ApiError, CapacityDetails, ErrorContext};
pub use flashcard_service::FlashcardService;
pub use generation_service::GenerationService;
pub use models::*;
pub use response_parser::{parse_ai_response, ResponseParser};
pub use study::{KeyBindings, SessionStats, StudyAction, StudyError, StudySession, StudyState};
