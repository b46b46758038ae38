use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    errors::{ApiError, ErrorContext},
    flashcard_service::FlashcardService,
    generation_service::GenerationService,
    models::*,
};

// Import logging macros
use crate::{log_api_start, log_api_success, log_api_warn};

#[derive(Clone)]
pub struct AppState {
    pub generation_service: GenerationService,
    pub flashcard_service: FlashcardService,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, error_details: None }
    }

    pub fn error(message: String) -> Self {
        Self { success: false, data: None, error: Some(message), error_details: None }
    }

    pub fn error_with_details(message: String, details: Value) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            error_details: Some(details),
        }
    }
}

/// Authentication is an external collaborator; handlers trust the user id
/// it forwards in the `x-user-id` header.
fn require_user_id(headers: &HeaderMap, operation: &str) -> Result<Uuid, Response> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| {
            log_api_warn!(operation, "missing or invalid x-user-id header");
            ApiError::ValidationError("missing or invalid x-user-id header".to_string())
                .to_response_with_context(ErrorContext::new(operation, "user"))
        })
}

// Generation endpoint

pub async fn generate_flashcards(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<ApiResponse<GenerationResponse>>, Response> {
    let user_id = require_user_id(&headers, "generate_flashcards")?;
    log_api_start!("generate_flashcards", user_id = user_id);

    match state.generation_service.generate(user_id, &request.source_text).await {
        Ok(response) => {
            log_api_success!(
                "generate_flashcards",
                generation_id = response.generation_id,
                format!("{} proposals generated", response.generated_count)
            );
            Ok(Json(ApiResponse::success(response)))
        }
        Err(e) => {
            let context = ErrorContext::new("generate_flashcards", "generation")
                .with_id(&user_id.to_string());
            Err(e.to_response_with_context(context))
        }
    }
}

// Flashcard endpoints

pub async fn bulk_accept_flashcards(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkAcceptRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BulkAcceptResponse>>), Response> {
    let user_id = require_user_id(&headers, "bulk_accept_flashcards")?;
    let generation_id = request.generation_id;
    log_api_start!("bulk_accept_flashcards", generation_id = generation_id);

    match state.flashcard_service.bulk_accept(user_id, request).await {
        Ok(response) => {
            log_api_success!(
                "bulk_accept_flashcards",
                count = response.created_count,
                "approved proposals persisted"
            );
            Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
        }
        Err(e) => {
            let context = ErrorContext::new("bulk_accept_flashcards", "generation")
                .with_id(&generation_id.to_string());
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn create_flashcard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateFlashcardRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Flashcard>>), Response> {
    let user_id = require_user_id(&headers, "create_flashcard")?;
    log_api_start!("create_flashcard", user_id = user_id);

    match state.flashcard_service.create_flashcard(user_id, request).await {
        Ok(card) => {
            log_api_success!("create_flashcard", flashcard_id = card.id, "flashcard created");
            Ok((StatusCode::CREATED, Json(ApiResponse::success(card))))
        }
        Err(e) => {
            let context = ErrorContext::new("create_flashcard", "flashcard");
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn get_flashcard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Flashcard>>, Response> {
    let user_id = require_user_id(&headers, "get_flashcard")?;
    log_api_start!("get_flashcard", flashcard_id = id);

    match state.flashcard_service.get_flashcard(user_id, id).await {
        Ok(card) => Ok(Json(ApiResponse::success(card))),
        Err(e) => {
            let context =
                ErrorContext::new("get_flashcard", "flashcard").with_id(&id.to_string());
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn list_flashcards(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<Flashcard>>>, Response> {
    let user_id = require_user_id(&headers, "list_flashcards")?;
    log_api_start!("list_flashcards", user_id = user_id);

    match state.flashcard_service.list_flashcards(user_id).await {
        Ok(cards) => Ok(Json(ApiResponse::success(cards))),
        Err(e) => {
            let context = ErrorContext::new("list_flashcards", "flashcard");
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn update_flashcard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateFlashcardRequest>,
) -> Result<Json<ApiResponse<Flashcard>>, Response> {
    let user_id = require_user_id(&headers, "update_flashcard")?;
    log_api_start!("update_flashcard", flashcard_id = id);

    match state.flashcard_service.update_flashcard(user_id, id, request).await {
        Ok(card) => {
            log_api_success!("update_flashcard", flashcard_id = id, "flashcard updated");
            Ok(Json(ApiResponse::success(card)))
        }
        Err(e) => {
            let context =
                ErrorContext::new("update_flashcard", "flashcard").with_id(&id.to_string());
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn delete_flashcard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, Response> {
    let user_id = require_user_id(&headers, "delete_flashcard")?;
    log_api_start!("delete_flashcard", flashcard_id = id);

    match state.flashcard_service.delete_flashcard(user_id, id).await {
        Ok(()) => {
            log_api_success!("delete_flashcard", flashcard_id = id, "flashcard deleted");
            Ok(Json(ApiResponse::success(json!({ "deleted": true }))))
        }
        Err(e) => {
            let context =
                ErrorContext::new("delete_flashcard", "flashcard").with_id(&id.to_string());
            Err(e.to_response_with_context(context))
        }
    }
}

// Study endpoint

pub async fn study_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StudySessionQuery>,
) -> Result<Json<ApiResponse<StudySessionResponse>>, Response> {
    let user_id = require_user_id(&headers, "study_session")?;
    log_api_start!("study_session", user_id = user_id);

    match state.flashcard_service.study_set(user_id, query).await {
        Ok(response) => {
            log_api_success!(
                "study_session",
                count = response.flashcards.len(),
                "study set drawn"
            );
            Ok(Json(ApiResponse::success(response)))
        }
        Err(e) => {
            let context = ErrorContext::new("study_session", "flashcard");
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn health() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({ "status": "ok" })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/generations", post(generate_flashcards))
        .route("/api/flashcards", get(list_flashcards).post(create_flashcard))
        .route("/api/flashcards/bulk", post(bulk_accept_flashcards))
        .route(
            "/api/flashcards/:id",
            get(get_flashcard).put(update_flashcard).delete(delete_flashcard),
        )
        .route("/api/study/session", get(study_session))
        .with_state(state)
}
