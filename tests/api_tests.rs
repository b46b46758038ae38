use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::time::Duration;
use tenx_cards::{
    api::{create_router, AppState},
    ai_strategies::{GenerationStrategy, MockStrategy},
    database::Database,
    flashcard_service::FlashcardService,
    generation_service::GenerationService,
};
use uuid::Uuid;

async fn create_test_server() -> TestServer {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let strategy = GenerationStrategy::Mock(MockStrategy::with_delay(Duration::ZERO));
    let app_state = AppState {
        generation_service: GenerationService::new(db.clone(), strategy),
        flashcard_service: FlashcardService::new(db),
    };
    TestServer::new(create_router(app_state)).unwrap()
}

fn user_header(user_id: Uuid) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(&user_id.to_string()).unwrap(),
    )
}

fn source_text(chars: usize) -> String {
    "a".repeat(chars)
}

async fn generate_for(server: &TestServer, user_id: Uuid) -> Value {
    let (name, value) = user_header(user_id);
    let response = server
        .post("/api/generations")
        .add_header(name, value)
        .json(&json!({ "source_text": source_text(1000) }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server().await;

    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_missing_user_header_rejected() {
    let server = create_test_server().await;

    let response = server
        .post("/api/flashcards")
        .json(&json!({ "front": "f", "back": "b" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn test_malformed_user_header_rejected() {
    let server = create_test_server().await;
    let response = server
        .get("/api/flashcards")
        .add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("not-a-uuid"),
        )
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_returns_proposals() {
    let server = create_test_server().await;
    let body = generate_for(&server, Uuid::new_v4()).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["generated_count"], 5);
    let proposals = body["data"]["flashcards_proposals"].as_array().unwrap();
    assert_eq!(proposals.len(), 5);
    for proposal in proposals {
        assert_eq!(proposal["source"], "ai-full");
        assert!(!proposal["front"].as_str().unwrap().is_empty());
        assert!(!proposal["back"].as_str().unwrap().is_empty());
    }
    assert!(Uuid::parse_str(body["data"]["generation_id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_generate_rejects_short_source_text() {
    let server = create_test_server().await;
    let (name, value) = user_header(Uuid::new_v4());

    let response = server
        .post("/api/generations")
        .add_header(name, value)
        .json(&json!({ "source_text": source_text(999) }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("1000"));
}

#[tokio::test]
async fn test_bulk_accept_then_capacity_rejection() {
    let server = create_test_server().await;
    let user_id = Uuid::new_v4();
    let generated = generate_for(&server, user_id).await;
    let generation_id = generated["data"]["generation_id"].as_str().unwrap().to_string();

    let items: Vec<Value> = (0..5)
        .map(|i| {
            let source = if i < 3 { "ai-full" } else { "ai-edited" };
            json!({ "front": format!("front {i}"), "back": format!("back {i}"), "source": source })
        })
        .collect();

    let (name, value) = user_header(user_id);
    let response = server
        .post("/api/flashcards/bulk")
        .add_header(name, value)
        .json(&json!({ "generation_id": generation_id, "flashcards": items }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["data"]["created_count"], 5);
    assert_eq!(body["data"]["flashcards"].as_array().unwrap().len(), 5);

    // All five slots are used; the next accept fails with full capacity
    // details in the body.
    let (name, value) = user_header(user_id);
    let response = server
        .post("/api/flashcards/bulk")
        .add_header(name, value)
        .json(&json!({
            "generation_id": generation_id,
            "flashcards": [{ "front": "extra", "back": "extra", "source": "ai-full" }]
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error_details"]["generated_count"], 5);
    assert_eq!(body["error_details"]["current_accepted_count"], 5);
    assert_eq!(body["error_details"]["requested_count"], 1);
    assert_eq!(body["error_details"]["available_slots"], 0);
}

#[tokio::test]
async fn test_bulk_accept_unknown_generation_is_404() {
    let server = create_test_server().await;
    let (name, value) = user_header(Uuid::new_v4());

    let response = server
        .post("/api/flashcards/bulk")
        .add_header(name, value)
        .json(&json!({
            "generation_id": Uuid::new_v4(),
            "flashcards": [{ "front": "f", "back": "b", "source": "ai-full" }]
        }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_flashcard_crud_lifecycle() {
    let server = create_test_server().await;
    let user_id = Uuid::new_v4();

    let (name, value) = user_header(user_id);
    let response = server
        .post("/api/flashcards")
        .add_header(name, value)
        .json(&json!({ "front": "What is borrowing?", "back": "A reference without ownership." }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["data"]["source"], "manual");
    let card_id = body["data"]["id"].as_str().unwrap().to_string();

    let (name, value) = user_header(user_id);
    let response = server
        .get(&format!("/api/flashcards/{card_id}"))
        .add_header(name, value)
        .await;
    response.assert_status_ok();

    let (name, value) = user_header(user_id);
    let response = server
        .put(&format!("/api/flashcards/{card_id}"))
        .add_header(name, value)
        .json(&json!({ "front": "What is borrowing in Rust?" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["front"], "What is borrowing in Rust?");
    // Manual cards keep their source on edit.
    assert_eq!(body["data"]["source"], "manual");

    let (name, value) = user_header(user_id);
    let response = server
        .delete(&format!("/api/flashcards/{card_id}"))
        .add_header(name, value)
        .await;
    response.assert_status_ok();

    let (name, value) = user_header(user_id);
    let response = server
        .get(&format!("/api/flashcards/{card_id}"))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_editing_accepted_card_changes_source() {
    let server = create_test_server().await;
    let user_id = Uuid::new_v4();
    let generated = generate_for(&server, user_id).await;
    let generation_id = generated["data"]["generation_id"].as_str().unwrap().to_string();

    let (name, value) = user_header(user_id);
    let response = server
        .post("/api/flashcards/bulk")
        .add_header(name, value)
        .json(&json!({
            "generation_id": generation_id,
            "flashcards": [{ "front": "original", "back": "original", "source": "ai-full" }]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let card_id = body["data"]["flashcards"][0]["id"].as_str().unwrap().to_string();

    let (name, value) = user_header(user_id);
    let response = server
        .put(&format!("/api/flashcards/{card_id}"))
        .add_header(name, value)
        .json(&json!({ "back": "corrected by hand" }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["source"], "ai-edited");
}

#[tokio::test]
async fn test_flashcards_are_scoped_per_user() {
    let server = create_test_server().await;
    let owner = Uuid::new_v4();

    let (name, value) = user_header(owner);
    server
        .post("/api/flashcards")
        .add_header(name, value)
        .json(&json!({ "front": "f", "back": "b" }))
        .await
        .assert_status(StatusCode::CREATED);

    let (name, value) = user_header(Uuid::new_v4());
    let response = server.get("/api/flashcards").add_header(name, value).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_study_session_requires_cards() {
    let server = create_test_server().await;
    let (name, value) = user_header(Uuid::new_v4());

    let response = server.get("/api/study/session").add_header(name, value).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("no flashcards yet"));
}

#[tokio::test]
async fn test_study_session_draws_cards() {
    let server = create_test_server().await;
    let user_id = Uuid::new_v4();

    for i in 0..3 {
        let (name, value) = user_header(user_id);
        server
            .post("/api/flashcards")
            .add_header(name, value)
            .json(&json!({ "front": format!("card {i}"), "back": "b" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let (name, value) = user_header(user_id);
    let response = server
        .get("/api/study/session?limit=2&shuffle=false")
        .add_header(name, value)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["flashcards"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total_count"], 3);
    assert_eq!(body["data"]["user_total_flashcards"], 3);
    assert!(Uuid::parse_str(body["data"]["session_id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_study_session_filter_mismatch_is_404() {
    let server = create_test_server().await;
    let user_id = Uuid::new_v4();

    let (name, value) = user_header(user_id);
    server
        .post("/api/flashcards")
        .add_header(name, value)
        .json(&json!({ "front": "f", "back": "b" }))
        .await
        .assert_status(StatusCode::CREATED);

    let (name, value) = user_header(user_id);
    let response = server
        .get("/api/study/session?source=ai-edited")
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("source filter"));
}
